//! Tarball fetching via curl with a bounded two-variant fallback.

use std::path::Path;
use std::process::Command;

use crate::error::UtilError;
use crate::process::run_streamed;

/// Fetch `url` into `dest` with curl.
///
/// Two invocation variants are attempted, in order: a stock invocation
/// (which honors the user's curl configuration), then one with `-q` in case
/// a broken `.curlrc` is what made the first attempt fail. The fallback is
/// bounded: two attempts, never more.
///
/// # Errors
/// Returns `FetchToolMissing` if curl cannot be spawned at all, or
/// `FetchExhausted` if both variants ran and failed.
pub fn fetch(url: &str, dest: &Path) -> Result<(), UtilError> {
    let variants: [&[&str]; 2] = [&["-fsSL"], &["-q", "-fsSL"]];

    let mut spawned = false;
    for extra in variants {
        let mut cmd = Command::new("curl");
        cmd.args(extra).arg("-o").arg(dest).arg("--").arg(url);
        match run_streamed(&mut cmd) {
            Ok(status) if status.success() => return Ok(()),
            Ok(_) => spawned = true,
            Err(_) => {}
        }
    }

    if spawned {
        Err(UtilError::FetchExhausted {
            url: url.to_owned(),
        })
    } else {
        Err(UtilError::FetchToolMissing)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn curl_available() -> bool {
        Command::new("curl").arg("--version").output().is_ok()
    }

    #[test]
    fn fetch_bad_url_exhausts_both_variants() {
        if !curl_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.tar.gz");
        // A file:// URL for a nonexistent path makes curl fail fast without
        // touching the network.
        let result = fetch("file:///nonexistent/gsb/no-such-tarball", &dest);
        assert!(matches!(result, Err(UtilError::FetchExhausted { .. })));
    }

    #[test]
    fn fetch_local_file_url() {
        if !curl_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"payload").unwrap();
        let dest = dir.path().join("dest.bin");

        let url = format!("file://{}", src.display());
        fetch(&url, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }
}
