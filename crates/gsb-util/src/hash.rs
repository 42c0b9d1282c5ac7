//! SHA-256 digests via whichever command-line hashing tool is installed.
//!
//! The pinned-dependency check must work on minimal systems (including the
//! stripped-down container images used for delegated builds), so instead of
//! assuming one tool we walk an ordered chain: `sha256sum`, `shasum -a 256`,
//! `openssl dgst -sha256`. The first tool that produces a plausible digest
//! wins; a system with none of them cannot verify anything and fails hard.

use std::path::Path;
use std::process::Command;

use crate::error::UtilError;
use crate::process::run_capture;

/// Length of a SHA-256 digest in hex characters.
pub const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashTool {
    Sha256sum,
    Shasum,
    Openssl,
}

impl HashTool {
    const CHAIN: [HashTool; 3] = [HashTool::Sha256sum, HashTool::Shasum, HashTool::Openssl];

    fn name(self) -> &'static str {
        match self {
            HashTool::Sha256sum => "sha256sum",
            HashTool::Shasum => "shasum",
            HashTool::Openssl => "openssl",
        }
    }

    fn command(self, path: &Path) -> Command {
        let mut cmd = Command::new(self.name());
        match self {
            HashTool::Sha256sum => {
                cmd.arg("-b").arg(path);
            }
            HashTool::Shasum => {
                cmd.arg("-b").arg("-a").arg("256").arg(path);
            }
            HashTool::Openssl => {
                cmd.arg("dgst").arg("-sha256").arg(path);
            }
        }
        cmd
    }

    fn parse_output(self, stdout: &str) -> Option<String> {
        let token = match self {
            // "HEX *file" — digest first.
            HashTool::Sha256sum | HashTool::Shasum => stdout.split_whitespace().next()?,
            // "SHA256(file)= HEX" — digest last.
            HashTool::Openssl => stdout.split_whitespace().last()?,
        };
        let token = token.to_lowercase();
        if token.chars().all(|c| c.is_ascii_hexdigit()) && !token.is_empty() {
            Some(token)
        } else {
            None
        }
    }
}

/// Compute the SHA-256 hex digest of a file.
///
/// Some systems ship a legacy `shasum` that silently ignores `-a 256` and
/// emits a SHA-1 digest; a too-short digest from `shasum` therefore means
/// "this tool cannot do SHA-256" and the chain falls through to the next
/// tool. That heuristic is deliberately not applied to the other backends.
///
/// # Errors
/// Returns `NoHashTool` if no chain entry is installed, or `HashToolFailed`
/// if an installed tool cannot digest the file (e.g. it is unreadable).
pub fn file_sha256(path: &Path) -> Result<String, UtilError> {
    for tool in HashTool::CHAIN {
        let output = match run_capture(&mut tool.command(path)) {
            Ok(output) => output,
            // Tool not installed: try the next one.
            Err(_) => continue,
        };

        if !output.success {
            return Err(UtilError::HashToolFailed {
                tool: tool.name(),
                path: path.display().to_string(),
                message: output.stderr.trim().to_owned(),
            });
        }

        match tool.parse_output(&output.stdout) {
            Some(digest) if digest.len() == SHA256_HEX_LEN => return Ok(digest),
            Some(_) if tool == HashTool::Shasum => continue,
            _ => {
                return Err(UtilError::HashToolFailed {
                    tool: tool.name(),
                    path: path.display().to_string(),
                    message: format!("unrecognized output: {}", output.stdout.trim()),
                })
            }
        }
    }
    Err(UtilError::NoHashTool)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sha2::{Digest, Sha256};

    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn tool_available(name: &str) -> bool {
        Command::new(name)
            .arg("--help")
            .output()
            .is_ok()
    }

    #[test]
    fn parse_sha256sum_output() {
        let line = format!("{EMPTY_SHA256} *file.tar.gz\n");
        assert_eq!(
            HashTool::Sha256sum.parse_output(&line).as_deref(),
            Some(EMPTY_SHA256)
        );
    }

    #[test]
    fn parse_shasum_output() {
        let line = format!("{EMPTY_SHA256}  file.tar.gz\n");
        assert_eq!(
            HashTool::Shasum.parse_output(&line).as_deref(),
            Some(EMPTY_SHA256)
        );
    }

    #[test]
    fn parse_openssl_output() {
        let line = format!("SHA256(file.tar.gz)= {EMPTY_SHA256}\n");
        assert_eq!(
            HashTool::Openssl.parse_output(&line).as_deref(),
            Some(EMPTY_SHA256)
        );
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!(HashTool::Sha256sum.parse_output("not-a-digest file\n").is_none());
    }

    #[test]
    fn legacy_shasum_digest_is_shorter() {
        // A SHA-1-only shasum yields 40 hex chars; the chain must treat that
        // as "tool absent" rather than a digest mismatch.
        let sha1 = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let parsed = HashTool::Shasum.parse_output(&format!("{sha1}  f\n")).unwrap();
        assert!(parsed.len() < SHA256_HEX_LEN);
    }

    #[test]
    fn file_sha256_matches_in_process_digest() {
        if !tool_available("sha256sum") && !tool_available("shasum") && !tool_available("openssl") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("payload.bin");
        std::fs::write(&file, b"gsb hash chain test").unwrap();

        let mut hasher = Sha256::new();
        hasher.update(b"gsb hash chain test");
        let expected = format!("{:x}", hasher.finalize());

        assert_eq!(file_sha256(&file).unwrap(), expected);
    }

    #[test]
    fn file_sha256_empty_file() {
        if !tool_available("sha256sum") && !tool_available("shasum") && !tool_available("openssl") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty");
        std::fs::write(&file, b"").unwrap();
        assert_eq!(file_sha256(&file).unwrap(), EMPTY_SHA256);
    }

    #[test]
    fn file_sha256_missing_file_is_tool_failure() {
        if !tool_available("sha256sum") && !tool_available("shasum") && !tool_available("openssl") {
            return;
        }
        let result = file_sha256(Path::new("/nonexistent/gsb/tarball.tar.gz"));
        assert!(matches!(result, Err(UtilError::HashToolFailed { .. })));
    }
}
