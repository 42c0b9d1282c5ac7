//! Smoke-test the freshly built daemon before publishing it.
//!
//! The daemon speaks a line-oriented protocol: request fields are separated
//! by the unit separator (0x1f) and each request ends with the record
//! separator (0x1e); responses use the same framing. Two literal probes are
//! enough to prove the binary is alive and linked correctly: one against a
//! deterministic throwaway repository, one against an empty path.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use gsb_util::process::run_capture;

use crate::error::EngineError;

pub const UNIT_SEP: u8 = 0x1f;
pub const RECORD_SEP: u8 = 0x1e;

/// Responses larger than this mean the binary is babbling, not answering.
const MAX_RESPONSE_LEN: usize = 64 * 1024;

const FIXTURE_BRANCH: &str = "master";

/// A disposable git repository with deterministic identity and exactly one
/// empty commit. Lives inside the work area, so it vanishes with it.
#[derive(Debug)]
pub struct SmokeFixture {
    path: PathBuf,
    branch: &'static str,
}

fn git_in(dir: &Path, args: &[&str]) -> Result<(), EngineError> {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .current_dir(dir)
        // The host's real git configuration must be neither read nor
        // mutated; /dev/null isolates both scopes.
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_SYSTEM", "/dev/null")
        .env("GIT_AUTHOR_NAME", "gsb")
        .env("GIT_AUTHOR_EMAIL", "gsb@localhost")
        .env("GIT_AUTHOR_DATE", "2000-01-01T00:00:00Z")
        .env("GIT_COMMITTER_NAME", "gsb")
        .env("GIT_COMMITTER_EMAIL", "gsb@localhost")
        .env("GIT_COMMITTER_DATE", "2000-01-01T00:00:00Z");
    let output = run_capture(&mut cmd).map_err(|e| EngineError::Fixture {
        message: e.to_string(),
    })?;
    if output.success {
        Ok(())
    } else {
        Err(EngineError::Fixture {
            message: format!("git {} failed: {}", args.join(" "), output.stderr.trim()),
        })
    }
}

impl SmokeFixture {
    /// Create the fixture repository under `parent`.
    ///
    /// # Errors
    /// Returns an error if git is unusable or any setup command fails.
    pub fn create(parent: &Path) -> Result<Self, EngineError> {
        let path = parent.join("fixture");
        std::fs::create_dir_all(&path).map_err(|source| EngineError::Io {
            path: path.display().to_string(),
            source,
        })?;
        git_in(&path, &["-c", "init.defaultBranch=master", "init", "--quiet"])?;
        git_in(
            &path,
            &["commit", "--quiet", "--allow-empty", "-m", "empty"],
        )?;
        Ok(Self {
            path,
            branch: FIXTURE_BRANCH,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn branch(&self) -> &str {
        self.branch
    }
}

/// Frame a request: `id US path RS`.
pub fn encode_request(id: &str, path: &str) -> Vec<u8> {
    let mut request = Vec::with_capacity(id.len() + path.len() + 2);
    request.extend_from_slice(id.as_bytes());
    request.push(UNIT_SEP);
    request.extend_from_slice(path.as_bytes());
    request.push(RECORD_SEP);
    request
}

/// Split one response record into its fields.
pub fn split_fields(record: &[u8]) -> Vec<String> {
    record
        .split(|&b| b == UNIT_SEP)
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

/// Check the response to the fixture probe: the path is a repository, on the
/// fixture's branch, with an empty relative path.
pub fn check_repo_response(fields: &[String], branch: &str) -> Result<(), String> {
    if fields.first().map(String::as_str) != Some("hello") {
        return Err(format!("unexpected response id {:?}", fields.first()));
    }
    if fields.get(1).map(String::as_str) != Some("1") {
        return Err(format!(
            "fixture not recognized as a repository (state flag {:?})",
            fields.get(1)
        ));
    }
    if fields.get(3).map(String::as_str) != Some("") {
        return Err(format!(
            "expected empty relative path, got {:?}",
            fields.get(3)
        ));
    }
    if fields.get(4).map(String::as_str) != Some(branch) {
        return Err(format!(
            "expected branch {branch:?}, got {:?}",
            fields.get(4)
        ));
    }
    Ok(())
}

/// Check the response to the empty-path probe: not a repository.
pub fn check_non_repo_response(fields: &[String]) -> Result<(), String> {
    if fields.first().map(String::as_str) != Some("hello") {
        return Err(format!("unexpected response id {:?}", fields.first()));
    }
    if fields.get(1).map(String::as_str) != Some("0") {
        return Err(format!(
            "empty path reported as a repository (state flag {:?})",
            fields.get(1)
        ));
    }
    Ok(())
}

fn read_record(reader: &mut impl Read) -> Result<Vec<u8>, String> {
    let mut record = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Err("daemon closed its output mid-response".to_owned()),
            Ok(_) if byte[0] == RECORD_SEP => return Ok(record),
            Ok(_) => {
                record.push(byte[0]);
                if record.len() > MAX_RESPONSE_LEN {
                    return Err("response exceeds the sanity limit".to_owned());
                }
            }
            Err(e) => return Err(format!("cannot read daemon output: {e}")),
        }
    }
}

fn exchange(
    stdin: &mut impl Write,
    stdout: &mut impl Read,
    id: &str,
    path: &str,
) -> Result<Vec<String>, String> {
    stdin
        .write_all(&encode_request(id, path))
        .and_then(|()| stdin.flush())
        .map_err(|e| format!("cannot write request: {e}"))?;
    let record = read_record(stdout)?;
    Ok(split_fields(&record))
}

fn run_probes(
    stdin: &mut impl Write,
    stdout: &mut impl Read,
    fixture: &SmokeFixture,
) -> Result<(), String> {
    let fields = exchange(stdin, stdout, "hello", &fixture.path().display().to_string())?;
    check_repo_response(&fields, fixture.branch())?;

    let fields = exchange(stdin, stdout, "hello", "")?;
    check_non_repo_response(&fields)
}

/// Exercise the temporary binary against the fixture.
///
/// The spawned daemon is always killed and reaped, probe outcome
/// notwithstanding.
///
/// # Errors
/// Returns `SmokeTest` on any deviation from the expected response shape.
pub fn validate(binary: &Path, fixture: &SmokeFixture) -> Result<(), EngineError> {
    eprintln!("    Smoke testing {}", binary.display());
    let mut child = Command::new(binary)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| EngineError::SmokeTest {
            reason: format!("cannot start daemon: {e}"),
        })?;

    let result = match (child.stdin.take(), child.stdout.take()) {
        (Some(mut stdin), Some(mut stdout)) => run_probes(&mut stdin, &mut stdout, fixture),
        _ => Err("daemon pipes unavailable".to_owned()),
    };

    let _ = child.kill();
    let _ = child.wait();

    result.map_err(|reason| EngineError::SmokeTest { reason })
}
