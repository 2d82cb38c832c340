//! Runs the candidate `coolerpp_dump`-style binary once per query.
//!
//! Invocation is `<binary> <uri> <query1> <query2>`; stdout must hold the
//! selected pixels as tab-separated rows, and a non-zero exit status means
//! the candidate failed.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{FuzzerError, Result};
use crate::executor::QueryExecutor;
use crate::fuzzer_structs::{PixelRow, QueryPair};
use crate::pixels;

pub const DEFAULT_CANDIDATE: &str = "coolerpp_dump";

#[derive(Debug, Clone)]
pub struct CandidateExecutor {
    binary: PathBuf,
    uri: String,
    name: String,
}

impl CandidateExecutor {
    pub fn new(binary: PathBuf, uri: impl Into<String>) -> Self {
        let name = binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_CANDIDATE.to_string());
        Self {
            binary,
            uri: uri.into(),
            name,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, query1: &str, query2: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(&self.uri)
            .arg(query1)
            .arg(query2)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl QueryExecutor for CandidateExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, query: &QueryPair) -> Result<Vec<PixelRow>> {
        let query1 = query.first.to_string();
        let query2 = query.second.to_string();
        let execution_error = |message: String, stderr: String| FuzzerError::Execution {
            executor: self.name.clone(),
            query1: query1.clone(),
            query2: query2.clone(),
            message,
            stderr,
        };

        debug!(
            "[{}] running {} {} {} {}...",
            self.name,
            self.binary.display(),
            self.uri,
            query1,
            query2
        );
        let output = self
            .command(&query1, &query2)
            .output()
            .map_err(|e| execution_error(format!("unable to run {}: {}", self.binary.display(), e), String::new()))?;

        if !output.status.success() {
            let message = match output.status.code() {
                Some(code) => format!("{} terminated with code {}", self.binary.display(), code),
                None => format!("{} was terminated by a signal", self.binary.display()),
            };
            return Err(execution_error(
                message,
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        pixels::read_pixels_from_bytes(output.stdout).map_err(|e| FuzzerError::Parse {
            query1: query1.clone(),
            query2: query2.clone(),
            message: e.to_string(),
        })
    }
}

/// Find `program` the way a shell would: paths are checked as given, bare
/// names are looked up in `PATH`.
pub fn resolve_executable(program: &Path) -> Result<PathBuf> {
    let not_found = || FuzzerError::config(format!("Unable to find executable \"{}\"", program.display()));

    if program.components().count() > 1 || program.is_absolute() {
        return if is_executable(program) {
            Ok(program.to_path_buf())
        } else {
            Err(not_found())
        };
    }

    let path = env::var_os("PATH").ok_or_else(not_found)?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(not_found)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
