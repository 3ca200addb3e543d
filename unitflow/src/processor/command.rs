//! Provider backed by an external command.
//!
//! Each call spawns the command, writes the unit text to its stdin and reads
//! the transformed text from stdout. A non-zero exit is treated as transient
//! so the retry policy applies; a missing program is permanent.

use super::provider::{Provider, ProviderError};
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs `program args...` once per unit.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
    name: String,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let name = format!("command:{}", program);
        Self {
            program,
            args,
            name,
        }
    }

    /// Builds a provider from a whitespace-separated command line.
    ///
    /// Returns `None` for an empty line. Quoting is not interpreted.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Provider for CommandProvider {
    async fn process(&self, text: &str) -> Result<String, ProviderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    ProviderError::permanent(format!("cannot run {}: {}", self.program, e))
                }
                _ => ProviderError::transient(format!("failed to spawn {}: {}", self.program, e)),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::transient("child stdin unavailable"))?;
        let input = text.as_bytes().to_vec();

        // Write and read concurrently so a large unit cannot deadlock on a full pipe
        let writer = async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        };
        let (written, output) = tokio::join!(writer, child.wait_with_output());

        let output = output
            .map_err(|e| ProviderError::transient(format!("{} did not finish: {}", self.program, e)))?;
        if let Err(e) = written {
            // A command that exits without reading all input is reported by its status
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(ProviderError::transient(format!(
                    "failed to write to {}: {}",
                    self.program, e
                )));
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::transient(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| ProviderError::permanent(format!("{} produced invalid UTF-8: {}", self.program, e)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
