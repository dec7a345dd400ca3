//! Command execution transport
//!
//! Tools never spawn processes themselves; every invocation goes through a
//! `CommandExecutor` bound to the host the tool runs against. The local
//! implementation runs on this machine; other transports plug in behind the
//! same trait.

use std::io;
use std::process::Stdio;
use thiserror::Error;
use tracing::debug;

use crate::command::{Command, CommandHandle, StreamMode};

/// Failure to run a command. Both variants are transport failures.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("I/O error executing {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Interrupted executing {program}: {detail}")]
    Interrupted { program: String, detail: String },
}

impl ExecError {
    /// Short failure class for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ExecError::Io { .. } => "io",
            ExecError::Interrupted { .. } => "interrupted",
        }
    }
}

/// Runs command descriptions on a (possibly remote) host
pub trait CommandExecutor: Send + Sync {
    /// Run the command to completion and return its captured output
    fn execute(&self, command: &Command) -> Result<CommandHandle, ExecError>;

    /// Host this executor runs commands on
    fn host(&self) -> &str;
}

/// Executes commands on the local machine
pub struct LocalExecutor {
    host: String,
}

impl LocalExecutor {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        let host = nix::unistd::gethostname()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".into());
        Self::new(host)
    }
}

fn stdio_for(mode: StreamMode) -> Stdio {
    match mode {
        StreamMode::Capture => Stdio::piped(),
        StreamMode::Ignore => Stdio::null(),
    }
}

impl CommandExecutor for LocalExecutor {
    fn execute(&self, command: &Command) -> Result<CommandHandle, ExecError> {
        debug!(host = %self.host, command = %command, "Executing");

        let child = std::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(stdio_for(command.stdout))
            .stderr(stdio_for(command.stderr))
            .spawn()
            .map_err(|source| ExecError::Io {
                program: command.program.clone(),
                source,
            })?;

        let output = child.wait_with_output().map_err(|source| {
            if source.kind() == io::ErrorKind::Interrupted {
                ExecError::Interrupted {
                    program: command.program.clone(),
                    detail: source.to_string(),
                }
            } else {
                ExecError::Io {
                    program: command.program.clone(),
                    source,
                }
            }
        })?;

        if let Some(signal) = terminating_signal(&output.status) {
            return Err(ExecError::Interrupted {
                program: command.program.clone(),
                detail: format!("terminated by signal {signal}"),
            });
        }

        Ok(CommandHandle::new(
            output.stdout,
            output.stderr,
            output.status.code(),
        ))
    }

    fn host(&self) -> &str {
        &self.host
    }
}

fn terminating_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}
