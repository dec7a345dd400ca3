//! Base tool: run a command line, keep its output, record timing, and write
//! everything to the output directory on stop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use tracing::{info, warn};

use super::{Tool, ToolContext, ToolState};
use crate::command::{Command, CommandHandle, Stream};
use crate::error::ToolError;
use crate::latch::LatchGuard;

/// Written next to the tool output as `<tool>.summary.<host>.json`
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    tool: &'a str,
    host: &'a str,
    master_host: &'a str,
    command: Option<String>,
    state: ToolState,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    duration_ms: Option<i64>,
    exit_code: Option<i32>,
}

pub struct GenericTool {
    name: String,
    state: ToolState,
    ctx: Option<ToolContext>,
    tool_cmd: Vec<String>,
    launched: Option<String>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    output: Option<CommandHandle>,
}

impl GenericTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ToolState::Unconfigured,
            ctx: None,
            tool_cmd: Vec::new(),
            launched: None,
            started_at: None,
            stopped_at: None,
            output: None,
        }
    }

    pub fn context(&self) -> Result<&ToolContext, ToolError> {
        self.ctx.as_ref().ok_or_else(|| ToolError::NotConfigured {
            tool: self.name.clone(),
        })
    }

    /// Command line built at configure time: `<path>/<tool> args...`
    pub fn tool_cmd(&self) -> &[String] {
        &self.tool_cmd
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn stopped_at(&self) -> Option<DateTime<Utc>> {
        self.stopped_at
    }

    pub(crate) fn set_state(&mut self, state: ToolState) {
        self.state = state;
    }

    /// Error unless the tool is in `expected`
    pub(crate) fn expect_state(&self, op: &'static str, expected: ToolState) -> Result<(), ToolError> {
        match self.state {
            s if s == expected => Ok(()),
            ToolState::Unconfigured => Err(ToolError::NotConfigured {
                tool: self.name.clone(),
            }),
            state => Err(ToolError::InvalidTransition {
                tool: self.name.clone(),
                op,
                state,
            }),
        }
    }

    /// Run a command as this tool's controlled process and record the start
    /// time. Failures are logged; returns whether the command ran.
    pub fn launch(&mut self, command: &Command) -> Result<bool, ToolError> {
        let ctx = self.context()?;
        let host = ctx.host.clone();
        let result = ctx.executor.execute(command);

        self.started_at = Some(Utc::now());
        self.launched = Some(command.to_string());

        match result {
            Ok(handle) => {
                info!(tool = %self.name, host = %host, command = %command, "Tool started");
                self.output = Some(handle);
                Ok(true)
            }
            Err(e) => {
                warn!(
                    tool = %self.name,
                    host = %host,
                    command = %command,
                    error = e.kind(),
                    "Error starting tool: {e}"
                );
                Ok(false)
            }
        }
    }

    /// Record the stop time and write output and summary to `out_dir`
    pub fn finish(&mut self) -> Result<(), ToolError> {
        self.context()?;
        self.stopped_at = Some(Utc::now());
        self.state = ToolState::Stopped;
        if let Err(e) = self.transfer_output() {
            warn!(tool = %self.name, "Error transferring tool output: {e:#}");
        }
        Ok(())
    }

    fn transfer_output(&self) -> anyhow::Result<()> {
        use anyhow::Context;

        let ctx = self.context()?;
        fs::create_dir_all(&ctx.out_dir)
            .with_context(|| format!("Failed to create {}", ctx.out_dir.display()))?;

        if let Some(handle) = &self.output {
            let mut log = handle.fetch_output(Stream::Stdout).to_vec();
            log.extend_from_slice(handle.fetch_output(Stream::Stderr));
            if !log.is_empty() {
                let path = ctx.out_dir.join(format!("{}.log.{}", self.name, ctx.host));
                fs::write(&path, &log)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }

        let summary = RunSummary {
            tool: &self.name,
            host: &ctx.host,
            master_host: &ctx.master_host,
            command: self.launched.clone(),
            state: self.state,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
            duration_ms: self
                .started_at
                .zip(self.stopped_at)
                .map(|(start, stop)| (stop - start).num_milliseconds()),
            exit_code: self.output.as_ref().and_then(CommandHandle::exit_code),
        };
        let path = ctx
            .out_dir
            .join(format!("{}.summary.{}.json", self.name, ctx.host));
        let json = serde_json::to_vec_pretty(&summary).context("Failed to serialize summary")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

        info!(tool = %self.name, out_dir = %ctx.out_dir.display(), "Tool output transferred");
        Ok(())
    }
}

impl Tool for GenericTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ToolState {
        self.state
    }

    fn configure(&mut self, ctx: ToolContext) -> Result<(), ToolError> {
        if self.state != ToolState::Unconfigured {
            return Err(ToolError::AlreadyConfigured {
                tool: self.name.clone(),
            });
        }

        let program = if ctx.path.as_os_str().is_empty() {
            ctx.tool.clone()
        } else {
            ctx.path.join(&ctx.tool).to_string_lossy().into_owned()
        };
        self.tool_cmd = std::iter::once(program).chain(ctx.args.iter().cloned()).collect();
        self.name = ctx.tool.clone();
        self.ctx = Some(ctx);
        self.state = ToolState::Configured;
        Ok(())
    }

    fn start(&mut self) -> Result<(), ToolError> {
        self.expect_state("start", ToolState::Configured)?;
        let _guard = LatchGuard::new(self.context()?.latch.clone());

        let command = Command::from_argv(self.tool_cmd.iter().cloned())
            .filter(|c| !c.program.is_empty())
            .ok_or_else(|| ToolError::EmptyCommand {
                tool: self.name.clone(),
            })?
            .capture(Stream::Stdout)
            .capture(Stream::Stderr);

        self.launch(&command)?;
        self.state = ToolState::Started;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ToolError> {
        self.expect_state("stop", ToolState::Started)?;
        self.finish()
    }
}
