//! Profiler tool: toggles collection in processes launched under a
//! signal-driven profiler.
//!
//! Start finds the user's processes that have the profiler library loaded
//! and sends them the profiling signal. The signal command is kept and sent
//! again, unchanged, at stop. It must never be rebuilt from a fresh discovery,
//! which could pick up unrelated processes started during the run.

use tracing::{info, warn};

use super::{GenericTool, Tool, ToolContext, ToolState};
use crate::config::ProfilerSettings;
use crate::control::ControlCommand;
use crate::discovery::{current_user, ProcessDiscovery, TargetSet};
use crate::error::ToolError;
use crate::latch::LatchGuard;

pub struct ProfilerTool {
    base: GenericTool,
    settings: ProfilerSettings,
    discovery: ProcessDiscovery,
    control: Option<ControlCommand>,
}

impl ProfilerTool {
    pub fn new(settings: ProfilerSettings) -> Self {
        Self {
            base: GenericTool::new("profiler"),
            discovery: ProcessDiscovery::new(settings.clone()),
            settings,
            control: None,
        }
    }

    /// Signal command built by `start`, if it ran
    pub fn control_command(&self) -> Option<&ControlCommand> {
        self.control.as_ref()
    }

    pub fn base(&self) -> &GenericTool {
        &self.base
    }

    fn discover_targets(&self, ctx: &ToolContext) -> TargetSet {
        let user = self.settings.user.clone().or_else(current_user);
        match user {
            Some(user) => self.discovery.discover(ctx.executor.as_ref(), &user),
            None => {
                warn!(
                    tool = %self.base.name(),
                    host = %ctx.host,
                    "Cannot determine current user, no processes to signal"
                );
                TargetSet::default()
            }
        }
    }
}

impl Tool for ProfilerTool {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn state(&self) -> ToolState {
        self.base.state()
    }

    fn configure(&mut self, ctx: ToolContext) -> Result<(), ToolError> {
        self.base.configure(ctx)
    }

    fn start(&mut self) -> Result<(), ToolError> {
        self.base.expect_state("start", ToolState::Configured)?;
        let ctx = self.base.context()?.clone();
        let guard = LatchGuard::new(ctx.latch.clone());

        let targets = self.discover_targets(&ctx);
        if targets.is_empty() {
            info!(tool = %self.name(), host = %ctx.host, "No profiled processes found");
        }

        let control = ControlCommand::build(
            &self.settings.signal_program,
            &self.settings.signal,
            &targets,
        );
        self.base.launch(&control.to_command())?;
        self.control = Some(control);
        self.base.set_state(ToolState::Started);

        guard.release();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ToolError> {
        let Some(control) = &self.control else {
            return Err(ToolError::StopBeforeStart {
                tool: self.name().to_string(),
            });
        };
        self.base.expect_state("stop", ToolState::Started)?;

        let ctx = self.base.context()?;
        let command = control.to_command();
        if let Err(e) = ctx.executor.execute(&command) {
            warn!(
                tool = %self.base.name(),
                host = %ctx.host,
                command = %command,
                error = e.kind(),
                "Error stopping profiler: {e}"
            );
        }

        self.base.finish()
    }
}
