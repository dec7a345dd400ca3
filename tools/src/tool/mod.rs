//! Tool lifecycle (configure, start, stop) in lock-step with the workload.
//!
//! Every tool variant implements [`Tool`]. [`GenericTool`] runs a configured
//! command line and keeps the timing and output bookkeeping; [`ProfilerTool`]
//! builds on it to signal processes running under a profiler.

pub mod generic;
pub mod profiler;

pub use generic::GenericTool;
pub use profiler::ProfilerTool;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ToolError;
use crate::executor::CommandExecutor;
use crate::latch::CountdownLatch;

/// Lifecycle position of a tool instance. Instances are single-use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Unconfigured,
    Configured,
    Started,
    Stopped,
}

impl fmt::Display for ToolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolState::Unconfigured => "unconfigured",
            ToolState::Configured => "configured",
            ToolState::Started => "started",
            ToolState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Everything a tool is configured with, once, before start
#[derive(Clone)]
pub struct ToolContext {
    /// Tool name, also the program name for command-running tools
    pub tool: String,
    pub args: Vec<String>,
    /// Directory holding the tool binary; empty to resolve via `PATH`
    pub path: PathBuf,
    pub out_dir: PathBuf,
    pub host: String,
    pub master_host: String,
    pub executor: Arc<dyn CommandExecutor>,
    /// Counted down once when the start phase is over
    pub latch: Arc<CountdownLatch>,
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("tool", &self.tool)
            .field("args", &self.args)
            .field("path", &self.path)
            .field("out_dir", &self.out_dir)
            .field("host", &self.host)
            .field("master_host", &self.master_host)
            .field("latch_count", &self.latch.count())
            .finish_non_exhaustive()
    }
}

/// Capability set shared by all tool variants
pub trait Tool: Send {
    fn name(&self) -> &str;

    fn state(&self) -> ToolState;

    fn configure(&mut self, ctx: ToolContext) -> Result<(), ToolError>;

    /// Begin collection. Transport failures are logged, not returned; the
    /// latch is counted down before this returns.
    fn start(&mut self) -> Result<(), ToolError>;

    /// End collection and hand off output
    fn stop(&mut self) -> Result<(), ToolError>;
}
