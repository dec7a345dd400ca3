//! Harness tools driver
//!
//! Arms the profiler tool on this host, waits for the start latch, lets the
//! profiler collect for the configured duration, then stops it.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use harness_tools::config::{self, ToolsConfig};
use harness_tools::executor::{CommandExecutor, LocalExecutor};
use harness_tools::latch::CountdownLatch;
use harness_tools::tool::{ProfilerTool, Tool, ToolContext};

fn main() {
    if let Err(e) = run() {
        eprintln!("FATAL: harness-tools failed: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = config::load_config()?;
    init_logging(&config)?;

    info!("harness-tools v{}", env!("CARGO_PKG_VERSION"));

    // Commands run on this machine, so logs and output files carry its hostname
    let executor: Arc<dyn CommandExecutor> = Arc::new(LocalExecutor::default());
    let latch = Arc::new(CountdownLatch::new(config.run.tools));

    let ctx = ToolContext {
        tool: "profiler".into(),
        args: Vec::new(),
        path: Default::default(),
        out_dir: config.run.out_dir.clone(),
        host: executor.host().to_string(),
        master_host: config.run.master_host.clone(),
        executor: Arc::clone(&executor),
        latch: Arc::clone(&latch),
    };

    let mut tool = ProfilerTool::new(config.profiler.clone());
    tool.configure(ctx).context("Failed to configure profiler tool")?;
    tool.start().context("Failed to start profiler tool")?;

    let timeout = Duration::from_secs(config.run.latch_timeout_seconds);
    if latch.wait_timeout(timeout) {
        info!("All tools armed");
    } else {
        warn!(
            "Start latch still at {} after {timeout:?}, continuing",
            latch.count()
        );
    }

    info!("Collecting for {}s", config.run.duration_seconds);
    std::thread::sleep(Duration::from_secs(config.run.duration_seconds));

    tool.stop().context("Failed to stop profiler tool")?;
    info!("Profiler stopped, output in {}", config.run.out_dir.display());
    Ok(())
}

fn init_logging(config: &ToolsConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.system.log_level))
        .context("Invalid log level")?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}
