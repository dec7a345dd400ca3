//! Harness tools: auxiliary monitoring and profiling facilities started and
//! stopped on benchmark hosts in lock-step with the workload.
//!
//! Tools reach their host only through a [`executor::CommandExecutor`], and
//! report readiness through a shared [`latch::CountdownLatch`] so the
//! coordinator releases the workload only once every tool is armed.
//!
//! The [`tool::ProfilerTool`] variant finds the current user's processes that
//! were launched with a profiler library loaded (`ps` listing, then a `pldd`
//! probe per process) and toggles collection by signalling them.

pub mod command;
pub mod config;
pub mod control;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod latch;
pub mod tool;

#[cfg(test)]
mod testing;
