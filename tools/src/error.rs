//! Lifecycle contract violations
//!
//! Transport failures are logged and absorbed by the tools; only caller bugs
//! in lifecycle sequencing surface as errors.

use thiserror::Error;

use crate::tool::ToolState;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool {tool} used before configure()")]
    NotConfigured { tool: String },

    #[error("Tool {tool} is already configured")]
    AlreadyConfigured { tool: String },

    #[error("Tool {tool} cannot {op} while {state}")]
    InvalidTransition {
        tool: String,
        op: &'static str,
        state: ToolState,
    },

    #[error("Tool {tool} stopped before start: no control command was built")]
    StopBeforeStart { tool: String },

    #[error("Tool {tool} has an empty command line")]
    EmptyCommand { tool: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ToolError::StopBeforeStart {
            tool: "profiler".into(),
        };
        assert_eq!(
            err.to_string(),
            "Tool profiler stopped before start: no control command was built"
        );

        let err = ToolError::InvalidTransition {
            tool: "vmstat".into(),
            op: "start",
            state: ToolState::Stopped,
        };
        assert_eq!(err.to_string(), "Tool vmstat cannot start while stopped");
    }
}
