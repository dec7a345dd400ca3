//! Signal-send control command built from a discovered target set

use std::fmt;

use crate::command::Command;
use crate::discovery::TargetSet;

/// `kill -<SIGNAL> pid...`, built once and replayed verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    program: String,
    args: Vec<String>,
}

impl ControlCommand {
    /// Build the signal-send command for every target. An empty target set
    /// still yields a command, carrying the signal argument only.
    pub fn build(program: &str, signal: &str, targets: &TargetSet) -> Self {
        let mut args = Vec::with_capacity(targets.len() + 1);
        args.push(format!("-{}", normalize_signal(signal)));
        args.extend(targets.ids().iter().cloned());
        Self {
            program: program.to_string(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Process identifiers the command signals
    pub fn targets(&self) -> &[String] {
        &self.args[1..]
    }

    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Executable form; output is not captured
    pub fn to_command(&self) -> Command {
        Command::new(&self.program).args(self.args.iter().cloned())
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// `-SIGPROF`, `SIGPROF`, `prof` and `PROF` all become `PROF`
fn normalize_signal(signal: &str) -> String {
    let upper = signal.trim().trim_start_matches('-').to_uppercase();
    match upper.strip_prefix("SIG") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_targets() {
        let targets: TargetSet = ["101", "202"].into_iter().collect();
        let cmd = ControlCommand::build("kill", "PROF", &targets);
        assert_eq!(cmd.argv(), vec!["kill", "-PROF", "101", "202"]);
        assert_eq!(cmd.targets(), ["101", "202"]);
        assert_eq!(cmd.to_string(), "kill -PROF 101 202");
    }

    #[test]
    fn test_build_without_targets() {
        let cmd = ControlCommand::build("kill", "PROF", &TargetSet::default());
        assert_eq!(cmd.argv(), vec!["kill", "-PROF"]);
        assert!(cmd.targets().is_empty());
    }

    #[test]
    fn test_signal_normalization() {
        for raw in ["PROF", "prof", "-PROF", "SIGPROF", "-sigprof"] {
            let cmd = ControlCommand::build("kill", raw, &TargetSet::default());
            assert_eq!(cmd.args(), ["-PROF"], "input {raw}");
        }
        assert_eq!(normalize_signal("USR2"), "USR2");
    }

    #[test]
    fn test_to_command_matches_argv() {
        let targets: TargetSet = ["7"].into_iter().collect();
        let control = ControlCommand::build("/bin/kill", "USR1", &targets);
        let cmd = control.to_command();
        assert_eq!(cmd.argv(), control.argv());
        assert_eq!(cmd.stdout, crate::command::StreamMode::Ignore);
    }
}
