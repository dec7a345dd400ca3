//! Process discovery: find the user's processes running with the profiler
//! library loaded.
//!
//! Two passes through the executor: one listing of the user's processes, then
//! one loaded-library probe per candidate. Transport failures never abort the
//! pass; a failed listing yields no targets and a failed probe skips only that
//! candidate.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

use crate::command::{Command, Stream};
use crate::config::ProfilerSettings;
use crate::executor::CommandExecutor;

/// Column label that opens the header line of a process listing
const HEADER_LABEL: &str = "PID";

/// One probed process and the libraries it has mapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: String,
    pub loaded_libraries: BTreeSet<String>,
}

impl ProcessRecord {
    /// Build from raw probe output. A leading `<pid>: <command>` banner line
    /// is not a library and is left out of the set.
    pub fn from_probe_output(pid: &str, output: &str) -> Self {
        let banner = format!("{pid}:");
        let loaded_libraries = output
            .lines()
            .map(str::trim)
            .enumerate()
            .filter(|(idx, line)| !line.is_empty() && !(*idx == 0 && line.starts_with(&banner)))
            .map(|(_, line)| line.to_string())
            .collect();

        Self {
            pid: pid.to_string(),
            loaded_libraries,
        }
    }
}

/// Process identifiers confirmed to carry the profiler library, in the
/// order they were listed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet(Vec<String>);

impl TargetSet {
    pub fn new(ids: Vec<String>) -> Self {
        Self(ids)
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TargetSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for TargetSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Extract candidate process identifiers from `ps`-style output.
///
/// Only the first whitespace-delimited token of each line is read, so the
/// remaining column layout may vary. Blank lines, the header line and lines
/// whose first token is not numeric are skipped. Repeated identifiers are
/// kept once, at their first position.
pub fn parse_process_listing(listing: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut pids = Vec::new();

    for line in listing.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(token) = line.split_whitespace().next() else {
            continue;
        };
        if token == HEADER_LABEL {
            continue;
        }
        if !token.bytes().all(|b| b.is_ascii_digit()) {
            debug!("Skipping unparseable listing line: {line}");
            continue;
        }
        if seen.insert(token) {
            pids.push(token.to_string());
        }
    }

    pids
}

/// Effective user name of this process, falling back to `$USER`
pub fn current_user() -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::geteuid())
        .ok()
        .flatten()
        .map(|u| u.name)
        .or_else(|| std::env::var("USER").ok())
}

/// Finds processes started under the profiler
pub struct ProcessDiscovery {
    settings: ProfilerSettings,
}

impl ProcessDiscovery {
    pub fn new(settings: ProfilerSettings) -> Self {
        Self { settings }
    }

    pub fn listing_command(&self, user: &str) -> Command {
        Command::new(&self.settings.list_program)
            .args(["-u", user])
            .capture(Stream::Stdout)
    }

    pub fn probe_command(&self, pid: &str) -> Command {
        Command::new(&self.settings.probe_program)
            .arg(pid)
            .capture(Stream::Stdout)
    }

    /// List the user's processes and keep those with the profiler library loaded
    pub fn discover(&self, executor: &dyn CommandExecutor, user: &str) -> TargetSet {
        let listing_cmd = self.listing_command(user);
        let listing = match executor.execute(&listing_cmd) {
            Ok(handle) => String::from_utf8_lossy(handle.fetch_output(Stream::Stdout)).into_owned(),
            Err(e) => {
                warn!(
                    host = executor.host(),
                    command = %listing_cmd,
                    error = e.kind(),
                    "Error listing processes: {e}"
                );
                return TargetSet::default();
            }
        };

        let candidates = parse_process_listing(&listing);
        debug!(
            host = executor.host(),
            "Probing {} candidate process(es)",
            candidates.len()
        );

        let targets: TargetSet = candidates
            .into_iter()
            .filter_map(|pid| self.probe(executor, pid))
            .collect();

        info!(
            host = executor.host(),
            "Found process(es) started with {}, pid = {targets}",
            self.settings.library
        );
        targets
    }

    fn probe(&self, executor: &dyn CommandExecutor, pid: String) -> Option<String> {
        let probe_cmd = self.probe_command(&pid);
        let probe_output = match executor.execute(&probe_cmd) {
            Ok(handle) => String::from_utf8_lossy(handle.fetch_output(Stream::Stdout)).into_owned(),
            Err(e) => {
                // Processes that exit between listing and probing land here too
                warn!(
                    host = executor.host(),
                    command = %probe_cmd,
                    error = e.kind(),
                    "Error probing process {pid}: {e}"
                );
                return None;
            }
        };

        // Any line of the pldd output may name the library, banner included
        if !probe_output.contains(&self.settings.library) {
            return None;
        }
        let record = ProcessRecord::from_probe_output(&pid, &probe_output);
        debug!(
            host = executor.host(),
            "Process {pid} has {} with {} mapped object(s)",
            self.settings.library,
            record.loaded_libraries.len()
        );
        Some(record.pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandHandle;
    use crate::executor::ExecError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const LISTING: &str = "\
    PID TTY          TIME CMD
   101 pts/0    00:00:01 java
   202 pts/0    00:00:00 bash

   303 ?        00:00:09 java
";

    /// Answers by full command line; records every call
    struct ScriptedExecutor {
        replies: HashMap<String, Result<String, &'static str>>,
        calls: Mutex<Vec<Command>>,
    }

    impl ScriptedExecutor {
        fn new(replies: &[(&str, Result<&str, &'static str>)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|c| c.to_string()).collect()
        }
    }

    impl CommandExecutor for ScriptedExecutor {
        fn execute(&self, command: &Command) -> Result<CommandHandle, ExecError> {
            self.calls.lock().unwrap().push(command.clone());
            let key = command.to_string();
            match self.replies.get(&key) {
                Some(Ok(out)) => Ok(CommandHandle::with_stdout(out.clone())),
                Some(Err("interrupted")) => Err(ExecError::Interrupted {
                    program: command.program.clone(),
                    detail: "scripted".into(),
                }),
                _ => Err(ExecError::Io {
                    program: command.program.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such process"),
                }),
            }
        }

        fn host(&self) -> &str {
            "sut"
        }
    }

    fn discovery() -> ProcessDiscovery {
        ProcessDiscovery::new(ProfilerSettings::default())
    }

    #[test]
    fn test_parse_listing_skips_header_and_blanks() {
        assert_eq!(parse_process_listing(LISTING), vec!["101", "202", "303"]);
    }

    #[test]
    fn test_parse_listing_variant_layouts() {
        let solaris = "   PID TTY         TIME CMD\n  4711 ?           0:03 java";
        assert_eq!(parse_process_listing(solaris), vec!["4711"]);

        let bare = "PID\n12\n13\n";
        assert_eq!(parse_process_listing(bare), vec!["12", "13"]);
    }

    #[test]
    fn test_parse_listing_anomalies_and_duplicates() {
        let text = "PID CMD\n10 a\ngarbage line\n10 a\n  \n11 b\n-- 12";
        assert_eq!(parse_process_listing(text), vec!["10", "11"]);
    }

    #[test]
    fn test_process_record_collects_library_set() {
        let out = "101: /usr/bin/java -server\n/lib/libc.so.1\n/opt/prof/lib/libcollector.so\n/lib/libc.so.1\n";
        let record = ProcessRecord::from_probe_output("101", out);
        assert_eq!(
            record.loaded_libraries.into_iter().collect::<Vec<_>>(),
            vec!["/lib/libc.so.1", "/opt/prof/lib/libcollector.so"]
        );
    }

    #[test]
    fn test_discover_matches_library_named_in_banner() {
        let exec = ScriptedExecutor::new(&[
            ("/usr/bin/ps -u bench", Ok("PID CMD\n101 java\n")),
            (
                "/usr/bin/pldd 101",
                Ok("101:\t/opt/studio/libcollector/bin/java\n/lib/libc.so.1\n"),
            ),
        ]);

        let targets = discovery().discover(&exec, "bench");

        assert_eq!(targets.ids(), ["101"]);
    }

    #[test]
    fn test_discover_runs_pldd_once_per_unique_pid() {
        let exec = ScriptedExecutor::new(&[
            ("/usr/bin/ps -u bench", Ok("PID CMD\n101 java\n202 sh\n101 java\n")),
            ("/usr/bin/pldd 101", Ok("101: java\n/lib/libcollector.so\n")),
            ("/usr/bin/pldd 202", Ok("202: sh\n/lib/libc.so.1\n")),
        ]);

        let targets = discovery().discover(&exec, "bench");

        assert_eq!(targets.ids(), ["101"]);
        assert_eq!(
            exec.calls(),
            vec!["/usr/bin/ps -u bench", "/usr/bin/pldd 101", "/usr/bin/pldd 202"]
        );
    }

    #[test]
    fn test_discover_probes_each_candidate_in_order() {
        let exec = ScriptedExecutor::new(&[
            ("/usr/bin/ps -u bench", Ok(LISTING)),
            ("/usr/bin/pldd 101", Ok("101: java\n/lib/libcollector.so\n")),
            ("/usr/bin/pldd 202", Ok("202: bash\n/lib/libc.so.1\n")),
            ("/usr/bin/pldd 303", Ok("303: java\n/lib/libcollector.so\n")),
        ]);

        let targets = discovery().discover(&exec, "bench");

        assert_eq!(targets.ids(), ["101", "303"]);
        assert_eq!(
            exec.calls(),
            vec![
                "/usr/bin/ps -u bench",
                "/usr/bin/pldd 101",
                "/usr/bin/pldd 202",
                "/usr/bin/pldd 303",
            ]
        );
    }

    #[test]
    fn test_discover_listing_failure_yields_empty_set() {
        let exec = ScriptedExecutor::new(&[("/usr/bin/ps -u bench", Err("interrupted"))]);
        let targets = discovery().discover(&exec, "bench");
        assert!(targets.is_empty());
        assert_eq!(exec.calls().len(), 1);
    }

    #[test]
    fn test_discover_probe_failure_skips_only_that_candidate() {
        let exec = ScriptedExecutor::new(&[
            ("/usr/bin/ps -u bench", Ok(LISTING)),
            ("/usr/bin/pldd 101", Err("io")),
            ("/usr/bin/pldd 202", Err("interrupted")),
            ("/usr/bin/pldd 303", Ok("303: java\n/lib/libcollector.so\n")),
        ]);

        let targets = discovery().discover(&exec, "bench");

        assert_eq!(targets.ids(), ["303"]);
        assert_eq!(exec.calls().len(), 4);
    }

    #[test]
    fn test_failed_probe_does_not_reuse_earlier_output() {
        let exec = ScriptedExecutor::new(&[
            ("/usr/bin/ps -u bench", Ok("PID CMD\n101 java\n202 java\n")),
            ("/usr/bin/pldd 101", Ok("101: java\n/lib/libcollector.so\n")),
        ]);
        let targets = discovery().discover(&exec, "bench");
        assert_eq!(targets.ids(), ["101"]);
    }

    #[test]
    fn test_target_set_display() {
        let targets: TargetSet = ["101", "202"].into_iter().collect();
        assert_eq!(targets.to_string(), "[101, 202]");
        assert_eq!(TargetSet::default().to_string(), "[]");
    }
}
