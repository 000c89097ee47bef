//! Command executor: one command on one device.
//!
//! The executor owns the full per-device lifecycle: authorization gate,
//! inventory resolution, session open, parse-preferring execution, session
//! release, and fallback diagnostics on connection failure. Every failure
//! is rendered into the returned `CommandResult`; nothing here returns an
//! error to the caller.

use std::sync::Arc;

use tracing::{debug, warn};

use netsift_common::{
    normalize_command, CommandAllowlist, CommandResult, ExecFailure, ReachabilityResult,
};

use crate::diagnostics;
use crate::inventory::Testbed;
use crate::parsers::ParseFailure;
use crate::session::{DeviceSession, SessionProvider};

pub struct CommandExecutor {
    provider: Arc<dyn SessionProvider>,
    testbed: Arc<Testbed>,
    allowlist: CommandAllowlist,
    diagnostics_enabled: bool,
}

impl CommandExecutor {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        testbed: Arc<Testbed>,
        allowlist: CommandAllowlist,
        diagnostics_enabled: bool,
    ) -> Self {
        Self {
            provider,
            testbed,
            allowlist,
            diagnostics_enabled,
        }
    }

    pub fn allowlist(&self) -> &CommandAllowlist {
        &self.allowlist
    }

    /// Run `command` on `device`. Always returns a result; reachability
    /// probes are non-empty only after a connection failure with
    /// diagnostics enabled.
    pub async fn run(
        &self,
        device: &str,
        command: &str,
    ) -> (CommandResult, Vec<ReachabilityResult>) {
        let command = normalize_command(command);

        // Authorization gate. Rejection means zero session activity.
        if !self.allowlist.is_allowed(&command) {
            warn!(%device, %command, "rejected non-allow-listed command");
            let failure = ExecFailure::NotAllowed(command.clone());
            return (
                CommandResult::failed(device, &command, failure.to_string()),
                vec![],
            );
        }

        let record = match self.testbed.resolve(device) {
            Some(record) => record.clone(),
            None => {
                let failure = ExecFailure::UnknownDevice(device.to_string());
                return (
                    CommandResult::failed(device, &command, failure.to_string()),
                    vec![],
                );
            }
        };

        let mut session = match self.provider.connect(&record).await {
            Ok(session) => session,
            Err(e) => {
                warn!(%device, error = %e, "connection failed");
                let mut message = ExecFailure::Connection(e.to_string()).to_string();
                let probes = if self.diagnostics_enabled {
                    diagnostics::run_connection_diagnostics(&record).await
                } else {
                    vec![]
                };
                if !probes.is_empty() {
                    message.push_str(&format!("; reachability: {}", probe_summary(&probes)));
                }
                return (CommandResult::failed(device, &command, message), probes);
            }
        };

        let result = self.run_on_session(session.as_ref(), device, &command).await;
        session.disconnect().await;
        (result, vec![])
    }

    async fn run_on_session(
        &self,
        session: &dyn DeviceSession,
        device: &str,
        command: &str,
    ) -> CommandResult {
        if !session.is_connected() {
            let failure = ExecFailure::Unexpected("session reported disconnected".to_string());
            return CommandResult::failed(device, command, failure.to_string());
        }

        debug!(%device, %command, "executing");
        let raw = match session.execute(command).await {
            Ok(raw) => raw,
            Err(e) => {
                let failure = ExecFailure::Execution(e.to_string());
                return CommandResult::failed(device, command, failure.to_string());
            }
        };

        match session.parse(command, &raw) {
            Ok(parsed) => CommandResult::parsed(device, command, raw, parsed),
            Err(failure) => {
                let message = match failure {
                    ParseFailure::Empty => ExecFailure::ParseEmpty {
                        command: command.to_string(),
                    }
                    .to_string(),
                    ParseFailure::Unsupported { platform } => ExecFailure::ParserUnsupported {
                        command: command.to_string(),
                        platform,
                    }
                    .to_string(),
                    other => format!("parse failed: {other}"),
                };
                debug!(%device, %command, %message, "keeping raw output");
                CommandResult::raw_only(device, command, raw, message)
            }
        }
    }
}

fn probe_summary(probes: &[ReachabilityResult]) -> String {
    probes
        .iter()
        .map(|p| {
            format!(
                "{}={}",
                p.probe.as_str(),
                if p.success { "ok" } else { "failed" }
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::DeviceRecord;
    use crate::parsers::SAMPLE_SHOW_VERSION;
    use crate::session::FakeSessionProvider;

    fn testbed() -> Arc<Testbed> {
        Arc::new(Testbed::from_devices(vec![
            DeviceRecord {
                name: "R1".to_string(),
                address: "192.0.2.1".to_string(),
                platform: "iosxe".to_string(),
                username: None,
                port: 22,
            },
            DeviceRecord {
                name: "edge-router-2".to_string(),
                address: "192.0.2.2".to_string(),
                platform: "iosxe".to_string(),
                username: None,
                port: 22,
            },
        ]))
    }

    fn allowlist() -> CommandAllowlist {
        CommandAllowlist::from_commands(["show version", "show logging"])
    }

    fn executor(provider: Arc<FakeSessionProvider>, diagnostics: bool) -> CommandExecutor {
        CommandExecutor::new(provider, testbed(), allowlist(), diagnostics)
    }

    #[tokio::test]
    async fn rejected_command_never_opens_a_session() {
        let provider = Arc::new(FakeSessionProvider::builder().build());
        let exec = executor(Arc::clone(&provider), true);

        let (result, probes) = exec.run("R1", "reload").await;
        assert!(result.error.as_deref().unwrap().contains("not allowed"));
        assert!(result.raw_output.is_none());
        assert!(probes.is_empty());
        assert_eq!(provider.total_connects(), 0);
    }

    #[tokio::test]
    async fn unknown_device_is_an_error_result() {
        let provider = Arc::new(FakeSessionProvider::builder().build());
        let exec = executor(Arc::clone(&provider), true);

        let (result, probes) = exec.run("R99", "show version").await;
        assert!(result.error.as_deref().unwrap().contains("unknown device"));
        assert!(probes.is_empty());
        assert_eq!(provider.total_connects(), 0);
    }

    #[tokio::test]
    async fn successful_parse_clears_error_and_keeps_raw() {
        let provider = Arc::new(
            FakeSessionProvider::builder()
                .response("R1", "show version", SAMPLE_SHOW_VERSION)
                .build(),
        );
        let exec = executor(Arc::clone(&provider), true);

        let (result, probes) = exec.run("R1", "  show   version ").await;
        assert!(result.error.is_none());
        assert_eq!(result.command, "show version");
        assert_eq!(result.parsed_output.as_ref().unwrap()["version"], "17.09.04a");
        assert!(result.raw_output.is_some());
        assert!(probes.is_empty());
        assert_eq!(provider.connect_count("R1"), 1);
    }

    #[tokio::test]
    async fn parse_failure_keeps_raw_and_records_error() {
        let provider = Arc::new(
            FakeSessionProvider::builder()
                .response("R1", "show logging", "some log line")
                .build(),
        );
        let exec = executor(provider, false);

        let (result, _) = exec.run("R1", "show logging").await;
        assert_eq!(result.raw_output.as_deref(), Some("some log line"));
        assert!(result.parsed_output.is_none());
        assert!(result.error.as_deref().unwrap().contains("no parser"));
    }

    #[tokio::test]
    async fn execution_error_is_data() {
        let provider = Arc::new(
            FakeSessionProvider::builder()
                .execute_error("R1", "show version", "authorization denied")
                .build(),
        );
        let exec = executor(provider, true);

        let (result, probes) = exec.run("R1", "show version").await;
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("authorization denied"));
        // post-connection failure: no diagnostics
        assert!(probes.is_empty());
    }

    #[tokio::test]
    async fn connect_failure_with_diagnostics_runs_both_probes() {
        let provider = Arc::new(
            FakeSessionProvider::builder()
                .connect_error("edge-router-2", "host unreachable")
                .build(),
        );
        let exec = executor(provider, true);

        let (result, probes) = exec.run("edge-router-2", "show version").await;
        let error = result.error.as_deref().unwrap();
        assert!(error.contains("connection failed"));
        // logical name: ping + dns
        assert_eq!(probes.len(), 2);
        assert!(error.contains("ping="));
        assert!(error.contains("dns-resolution="));
    }

    #[tokio::test]
    async fn connect_failure_without_diagnostics_runs_no_probes() {
        let provider = Arc::new(
            FakeSessionProvider::builder()
                .connect_error("R1", "host unreachable")
                .build(),
        );
        let exec = executor(provider, false);

        let (result, probes) = exec.run("R1", "show version").await;
        assert!(result.error.as_deref().unwrap().contains("connection failed"));
        assert!(probes.is_empty());
        assert!(!result.error.as_deref().unwrap().contains("reachability"));
    }
}
