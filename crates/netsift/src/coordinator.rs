//! Fan-out coordinator: one command across many devices.
//!
//! Normalizes and authorizes the command once, then runs the executor per
//! device. Devices are fully isolated from each other: a failure on one is
//! recorded in its own result and the loop continues. Results are keyed by
//! `device_hostname`, never by position.

use tracing::info;

use netsift_common::{normalize_command, CommandResult, ExecFailure, ReachabilityResult};

use crate::executor::CommandExecutor;

pub struct CommandCoordinator {
    executor: CommandExecutor,
}

impl CommandCoordinator {
    pub fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Run `command` on each named device. De-duplicating devices is the
    /// caller's job; duplicates here produce duplicate results.
    pub async fn execute(
        &self,
        devices: &[String],
        command: &str,
    ) -> (Vec<CommandResult>, Vec<ReachabilityResult>) {
        let command = normalize_command(command);

        // One authorization check up front; a rejected command produces an
        // error result per device with zero device contact.
        if !self.executor.allowlist().is_allowed(&command) {
            let failure = ExecFailure::NotAllowed(command.clone()).to_string();
            let results = devices
                .iter()
                .map(|device| CommandResult::failed(device, &command, failure.clone()))
                .collect();
            return (results, vec![]);
        }

        info!(%command, devices = devices.len(), "fanning out command");
        let mut results = Vec::with_capacity(devices.len());
        let mut probes = Vec::new();
        for device in devices {
            let (result, mut device_probes) = self.executor.run(device, &command).await;
            results.push(result);
            probes.append(&mut device_probes);
        }
        (results, probes)
    }
}
