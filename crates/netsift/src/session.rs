//! Device sessions.
//!
//! `SessionProvider` is the seam between the executor and real device
//! access. The real implementation shells out to `ssh` with a control
//! master so connect, execute and disconnect map onto one multiplexed
//! connection. The fake implementation is fully scriptable and counts its
//! calls so tests can assert that rejected commands never touched it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::inventory::DeviceRecord;
use crate::parsers::{self, ParseFailure};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("command failed: {0}")]
    Command(String),
}

/// Opens sessions to devices. One session per executor call.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn connect(&self, record: &DeviceRecord)
        -> Result<Box<dyn DeviceSession>, SessionError>;
}

/// An open session to one device.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Run a command and return its raw text output.
    async fn execute(&self, command: &str) -> Result<String, SessionError>;

    /// Structured-parse raw output for this device's platform.
    fn parse(&self, command: &str, raw: &str) -> Result<Value, ParseFailure>;

    /// Release the session. Must be safe to call on every exit path.
    async fn disconnect(&mut self);
}

/// Real provider: ssh with a control-master socket per session.
pub struct SshSessionProvider {
    connect_timeout_secs: u64,
}

impl SshSessionProvider {
    pub fn new(connect_timeout_secs: u64) -> Self {
        Self {
            connect_timeout_secs,
        }
    }
}

#[async_trait]
impl SessionProvider for SshSessionProvider {
    async fn connect(
        &self,
        record: &DeviceRecord,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        let target = match &record.username {
            Some(user) => format!("{user}@{}", record.address),
            None => record.address.clone(),
        };
        let control_path = std::env::temp_dir().join(format!(
            "netsift-{}-{}.sock",
            std::process::id(),
            record.name
        ));

        debug!(device = %record.name, %target, "opening ssh control master");
        let output = Command::new("ssh")
            .arg("-o")
            .arg("ControlMaster=yes")
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .arg("-o")
            .arg("ControlPersist=60")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-p")
            .arg(record.port.to_string())
            .arg("-f")
            .arg("-N")
            .arg(&target)
            .output()
            .await
            .map_err(|e| SessionError::Connect(format!("failed to spawn ssh: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SessionError::Connect(stderr.trim().to_string()));
        }

        Ok(Box::new(SshSession {
            target,
            port: record.port,
            platform: record.platform.clone(),
            control_path,
            connected: true,
        }))
    }
}

struct SshSession {
    target: String,
    port: u16,
    platform: String,
    control_path: PathBuf,
    connected: bool,
}

impl SshSession {
    fn base_command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg(format!("ControlPath={}", self.control_path.display()))
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-p")
            .arg(self.port.to_string());
        cmd
    }
}

#[async_trait]
impl DeviceSession for SshSession {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn execute(&self, command: &str) -> Result<String, SessionError> {
        let output = self
            .base_command()
            .arg(&self.target)
            .arg(command)
            .output()
            .await
            .map_err(|e| SessionError::Command(format!("failed to spawn ssh: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SessionError::Command(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn parse(&self, command: &str, raw: &str) -> Result<Value, ParseFailure> {
        parsers::parse(&self.platform, command, raw)
    }

    async fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        // Best effort; a dead master just makes this a no-op.
        let _ = self
            .base_command()
            .arg("-O")
            .arg("exit")
            .arg(&self.target)
            .output()
            .await;
        self.connected = false;
    }
}

/// Scripted response for one (device, command) pair on the fake provider.
#[derive(Debug, Clone)]
enum FakeReply {
    Output(String),
    Error(String),
}

/// Test double for [`SessionProvider`] with scripted behavior per device.
pub struct FakeSessionProvider {
    connect_errors: HashMap<String, String>,
    responses: HashMap<(String, String), FakeReply>,
    connect_calls: Arc<Mutex<HashMap<String, usize>>>,
    execute_calls: Arc<Mutex<usize>>,
}

impl FakeSessionProvider {
    pub fn builder() -> FakeSessionProviderBuilder {
        FakeSessionProviderBuilder::default()
    }

    /// How many times `connect` was called for `device`.
    pub fn connect_count(&self, device: &str) -> usize {
        self.connect_calls
            .lock()
            .map(|counts| counts.get(device).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total `connect` calls across all devices.
    pub fn total_connects(&self) -> usize {
        self.connect_calls
            .lock()
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }

    /// Total `execute` calls across all sessions.
    pub fn total_executes(&self) -> usize {
        self.execute_calls.lock().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl SessionProvider for FakeSessionProvider {
    async fn connect(
        &self,
        record: &DeviceRecord,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        if let Ok(mut counts) = self.connect_calls.lock() {
            *counts.entry(record.name.clone()).or_insert(0) += 1;
        }
        if let Some(message) = self.connect_errors.get(&record.name) {
            return Err(SessionError::Connect(message.clone()));
        }
        Ok(Box::new(FakeSession {
            device: record.name.clone(),
            platform: record.platform.clone(),
            responses: self.responses.clone(),
            execute_calls: Arc::clone(&self.execute_calls),
            connected: true,
        }))
    }
}

struct FakeSession {
    device: String,
    platform: String,
    responses: HashMap<(String, String), FakeReply>,
    execute_calls: Arc<Mutex<usize>>,
    connected: bool,
}

#[async_trait]
impl DeviceSession for FakeSession {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn execute(&self, command: &str) -> Result<String, SessionError> {
        if let Ok(mut n) = self.execute_calls.lock() {
            *n += 1;
        }
        match self
            .responses
            .get(&(self.device.clone(), command.to_string()))
        {
            Some(FakeReply::Output(text)) => Ok(text.clone()),
            Some(FakeReply::Error(message)) => Err(SessionError::Command(message.clone())),
            None => Ok(format!("{} output from {}", command, self.device)),
        }
    }

    fn parse(&self, command: &str, raw: &str) -> Result<Value, ParseFailure> {
        parsers::parse(&self.platform, command, raw)
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }
}

#[derive(Default)]
pub struct FakeSessionProviderBuilder {
    connect_errors: HashMap<String, String>,
    responses: HashMap<(String, String), FakeReply>,
}

impl FakeSessionProviderBuilder {
    /// Make `connect` fail for `device` with `message`.
    pub fn connect_error(mut self, device: &str, message: &str) -> Self {
        self.connect_errors
            .insert(device.to_string(), message.to_string());
        self
    }

    /// Script raw output for one (device, command) pair.
    pub fn response(mut self, device: &str, command: &str, output: &str) -> Self {
        self.responses.insert(
            (device.to_string(), command.to_string()),
            FakeReply::Output(output.to_string()),
        );
        self
    }

    /// Script an execution error for one (device, command) pair.
    pub fn execute_error(mut self, device: &str, command: &str, message: &str) -> Self {
        self.responses.insert(
            (device.to_string(), command.to_string()),
            FakeReply::Error(message.to_string()),
        );
        self
    }

    pub fn build(self) -> FakeSessionProvider {
        FakeSessionProvider {
            connect_errors: self.connect_errors,
            responses: self.responses,
            connect_calls: Arc::new(Mutex::new(HashMap::new())),
            execute_calls: Arc::new(Mutex::new(0)),
        }
    }
}
