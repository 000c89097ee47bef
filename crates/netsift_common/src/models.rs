//! Value records that flow through a triage run.
//!
//! These are created at the start of a run, threaded through the executor,
//! coordinator and oracle, and consumed when the terminal outcome is built.
//! Nothing here outlives a run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which devices a run is allowed to touch.
///
/// An empty hostname list with no region means "scope unknown"; the oracle
/// is told so and must either name devices explicitly or ask the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetScope {
    #[serde(default)]
    pub device_hostnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl TargetScope {
    pub fn is_empty(&self) -> bool {
        self.device_hostnames.is_empty() && self.region.is_none()
    }
}

/// An alarm as received from a monitoring system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDetails {
    pub source: String,
    pub severity: String,
    pub affected_component: String,
    pub description: String,
    /// Free-form extra fields forwarded verbatim from the alarm source.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_info: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// One turn of prior conversation attached to a user query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// A file the user attached to a query. Content is carried inline as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUpload {
    pub filename: String,
    pub content: String,
}

/// A free-form user question, optionally with history, uploads and a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQueryInput {
    pub query_text: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    pub file_uploads: Vec<FileUpload>,
    #[serde(default)]
    pub target_scope: TargetScope,
}

/// One command the oracle wants run, optionally narrowed to a device subset.
///
/// An empty `devices` list means "every device in the run's target scope".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub devices: Vec<String>,
}

/// The oracle's decision about what to do next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// The oracle's stated reasoning for this decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandRequest>,
    /// A question the oracle wants the user to answer before proceeding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification: Option<String>,
}

/// A borrowed view of an [`ActionRequest`] classified into exactly one of
/// the three actions the engine knows how to take.
///
/// Precedence: commands win over a clarification, which wins over a bare
/// thought. A clarification that arrives alongside commands is still
/// visible to the caller on the original request.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleAction<'a> {
    RequestCommands(&'a [CommandRequest]),
    Clarify(&'a str),
    Conclude(Option<&'a str>),
}

impl ActionRequest {
    pub fn classify(&self) -> OracleAction<'_> {
        if !self.commands.is_empty() {
            return OracleAction::RequestCommands(&self.commands);
        }
        if let Some(q) = self.clarification.as_deref() {
            if !q.trim().is_empty() {
                return OracleAction::Clarify(q);
            }
        }
        OracleAction::Conclude(self.thought.as_deref())
    }
}

/// The outcome of running one command on one device.
///
/// Failures are carried here as data; nothing past the executor throws for
/// a per-device problem. `error` and `parsed_output` are mutually
/// exclusive, which the constructors enforce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub device_hostname: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    /// Structured parse succeeded. Raw text is kept for audit.
    pub fn parsed(device: &str, command: &str, raw: String, parsed: Value) -> Self {
        Self {
            device_hostname: device.to_string(),
            command: command.to_string(),
            raw_output: Some(raw),
            parsed_output: Some(parsed),
            error: None,
        }
    }

    /// Execution succeeded but the output could not be parsed; the parse
    /// failure is recorded and the raw text retained.
    pub fn raw_only(device: &str, command: &str, raw: String, parse_error: String) -> Self {
        Self {
            device_hostname: device.to_string(),
            command: command.to_string(),
            raw_output: Some(raw),
            parsed_output: None,
            error: Some(parse_error),
        }
    }

    /// The command never produced output (rejected, unreachable, failed).
    pub fn failed(device: &str, command: &str, error: String) -> Self {
        Self {
            device_hostname: device.to_string(),
            command: command.to_string(),
            raw_output: None,
            parsed_output: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The kind of reachability probe that produced a [`ReachabilityResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Ping,
    DnsResolution,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Ping => "ping",
            ProbeKind::DnsResolution => "dns-resolution",
        }
    }
}

/// One fallback diagnostic probe outcome, recorded whether it passed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachabilityResult {
    pub probe: ProbeKind,
    pub target: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

/// The oracle's assessment after seeing collected evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub overall_assessment: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub potential_root_causes: Vec<String>,
    #[serde(default)]
    pub suggested_next_steps: Vec<String>,
    /// Oracle-reported confidence in [0, 1], when it offered one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Snapshot of what started a run, kept verbatim in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request_type", content = "original_request")]
pub enum OriginalRequest {
    Alarm(AlarmDetails),
    UserQuery(UserQueryInput),
}

/// The full terminal artifact of a completed investigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TroubleshootingReport {
    #[serde(flatten)]
    pub request: OriginalRequest,
    pub target_scope: TargetScope,
    /// Narrative of what the run did, one line per notable step.
    pub investigation_summary: String,
    /// Sorted, de-duplicated hostnames taken from the command results.
    pub devices_investigated: Vec<String>,
    #[serde(default)]
    pub command_results: Vec<CommandResult>,
    #[serde(default)]
    pub reachability_results: Vec<ReachabilityResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    pub generated_at: DateTime<Utc>,
}

/// A short answer sent back instead of a report when the run cannot (or
/// need not) investigate: a clarifying question, a direct reply, or an
/// explanation of why investigation is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterimReply {
    pub message: String,
}

impl InterimReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What a user-query run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Report(Box<TroubleshootingReport>),
    Reply(InterimReply),
}

/// What this service can do, for clients and for the oracle prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedCapabilities {
    pub allowed_commands: Vec<String>,
    pub reachability_probes: bool,
}
