//! The decision oracle.
//!
//! One trait, one method per response schema. The HTTP implementation
//! talks to any OpenAI-compatible chat-completions endpoint and forces
//! JSON output; a salvage pass recovers the JSON object when the model
//! wraps it in prose anyway. No streaming, no partial results: a call
//! either yields a fully decoded value or an [`OracleError`].

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use netsift_common::{ActionRequest, AnalysisResult, OracleError, OracleSettings};

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Ask what to do about the situation described in `context`.
    async fn propose_action(
        &self,
        system: &str,
        context: &str,
    ) -> Result<ActionRequest, OracleError>;

    /// Ask for an assessment of collected evidence.
    async fn analyze(&self, system: &str, context: &str) -> Result<AnalysisResult, OracleError>;
}

/// Real oracle backed by an OpenAI-compatible chat-completions API.
pub struct HttpOracle {
    client: reqwest::Client,
    settings: OracleSettings,
}

impl HttpOracle {
    pub fn new(settings: OracleSettings) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.effective_timeout_secs()))
            .build()
            .map_err(|e| OracleError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    async fn ask<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<T, OracleError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.settings.model,
            "temperature": self.settings.effective_temperature(),
            "max_tokens": self.settings.max_tokens,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        debug!(model = %self.settings.model, "calling oracle");
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = self.settings.api_key() {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(OracleError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: Value = serde_json::from_str(&text)
            .map_err(|e| OracleError::Decode(format!("invalid response envelope: {e}")))?;
        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| OracleError::Decode("response carried no message content".into()))?;

        decode_content(content)
    }
}

/// Decode the model's message content as `T`, salvaging the first JSON
/// object when the model wrapped it in prose or code fences.
fn decode_content<T: DeserializeOwned>(content: &str) -> Result<T, OracleError> {
    if let Ok(value) = serde_json::from_str::<T>(content) {
        return Ok(value);
    }
    let salvaged = extract_json(content)
        .ok_or_else(|| OracleError::Decode(format!("no JSON object in: {content}")))?;
    serde_json::from_str::<T>(salvaged).map_err(|e| {
        warn!(error = %e, "oracle output failed schema decode");
        OracleError::Decode(e.to_string())
    })
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn propose_action(
        &self,
        system: &str,
        context: &str,
    ) -> Result<ActionRequest, OracleError> {
        self.ask(system, context).await
    }

    async fn analyze(&self, system: &str, context: &str) -> Result<AnalysisResult, OracleError> {
        self.ask(system, context).await
    }
}

/// Scripted oracle for tests: queued responses plus call counts.
#[derive(Default)]
pub struct FakeOracle {
    actions: Mutex<VecDeque<Result<ActionRequest, OracleError>>>,
    analyses: Mutex<VecDeque<Result<AnalysisResult, OracleError>>>,
    action_calls: Mutex<usize>,
    analysis_calls: Mutex<usize>,
}

impl FakeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_action(&self, action: ActionRequest) {
        if let Ok(mut q) = self.actions.lock() {
            q.push_back(Ok(action));
        }
    }

    pub fn queue_action_error(&self, error: OracleError) {
        if let Ok(mut q) = self.actions.lock() {
            q.push_back(Err(error));
        }
    }

    pub fn queue_analysis(&self, analysis: AnalysisResult) {
        if let Ok(mut q) = self.analyses.lock() {
            q.push_back(Ok(analysis));
        }
    }

    pub fn queue_analysis_error(&self, error: OracleError) {
        if let Ok(mut q) = self.analyses.lock() {
            q.push_back(Err(error));
        }
    }

    pub fn action_calls(&self) -> usize {
        self.action_calls.lock().map(|n| *n).unwrap_or(0)
    }

    pub fn analysis_calls(&self) -> usize {
        self.analysis_calls.lock().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl Oracle for FakeOracle {
    async fn propose_action(
        &self,
        _system: &str,
        _context: &str,
    ) -> Result<ActionRequest, OracleError> {
        if let Ok(mut n) = self.action_calls.lock() {
            *n += 1;
        }
        self.actions
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| {
                Err(OracleError::Decode(
                    "fake oracle has no scripted action".into(),
                ))
            })
    }

    async fn analyze(&self, _system: &str, _context: &str) -> Result<AnalysisResult, OracleError> {
        if let Ok(mut n) = self.analysis_calls.lock() {
            *n += 1;
        }
        self.analyses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| {
                Err(OracleError::Decode(
                    "fake oracle has no scripted analysis".into(),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_oracle_builds_with_default_settings() {
        assert!(HttpOracle::new(OracleSettings::default()).is_ok());
    }

    #[test]
    fn extract_json_finds_the_object() {
        assert_eq!(
            extract_json("Here you go:\n```json\n{\"a\": 1}\n```"),
            Some("{\"a\": 1}")
        );
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} reversed {"), None);
    }

    #[test]
    fn decode_content_handles_clean_and_wrapped_json() {
        let clean: ActionRequest =
            decode_content(r#"{"commands": [{"command": "show version"}]}"#).unwrap();
        assert_eq!(clean.commands.len(), 1);

        let wrapped: ActionRequest =
            decode_content("Sure!\n{\"clarification\": \"which device?\"}\nHope that helps.")
                .unwrap();
        assert_eq!(wrapped.clarification.as_deref(), Some("which device?"));

        let err = decode_content::<ActionRequest>("I cannot answer that.").unwrap_err();
        assert!(matches!(err, OracleError::Decode(_)));
    }

    #[tokio::test]
    async fn fake_replays_in_order_and_counts_calls() {
        let fake = FakeOracle::new();
        fake.queue_action(ActionRequest {
            clarification: Some("first".into()),
            ..ActionRequest::default()
        });
        fake.queue_action_error(OracleError::Transport("down".into()));

        let first = fake.propose_action("s", "c").await.unwrap();
        assert_eq!(first.clarification.as_deref(), Some("first"));
        assert!(fake.propose_action("s", "c").await.is_err());
        // unscripted call fails loudly
        assert!(fake.propose_action("s", "c").await.is_err());
        assert_eq!(fake.action_calls(), 3);
        assert_eq!(fake.analysis_calls(), 0);
    }
}
