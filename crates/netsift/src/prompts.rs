//! Prompt construction for the oracle.
//!
//! The oracle only ever sees text built here. Both response schemas are
//! spelled out in the system prompts so any JSON-capable model can comply.

use netsift_common::{
    truncate_snippet, AlarmDetails, ChatRole, CommandResult, ReachabilityResult,
    SupportedCapabilities, TargetScope, UserQueryInput,
};

const RESULT_SNIPPET_LIMIT: usize = 800;

/// System prompt for the decision call: pick commands, ask the user, or
/// conclude. `capabilities` bounds what the oracle may request.
pub fn action_system_prompt(capabilities: &SupportedCapabilities) -> String {
    let commands: Vec<&str> = capabilities
        .allowed_commands
        .iter()
        .map(String::as_str)
        .collect();
    format!(
        "You are a network operations triage assistant. Decide the next step \
         for the incident described by the user.\n\
         You may ONLY request commands from this allow-list (exact strings):\n{}\n\n\
         Respond with a single JSON object:\n\
         {{\n\
         \x20 \"thought\": \"<your reasoning, optional>\",\n\
         \x20 \"commands\": [{{\"command\": \"<allow-listed command>\", \"devices\": [\"<hostname>\", ...]}}],\n\
         \x20 \"clarification\": \"<a question for the user, optional>\"\n\
         }}\n\
         Leave \"commands\" empty and set \"clarification\" when you need \
         information only the user has. An empty \"devices\" list means every \
         device in scope. Request no commands and no clarification when \
         nothing useful can be run.",
        commands
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// System prompt for the analysis call over collected evidence.
pub fn analysis_system_prompt() -> String {
    "You are a network operations triage assistant. Analyze the evidence the \
     user provides and respond with a single JSON object:\n\
     {\n\
     \x20 \"overall_assessment\": \"<one-paragraph assessment>\",\n\
     \x20 \"key_findings\": [\"...\"],\n\
     \x20 \"potential_root_causes\": [\"...\"],\n\
     \x20 \"suggested_next_steps\": [\"...\"],\n\
     \x20 \"confidence\": <number between 0 and 1, optional>,\n\
     \x20 \"reasoning\": \"<supporting reasoning, optional>\"\n\
     }\n\
     Base every finding on the evidence; say so explicitly when evidence is \
     missing or failed to collect."
        .to_string()
}

pub fn alarm_context(alarm: &AlarmDetails, scope: &TargetScope) -> String {
    let mut out = String::from("An alarm requires triage.\n\n");
    out.push_str(&format!(
        "Source: {}\nSeverity: {}\nAffected component: {}\nDescription: {}\n",
        alarm.source, alarm.severity, alarm.affected_component, alarm.description
    ));
    for (key, value) in &alarm.additional_info {
        out.push_str(&format!("{key}: {value}\n"));
    }
    out.push('\n');
    out.push_str(&scope_lines(scope));
    out
}

pub fn query_context(query: &UserQueryInput) -> String {
    let mut out = String::new();
    if !query.chat_history.is_empty() {
        out.push_str("Prior conversation:\n");
        for message in &query.chat_history {
            let speaker = match message.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
                ChatRole::System => "system",
            };
            out.push_str(&format!("[{speaker}] {}\n", message.content));
        }
        out.push('\n');
    }
    for upload in &query.file_uploads {
        out.push_str(&format!(
            "Attached file '{}':\n{}\n\n",
            upload.filename,
            truncate_snippet(&upload.content, RESULT_SNIPPET_LIMIT)
        ));
    }
    out.push_str(&format!("User question: {}\n\n", query.query_text));
    out.push_str(&scope_lines(&query.target_scope));
    out
}

/// Summarize collected evidence for the analysis call. Outputs are
/// truncated; the full text lives in the report, not the prompt.
pub fn results_context(
    task: &str,
    results: &[CommandResult],
    probes: &[ReachabilityResult],
) -> String {
    let mut out = format!("Original task:\n{task}\n\nCollected evidence:\n");
    if results.is_empty() {
        out.push_str("(no command results were collected)\n");
    }
    for result in results {
        out.push_str(&format!(
            "\n--- `{}` on {} ---\n",
            result.command, result.device_hostname
        ));
        if let Some(error) = &result.error {
            out.push_str(&format!("error: {error}\n"));
        }
        if let Some(parsed) = &result.parsed_output {
            out.push_str(&format!(
                "parsed: {}\n",
                truncate_snippet(&parsed.to_string(), RESULT_SNIPPET_LIMIT)
            ));
        } else if let Some(raw) = &result.raw_output {
            out.push_str(&format!("raw: {}\n", truncate_snippet(raw, RESULT_SNIPPET_LIMIT)));
        }
    }
    if !probes.is_empty() {
        out.push_str("\nReachability probes:\n");
        for probe in probes {
            out.push_str(&format!(
                "- {} {}: {}\n",
                probe.probe.as_str(),
                probe.target,
                if probe.success { "passed" } else { "failed" }
            ));
        }
    }
    out
}

fn scope_lines(scope: &TargetScope) -> String {
    if scope.is_empty() {
        return "Target scope: unknown. Name devices explicitly or ask the user.\n".to_string();
    }
    let mut out = String::from("Target scope:\n");
    if !scope.device_hostnames.is_empty() {
        out.push_str(&format!("- devices: {}\n", scope.device_hostnames.join(", ")));
    }
    if let Some(region) = &scope.region {
        out.push_str(&format!("- region: {region}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsift_common::ChatMessage;
    use std::collections::BTreeMap;

    #[test]
    fn action_prompt_lists_the_allowlist() {
        let caps = SupportedCapabilities {
            allowed_commands: vec!["show version".into(), "show ip route".into()],
            reachability_probes: true,
        };
        let prompt = action_system_prompt(&caps);
        assert!(prompt.contains("- show version"));
        assert!(prompt.contains("- show ip route"));
        assert!(prompt.contains("\"clarification\""));
    }

    #[test]
    fn alarm_context_carries_all_fields_and_scope() {
        let alarm = AlarmDetails {
            source: "snmp".into(),
            severity: "major".into(),
            affected_component: "R1".into(),
            description: "bgp neighbor down".into(),
            additional_info: BTreeMap::from([("vrf".to_string(), serde_json::json!("CORE"))]),
        };
        let scope = TargetScope {
            device_hostnames: vec!["R1".into()],
            region: Some("emea".into()),
        };
        let ctx = alarm_context(&alarm, &scope);
        assert!(ctx.contains("bgp neighbor down"));
        assert!(ctx.contains("vrf: \"CORE\""));
        assert!(ctx.contains("devices: R1"));
        assert!(ctx.contains("region: emea"));
    }

    #[test]
    fn query_context_includes_history_and_uploads() {
        let query = UserQueryInput {
            query_text: "why is R1 slow?".into(),
            chat_history: vec![ChatMessage {
                role: ChatRole::User,
                content: "earlier message".into(),
            }],
            file_uploads: vec![netsift_common::FileUpload {
                filename: "syslog.txt".into(),
                content: "x".repeat(2000),
            }],
            target_scope: TargetScope::default(),
        };
        let ctx = query_context(&query);
        assert!(ctx.contains("[user] earlier message"));
        assert!(ctx.contains("syslog.txt"));
        assert!(ctx.contains("(truncated)"));
        assert!(ctx.contains("Target scope: unknown"));
    }

    #[test]
    fn results_context_prefers_parsed_over_raw() {
        let results = vec![netsift_common::CommandResult::parsed(
            "R1",
            "show version",
            "raw text".into(),
            serde_json::json!({"version": "17.1"}),
        )];
        let ctx = results_context("task", &results, &[]);
        assert!(ctx.contains("parsed: {\"version\":\"17.1\"}"));
        assert!(!ctx.contains("raw text"));
    }
}
