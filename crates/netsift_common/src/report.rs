//! Report assembly and Markdown rendering.
//!
//! `assemble_report` is the single place a [`TroubleshootingReport`] is
//! built, so the derived fields (notably `devices_investigated`) cannot
//! drift from the result lists. Rendering is a consumer concern; the
//! orchestration core never calls it.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::models::{
    AnalysisResult, CommandResult, OriginalRequest, ReachabilityResult, TargetScope,
    TroubleshootingReport,
};

const SNIPPET_LIMIT: usize = 1000;

/// Build a report from a finished run.
///
/// `devices_investigated` is derived here: the sorted, de-duplicated
/// hostnames appearing in `command_results`, regardless of outcome.
pub fn assemble_report(
    request: OriginalRequest,
    target_scope: TargetScope,
    investigation_summary: String,
    command_results: Vec<CommandResult>,
    reachability_results: Vec<ReachabilityResult>,
    analysis: Option<AnalysisResult>,
) -> TroubleshootingReport {
    let devices_investigated: Vec<String> = command_results
        .iter()
        .map(|r| r.device_hostname.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    TroubleshootingReport {
        request,
        target_scope,
        investigation_summary,
        devices_investigated,
        command_results,
        reachability_results,
        analysis,
        generated_at: Utc::now(),
    }
}

/// Render a report as Markdown for human consumption.
pub fn render_markdown(report: &TroubleshootingReport) -> String {
    let mut out = String::new();

    out.push_str("# Troubleshooting Report\n\n");
    out.push_str(&format!(
        "_Generated: {}_\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    out.push_str("## Original Request\n\n");
    match &report.request {
        OriginalRequest::Alarm(alarm) => {
            out.push_str(&format!(
                "**Alarm** from `{}` (severity: {})\n\n- Component: {}\n- Description: {}\n",
                alarm.source, alarm.severity, alarm.affected_component, alarm.description
            ));
            for (key, value) in &alarm.additional_info {
                out.push_str(&format!("- {key}: {value}\n"));
            }
        }
        OriginalRequest::UserQuery(query) => {
            out.push_str(&format!("**User query:** {}\n", query.query_text));
            if !query.file_uploads.is_empty() {
                let names: Vec<&str> = query
                    .file_uploads
                    .iter()
                    .map(|f| f.filename.as_str())
                    .collect();
                out.push_str(&format!("- Attachments: {}\n", names.join(", ")));
            }
        }
    }
    out.push('\n');

    out.push_str("## Target Scope\n\n");
    if report.target_scope.is_empty() {
        out.push_str("_No explicit scope provided._\n");
    } else {
        if !report.target_scope.device_hostnames.is_empty() {
            out.push_str(&format!(
                "- Devices: {}\n",
                report.target_scope.device_hostnames.join(", ")
            ));
        }
        if let Some(region) = &report.target_scope.region {
            out.push_str(&format!("- Region: {region}\n"));
        }
    }
    out.push('\n');

    out.push_str("## Investigation Summary\n\n");
    out.push_str(&report.investigation_summary);
    out.push_str("\n\n");

    out.push_str("## Devices Investigated\n\n");
    if report.devices_investigated.is_empty() {
        out.push_str("_None._\n");
    } else {
        for device in &report.devices_investigated {
            out.push_str(&format!("- {device}\n"));
        }
    }
    out.push('\n');

    if !report.reachability_results.is_empty() {
        out.push_str("## Reachability Tests\n\n");
        for probe in &report.reachability_results {
            let verdict = if probe.success { "passed" } else { "failed" };
            out.push_str(&format!(
                "- {} `{}`: {}\n",
                probe.probe.as_str(),
                probe.target,
                verdict
            ));
            for (key, value) in &probe.details {
                out.push_str(&format!("  - {key}: {value}\n"));
            }
        }
        out.push('\n');
    }

    out.push_str("## Command Results\n\n");
    if report.command_results.is_empty() {
        out.push_str("_No commands were executed._\n\n");
    }
    for result in &report.command_results {
        out.push_str(&format!(
            "### `{}` on {}\n\n",
            result.command, result.device_hostname
        ));
        if let Some(error) = &result.error {
            out.push_str(&format!("**Error:** {error}\n\n"));
        }
        if let Some(parsed) = &result.parsed_output {
            let pretty =
                serde_json::to_string_pretty(parsed).unwrap_or_else(|_| parsed.to_string());
            out.push_str(&format!(
                "```json\n{}\n```\n\n",
                truncate_snippet(&pretty, SNIPPET_LIMIT)
            ));
        } else if let Some(raw) = &result.raw_output {
            out.push_str(&format!("```\n{}\n```\n\n", truncate_snippet(raw, SNIPPET_LIMIT)));
        }
    }

    out.push_str("## Analysis & Recommendations\n\n");
    match &report.analysis {
        None => out.push_str("_No analysis was produced._\n"),
        Some(analysis) => {
            out.push_str(&format!("**Assessment:** {}\n\n", analysis.overall_assessment));
            if let Some(confidence) = analysis.confidence {
                out.push_str(&format!(
                    "**Confidence:** {:.0}%\n\n",
                    confidence.clamp(0.0, 1.0) * 100.0
                ));
            }
            push_list(&mut out, "Key Findings", &analysis.key_findings);
            push_list(&mut out, "Potential Root Causes", &analysis.potential_root_causes);
            push_list(&mut out, "Suggested Next Steps", &analysis.suggested_next_steps);
            if let Some(reasoning) = &analysis.reasoning {
                out.push_str(&format!(
                    "**Reasoning:** {}\n",
                    truncate_snippet(reasoning, SNIPPET_LIMIT)
                ));
            }
        }
    }

    out
}

fn push_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("**{title}:**\n\n"));
    for item in items {
        out.push_str(&format!("- {item}\n"));
    }
    out.push('\n');
}

/// Cut `text` to at most `limit` bytes on a char boundary, marking the cut.
pub fn truncate_snippet(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlarmDetails, ProbeKind};
    use std::collections::BTreeMap;

    fn alarm_request() -> OriginalRequest {
        OriginalRequest::Alarm(AlarmDetails {
            source: "snmp-trap".into(),
            severity: "critical".into(),
            affected_component: "R1".into(),
            description: "GigabitEthernet0/1 down".into(),
            additional_info: BTreeMap::new(),
        })
    }

    #[test]
    fn devices_investigated_is_sorted_and_unique() {
        let results = vec![
            CommandResult::failed("R2", "show version", "unreachable".into()),
            CommandResult::parsed("R1", "show version", "v".into(), serde_json::json!({})),
            CommandResult::failed("R2", "show ip route", "unreachable".into()),
        ];
        let report = assemble_report(
            alarm_request(),
            TargetScope::default(),
            "summary".into(),
            results,
            vec![],
            None,
        );
        assert_eq!(report.devices_investigated, vec!["R1", "R2"]);
    }

    #[test]
    fn no_results_means_no_devices() {
        let report = assemble_report(
            alarm_request(),
            TargetScope::default(),
            "summary".into(),
            vec![],
            vec![],
            None,
        );
        assert!(report.devices_investigated.is_empty());
    }

    #[test]
    fn markdown_carries_every_section() {
        let report = assemble_report(
            alarm_request(),
            TargetScope {
                device_hostnames: vec!["R1".into()],
                region: None,
            },
            "Asked oracle; ran 1 command.".into(),
            vec![CommandResult::raw_only(
                "R1",
                "show logging",
                "log line".into(),
                "parse failed: 'show logging' produced no parseable output".into(),
            )],
            vec![ReachabilityResult {
                probe: ProbeKind::Ping,
                target: "10.0.0.1".into(),
                success: false,
                details: BTreeMap::new(),
            }],
            Some(AnalysisResult {
                overall_assessment: "Interface down".into(),
                key_findings: vec!["no carrier".into()],
                confidence: Some(0.8),
                ..AnalysisResult::default()
            }),
        );

        let md = render_markdown(&report);
        assert!(md.contains("## Original Request"));
        assert!(md.contains("## Target Scope"));
        assert!(md.contains("## Investigation Summary"));
        assert!(md.contains("## Devices Investigated"));
        assert!(md.contains("## Reachability Tests"));
        assert!(md.contains("## Command Results"));
        assert!(md.contains("## Analysis & Recommendations"));
        assert!(md.contains("**Confidence:** 80%"));
        assert!(md.contains("ping `10.0.0.1`: failed"));
    }

    #[test]
    fn long_output_is_truncated() {
        let long = "x".repeat(5000);
        let report = assemble_report(
            alarm_request(),
            TargetScope::default(),
            "s".into(),
            vec![CommandResult::raw_only("R1", "show run", long, "e".into())],
            vec![],
            None,
        );
        let md = render_markdown(&report);
        assert!(md.contains("... (truncated)"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(600);
        let cut = truncate_snippet(&text, 1001);
        assert!(cut.ends_with("... (truncated)"));
        assert!(cut.starts_with('é'));
        assert!(cut.len() < text.len());
    }
}
