//! Triage orchestration engine.
//!
//! One invocation drives one run through the state machine: ask the oracle
//! what to do, execute what it asked for, ask it what the evidence means,
//! and build exactly one terminal outcome. The two entry points differ in
//! how failure surfaces: `process_alarm` always produces a report (oracle
//! failures degrade into a synthesized analysis), while
//! `process_user_query` may answer with an interim reply instead.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use netsift_common::{
    assemble_report, ActionRequest, AlarmDetails, AnalysisResult, CommandAllowlist, CommandResult,
    InterimReply, OracleAction, OriginalRequest, Outcome, ReachabilityResult,
    SupportedCapabilities, TargetScope, TroubleshootingReport, UserQueryInput,
};

use crate::coordinator::CommandCoordinator;
use crate::oracle::Oracle;
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    AwaitingAction,
    ExecutingCommands,
    AwaitingAnalysis,
    Terminal,
}

pub struct TriageEngine {
    oracle: Arc<dyn Oracle>,
    coordinator: Option<CommandCoordinator>,
    allowlist: CommandAllowlist,
    reachability_probes: bool,
}

/// A command with its final device set, after filtering and de-duplication.
struct PlannedCommand {
    command: String,
    devices: Vec<String>,
}

impl TriageEngine {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        coordinator: Option<CommandCoordinator>,
        allowlist: CommandAllowlist,
        reachability_probes: bool,
    ) -> Self {
        Self {
            oracle,
            coordinator,
            allowlist,
            reachability_probes,
        }
    }

    pub fn capabilities(&self) -> SupportedCapabilities {
        SupportedCapabilities {
            allowed_commands: self.allowlist.commands().map(String::from).collect(),
            reachability_probes: self.reachability_probes,
        }
    }

    fn transition(&self, from: RunState, to: RunState) -> RunState {
        debug!(?from, ?to, "state transition");
        to
    }

    /// Triage an alarm. Never fails: every oracle problem is absorbed into
    /// a degraded analysis so the report always exists.
    pub async fn process_alarm(
        &self,
        alarm: AlarmDetails,
        scope: TargetScope,
    ) -> TroubleshootingReport {
        let mut state = RunState::AwaitingAction;
        let mut narrative: Vec<String> = Vec::new();

        let system = prompts::action_system_prompt(&self.capabilities());
        let context = prompts::alarm_context(&alarm, &scope);

        let action = match self.oracle.propose_action(&system, &context).await {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, "oracle decision failed, degrading");
                narrative.push(format!("Oracle decision unavailable: {e}."));
                let analysis = degraded_analysis(&alarm, &e.to_string());
                return assemble_report(
                    OriginalRequest::Alarm(alarm),
                    scope,
                    narrative.join("\n"),
                    vec![],
                    vec![],
                    Some(analysis),
                );
            }
        };
        narrative.push(describe_action(&action));
        if !action.commands.is_empty() {
            if let Some(question) = &action.clarification {
                narrative.push(format!(
                    "Oracle also asked \"{question}\"; proceeding with commands first."
                ));
            }
        }

        let clarification = action.clarification.clone();
        let planned = self.plan_commands(&action, &scope, &mut narrative);

        let mut results: Vec<CommandResult> = Vec::new();
        let mut probes: Vec<ReachabilityResult> = Vec::new();
        if !planned.is_empty() {
            match &self.coordinator {
                Some(coordinator) => {
                    state = self.transition(state, RunState::ExecutingCommands);
                    for plan in &planned {
                        let (mut r, mut p) =
                            coordinator.execute(&plan.devices, &plan.command).await;
                        narrative.push(format!(
                            "Ran `{}` on {} device(s).",
                            plan.command,
                            plan.devices.len()
                        ));
                        results.append(&mut r);
                        probes.append(&mut p);
                    }
                }
                None => {
                    warn!("commands requested but no inventory is configured");
                    narrative.push(
                        "Command execution unavailable: no device inventory is configured."
                            .to_string(),
                    );
                }
            }
        }

        state = self.transition(state, RunState::AwaitingAnalysis);
        let task = format!("{}: {}", alarm.affected_component, alarm.description);
        let analysis = if !results.is_empty() {
            let evidence = prompts::results_context(&task, &results, &probes);
            match self
                .oracle
                .analyze(&prompts::analysis_system_prompt(), &evidence)
                .await
            {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!(error = %e, "oracle analysis failed, degrading");
                    narrative.push(format!("Oracle analysis unavailable: {e}."));
                    degraded_analysis(&alarm, &e.to_string())
                }
            }
        } else if let Some(question) = clarification {
            // Nothing ran and the oracle wants the user; do not ask it again.
            narrative.push("Investigation blocked pending user clarification.".to_string());
            blocked_analysis(&question)
        } else {
            // Best effort from the alarm text alone.
            narrative.push("No commands were runnable; analyzing the alarm text alone.".to_string());
            match self
                .oracle
                .analyze(&prompts::analysis_system_prompt(), &context)
                .await
            {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!(error = %e, "oracle analysis failed, degrading");
                    narrative.push(format!("Oracle analysis unavailable: {e}."));
                    degraded_analysis(&alarm, &e.to_string())
                }
            }
        };

        let _ = self.transition(state, RunState::Terminal);
        info!(
            results = results.len(),
            probes = probes.len(),
            "alarm triage complete"
        );
        assemble_report(
            OriginalRequest::Alarm(alarm),
            scope,
            narrative.join("\n"),
            results,
            probes,
            Some(analysis),
        )
    }

    /// Answer a user query: a full report when commands ran, otherwise an
    /// interim reply. Exactly one oracle decision call per invocation.
    pub async fn process_user_query(&self, query: UserQueryInput) -> Outcome {
        let mut state = RunState::AwaitingAction;
        let mut narrative: Vec<String> = Vec::new();

        let system = prompts::action_system_prompt(&self.capabilities());
        let context = prompts::query_context(&query);

        let action = match self.oracle.propose_action(&system, &context).await {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, "oracle decision failed");
                return Outcome::Reply(InterimReply::new(format!(
                    "I could not reach the decision service to plan an investigation ({e}). \
                     Please try again."
                )));
            }
        };
        narrative.push(describe_action(&action));

        match action.classify() {
            OracleAction::Clarify(question) => {
                let _ = self.transition(state, RunState::Terminal);
                Outcome::Reply(InterimReply::new(question))
            }
            OracleAction::Conclude(Some(thought)) => {
                let _ = self.transition(state, RunState::Terminal);
                Outcome::Reply(InterimReply::new(thought))
            }
            OracleAction::Conclude(None) => {
                warn!("oracle returned an empty action for a user query");
                let _ = self.transition(state, RunState::Terminal);
                Outcome::Reply(InterimReply::new(format!(
                    "I was not able to determine an investigation step for: \"{}\". \
                     Could you rephrase or add detail?",
                    query.query_text
                )))
            }
            OracleAction::RequestCommands(_) => {
                if let Some(question) = &action.clarification {
                    narrative.push(format!(
                        "Oracle also asked \"{question}\"; proceeding with commands first."
                    ));
                }
                let Some(coordinator) = &self.coordinator else {
                    return Outcome::Reply(InterimReply::new(
                        "The investigation needs device commands, but no device inventory is \
                         configured, so commands cannot be executed.",
                    ));
                };

                let planned = self.plan_commands(&action, &query.target_scope, &mut narrative);
                if planned.is_empty() {
                    return Outcome::Reply(InterimReply::new(
                        "The proposed investigation steps were either not on the command \
                         allow-list or had no target devices, so nothing could be executed.",
                    ));
                }

                state = self.transition(state, RunState::ExecutingCommands);
                let mut results: Vec<CommandResult> = Vec::new();
                let mut probes: Vec<ReachabilityResult> = Vec::new();
                for plan in &planned {
                    let (mut r, mut p) = coordinator.execute(&plan.devices, &plan.command).await;
                    narrative.push(format!(
                        "Ran `{}` on {} device(s).",
                        plan.command,
                        plan.devices.len()
                    ));
                    results.append(&mut r);
                    probes.append(&mut p);
                }

                state = self.transition(state, RunState::AwaitingAnalysis);
                let evidence = prompts::results_context(&query.query_text, &results, &probes);
                let analysis = match self
                    .oracle
                    .analyze(&prompts::analysis_system_prompt(), &evidence)
                    .await
                {
                    Ok(analysis) => analysis,
                    Err(e) => {
                        warn!(error = %e, "oracle analysis failed");
                        return Outcome::Reply(InterimReply::new(format!(
                            "Commands were executed on {} device(s), but the analysis service \
                             failed ({e}). Please retry to get a full report.",
                            results.len()
                        )));
                    }
                };

                let _ = self.transition(state, RunState::Terminal);
                let scope = query.target_scope.clone();
                Outcome::Report(Box::new(assemble_report(
                    OriginalRequest::UserQuery(query),
                    scope,
                    narrative.join("\n"),
                    results,
                    probes,
                    Some(analysis),
                )))
            }
        }
    }

    /// Filter requested commands through the allow-list, resolve empty
    /// device lists against the scope, and de-duplicate (command, device)
    /// pairs across the whole request.
    fn plan_commands(
        &self,
        action: &ActionRequest,
        scope: &TargetScope,
        narrative: &mut Vec<String>,
    ) -> Vec<PlannedCommand> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut planned = Vec::new();

        for request in &action.commands {
            let command = netsift_common::normalize_command(&request.command);
            if !self.allowlist.is_allowed(&command) {
                warn!(%command, "dropping non-allow-listed oracle command");
                narrative.push(format!("Dropped `{command}`: not on the allow-list."));
                continue;
            }

            let candidates: &[String] = if request.devices.is_empty() {
                &scope.device_hostnames
            } else {
                &request.devices
            };
            if candidates.is_empty() {
                narrative.push(format!("Dropped `{command}`: no target devices in scope."));
                continue;
            }

            let devices: Vec<String> = candidates
                .iter()
                .filter(|device| seen.insert((command.clone(), (*device).clone())))
                .cloned()
                .collect();
            if !devices.is_empty() {
                planned.push(PlannedCommand { command, devices });
            }
        }
        planned
    }
}

fn describe_action(action: &ActionRequest) -> String {
    let mut parts = Vec::new();
    if !action.commands.is_empty() {
        let names: Vec<&str> = action
            .commands
            .iter()
            .map(|c| c.command.as_str())
            .collect();
        parts.push(format!("Oracle requested: {}.", names.join(", ")));
    }
    if action.clarification.is_some() && action.commands.is_empty() {
        parts.push("Oracle asked the user for clarification.".to_string());
    }
    if parts.is_empty() {
        parts.push("Oracle requested no commands.".to_string());
    }
    if let Some(thought) = &action.thought {
        parts.push(format!("Reasoning: {thought}"));
    }
    parts.join(" ")
}

fn degraded_analysis(alarm: &AlarmDetails, error: &str) -> AnalysisResult {
    AnalysisResult {
        overall_assessment: format!(
            "Automated analysis was unavailable for the '{}' alarm on {}. \
             Manual investigation is required.",
            alarm.severity, alarm.affected_component
        ),
        key_findings: vec![format!("The decision oracle failed: {error}")],
        potential_root_causes: vec![],
        suggested_next_steps: vec![
            "Investigate the alarm manually.".to_string(),
            "Check oracle service availability and retry.".to_string(),
        ],
        confidence: Some(0.0),
        reasoning: None,
    }
}

fn blocked_analysis(question: &str) -> AnalysisResult {
    AnalysisResult {
        overall_assessment: format!(
            "Investigation is blocked pending user clarification: {question}"
        ),
        key_findings: vec![],
        potential_root_causes: vec![],
        suggested_next_steps: vec![format!("Answer the pending question: {question}")],
        confidence: None,
        reasoning: None,
    }
}
