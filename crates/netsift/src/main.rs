//! netsift - LLM-assisted triage for network incidents.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use netsift::coordinator::CommandCoordinator;
use netsift::engine::TriageEngine;
use netsift::executor::CommandExecutor;
use netsift::inventory::Testbed;
use netsift::oracle::HttpOracle;
use netsift::session::SshSessionProvider;
use netsift_common::{
    render_markdown, AlarmDetails, ChatMessage, Config, InterimReply, Outcome, TargetScope,
    UserQueryInput,
};

#[derive(Parser)]
#[command(name = "netsift", about = "LLM-assisted network incident triage")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "netsift.toml")]
    config: PathBuf,

    /// Emit JSON instead of Markdown/plain text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Triage an alarm read from a JSON file.
    Alarm {
        /// JSON file with the alarm details.
        #[arg(long)]
        file: PathBuf,
        /// Device(s) in scope; repeatable.
        #[arg(long = "device")]
        devices: Vec<String>,
        #[arg(long)]
        region: Option<String>,
    },
    /// Answer a free-form operator question.
    Query {
        /// The question text.
        text: String,
        /// Device(s) in scope; repeatable.
        #[arg(long = "device")]
        devices: Vec<String>,
        #[arg(long)]
        region: Option<String>,
        /// JSON file with prior conversation turns.
        #[arg(long)]
        history: Option<PathBuf>,
        /// File(s) to attach as context; repeatable.
        #[arg(long = "upload")]
        uploads: Vec<PathBuf>,
    },
    /// Print what this service can do.
    Capabilities,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let engine = build_engine(&config)?;

    match cli.command {
        Commands::Alarm {
            file,
            devices,
            region,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading alarm file {}", file.display()))?;
            let alarm: AlarmDetails =
                serde_json::from_str(&text).context("parsing alarm JSON")?;
            let scope = TargetScope {
                device_hostnames: devices,
                region,
            };

            let report = engine.process_alarm(alarm, scope).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", render_markdown(&report));
            }
        }
        Commands::Query {
            text,
            devices,
            region,
            history,
            uploads,
        } => {
            let chat_history = match &history {
                Some(path) => load_history(path)?,
                None => vec![],
            };

            let mut file_uploads = Vec::with_capacity(uploads.len());
            for path in uploads {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading upload {}", path.display()))?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                file_uploads.push(netsift_common::FileUpload { filename, content });
            }

            let query = UserQueryInput {
                query_text: text,
                chat_history,
                file_uploads,
                target_scope: TargetScope {
                    device_hostnames: devices,
                    region,
                },
            };

            match engine.process_user_query(query).await {
                Outcome::Report(report) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        println!("{}", render_markdown(&report));
                    }
                }
                Outcome::Reply(InterimReply { message }) => {
                    if cli.json {
                        println!(
                            "{}",
                            serde_json::to_string_pretty(&InterimReply { message })?
                        );
                    } else {
                        println!("{message}");
                    }
                }
            }
        }
        Commands::Capabilities => {
            let capabilities = engine.capabilities();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&capabilities)?);
            } else {
                println!("Allowed commands:");
                for command in &capabilities.allowed_commands {
                    println!("  {command}");
                }
                println!(
                    "Reachability probes: {}",
                    if capabilities.reachability_probes {
                        "enabled"
                    } else {
                        "disabled"
                    }
                );
            }
        }
    }

    Ok(())
}

fn load_history(path: &std::path::Path) -> Result<Vec<ChatMessage>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading history file {}", path.display()))?;
    serde_json::from_str(&text).context("parsing history JSON")
}

fn build_engine(config: &Config) -> Result<TriageEngine> {
    let allowlist = config.allowlist();
    let oracle = Arc::new(
        HttpOracle::new(config.oracle.clone()).context("building oracle HTTP client")?,
    );

    let coordinator = match &config.inventory.testbed_file {
        Some(path) => {
            let testbed = Testbed::load(path)
                .with_context(|| format!("loading testbed from {}", path.display()))?;
            info!(devices = testbed.devices().len(), "loaded device testbed");
            let provider = Arc::new(SshSessionProvider::new(
                config.inventory.effective_connect_timeout_secs(),
            ));
            let executor = CommandExecutor::new(
                provider,
                Arc::new(testbed),
                allowlist.clone(),
                config.features.reachability_probes,
            );
            Some(CommandCoordinator::new(executor))
        }
        None => {
            info!("no testbed configured; command execution disabled");
            None
        }
    };

    Ok(TriageEngine::new(
        oracle,
        coordinator,
        allowlist,
        config.features.reachability_probes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn query_accepts_history_and_scope_flags() {
        let cli = Cli::try_parse_from([
            "netsift",
            "query",
            "why is R1 slow?",
            "--device",
            "R1",
            "--history",
            "turns.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Query {
                history, devices, ..
            } => {
                assert_eq!(history.as_deref(), Some(std::path::Path::new("turns.json")));
                assert_eq!(devices, vec!["R1"]);
            }
            _ => panic!("expected the query subcommand"),
        }
    }

    #[test]
    fn history_file_parses_into_chat_turns() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"[{{"role": "user", "content": "earlier question"}}, {{"role": "assistant", "content": "which VRF?"}}]"#
        )
        .unwrap();
        let turns = load_history(f.path()).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "earlier question");
    }

    #[test]
    fn missing_history_file_is_an_error() {
        assert!(load_history(std::path::Path::new("/nonexistent/turns.json")).is_err());
    }
}
