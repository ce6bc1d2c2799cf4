use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, Severity};

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Report missing or invalid settings; fails if any are errors")]
    Check,

    #[command(about = "Print the effective configuration (secrets omitted)")]
    Show,
}

pub async fn handle(cmd: ConfigCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Check => {
            let issues = config.issues();
            let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();

            match output_format {
                OutputFormat::Json => {
                    let list: Vec<_> = issues
                        .iter()
                        .map(|i| {
                            json!({
                                "severity": format!("{:?}", i.severity).to_lowercase(),
                                "key": i.key,
                                "message": i.message,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&json!({ "issues": list }))?);
                }
                OutputFormat::Text => {
                    for issue in &issues {
                        println!("[{:?}] {}", issue.severity, issue.message);
                    }
                    if issues.is_empty() {
                        println!("✓ Configuration looks complete");
                    }
                }
            }

            if errors > 0 {
                anyhow::bail!("{} configuration error(s)", errors);
            }
            Ok(())
        }
        ConfigCommands::Show => output_success(&output_format, "Effective configuration", Some(serde_json::to_value(config)?)),
    }
}
