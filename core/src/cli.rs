use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::SandboxConfig;
use crate::executor::ops::display_value;
use crate::sandbox::Sandbox;
use crate::Value;

#[derive(Parser)]
#[command(name = "sandbox")]
#[command(about = "Sandbox - run untrusted scripts under a capability gate", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a script and print its result
    Run {
        /// Script to run
        file: PathBuf,

        /// Allow top-level await and drive timers until they finish
        #[arg(long = "async")]
        is_async: bool,

        /// Evaluate only the first statement and print its value
        #[arg(short = 'e', long)]
        expression: bool,

        /// Record accesses instead of enforcing the policy
        #[arg(long)]
        audit: bool,

        /// Fold constant sub-expressions before running
        #[arg(long)]
        optimize: bool,

        /// Tick budget for the run
        #[arg(short = 'q', long)]
        quota: Option<u64>,
    },

    /// Print the parsed program as JSON
    Parse {
        /// Script to parse
        file: PathBuf,
    },

    /// Run a script in audit mode and print what it touched
    Audit {
        /// Script to audit
        file: PathBuf,

        /// Print a least-privilege configuration instead of the report
        #[arg(long)]
        suggest: bool,
    },
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn print_value(value: &Value) -> Result<()> {
    match value {
        Value::Object(_) => {
            let json = serde_json::to_string_pretty(&value.to_json())
                .context("Failed to render result")?;
            println!("{json}");
        }
        other => println!("{}", display_value(other)),
    }
    Ok(())
}

/// Internal function that handles CLI commands
async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration before any command so config errors show first
    let config = SandboxConfig::builder()
        .config_path(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            file,
            is_async,
            expression,
            audit,
            optimize,
            quota,
        } => {
            let source = read_source(&file)?;
            let mut options = config.into_options()?;
            options.audit |= audit;
            if quota.is_some() {
                options.execution_quota = quota;
            }
            let sandbox = Sandbox::with_options(options);
            let compiled = match (is_async, expression) {
                (false, false) => sandbox.compile(&source, optimize),
                (true, false) => sandbox.compile_async(&source, optimize),
                (false, true) => sandbox.compile_expression(&source, optimize),
                (true, true) => sandbox.compile_expression_async(&source, optimize),
            }
            .with_context(|| format!("Failed to parse {}", file.display()))?;

            let execution = compiled.bind([]);
            let result = if is_async {
                match execution.run_async().await {
                    Ok(value) => sandbox.run_event_loop().await.map(|_| value),
                    Err(e) => Err(e),
                }
            } else {
                execution.run()
            };
            // Values are not Send, so the error is rendered before leaving
            let value = result.map_err(|e| anyhow!("{e}"))?;
            print_value(&value)?;

            if let Some(report) = execution.audit_report() {
                eprintln!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        Commands::Parse { file } => {
            let source = read_source(&file)?;
            let program = crate::parser::parse(&source)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&program)?);
        }

        Commands::Audit { file, suggest } => {
            let source = read_source(&file)?;
            let sandbox = Sandbox::with_options(config.into_options()?);
            let outcome = sandbox
                .audit(&source, [])
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            if let Err(error) = &outcome.result {
                eprintln!("Script failed: {error}");
            }
            if suggest {
                print!("{}", SandboxConfig::from_audit(&outcome.report).to_toml()?);
            } else {
                println!("{}", serde_json::to_string_pretty(&outcome.report)?);
            }
        }
    }

    Ok(())
}
