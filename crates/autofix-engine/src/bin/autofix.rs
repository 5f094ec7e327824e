use anyhow::{bail, Context, Result};
use autofix_engine::prelude::*;
use autofix_engine::{AlwaysConfirm, ConfirmationProvider, DirectExecutor};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Prompts on stderr, reads `y`/`yes` from stdin
struct StdinConfirm;

impl ConfirmationProvider for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn cli() -> Command {
    let config = Arg::new("config")
        .long("config")
        .short('c')
        .help("Engine configuration (.toml, .yaml or .yml)");
    let issues = Arg::new("issues")
        .long("issues")
        .short('i')
        .required(true)
        .help("Diagnosed issues (.json, .yaml or .yml)");
    let diagnosis = Arg::new("diagnosis")
        .long("diagnosis")
        .default_value("cli")
        .help("Diagnosis ID the plan is built for");
    let yaml = Arg::new("yaml")
        .long("yaml")
        .action(ArgAction::SetTrue)
        .help("Print YAML instead of JSON");

    Command::new("autofix")
        .version(autofix_engine::VERSION)
        .about("Governed execution of middleware fix plans")
        .subcommand_required(true)
        .subcommand(
            Command::new("plan")
                .about("Build and print a fix plan")
                .arg(config.clone())
                .arg(issues.clone())
                .arg(diagnosis.clone())
                .arg(yaml.clone()),
        )
        .subcommand(
            Command::new("run")
                .about("Validate, execute and record a fix plan")
                .arg(config.clone())
                .arg(issues)
                .arg(diagnosis)
                .arg(yaml)
                .arg(
                    Arg::new("approve")
                        .long("approve")
                        .help("Approver identity for plans that require approval"),
                )
                .arg(
                    Arg::new("live")
                        .long("live")
                        .action(ArgAction::SetTrue)
                        .help("Execute for real even if the config says dry run"),
                )
                .arg(
                    Arg::new("direct")
                        .long("direct")
                        .action(ArgAction::SetTrue)
                        .help("Run steps one by one with confirmation; no validation, rollback or record"),
                )
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .requires("direct")
                        .help("Confirm every direct step without prompting"),
                ),
        )
        .subcommand(
            Command::new("rules")
                .about("Print the effective risk table and deny-list as TOML")
                .arg(config),
        )
}

fn load_config(args: &ArgMatches) -> Result<EngineConfig> {
    match args.get_one::<String>("config") {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading config {path}")),
        None => Ok(EngineConfig::default()),
    }
}

fn load_issues(path: &str) -> Result<Vec<Issue>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading issues from {path}"))?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let issues = match ext.as_str() {
        "json" => serde_json::from_str(&text).context("parsing issues JSON")?,
        "yaml" | "yml" => serde_yaml::from_str(&text).context("parsing issues YAML")?,
        other => bail!("unsupported issues file extension {other:?}"),
    };
    Ok(issues)
}

fn print<T: Serialize>(value: &T, yaml: bool) -> Result<()> {
    let text = if yaml {
        serde_yaml::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{text}");
    Ok(())
}

fn manager(config: &EngineConfig) -> AutoFixManager {
    AutoFixManager::from_config(
        config,
        Arc::new(ShellCommandRunner::new()),
        Arc::new(InMemoryRecordStore::new()),
    )
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling");
            trigger.cancel();
        }
    });
    token
}

async fn run(args: &ArgMatches) -> Result<bool> {
    let mut config = load_config(args)?;
    if args.get_flag("live") {
        config.autofix.dry_run = false;
    }
    let yaml = args.get_flag("yaml");
    let issues = load_issues(args.get_one::<String>("issues").map_or("", String::as_str))?;
    let diagnosis = args.get_one::<String>("diagnosis").map_or("cli", String::as_str);

    let manager = manager(&config);
    let plan = manager.build_plan(diagnosis, &issues)?;
    let cancel = cancel_on_ctrl_c();

    if args.get_flag("direct") {
        let confirmation: Arc<dyn ConfirmationProvider> = if args.get_flag("yes") {
            Arc::new(AlwaysConfirm)
        } else {
            Arc::new(StdinConfirm)
        };
        let direct: DirectExecutor = manager
            .direct_executor(confirmation)
            .context("direct mode runs commands for real; pass --live or set dry_run = false")?;
        let results = direct.run(&plan.actions, &cancel).await;
        print(&results, yaml)?;
        return Ok(results.iter().all(|r| r.status != ActionStatus::Failed));
    }

    let mut request = ExecutionRequest::new().with_cancel(cancel).with_tag("cli");
    if let Some(approver) = args.get_one::<String>("approve") {
        request = request.approved_by(approver.clone());
    }
    let outcome = manager.execute_fix_plan(&plan, request).await?;
    if let Err(err) = &outcome.record {
        tracing::error!(error = %err, "execution was not recorded");
    }
    print(&outcome.result, yaml)?;
    Ok(matches!(outcome.status(), FixStatus::Success | FixStatus::PartialSuccess))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let ok = match matches.subcommand() {
        Some(("plan", args)) => {
            let config = load_config(args)?;
            let issues = load_issues(args.get_one::<String>("issues").map_or("", String::as_str))?;
            let diagnosis = args.get_one::<String>("diagnosis").map_or("cli", String::as_str);
            let plan = manager(&config).build_plan(diagnosis, &issues)?;
            print(&plan, args.get_flag("yaml"))?;
            true
        }
        Some(("run", args)) => run(args).await?,
        Some(("rules", args)) => {
            let config = load_config(args)?;
            println!("{}", config.to_toml_string()?);
            true
        }
        _ => unreachable!("subcommand_required"),
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
