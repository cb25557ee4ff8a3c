use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use interactive_clustering_console::client::{HttpBackend, StatusClient};
use interactive_clustering_console::commands::{PipelineCommand, run_command};
use interactive_clustering_console::config::{self, ConsoleConfig};
use interactive_clustering_console::logging::{self, LogTarget};
use interactive_clustering_console::projector::project;
use interactive_clustering_console::scheduler::PollingScheduler;
use interactive_clustering_console::sink::StdoutSink;
use interactive_clustering_console::state::ProjectState;
use interactive_clustering_console::view::DashboardView;
use interactive_clustering_console::{Error, Result};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Console configuration TOML (defaults to ./icc.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend base URL, overriding [server] base_url
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Project id, overriding [project] id
    #[arg(long, global = true)]
    project: Option<String>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the project status once and print the dashboard update it implies
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Poll until the pipeline settles, printing each dashboard change
    Watch,
    /// Terminal dashboard with live progress and pipeline commands
    Tui,
    /// Start a pipeline step (modelization, sampling, clustering, next-iteration)
    Run { command: PipelineCommand },
    /// List every known project state with its family and details
    States,
    /// Print the fully-resolved configuration (after extends and CLI overrides)
    Resolve,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut cfg = config::load_or_default(args.config.as_deref())?;
    if let Some(url) = args.base_url.as_deref() {
        cfg.server.base_url = url.to_string();
    }

    let target = match args.cmd {
        Command::Tui => LogTarget::FileOnly,
        _ => LogTarget::Stderr,
    };
    logging::init(&cfg.logging, target)?;

    let project_arg = args.project.as_deref();
    match args.cmd {
        Command::Status { json } => cmd_status(&cfg, project_arg, json),
        Command::Watch => cmd_watch(&cfg, project_arg),
        Command::Tui => {
            let project_id = cfg.project_id(project_arg)?;
            let backend = HttpBackend::from_config(&cfg.server)?;
            interactive_clustering_console::ui::run_tui(
                &project_id,
                backend,
                Duration::from_millis(cfg.polling.delay_ms),
            )
        }
        Command::Run { command } => cmd_run(&cfg, project_arg, command),
        Command::States => cmd_states(),
        Command::Resolve => cmd_resolve(cfg, project_arg),
    }
}

fn cmd_status(cfg: &ConsoleConfig, project_arg: Option<&str>, json: bool) -> Result<()> {
    let project_id = cfg.project_id(project_arg)?;
    let mut backend = HttpBackend::from_config(&cfg.server)?;
    let snapshot = backend.fetch(&project_id)?;
    let state = snapshot.project_state()?;
    let plan = project(&snapshot, &DashboardView::new())?;

    if json {
        let out = serde_json::json!({
            "snapshot": snapshot,
            "details": state.details(),
            "plan": plan,
        });
        let s = serde_json::to_string_pretty(&out).map_err(|e| Error::msg(e.to_string()))?;
        println!("{s}");
        return Ok(());
    }

    println!("project    {project_id}");
    println!("iteration  {}", snapshot.iteration_id);
    println!("state      {state}");
    println!("details    {}", state.details());
    if let Some(task) = &snapshot.task {
        let pct = task
            .progression
            .map(|p| format!("{p}%"))
            .unwrap_or_else(|| "-".into());
        println!("task       {pct} {}", task.detail.as_deref().unwrap_or(""));
    }
    println!("reschedule {}", plan.should_reschedule);
    for fp in &plan.families {
        println!("\n[{}] {:?}", fp.family.label(), fp.phase);
        for action in &fp.actions {
            println!("  {action}");
        }
    }
    Ok(())
}

fn cmd_watch(cfg: &ConsoleConfig, project_arg: Option<&str>) -> Result<()> {
    let project_id = cfg.project_id(project_arg)?;
    let mut backend = HttpBackend::from_config(&cfg.server)?;
    let mut sink = StdoutSink::default();
    let alive = Arc::new(AtomicBool::new(true));
    let mut scheduler =
        PollingScheduler::new(Duration::from_millis(cfg.polling.delay_ms), alive);
    if let Some(last) = scheduler.run_blocking(&project_id, &mut backend, &mut sink)? {
        println!(
            "settled: iteration {} {} at {}",
            last.snapshot.iteration_id,
            last.snapshot.state,
            last.at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn cmd_run(cfg: &ConsoleConfig, project_arg: Option<&str>, command: PipelineCommand) -> Result<()> {
    let project_id = cfg.project_id(project_arg)?;
    let mut backend = HttpBackend::from_config(&cfg.server)?;
    let mut sink = StdoutSink::default();
    run_command(&mut backend, &mut sink, &project_id, command)?;
    println!("{command} accepted for project {project_id}");
    Ok(())
}

fn cmd_states() -> Result<()> {
    for state in ProjectState::ALL {
        println!(
            "{:<56} {:<28} {}",
            state.as_str(),
            state.family().label(),
            state.details()
        );
    }
    Ok(())
}

fn cmd_resolve(mut cfg: ConsoleConfig, project_arg: Option<&str>) -> Result<()> {
    if let Some(p) = project_arg {
        cfg.project.id = Some(config::validate_project_id(p)?);
    }
    cfg.server.base_url = cfg.server.resolved_base_url();
    if cfg.server.token.is_some() || cfg.server.resolved_token().is_some() {
        cfg.server.token = Some("<redacted>".into());
    }
    print!("{}", cfg.to_toml()?);
    Ok(())
}
