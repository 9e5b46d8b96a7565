//! Command line front end for running lab scripts.
//!
//! Runs live under the configured user data directory (one directory per
//! run). Every command that changes a run resumes it from disk, applies the
//! change and saves it again.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use lablet::core::error::ScriptError;
use lablet::core::path::{component_name_path, resolve_name_path};
use lablet::core::types::{ComponentPath, Interaction};
use lablet::exit_codes;
use lablet::io::config::{CONFIG_FILE_NAME, LabletConfig, load_config};
use lablet::io::export::AnswerExporter;
use lablet::io::runs::{create_run_dir, delete_run, list_runs};
use lablet::io::source::{JsonScriptLoader, ScriptLoader};
use lablet::session::ScriptSession;

#[derive(Parser)]
#[command(name = "lablet", version, about = "Run guided lab activity scripts")]
struct Cli {
    /// Config file (defaults to `lablet.toml` in the working directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a script and run its pre-flight check.
    Validate { script: PathBuf },
    /// Start a new run of a script and print the run name.
    Start { script: PathBuf },
    /// Show the unlocked pages of a run.
    Status { run: String },
    /// Answer a text question (`Page/item` name path).
    Answer {
        run: String,
        component: String,
        text: String,
    },
    /// Tick (or untick) a checkbox question.
    Tick {
        run: String,
        component: String,
        #[arg(long)]
        uncheck: bool,
    },
    /// Attach a recorded experiment file to an experiment component.
    Record {
        run: String,
        component: String,
        file: PathBuf,
    },
    /// Select the page the run reopens on.
    Goto { run: String, page: usize },
    /// Write the answer report of a run.
    Export { run: String },
    /// List runs, newest first.
    Runs,
    /// Delete a run and all its data.
    Delete { run: String },
}

fn main() {
    lablet::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ScriptError>() {
        Some(ScriptError::Incompatible) => exit_codes::INCOMPATIBLE,
        _ => exit_codes::INVALID,
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let cfg = load_config(&config_path)?;
    let loader = JsonScriptLoader::new()?;
    let user_data_dir = PathBuf::from(&cfg.user_data_dir);

    match cli.command {
        Command::Validate { script } => cmd_validate(&loader, &script),
        Command::Start { script } => cmd_start(&loader, &cfg, &user_data_dir, &script),
        Command::Status { run } => {
            let session = open_run(&loader, &cfg, &user_data_dir, &run)?;
            print_status(&session);
            Ok(if session.is_complete() {
                exit_codes::COMPLETE
            } else {
                exit_codes::OK
            })
        }
        Command::Answer {
            run,
            component,
            text,
        } => update_run(&loader, &cfg, &user_data_dir, &run, |session| {
            let path = resolve(session, &component)?;
            session.interact(&path, Interaction::SetAnswer(text))?;
            Ok(())
        }),
        Command::Tick {
            run,
            component,
            uncheck,
        } => update_run(&loader, &cfg, &user_data_dir, &run, |session| {
            let path = resolve(session, &component)?;
            session.interact(&path, Interaction::SetChecked(!uncheck))?;
            Ok(())
        }),
        Command::Record {
            run,
            component,
            file,
        } => update_run(&loader, &cfg, &user_data_dir, &run, |session| {
            let path = resolve(session, &component)?;
            session.record_experiment(&path, &file)?;
            Ok(())
        }),
        Command::Goto { run, page } => {
            update_run(&loader, &cfg, &user_data_dir, &run, |session| {
                session.go_to_page(page)
            })
        }
        Command::Export { run } => {
            let session = open_run(&loader, &cfg, &user_data_dir, &run)?;
            let exporter = AnswerExporter::new()?;
            let path = session.export_answers(&exporter)?;
            println!("{}", path.display());
            Ok(exit_codes::OK)
        }
        Command::Runs => {
            for run in list_runs(&user_data_dir)? {
                match (&run.started, &run.seed) {
                    (Some(started), Some(seed)) => println!("{}\t{started}\t{seed}", run.name),
                    (Some(started), None) => println!("{}\t{started}", run.name),
                    _ => println!("{}", run.name),
                }
            }
            Ok(exit_codes::OK)
        }
        Command::Delete { run } => {
            delete_run(&user_data_dir, &run)?;
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_validate(loader: &JsonScriptLoader, script_path: &Path) -> Result<i32> {
    let mut script = loader.load(script_path)?;
    script
        .init_check()
        .map_err(anyhow::Error::from)
        .with_context(|| format!("check script {}", script_path.display()))?;
    println!(
        "{}: {} component(s) ok",
        script.title(),
        script.tree().len()
    );
    Ok(exit_codes::OK)
}

fn cmd_start(
    loader: &JsonScriptLoader,
    cfg: &LabletConfig,
    user_data_dir: &Path,
    script_path: &Path,
) -> Result<i32> {
    let seed = script_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    let run_dir = create_run_dir(user_data_dir, seed)?;
    let name = run_dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let started = ScriptSession::start_new(loader, cfg, script_path, &run_dir)
        .and_then(|mut session| session.save());
    if let Err(err) = started {
        delete_run(user_data_dir, &name).context("remove failed run")?;
        return Err(err);
    }
    println!("{name}");
    Ok(exit_codes::OK)
}

fn open_run(
    loader: &JsonScriptLoader,
    cfg: &LabletConfig,
    user_data_dir: &Path,
    run: &str,
) -> Result<ScriptSession> {
    let run_dir = user_data_dir.join(run);
    if !run_dir.is_dir() {
        return Err(anyhow!("no run named {run} in {}", user_data_dir.display()));
    }
    ScriptSession::resume(loader, cfg, &run_dir)
}

fn update_run<F>(
    loader: &JsonScriptLoader,
    cfg: &LabletConfig,
    user_data_dir: &Path,
    run: &str,
    f: F,
) -> Result<i32>
where
    F: FnOnce(&mut ScriptSession) -> Result<()>,
{
    let mut session = open_run(loader, cfg, user_data_dir, run)?;
    f(&mut session)?;
    session.save()?;
    print_status(&session);
    Ok(exit_codes::OK)
}

fn resolve(session: &ScriptSession, component: &str) -> Result<ComponentPath> {
    resolve_name_path(session.script().tree(), component)
        .with_context(|| format!("no component named {component}"))
}

fn print_status(session: &ScriptSession) {
    let tree = session.script().tree();
    println!("{}", session.script().title());
    for (index, id) in session.chain().into_iter().enumerate() {
        let marker = if index == session.current_page() {
            '>'
        } else {
            ' '
        };
        let name = component_name_path(tree, &ComponentPath::node(id)).unwrap_or_default();
        let state = tree
            .component(id)
            .map(|component| component.state().to_string())
            .unwrap_or_default();
        println!("{marker} {}. {name} [{state}]", index + 1);
    }
    if session.is_complete() {
        println!("complete");
    }
}
