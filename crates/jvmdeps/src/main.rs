use clap::{Parser, Subcommand};
use jvmdeps::{CancellationToken, EngineConfig, ProgressSender, Result, Session, preview};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "jvmdeps",
    author,
    version,
    about = "Inspect and update Gradle and Maven dependencies"
)]
struct Cli {
    /// JSON configuration file (defaults to $JVMDEPS_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every declared dependency and plugin
    Scan { root: PathBuf },
    /// List dependencies and plugins with newer versions
    Outdated { root: PathBuf },
    /// Suggest exclusions for problematic transitive dependencies
    Exclusions {
        root: PathBuf,
        #[arg(short, long)]
        module: Option<String>,
        /// Add every suggested exclusion to its build file
        #[arg(long)]
        write: bool,
    },
    /// Set the version of a dependency or plugin
    Update {
        build_file: PathBuf,
        /// `group:artifact` or Gradle plugin id
        id: String,
        version: String,
        /// Write the change instead of printing it
        #[arg(long)]
        write: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_interrupt(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            token.cancel();
        }
    });
}

async fn exclusions(
    session: &Session,
    root: &Path,
    module: Option<&str>,
    write: bool,
) -> Result<()> {
    let report = session.scan(root).await?;
    let cancel = CancellationToken::new();
    cancel_on_interrupt(&cancel);

    let (progress, mut updates) = ProgressSender::channel();
    let logger = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            tracing::info!("[{}/{}] {}", update.completed, update.total, update.message);
        }
    });

    let result = session
        .exclusions(&report, module, &cancel, Some(&progress))
        .await;
    drop(progress);
    let _ = logger.await;

    if write {
        for suggestion in &result.suggestions {
            if let Some(edit) = session.plan_exclusion(suggestion)? {
                let label = format!("Exclude {}", suggestion.exclusion.id());
                session.apply(&edit, &label)?;
            }
        }
    }
    print_json(&result)
}

async fn run(cli: Cli) -> Result<()> {
    let config = EngineConfig::discover(cli.config.as_deref());
    let session = Session::from_config(config);

    match cli.command {
        Command::Scan { root } => print_json(&session.scan(&root).await?),
        Command::Outdated { root } => {
            let report = session.scan(&root).await?;
            let cancel = CancellationToken::new();
            cancel_on_interrupt(&cancel);
            print_json(&session.outdated(&report, &cancel).await)
        }
        Command::Exclusions {
            root,
            module,
            write,
        } => exclusions(&session, &root, module.as_deref(), write).await,
        Command::Update {
            build_file,
            id,
            version,
            write,
        } => {
            let Some(edit) = session.plan_version_update(&build_file, &id, &version)? else {
                eprintln!("Nothing to update for {id} in {}", build_file.display());
                return Ok(());
            };
            if write {
                session.apply(&edit, &format!("Update {id} to {version}"))
            } else {
                print!("{}", preview(&edit));
                Ok(())
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
