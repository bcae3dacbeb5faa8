// ABOUTME: Entry point for the dockhand CLI application.
// ABOUTME: Parses arguments and dispatches to the pipeline.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use dockhand::catalog::Catalog;
use dockhand::config::{self, StackConfig};
use dockhand::error::{Error, Result};
use dockhand::exec::{self, ShellExecutor};
use dockhand::layout::Layout;
use dockhand::output::{Output, OutputMode};
use dockhand::pipeline::{self, Pipeline, PipelineLock};
use dockhand::store::{DeploymentRecord, JsonStore, Store};
use dockhand::types::ProjectName;
use std::env;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    });

    if let Commands::Init { project, force } = &cli.command {
        let cwd = env::current_dir()?;
        config::init_config(&cwd, project.as_deref(), *force)?;
        output.success(&format!("Wrote {}", config::CONFIG_FILENAME));
        return Ok(());
    }

    let layout = Layout::new(resolve_root(cli.root.clone())?);
    let store = JsonStore::open(layout.store_path())?;
    let catalog = load_catalog(&layout)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Apply { file, force } => {
            let config = match file {
                Some(path) => StackConfig::load(&path)?,
                None => StackConfig::discover(&env::current_dir()?)?,
            };

            let lock = PipelineLock::acquire(&layout.lock_dir(), &config.project, force)?;
            let executor = ShellExecutor::new(config.command_timeout);
            let pipeline = Pipeline::new(store, executor, layout, catalog);

            output.progress(&format!("Applying configuration for {}", config.project));
            let record = pipeline.apply(&config).await?;
            lock.release();

            output.success(&format!("Configuration stored for {}", record.name));
            Ok(())
        }

        Commands::Deploy { project, force } => {
            let name = project_name(&project)?;
            let record = lookup(&store, &name).await?;

            let lock = PipelineLock::acquire(&layout.lock_dir(), &name, force)?;
            let pipeline = Pipeline::new(store, ShellExecutor::default(), layout, catalog);

            let result = deploy(&pipeline, &record, &output).await;
            lock.release();
            result
        }

        Commands::Status { project } => match project {
            Some(project) => {
                let name = project_name(&project)?;
                let record = lookup(&store, &name).await?;
                print_cycles(&store, &record).await
            }
            None => print_deployments(&store).await,
        },

        Commands::Logs {
            project,
            stage,
            build,
        } => {
            let name = project_name(&project)?;
            let record = lookup(&store, &name).await?;

            let build_number = build.unwrap_or(record.last_build_number);
            let path = layout
                .log_dir(&name)
                .join(exec::log_file_name(stage.phase(), build_number));

            match std::fs::read_to_string(&path) {
                Ok(content) => print!("{content}"),
                Err(_) => output.warning(&format!(
                    "no log recorded for {} build {build_number}",
                    stage.phase()
                )),
            }
            Ok(())
        }

        Commands::Stop { project } => {
            let name = project_name(&project)?;
            let record = lookup(&store, &name).await?;

            let lock = PipelineLock::acquire(&layout.lock_dir(), &name, false)?;
            let pipeline = Pipeline::new(store, ShellExecutor::default(), layout, catalog);
            let result = pipeline.stop_containers(record.id).await;
            lock.release();

            result?;
            output.success(&format!("Stopped {name}"));
            Ok(())
        }

        Commands::Down { project } => {
            let name = project_name(&project)?;
            let record = lookup(&store, &name).await?;

            let lock = PipelineLock::acquire(&layout.lock_dir(), &name, false)?;
            let pipeline = Pipeline::new(store, ShellExecutor::default(), layout, catalog);
            let result = pipeline.remove_containers(record.id).await;
            lock.release();

            result?;
            output.success(&format!("Removed containers for {name}"));
            Ok(())
        }

        Commands::Delete { project } => {
            let name = project_name(&project)?;
            let record = lookup(&store, &name).await?;

            let lock = PipelineLock::acquire(&layout.lock_dir(), &name, false)?;
            let pipeline = Pipeline::new(store, ShellExecutor::default(), layout, catalog);
            let result = pipeline.delete_deployment(record.id).await;
            lock.release();

            result?;
            output.success(&format!("Deleted {name}"));
            Ok(())
        }
    }
}

/// Run one full build cycle against a deployment.
async fn deploy(
    pipeline: &Pipeline<JsonStore, ShellExecutor>,
    record: &DeploymentRecord,
    output: &Output,
) -> Result<()> {
    let started = Instant::now();

    let cycle = pipeline.start_cycle(record.id, None).await?;
    output.progress(&format!(
        "Deploying {} (build {})",
        record.name, cycle.build_number
    ));

    output.progress("  → Updating source...");
    pipeline.retrieve_source(record.id).await?;

    output.progress("  → Building images...");
    pipeline.build_artifacts(record.id).await?;

    output.progress("  → Starting containers...");
    pipeline.run_containers(record.id).await?;

    let duration = pipeline::format_duration(started.elapsed());
    pipeline.mark_done(record.id, &duration).await?;

    output.success(&format!(
        "Deployed {} (build {}, {duration})",
        record.name, cycle.build_number
    ));
    Ok(())
}

async fn print_deployments(store: &JsonStore) -> Result<()> {
    let deployments = store.list_deployments().await?;
    if deployments.is_empty() {
        println!("No deployments yet. Run `dockhand apply` first.");
        return Ok(());
    }

    for record in deployments {
        let last_build = record
            .last_build_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        let duration = record.last_duration.as_deref().unwrap_or("-");
        println!(
            "{:<24} {:<12} build {:<4} last {last_build} ({duration})",
            record.name.to_string(),
            record.status.to_string(),
            record.last_build_number,
        );
    }
    Ok(())
}

async fn print_cycles(store: &JsonStore, record: &DeploymentRecord) -> Result<()> {
    println!("{} [{}]", record.name, record.status);

    let cycles = store.cycles(record.id).await?;
    if cycles.is_empty() {
        println!("  no build cycles yet");
        return Ok(());
    }

    for cycle in cycles {
        println!("  build {}", cycle.build_number);
        for stage in cycle.stages() {
            println!(
                "    {:<6} {:<12} {}",
                stage.kind.to_string(),
                stage.status.to_string(),
                stage.updated_at.format("%Y-%m-%d %H:%M:%S"),
            );
        }
    }
    Ok(())
}

async fn lookup(store: &JsonStore, name: &ProjectName) -> Result<DeploymentRecord> {
    store
        .find_deployment(name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("deployment {name}")))
}

fn project_name(raw: &str) -> Result<ProjectName> {
    ProjectName::new(raw).map_err(|e| Error::Validation(e.to_string()))
}

/// A `catalog.yml` under the data root replaces the built-in catalog.
fn load_catalog(layout: &Layout) -> Result<Catalog> {
    let path = layout.root().join("catalog.yml");
    if path.exists() {
        Catalog::load(&path)
    } else {
        Ok(Catalog::builtin())
    }
}

fn resolve_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root);
    }
    if let Ok(root) = env::var("DOCKHAND_ROOT") {
        return Ok(PathBuf::from(root));
    }
    let home = env::var("HOME")
        .map_err(|_| Error::Validation("cannot resolve data root: HOME is not set".into()))?;
    Ok(PathBuf::from(home).join(".local/share/dockhand"))
}
