use crate::commands::Commands;
use crate::error::CliError;
use clap::Parser;
use model::config::RunConfig;
use model::paths;
use model::phase::RunPhase;
use model::split::{DFLT_BATCH_LEN, SplitMode};
use runtime::{Janitor, StatusAggregator, load_run_config};
use scheduler::{KubectlScheduler, Scheduler};
use std::collections::HashMap;
use std::process::ExitCode;
use storage::{RemoteConfig, SourceLocation, StagingArea};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit;

#[derive(Parser)]
#[command(name = "seqferry", version = "0.1.0", about = "Elastic sequence-search runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let is_split = matches!(cli.command, Commands::Split { .. });
    let is_lifecycle = matches!(cli.command, Commands::Status { .. } | Commands::Janitor { .. });

    match run_command(cli.command).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err}");
            let code = if is_split {
                exit::split_code(&err)
            } else if is_lifecycle {
                // A failed query asserts no phase; report the run as
                // unknown rather than failed.
                RunPhase::Unknown.exit_code()
            } else {
                exit::EXIT_GENERIC
            };
            ExitCode::from(code as u8)
        }
    }
}

async fn run_command(command: Commands) -> Result<i32, CliError> {
    match command {
        Commands::Split {
            query,
            results,
            batch_len,
            num_parts,
        } => run_split(query, results, batch_len, num_parts).await,
        Commands::Submit {
            results,
            template,
            cluster_name,
            num_nodes,
            worker_pool,
            group_size,
            subs,
            kube_context,
            namespace,
        } => {
            run_submit(
                results,
                template,
                cluster_name,
                num_nodes,
                worker_pool,
                group_size,
                subs,
                kube_context,
                namespace,
            )
            .await
        }
        Commands::Status {
            results,
            json,
            kube_context,
            namespace,
        } => run_status(results, json, kube_context, namespace).await,
        Commands::Janitor {
            results,
            kube_context,
            namespace,
        } => run_janitor(results, kube_context, namespace).await,
        Commands::Delete {
            results,
            remove_batches,
            kube_context,
            namespace,
        } => run_delete(results, remove_batches, kube_context, namespace).await,
    }
}

async fn run_split(
    query: Vec<String>,
    results: String,
    batch_len: Option<u64>,
    num_parts: Option<u32>,
) -> Result<i32, CliError> {
    let mode = match num_parts {
        Some(parts) => SplitMode::Proportional { parts },
        None => SplitMode::Strict {
            batch_len: batch_len.unwrap_or(DFLT_BATCH_LEN),
        },
    };
    let remote = RemoteConfig::from_env();

    // The batcher is a sequential blocking stream consumer; run it off the
    // async runtime and flush the staged files afterwards.
    let task_results = results.clone();
    let task_remote = remote.clone();
    let (summary, mut staging) =
        tokio::task::spawn_blocking(move || -> Result<_, CliError> {
            // Fail early on unreadable inputs and an unwritable results
            // location, before any splitting work.
            for input in &query {
                let location = SourceLocation::resolve(input);
                storage::probe::check_readable(&location, &task_remote)?;
                if let Ok(size) = storage::probe::content_length(&location, &task_remote) {
                    tracing::debug!(input = %location, size, "Input probe");
                }
            }
            let results_loc = SourceLocation::resolve(&task_results);
            if !results_loc.is_remote() {
                std::fs::create_dir_all(&task_results).map_err(CliError::Io)?;
            }
            storage::probe::check_writable(&results_loc, &task_remote)?;

            let mut staging = StagingArea::new().map_err(CliError::Storage)?;
            let summary = splitter::split_collection(
                &query,
                mode,
                &task_results,
                &mut staging,
                &task_remote,
            )?;
            Ok((summary, staging))
        })
        .await
        .map_err(|err| CliError::Unexpected(format!("split task failed: {err}")))??;

    let store = storage::store_for(&SourceLocation::resolve(&results), remote)?;
    staging.flush(store.as_ref()).await?;

    println!("batches {}", summary.batches.len());
    println!("total_length {}", summary.total_length);
    Ok(exit::EXIT_OK)
}

/// Convert `key1=value1,key2=value2` into substitution variables,
/// ignoring malformed entries.
fn parse_subs(raw: Option<&str>) -> HashMap<String, String> {
    raw.unwrap_or_default()
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Read a whole text resource through the line-source stack, so templates
/// can live anywhere inputs can.
async fn read_text(location: &str, remote: &RemoteConfig) -> Result<String, CliError> {
    let location = SourceLocation::resolve(location);
    let remote = remote.clone();
    tokio::task::spawn_blocking(move || -> Result<String, CliError> {
        let mut source = storage::open_line_source(&location, &remote)?;
        let mut text = String::new();
        while let Some(line) = source.next_line()? {
            text.push_str(&line);
        }
        Ok(text)
    })
    .await
    .map_err(|err| CliError::Unexpected(format!("read task failed: {err}")))?
}

#[allow(clippy::too_many_arguments)]
async fn run_submit(
    results: String,
    template: String,
    cluster_name: String,
    num_nodes: u32,
    worker_pool: Option<String>,
    group_size: usize,
    subs: Option<String>,
    kube_context: Option<String>,
    namespace: Option<String>,
) -> Result<i32, CliError> {
    let remote = RemoteConfig::from_env();
    let store = storage::store_for(&SourceLocation::resolve(&results), remote.clone())?;

    let manifest_raw = store
        .get_object(&paths::metadata_file(&results, paths::MANIFEST_FILE))
        .await?;
    let manifest: Vec<String> = String::from_utf8_lossy(&manifest_raw)
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    info!(batches = manifest.len(), results = %results, "Loaded manifest");

    let template_text = read_text(&template, &remote).await?;
    let extra_vars = parse_subs(subs.as_deref());

    let cfg = RunConfig {
        results: results.clone(),
        cluster_name,
        split: SplitMode::default(),
        job_selector: model::config::DFLT_JOB_SELECTOR.to_string(),
        submit_selector: model::config::DFLT_SUBMIT_SELECTOR.to_string(),
        group_size,
        submit_retries: model::config::DFLT_SUBMIT_RETRIES,
        submit_retry_delay_ms: model::config::DFLT_SUBMIT_RETRY_DELAY_MS,
        target_nodes: num_nodes,
        worker_pool,
    };
    cfg.validate()?;

    let kubectl = KubectlScheduler::new(kube_context, namespace);
    let report = scheduler::submit_run(
        &kubectl,
        store.as_ref(),
        &cfg,
        &template_text,
        &manifest,
        &extra_vars,
    )
    .await?;

    println!(
        "submitted {} of {} jobs in {} groups",
        report.jobs_submitted,
        manifest.len(),
        report.groups_total
    );
    if report.is_complete() {
        Ok(exit::EXIT_OK)
    } else {
        warn!(
            groups_failed = report.groups_failed,
            "Some submission groups failed; the recorded job count reflects what was applied"
        );
        Ok(exit::EXIT_GENERIC)
    }
}

async fn run_status(
    results: String,
    json: bool,
    kube_context: Option<String>,
    namespace: Option<String>,
) -> Result<i32, CliError> {
    let store = storage::store_for(&SourceLocation::resolve(&results), RemoteConfig::from_env())?;
    let cfg = load_run_config(store.as_ref(), &results).await?;
    let kubectl = KubectlScheduler::new(kube_context, namespace);

    let report = StatusAggregator::new(&kubectl, store.as_ref(), &cfg)
        .check()
        .await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.phase);
        println!("{}", report.message);
    }
    Ok(report.phase.exit_code())
}

async fn run_janitor(
    results: String,
    kube_context: Option<String>,
    namespace: Option<String>,
) -> Result<i32, CliError> {
    let store = storage::store_for(&SourceLocation::resolve(&results), RemoteConfig::from_env())?;
    let cfg = load_run_config(store.as_ref(), &results).await?;
    let kubectl = KubectlScheduler::new(kube_context, namespace);

    let phase = Janitor::new(&kubectl, store.as_ref(), &cfg).reconcile().await?;
    println!("{phase}");
    Ok(phase.exit_code())
}

async fn run_delete(
    results: String,
    remove_batches: bool,
    kube_context: Option<String>,
    namespace: Option<String>,
) -> Result<i32, CliError> {
    let store = storage::store_for(&SourceLocation::resolve(&results), RemoteConfig::from_env())?;
    let cfg = load_run_config(store.as_ref(), &results).await?;
    let kubectl = KubectlScheduler::new(kube_context, namespace);

    kubectl.delete_resources(&cfg.job_selector).await?;
    kubectl.delete_resources(&cfg.submit_selector).await?;
    if remove_batches {
        store.delete_prefix(&paths::batch_dir(&results)).await?;
    }
    info!(results = %results, "Deleted run resources");
    Ok(exit::EXIT_OK)
}
