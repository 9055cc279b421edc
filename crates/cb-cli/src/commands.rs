use std::path::PathBuf;

use anyhow::Context as _;
use cb_cache::{build_index, QueryRouter};
use cb_output::OutputRecord;
use cb_query::{QueryFilter, StatsGroup};
use cb_runner::{BatchManager, BatchRunner, ShardRunner, ShardStatus};
use cb_snapshot::{SnapshotBuilder, SnapshotOptions};
use cb_store::StoreRoot;
use cb_types::{OutputKind, ShardId};
use colored::Colorize;

use crate::cli::*;
use crate::envelope::CliFailure;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let json = matches!(cli.format, OutputFormat::Json);
    match cli.command {
        Command::Init(args) => cmd_init(args, json),
        command => {
            let store = cli.store.ok_or(CliFailure::MissingStore)?;
            match command {
                Command::Init(_) => unreachable!("handled above"),
                Command::Snapshot(args) => cmd_snapshot(store, args, json),
                Command::BatchInit(args) => cmd_batch_init(store, args, json),
                Command::RunShard(args) => cmd_run_shard(store, args, json),
                Command::Run(args) | Command::Resume(args) => cmd_run(store, args, json),
                Command::ResetShard(args) => cmd_reset_shard(store, args, json),
                Command::IndexBuild(args) => cmd_index_build(store, args, json),
                Command::Query(query) => cmd_query(store, query, json),
                Command::Diff(args) => cmd_diff(store, args, json),
            }
        }
    }
}

fn cmd_init(args: InitArgs, json: bool) -> anyhow::Result<()> {
    let root = StoreRoot::init(&args.path)?;
    if json {
        println!(
            "{}",
            serde_json::json!({"store": root.path().display().to_string()})
        );
    } else {
        println!(
            "{} Initialized store at {}",
            "✓".green().bold(),
            root.path().display().to_string().bold()
        );
    }
    Ok(())
}

fn cmd_snapshot(store: PathBuf, args: SnapshotArgs, json: bool) -> anyhow::Result<()> {
    let root = StoreRoot::open(store)?;
    let options = SnapshotOptions {
        include: args.include,
        exclude: args.exclude,
        include_hidden: args.include_hidden,
        follow_symlinks: args.follow_symlinks,
    };
    let snapshot_id = SnapshotBuilder::new(&root).build(&args.dir, &options)?;
    if json {
        println!("{}", serde_json::json!({"snapshot_id": snapshot_id}));
    } else {
        println!("{snapshot_id}");
    }
    Ok(())
}

fn cmd_batch_init(store: PathBuf, args: BatchInitArgs, json: bool) -> anyhow::Result<()> {
    let root = StoreRoot::open(store)?;
    let registry = cb_tasks::builtin_registry();
    let batch_id = BatchManager::new(&root).init_batch(&args.snapshot, &args.pipeline, &registry)?;
    if json {
        println!(
            "{}",
            serde_json::json!({"batch_id": batch_id, "pipeline": args.pipeline})
        );
    } else {
        println!("{batch_id}");
    }
    Ok(())
}

fn parse_shard(raw: &str) -> anyhow::Result<ShardId> {
    raw.parse().map_err(|e: cb_types::TypeError| {
        CliFailure::InvalidArgument {
            name: "shard",
            reason: e.to_string(),
        }
        .into()
    })
}

fn cmd_run_shard(store: PathBuf, args: RunShardArgs, json: bool) -> anyhow::Result<()> {
    let root = StoreRoot::open(store)?;
    let shard_id = parse_shard(&args.shard)?;
    let registry = cb_tasks::builtin_registry();
    let state = ShardRunner::new(&root).run_shard(&args.batch, &args.task, shard_id, &registry, None)?;

    if json {
        println!("{}", serde_json::to_string(&state)?);
    } else {
        println!(
            "shard {} of {}: {}",
            shard_id,
            args.task,
            status_colored(state.status)
        );
    }
    if state.status == ShardStatus::Failed {
        let reason = state
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "unknown".to_string());
        return Err(cb_plan::PlanError::ExecutorFailed {
            task_type: args.task,
            reason,
        }
        .into());
    }
    Ok(())
}

fn cmd_run(store: PathBuf, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let root = StoreRoot::open(store)?;
    let registry = cb_tasks::builtin_registry();
    let mut runner = BatchRunner::new(&root);
    if let Some(workers) = args.workers {
        runner = runner.with_workers(workers);
    }
    let report = runner.run(&args.batch, &registry, None)?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        let verdict = if report.success {
            "done".green().bold()
        } else {
            "incomplete".red().bold()
        };
        println!(
            "batch {}: {} ({} run, {} failed, {} skipped)",
            report.batch_id.bold(),
            verdict,
            report.shards_run,
            report.shards_failed,
            report.shards_skipped
        );
    }
    if !report.success {
        return Err(CliFailure::RunIncomplete {
            failed: report.shards_failed,
        }
        .into());
    }
    Ok(())
}

fn cmd_reset_shard(store: PathBuf, args: RunShardArgs, json: bool) -> anyhow::Result<()> {
    let root = StoreRoot::open(store)?;
    let shard_id = parse_shard(&args.shard)?;
    let state = ShardRunner::new(&root).reset_shard(&args.batch, &args.task, shard_id)?;
    if json {
        println!("{}", serde_json::to_string(&state)?);
    } else {
        println!("shard {} of {}: {}", shard_id, args.task, status_colored(state.status));
    }
    Ok(())
}

fn cmd_index_build(store: PathBuf, args: IndexBuildArgs, json: bool) -> anyhow::Result<()> {
    let root = StoreRoot::open(store)?;
    let stats = build_index(&root, &args.batch, args.rebuild)?;
    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!(
            "{} cache built for {}: {} files, {} outputs, {} diagnostics",
            "✓".green().bold(),
            stats.batch_id.bold(),
            stats.files_indexed,
            stats.outputs_indexed,
            stats.diagnostics_indexed
        );
    }
    Ok(())
}

fn build_filter(args: &QueryArgs) -> anyhow::Result<QueryFilter> {
    let severity = match &args.severity {
        Some(raw) => Some(raw.parse().map_err(|reason| CliFailure::InvalidArgument {
            name: "severity",
            reason,
        })?),
        None => None,
    };
    Ok(QueryFilter {
        task: args.task.clone(),
        kind: args.kind.as_deref().map(OutputKind::from),
        path: args.path.clone(),
        severity,
        code: args.code.clone(),
    })
}

fn router(root: &StoreRoot, no_cache: bool) -> QueryRouter<'_> {
    let router = QueryRouter::new(root);
    if no_cache {
        router.without_cache()
    } else {
        router
    }
}

fn cmd_query(store: PathBuf, query: QueryCommand, json: bool) -> anyhow::Result<()> {
    let root = StoreRoot::open(store)?;
    match query {
        QueryCommand::Outputs(args) => {
            let filter = build_filter(&args)?;
            let (records, _) = router(&root, args.no_cache).query_outputs(&args.batch, &filter)?;
            print_records(&records, json)?;
            check_strict(args.strict, records.len())
        }
        QueryCommand::Diagnostics(args) => {
            let filter = build_filter(&args)?;
            let (records, _) =
                router(&root, args.no_cache).query_diagnostics(&args.batch, &filter)?;
            print_records(&records, json)?;
            check_strict(args.strict, records.len())
        }
        QueryCommand::Stats(args) => {
            let group: StatsGroup = args.group_by.parse().map_err(|reason| {
                CliFailure::InvalidArgument {
                    name: "group-by",
                    reason,
                }
            })?;
            let filter = build_filter(&args.query)?;
            let (stats, _) =
                router(&root, args.query.no_cache).query_stats(&args.query.batch, &filter, group)?;
            if json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                for (value, count) in &stats {
                    println!("{count:>8}  {value}");
                }
            }
            check_strict(args.query.strict, stats.len())
        }
        QueryCommand::FailedFiles(args) => {
            let filter = build_filter(&args)?;
            let paths =
                cb_query::ScanEngine::new(&root).query_failed_files(&args.batch, &filter)?;
            if json {
                println!("{}", serde_json::to_string(&paths)?);
            } else {
                for path in &paths {
                    println!("{path}");
                }
            }
            check_strict(args.strict, paths.len())
        }
    }
}

fn cmd_diff(store: PathBuf, args: DiffArgs, json: bool) -> anyhow::Result<()> {
    let root = StoreRoot::open(store)?;
    if args.regressions {
        let delta = cb_diff::diff_diagnostics(&root, &args.batch_a, &args.batch_b)?;
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "regressions": delta.regressions,
                    "improvements": delta.improvements,
                })
            );
        } else {
            for record in &delta.regressions {
                println!("{} {}", "regression:".red().bold(), describe(record));
            }
            for record in &delta.improvements {
                println!("{} {}", "improvement:".green().bold(), describe(record));
            }
            if delta.is_clean() {
                println!("{} no regressions", "✓".green().bold());
            }
        }
        return Ok(());
    }

    let kind = args.kind.as_deref().map(OutputKind::from);
    let diff = cb_diff::diff_batches(&root, &args.batch_a, &args.batch_b, kind)?;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "added": diff.added,
                "removed": diff.removed,
                "changed": diff
                    .changed
                    .iter()
                    .map(|(old, new)| serde_json::json!({"old": old, "new": new}))
                    .collect::<Vec<_>>(),
                "summary": {
                    "added_count": diff.added.len(),
                    "removed_count": diff.removed.len(),
                    "changed_count": diff.changed.len(),
                },
            })
        );
    } else {
        for record in &diff.added {
            println!("{} {}", "+".green().bold(), describe(record));
        }
        for record in &diff.removed {
            println!("{} {}", "-".red().bold(), describe(record));
        }
        for (_, new) in &diff.changed {
            println!("{} {}", "~".yellow().bold(), describe(new));
        }
        if diff.is_empty() {
            println!("{} batches agree", "✓".green().bold());
        }
    }
    Ok(())
}

fn check_strict(strict: bool, count: usize) -> anyhow::Result<()> {
    if strict && count == 0 {
        return Err(CliFailure::StrictEmpty.into());
    }
    Ok(())
}

fn print_records(records: &[OutputRecord], json: bool) -> anyhow::Result<()> {
    for record in records {
        if json {
            println!(
                "{}",
                serde_json::to_string(record).context("serializing record")?
            );
        } else {
            println!("{}", describe(record));
        }
    }
    Ok(())
}

fn describe(record: &OutputRecord) -> String {
    let p = &record.payload;
    match record.kind {
        OutputKind::Diagnostic => format!(
            "{}:{}:{} {} {} {}",
            record.path,
            p.line.unwrap_or(0),
            p.column.unwrap_or(0),
            p.severity.map(|s| s.to_string()).unwrap_or_default(),
            p.code.as_deref().unwrap_or(""),
            p.message.as_deref().unwrap_or(""),
        ),
        OutputKind::Metric => format!(
            "{} {}={}",
            record.path,
            p.metric.as_deref().unwrap_or(""),
            p.value.clone().unwrap_or_default(),
        ),
        OutputKind::Symbol => format!(
            "{}:{} {} {}",
            record.path,
            p.line.unwrap_or(0),
            p.symbol_type.as_deref().unwrap_or("symbol"),
            p.name.as_deref().unwrap_or(""),
        ),
        OutputKind::Edge => format!(
            "{} {} -> {}",
            record.path,
            p.edge_type.as_deref().unwrap_or("edge"),
            p.target.as_deref().unwrap_or(""),
        ),
        _ => format!(
            "{} {} {}",
            record.path,
            record.kind,
            p.object.map(|o| o.to_ref()).unwrap_or_default(),
        ),
    }
}

fn status_colored(status: ShardStatus) -> colored::ColoredString {
    match status {
        ShardStatus::Done => "done".green(),
        ShardStatus::Failed => "failed".red(),
        ShardStatus::Running => "running".yellow(),
        ShardStatus::Pending => "pending".normal(),
    }
}
