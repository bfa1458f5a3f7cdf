use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::{json, Value};

use histsync_log::SyncMode;
use histsync_processor::{CycleReport, MergeOutcome, PruneOutcome};
use histsync_stack::{SyncConfig, SyncStack};
use histsync_types::{ChangeSet, OriginatorId, RecordChange, Timestamp, Transaction};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        config,
        format,
        ..
    } = cli;
    match command {
        Command::Init(args) => cmd_init(&config, args),
        Command::Append(args) => cmd_append(&open(&config)?, args, format),
        Command::Process => cmd_process(&open(&config)?, format),
        Command::Watch => cmd_watch(&open(&config)?),
        Command::Status => cmd_status(&open(&config)?, format),
        Command::Log(args) => cmd_log(&open(&config)?, args, format),
    }
}

fn open(path: &Path) -> anyhow::Result<SyncStack> {
    let config = SyncConfig::load(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    SyncStack::open(config).context("opening sync stack")
}

fn cmd_init(path: &Path, args: InitArgs) -> anyhow::Result<()> {
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let roster = args
        .roster
        .into_iter()
        .map(OriginatorId::new)
        .collect::<Result<Vec<_>, _>>()?;
    let mut config = SyncConfig::new(OriginatorId::new(args.originator)?, roster, args.data_dir);
    if args.durable {
        config.sync_mode = SyncMode::EveryWrite;
    }
    config.validate()?;

    std::fs::write(path, config.to_toml_string()?)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{} Wrote {}", "✓".green().bold(), path.display().to_string().bold());
    println!("  Originator: {}", config.originator.to_string().cyan());
    println!("  Shared log: {}", config.log_path().display());
    Ok(())
}

fn change_set(args: &AppendArgs) -> anyhow::Result<ChangeSet> {
    if args.delete {
        return Ok(ChangeSet::default().delete(&args.entity, &args.key));
    }
    let raw = args.value.as_deref().context("--value is required unless --delete is given")?;
    let value: Value = serde_json::from_str(raw).with_context(|| format!("--value is not valid JSON: {raw}"))?;
    Ok(ChangeSet::default().upsert(&args.entity, &args.key, value))
}

fn cmd_append(stack: &SyncStack, args: AppendArgs, format: OutputFormat) -> anyhow::Result<()> {
    let changes = change_set(&args)?;
    let Some(tx) = stack.save(changes)? else {
        println!("Nothing to save.");
        return Ok(());
    };

    match format {
        OutputFormat::Json => println!("{}", transaction_json(&tx)),
        OutputFormat::Text => {
            println!("{} Saved {} at {}", "✓".green().bold(), tx.id.to_string().yellow(), tx.timestamp);
        }
    }
    Ok(())
}

fn cmd_process(stack: &SyncStack, format: OutputFormat) -> anyhow::Result<()> {
    let report = stack.process()?;
    match format {
        OutputFormat::Json => println!("{}", report_json(&report)),
        OutputFormat::Text => print_report(&report),
    }
    if report.has_failures() {
        bail!("history cycle finished with failures");
    }
    Ok(())
}

fn print_report(report: &CycleReport) {
    match &report.merge {
        MergeOutcome::Failed(_) => println!("  {} {}", "merge:".red().bold(), report.merge),
        _ => println!("  {} {}", "merge:".green(), report.merge),
    }
    match &report.prune {
        PruneOutcome::Failed(_) => println!("  {} {}", "prune:".red().bold(), report.prune),
        _ => println!("  {} {}", "prune:".green(), report.prune),
    }
}

fn cmd_watch(stack: &SyncStack) -> anyhow::Result<()> {
    // Catch up on anything written while this writer was not running.
    print_report(&stack.process()?);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let handle = stack.watcher().spawn()?;
        println!(
            "Watching {} every {}ms (Ctrl-C to stop)",
            stack.config().log_path().display().to_string().bold(),
            stack.config().poll_interval_ms
        );
        tokio::signal::ctrl_c().await?;
        let signals = handle.shutdown().await?;
        println!("{} Stopped after {} change signals", "✓".green().bold(), signals);
        Ok::<(), anyhow::Error>(())
    })
}

fn watermark_label(watermark: Option<Timestamp>) -> String {
    match watermark {
        Some(ts) => ts.to_string(),
        None => "none".to_string(),
    }
}

fn cmd_status(stack: &SyncStack, format: OutputFormat) -> anyhow::Result<()> {
    let status = stack.status()?;

    if format == OutputFormat::Json {
        let watermarks: serde_json::Map<String, Value> = status
            .watermarks
            .iter()
            .map(|(id, w)| (id.to_string(), w.map_or(Value::Null, |ts| json!(ts.to_string()))))
            .collect();
        println!(
            "{}",
            json!({
                "originator": status.originator.to_string(),
                "watermarks": watermarks,
                "log_len": status.log_len,
                "latest": status.latest.map(|ts| ts.to_string()),
            })
        );
        return Ok(());
    }

    println!("Originator {}", status.originator.to_string().cyan().bold());
    println!("Shared log: {} entries, latest {}", status.log_len.to_string().bold(), watermark_label(status.latest));
    println!("\nWatermarks:");
    for (id, watermark) in &status.watermarks {
        let marker = if *id == status.originator { "*" } else { " " };
        let label = watermark_label(*watermark);
        let label = if watermark.is_some() { label.green() } else { label.dimmed() };
        println!("  {} {:<20} {}", marker, id.to_string(), label);
    }
    Ok(())
}

fn cmd_log(stack: &SyncStack, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut history = stack.history()?;
    if let Some(limit) = args.limit {
        let skip = history.len().saturating_sub(limit);
        history.drain(..skip);
    }

    if format == OutputFormat::Json {
        let entries: Vec<Value> = history.iter().map(transaction_json).collect();
        println!("{}", Value::Array(entries));
        return Ok(());
    }

    if history.is_empty() {
        println!("Shared log is empty.");
        return Ok(());
    }
    for tx in history.iter().rev() {
        if args.oneline {
            println!(
                "{} {} {}@{} ({} changes)",
                tx.id.short_hex().yellow(),
                tx.timestamp.to_string().dimmed(),
                tx.author,
                tx.context_name,
                tx.changes.len()
            );
            continue;
        }
        println!("{}  {}", tx.id.to_string().yellow().bold(), tx.timestamp.to_string().dimmed());
        println!("  Author: {} (context {})", tx.author.to_string().cyan(), tx.context_name);
        for change in tx.changes.changes() {
            match change {
                RecordChange::Upsert { entity, key, value } => {
                    println!("  {} {}/{} = {}", "+".green(), entity, key, value)
                }
                RecordChange::Delete { entity, key } => println!("  {} {}/{}", "-".red(), entity, key),
            }
        }
    }
    Ok(())
}

fn transaction_json(tx: &Transaction) -> Value {
    let changes: Vec<Value> = tx
        .changes
        .changes()
        .iter()
        .map(|change| match change {
            RecordChange::Upsert { entity, key, value } => {
                json!({ "op": "upsert", "entity": entity, "key": key, "value": value })
            }
            RecordChange::Delete { entity, key } => {
                json!({ "op": "delete", "entity": entity, "key": key })
            }
        })
        .collect();
    json!({
        "id": tx.id.to_hex(),
        "author": tx.author.to_string(),
        "context": tx.context_name.to_string(),
        "timestamp": tx.timestamp.to_string(),
        "changes": changes,
    })
}

fn report_json(report: &CycleReport) -> Value {
    let merge = match &report.merge {
        MergeOutcome::NothingToMerge => json!({ "status": "nothing_to_merge" }),
        MergeOutcome::Merged { count, watermark } => {
            json!({ "status": "merged", "count": count, "watermark": watermark.to_string() })
        }
        MergeOutcome::Failed(e) => json!({ "status": "failed", "error": e.to_string() }),
    };
    let prune = match &report.prune {
        PruneOutcome::NoCommonPoint => json!({ "status": "no_common_point" }),
        PruneOutcome::Pruned { cutoff, removed } => {
            json!({ "status": "pruned", "cutoff": cutoff.to_string(), "removed": removed })
        }
        PruneOutcome::Failed(e) => json!({ "status": "failed", "error": e.to_string() }),
    };
    json!({ "merge": merge, "prune": prune })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append_args(value: Option<&str>, delete: bool) -> AppendArgs {
        AppendArgs {
            entity: "note".into(),
            key: "n1".into(),
            value: value.map(str::to_string),
            delete,
        }
    }

    fn init_args(originator: &str, data_dir: &Path) -> InitArgs {
        InitArgs {
            originator: originator.into(),
            roster: vec!["app".into(), "widget".into()],
            data_dir: data_dir.to_path_buf(),
            durable: false,
            force: false,
        }
    }

    #[test]
    fn change_set_parses_json_values() {
        let changes = change_set(&append_args(Some(r#"{"title":"x"}"#), false)).unwrap();
        assert_eq!(
            changes.changes(),
            &[RecordChange::Upsert {
                entity: "note".into(),
                key: "n1".into(),
                value: json!({"title": "x"}),
            }]
        );

        let deletion = change_set(&append_args(None, true)).unwrap();
        assert!(matches!(deletion.changes(), [RecordChange::Delete { .. }]));

        assert!(change_set(&append_args(Some("not json"), false)).is_err());
    }

    #[test]
    fn watermark_labels() {
        assert_eq!(watermark_label(None), "none");
        assert_eq!(watermark_label(Some(Timestamp::new(12, 3))), "12.3");
    }

    #[test]
    fn init_then_append_and_process() {
        let dir = tempfile::tempdir().unwrap();
        let app_config = dir.path().join("app.toml");
        let widget_config = dir.path().join("widget.toml");
        let shared = dir.path().join("shared");

        cmd_init(&app_config, init_args("app", &shared)).unwrap();
        cmd_init(&widget_config, init_args("widget", &shared)).unwrap();
        // Refuses to clobber without --force.
        assert!(cmd_init(&app_config, init_args("app", &shared)).is_err());

        let app = open(&app_config).unwrap();
        cmd_append(&app, append_args(Some("1"), false), OutputFormat::Text).unwrap();

        let widget = open(&widget_config).unwrap();
        cmd_process(&widget, OutputFormat::Json).unwrap();
        assert_eq!(widget.main_context().get("note", "n1"), Some(json!(1)));

        cmd_status(&widget, OutputFormat::Text).unwrap();
        cmd_log(&widget, LogArgs { limit: Some(1), oneline: true }, OutputFormat::Text).unwrap();
    }

    #[test]
    fn init_rejects_originator_outside_roster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        assert!(cmd_init(&path, init_args("intruder", dir.path())).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn report_json_shape() {
        let report = CycleReport {
            merge: MergeOutcome::Merged {
                count: 2,
                watermark: Timestamp::new(20, 0),
            },
            prune: PruneOutcome::NoCommonPoint,
        };
        let value = report_json(&report);
        assert_eq!(value["merge"]["status"], "merged");
        assert_eq!(value["merge"]["count"], 2);
        assert_eq!(value["prune"]["status"], "no_common_point");
    }
}
