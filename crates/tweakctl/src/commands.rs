//! Command execution against a [`TweakEngine`].
//!
//! Each command loads only as much as it needs: `categories` stops after
//! the catalog phase, everything else waits for statuses too.

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use tracing::{debug, info};
use tweak_common::CategoryDefinition;
use tweak_engine::{Feedback, TweakEngine};

use crate::cli::{ChangeArg, Commands};
use crate::output;

/// Exit code for partial or total operation failure
pub const EXIT_OPERATION_FAILED: i32 = 1;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one command; returns the process exit code
pub async fn run(engine: &TweakEngine, command: Commands, json: bool) -> Result<i32> {
    match command {
        Commands::List { category } => list(engine, category.as_deref(), json).await,
        Commands::Categories => categories(engine, json).await,
        Commands::Show { id } => show(engine, &id, json).await,
        Commands::Apply { id, option } => apply(engine, &id, option, json).await,
        Commands::Revert { id } => revert(engine, &id, json).await,
        Commands::Commit { changes } => commit(engine, &changes, json).await,
        Commands::RevertAll { ids } => revert_all(engine, &ids, json).await,
        Commands::Info => system_info(engine, json).await,
    }
}

async fn list(engine: &TweakEngine, category: Option<&str>, json: bool) -> Result<i32> {
    engine.ensure_loaded().await?;
    let tweaks = match category {
        Some(id) => {
            let catalog = engine.ensure_catalog().await?;
            if catalog.category(id).is_none() {
                bail!("Unknown category: {}", id);
            }
            engine.tweaks_in_category(id).await
        }
        None => engine.tweaks().await,
    };

    if json {
        print_json(&tweaks)?;
        return Ok(0);
    }
    for tweak in &tweaks {
        println!("{}", output::tweak_line(tweak));
    }
    Ok(0)
}

#[derive(Serialize)]
struct CategoryRow<'a> {
    #[serde(flatten)]
    category: &'a CategoryDefinition,
    tweak_count: usize,
}

async fn categories(engine: &TweakEngine, json: bool) -> Result<i32> {
    let catalog = engine.ensure_catalog().await?;
    let rows: Vec<CategoryRow> = catalog
        .categories()
        .iter()
        .map(|category| CategoryRow {
            category,
            tweak_count: catalog.in_category(&category.id).count(),
        })
        .collect();

    if json {
        print_json(&rows)?;
        return Ok(0);
    }
    for row in &rows {
        println!("{}", output::category_line(row.category, row.tweak_count));
    }
    Ok(0)
}

async fn show(engine: &TweakEngine, id: &str, json: bool) -> Result<i32> {
    engine.ensure_loaded().await?;
    let tweak = engine
        .tweak(id)
        .await
        .ok_or_else(|| anyhow!("Unknown tweak: {}", id))?;

    if json {
        print_json(&tweak)?;
        return Ok(0);
    }
    for line in output::tweak_detail(&tweak) {
        println!("{}", line);
    }
    Ok(0)
}

async fn apply(engine: &TweakEngine, id: &str, option: usize, json: bool) -> Result<i32> {
    engine.ensure_loaded().await?;
    let outcome = engine.apply_tweak(id, option).await?;

    if json {
        print_json(&outcome)?;
    } else {
        println!("{}", output::outcome_line(&outcome));
        print_reboot_notice(engine).await;
    }
    Ok(if outcome.success { 0 } else { EXIT_OPERATION_FAILED })
}

async fn revert(engine: &TweakEngine, id: &str, json: bool) -> Result<i32> {
    engine.ensure_loaded().await?;
    let outcome = engine.revert_tweak(id).await?;

    if json {
        print_json(&outcome)?;
    } else {
        println!("{}", output::outcome_line(&outcome));
        print_reboot_notice(engine).await;
    }
    Ok(if outcome.success { 0 } else { EXIT_OPERATION_FAILED })
}

async fn commit(engine: &TweakEngine, changes: &[ChangeArg], json: bool) -> Result<i32> {
    engine.ensure_loaded().await?;
    for change in changes {
        let staged = engine.stage(&change.tweak_id, change.option_index).await?;
        if !staged {
            debug!(tweak_id = %change.tweak_id, "Already at requested option, nothing staged");
        }
    }
    let pending = engine.pending_count().await;
    info!(pending, "Committing staged changes");

    let summary = engine.batch_apply_pending_changes().await?;

    if json {
        print_json(&summary)?;
    } else if summary.is_empty() {
        println!("Nothing to commit: every tweak is already at the requested option");
    } else {
        for line in output::summary_lines(&summary) {
            println!("{}", line);
        }
        print_reboot_notice(engine).await;
    }
    Ok(if summary.all_succeeded() { 0 } else { EXIT_OPERATION_FAILED })
}

async fn revert_all(engine: &TweakEngine, ids: &[String], json: bool) -> Result<i32> {
    engine.ensure_loaded().await?;
    let summary = engine.batch_revert_tweaks(ids).await?;

    if json {
        print_json(&summary)?;
    } else {
        for line in output::summary_lines(&summary) {
            println!("{}", line);
        }
        print_reboot_notice(engine).await;
    }
    Ok(if summary.all_succeeded() { 0 } else { EXIT_OPERATION_FAILED })
}

async fn system_info(engine: &TweakEngine, json: bool) -> Result<i32> {
    engine.ensure_loaded().await?;
    let info = engine
        .system_info()
        .await
        .ok_or_else(|| anyhow!("Daemon did not report system information"))?;

    if json {
        print_json(&info)?;
        return Ok(0);
    }
    for line in output::system_info_lines(&info) {
        println!("{}", line);
    }
    Ok(0)
}

async fn print_reboot_notice(engine: &TweakEngine) {
    let count = engine.reboot_count().await;
    if count > 0 {
        println!("{}", output::reboot_notice(count));
    }
}

/// Log every feedback event until the engine is dropped
pub async fn log_feedback(mut events: tokio::sync::broadcast::Receiver<Feedback>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match events.recv().await {
            Ok(event) if event.is_success() => info!("{}", event.message()),
            Ok(event) => tracing::warn!("{}", event.message()),
            Err(RecvError::Lagged(missed)) => debug!(missed, "Feedback receiver lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
