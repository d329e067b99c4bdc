//! `cardshop status`

use cardshop_core::{SyncRun, SyncRunStatus};
use cardshop_ebay::{AppConfig, SyncEngine};
use cardshop_server::open_database;

pub async fn run(config: AppConfig, runs: u32) -> anyhow::Result<()> {
    let db = open_database(&config).await?;
    let engine = SyncEngine::new(db.clone(), config)?;

    let status = engine.connection_status().await?;
    let listing_count = db.listings().count().await?;
    let recent = db.sync_runs().latest(runs).await?;
    db.close().await;

    println!("eBay connection");
    println!("  credentials:  {}", yes_no(status.has_credentials));
    println!("  connected:    {}", yes_no(status.connected));
    println!("  token:        {:?}", status.token_state);
    if let Some(expires) = status.token_expires_at {
        println!("  expires at:   {}", expires.to_rfc3339());
    }
    println!("  sandbox:      {}", yes_no(status.sandbox));
    println!(
        "  seller:       {}",
        status.seller_id.as_deref().unwrap_or("-")
    );
    if !status.missing.is_empty() {
        println!("  missing:      {}", status.missing.join(", "));
    }
    println!();
    println!("Listings:       {listing_count}");
    println!("Sync interval:  {}h", status.sync_interval_hours);
    match status.last_sync {
        Some(at) => println!("Last sync:      {}", at.to_rfc3339()),
        None => println!("Last sync:      never"),
    }

    if recent.is_empty() {
        println!("\nNo sync runs recorded.");
        return Ok(());
    }

    println!("\nRecent runs");
    for run in &recent {
        println!("  {}", format_run(run));
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn format_run(run: &SyncRun) -> String {
    let started = run.started_at.format("%Y-%m-%d %H:%M:%S");
    let trigger = run.trigger.as_str();
    match run.status {
        SyncRunStatus::Running => format!("{started}  {trigger:<9}  running"),
        SyncRunStatus::Completed => format!(
            "{started}  {trigger:<9}  ok      {} fetched ({}), +{} ~{} -{} kept {}",
            run.fetched,
            run.source.as_deref().unwrap_or("-"),
            run.inserted,
            run.updated,
            run.removed,
            run.preserved + run.kept,
        ),
        SyncRunStatus::Failed => format!(
            "{started}  {trigger:<9}  failed  {}",
            run.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardshop_core::SyncTrigger;
    use chrono::{TimeZone, Utc};

    fn run(status: SyncRunStatus) -> SyncRun {
        SyncRun {
            id: "run-1".into(),
            trigger: SyncTrigger::Cli,
            status,
            source: Some("trading".into()),
            fetched: 12,
            inserted: 2,
            updated: 3,
            unchanged: 7,
            preserved: 1,
            removed: 1,
            kept: 0,
            error: None,
            started_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            finished_at: None,
        }
    }

    #[test]
    fn test_format_completed_run() {
        let line = format_run(&run(SyncRunStatus::Completed));
        assert!(line.starts_with("2026-03-01 09:30:00  cli"));
        assert!(line.contains("12 fetched (trading)"));
        assert!(line.contains("+2 ~3 -1 kept 1"));
    }

    #[test]
    fn test_format_failed_run() {
        let mut failed = run(SyncRunStatus::Failed);
        failed.error = Some("eBay API error".into());
        let line = format_run(&failed);
        assert!(line.contains("failed  eBay API error"));
    }
}
