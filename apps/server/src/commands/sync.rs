//! `cardshop sync` and `cardshop refresh-token`

use tracing::{error, info};

use cardshop_core::SyncTrigger;
use cardshop_ebay::AppConfig;
use cardshop_server::build_state;

/// Runs one sync. Fails (non-zero exit) when the sync fails.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let state = build_state(config).await?;

    println!("Starting eBay sync...");
    let outcome = state.engine.run(SyncTrigger::Cli).await;
    state.db.close().await;

    if !outcome.success {
        error!(message = %outcome.message, "Sync failed");
        anyhow::bail!("sync failed: {}", outcome.message);
    }

    info!(run_id = ?outcome.run_id, "Sync finished");
    println!("{}", outcome.message);
    if let Some(report) = &outcome.report {
        println!("  source:    {}", report.source.map(|s| s.as_str()).unwrap_or("-"));
        println!("  kept:      {}", report.kept);
    }
    Ok(())
}

/// Forces a token refresh.
pub async fn refresh_token(config: AppConfig) -> anyhow::Result<()> {
    let state = build_state(config).await?;
    let result = state.engine.refresh_token_now().await;
    state.db.close().await;

    let grant = result?;
    println!(
        "Access token refreshed, valid until {}",
        grant.expires_at.to_rfc3339()
    );
    Ok(())
}
