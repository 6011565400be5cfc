//! Background scheduler
//!
//! Periodically scans for sites whose `next_check` has passed, runs the
//! full local validator set against them, persists the findings and
//! refreshes the site's run bookkeeping. A per-site failure is logged and
//! does not stop the sweep.

use chrono::Utc;
use seolens_core::types::CheckKind;
use seolens_core::{assembler, discover, validators};
use serde_json::json;

use crate::{AppState, DEFAULT_MAX_URLS};

pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.scheduler_interval);
        loop {
            ticker.tick().await;
            if let Err(err) = run_due_sites(&state).await {
                tracing::warn!(error = %err, "scheduled validation sweep failed");
            }
        }
    })
}

/// One sweep over every due site.
pub async fn run_due_sites(state: &AppState) -> anyhow::Result<()> {
    let due = state.sites.due_before(Utc::now()).await?;
    if due.is_empty() {
        return Ok(());
    }
    tracing::info!(count = due.len(), "running scheduled validations");

    for site in due {
        if let Err(err) = run_site(state, &site.site_id).await {
            tracing::warn!(site_id = %site.site_id, error = %err, "scheduled validation failed");
        }
    }
    Ok(())
}

async fn run_site(state: &AppState, site_id: &str) -> anyhow::Result<()> {
    let Some(site) = state.sites.get(site_id).await? else {
        return Ok(());
    };

    let urls = discover::discover_urls(
        state.fetcher.as_ref(),
        &site.site_url,
        site.sitemap_url.as_deref(),
        DEFAULT_MAX_URLS,
    )
    .await;

    let mut raw = Vec::new();
    for url in &urls {
        raw.extend(
            validators::run_checks(
                state.fetcher.as_ref(),
                url,
                &CheckKind::ALL,
                state.config.pagespeed_api_key.as_deref(),
            )
            .await,
        );
    }

    let assembled = assembler::assemble(raw);
    state.issues.put_issues(site_id, &assembled.issues).await?;

    let now = Utc::now();
    let open_issues = state.issues.count_open(site_id).await?;
    state
        .sites
        .record_run(
            site_id,
            now,
            site.check_schedule.next_check_after(now),
            open_issues,
        )
        .await?;

    tracing::info!(
        site_id,
        urls = urls.len(),
        new_issues = assembled.summary.total_issues,
        open_issues,
        "scheduled validation completed"
    );

    if let Some(webhook) = &site.notification_webhook
        && assembled.summary.total_issues > 0
    {
        notify_webhook(state, webhook, site_id, &assembled.summary).await;
    }

    Ok(())
}

/// Fire-and-forget notification; delivery failures are logged only.
async fn notify_webhook(
    state: &AppState,
    webhook: &str,
    site_id: &str,
    summary: &seolens_core::types::ValidationSummary,
) {
    let payload = json!({
        "site_id": site_id,
        "summary": summary,
    });
    match state.http.post(webhook).json(&payload).send().await {
        Ok(response) if response.status().is_success() => {}
        Ok(response) => {
            tracing::warn!(site_id, webhook, status = %response.status(), "webhook rejected");
        }
        Err(err) => {
            tracing::warn!(site_id, webhook, error = %err, "webhook delivery failed");
        }
    }
}
