//! The collector: periodically rebuilds the dashboard snapshot from the
//! agent's on-disk state.
//!
//! Runs on a fixed tokio interval (default 5 minutes) plus an mpsc trigger
//! channel for on-demand runs. A failed run logs and waits for the next
//! tick; it never kills the loop.

pub mod sessions;
pub mod status;

use crate::calendar;
use crate::config::Config;
use crate::data::{AgentStatusInfo, ChartPoint, DailyHistory, Snapshot};
use crate::gateway::{khal, GatewayClient};
use crate::store::settings::DashboardSettings;
use crate::store::Store;
use crate::workspace;
use anyhow::Result;
use chrono::{Local, NaiveDate, TimeDelta};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// History entries older than this are pruned.
const HISTORY_RETENTION_DAYS: i64 = 30;

/// Sessions carried on the snapshot (totals still cover all of them).
const SNAPSHOT_SESSIONS: usize = 10;

/// Learning entries echoed into the snapshot for the dashboard card.
const SNAPSHOT_LEARNING: usize = 20;

const CALENDAR_DAYS: u32 = 7;
const SNAPSHOT_CALENDAR_EVENTS: usize = 15;

/// Run one collection pass and atomically replace the snapshot.
pub async fn collect_once(config: &Config, store: &Store) -> Result<Snapshot> {
    let today = Local::now().date_naive();
    let scan = sessions::scan_sessions(&config.sessions_dir());

    let mut history = store.read_history();
    update_history(&mut history, today, scan.today_cost);
    store.write_history(&history)?;

    let chart = chart_points(&history, today);
    let cost_change = scan.today_cost - cost_on(&history, today - TimeDelta::days(1));

    let settings = DashboardSettings::load(store);
    let agent_status = agent_status(config, &settings, &scan).await;
    let mut calendar_events = gather_calendar(&settings, CALENDAR_DAYS).await;
    calendar_events.truncate(SNAPSHOT_CALENDAR_EVENTS);

    let mut top_sessions = scan.sessions.clone();
    top_sessions.truncate(SNAPSHOT_SESSIONS);

    let snapshot = Snapshot {
        today_cost: scan.today_cost,
        cost_change,
        total_tokens: scan.total_tokens,
        today_tokens: scan.today_tokens,
        session_count: scan.sessions.len(),
        sessions: top_sessions,
        history: chart,
        uptime_ms: None,
        agent_status,
        calendar: calendar_events,
        learning: recent_learning(store),
        generated_at: Local::now(),
    };

    store.write_snapshot(&snapshot)?;
    tracing::info!(
        "Collected: {} sessions, {} tokens total, ${:.4} today",
        snapshot.session_count,
        snapshot.total_tokens,
        snapshot.today_cost
    );
    Ok(snapshot)
}

/// The collection loop: interval ticks plus on-demand triggers. Slow runs
/// delay the next tick instead of stacking.
pub async fn run_loop(config: Config, store: Store, mut trigger: mpsc::Receiver<()>) {
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(config.collector.interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            received = trigger.recv() => {
                if received.is_none() {
                    tracing::info!("Collect trigger channel closed, stopping collector");
                    return;
                }
                // Drain queued triggers so a burst runs once
                while trigger.try_recv().is_ok() {}
            }
        }

        if let Err(e) = collect_once(&config, &store).await {
            tracing::warn!("Collection run failed: {:#}", e);
        }
    }
}

/// Overwrite today's entry and prune everything older than 30 days. Prior
/// days are never rewritten.
fn update_history(history: &mut DailyHistory, today: NaiveDate, today_cost: f64) {
    history
        .daily
        .insert(today.format("%Y-%m-%d").to_string(), today_cost);

    let cutoff = (today - TimeDelta::days(HISTORY_RETENTION_DAYS))
        .format("%Y-%m-%d")
        .to_string();
    history.daily.retain(|day, _| *day >= cutoff);
}

/// The last 7 days as chart points, oldest first, zero for absent days.
fn chart_points(history: &DailyHistory, today: NaiveDate) -> Vec<ChartPoint> {
    (0..7)
        .rev()
        .map(|offset| {
            let day = today - TimeDelta::days(offset);
            ChartPoint {
                day: day.format("%a").to_string(),
                cost: cost_on(history, day),
            }
        })
        .collect()
}

fn cost_on(history: &DailyHistory, day: NaiveDate) -> f64 {
    history
        .daily
        .get(&day.format("%Y-%m-%d").to_string())
        .copied()
        .unwrap_or(0.0)
}

/// Liveness: heartbeat freshness first, gateway probe as the fallback for
/// deployments where the agent process is not directly observable.
async fn agent_status(
    config: &Config,
    settings: &DashboardSettings,
    scan: &sessions::SessionScan,
) -> AgentStatusInfo {
    let heartbeat = workspace::read_heartbeat(
        &config.paths.workspace_dir,
        config.collector.heartbeat_threshold_minutes,
    );

    let running = if heartbeat.alive {
        true
    } else {
        match GatewayClient::from_settings(settings) {
            Some(client) => client.probe().await,
            None => false,
        }
    };

    AgentStatusInfo {
        running,
        last_beat: heartbeat.last_beat.map(|t| t.to_rfc3339()),
        last_activity: scan.last_activity,
        recent_errors: status::count_recent_errors(&config.paths.log_files),
    }
}

/// Calendar events for the snapshot: ICS directory first, gateway khal
/// fallback second, else empty.
async fn gather_calendar(settings: &DashboardSettings, days: u32) -> Vec<crate::data::CalendarEvent> {
    if let Some((path, _)) = calendar::find_calendar_path(&settings.calendar_path) {
        let events = calendar::read_calendar_events(&path, &settings.enabled_calendars, days);
        if !events.is_empty() {
            return events;
        }
    }

    match GatewayClient::from_settings(settings) {
        Some(client) => khal::events_via_gateway(&client, days).await,
        None => Vec::new(),
    }
}

fn recent_learning(store: &Store) -> Vec<Value> {
    let entries = crate::store::resources::LEARNING.list(store);
    let Some(all) = entries
        .get(crate::store::resources::LEARNING.key)
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let start = all.len().saturating_sub(SNAPSHOT_LEARNING);
    all[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_history_preserves_prior_days() {
        let mut history = DailyHistory::default();
        history.daily.insert("2026-02-06".to_string(), 0.01);

        update_history(&mut history, date("2026-02-07"), 0.02);

        assert_eq!(history.daily.get("2026-02-06"), Some(&0.01));
        assert_eq!(history.daily.get("2026-02-07"), Some(&0.02));
    }

    #[test]
    fn test_history_today_overwritten_on_rerun() {
        let mut history = DailyHistory::default();
        update_history(&mut history, date("2026-02-07"), 0.02);
        update_history(&mut history, date("2026-02-07"), 0.03);

        assert_eq!(history.daily.len(), 1);
        assert_eq!(history.daily.get("2026-02-07"), Some(&0.03));
    }

    #[test]
    fn test_history_prunes_beyond_thirty_days() {
        let mut history = DailyHistory::default();
        history.daily.insert("2026-01-01".to_string(), 0.5);
        history.daily.insert("2026-02-01".to_string(), 0.5);

        update_history(&mut history, date("2026-02-07"), 0.02);

        assert!(!history.daily.contains_key("2026-01-01"));
        assert!(history.daily.contains_key("2026-02-01"));
    }

    #[test]
    fn test_chart_covers_seven_days_oldest_first() {
        let mut history = DailyHistory::default();
        history.daily.insert("2026-02-07".to_string(), 0.02);
        history.daily.insert("2026-02-06".to_string(), 0.01);

        let chart = chart_points(&history, date("2026-02-07"));
        assert_eq!(chart.len(), 7);
        // 2026-02-07 is a Saturday
        assert_eq!(chart[6], ChartPoint { day: "Sat".to_string(), cost: 0.02 });
        assert_eq!(chart[5], ChartPoint { day: "Fri".to_string(), cost: 0.01 });
        assert_eq!(chart[0].cost, 0.0);
        assert_eq!(chart[0].day, "Sun");
    }
}
