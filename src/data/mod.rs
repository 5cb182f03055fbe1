//! Wire-level data model for the dashboard.
//!
//! Everything here serializes to the JSON shapes the dashboard frontend
//! already consumes: camelCase keys on the snapshot document, lowercase
//! keys on calendar events, and plain string timestamps on CRUD records.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Aggregated per-session statistics, computed by the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStat {
    /// Stable session identifier (file stem or agent session id)
    pub key: String,
    /// Display name, truncated to 20 chars
    pub name: String,
    /// Cumulative token count
    pub tokens: u64,
    /// Cumulative USD cost
    pub cost: f64,
    /// Most recent modification time
    pub updated: DateTime<Local>,
}

/// One point of the 7-day cost chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Weekday label ("Mon", "Tue", ...)
    pub day: String,
    pub cost: f64,
}

/// Agent liveness details embedded in the snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStatusInfo {
    pub running: bool,
    #[serde(rename = "lastBeat", skip_serializing_if = "Option::is_none")]
    pub last_beat: Option<String>,
    #[serde(rename = "lastActivity")]
    pub last_activity: Option<DateTime<Local>>,
    #[serde(rename = "recentErrors")]
    pub recent_errors: u32,
}

/// The aggregate dashboard document. Wholly owned by the collector and
/// replaced atomically on every run; readers always see a complete document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "todayCost")]
    pub today_cost: f64,
    #[serde(rename = "costChange")]
    pub cost_change: f64,
    #[serde(rename = "totalTokens")]
    pub total_tokens: u64,
    #[serde(rename = "todayTokens")]
    pub today_tokens: u64,
    #[serde(rename = "sessionCount")]
    pub session_count: usize,
    /// Top 10 sessions, most recently updated first
    pub sessions: Vec<SessionStat>,
    /// 7-day cost chart, oldest day first
    pub history: Vec<ChartPoint>,
    #[serde(rename = "uptimeMs")]
    pub uptime_ms: Option<u64>,
    #[serde(rename = "agentStatus")]
    pub agent_status: AgentStatusInfo,
    /// Upcoming calendar events (max 15)
    pub calendar: Vec<CalendarEvent>,
    /// Last 20 learning entries, echoed for the dashboard card
    pub learning: Vec<serde_json::Value>,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Local>,
}

impl Default for Snapshot {
    /// The documented empty state served before the first collector run:
    /// zero counts and empty lists rather than an error.
    fn default() -> Self {
        Self {
            today_cost: 0.0,
            cost_change: 0.0,
            total_tokens: 0,
            today_tokens: 0,
            session_count: 0,
            sessions: Vec::new(),
            history: Vec::new(),
            uptime_ms: None,
            agent_status: AgentStatusInfo::default(),
            calendar: Vec::new(),
            learning: Vec::new(),
            generated_at: Local::now(),
        }
    }
}

/// Rolling per-day cost history. Only today's entry is ever rewritten;
/// entries older than 30 days are pruned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyHistory {
    pub daily: std::collections::BTreeMap<String, f64>,
}

/// Normalized calendar event, shared by the ICS reader and the
/// gateway-chat fallback parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM or "All day"
    pub time: String,
    /// HH:MM end time, empty when unknown
    pub end: String,
    pub title: String,
    pub location: String,
    /// Source calendar display name
    pub calendar: String,
    pub all_day: bool,
}

/// A single chat turn, in OpenAI message format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Persisted chat transcript, capped at the last 200 messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    pub messages: Vec<ChatMessage>,
}
