//! Session statistics scan over the agent's sessions directory.
//!
//! The runtime keeps one `<sessionId>.jsonl` transcript per session plus a
//! `sessions.json` index shaped like:
//!
//! ```json
//! {
//!   "agent:default:main": {
//!     "sessionId": "abc123",
//!     "updatedAt": 1706745600000,
//!     "totalTokens": 4700,
//!     "cost": 0.07
//!   }
//! }
//! ```
//!
//! Indexed token/cost figures are authoritative. Transcripts without an
//! index entry fall back to a size-based estimate (~4 chars per token at
//! flat Opus pricing).

use crate::data::SessionStat;
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Flat per-token rate applied when a session carries no indexed cost.
pub const ESTIMATED_COST_PER_TOKEN: f64 = 0.000015;

const SESSIONS_INDEX: &str = "sessions.json";
const NAME_MAX: usize = 20;

#[derive(Debug, Deserialize)]
struct SessionsIndexFile {
    #[serde(flatten)]
    sessions: HashMap<String, SessionIndexEntry>,
}

#[derive(Debug, Deserialize)]
struct SessionIndexEntry {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "totalTokens")]
    total_tokens: Option<u64>,
    cost: Option<f64>,
}

/// Everything one pass over the sessions dir yields. All totals cover every
/// session; `sessions` is the full list sorted most recently updated first
/// (the snapshot truncates to its top 10).
#[derive(Debug, Default)]
pub struct SessionScan {
    pub sessions: Vec<SessionStat>,
    pub total_tokens: u64,
    pub today_tokens: u64,
    pub today_cost: f64,
    pub last_activity: Option<DateTime<Local>>,
}

/// Scan the sessions directory. A missing directory is the empty scan, not
/// an error; individual unreadable files are skipped with a log line.
pub fn scan_sessions(sessions_dir: &Path) -> SessionScan {
    let mut scan = SessionScan::default();
    if !sessions_dir.is_dir() {
        return scan;
    }

    let index = load_index(sessions_dir);
    let today = Local::now().format("%Y-%m-%d").to_string();

    let entries = match std::fs::read_dir(sessions_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", sessions_dir.display(), e);
            return scan;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let (size, mtime) = match entry
            .metadata()
            .and_then(|m| m.modified().map(|t| (m.len(), t)))
        {
            Ok((size, t)) => (size, DateTime::<Local>::from(t)),
            Err(e) => {
                tracing::warn!("Skipping session file {}: {}", path.display(), e);
                continue;
            }
        };

        let (tokens, cost) = match index.get(stem) {
            Some(indexed) => {
                let tokens = indexed.total_tokens.unwrap_or(size / 4);
                let cost = indexed
                    .cost
                    .unwrap_or(tokens as f64 * ESTIMATED_COST_PER_TOKEN);
                (tokens, cost)
            }
            None => {
                let tokens = size / 4;
                (tokens, tokens as f64 * ESTIMATED_COST_PER_TOKEN)
            }
        };

        scan.total_tokens += tokens;
        if mtime.format("%Y-%m-%d").to_string() == today {
            scan.today_tokens += tokens;
            scan.today_cost += cost;
        }
        if scan.last_activity.map(|t| mtime > t).unwrap_or(true) {
            scan.last_activity = Some(mtime);
        }

        scan.sessions.push(SessionStat {
            key: stem.to_string(),
            name: stem.chars().take(NAME_MAX).collect(),
            tokens,
            cost,
            updated: mtime,
        });
    }

    scan.sessions.sort_by(|a, b| b.updated.cmp(&a.updated));
    scan
}

/// The index keyed by sessionId (the transcript file stem). A missing or
/// unparsable index just means every session is estimated.
fn load_index(sessions_dir: &Path) -> HashMap<String, SessionIndexEntry> {
    let path = sessions_dir.join(SESSIONS_INDEX);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return HashMap::new();
    };

    match serde_json::from_str::<SessionsIndexFile>(&content) {
        Ok(file) => file
            .sessions
            .into_values()
            .map(|e| (e.session_id.clone(), e))
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}
