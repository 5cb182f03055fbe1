//! Calendar fallback through the gateway: ask the agent to run `khal` and
//! parse its conversational reply.
//!
//! The reply is best effort. The agent may wrap output in code fences, use
//! regional date formats, or group events under weekday headers, so the
//! parser accepts several line shapes and drops anything it cannot read.

use super::GatewayClient;
use crate::data::CalendarEvent;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_EVENTS: usize = 50;

/// YYYY-MM-DD, DD/MM/YYYY, DD.MM.YYYY, DD-MM-YYYY
const DATE: &str = r"(\d{1,4}[/.\-]\d{1,2}[/.\-]\d{2,4})";

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\w*\n?").expect("valid regex"));
static DATE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:Today|Tomorrow|Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday),?\s+(.+)")
        .expect("valid regex")
});
static DATED_TIMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{DATE}\s+(\d{{2}}:\d{{2}})\s+(\d{{2}}:\d{{2}})\s+(.+)"))
        .expect("valid regex")
});
static DATED_START_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^{DATE}\s+(\d{{2}}:\d{{2}})\s+(.+)")).expect("valid regex")
});
static DATED_ALL_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^{DATE}\s+(.+)")).expect("valid regex"));
static TIME_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}:\d{2})[-\s]+(\d{2}:\d{2})\s+(.+)").expect("valid regex"));

/// Ask the agent to run `khal list` and parse the reply into events.
/// Any failure is an empty list, never an error.
pub async fn events_via_gateway(client: &GatewayClient, days: u32) -> Vec<CalendarEvent> {
    let prompt = format!(
        "Run this exact command and return ONLY its raw output with no explanation, \
         no markdown formatting, no code fences:\n\
         khal list today {days}d --format '{{start-date}} {{start-time}} {{end-time}} {{title}}'"
    );

    match client.complete(&prompt, 2000).await {
        Ok(content) if !content.is_empty() => {
            let mut events = parse_khal_output(&content);
            events.truncate(MAX_EVENTS);
            tracing::debug!("Gateway calendar fallback parsed {} events", events.len());
            events
        }
        Ok(_) => {
            tracing::warn!("Gateway calendar fallback returned empty content");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("Gateway calendar fallback failed: {}", e);
            Vec::new()
        }
    }
}

/// Ask the agent for `khal printcalendars` output: one calendar name per line.
pub async fn calendars_via_gateway(client: &GatewayClient) -> Vec<String> {
    let prompt = "Run `khal printcalendars` and return ONLY the raw output, nothing else. \
                  No explanation, no markdown formatting, just the calendar names exactly as printed.";

    let content = match client.complete(prompt, 500).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Gateway calendar discovery failed: {}", e);
            return Vec::new();
        }
    };

    content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with("```") && !l.starts_with('#'))
        .map(|l| l.trim_start_matches(['-', '*']).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Parse `khal list` output lines into normalized events.
pub fn parse_khal_output(content: &str) -> Vec<CalendarEvent> {
    let content = strip_code_fences(content);
    let mut events = Vec::new();
    let mut current_date: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // "Today, 07/02/2026" or "Saturday, 08.02.2026"
        if let Some(captures) = DATE_HEADER.captures(line) {
            if let Some(date) = try_parse_date(captures[1].trim()) {
                current_date = Some(date);
            }
            continue;
        }

        // DATE HH:MM HH:MM Title
        if let Some(c) = DATED_TIMED.captures(line) {
            if let Some(date) = try_parse_date(&c[1]) {
                events.push(event(&date, &c[2], &c[3], c[4].trim(), false));
                continue;
            }
        }

        // DATE HH:MM Title
        if let Some(c) = DATED_START_ONLY.captures(line) {
            if let Some(date) = try_parse_date(&c[1]) {
                events.push(event(&date, &c[2], "", c[3].trim(), false));
                continue;
            }
        }

        // DATE Title (all day)
        if let Some(c) = DATED_ALL_DAY.captures(line) {
            if let Some(date) = try_parse_date(&c[1]) {
                events.push(event(&date, "All day", "", c[2].trim(), true));
                continue;
            }
        }

        // Lines grouped under a date header
        if let Some(date) = &current_date {
            if let Some(c) = TIME_RANGE.captures(line) {
                events.push(event(date, &c[1], &c[2], c[3].trim(), false));
            } else if !line.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                events.push(event(date, "All day", "", line, true));
            }
        }
    }

    events
}

fn event(date: &str, time: &str, end: &str, title: &str, all_day: bool) -> CalendarEvent {
    CalendarEvent {
        date: date.to_string(),
        time: time.to_string(),
        end: end.to_string(),
        title: title.to_string(),
        location: String::new(),
        calendar: "khal".to_string(),
        all_day,
    }
}

fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Normalize regional date formats to YYYY-MM-DD.
fn try_parse_date(s: &str) -> Option<String> {
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%m/%d/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s.trim(), fmt) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}
