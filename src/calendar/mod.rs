//! Calendar reading from vdirsyncer-style directories.
//!
//! Layout: `<base>/<calendar_id>/*.ics`, one event per file, with optional
//! vdir `displayname` and `color` metadata files per calendar.

pub mod ics;

use crate::data::CalendarEvent;
use chrono::{Days, Local, NaiveDateTime, NaiveTime, TimeDelta};
use ics::{IcsTime, VEvent};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Cap on events returned from one read.
const MAX_EVENTS: usize = 50;

/// Known vdirsyncer locations tried after the configured path.
fn fallback_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/calendars")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".local/share/vdirsyncer/calendars"));
    }
    paths.push(PathBuf::from("/root/.local/share/vdirsyncer/calendars"));
    paths
}

/// How the calendar directory was located.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathSource {
    Configured,
    AutoDetected,
}

/// One discovered calendar directory.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
    pub path: String,
    pub event_count: usize,
    pub color: String,
}

/// Resolve the calendar directory: the configured path first, then known
/// vdirsyncer locations. A directory counts only if some subdirectory
/// actually holds .ics files.
pub fn find_calendar_path(configured: &str) -> Option<(PathBuf, PathSource)> {
    let mut candidates: Vec<(PathBuf, PathSource)> = Vec::new();
    if !configured.is_empty() {
        candidates.push((PathBuf::from(configured), PathSource::Configured));
    }
    for fallback in fallback_paths() {
        if fallback != Path::new(configured) {
            candidates.push((fallback, PathSource::AutoDetected));
        }
    }

    candidates
        .into_iter()
        .find(|(path, _)| has_calendar_subdirs(path))
}

fn has_calendar_subdirs(base: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(base) else {
        return false;
    };
    entries
        .flatten()
        .any(|e| e.path().is_dir() && dir_has_ics(&e.path()))
}

fn dir_has_ics(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.path().extension().and_then(|x| x.to_str()) == Some("ics"))
        })
        .unwrap_or(false)
}

/// List calendar subdirectories with their vdir metadata, sorted by id.
pub fn discover_calendars(base: &Path) -> Vec<CalendarInfo> {
    let Ok(entries) = std::fs::read_dir(base) else {
        return Vec::new();
    };

    let mut calendars: Vec<CalendarInfo> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if !path.is_dir() {
                return None;
            }
            let ics_files = list_ics_files(&path);
            if ics_files.is_empty() {
                return None;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            Some(CalendarInfo {
                name: display_name(&path, &id),
                path: path.display().to_string(),
                event_count: ics_files.len(),
                color: read_meta(&path, "color").unwrap_or_default(),
                id,
            })
        })
        .collect();

    calendars.sort_by(|a, b| a.id.cmp(&b.id));
    calendars
}

/// Read upcoming events from the selected calendars (all of them when
/// `enabled` is empty), windowed to `days_ahead` from today's midnight,
/// sorted by start, capped at 50.
pub fn read_calendar_events(
    base: &Path,
    enabled: &[String],
    days_ahead: u32,
) -> Vec<CalendarEvent> {
    let range_start = Local::now().date_naive().and_time(NaiveTime::MIN);
    let Some(range_end) = range_start.checked_add_days(Days::new(days_ahead as u64)) else {
        return Vec::new();
    };

    let Ok(entries) = std::fs::read_dir(base) else {
        return Vec::new();
    };

    let mut keyed: Vec<(NaiveDateTime, CalendarEvent)> = Vec::new();
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().to_string();
        if !enabled.is_empty() && !enabled.iter().any(|e| *e == id) {
            continue;
        }

        let cal_name = display_name(&dir, &id);
        for ics_path in list_ics_files(&dir) {
            let Ok(content) = std::fs::read_to_string(&ics_path) else {
                tracing::warn!("Failed to read {}", ics_path.display());
                continue;
            };
            for event in ics::parse_events(&content) {
                collect_occurrences(&event, range_start, range_end, &cal_name, &mut keyed);
            }
        }
    }

    keyed.sort_by_key(|(start, _)| *start);
    keyed
        .into_iter()
        .take(MAX_EVENTS)
        .map(|(_, event)| event)
        .collect()
}

fn collect_occurrences(
    event: &VEvent,
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
    cal_name: &str,
    out: &mut Vec<(NaiveDateTime, CalendarEvent)>,
) {
    if event.rrule.is_some() {
        let duration = event
            .end
            .map(|end| end.as_datetime() - event.start.as_datetime());
        for occurrence in ics::expand_rrule(event, range_start, range_end) {
            let end = duration.map(|d| occurrence.as_datetime() + d);
            out.push(make_event(event, occurrence, end, cal_name));
        }
        return;
    }

    let start = event.start.as_datetime();
    let end = event
        .end
        .map(|e| e.as_datetime())
        .unwrap_or_else(|| start + TimeDelta::hours(1));
    if start > range_end || end < range_start {
        return;
    }
    out.push(make_event(event, event.start, event.end.map(|e| e.as_datetime()), cal_name));
}

fn make_event(
    event: &VEvent,
    start: IcsTime,
    end: Option<NaiveDateTime>,
    cal_name: &str,
) -> (NaiveDateTime, CalendarEvent) {
    let start_dt = start.as_datetime();
    let all_day = start.is_all_day();
    (
        start_dt,
        CalendarEvent {
            date: start_dt.format("%Y-%m-%d").to_string(),
            time: if all_day {
                "All day".to_string()
            } else {
                start_dt.format("%H:%M").to_string()
            },
            end: match end {
                Some(e) if !all_day => e.format("%H:%M").to_string(),
                _ => String::new(),
            },
            title: event.summary.clone(),
            location: event.location.clone(),
            calendar: cal_name.to_string(),
            all_day,
        },
    )
}

fn list_ics_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("ics"))
                .collect()
        })
        .unwrap_or_default()
}

fn display_name(dir: &Path, id: &str) -> String {
    read_meta(dir, "displayname")
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| friendly_name(id))
}

fn read_meta(dir: &Path, file: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(file))
        .ok()
        .map(|s| s.trim().to_string())
}

/// "work_stuff" -> "Work Stuff"
fn friendly_name(id: &str) -> String {
    id.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
