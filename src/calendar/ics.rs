//! Minimal iCalendar (RFC 5545) parsing: enough to read VEVENTs out of
//! vdirsyncer's one-event-per-file layout.
//!
//! Supported: line unfolding, SUMMARY/LOCATION/DTSTART/DTEND, date vs
//! datetime values (all-day detection), and RRULE expansion for the common
//! FREQ/INTERVAL/COUNT/UNTIL shapes. Timezone identifiers are dropped and
//! times treated as local, which is what the dashboard displays anyway.
//! Anything malformed is skipped, never an error.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, NaiveTime};

/// Upper bound on occurrences expanded from one recurring event.
const MAX_OCCURRENCES: usize = 50;

/// An event start or end, preserving the date/datetime distinction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IcsTime {
    /// VALUE=DATE, an all-day event
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl IcsTime {
    pub fn is_all_day(&self) -> bool {
        matches!(self, IcsTime::Date(_))
    }

    /// Datetime for range checks; dates collapse to midnight.
    pub fn as_datetime(&self) -> NaiveDateTime {
        match self {
            IcsTime::Date(d) => d.and_time(NaiveTime::MIN),
            IcsTime::DateTime(dt) => *dt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VEvent {
    pub summary: String,
    pub location: String,
    pub start: IcsTime,
    pub end: Option<IcsTime>,
    pub rrule: Option<String>,
}

/// Parse every VEVENT in an .ics document. Components without a parsable
/// DTSTART are dropped.
pub fn parse_events(content: &str) -> Vec<VEvent> {
    let lines = unfold(content);
    let mut events = Vec::new();
    let mut current: Option<EventBuilder> = None;

    for line in lines {
        if line == "BEGIN:VEVENT" {
            current = Some(EventBuilder::default());
            continue;
        }
        if line == "END:VEVENT" {
            if let Some(event) = current.take().and_then(EventBuilder::build) {
                events.push(event);
            }
            continue;
        }

        let Some(builder) = current.as_mut() else {
            continue;
        };
        let Some((name, params, value)) = split_property(&line) else {
            continue;
        };

        match name {
            "SUMMARY" => builder.summary = Some(unescape(value)),
            "LOCATION" => builder.location = Some(unescape(value)),
            "DTSTART" => builder.start = parse_time(&params, value),
            "DTEND" => builder.end = parse_time(&params, value),
            "RRULE" => builder.rrule = Some(value.to_string()),
            _ => {}
        }
    }

    events
}

/// Expand a recurring event into start times inside `[range_start, range_end]`,
/// bounded to [`MAX_OCCURRENCES`].
pub fn expand_rrule(
    event: &VEvent,
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
) -> Vec<IcsTime> {
    let Some(rule) = event.rrule.as_deref().and_then(Rule::parse) else {
        return Vec::new();
    };

    let mut occurrences = Vec::new();
    let mut current = event.start;
    let mut emitted: u32 = 0;

    loop {
        let dt = current.as_datetime();
        if dt > range_end {
            break;
        }
        if let Some(until) = rule.until {
            if dt > until {
                break;
            }
        }
        if let Some(count) = rule.count {
            if emitted >= count {
                break;
            }
        }
        emitted += 1;

        if dt >= range_start {
            occurrences.push(current);
            if occurrences.len() >= MAX_OCCURRENCES {
                break;
            }
        }

        current = match rule.step(current) {
            Some(next) => next,
            None => break,
        };
    }

    occurrences
}

#[derive(Default)]
struct EventBuilder {
    summary: Option<String>,
    location: Option<String>,
    start: Option<IcsTime>,
    end: Option<IcsTime>,
    rrule: Option<String>,
}

impl EventBuilder {
    fn build(self) -> Option<VEvent> {
        Some(VEvent {
            summary: self.summary.unwrap_or_else(|| "Untitled".to_string()),
            location: self.location.unwrap_or_default(),
            start: self.start?,
            end: self.end,
            rrule: self.rrule,
        })
    }
}

/// Undo RFC 5545 line folding: a line starting with space or tab continues
/// the previous line.
fn unfold(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in content.lines() {
        if let Some(rest) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        lines.push(raw.trim_end_matches('\r').to_string());
    }
    lines
}

/// Split "NAME;PARAM=X;PARAM=Y:VALUE" into (name, params, value).
fn split_property(line: &str) -> Option<(&str, Vec<&str>, &str)> {
    let (head, value) = line.split_once(':')?;
    let mut parts = head.split(';');
    let name = parts.next()?;
    Some((name, parts.collect(), value))
}

fn parse_time(params: &[&str], value: &str) -> Option<IcsTime> {
    let is_date = params.iter().any(|p| *p == "VALUE=DATE");

    if is_date || (value.len() == 8 && !value.contains('T')) {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .map(IcsTime::Date);
    }

    // Drop a trailing Z; times are displayed as-is
    let trimmed = value.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y%m%dT%H%M%S")
        .ok()
        .map(IcsTime::DateTime)
}

fn unescape(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\,", ",")
        .replace("\\;", ";")
        .replace("\\\\", "\\")
}

#[derive(Debug, PartialEq)]
enum Freq {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

struct Rule {
    freq: Freq,
    interval: u32,
    count: Option<u32>,
    until: Option<NaiveDateTime>,
}

impl Rule {
    /// Parse "FREQ=WEEKLY;INTERVAL=2;COUNT=10" style rules. Unknown parts
    /// are ignored; an unsupported FREQ makes the whole rule unusable.
    fn parse(rule: &str) -> Option<Self> {
        let mut freq = None;
        let mut interval = 1;
        let mut count = None;
        let mut until = None;

        for part in rule.split(';') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key {
                "FREQ" => {
                    freq = match value {
                        "DAILY" => Some(Freq::Daily),
                        "WEEKLY" => Some(Freq::Weekly),
                        "MONTHLY" => Some(Freq::Monthly),
                        "YEARLY" => Some(Freq::Yearly),
                        _ => return None,
                    };
                }
                "INTERVAL" => interval = value.parse().unwrap_or(1),
                "COUNT" => count = value.parse().ok(),
                "UNTIL" => {
                    until = parse_time(&[], value).map(|t| t.as_datetime());
                }
                _ => {}
            }
        }

        Some(Rule {
            freq: freq?,
            interval: interval.max(1),
            count,
            until,
        })
    }

    fn step(&self, time: IcsTime) -> Option<IcsTime> {
        let advance_date = |d: NaiveDate| -> Option<NaiveDate> {
            match self.freq {
                Freq::Daily => d.checked_add_days(Days::new(self.interval as u64)),
                Freq::Weekly => d.checked_add_days(Days::new(self.interval as u64 * 7)),
                Freq::Monthly => d.checked_add_months(Months::new(self.interval)),
                Freq::Yearly => d.with_year(d.year() + self.interval as i32),
            }
        };

        match time {
            IcsTime::Date(d) => advance_date(d).map(IcsTime::Date),
            IcsTime::DateTime(dt) => advance_date(dt.date())
                .map(|d| IcsTime::DateTime(d.and_time(dt.time()))),
        }
    }
}
