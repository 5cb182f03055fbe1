//! Readers for the agent workspace files the dashboard cares about:
//! IDENTITY.md (branding) and HEARTBEAT.md (liveness).

use chrono::{DateTime, Duration, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Parsed IDENTITY.md fields.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub name: String,
    pub description: String,
}

static NAME_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-\s*\*\*Name:\*\*\s*(.+)").expect("valid regex"));
static HEADING_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^IDENTITY\.md\s*[-–—]\s*").expect("valid regex"));
static HEADING_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[-–—]\s*Who Am I\??$").expect("valid regex"));

/// Read IDENTITY.md and extract the agent's display name.
///
/// Prefers the structured `- **Name:** value` field, falling back to the
/// first heading with decorative prefixes/suffixes stripped.
pub fn read_identity(workspace_dir: &Path) -> Option<Identity> {
    let raw = std::fs::read_to_string(workspace_dir.join("IDENTITY.md")).ok()?;

    let mut name = NAME_FIELD
        .captures(&raw)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    if name.is_empty() {
        for line in raw.lines() {
            let line = line.trim();
            if let Some(heading) = line.strip_prefix("# ") {
                let heading = HEADING_PREFIX.replace(heading.trim(), "");
                let heading = HEADING_SUFFIX.replace(&heading, "");
                name = heading.trim().to_string();
                break;
            }
        }
    }

    // First non-heading, non-field line doubles as the description
    let description = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("- **"))
        .unwrap_or_default()
        .to_string();

    Some(Identity { name, description })
}

/// HEARTBEAT.md status.
#[derive(Debug, Clone, Default)]
pub struct Heartbeat {
    pub alive: bool,
    pub last_beat: Option<DateTime<Local>>,
}

/// Check HEARTBEAT.md freshness: the agent counts as alive when the file
/// was touched within `threshold_minutes`.
pub fn read_heartbeat(workspace_dir: &Path, threshold_minutes: i64) -> Heartbeat {
    let path = workspace_dir.join("HEARTBEAT.md");

    let mtime = match path.metadata().and_then(|m| m.modified()) {
        Ok(t) => DateTime::<Local>::from(t),
        Err(_) => return Heartbeat::default(),
    };

    let age = Local::now().signed_duration_since(mtime);
    Heartbeat {
        alive: age < Duration::minutes(threshold_minutes),
        last_beat: Some(mtime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_identity_structured_name_field() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("IDENTITY.md"),
            "# IDENTITY.md - Bubbles - Who Am I?\n\n- **Name:** Bubbles\n\nA helpful crab.\n",
        )
        .unwrap();

        let identity = read_identity(dir.path()).unwrap();
        assert_eq!(identity.name, "Bubbles");
        assert_eq!(identity.description, "A helpful crab.");
    }

    #[test]
    fn test_identity_heading_fallback() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("IDENTITY.md"),
            "# IDENTITY.md - Scuttle - Who Am I?\n\nAgent of chaos.\n",
        )
        .unwrap();

        let identity = read_identity(dir.path()).unwrap();
        assert_eq!(identity.name, "Scuttle");
    }

    #[test]
    fn test_identity_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_identity(dir.path()).is_none());
    }

    #[test]
    fn test_heartbeat_fresh_file_is_alive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("HEARTBEAT.md"), "beat").unwrap();

        let hb = read_heartbeat(dir.path(), 10);
        assert!(hb.alive);
        assert!(hb.last_beat.is_some());
    }

    #[test]
    fn test_heartbeat_missing_file_is_not_alive() {
        let dir = TempDir::new().unwrap();
        let hb = read_heartbeat(dir.path(), 10);
        assert!(!hb.alive);
        assert!(hb.last_beat.is_none());
    }

    #[test]
    fn test_heartbeat_stale_file_is_not_alive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("HEARTBEAT.md");
        std::fs::write(&path, "beat").unwrap();

        let old = std::time::SystemTime::now() - std::time::Duration::from_secs(20 * 60);
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(old).unwrap();

        let hb = read_heartbeat(dir.path(), 10);
        assert!(!hb.alive);
    }
}
