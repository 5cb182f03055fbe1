//! Agent liveness signals.
//!
//! Heartbeat mtime is the primary signal; when it is stale the gateway gets
//! probed over HTTP instead (container deployments where the agent process
//! is not visible). Recent error counts come from the tails of known logs.

use std::path::{Path, PathBuf};

const TAIL_LINES: usize = 100;

/// Count case-insensitive "error" lines in the tail of each known log file.
/// Missing logs contribute nothing.
pub fn count_recent_errors(log_files: &[PathBuf]) -> u32 {
    log_files
        .iter()
        .map(|path| count_errors_in_tail(path))
        .sum()
}

fn count_errors_in_tail(path: &Path) -> u32 {
    let Ok(content) = std::fs::read_to_string(path) else {
        return 0;
    };

    let lines: Vec<&str> = content.lines().collect();
    let tail_start = lines.len().saturating_sub(TAIL_LINES);
    lines[tail_start..]
        .iter()
        .filter(|l| l.to_lowercase().contains("error"))
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counts_error_lines_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("agent.log");
        std::fs::write(&log, "ok\nERROR: boom\ninfo\nsome error here\n").unwrap();

        assert_eq!(count_recent_errors(&[log]), 2);
    }

    #[test]
    fn test_only_tail_is_scanned() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("agent.log");
        let mut content = String::from("error: ancient\n");
        for _ in 0..150 {
            content.push_str("fine\n");
        }
        content.push_str("error: recent\n");
        std::fs::write(&log, content).unwrap();

        assert_eq!(count_recent_errors(&[log]), 1);
    }

    #[test]
    fn test_missing_log_contributes_zero() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.log");
        std::fs::write(&present, "error\n").unwrap();
        let missing = dir.path().join("absent.log");

        assert_eq!(count_recent_errors(&[present, missing]), 1);
    }
}
