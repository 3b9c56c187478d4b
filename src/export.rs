//! Export of the current snapshot to a file or the clipboard.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::model::{LogEntry, LogInfo};

/// Render entries as text, preceded by a header describing the store
pub fn render_export(info: Option<&LogInfo>, entries: &[LogEntry], exported_at: DateTime<Local>) -> String {
    let mut out = String::new();
    if let Some(info) = info {
        out.push_str(&format!("# File: {}\n", info.file_path));
        out.push_str(&format!("# Size: {} bytes\n", info.size));
        out.push_str(&format!("# Total lines: {}\n", info.total_lines));
        out.push_str(&format!("# Last modified: {}\n", info.last_modified));
    }
    out.push_str(&format!(
        "# Exported: {} ({} entries)\n\n",
        exported_at.format("%Y-%m-%d %H:%M:%S"),
        entries.len()
    ));
    for entry in entries {
        out.push_str(&entry.to_line());
        out.push('\n');
    }
    out
}

pub fn export_file_name(at: DateTime<Local>) -> String {
    format!("logs-export-{}.txt", at.format("%Y%m%d-%H%M%S"))
}

/// Write an export into `dir`, returning the created path
pub fn write_export(dir: &Path, contents: &str, at: DateTime<Local>) -> Result<PathBuf> {
    let path = dir.join(export_file_name(at));
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write export to {}", path.display()))?;
    Ok(path)
}

/// Copy entries, one line each, to the system clipboard
pub fn copy_to_clipboard(entries: &[LogEntry]) -> Result<()> {
    let text: Vec<String> = entries.iter().map(LogEntry::to_line).collect();
    let mut clipboard = arboard::Clipboard::new().context("clipboard unavailable")?;
    clipboard
        .set_text(text.join("\n"))
        .context("failed to copy to clipboard")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogLevel;
    use chrono::TimeZone;

    fn entry(id: i64, message: &str) -> LogEntry {
        LogEntry {
            id: Some(id),
            timestamp: "2024-05-01 10:00:00".to_string(),
            level: LogLevel::Error,
            category: Some("db".to_string()),
            function: None,
            message: message.to_string(),
        }
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 5).unwrap()
    }

    #[test]
    fn test_render_with_header() {
        let info = LogInfo {
            file_path: "/var/log/app.log".to_string(),
            size: 2048,
            total_lines: 12,
            last_modified: "2024-05-01T10:00:00Z".to_string(),
        };
        let text = render_export(Some(&info), &[entry(1, "a"), entry(2, "b")], at());
        assert!(text.starts_with("# File: /var/log/app.log\n# Size: 2048 bytes\n"));
        assert!(text.contains("# Exported: 2024-05-01 12:30:05 (2 entries)"));
        assert!(text.ends_with("[ERROR] db: a\n2024-05-01 10:00:00 [ERROR] db: b\n"));
    }

    #[test]
    fn test_render_without_info() {
        let text = render_export(None, &[], at());
        assert_eq!(text, "# Exported: 2024-05-01 12:30:05 (0 entries)\n\n");
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_export(dir.path(), "hello", at()).unwrap();
        assert_eq!(path.file_name().unwrap(), "logs-export-20240501-123005.txt");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
