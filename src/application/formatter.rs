//! Output formatting for history deliveries.
//!
//! Supports a table view and JSON.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{AnalysisRecord, Mode, Verdict};

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

/// Formats history as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_history_json(records: &[AnalysisRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(records)
}

/// Formats a table listing of history.
pub fn format_history_table(records: &[AnalysisRecord]) -> String {
    if records.is_empty() {
        return "No scans found. Submit a result to start.".to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["File Name", "Date", "Verdict", "Confidence", "Issues"]);

    for record in records {
        let date = record
            .created_at
            .to_date()
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(vec![
            truncate(record.display_name(), 32),
            date,
            verdict_label(record.result),
            format!("{}%", record.confidence),
            truncate(&record.issues.join(", "), 40),
        ]);
    }

    table.to_string()
}

/// One-line description of the active mode.
pub fn format_mode(mode: Mode) -> String {
    match mode {
        Mode::Remote => format!("{} remote store (shared, live)", "●".green().bold()),
        Mode::Local => format!("{} local store (private, snapshot)", "●".yellow().bold()),
    }
}

fn verdict_label(verdict: Verdict) -> String {
    match verdict {
        Verdict::Manipulated => verdict.as_str().red().bold().to_string(),
        Verdict::Genuine => verdict.as_str().green().to_string(),
    }
}

/// Truncates a string to max characters with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewRecord, Timestamp};

    fn sample(name: &str) -> AnalysisRecord {
        NewRecord {
            file_name: name.into(),
            result: Verdict::Manipulated,
            confidence: 96.4,
            issues: vec!["Unnatural Blinking".into()],
        }
        .into_record("demo_1".into(), Timestamp::now(), None)
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("vidéo_très_longue", 8), "vidéo...");
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_table_shows_placeholder_name() {
        colored::control::set_override(false);
        let table = format_history_table(&[sample("")]);
        assert!(table.contains("Unknown Video"));
        assert!(table.contains("MANIPULATED"));
        assert!(table.contains("96.4%"));
    }

    #[test]
    fn test_empty_history_message() {
        assert!(format_history_table(&[]).starts_with("No scans found"));
    }

    #[test]
    fn test_json_keeps_wire_names() {
        let json = format_history_json(&[sample("clip1.mp4")]).unwrap();
        assert!(json.contains("\"fileName\": \"clip1.mp4\""));
        assert!(json.contains("\"createdAt\""));
    }
}
