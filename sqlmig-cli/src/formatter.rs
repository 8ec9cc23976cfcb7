//! Rendering of `list` output.

use crate::cli::OutputFormat;
use comfy_table::presets::ASCII_MARKDOWN;
use comfy_table::Table;
use sqlmig::{MigrationRecord, Timestamp};

fn timestamp(value: Option<Timestamp>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn format_records(
    records: &[MigrationRecord],
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(records),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(ASCII_MARKDOWN);
            table.set_header(vec!["Name", "Status", "Started At", "Completed At"]);
            for record in records {
                table.add_row(vec![
                    record.name.clone(),
                    record.status.to_string(),
                    timestamp(record.started_at),
                    timestamp(record.completed_at),
                ]);
            }
            Ok(table.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlmig::MigrationStatus;

    fn records() -> Vec<MigrationRecord> {
        let started = "2016-01-01T10:00:00".parse::<Timestamp>().unwrap();
        vec![
            MigrationRecord {
                name: "1_users".to_string(),
                status: MigrationStatus::Succeeded,
                started_at: Some(started),
                completed_at: Some(started),
            },
            MigrationRecord {
                name: "social/friends".to_string(),
                status: MigrationStatus::Pending,
                started_at: None,
                completed_at: None,
            },
        ]
    }

    #[test]
    fn table() {
        let output = format_records(&records(), OutputFormat::Table).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].contains("Name"));
        assert!(lines[0].contains("Completed At"));
        assert!(lines[2].contains("1_users"));
        assert!(lines[2].contains("succeeded"));
        assert!(lines[2].contains("2016-01-01 10:00:00"));
        assert!(lines[3].contains("social/friends"));
        assert!(lines[3].contains("pending"));
        assert_eq!(lines[3].matches("N/A").count(), 2);
    }

    #[test]
    fn json() {
        let output = format_records(&records(), OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["name"], "1_users");
        assert_eq!(parsed[0]["status"], "succeeded");
        assert_eq!(parsed[1]["status"], "pending");
        assert!(parsed[1]["started_at"].is_null());
    }
}
