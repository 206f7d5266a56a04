use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::{ActivityEntry, FocusSession, Taxonomy},
    storage::{self, AppState, StorageError, StoredCategory},
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export error: {0}")]
    Csv(#[from] csv::Error),
    #[error("export io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Full state dump. Re-importing one of these restores entries, sessions and
/// taxonomy wholesale.
#[derive(Serialize, Deserialize)]
pub struct DataExport {
    #[serde(rename = "exportDate")]
    pub export_date: DateTime<Utc>,
    #[serde(rename = "timeSinkData")]
    pub time_sink_data: Vec<ActivityEntry>,
    #[serde(rename = "balanceData")]
    pub balance_data: Vec<FocusSession>,
    pub categories: BTreeMap<String, StoredCategory>,
}

pub fn export_json(state: &AppState) -> Result<String, ExportError> {
    let export = DataExport {
        export_date: Utc::now(),
        time_sink_data: state.entries.clone(),
        balance_data: state.sessions.clone(),
        categories: storage::categories_to_map(&state.taxonomy),
    };

    Ok(serde_json::to_string_pretty(&export).map_err(StorageError::from)?)
}

pub fn parse_backup(content: &str) -> Result<AppState, ExportError> {
    let export: DataExport =
        serde_json::from_str(content).map_err(StorageError::from)?;

    Ok(AppState {
        entries: export.time_sink_data,
        sessions: export.balance_data,
        taxonomy: Taxonomy::new(storage::categories_from_map(export.categories)),
    })
}

pub fn import_backup(path: &Path) -> Result<AppState, ExportError> {
    let content = std::fs::read_to_string(path)?;
    parse_backup(&content)
}

#[derive(Default)]
struct DayTotals {
    total_ms: i64,
    focused_ms: i64,
    category_ms: HashMap<String, i64>,
}

fn hours(ms: i64) -> String {
    format!("{:.2}", ms as f64 / 3_600_000.0)
}

/// One row per calendar day present in the activity data: date, total hours,
/// focused hours, then one column per taxonomy category, hours to two
/// decimals.
pub fn daily_summary_csv(
    entries: &[ActivityEntry],
    taxonomy: &Taxonomy,
) -> Result<String, ExportError> {
    let mut days: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();

    for entry in entries {
        let category = taxonomy.resolve(&entry.app).to_string();
        let day = days.entry(entry.start.date_naive()).or_default();

        day.total_ms += entry.duration_ms;
        *day.category_ms.entry(category.clone()).or_insert(0) += entry.duration_ms;
        if taxonomy.is_focused(&category) {
            day.focused_ms += entry.duration_ms;
        }
    }

    let category_names: Vec<&str> = taxonomy
        .categories()
        .iter()
        .map(|category| category.name.as_str())
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Date".to_string(), "Total Hours".to_string(), "Focused Hours".to_string()];
    header.extend(category_names.iter().map(|name| name.to_string()));
    writer.write_record(&header)?;

    for (date, totals) in &days {
        let mut row = vec![
            date.format("%Y-%m-%d").to_string(),
            hours(totals.total_ms),
            hours(totals.focused_ms),
        ];
        row.extend(
            category_names
                .iter()
                .map(|name| hours(totals.category_ms.get(*name).copied().unwrap_or(0))),
        );
        writer.write_record(&row)?;
    }

    let buffer = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, TimeZone};

    use super::*;
    use crate::{
        aggregate,
        domain::{Category, default_taxonomy},
        period::{self, Granularity},
    };

    fn local(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .unwrap()
    }

    fn entry(app: &str, start: DateTime<Local>, minutes: i64) -> ActivityEntry {
        ActivityEntry {
            app: app.to_string(),
            start,
            end: start + Duration::minutes(minutes),
            duration_ms: minutes * 60_000,
        }
    }

    fn session(start: DateTime<Local>, minutes: i64, is_focus: bool) -> FocusSession {
        FocusSession {
            start,
            end: start + Duration::minutes(minutes),
            workspace: String::new(),
            category: "Novel".to_string(),
            tags: String::new(),
            notes: String::new(),
            is_focus,
            duration_ms: minutes * 60_000,
            active_duration_ms: minutes * 60_000,
        }
    }

    fn small_taxonomy() -> Taxonomy {
        Taxonomy::new(vec![
            Category {
                name: "Writing".to_string(),
                color: "#9ece6a".to_string(),
                apps: vec!["Ulysses".to_string()],
                is_focused: true,
            },
            Category {
                name: "Browsing".to_string(),
                color: "#e0af68".to_string(),
                apps: vec!["Safari".to_string()],
                is_focused: false,
            },
        ])
    }

    #[test]
    fn test_json_round_trip_preserves_aggregates() {
        let state = AppState {
            entries: vec![
                entry("Ulysses", local(2026, 1, 14, 9), 90),
                entry("Safari", local(2026, 1, 14, 11), 45),
            ],
            sessions: vec![session(local(2026, 1, 14, 9), 25, true)],
            taxonomy: small_taxonomy(),
        };

        let json = export_json(&state).unwrap();
        let restored = parse_backup(&json).unwrap();

        let anchor = NaiveDate::from_ymd_opt(2026, 1, 14).unwrap();
        let range = period::range(anchor, Granularity::Day);

        let before = aggregate::aggregate(
            &state.entries,
            &state.sessions,
            &range,
            Granularity::Day,
            &state.taxonomy,
            None,
        );
        let after = aggregate::aggregate(
            &restored.entries,
            &restored.sessions,
            &range,
            Granularity::Day,
            &restored.taxonomy,
            None,
        );

        assert_eq!(before.app_totals, after.app_totals);
        assert_eq!(before.category_totals, after.category_totals);
        assert_eq!(before.total_ms, after.total_ms);
        assert_eq!(before.focus_sessions, after.focus_sessions);
    }

    #[test]
    fn test_daily_csv_one_row_per_day_with_category_columns() {
        let taxonomy = small_taxonomy();
        let entries = vec![
            entry("Ulysses", local(2026, 1, 14, 9), 90),
            entry("Safari", local(2026, 1, 14, 11), 30),
            entry("Safari", local(2026, 1, 15, 9), 60),
        ];

        let csv_text = daily_summary_csv(&entries, &taxonomy).unwrap();
        let lines: Vec<&str> = csv_text.trim().lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Date,Total Hours,Focused Hours,Writing,Browsing");
        assert_eq!(lines[1], "2026-01-14,2.00,1.50,1.50,0.50");
        assert_eq!(lines[2], "2026-01-15,1.00,0.00,0.00,1.00");
    }

    #[test]
    fn test_daily_csv_unknown_app_lands_in_fallback_column() {
        let taxonomy = default_taxonomy();
        let entries = vec![entry("Obscure Tool", local(2026, 1, 14, 9), 60)];

        let csv_text = daily_summary_csv(&entries, &taxonomy).unwrap();
        let lines: Vec<&str> = csv_text.trim().lines().collect();

        let header: Vec<&str> = lines[0].split(',').collect();
        let misc_index = header.iter().position(|h| *h == "Miscellaneous").unwrap();
        let row: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(row[misc_index], "1.00");
    }

    #[test]
    fn test_export_error_on_missing_backup() {
        assert!(import_backup(Path::new("/nonexistent/timeflow-backup.json")).is_err());
    }
}
