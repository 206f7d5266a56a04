use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local, TimeZone};
use thiserror::Error;

use crate::{
    constants::DEDUP_WINDOW_MS,
    domain::{ActivityEntry, FocusSession},
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Splits one delimited line on commas outside double-quote spans. Quote
/// characters toggle the in-quotes flag and are stripped; there is no
/// escaped-quote support. Fields are trimmed.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == ',' && !in_quotes {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Splits raw export text into rows, dropping blank lines. The header row is
/// kept; the builders skip it.
pub fn parse_rows(content: &str) -> Vec<Vec<String>> {
    content
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

/// Decodes numbers that use `.` as a thousands separator and `,` as the
/// decimal separator, e.g. "1.768.378.261,44". Non-finite results mean the
/// row is invalid.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }

    let cleaned = raw.replace('.', "").replacen(',', ".", 1);
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => None,
    }
}

/// Decodes "D.M.Y[,] H:M" as a local wall-clock instant.
pub fn parse_locale_date(raw: &str) -> Option<DateTime<Local>> {
    let normalized = raw.replacen(',', " ", 1);
    let mut parts = normalized.split_whitespace();
    let date_part = parts.next()?;
    let time_part = parts.next()?;

    let mut date_fields = date_part.split('.');
    let day: u32 = date_fields.next()?.parse().ok()?;
    let month: u32 = date_fields.next()?.parse().ok()?;
    let year: i32 = date_fields.next()?.parse().ok()?;

    let mut time_fields = time_part.split(':');
    let hour: u32 = time_fields.next()?.parse().ok()?;
    let minute: u32 = time_fields.next()?.parse().ok()?;

    let naive = chrono::NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Local.from_local_datetime(&naive).earliest()
}

/// Decodes "H:M" into milliseconds. Absence or malformed input is a
/// recoverable default of 0, not an error.
pub fn parse_duration_hm(raw: &str) -> i64 {
    let Some((hours, minutes)) = raw.split_once(':') else {
        return 0;
    };

    let (Ok(hours), Ok(minutes)) = (hours.trim().parse::<i64>(), minutes.trim().parse::<i64>())
    else {
        return 0;
    };

    (hours * 60 + minutes) * 60 * 1000
}

fn instant_from_epoch_seconds(seconds: f64) -> Option<DateTime<Local>> {
    let millis = (seconds * 1000.0).round() as i64;
    Local.timestamp_millis_opt(millis).single()
}

/// Builds the canonical activity stream from normalized rows (header
/// included). Columns by position: pool, app, window, fgBegin, fgEnd,
/// totalBegin, totalEnd; fgBegin/fgEnd are locale-formatted epoch seconds.
///
/// Deduplication is adjacent-only after the sort by start: an entry is
/// dropped when the previous kept entry has the same app and a start within
/// the dedup window. Non-adjacent duplicates are intentionally not caught.
pub fn build_activity_entries(rows: &[Vec<String>]) -> Vec<ActivityEntry> {
    let mut entries = Vec::new();

    for row in rows.iter().skip(1) {
        let app = row.get(1).map(String::as_str).unwrap_or("");
        let fg_begin = row.get(3).map(String::as_str).unwrap_or("");
        let fg_end = row.get(4).map(String::as_str).unwrap_or("");

        if app.is_empty() || fg_begin.is_empty() || fg_begin == "0,00" || fg_begin == "0.00" {
            continue;
        }

        let (Some(start_secs), Some(end_secs)) =
            (parse_locale_number(fg_begin), parse_locale_number(fg_end))
        else {
            continue;
        };
        if start_secs <= 0.0 || end_secs <= 0.0 || end_secs <= start_secs {
            continue;
        }

        let (Some(start), Some(end)) = (
            instant_from_epoch_seconds(start_secs),
            instant_from_epoch_seconds(end_secs),
        ) else {
            continue;
        };

        // Unify bundle names like "Mail.app" with display names.
        let app = app.strip_suffix(".app").unwrap_or(app).trim();
        if app.is_empty() {
            continue;
        }

        entries.push(ActivityEntry {
            app: app.to_string(),
            start,
            end,
            duration_ms: end.timestamp_millis() - start.timestamp_millis(),
        });
    }

    entries.sort_by_key(|entry| entry.start);

    let mut deduped: Vec<ActivityEntry> = Vec::new();
    for entry in entries {
        if let Some(last) = deduped.last() {
            let gap = (entry.start.timestamp_millis() - last.start.timestamp_millis()).abs();
            if last.app == entry.app && gap < DEDUP_WINDOW_MS {
                continue;
            }
        }
        deduped.push(entry);
    }

    deduped
}

/// Builds focus sessions from normalized rows (header included). Columns by
/// position: start, end, workspace, category, tags, notes, isFocus, duration,
/// activeDuration. Rows whose start or end fail to decode are discarded.
/// No sorting or deduplication is applied.
pub fn build_focus_sessions(rows: &[Vec<String>]) -> Vec<FocusSession> {
    let mut sessions = Vec::new();

    for row in rows.iter().skip(1) {
        let field = |index: usize| row.get(index).map(String::as_str).unwrap_or("");

        let (Some(start), Some(end)) =
            (parse_locale_date(field(0)), parse_locale_date(field(1)))
        else {
            continue;
        };

        sessions.push(FocusSession {
            start,
            end,
            workspace: field(2).to_string(),
            category: field(3).to_string(),
            tags: field(4).to_string(),
            notes: field(5).to_string(),
            is_focus: field(6) == "Y",
            duration_ms: parse_duration_hm(field(7)),
            active_duration_ms: parse_duration_hm(field(8)),
        });
    }

    sessions
}

pub fn import_activity_log(path: &Path) -> Result<Vec<ActivityEntry>, ImportError> {
    let content = fs::read_to_string(path).map_err(|source| ImportError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(build_activity_entries(&parse_rows(&content)))
}

pub fn import_session_log(path: &Path) -> Result<Vec<FocusSession>, ImportError> {
    let content = fs::read_to_string(path).map_err(|source| ImportError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(build_focus_sessions(&parse_rows(&content)))
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub days: usize,
    pub apps: usize,
    pub total_hours: f64,
    pub projects: usize,
}

pub fn import_summary(entries: &[ActivityEntry], sessions: &[FocusSession]) -> ImportSummary {
    let mut days = HashSet::new();
    let mut apps = HashSet::new();
    let mut total_ms: i64 = 0;

    for entry in entries {
        days.insert(entry.start.date_naive());
        apps.insert(entry.app.as_str());
        total_ms += entry.duration_ms;
    }

    for session in sessions {
        days.insert(session.start.date_naive());
    }

    let projects: HashSet<&str> = sessions
        .iter()
        .map(|session| session.category.as_str())
        .filter(|category| !category.is_empty())
        .collect();

    ImportSummary {
        days: days.len(),
        apps: apps.len(),
        total_hours: total_ms as f64 / 3_600_000.0,
        projects: projects.len(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn test_parse_line_splits_outside_quotes() {
        assert_eq!(
            parse_line(r#"a,"b, c",d"#),
            vec!["a".to_string(), "b, c".to_string(), "d".to_string()]
        );
    }

    #[test]
    fn test_parse_line_trims_fields() {
        assert_eq!(
            parse_line(" a , b "),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_parse_locale_number_thousands_and_decimal() {
        assert_eq!(
            parse_locale_number("1.768.378.261,44"),
            Some(1_768_378_261.44)
        );
        assert_eq!(parse_locale_number("0,50"), Some(0.5));
        assert_eq!(parse_locale_number(""), None);
        assert_eq!(parse_locale_number("abc"), None);
    }

    #[test]
    fn test_parse_locale_date_components() {
        let parsed = parse_locale_date("14.1.2026, 10:42").unwrap();
        assert_eq!(parsed.year(), 2026);
        assert_eq!(parsed.month(), 1);
        assert_eq!(parsed.day(), 14);
        assert_eq!(parsed.hour(), 10);
        assert_eq!(parsed.minute(), 42);
    }

    #[test]
    fn test_parse_locale_date_without_comma() {
        assert!(parse_locale_date("1.12.2025 8:05").is_some());
        assert!(parse_locale_date("not a date").is_none());
        assert!(parse_locale_date("31.2.2026, 10:00").is_none());
    }

    #[test]
    fn test_parse_duration_hm() {
        assert_eq!(parse_duration_hm("1:21"), 81 * 60 * 1000);
        assert_eq!(parse_duration_hm("0:05"), 5 * 60 * 1000);
        assert_eq!(parse_duration_hm(""), 0);
        assert_eq!(parse_duration_hm("junk"), 0);
    }

    fn activity_row(app: &str, begin_secs: i64, end_secs: i64) -> String {
        format!("pool,{app},window,{begin_secs},{end_secs},0,0")
    }

    fn activity_content(rows: &[String]) -> String {
        let mut content =
            String::from("Pool,Application,Window,FG Begin,FG End,Total Begin,Total End\n");
        content.push_str(&rows.join("\n"));
        content
    }

    #[test]
    fn test_build_activity_entries_skips_invalid_rows() {
        let content = activity_content(&[
            activity_row("Safari", 1_768_378_000, 1_768_378_100),
            "pool,,window,1768378000,1768378100,0,0".to_string(),
            "pool,Mail,window,0.00,1768378100,0,0".to_string(),
            "pool,Mail,window,,1768378100,0,0".to_string(),
        ]);

        let entries = build_activity_entries(&parse_rows(&content));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].app, "Safari");
        assert_eq!(entries[0].duration_ms, 100_000);
    }

    #[test]
    fn test_build_activity_entries_strips_app_suffix() {
        let content = activity_content(&[activity_row("Mail.app", 1_768_378_000, 1_768_378_060)]);
        let entries = build_activity_entries(&parse_rows(&content));
        assert_eq!(entries[0].app, "Mail");
    }

    #[test]
    fn test_build_activity_entries_sorted_by_start() {
        let content = activity_content(&[
            activity_row("Safari", 1_768_378_200, 1_768_378_300),
            activity_row("Mail", 1_768_378_000, 1_768_378_100),
        ]);

        let entries = build_activity_entries(&parse_rows(&content));
        assert_eq!(entries[0].app, "Mail");
        assert_eq!(entries[1].app, "Safari");
    }

    #[test]
    fn test_dedup_collapses_near_duplicate_starts() {
        // Starts 500ms apart: fractional epoch seconds in locale format.
        let content = activity_content(&[
            "pool,Safari,window,\"1.768.378.000,00\",\"1.768.378.100,00\",0,0".to_string(),
            "pool,Safari,window,\"1.768.378.000,50\",\"1.768.378.100,00\",0,0".to_string(),
        ]);

        let entries = build_activity_entries(&parse_rows(&content));
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_dedup_keeps_starts_over_a_second_apart() {
        let content = activity_content(&[
            "pool,Safari,window,\"1.768.378.000,00\",\"1.768.378.100,00\",0,0".to_string(),
            "pool,Safari,window,\"1.768.378.001,50\",\"1.768.378.100,00\",0,0".to_string(),
        ]);

        let entries = build_activity_entries(&parse_rows(&content));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_dedup_ignores_different_apps() {
        let content = activity_content(&[
            "pool,Safari,window,\"1.768.378.000,00\",\"1.768.378.100,00\",0,0".to_string(),
            "pool,Mail,window,\"1.768.378.000,40\",\"1.768.378.100,00\",0,0".to_string(),
        ]);

        let entries = build_activity_entries(&parse_rows(&content));
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_build_focus_sessions_parses_fields() {
        let content = "Start,End,Workspace,Category,Tags,Notes,Focus,Duration,Active\n\
                       \"14.1.2026, 10:00\",\"14.1.2026, 11:21\",Studio,Novel,draft,chapter 3,Y,1:21,1:15\n\
                       \"14.1.2026, 11:30\",\"14.1.2026, 11:45\",Studio,Novel,,,N,0:15,0:15\n\
                       ,\"14.1.2026, 12:00\",Studio,Novel,,,Y,0:10,0:10\n";

        let sessions = build_focus_sessions(&parse_rows(content));
        assert_eq!(sessions.len(), 2);

        assert!(sessions[0].is_focus);
        assert_eq!(sessions[0].workspace, "Studio");
        assert_eq!(sessions[0].category, "Novel");
        assert_eq!(sessions[0].duration_ms, 81 * 60 * 1000);
        assert_eq!(sessions[0].active_duration_ms, 75 * 60 * 1000);

        assert!(!sessions[1].is_focus);
        assert_eq!(sessions[1].duration_ms, 15 * 60 * 1000);
    }

    #[test]
    fn test_import_summary_counts_distinct_days_apps_projects() {
        let content = activity_content(&[
            activity_row("Safari", 1_768_378_000, 1_768_381_600),
            activity_row("Mail", 1_768_478_000, 1_768_481_600),
        ]);
        let entries = build_activity_entries(&parse_rows(&content));

        let sessions_content = "Start,End,Workspace,Category,Tags,Notes,Focus,Duration,Active\n\
             \"14.1.2026, 10:00\",\"14.1.2026, 11:00\",Studio,Novel,,,Y,1:00,1:00\n";
        let sessions = build_focus_sessions(&parse_rows(sessions_content));

        let summary = import_summary(&entries, &sessions);
        assert_eq!(summary.apps, 2);
        assert_eq!(summary.projects, 1);
        assert!(summary.total_hours > 1.9 && summary.total_hours < 2.1);
    }

    #[test]
    fn test_unreadable_file_is_a_single_error() {
        let result = import_activity_log(Path::new("/nonexistent/timeflow-test.csv"));
        assert!(matches!(result, Err(ImportError::Unreadable { .. })));
    }
}
