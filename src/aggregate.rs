use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Timelike};
use itertools::Itertools;

use crate::{
    constants::{APP_PANEL_LIMIT, DAY_VIEW_DEFAULTS},
    domain::{ActivityEntry, FocusSession, Taxonomy},
    period::{Granularity, PeriodRange},
};

/// Everything the presentation layer needs for one reporting period. Pure
/// function of the entity collections, the taxonomy, the range and the
/// filter; no drawing concerns.
#[derive(Clone, Debug)]
pub struct PeriodSummary {
    pub label: String,
    pub app_totals: HashMap<String, i64>,
    pub category_totals: HashMap<String, i64>,
    pub total_ms: i64,
    pub focused_ms: i64,
    pub focus_sessions: usize,
    pub break_sessions: usize,
    pub ranked_categories: Vec<RankedEntry>,
    pub ranked_apps: Vec<RankedEntry>,
    pub projects: Vec<ProjectSummary>,
    pub buckets: BucketSeries,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankedEntry {
    pub name: String,
    pub duration_ms: i64,
    pub percent_label: String,
    pub color: String,
}

/// Rollup of focus sessions by their free-text project label.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectSummary {
    pub name: String,
    pub total_ms: i64,
    pub session_count: usize,
    pub focus_session_count: usize,
    pub notes: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub enum BucketSeries {
    Day(DayView),
    Days(Vec<DayBucket>),
    Months(YearView),
}

/// Day view: both visual tracks share one hour window so their horizontal
/// axes align.
#[derive(Clone, Debug)]
pub struct DayView {
    pub min_hour: u32,
    pub max_hour: u32,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub activity: Vec<TrackSegment>,
    pub sessions: Vec<SessionSegment>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackSegment {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub app: String,
    pub category: String,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSegment {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub is_focus: bool,
}

/// One calendar day of a week or month view.
#[derive(Clone, Debug)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub segments: Vec<HourSpan>,
    pub focus: usize,
    pub breaks: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HourSpan {
    pub start_hour: f64,
    pub end_hour: f64,
    pub category: String,
    pub color: String,
}

#[derive(Clone, Debug)]
pub struct YearView {
    /// Categories ranked by total hours across all buckets, descending;
    /// ties keep first-encountered order. Fixes the stacking order.
    pub stacking_order: Vec<String>,
    pub buckets: Vec<MonthBucket>,
}

#[derive(Clone, Debug)]
pub struct MonthBucket {
    pub key: String,
    pub label: String,
    pub category_hours: HashMap<String, f64>,
    pub focus: usize,
    pub breaks: usize,
}

/// Display contract: strictly-positive shares under one percent render as
/// "<1", never "0".
pub fn percent_label(part: i64, whole: i64) -> String {
    if whole <= 0 || part <= 0 {
        return "0".to_string();
    }

    let percent = part as f64 / whole as f64 * 100.0;
    if percent < 1.0 {
        "<1".to_string()
    } else {
        format!("{}", percent.round() as i64)
    }
}

pub fn aggregate(
    entries: &[ActivityEntry],
    sessions: &[FocusSession],
    range: &PeriodRange,
    granularity: Granularity,
    taxonomy: &Taxonomy,
    category_filter: Option<&str>,
) -> PeriodSummary {
    let filtered_entries: Vec<&ActivityEntry> = entries
        .iter()
        .filter(|entry| entry.start >= range.start && entry.start < range.end)
        .collect();
    let filtered_sessions: Vec<&FocusSession> = sessions
        .iter()
        .filter(|session| session.start >= range.start && session.start < range.end)
        .collect();

    let focus_sessions = filtered_sessions.iter().filter(|s| s.is_focus).count();
    let break_sessions = filtered_sessions.len() - focus_sessions;

    let mut app_totals: HashMap<String, i64> = HashMap::new();
    let mut category_totals: HashMap<String, i64> = HashMap::new();
    let mut total_ms = 0i64;
    let mut focused_ms = 0i64;

    for entry in &filtered_entries {
        *app_totals.entry(entry.app.clone()).or_insert(0) += entry.duration_ms;
        total_ms += entry.duration_ms;

        let category = taxonomy.resolve(&entry.app);
        *category_totals.entry(category.to_string()).or_insert(0) += entry.duration_ms;

        if taxonomy.is_focused(category) {
            focused_ms += entry.duration_ms;
        }
    }

    let buckets = match granularity {
        Granularity::Day => BucketSeries::Day(build_day_view(
            &filtered_entries,
            &filtered_sessions,
            range,
            taxonomy,
        )),
        Granularity::Week | Granularity::Month => BucketSeries::Days(build_day_buckets(
            &filtered_entries,
            &filtered_sessions,
            range,
            taxonomy,
            category_filter,
        )),
        Granularity::Year => BucketSeries::Months(build_year_view(
            &filtered_entries,
            &filtered_sessions,
            range,
            taxonomy,
            category_filter,
        )),
    };

    PeriodSummary {
        label: range.label.clone(),
        ranked_categories: rank_categories(&category_totals, total_ms, taxonomy),
        ranked_apps: rank_apps(&app_totals, total_ms, taxonomy),
        projects: rollup_projects(&filtered_sessions),
        app_totals,
        category_totals,
        total_ms,
        focused_ms,
        focus_sessions,
        break_sessions,
        buckets,
    }
}

fn rank_categories(
    totals: &HashMap<String, i64>,
    total_ms: i64,
    taxonomy: &Taxonomy,
) -> Vec<RankedEntry> {
    totals
        .iter()
        .filter(|(_, duration)| **duration > 0)
        .sorted_by_key(|(name, duration)| (std::cmp::Reverse(**duration), name.clone()))
        .map(|(name, duration)| RankedEntry {
            name: name.clone(),
            duration_ms: *duration,
            percent_label: percent_label(*duration, total_ms),
            color: taxonomy.color_of(name).to_string(),
        })
        .collect()
}

fn rank_apps(totals: &HashMap<String, i64>, total_ms: i64, taxonomy: &Taxonomy) -> Vec<RankedEntry> {
    totals
        .iter()
        .sorted_by_key(|(name, duration)| (std::cmp::Reverse(**duration), name.clone()))
        .take(APP_PANEL_LIMIT)
        .map(|(name, duration)| RankedEntry {
            name: name.clone(),
            duration_ms: *duration,
            percent_label: percent_label(*duration, total_ms),
            color: taxonomy.color_of(taxonomy.resolve(name)).to_string(),
        })
        .collect()
}

fn rollup_projects(sessions: &[&FocusSession]) -> Vec<ProjectSummary> {
    let mut projects: Vec<ProjectSummary> = Vec::new();

    for session in sessions {
        let name = if session.category.is_empty() {
            "Uncategorized"
        } else {
            session.category.as_str()
        };

        let index = match projects.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                projects.push(ProjectSummary {
                    name: name.to_string(),
                    total_ms: 0,
                    session_count: 0,
                    focus_session_count: 0,
                    notes: Vec::new(),
                    tags: Vec::new(),
                });
                projects.len() - 1
            }
        };
        let project = &mut projects[index];

        project.total_ms += session.duration_ms;
        project.session_count += 1;
        if session.is_focus {
            project.focus_session_count += 1;
        }
        if !session.notes.is_empty() && !project.notes.contains(&session.notes) {
            project.notes.push(session.notes.clone());
        }
        if !session.tags.is_empty() && !project.tags.contains(&session.tags) {
            project.tags.push(session.tags.clone());
        }
    }

    projects.sort_by_key(|project| std::cmp::Reverse(project.total_ms));
    projects
}

fn end_hour_of(instant: &DateTime<Local>) -> u32 {
    instant.hour() + if instant.minute() > 0 { 1 } else { 0 }
}

fn build_day_view(
    entries: &[&ActivityEntry],
    sessions: &[&FocusSession],
    range: &PeriodRange,
    taxonomy: &Taxonomy,
) -> DayView {
    let mut min_hour = 24u32;
    let mut max_hour = 0u32;

    for entry in entries {
        min_hour = min_hour.min(entry.start.hour());
        max_hour = max_hour.max(end_hour_of(&entry.end));
    }
    for session in sessions {
        min_hour = min_hour.min(session.start.hour());
        max_hour = max_hour.max(end_hour_of(&session.end));
    }

    if min_hour > max_hour {
        min_hour = DAY_VIEW_DEFAULTS.min_hour;
        max_hour = DAY_VIEW_DEFAULTS.max_hour;
    }

    min_hour = min_hour.saturating_sub(DAY_VIEW_DEFAULTS.padding_hours);
    max_hour = (max_hour + DAY_VIEW_DEFAULTS.padding_hours).min(24);

    let start = range.start + Duration::hours(min_hour as i64);
    let end = range.start + Duration::hours(max_hour as i64);

    let activity = entries
        .iter()
        .filter(|entry| entry.start >= start && entry.start < end)
        .map(|entry| {
            let category = taxonomy.resolve(&entry.app);
            TrackSegment {
                start: entry.start,
                end: entry.end,
                app: entry.app.clone(),
                category: category.to_string(),
                color: taxonomy.color_of(category).to_string(),
            }
        })
        .collect();

    // Sessions are clamped to the shared window; fully-outside ones drop.
    let sessions = sessions
        .iter()
        .filter(|session| session.end >= start && session.start < end)
        .filter_map(|session| {
            let clamped_start = session.start.max(start);
            let clamped_end = session.end.min(end);
            (clamped_end > clamped_start).then(|| SessionSegment {
                start: clamped_start,
                end: clamped_end,
                is_focus: session.is_focus,
            })
        })
        .collect();

    DayView {
        min_hour,
        max_hour,
        start,
        end,
        activity,
        sessions,
    }
}

fn hour_fraction(instant: &DateTime<Local>) -> f64 {
    instant.hour() as f64 + instant.minute() as f64 / 60.0
}

fn build_day_buckets(
    entries: &[&ActivityEntry],
    sessions: &[&FocusSession],
    range: &PeriodRange,
    taxonomy: &Taxonomy,
    category_filter: Option<&str>,
) -> Vec<DayBucket> {
    let mut buckets: Vec<DayBucket> = Vec::new();
    let mut date = range.start.date_naive();
    let end_date = range.end.date_naive();
    while date < end_date {
        buckets.push(DayBucket {
            date,
            segments: Vec::new(),
            focus: 0,
            breaks: 0,
        });
        date += Duration::days(1);
    }

    for entry in entries {
        let category = taxonomy.resolve(&entry.app);
        if category_filter.is_some_and(|filter| filter != category) {
            continue;
        }

        let key = entry.start.date_naive();
        if let Some(bucket) = buckets.iter_mut().find(|bucket| bucket.date == key) {
            bucket.segments.push(HourSpan {
                start_hour: hour_fraction(&entry.start),
                end_hour: hour_fraction(&entry.end),
                category: category.to_string(),
                color: taxonomy.color_of(category).to_string(),
            });
        }
    }

    for session in sessions {
        let key = session.start.date_naive();
        if let Some(bucket) = buckets.iter_mut().find(|bucket| bucket.date == key) {
            if session.is_focus {
                bucket.focus += 1;
            } else {
                bucket.breaks += 1;
            }
        }
    }

    buckets
}

fn build_year_view(
    entries: &[&ActivityEntry],
    sessions: &[&FocusSession],
    range: &PeriodRange,
    taxonomy: &Taxonomy,
    category_filter: Option<&str>,
) -> YearView {
    const MONTH_LABELS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let year = range.start.year();
    let mut buckets: Vec<MonthBucket> = (1..=12)
        .map(|month| MonthBucket {
            key: format!("{year}-{month:02}"),
            label: MONTH_LABELS[month as usize - 1].to_string(),
            category_hours: HashMap::new(),
            focus: 0,
            breaks: 0,
        })
        .collect();

    // Global totals in first-encounter order; the stable sort below keeps
    // that order for ties.
    let mut global_totals: Vec<(String, f64)> = Vec::new();

    for entry in entries {
        let category = taxonomy.resolve(&entry.app);
        if category_filter.is_some_and(|filter| filter != category) {
            continue;
        }

        if entry.start.year() != year {
            continue;
        }
        let bucket = &mut buckets[entry.start.month0() as usize];
        let hours = entry.duration_ms as f64 / 3_600_000.0;
        *bucket
            .category_hours
            .entry(category.to_string())
            .or_insert(0.0) += hours;

        match global_totals.iter_mut().find(|(name, _)| name == category) {
            Some((_, total)) => *total += hours,
            None => global_totals.push((category.to_string(), hours)),
        }
    }

    for session in sessions {
        if session.start.year() != year {
            continue;
        }
        let bucket = &mut buckets[session.start.month0() as usize];
        if session.is_focus {
            bucket.focus += 1;
        } else {
            bucket.breaks += 1;
        }
    }

    let stacking_order = global_totals
        .into_iter()
        .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(name, _)| name)
        .collect();

    YearView {
        stacking_order,
        buckets,
    }
}
