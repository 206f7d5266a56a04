pub const COLORS: [&str; 12] = [
    "#9ece6a",
    "#bb9af7",
    "#e0af68",
    "#7aa2f7",
    "#f7768e",
    "#73daca",
    "#ff9e64",
    "#565f89",
    "#2ac3de",
    "#b4f9f8",
    "#c0caf5",
    "#787c99",
];

pub const FALLBACK_CATEGORY: &str = "Miscellaneous";
pub const FALLBACK_COLOR: &str = "#9CA3AF";

// Adjacent activity entries for the same app starting closer together than
// this are one foreground-focus burst.
pub const DEDUP_WINDOW_MS: i64 = 1000;

pub const STORAGE_FILE: &str = "timeflow_data.json";

pub const DAY_VIEW_DEFAULTS: DayViewDefaults = DayViewDefaults {
    min_hour: 9,
    max_hour: 18,
    padding_hours: 1,
};

pub const APP_PANEL_LIMIT: usize = 15;

pub struct DayViewDefaults {
    pub min_hour: u32,
    pub max_hour: u32,
    pub padding_hours: u32,
}
