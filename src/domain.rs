use std::collections::HashMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{COLORS, FALLBACK_CATEGORY, FALLBACK_COLOR};

/// One continuous foreground-application usage interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub app: String,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    #[serde(rename = "duration")]
    pub duration_ms: i64,
}

/// One recorded focus or break interval from the session-tracking export.
/// `category` here is a free-text project label, not a taxonomy category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FocusSession {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub workspace: String,
    pub category: String,
    pub tags: String,
    pub notes: String,
    #[serde(rename = "isFocus")]
    pub is_focus: bool,
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    #[serde(rename = "activeDuration")]
    pub active_duration_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub color: String,
    pub apps: Vec<String>,
    #[serde(rename = "isFocused")]
    pub is_focused: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum TaxonomyError {
    #[error("category '{0}' already exists")]
    DuplicateCategory(String),
    #[error("category '{0}' not found")]
    UnknownCategory(String),
}

/// User-editable app→category taxonomy. The per-category `apps` lists are the
/// source of truth; `app_index` is a derived cache rebuilt in full after every
/// mutation.
#[derive(Clone, Debug)]
pub struct Taxonomy {
    categories: Vec<Category>,
    app_index: HashMap<String, String>,
}

impl Taxonomy {
    pub fn new(categories: Vec<Category>) -> Self {
        let mut taxonomy = Self {
            categories,
            app_index: HashMap::new(),
        };
        taxonomy.rebuild_index();
        taxonomy
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn app_index(&self) -> &HashMap<String, String> {
        &self.app_index
    }

    /// Resolution is an ordered policy: exact index hit, then a membership
    /// scan accepting `app` or `app + ".app"`, then the fixed fallback.
    pub fn resolve(&self, app: &str) -> &str {
        if let Some(name) = self.app_index.get(app) {
            return name;
        }

        let suffixed = format!("{app}.app");
        for category in &self.categories {
            if category
                .apps
                .iter()
                .any(|candidate| candidate == app || *candidate == suffixed)
            {
                return &category.name;
            }
        }

        FALLBACK_CATEGORY
    }

    pub fn color_of(&self, category_name: &str) -> &str {
        self.get(category_name)
            .map(|c| c.color.as_str())
            .unwrap_or(FALLBACK_COLOR)
    }

    pub fn is_focused(&self, category_name: &str) -> bool {
        self.get(category_name).is_some_and(|c| c.is_focused)
    }

    pub fn add_category(
        &mut self,
        name: String,
        color: Option<String>,
        is_focused: bool,
    ) -> Result<(), TaxonomyError> {
        if self.get(&name).is_some() {
            return Err(TaxonomyError::DuplicateCategory(name));
        }

        let color =
            color.unwrap_or_else(|| COLORS[self.categories.len() % COLORS.len()].to_string());
        self.categories.push(Category {
            name,
            color,
            apps: Vec::new(),
            is_focused,
        });
        Ok(())
    }

    /// Assigns `app` to `category`, detaching it from whichever category
    /// currently holds it. Insertion is idempotent.
    pub fn assign_app(&mut self, app: &str, category: &str) -> Result<(), TaxonomyError> {
        if self.get(category).is_none() {
            return Err(TaxonomyError::UnknownCategory(category.to_string()));
        }

        for existing in &mut self.categories {
            existing.apps.retain(|candidate| candidate != app);
        }

        if let Some(target) = self.categories.iter_mut().find(|c| c.name == category) {
            target.apps.push(app.to_string());
        }

        self.rebuild_index();
        Ok(())
    }

    pub fn move_app(&mut self, app: &str, from: &str, to: &str) -> Result<(), TaxonomyError> {
        if self.get(to).is_none() {
            return Err(TaxonomyError::UnknownCategory(to.to_string()));
        }

        if let Some(source) = self.categories.iter_mut().find(|c| c.name == from) {
            source.apps.retain(|candidate| candidate != app);
        }

        if let Some(target) = self.categories.iter_mut().find(|c| c.name == to) {
            if !target.apps.iter().any(|candidate| candidate == app) {
                target.apps.push(app.to_string());
            }
        }

        self.rebuild_index();
        Ok(())
    }

    pub fn remove_app(&mut self, app: &str, category: &str) -> Result<(), TaxonomyError> {
        let Some(source) = self.categories.iter_mut().find(|c| c.name == category) else {
            return Err(TaxonomyError::UnknownCategory(category.to_string()));
        };

        source.apps.retain(|candidate| candidate != app);
        self.rebuild_index();
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.app_index.clear();
        for category in &self.categories {
            for app in &category.apps {
                self.app_index.insert(app.clone(), category.name.clone());
            }
        }
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        default_taxonomy()
    }
}

fn seed(name: &str, color: &str, is_focused: bool, apps: &[&str]) -> Category {
    Category {
        name: name.to_string(),
        color: color.to_string(),
        apps: apps.iter().map(|app| app.to_string()).collect(),
        is_focused,
    }
}

pub fn default_taxonomy() -> Taxonomy {
    Taxonomy::new(vec![
        seed(
            "Writing",
            "#9ece6a",
            true,
            &["Ulysses", "iA Writer", "Scrivener", "iA Writer.app"],
        ),
        seed(
            "Music Creation",
            "#bb9af7",
            true,
            &[
                "Logic Pro",
                "Logic Pro X",
                "Kontakt 7",
                "Kontakt 8",
                "Native Access",
                "Ableton Live",
                "GarageBand",
                "Spitfire Audio",
                "Crow Hill App",
                "Audio MIDI Setup",
                "MainStage",
            ],
        ),
        seed(
            "Browsing",
            "#e0af68",
            false,
            &[
                "Safari",
                "Google Chrome",
                "Firefox",
                "Arc",
                "Brave Browser",
                "Microsoft Edge",
            ],
        ),
        seed(
            "Productivity",
            "#7aa2f7",
            false,
            &[
                "Bear.app",
                "Bear",
                "Obsidian.app",
                "Obsidian",
                "Notion",
                "Logseq.app",
                "Logseq",
                "Notes.app",
                "Notes",
                "Drafts.app",
                "Drafts",
                "Things",
                "Reminders",
                "Calendar",
                "Fantastical",
                "OmniFocus",
            ],
        ),
        seed(
            "Messaging",
            "#f7768e",
            false,
            &[
                "Messages.app",
                "Messages",
                "Discord",
                "Slack",
                "Telegram",
                "WhatsApp",
                "Microsoft Teams",
            ],
        ),
        seed(
            "Code",
            "#73daca",
            false,
            &[
                "Sublime Text.app",
                "Sublime Text",
                "Visual Studio Code",
                "Xcode",
                "iTerm2",
                "Terminal",
                "GitHub Desktop",
                "Tower",
                "Cursor",
            ],
        ),
        seed(
            "Email",
            "#f7768e",
            false,
            &["Mail", "Spark", "Airmail", "Outlook", "Gmail"],
        ),
        seed("Journaling", "#9ece6a", false, &["Day One.app", "Day One", "Journey"]),
        seed(
            "Utility",
            "#565f89",
            false,
            &[
                "Finder",
                "System Settings",
                "System Preferences",
                "Spotlight",
                "Alfred",
                "Raycast",
                "Shortcuts.app",
                "Shortcuts",
                "App Store",
                "Passwords",
                "Keychain Access",
                "1Password",
            ],
        ),
        seed(
            "Entertainment",
            "#ff9e64",
            false,
            &[
                "Music",
                "Spotify",
                "Apple TV",
                "Netflix",
                "YouTube",
                "Podcasts",
                "Books",
            ],
        ),
        seed(
            "Miscellaneous",
            "#787c99",
            false,
            &[
                "JuxtaText",
                "Fizzy",
                "Breveto.app",
                "Preview",
                "Photos",
                "QuickTime Player",
            ],
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_taxonomy() -> Taxonomy {
        Taxonomy::new(vec![
            seed("Writing", "#9ece6a", true, &["Ulysses"]),
            seed("Code", "#73daca", false, &["Xcode", "Terminal.app"]),
        ])
    }

    #[test]
    fn test_resolve_prefers_index() {
        let taxonomy = small_taxonomy();
        assert_eq!(taxonomy.resolve("Ulysses"), "Writing");
        assert_eq!(taxonomy.resolve("Xcode"), "Code");
    }

    #[test]
    fn test_resolve_scans_for_app_suffix_variant() {
        let taxonomy = small_taxonomy();
        // "Terminal" is not in the index but "Terminal.app" is a member.
        assert_eq!(taxonomy.resolve("Terminal"), "Code");
    }

    #[test]
    fn test_resolve_falls_back_to_miscellaneous() {
        let taxonomy = small_taxonomy();
        assert_eq!(taxonomy.resolve("Some Unknown App"), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_duplicate_category_rejected_without_mutation() {
        let mut taxonomy = small_taxonomy();
        let before = taxonomy.categories().to_vec();

        let result = taxonomy.add_category("Writing".to_string(), None, false);
        assert_eq!(
            result,
            Err(TaxonomyError::DuplicateCategory("Writing".to_string()))
        );
        assert_eq!(taxonomy.categories(), &before[..]);
    }

    #[test]
    fn test_move_app_round_trip_restores_membership() {
        let mut taxonomy = small_taxonomy();
        let before = taxonomy.categories().to_vec();

        taxonomy.move_app("Ulysses", "Writing", "Code").unwrap();
        assert_eq!(taxonomy.resolve("Ulysses"), "Code");

        taxonomy.move_app("Ulysses", "Code", "Writing").unwrap();
        assert_eq!(taxonomy.categories(), &before[..]);
    }

    #[test]
    fn test_assign_app_detaches_from_previous_category() {
        let mut taxonomy = small_taxonomy();
        taxonomy.assign_app("Ulysses", "Code").unwrap();

        assert_eq!(taxonomy.resolve("Ulysses"), "Code");
        assert!(taxonomy.get("Writing").unwrap().apps.is_empty());
    }

    #[test]
    fn test_assign_app_is_idempotent() {
        let mut taxonomy = small_taxonomy();
        taxonomy.assign_app("Ulysses", "Writing").unwrap();
        taxonomy.assign_app("Ulysses", "Writing").unwrap();

        let writing = taxonomy.get("Writing").unwrap();
        assert_eq!(
            writing.apps.iter().filter(|app| *app == "Ulysses").count(),
            1
        );
    }

    #[test]
    fn test_assign_to_unknown_category_fails() {
        let mut taxonomy = small_taxonomy();
        assert_eq!(
            taxonomy.assign_app("Ulysses", "Nope"),
            Err(TaxonomyError::UnknownCategory("Nope".to_string()))
        );
    }

    #[test]
    fn test_index_rebuilt_after_remove() {
        let mut taxonomy = small_taxonomy();
        taxonomy.remove_app("Ulysses", "Writing").unwrap();
        assert!(!taxonomy.app_index().contains_key("Ulysses"));
        assert_eq!(taxonomy.resolve("Ulysses"), FALLBACK_CATEGORY);
    }

    #[test]
    fn test_default_taxonomy_has_fallback_category() {
        let taxonomy = default_taxonomy();
        assert!(taxonomy.get(FALLBACK_CATEGORY).is_some());
    }
}
