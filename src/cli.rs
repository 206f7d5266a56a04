use std::{io, path::PathBuf};

use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

use crate::{
    aggregate::{self, BucketSeries, PeriodSummary},
    export, ingest,
    period::{self, Granularity},
    storage,
};

#[derive(Parser, Debug)]
#[command(name = "timeflow")]
#[command(about = "Aggregate desktop activity and focus-session logs", long_about = None)]
pub enum Cli {
    #[command(about = "Import an exported log or a backup", subcommand)]
    Import(ImportCommand),

    #[command(about = "Show an aggregated report for one period")]
    Report {
        #[arg(long, value_enum, default_value = "day", help = "Reporting granularity")]
        period: Granularity,

        #[arg(long, help = "Anchor date (YYYY-MM-DD), defaults to today")]
        date: Option<NaiveDate>,

        #[arg(
            long,
            default_value_t = 0,
            allow_negative_numbers = true,
            help = "Shift the anchor by this many periods"
        )]
        offset: i32,

        #[arg(long, short, help = "Restrict the bucket breakdown to one category")]
        category: Option<String>,
    },

    #[command(about = "Manage the app-to-category taxonomy", subcommand)]
    Category(CategoryCommand),

    #[command(about = "Export stored data")]
    Export {
        #[arg(long, value_enum, help = "Export format")]
        format: ExportFormat,

        #[arg(long, short, help = "Output path")]
        out: Option<PathBuf>,
    },

    #[command(about = "Delete all stored data")]
    Clear,

    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(help = "Shell type (bash, zsh, fish)")]
        shell: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ImportCommand {
    #[command(about = "Import a per-app activity export")]
    Activity {
        #[arg(help = "Path to the activity CSV")]
        file: PathBuf,
    },

    #[command(about = "Import a focus/break session export")]
    Sessions {
        #[arg(help = "Path to the session CSV")]
        file: PathBuf,
    },

    #[command(about = "Restore a previously exported JSON backup")]
    Backup {
        #[arg(help = "Path to the backup JSON")]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    #[command(about = "List categories and their apps")]
    List,

    #[command(about = "Add a category")]
    Add {
        #[arg(help = "Category name")]
        name: String,

        #[arg(long, help = "Hex color, defaults to the next palette color")]
        color: Option<String>,

        #[arg(long, help = "Count this category toward focused time")]
        focused: bool,
    },

    #[command(about = "Assign an app to a category")]
    Assign {
        #[arg(help = "App name")]
        app: String,

        #[arg(help = "Category name")]
        category: String,
    },

    #[command(about = "Move an app between categories")]
    Move {
        #[arg(help = "App name")]
        app: String,

        #[arg(help = "Current category")]
        from: String,

        #[arg(help = "Target category")]
        to: String,
    },

    #[command(about = "Detach an app from a category")]
    Remove {
        #[arg(help = "App name")]
        app: String,

        #[arg(help = "Category name")]
        category: String,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

fn format_hms(ms: i64) -> String {
    let seconds = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

pub fn import_activity(file: PathBuf) -> Result<(), String> {
    let state_path = storage::get_state_path();
    let mut state = storage::load_state(&state_path);

    // The collection is replaced only once the whole file has parsed.
    state.entries = ingest::import_activity_log(&file).map_err(|e| e.to_string())?;

    let summary = ingest::import_summary(&state.entries, &state.sessions);
    if let Err(e) = storage::save_state(&state_path, &state) {
        eprintln!("Warning: could not persist imported data: {e}");
    }

    println!(
        "Imported {} entries: {} apps across {} days ({:.1} hours)",
        state.entries.len(),
        summary.apps,
        summary.days,
        summary.total_hours
    );
    Ok(())
}

pub fn import_sessions(file: PathBuf) -> Result<(), String> {
    let state_path = storage::get_state_path();
    let mut state = storage::load_state(&state_path);

    state.sessions = ingest::import_session_log(&file).map_err(|e| e.to_string())?;

    let summary = ingest::import_summary(&state.entries, &state.sessions);
    if let Err(e) = storage::save_state(&state_path, &state) {
        eprintln!("Warning: could not persist imported data: {e}");
    }

    println!(
        "Imported {} sessions across {} projects",
        state.sessions.len(),
        summary.projects
    );
    Ok(())
}

pub fn restore_backup(file: PathBuf) -> Result<(), String> {
    let state = export::import_backup(&file).map_err(|e| e.to_string())?;

    let state_path = storage::get_state_path();
    if let Err(e) = storage::save_state(&state_path, &state) {
        eprintln!("Warning: could not persist restored data: {e}");
    }

    println!(
        "Restored {} entries, {} sessions and {} categories",
        state.entries.len(),
        state.sessions.len(),
        state.taxonomy.categories().len()
    );
    Ok(())
}

pub fn report(
    granularity: Granularity,
    date: Option<NaiveDate>,
    offset: i32,
    category: Option<String>,
) -> Result<(), String> {
    let state = storage::load_state(&storage::get_state_path());

    if let Some(name) = category.as_deref() {
        if state.taxonomy.get(name).is_none() {
            return Err(format!("Category '{}' not found", name));
        }
    }

    let mut anchor = date.unwrap_or_else(|| Local::now().date_naive());
    if offset != 0 {
        anchor = period::navigate(anchor, granularity, offset);
    }

    let range = period::range(anchor, granularity);
    let summary = aggregate::aggregate(
        &state.entries,
        &state.sessions,
        &range,
        granularity,
        &state.taxonomy,
        category.as_deref(),
    );

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &PeriodSummary) {
    println!("{}", summary.label);
    println!("{}", "-".repeat(40));
    println!("{:20} {}", "Total", format_hms(summary.total_ms));
    println!("{:20} {}", "Focused", format_hms(summary.focused_ms));
    println!(
        "{:20} {} focus / {} break",
        "Sessions", summary.focus_sessions, summary.break_sessions
    );

    if !summary.ranked_categories.is_empty() {
        println!();
        println!("Categories");
        for entry in &summary.ranked_categories {
            println!(
                "{:20} {} {:>3}%",
                entry.name,
                format_hms(entry.duration_ms),
                entry.percent_label
            );
        }
    }

    if !summary.ranked_apps.is_empty() {
        println!();
        println!("Top apps");
        for entry in &summary.ranked_apps {
            println!(
                "{:20} {} {:>3}%",
                entry.name,
                format_hms(entry.duration_ms),
                entry.percent_label
            );
        }
    }

    if !summary.projects.is_empty() {
        println!();
        println!("Projects");
        for project in &summary.projects {
            println!(
                "{:20} {} ({} sessions, {} focused)",
                project.name,
                format_hms(project.total_ms),
                project.session_count,
                project.focus_session_count
            );
        }
    }

    match &summary.buckets {
        BucketSeries::Day(view) => {
            println!();
            println!(
                "Timeline {:02}:00-{:02}:00: {} activity spans, {} sessions",
                view.min_hour,
                view.max_hour,
                view.activity.len(),
                view.sessions.len()
            );
        }
        BucketSeries::Days(buckets) => {
            println!();
            for bucket in buckets {
                let hours: f64 = bucket
                    .segments
                    .iter()
                    .map(|span| span.end_hour - span.start_hour)
                    .sum();
                println!(
                    "{:10} {:5.1}h  {} focus / {} break",
                    bucket.date.format("%a %b %-d").to_string(),
                    hours,
                    bucket.focus,
                    bucket.breaks
                );
            }
        }
        BucketSeries::Months(view) => {
            println!();
            for bucket in &view.buckets {
                let hours: f64 = bucket.category_hours.values().sum();
                println!(
                    "{:4} {:6.1}h  {} focus / {} break",
                    bucket.label, hours, bucket.focus, bucket.breaks
                );
            }
        }
    }
}

pub fn category_command(command: CategoryCommand) -> Result<(), String> {
    let state_path = storage::get_state_path();
    let mut state = storage::load_state(&state_path);

    match command {
        CategoryCommand::List => {
            for category in state.taxonomy.categories() {
                let marker = if category.is_focused { "*" } else { " " };
                println!(
                    "{marker} {:20} {}  {}",
                    category.name,
                    category.color,
                    category.apps.join(", ")
                );
            }
            return Ok(());
        }
        CategoryCommand::Add {
            name,
            color,
            focused,
        } => {
            state
                .taxonomy
                .add_category(name.clone(), color, focused)
                .map_err(|e| e.to_string())?;
            println!("Added category '{}'", name);
        }
        CategoryCommand::Assign { app, category } => {
            state
                .taxonomy
                .assign_app(&app, &category)
                .map_err(|e| e.to_string())?;
            println!("Assigned '{}' to '{}'", app, category);
        }
        CategoryCommand::Move { app, from, to } => {
            state
                .taxonomy
                .move_app(&app, &from, &to)
                .map_err(|e| e.to_string())?;
            println!("Moved '{}' from '{}' to '{}'", app, from, to);
        }
        CategoryCommand::Remove { app, category } => {
            state
                .taxonomy
                .remove_app(&app, &category)
                .map_err(|e| e.to_string())?;
            println!("Removed '{}' from '{}'", app, category);
        }
    }

    if let Err(e) = storage::save_state(&state_path, &state) {
        eprintln!("Warning: could not persist taxonomy changes: {e}");
    }
    Ok(())
}

pub fn export_data(format: ExportFormat, out_path: Option<PathBuf>) -> Result<(), String> {
    let state = storage::load_state(&storage::get_state_path());

    let content = match format {
        ExportFormat::Json => export::export_json(&state),
        ExportFormat::Csv => export::daily_summary_csv(&state.entries, &state.taxonomy),
    }
    .map_err(|e| e.to_string())?;

    if let Some(path) = out_path {
        storage::write_text_file(&path, &content).map_err(|e| e.to_string())?;
        println!("Exported to {}", path.display());
    } else {
        println!("{}", content);
    }

    Ok(())
}

pub fn clear_data() -> Result<(), String> {
    let state_path = storage::get_state_path();
    storage::delete_state(&state_path).map_err(|e| e.to_string())?;
    println!("Cleared stored data");
    Ok(())
}

pub fn print_completions(shell: &str) -> Result<(), String> {
    use clap_complete::Shell;
    match shell {
        "bash" => {
            clap_complete::generate(
                Shell::Bash,
                &mut Cli::command(),
                "timeflow",
                &mut io::stdout(),
            );
        }
        "zsh" => {
            clap_complete::generate(
                Shell::Zsh,
                &mut Cli::command(),
                "timeflow",
                &mut io::stdout(),
            );
        }
        "fish" => {
            clap_complete::generate(
                Shell::Fish,
                &mut Cli::command(),
                "timeflow",
                &mut io::stdout(),
            );
        }
        _ => {
            return Err(format!(
                "Unsupported shell: {}. Use bash, zsh, or fish.",
                shell
            ));
        }
    }
    Ok(())
}

pub fn run_cli() {
    let cli = Cli::parse();
    let result = match cli {
        Cli::Import(command) => match command {
            ImportCommand::Activity { file } => import_activity(file),
            ImportCommand::Sessions { file } => import_sessions(file),
            ImportCommand::Backup { file } => restore_backup(file),
        },
        Cli::Report {
            period,
            date,
            offset,
            category,
        } => report(period, date, offset, category),
        Cli::Category(command) => category_command(command),
        Cli::Export { format, out } => export_data(format, out),
        Cli::Clear => clear_data(),
        Cli::Completions { shell } => print_completions(&shell),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
