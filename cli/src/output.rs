//! Output helpers for CLI commands.

use std::io::{self, Write};

use comfy_table::{ContentArrangement, Table};

/// Create a borderless table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Format a timestamp as a relative "ago" string.
pub fn format_ago(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let duration = chrono::Utc::now().signed_duration_since(*dt);

    let secs = duration.num_seconds();
    if secs < 0 {
        return "just now".to_string();
    }
    if secs < 60 {
        return format!("{secs} seconds ago");
    }
    if duration.num_minutes() < 60 {
        return format!("{} minutes ago", duration.num_minutes());
    }
    if duration.num_hours() < 24 {
        return format!("{} hours ago", duration.num_hours());
    }

    let days = duration.num_days();
    match days {
        0..=29 => format!("{days} days ago"),
        30..=364 => format!("{} months ago", days / 30),
        _ => format!("{} years ago", days / 365),
    }
}

/// Print the result of a volume prune: a header, one name per line and a
/// blank line. Nothing is printed when no volume was removed.
pub fn write_deleted_volumes<W: Write>(out: &mut W, removed: &[String]) -> io::Result<()> {
    if removed.is_empty() {
        return Ok(());
    }
    writeln!(out, "Deleted Volumes:")?;
    for name in removed {
        writeln!(out, "{name}")?;
    }
    writeln!(out)
}
