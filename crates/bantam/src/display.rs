use std::{fmt::Display, time::Duration};

use byte_unit::Byte;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use time::{format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime};

/// Spinner refresh rate.
const TICK_INTERVAL: Duration = Duration::from_millis(150);

/// ANSI escape sequences that don't occupy any terminal columns.
static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("invalid regex string"));

/// Print a success message.
pub(crate) fn success(message: impl Display) {
    println!("{} {message}", "✓".green());
}

/// Print an error message to stderr.
pub(crate) fn error(message: impl Display) {
    eprintln!("{} {message}", "✗".red());
}

/// Print a warning message.
pub(crate) fn warning(message: impl Display) {
    println!("{} {message}", "⚠".yellow());
}

/// Print an informational message.
pub(crate) fn info(message: impl Display) {
    println!("{} {message}", "ℹ".blue());
}

/// Paint text with the brand color.
pub(crate) fn primary(text: &str) -> ColoredString {
    text.truecolor(0xf4, 0x5c, 0x48)
}

/// Create and start a new spinner.
pub(crate) fn spinner(message: impl Into<String>) -> ProgressBar {
    let progress = ProgressBar::new_spinner();

    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        progress.set_style(style);
    }

    progress.set_message(message.into());
    progress.enable_steady_tick(TICK_INTERVAL);
    progress
}

/// Stop the spinner, replacing it with a symbol and a final message.
fn finish_spinner(progress: &ProgressBar, symbol: ColoredString, message: impl Display) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        progress.set_style(style);
    }

    progress.finish_with_message(format!("{symbol} {message}"));
}

/// Stop the spinner with a success message.
pub(crate) fn succeed(progress: &ProgressBar, message: impl Display) {
    finish_spinner(progress, "✓".green(), message);
}

/// Stop the spinner with a failure message.
pub(crate) fn fail(progress: &ProgressBar, message: impl Display) {
    finish_spinner(progress, "✗".red(), message);
}

/// Stop the spinner with a warning message.
pub(crate) fn warn(progress: &ProgressBar, message: impl Display) {
    finish_spinner(progress, "⚠".yellow(), message);
}

/// Create an upload progress bar for `size` bytes.
pub(crate) fn upload_bar(size: u64) -> ProgressBar {
    let progress = ProgressBar::new(size);

    if let Ok(style) = ProgressStyle::with_template("Uploading [{bar:40}] {percent}% {eta}") {
        progress.set_style(style.progress_chars("█░"));
    }

    progress
}

/// Format byte count using binary units (`1.5 KiB`).
pub(crate) fn format_bytes(bytes: u64) -> String {
    let adjusted = Byte::from_bytes(u128::from(bytes)).get_appropriate_unit(true);

    let value = format!("{:.2}", adjusted.get_value());
    let value = value.trim_end_matches('0').trim_end_matches('.');

    format!("{value} {}", adjusted.get_unit())
}

/// Parse an RFC 3339 timestamp.
pub(crate) fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}

/// Format an RFC 3339 timestamp for humans.
///
/// Unparsable values are returned as is.
pub(crate) fn format_date(value: &str) -> String {
    let format = format_description!(
        "[month repr:short] [day padding:none], [year], [hour]:[minute] UTC"
    );

    parse_timestamp(value)
        .map(|timestamp| timestamp.to_offset(time::UtcOffset::UTC))
        .and_then(|timestamp| timestamp.format(format).ok())
        .unwrap_or_else(|| value.to_owned())
}

/// Check if the timestamp is in the past relative to `now`.
///
/// Unparsable timestamps are never considered expired.
pub(crate) fn is_expired(expires_at: &str, now: OffsetDateTime) -> bool {
    parse_timestamp(expires_at).is_some_and(|timestamp| timestamp <= now)
}

/// Number of terminal columns occupied by the text.
fn visible_width(text: &str) -> usize {
    ANSI_ESCAPE.replace_all(text, "").chars().count()
}

/// Render rows as a `|`-separated table with a bold header.
///
/// Column widths ignore color escape sequences.
pub(crate) fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| visible_width(header)).collect();

    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(visible_width(cell));
        }
    }

    let pad = |cell: &str, width: usize| {
        let padding = width.saturating_sub(visible_width(cell));
        format!("{cell}{}", " ".repeat(padding))
    };

    let header = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(*header, *width))
        .collect::<Vec<_>>()
        .join(" | ");

    let separator = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut lines = vec![header.bold().to_string(), separator];

    lines.extend(rows.iter().map(|row| {
        row.iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell.as_str(), *width))
            .collect::<Vec<_>>()
            .join(" | ")
    }));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{format_bytes, format_date, is_expired, render_table, visible_width};

    #[test]
    fn bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5 MiB");
    }

    #[test]
    fn dates() {
        assert_eq!(format_date("2024-03-05T14:07:00Z"), "Mar 5, 2024, 14:07 UTC");
        assert_eq!(
            format_date("2024-03-05T14:07:00+02:00"),
            "Mar 5, 2024, 12:07 UTC"
        );
        assert_eq!(format_date("yesterday"), "yesterday");
    }

    #[test]
    fn expiry() {
        let now = datetime!(2024-06-01 12:00 UTC);

        assert!(is_expired("2024-05-31T00:00:00Z", now));
        assert!(!is_expired("2024-06-02T00:00:00Z", now));
        assert!(!is_expired("not a date", now));
    }

    #[test]
    fn ansi_sequences_have_no_width() {
        assert_eq!(visible_width("\u{1b}[32mactive\u{1b}[0m"), 6);
        assert_eq!(visible_width("ℹ info"), 6);
    }

    #[test]
    fn table_layout() {
        let table = render_table(
            &["Name", "URL"],
            &[
                vec![String::from("blog"), String::from("blog.bantam.site")],
                vec![
                    String::from("\u{1b}[32mdocumentation\u{1b}[0m"),
                    String::from("d.bantam.site"),
                ],
            ],
        );

        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("Name          | URL             "));
        assert_eq!(lines[1], "--------------+-----------------");
        assert_eq!(lines[2], "blog          | blog.bantam.site");
        assert_eq!(visible_width(lines[3]), visible_width(lines[2]));
    }
}
