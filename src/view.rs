//! Plain-text rendering for the command-line player

use crate::model::{ContentRecord, ContentType, HistoryEntry, PlayerSnapshot, RepeatMode, format_time};

const BAR_WIDTH: usize = 24;

/// One-line player status: state, title, progress bar, times and modes.
pub fn status_line(snapshot: &PlayerSnapshot) -> String {
    if snapshot.content_id.is_none() {
        return match &snapshot.error {
            Some(error) => format!(" ✖ {}", error),
            None => " Nothing playing".to_string(),
        };
    }

    let icon = if snapshot.error.is_some() {
        "✖"
    } else if snapshot.is_loading {
        "…"
    } else if snapshot.is_playing {
        "▶"
    } else if snapshot.is_paused {
        "⏸"
    } else {
        "■"
    };

    let kind = snapshot.content_type.map(ContentType::as_str).unwrap_or("-");
    let shuffle_text = if snapshot.settings.shuffle { "Shuffle: On" } else { "Shuffle: Off" };
    let repeat_text = match snapshot.settings.repeat {
        RepeatMode::None => "Repeat: Off",
        RepeatMode::All => "Repeat: All",
        RepeatMode::One => "Repeat: One",
    };

    format!(
        " {} [{}] {} {} {} / {} | {}/{} | {} | {}",
        icon,
        kind,
        truncate_string(&snapshot.title, 32).trim_end(),
        progress_bar(snapshot.progress_percent),
        snapshot.formatted_current_time,
        snapshot.formatted_duration,
        snapshot.current_index + 1,
        snapshot.queue_len,
        shuffle_text,
        repeat_text,
    )
}

fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// Numbered listing with a header row
pub fn content_rows(records: &[ContentRecord]) -> Vec<String> {
    let num_width = calculate_num_width(records.len());
    let mut rows = vec![format!(
        " {:<num_width$}   {:<8}   {:<12}   {:<48}   {}",
        "#", "Type", "Id", "Title", "Duration"
    )];

    rows.extend(records.iter().enumerate().map(|(i, record)| {
        let duration = record.duration.map(format_time).unwrap_or_else(|| "-".to_string());
        format!(
            " {:<num_width$}   {:<8}   {}   {}   {}",
            i + 1,
            ContentType::resolve(record).as_str(),
            truncate_string(record.id.as_str(), 12),
            truncate_string(&record.title, 48),
            duration
        )
    }));
    rows
}

pub fn history_rows(entries: &[HistoryEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                " {}   {:<8}   {}   {}",
                entry.played_at.format("%Y-%m-%d %H:%M"),
                entry.content_type.as_str(),
                truncate_string(entry.content.id.as_str(), 12),
                entry.content.title
            )
        })
        .collect()
}

/// Width needed for the index column
fn calculate_num_width(item_count: usize) -> usize {
    if item_count == 0 {
        2
    } else {
        let digits = (item_count as f64).log10().floor() as usize + 1;
        digits + 1
    }
}

fn truncate_string(s: &str, max_width: usize) -> String {
    if s.chars().count() > max_width {
        let truncated: String = s.chars().take(max_width.saturating_sub(3)).collect();
        format!("{:<width$}", format!("{}...", truncated), width = max_width)
    } else {
        format!("{:<width$}", s, width = max_width)
    }
}
