use chrono::{DateTime, Local};

const NO_START_LABEL: &str = "--:--";

/// Renders seconds as `H:MM:SS`. Negative input renders as zero.
pub fn format_hms(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours}:{minutes:02}:{secs:02}")
}

/// `HH:MM` of a first-start timestamp, or a placeholder when there is none.
pub fn start_label(start: Option<DateTime<Local>>) -> String {
    match start {
        Some(ts) => ts.format("%H:%M").to_string(),
        None => NO_START_LABEL.to_string(),
    }
}
