//! Transfer progress reporting
//!
//! Turns raw session counters into percent, speed and ETA, and renders them as
//! a one-line textual progress bar.

use std::time::Duration;

/// Upper bound for the rendered bar, in cells
pub const MAX_BAR_LENGTH: usize = 40;

/// Viewports at least this wide (in pixels) use the wide layout
pub const WIDE_VIEWPORT_PX: u32 = 768;

const COMPACT_DIVISOR: u32 = 60;
const WIDE_DIVISOR: u32 = 80;

/// Terminal columns reserved for the text that follows the bar
const TERMINAL_TEXT_COLUMNS: u16 = 50;

/// Raw counters taken from a session at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub transferred_bytes: u64,
    pub total_bytes: Option<u64>,
    /// Time since the last (re)start of active transfer
    pub elapsed: Duration,
}

/// Estimated time remaining
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    /// No time has elapsed yet, nothing to extrapolate from
    Indeterminate,
    /// Nothing is moving, or the total is unknown
    Unbounded,
    Remaining(Duration),
}

/// Derived, human-facing view of a snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// `None` while indeterminate
    pub percent: Option<u8>,
    pub speed_bps: f64,
    pub eta: Eta,
}

impl ProgressSnapshot {
    pub fn progress(&self) -> Progress {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed <= 0.0 {
            return Progress {
                percent: None,
                speed_bps: 0.0,
                eta: Eta::Indeterminate,
            };
        }

        let transferred = self.transferred_bytes as f64;
        let speed_bps = transferred / elapsed;

        let percent = match self.total_bytes {
            Some(0) => 100,
            Some(total) => ((100.0 * transferred / total as f64).round()).clamp(0.0, 100.0) as u8,
            None => 0,
        };

        let eta = match self.total_bytes {
            Some(total) if speed_bps > 0.0 => {
                let remaining = total.saturating_sub(self.transferred_bytes) as f64;
                // Too far out to represent is as good as never
                Duration::try_from_secs_f64(remaining / speed_bps)
                    .map(Eta::Remaining)
                    .unwrap_or(Eta::Unbounded)
            }
            _ => Eta::Unbounded,
        };

        Progress {
            percent: Some(percent),
            speed_bps,
            eta,
        }
    }
}

/// Layout family for pixel viewports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Compact,
    Wide,
}

impl DisplayMode {
    pub fn for_width(width_px: u32) -> Self {
        if width_px >= WIDE_VIEWPORT_PX {
            Self::Wide
        } else {
            Self::Compact
        }
    }

    fn divisor(self) -> u32 {
        match self {
            Self::Compact => COMPACT_DIVISOR,
            Self::Wide => WIDE_DIVISOR,
        }
    }
}

/// Where the bar is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewport {
    /// Browser-like surface, width in pixels
    Pixels(u32),
    /// Terminal, width in character cells
    Columns(u16),
}

impl Viewport {
    /// Number of cells in the bar
    pub fn bar_length(self) -> usize {
        let length = match self {
            Self::Pixels(width) => (width / DisplayMode::for_width(width).divisor()) as usize,
            Self::Columns(columns) => (columns.saturating_sub(TERMINAL_TEXT_COLUMNS) / 2) as usize,
        };
        length.min(MAX_BAR_LENGTH)
    }
}

/// Draw `[####    ]` with the filled part proportional to `percent`
pub fn render_bar(percent: Option<u8>, length: usize) -> String {
    let percent = f64::from(percent.unwrap_or(0).min(100));
    let filled = ((percent / 100.0) * length as f64).round() as usize;
    let filled = filled.min(length);
    format!("[{}{}]", "#".repeat(filled), " ".repeat(length - filled))
}

/// Format bytes per second as KB/s or MB/s
pub fn format_speed(bytes_per_sec: f64) -> String {
    let kbps = bytes_per_sec / 1024.0;
    if kbps < 1024.0 {
        format!("{:.1} KB/s", kbps)
    } else {
        format!("{:.2} MB/s", kbps / 1024.0)
    }
}

pub fn format_eta(eta: Eta) -> String {
    match eta {
        Eta::Indeterminate => "--".to_string(),
        Eta::Unbounded => "∞".to_string(),
        Eta::Remaining(remaining) => {
            let seconds = remaining.as_secs_f64();
            if seconds < 60.0 {
                format!("{}s", seconds.round() as u64)
            } else {
                let mut minutes = (seconds / 60.0).floor() as u64;
                let mut secs = (seconds % 60.0).round() as u64;
                if secs == 60 {
                    minutes += 1;
                    secs = 0;
                }
                format!("{}m {}s", minutes, secs)
            }
        }
    }
}

/// Full progress line: bar, percent, speed and ETA
pub fn render_line(progress: &Progress, viewport: Viewport) -> String {
    let percent = progress
        .percent
        .map(|p| format!("{}%", p))
        .unwrap_or_else(|| "--%".to_string());

    format!(
        "{} {} | {} | ETA: {}",
        render_bar(progress.percent, viewport.bar_length()),
        percent,
        format_speed(progress.speed_bps),
        format_eta(progress.eta)
    )
}
