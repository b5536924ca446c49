//! Common utilities and helpers

pub mod logging;
pub mod path;

use std::time::Duration;

/// Formatting helpers for user-facing text
pub struct Utils;

impl Utils {
    /// Clock-style rendering of a second count: `M:SS` or `H:MM:SS`.
    pub fn format_clock(seconds: f64) -> String {
        let total = if seconds.is_finite() && seconds > 0.0 {
            seconds.round() as u64
        } else {
            0
        };
        let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
        if h > 0 {
            format!("{}:{:02}:{:02}", h, m, s)
        } else {
            format!("{}:{:02}", m, s)
        }
    }

    /// Elapsed wall time to a tenth of a second.
    pub fn format_elapsed(elapsed: Duration) -> String {
        format!("{:.1}s", elapsed.as_secs_f64())
    }

    /// Binary-unit size, e.g. `20 MiB` or `1.50 GiB`.
    pub fn format_file_size(size: u64) -> String {
        const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
        let mut value = size as f64;
        let mut unit = 0;
        while value >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        }
        if unit == 0 || value.fract() == 0.0 {
            format!("{} {}", value as u64, UNITS[unit])
        } else {
            format!("{:.2} {}", value, UNITS[unit])
        }
    }

    /// Bit rate in kilobits per second.
    pub fn format_bit_rate(bps: u64) -> String {
        format!("{} kb/s", bps / 1000)
    }
}
