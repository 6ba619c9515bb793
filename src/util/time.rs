//! Duration, rate and count formatting for reports

use std::time::Duration;

/// Format a duration in human-readable form
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use primegather::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
/// assert_eq!(format_duration(Duration::from_nanos(1500)), "1.50us");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(5)), "5.00s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    const UNITS: &[(f64, &str)] = &[(60e9, "m"), (1e9, "s"), (1e6, "ms"), (1e3, "us")];

    let nanos = duration.as_nanos();
    scaled(nanos as f64, UNITS).unwrap_or_else(|| format!("{}ns", nanos))
}

/// Format a rate (candidates per second)
///
/// # Examples
///
/// ```
/// use primegather::util::time::format_rate;
///
/// assert_eq!(format_rate(500.0), "500");
/// assert_eq!(format_rate(1500.0), "1.50K");
/// assert_eq!(format_rate(2_500_000.0), "2.50M");
/// ```
pub fn format_rate(rate: f64) -> String {
    const UNITS: &[(f64, &str)] = &[(1e9, "G"), (1e6, "M"), (1e3, "K")];

    scaled(rate, UNITS).unwrap_or_else(|| format!("{:.0}", rate))
}

/// `value` in the largest unit it reaches, two decimals; `None` below the
/// smallest unit. `units` is ordered largest first.
fn scaled(value: f64, units: &[(f64, &str)]) -> Option<String> {
    units
        .iter()
        .find(|(scale, _)| value >= *scale)
        .map(|(scale, suffix)| format!("{:.2}{}", value / scale, suffix))
}

/// Items per second over `duration` (0 for a zero duration)
pub fn calculate_rate(count: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}
