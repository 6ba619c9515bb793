//! Human-readable text output

use crate::config::Config;
use crate::coordinator::local::RunReport;
use crate::util::time::{calculate_rate, format_duration, format_number, format_rate};
use std::fmt::Write;

/// Print search results to console
///
/// Displays:
/// - Elapsed time and scan rate
/// - Prime count
/// - First and last `show_primes` primes (all of them if the list is short)
/// - Per-worker table (if enabled)
pub fn print_results(report: &RunReport, config: &Config) {
    print!("{}", render_results(report, config));
}

/// The text `print_results` writes
pub fn render_results(report: &RunReport, config: &Config) -> String {
    let result = &report.result;
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "═══════════════════════════════════════════════════════════");
    let _ = writeln!(out, "                    SEARCH RESULTS");
    let _ = writeln!(out, "═══════════════════════════════════════════════════════════");
    let _ = writeln!(out);

    let _ = writeln!(out, "Elapsed Time: {:.3}s", report.elapsed.as_secs_f64());
    let _ = writeln!(
        out,
        "Found {} primes below {} ({} workers)",
        format_number(result.count() as u64),
        format_number(result.limit),
        result.workers.len()
    );
    let _ = writeln!(
        out,
        "Rate: {} candidates/s",
        format_rate(calculate_rate(result.limit, report.elapsed))
    );

    if !config.output.count_only {
        if let Some(preview) = format_preview(&result.primes, config.output.show_primes) {
            let _ = writeln!(out);
            out.push_str(&preview);
        }
    }

    if config.output.per_worker {
        let _ = writeln!(out);
        let _ = writeln!(out, "Per-Worker:");
        let _ = writeln!(
            out,
            "  {:>6}  {:>30}  {:>12}  {:>10}",
            "Worker", "Range", "Primes", "Time"
        );
        for worker in &result.workers {
            let _ = writeln!(
                out,
                "  {:>6}  {:>30}  {:>12}  {:>10}",
                worker.worker_id,
                worker.range.to_string(),
                format_number(worker.primes_found as u64),
                format_duration(worker.elapsed())
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "═══════════════════════════════════════════════════════════");
    out
}

/// First and last `show` primes, or the whole list when it is short
///
/// Returns `None` when there is nothing to show.
pub fn format_preview(primes: &[u64], show: usize) -> Option<String> {
    if show == 0 || primes.is_empty() {
        return None;
    }

    if primes.len() <= show * 2 {
        return Some(format!("Primes: {}\n", join(primes)));
    }

    Some(format!(
        "First {}: {}\nLast {}: {}\n",
        show,
        join(&primes[..show]),
        show,
        join(&primes[primes.len() - show..])
    ))
}

fn join(values: &[u64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
