//! Output formatting and progress reporting

use crate::runner::{ConditionInfo, RunSummary, ScenarioSummary};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Spinner shown on stderr while a burst is in flight
#[derive(Debug)]
pub struct ProgressReporter {
    spinner: Option<ProgressBar>,
    /// Quiet mode
    pub quiet: bool,
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub const fn new(quiet: bool) -> Self {
        Self {
            spinner: None,
            quiet,
        }
    }

    /// Start the spinner
    pub fn start(&mut self, message: &str) {
        if self.quiet {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    /// Stop and clear the spinner
    pub fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

/// Preset table
#[must_use]
pub fn render_conditions(conditions: &[ConditionInfo], color: bool) -> String {
    let mut out = String::new();
    for info in conditions {
        let name = format!("{:<10}", info.name);
        let name = if color {
            style(name).cyan().bold().to_string()
        } else {
            name
        };
        let _ = writeln!(out, "{name} {}", info.description);
    }
    out
}

/// Scenario validation result
#[must_use]
pub fn render_scenario(summary: &ScenarioSummary, color: bool) -> String {
    let mut out = String::new();
    let ok = if color {
        style("valid").green().bold().to_string()
    } else {
        "valid".to_string()
    };
    let _ = writeln!(
        out,
        "{}: {ok} ({} condition{})",
        summary.path,
        summary.conditions.len(),
        if summary.conditions.len() == 1 { "" } else { "s" }
    );
    if let Some(seed) = summary.seed {
        let _ = writeln!(out, "seed: {seed}");
    }
    for (name, kind) in &summary.conditions {
        let _ = writeln!(out, "  {name:<20} {kind}");
    }
    out
}

/// Burst report with strategy counters
#[must_use]
pub fn render_run(summary: &RunSummary, color: bool) -> String {
    let paint = |text: String, good: bool| {
        if !color {
            text
        } else if good {
            style(text).green().to_string()
        } else {
            style(text).red().to_string()
        }
    };

    let report = &summary.report;
    let mut out = String::new();
    let _ = writeln!(out, "condition: {} ({})", summary.condition, summary.kind);
    if let Some(seed) = summary.seed {
        let _ = writeln!(out, "seed:      {seed}");
    }
    let _ = writeln!(out, "url:       {}", summary.url);
    let _ = writeln!(out, "requests:  {}", report.total);
    for (status, count) in &report.statuses {
        let _ = writeln!(
            out,
            "  {} {count}",
            paint(format!("HTTP {status}:"), *status < 400)
        );
    }
    for (reason, count) in &report.aborts {
        let _ = writeln!(out, "  {} {count}", paint(format!("aborted ({reason}):"), false));
    }
    if !report.errors.is_empty() {
        let _ = writeln!(out, "  {} {}", paint("errors:".to_string(), false), report.errors.len());
    }
    let _ = writeln!(
        out,
        "latency:   min {} ms, mean {:.1} ms, max {} ms",
        report.min_latency_ms, report.mean_latency_ms, report.max_latency_ms
    );
    if !summary.stats.counters.is_empty() || summary.stats.dropped.is_some() {
        let _ = writeln!(out, "counters:");
        for (name, value) in &summary.stats.counters {
            let _ = writeln!(out, "  {name}: {value}");
        }
        if let Some(dropped) = summary.stats.dropped {
            let _ = writeln!(out, "  dropped: {dropped}");
        }
    }
    out
}

/// Any serialisable value as pretty JSON
pub fn render_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use cockpit_netsim::strategy::StrategyStats;
    use cockpit_netsim::BurstReport;
    use std::collections::BTreeMap;

    fn summary() -> RunSummary {
        let mut report = BurstReport {
            total: 4,
            min_latency_ms: 1,
            max_latency_ms: 9,
            mean_latency_ms: 4.5,
            ..BurstReport::default()
        };
        report.statuses.insert(200, 3);
        report.aborts.insert("failed".to_string(), 1);
        RunSummary {
            condition: "flaky".to_string(),
            kind: "flaky".to_string(),
            seed: Some(7),
            url: "https://app.test/api/test".to_string(),
            report,
            stats: StrategyStats::new("flaky").with("abort_count", 1),
        }
    }

    #[test]
    fn test_render_run_plain() {
        let text = render_run(&summary(), false);
        assert!(text.contains("condition: flaky"));
        assert!(text.contains("HTTP 200: 3"));
        assert!(text.contains("aborted (failed): 1"));
        assert!(text.contains("abort_count: 1"));
        assert!(text.contains("seed:      7"));
    }

    #[test]
    fn test_render_conditions_plain() {
        let rows = vec![ConditionInfo {
            name: "slow-4g".to_string(),
            description: "400 ms latency, 1 kbps".to_string(),
        }];
        let text = render_conditions(&rows, false);
        assert!(text.starts_with("slow-4g"));
        assert!(text.contains("1 kbps"));
    }

    #[test]
    fn test_render_scenario_plain() {
        let mut conditions = BTreeMap::new();
        conditions.insert("outage".to_string(), "http-error".to_string());
        let text = render_scenario(
            &ScenarioSummary {
                path: "s.yaml".to_string(),
                seed: None,
                conditions,
            },
            false,
        );
        assert!(text.contains("s.yaml: valid (1 condition)"));
        assert!(text.contains("http-error"));
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&summary()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["report"]["statuses"]["200"], 3);
        assert_eq!(value["stats"]["counters"]["abort_count"], 1);
    }

    #[test]
    fn test_quiet_reporter_has_no_spinner() {
        let mut reporter = ProgressReporter::new(true);
        reporter.start("running");
        assert!(reporter.spinner.is_none());
        reporter.finish();
    }
}
