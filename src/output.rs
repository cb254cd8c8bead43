//! Report formatting for round-trip results

use std::io::IsTerminal;
use std::time::Duration;

use crate::checker::{CheckResults, CheckStatus, FileCheckResult};
use crate::cli::{OutputFormat, VerbosityLevel};

/// Formats check results as human-readable text, JSON or a one-line summary
pub struct Output {
    verbosity: VerbosityLevel,
    format: OutputFormat,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel, format: OutputFormat) -> Self {
        Self {
            verbosity,
            format,
            show_colors: format == OutputFormat::Human && std::io::stdout().is_terminal(),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_results(&self, results: &CheckResults) -> serde_json::Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(results).map(|json| json + "\n"),
            OutputFormat::Summary => Ok(format_summary_line(results)),
            OutputFormat::Human => Ok(self.format_human(results)),
        }
    }

    fn format_human(&self, results: &CheckResults) -> String {
        let mut output = String::new();

        for file_result in &results.file_results {
            let show = match self.verbosity {
                VerbosityLevel::Verbose => true,
                _ => file_result.status.is_failure(),
            };
            if show {
                output.push_str(&self.format_file_result(file_result));
                output.push('\n');
            }
        }

        if self.verbosity == VerbosityLevel::Quiet {
            if results.has_failures() {
                output.push_str(&format!(
                    "Mismatches: {} Errors: {}\n",
                    results.mismatch_files, results.error_files
                ));
            }
        } else {
            output.push_str(&self.format_summary(results));
        }

        output
    }

    pub fn format_file_result(&self, result: &FileCheckResult) -> String {
        let path_display = result.path.display();
        let duration_str = format_duration(result.duration);

        match &result.status {
            CheckStatus::RoundTrip => {
                let mut line = format!("{}  {} ({})", self.colorize("✓ OK", "32"), path_display, duration_str);
                if self.verbosity == VerbosityLevel::Verbose
                    && let Some(root) = &result.root_element
                {
                    line.push_str(&format!(" - {}", root));
                }
                line
            }
            CheckStatus::Mismatch { difference } => format!(
                "{}  {} ({}) - {}",
                self.colorize("✗ MISMATCH", "31"),
                path_display,
                duration_str,
                difference
            ),
            CheckStatus::Error { message } => format!(
                "{}  {} ({}) - {}",
                self.colorize("⚠ ERROR", "33"),
                path_display,
                duration_str,
                message
            ),
            CheckStatus::Skipped { reason } => format!(
                "{}  {} - {}",
                self.colorize("- SKIPPED", "36"),
                path_display,
                reason
            ),
        }
    }

    fn format_summary(&self, results: &CheckResults) -> String {
        let mut output = String::new();
        output.push_str("Round-trip Summary:\n");
        output.push_str(&format!("  Total files: {}\n", results.total_files));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Round-trip:", "32"),
            results.round_trip_files
        ));

        if results.mismatch_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Mismatch:", "31"),
                results.mismatch_files
            ));
        }
        if results.error_files > 0 {
            output.push_str(&format!("  {} {}\n", self.colorize("Errors:", "33"), results.error_files));
        }
        if results.skipped_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Skipped:", "36"),
                results.skipped_files
            ));
        }

        output.push_str(&format!("  Success rate: {:.1}%\n", results.success_rate()));
        output.push_str(&format!("  Duration: {}\n", format_duration(results.total_duration)));
        output
    }
}

fn format_summary_line(results: &CheckResults) -> String {
    format!(
        "total={} round_trip={} mismatch={} error={} skipped={}\n",
        results.total_files,
        results.round_trip_files,
        results.mismatch_files,
        results.error_files,
        results.skipped_files
    )
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn create_test_results() -> CheckResults {
        let file = |name: &str, status: CheckStatus| FileCheckResult {
            path: PathBuf::from(name),
            status,
            root_element: Some("{urn:example}Doc".to_string()),
            duration: Duration::from_millis(3),
        };
        CheckResults::aggregate(
            vec![
                file("ok.xml", CheckStatus::RoundTrip),
                file(
                    "lossy.xml",
                    CheckStatus::Mismatch {
                        difference: "attributes or text of Doc differ".to_string(),
                    },
                ),
                file(
                    "broken.xml",
                    CheckStatus::Error {
                        message: "XML parsing error".to_string(),
                    },
                ),
            ],
            Utc::now(),
            Duration::from_millis(100),
        )
    }

    #[test]
    fn test_human_output_lists_failures() {
        let output = Output::new(VerbosityLevel::Normal, OutputFormat::Human).with_colors(false);
        let formatted = output.format_results(&create_test_results()).unwrap();

        assert!(formatted.contains("Round-trip Summary:"));
        assert!(formatted.contains("✗ MISMATCH  lossy.xml"));
        assert!(formatted.contains("⚠ ERROR  broken.xml"));
        assert!(!formatted.contains("ok.xml"));
        assert!(formatted.contains("Success rate: 33.3%"));
    }

    #[test]
    fn test_verbose_output_lists_every_file() {
        let output = Output::new(VerbosityLevel::Verbose, OutputFormat::Human).with_colors(false);
        let formatted = output.format_results(&create_test_results()).unwrap();
        assert!(formatted.contains("✓ OK  ok.xml (3ms) - {urn:example}Doc"));
    }

    #[test]
    fn test_quiet_output() {
        let output = Output::new(VerbosityLevel::Quiet, OutputFormat::Human).with_colors(false);
        let formatted = output.format_results(&create_test_results()).unwrap();
        assert!(formatted.contains("Mismatches: 1 Errors: 1"));
        assert!(!formatted.contains("Summary"));
    }

    #[test]
    fn test_json_and_summary_formats() {
        let results = create_test_results();

        let json = Output::new(VerbosityLevel::Normal, OutputFormat::Json)
            .format_results(&results)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_files"], 3);
        assert_eq!(value["file_results"][1]["status"]["status"], "mismatch");

        let line = Output::new(VerbosityLevel::Normal, OutputFormat::Summary)
            .format_results(&results)
            .unwrap();
        assert_eq!(line, "total=3 round_trip=1 mismatch=1 error=1 skipped=0\n");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30.0s");
    }
}
