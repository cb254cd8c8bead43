use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failures
    Quiet,
    #[default]
    Normal,
    /// Show every file and the first difference of each mismatch
    Verbose,
}

impl VerbosityLevel {
    /// Default tracing filter for this level, used when `RUST_LOG` is unset
    pub fn log_filter(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "xmltooling=debug,info",
        }
    }
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Summary,
}

/// Round-trip XML documents through the object model
#[derive(Parser, Debug, Clone)]
#[command(name = "xmltooling")]
#[command(
    about = "Unmarshall XML files into objects, marshall them back and check that nothing was lost"
)]
#[command(version)]
pub struct Cli {
    /// Directory or file to check
    pub path: PathBuf,

    /// File extensions to process (comma-separated)
    #[arg(short = 'e', long = "extensions", help = "File extensions to process (e.g., 'xml,saml')")]
    pub extensions: Option<String>,

    /// Number of parallel worker threads
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Include file patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Report format
    #[arg(long = "format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Stop at the first file that does not round-trip
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,

    /// Treat unknown attributes, child elements and text as errors
    #[arg(long = "strict")]
    pub strict: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Only report failures
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| {
            extensions
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Path does not exist: {}", self.path.display()));
        }
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cli_parsing() {
        let cli = Cli::try_parse_from(["xmltooling", "/tmp"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("/tmp"));
        assert_eq!(cli.get_extensions(), None);
        assert_eq!(cli.verbosity(), VerbosityLevel::Normal);
        assert!(!cli.strict);
    }

    #[test]
    fn test_full_cli_parsing() {
        let cli = Cli::try_parse_from([
            "xmltooling",
            "-e",
            "xml, .saml",
            "-t",
            "4",
            "--include",
            "*.xml",
            "--exclude",
            "tmp/**",
            "--exclude",
            "*.bak",
            "--format",
            "json",
            "--fail-fast",
            "--strict",
            "-q",
            "docs",
        ])
        .unwrap();
        assert_eq!(cli.get_extensions(), Some(vec!["xml".to_string(), "saml".to_string()]));
        assert_eq!(cli.threads, Some(4));
        assert_eq!(cli.exclude_patterns.len(), 2);
        assert_eq!(cli.output_format, Some(OutputFormat::Json));
        assert!(cli.fail_fast && cli.strict);
        assert_eq!(cli.verbosity(), VerbosityLevel::Quiet);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["xmltooling", "-v", "-q", "."]).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_path_and_zero_threads() {
        let cli = Cli::try_parse_from(["xmltooling", "/definitely/not/here"]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from(["xmltooling", "-t", "0", "."]).unwrap();
        assert!(cli.validate().unwrap_err().contains("threads"));
    }
}
