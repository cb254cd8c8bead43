//! Round-trip checking of XML documents through the object model
//!
//! Each document is parsed, unmarshalled into objects, stripped of its cached
//! DOM and marshalled again. The output goes through the same cycle once more
//! and both outputs are compared structurally. Files
//! are checked on a rayon pool; discovery and the surrounding workflow are async.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{Config, ConfigManager};
use crate::dom::{self, Element, ParserOptions};
use crate::error::{Result, UnmarshallingError, XmlToolingError};
use crate::file_discovery::FileDiscovery;
use crate::io::UnmarshallingContext;
use crate::object::{CachesDom, XmlObjectRef};
use crate::registry::XmlObjectProviderRegistry;

/// Settings for a checking run
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOptions {
    pub threads: usize,
    pub fail_fast: bool,
    pub strict: bool,
    pub parser: ParserOptions,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            fail_fast: false,
            strict: false,
            parser: ParserOptions::default(),
        }
    }
}

impl CheckOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            threads: ConfigManager::get_thread_count(config),
            fail_fast: config.check.fail_fast,
            strict: config.unmarshalling.strict_unknown_content,
            parser: config.parser.clone(),
        }
    }
}

/// Outcome for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckStatus {
    /// Marshalled output is structurally equal to the input
    RoundTrip,
    Mismatch { difference: String },
    /// Parsing, unmarshalling or marshalling failed
    Error { message: String },
    Skipped { reason: String },
}

impl CheckStatus {
    pub fn is_round_trip(&self) -> bool {
        matches!(self, CheckStatus::RoundTrip)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CheckStatus::Mismatch { .. } | CheckStatus::Error { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCheckResult {
    pub path: PathBuf,
    pub status: CheckStatus,
    /// Qualified name of the document element, when it could be parsed
    pub root_element: Option<String>,
    pub duration: Duration,
}

impl FileCheckResult {
    fn skipped(path: PathBuf, reason: &str) -> Self {
        Self {
            path,
            status: CheckStatus::Skipped {
                reason: reason.to_string(),
            },
            root_element: None,
            duration: Duration::ZERO,
        }
    }
}

/// Aggregated results of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResults {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub total_files: usize,
    pub round_trip_files: usize,
    pub mismatch_files: usize,
    pub error_files: usize,
    pub skipped_files: usize,
    pub total_duration: Duration,
    pub file_results: Vec<FileCheckResult>,
}

impl CheckResults {
    pub fn aggregate(file_results: Vec<FileCheckResult>, started_at: DateTime<Utc>, total_duration: Duration) -> Self {
        let mut results = Self {
            run_id: Uuid::new_v4().to_string(),
            started_at,
            total_files: file_results.len(),
            round_trip_files: 0,
            mismatch_files: 0,
            error_files: 0,
            skipped_files: 0,
            total_duration,
            file_results: Vec::new(),
        };

        for result in &file_results {
            match result.status {
                CheckStatus::RoundTrip => results.round_trip_files += 1,
                CheckStatus::Mismatch { .. } => results.mismatch_files += 1,
                CheckStatus::Error { .. } => results.error_files += 1,
                CheckStatus::Skipped { .. } => results.skipped_files += 1,
            }
        }
        results.file_results = file_results;
        results
    }

    pub fn has_failures(&self) -> bool {
        self.mismatch_files > 0 || self.error_files > 0
    }

    /// Percentage of checked (not skipped) files that round-tripped
    pub fn success_rate(&self) -> f64 {
        let checked = self.total_files - self.skipped_files;
        if checked == 0 {
            0.0
        } else {
            (self.round_trip_files as f64 / checked as f64) * 100.0
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileCheckResult> + '_ {
        self.file_results.iter().filter(|r| r.status.is_failure())
    }
}

/// Runs documents through unmarshall, marshall and compare
#[derive(Clone)]
pub struct RoundTripChecker {
    registry: Arc<XmlObjectProviderRegistry>,
    options: CheckOptions,
}

impl RoundTripChecker {
    pub fn new(registry: Arc<XmlObjectProviderRegistry>, options: CheckOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// Check one in-memory document.
    ///
    /// Content dropped by lenient unmarshalling is a mismatch. Otherwise the
    /// marshalled output is unmarshalled and marshalled once more, and the two
    /// outputs must agree, so canonical rewrites of typed values (`1` written
    /// back as `true`) still count as a round trip.
    pub fn check_document(&self, xml: &str) -> (CheckStatus, Option<String>) {
        let original = match dom::parse_str_with(xml, &self.options.parser) {
            Ok(document) => document,
            Err(e) => return (error_status(e), None),
        };
        let root_element = Some(original.root().name().to_string());

        let (object, dropped) = match self.unmarshall(original.root()) {
            Ok(result) => result,
            Err(e) => return (error_status(e), root_element),
        };
        if let Some(first) = dropped.first() {
            let difference = match dropped.len() {
                1 => format!("unmarshalling dropped {}", first),
                n => format!("unmarshalling dropped {} and {} more", first, n - 1),
            };
            return (CheckStatus::Mismatch { difference }, root_element);
        }

        let output = match self.marshall_fresh(&object) {
            Ok(output) => output,
            Err(e) => return (error_status(e), root_element),
        };
        let reparsed = match dom::parse_str_with(&output, &self.options.parser) {
            Ok(document) => document,
            Err(e) => {
                return (
                    CheckStatus::Error {
                        message: format!("marshalled output does not parse: {}", e),
                    },
                    root_element,
                );
            }
        };

        let again = match self
            .unmarshall(reparsed.root())
            .map_err(XmlToolingError::from)
            .and_then(|(object, _)| self.marshall_fresh(&object))
            .and_then(|output| dom::parse_str_with(&output, &self.options.parser).map_err(XmlToolingError::from))
        {
            Ok(document) => document,
            Err(e) => {
                return (
                    CheckStatus::Error {
                        message: format!("marshalled output does not round-trip: {}", e),
                    },
                    root_element,
                );
            }
        };

        let status = match reparsed.root().first_difference(again.root()) {
            None => CheckStatus::RoundTrip,
            Some(difference) => CheckStatus::Mismatch { difference },
        };
        (status, root_element)
    }

    fn unmarshall(&self, element: &Arc<Element>) -> std::result::Result<(XmlObjectRef, Vec<String>), UnmarshallingError> {
        let mut context = UnmarshallingContext::new(&self.registry).strict(self.options.strict);
        let object = context.unmarshall(element)?;
        Ok((object, context.dropped()))
    }

    /// Marshall without reusing any DOM cached during unmarshalling
    fn marshall_fresh(&self, object: &XmlObjectRef) -> Result<String> {
        object.read().release_this_and_children_dom();
        Ok(self.registry.marshall_to_string(object)?)
    }

    pub fn check_file(&self, path: &Path) -> FileCheckResult {
        let start = Instant::now();
        let (status, root_element) = match std::fs::read_to_string(path) {
            Ok(xml) => self.check_document(&xml),
            Err(e) => (error_status(e), None),
        };
        debug!(path = %path.display(), ?status, "Checked file");

        FileCheckResult {
            path: path.to_path_buf(),
            status,
            root_element,
            duration: start.elapsed(),
        }
    }

    /// Check files in parallel, keeping input order. With fail-fast, files
    /// not yet started after the first failure are reported as skipped.
    pub fn check_files(&self, files: &[PathBuf]) -> Result<Vec<FileCheckResult>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .map_err(|e| XmlToolingError::Concurrency {
                details: format!("Failed to build worker pool: {}", e),
            })?;

        let stop = AtomicBool::new(false);
        let results = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    if stop.load(Ordering::Relaxed) {
                        return FileCheckResult::skipped(path.clone(), "stopped after first failure");
                    }
                    let result = self.check_file(path);
                    if self.options.fail_fast && result.status.is_failure() {
                        stop.store(true, Ordering::Relaxed);
                    }
                    result
                })
                .collect()
        });
        Ok(results)
    }

    /// Discover files below `path` and check them all
    pub async fn check_path(&self, path: &Path, discovery: &FileDiscovery) -> Result<CheckResults> {
        let started_at = Utc::now();
        let start = Instant::now();

        let files = discovery.discover_files(path).await?;
        info!(files = files.len(), threads = self.options.threads, "Starting round-trip check");

        let checker = self.clone();
        let file_results = tokio::task::spawn_blocking(move || checker.check_files(&files))
            .await
            .map_err(|e| XmlToolingError::Concurrency {
                details: format!("Task join error: {}", e),
            })??;

        let results = CheckResults::aggregate(file_results, started_at, start.elapsed());
        info!(
            total = results.total_files,
            round_trip = results.round_trip_files,
            mismatch = results.mismatch_files,
            errors = results.error_files,
            "Round-trip check finished"
        );
        Ok(results)
    }
}

fn error_status(err: impl std::fmt::Display) -> CheckStatus {
    CheckStatus::Error {
        message: err.to_string(),
    }
}
