//! Batch Pipeline - Single Entry Point
//!
//! Start -> check once -> per row: fill, render, append or skip -> finalize.
//! Every input row ends up as exactly one archive write or exactly one
//! skip record. Only dataset and configuration failures abort a batch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::archive::{ArchiveBuilder, ArchiveError};
use crate::dataset::{Dataset, DatasetError};
use crate::glyphs::GlyphResolver;
use crate::hashing::{compute_job_hash, compute_manifest_hash, sha256_hex};
use crate::options::BatchConfig;
use crate::render::{RowFailure, RowFailureKind, RowRenderer};
use crate::template::Template;
use crate::validation::{CheckInput, ValidationResult, ValidationViolation, Validator, ViolationSeverity};
use crate::ENGINE_VERSION;

/// Rows are reported to people with the header as line 1.
const HEADER_LINES: usize = 1;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub row_index: usize,
    /// 1-indexed line in the source file, header included
    pub line: usize,
    pub kind: RowFailureKind,
    pub detail: String,
}

impl From<RowFailure> for SkipRecord {
    fn from(failure: RowFailure) -> Self {
        Self {
            row_index: failure.row_index,
            line: human_line(failure.row_index),
            kind: failure.kind,
            detail: failure.detail,
        }
    }
}

/// A row that rendered with placeholders left as literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedRow {
    pub row_index: usize,
    pub line: usize,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// Row whose document ended up in the archive under this name
    pub row_index: usize,
    pub size: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub engine_version: String,
    pub generated_at: DateTime<Utc>,
    pub job_hash: String,
    pub archive_name: String,
    pub archive_sha256: String,
    pub manifest_hash: String,
    pub total_rows: usize,
    pub succeeded: usize,
    pub skipped: Vec<SkipRecord>,
    pub flagged: Vec<FlaggedRow>,
    /// Names written more than once; the last row's document was kept
    pub overwritten: Vec<String>,
    pub cancelled: bool,
    pub warnings: Vec<ValidationViolation>,
    pub entries: Vec<ManifestEntry>,
}

impl BatchReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// One line per skipped row, e.g. `line 3: missing placeholder: no value for Email`
    pub fn skip_summary(&self) -> Vec<String> {
        self.skipped
            .iter()
            .map(|s| format!("line {}: {}: {}", s.line, s.kind, s.detail))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub archive: Vec<u8>,
    pub report: BatchReport,
}

/// Rows finished so far, reported after each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.done * 100) / self.total) as u8
    }
}

fn human_line(row_index: usize) -> usize {
    row_index + 1 + HEADER_LINES
}

/// The batch pipeline - single entry point for note generation
pub struct BatchPipeline {
    resolver: Box<dyn GlyphResolver>,
    validator: Validator,
    config: BatchConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchPipeline {
    pub fn new(resolver: Box<dyn GlyphResolver>, config: BatchConfig) -> Self {
        Self {
            resolver,
            validator: Validator::new(),
            config,
            cancel: None,
        }
    }

    /// Stop between rows once `flag` is set. Remaining rows are recorded
    /// as cancelled skips.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Upfront checks. Runs once per batch, never per row.
    pub fn check(&self, dataset: &Dataset, template: &Template) -> ValidationResult {
        self.validator.validate(&CheckInput {
            template,
            dataset,
            config: &self.config,
            resolver: self.resolver.as_ref(),
        })
    }

    /// Load the dataset at `path` and run the batch.
    pub fn run_path(&self, path: &Path, template: &Template) -> Result<BatchResult, BatchError> {
        let dataset = Dataset::load(path)?;
        self.run(&dataset, template)
    }

    pub fn run(&self, dataset: &Dataset, template: &Template) -> Result<BatchResult, BatchError> {
        self.run_with_progress(dataset, template, |_| {})
    }

    pub fn run_with_progress(
        &self,
        dataset: &Dataset,
        template: &Template,
        mut progress: impl FnMut(Progress),
    ) -> Result<BatchResult, BatchError> {
        self.config
            .validate()
            .map_err(|e| BatchError::InvalidConfiguration(e.to_string()))?;

        let validation = self.check(dataset, template);
        for violation in &validation.violations {
            log::warn!("{}: {}", violation.rule, violation.message);
        }
        if !validation.valid {
            let messages: Vec<_> = validation.violations.iter()
                .filter(|v| v.severity == ViolationSeverity::Error)
                .map(|v| format!("{}: {}", v.rule, v.message))
                .collect();
            return Err(BatchError::InvalidConfiguration(messages.join("; ")));
        }

        let total = dataset.len();
        log::info!(
            "starting batch: {} rows, font {}, template {:?}",
            total,
            self.config.render.font,
            template.source()
        );

        let renderer = RowRenderer::new(self.resolver.as_ref(), &self.config);
        let mut archive = ArchiveBuilder::new();
        let mut writers: Vec<usize> = vec![];
        let mut succeeded = 0;
        let mut skipped: Vec<SkipRecord> = vec![];
        let mut flagged: Vec<FlaggedRow> = vec![];
        let mut overwritten: Vec<String> = vec![];
        let mut cancelled = false;

        for (row_index, row) in dataset.rows().iter().enumerate() {
            if !cancelled && self.is_cancelled() {
                log::warn!("batch cancelled before row {}", row_index);
                cancelled = true;
            }

            let outcome = if cancelled {
                Err(RowFailure::new(RowFailureKind::Cancelled, row_index, "batch cancelled"))
            } else {
                panic::catch_unwind(AssertUnwindSafe(|| renderer.render_row(row_index, row, template)))
                    .unwrap_or_else(|payload| {
                        Err(RowFailure::new(
                            RowFailureKind::RenderError,
                            row_index,
                            panic_message(payload.as_ref()),
                        ))
                    })
            };

            match outcome {
                Ok(document) => {
                    if !document.missing_placeholders.is_empty() {
                        flagged.push(FlaggedRow {
                            row_index,
                            line: human_line(row_index),
                            missing: document.missing_placeholders.clone(),
                        });
                    }
                    if archive.add(document.name.clone(), document.svg) {
                        log::warn!("row {}: {} overwrites an earlier note", row_index, document.name);
                        writers[archive_position(&archive, &document.name)] = row_index;
                        if !overwritten.contains(&document.name) {
                            overwritten.push(document.name);
                        }
                    } else {
                        writers.push(row_index);
                    }
                    succeeded += 1;
                }
                Err(failure) => {
                    if failure.kind != RowFailureKind::Cancelled {
                        log::warn!("skipping {}", failure);
                    }
                    skipped.push(failure.into());
                }
            }

            progress(Progress { done: row_index + 1, total });
        }

        let bytes = archive.finish()?;
        let entries: Vec<ManifestEntry> = archive
            .entries()
            .zip(writers.iter())
            .map(|((name, data), &row_index)| ManifestEntry {
                name: name.to_string(),
                row_index,
                size: data.len(),
                sha256: sha256_hex(data),
            })
            .collect();

        let report = BatchReport {
            batch_id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            generated_at: Utc::now(),
            job_hash: compute_job_hash(template.source(), &self.config, dataset, ENGINE_VERSION)?,
            archive_name: self.config.archive_name.clone(),
            archive_sha256: sha256_hex(&bytes),
            manifest_hash: compute_manifest_hash(&entries)?,
            total_rows: total,
            succeeded,
            skipped,
            flagged,
            overwritten,
            cancelled,
            warnings: validation.violations,
            entries,
        };

        log::info!(
            "batch finished: {} of {} rows rendered, {} skipped, {} archive entries",
            report.succeeded,
            report.total_rows,
            report.skipped_count(),
            report.entries.len()
        );

        Ok(BatchResult { archive: bytes, report })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }
}

fn archive_position(archive: &ArchiveBuilder, name: &str) -> usize {
    archive
        .entries()
        .position(|(n, _)| n == name)
        .unwrap_or_default()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("unexpected failure: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("unexpected failure: {}", s)
    } else {
        "unexpected failure while rendering".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Row;
    use crate::glyphs::HersheyFontSet;
    use crate::options::StrokeFont;

    fn pipeline() -> BatchPipeline {
        let fonts = HersheyFontSet::new().with_jhf(StrokeFont::RomanSimplex, "12345  1JZ\n");
        BatchPipeline::new(Box::new(fonts), BatchConfig::default())
    }

    #[test]
    fn test_human_line_accounts_for_header() {
        assert_eq!(human_line(0), 2);
        assert_eq!(human_line(9), 11);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(Progress { done: 1, total: 4 }.percent(), 25);
        assert_eq!(Progress { done: 0, total: 0 }.percent(), 100);
    }

    #[test]
    fn test_progress_called_per_row() {
        let dataset = Dataset::new(
            vec!["First Name".to_string()],
            vec![Row::new().with("First Name", "a"), Row::new().with("First Name", "b")],
        );
        let mut seen = vec![];
        pipeline()
            .run_with_progress(&dataset, &Template::new("hi"), |p| seen.push(p.done))
            .unwrap();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_panicking_resolver_isolated_to_row() {
        struct Fragile;
        impl GlyphResolver for Fragile {
            fn resolve(&self, ch: char, _font: StrokeFont) -> Option<crate::glyphs::StrokePath> {
                if ch == '!' {
                    panic!("glyph table corrupted");
                }
                None
            }
        }

        let dataset = Dataset::new(
            vec!["Greeting".to_string()],
            vec![Row::new().with("Greeting", "ok"), Row::new().with("Greeting", "boom!")],
        );
        let pipeline = BatchPipeline::new(Box::new(Fragile), BatchConfig::default());
        let result = pipeline.run(&dataset, &Template::new("[Greeting]")).unwrap();

        assert_eq!(result.report.succeeded, 1);
        assert_eq!(result.report.skipped.len(), 1);
        let skip = &result.report.skipped[0];
        assert_eq!(skip.kind, RowFailureKind::RenderError);
        assert_eq!(skip.row_index, 1);
        assert!(skip.detail.contains("glyph table corrupted"));
    }
}
