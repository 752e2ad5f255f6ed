//! Batch Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use strokenotes_core::{
    BatchConfig, BatchError, BatchPipeline, Dataset, HersheyFontSet, Layout, MissingValuePolicy,
    RowFailureKind, StrokeFont, Template,
};

// Space, '!' and '"' from the roman simplex set.
const GLYPHS: &str = "12345  1JZ\n12345  9MWRFRT RRYQZR[SZRY\n12345  6JZNFNM RVFVM\n";

fn create_pipeline(config: BatchConfig) -> BatchPipeline {
    let fonts = HersheyFontSet::new().with_jhf(StrokeFont::RomanSimplex, GLYPHS);
    BatchPipeline::new(Box::new(fonts), config)
}

fn csv(content: &str) -> Dataset {
    Dataset::from_csv_reader(content.as_bytes()).unwrap()
}

fn archive_entries(bytes: &[u8]) -> Vec<(String, String)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = String::new();
            file.read_to_string(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}

#[test]
fn invariant_example_row_named_by_identity() {
    let pipeline = create_pipeline(BatchConfig::default());
    let dataset = csv("First Name\nAda\n");

    let result = pipeline.run(&dataset, &Template::new("Hi [First Name]!")).unwrap();

    assert_eq!(result.report.succeeded, 1);
    assert!(result.report.skipped.is_empty());
    assert!(result.report.flagged.is_empty());
    let entries = archive_entries(&result.archive);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "ada_note.svg");
    assert!(entries[0].1.contains("<path d=\"M"));
}

#[test]
fn invariant_every_row_has_exactly_one_outcome() {
    let config = BatchConfig {
        missing_values: MissingValuePolicy::Skip,
        ..BatchConfig::default()
    };
    let pipeline = create_pipeline(config);
    let dataset = csv("First Name,Email\nAda,ada@example.com\nGrace,\n,alan@example.com\nLinus,\n");

    let result = pipeline.run(&dataset, &Template::new("[Email]!")).unwrap();
    let report = &result.report;

    assert_eq!(report.total_rows, 4);
    assert_eq!(report.succeeded + report.skipped.len(), report.total_rows);

    let rendered: BTreeSet<usize> = report.entries.iter().map(|e| e.row_index).collect();
    let skipped: BTreeSet<usize> = report.skipped.iter().map(|s| s.row_index).collect();
    assert!(rendered.is_disjoint(&skipped));
    assert_eq!(rendered.union(&skipped).count(), 4);

    assert_eq!(skipped, BTreeSet::from([1, 3]));
    assert!(report.skipped.iter().all(|s| s.kind == RowFailureKind::MissingPlaceholder));
    // Header is line 1, so row index 1 is line 3
    assert_eq!(report.skipped[0].line, 3);

    let names: Vec<_> = archive_entries(&result.archive).into_iter().map(|e| e.0).collect();
    assert_eq!(names, vec!["ada_note.svg".to_string(), "note_2.svg".to_string()]);
}

#[test]
fn invariant_missing_column_warns_once_and_flags_rows() {
    let pipeline = create_pipeline(BatchConfig::default());
    let dataset = csv("First Name\nAda\nGrace\n");

    let result = pipeline.run(&dataset, &Template::new("[First Name] [Email]")).unwrap();
    let report = &result.report;

    let warnings: Vec<_> = report.warnings.iter().filter(|w| w.rule == "missing_columns").collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("Email"));

    // Warn policy: every row renders and is flagged
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.flagged.len(), 2);
    assert!(report.flagged.iter().all(|f| f.missing == vec!["Email".to_string()]));
}

#[test]
fn invariant_header_only_dataset_is_empty_batch() {
    let pipeline = create_pipeline(BatchConfig::default());
    let dataset = csv("First Name,Email\n");

    let result = pipeline.run(&dataset, &Template::new("Hi [First Name]")).unwrap();

    assert_eq!(result.report.total_rows, 0);
    assert_eq!(result.report.succeeded, 0);
    assert!(result.report.skipped.is_empty());
    assert!(archive_entries(&result.archive).is_empty());
}

#[test]
fn invariant_unreadable_dataset_aborts_batch() {
    let pipeline = create_pipeline(BatchConfig::default());
    let dir = tempfile::tempdir().unwrap();

    let empty = dir.path().join("empty.csv");
    std::fs::write(&empty, "").unwrap();
    let err = pipeline.run_path(&empty, &Template::new("Hi")).unwrap_err();
    assert!(matches!(err, BatchError::Dataset(_)));

    let missing = dir.path().join("nope.csv");
    let err = pipeline.run_path(&missing, &Template::new("Hi")).unwrap_err();
    assert!(err.to_string().contains("Dataset error"));
}

#[test]
fn invariant_blank_template_rejected() {
    let pipeline = create_pipeline(BatchConfig::default());
    let err = pipeline.run(&csv("First Name\nAda\n"), &Template::new("")).unwrap_err();
    assert!(matches!(err, BatchError::InvalidConfiguration(_)));
}

#[test]
fn invariant_font_without_glyphs_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let fonts = HersheyFontSet::load_dir(&dir.path().join("fonts")).unwrap();
    let pipeline = BatchPipeline::new(Box::new(fonts), BatchConfig::default());

    let err = pipeline.run(&csv("First Name\nAda\nGrace\n"), &Template::new("Hi [First Name]")).unwrap_err();
    match err {
        BatchError::InvalidConfiguration(message) => assert!(message.contains("font_loaded")),
        other => panic!("expected configuration error, got {other}"),
    }
}

#[test]
fn invariant_invalid_layout_rejected() {
    let config = BatchConfig {
        layout: Layout {
            canvas_width: -600.0,
            scale: 0.0,
            ..Layout::default()
        },
        ..BatchConfig::default()
    };
    let err = create_pipeline(config)
        .run(&csv("First Name\nAda\n"), &Template::new("!"))
        .unwrap_err();
    assert!(matches!(err, BatchError::InvalidConfiguration(_)));
}

#[test]
fn invariant_rerun_is_byte_identical() {
    let pipeline = create_pipeline(BatchConfig::default());
    let dataset = csv("First Name\nAda\nGrace Hopper\n\n");
    let template = Template::new("Hi [First Name]! \"thanks\"");

    let first = pipeline.run(&dataset, &template).unwrap();
    let second = pipeline.run(&dataset, &template).unwrap();

    assert_eq!(first.archive, second.archive);
    assert_eq!(first.report.archive_sha256, second.report.archive_sha256);
    assert_eq!(first.report.manifest_hash, second.report.manifest_hash);
    assert_eq!(first.report.job_hash, second.report.job_hash);
    assert_ne!(first.report.batch_id, second.report.batch_id);
}

#[test]
fn invariant_name_collision_last_write_wins() {
    let pipeline = create_pipeline(BatchConfig::default());
    let dataset = csv("First Name,Note\nAda,!\nada,\"!!\"\n");

    let result = pipeline.run(&dataset, &Template::new("[Note]")).unwrap();
    let report = &result.report;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.overwritten, vec!["ada_note.svg".to_string()]);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].row_index, 1);

    let entries = archive_entries(&result.archive);
    assert_eq!(entries.len(), 1);
    // The second row's message has two glyphs, i.e. two pen-up moves per glyph
    assert_eq!(entries[0].1.matches('M').count(), 4);
}

#[test]
fn invariant_cancelled_rows_are_recorded() {
    let flag = Arc::new(AtomicBool::new(true));
    let pipeline = create_pipeline(BatchConfig::default()).with_cancel_flag(flag);
    let dataset = csv("First Name\nAda\nGrace\n");

    let result = pipeline.run(&dataset, &Template::new("Hi")).unwrap();

    assert!(result.report.cancelled);
    assert_eq!(result.report.succeeded, 0);
    assert_eq!(result.report.skipped.len(), 2);
    assert!(result.report.skipped.iter().all(|s| s.kind == RowFailureKind::Cancelled));
}

#[test]
fn invariant_report_serializes() {
    let pipeline = create_pipeline(BatchConfig::default());
    let result = pipeline.run(&csv("First Name\nAda\n"), &Template::new("!")).unwrap();
    let json = serde_json::to_value(&result.report).unwrap();
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["entries"][0]["name"], "ada_note.svg");
    assert_eq!(json["entries"][0]["sha256"].as_str().unwrap().len(), 64);
}
