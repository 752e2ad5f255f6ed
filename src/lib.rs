//! StrokeNotes Core - Personalized Note Compiler
//!
//! # The Batch Laws
//! 1. One Row, One Outcome: a document or a skip, never both, never neither
//! 2. Rows Fail Alone: a bad row never aborts the batch
//! 3. Check Once: placeholder columns are validated before the first row
//! 4. Deterministic Output: identical inputs give byte-identical archives
//! 5. Missing Glyphs Are Silent: unsupported characters are left out

pub mod dataset;
pub mod options;
pub mod glyphs;
pub mod path;
pub mod template;
pub mod validation;
pub mod render;
pub mod archive;
pub mod hashing;
pub mod pipeline;

pub use dataset::{Dataset, DatasetError, Row};
pub use options::{BatchConfig, Color, Layout, MissingValuePolicy, OptionsError, RenderOptions, StrokeFont};
pub use glyphs::{GlyphResolver, HersheyFontSet, StrokePath};
pub use path::{PathCommand, PathData, Transform};
pub use template::{extract_placeholders, fill, Filled, Template};
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, ViolationSeverity};
pub use render::{RenderedDocument, RowFailure, RowFailureKind, RowRenderer};
pub use archive::{ArchiveBuilder, ArchiveError};
pub use hashing::{compute_manifest_hash, compute_job_hash, canonical_json};
pub use pipeline::{BatchError, BatchPipeline, BatchReport, BatchResult, Progress, SkipRecord};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
