//! Validation System - Upfront Batch Checks
//!
//! Rules run once per batch, before any row is rendered, and produce
//! structured violations. Only `Error` violations stop a batch.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::glyphs::GlyphResolver;
use crate::options::{BatchConfig, MissingValuePolicy};
use crate::template::Template;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static CHECK_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_check_call_count() -> u32 {
    CHECK_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_check_call_count() {
    CHECK_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    /// Placeholders with no matching dataset column.
    pub missing_columns: Vec<String>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Warning)
    }
}

/// Everything a rule may look at.
pub struct CheckInput<'a> {
    pub template: &'a Template,
    pub dataset: &'a Dataset,
    pub config: &'a BatchConfig,
    pub resolver: &'a dyn GlyphResolver,
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, input: &CheckInput<'_>) -> Vec<ValidationViolation>;
}

/// Placeholders must name dataset columns.
pub fn missing_columns(template: &Template, dataset: &Dataset) -> Vec<String> {
    template
        .placeholders()
        .iter()
        .filter(|name| !dataset.has_column(name))
        .cloned()
        .collect()
}

// --- Concrete Rules ---

pub struct BlankTemplateRule;

impl ValidationRule for BlankTemplateRule {
    fn name(&self) -> &'static str { "blank_template" }

    fn validate(&self, input: &CheckInput<'_>) -> Vec<ValidationViolation> {
        if !input.template.is_blank() {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Error,
            message: "Message template is empty".to_string(),
            expected: Some("non-empty template".to_string()),
            actual: None,
            remediation: vec!["Enter a message template, e.g. \"Hi [First Name]!\"".to_string()],
        }]
    }
}

pub struct MissingColumnsRule;

impl ValidationRule for MissingColumnsRule {
    fn name(&self) -> &'static str { "missing_columns" }

    fn validate(&self, input: &CheckInput<'_>) -> Vec<ValidationViolation> {
        let missing = missing_columns(input.template, input.dataset);
        if missing.is_empty() {
            return vec![];
        }

        let consequence = match input.config.missing_values {
            MissingValuePolicy::Warn => "placeholders will stay as literal text",
            MissingValuePolicy::Skip => "every row will be skipped",
        };
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Warning,
            message: format!(
                "These placeholders are missing in the dataset: {} ({})",
                missing.join(", "),
                consequence
            ),
            expected: Some(missing.join(", ")),
            actual: Some(input.dataset.columns().join(", ")),
            remediation: vec![
                "Check spelling and capitalization against the header row".to_string(),
                "Add the column to the dataset or remove the placeholder".to_string(),
            ],
        }]
    }
}

pub struct IdentityColumnRule;

impl ValidationRule for IdentityColumnRule {
    fn name(&self) -> &'static str { "identity_column" }

    fn validate(&self, input: &CheckInput<'_>) -> Vec<ValidationViolation> {
        let column = &input.config.identity_column;
        if input.dataset.has_column(column) {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Info,
            message: format!("Identity column '{}' not found; files will be named by row position", column),
            expected: Some(column.clone()),
            actual: None,
            remediation: vec![],
        }]
    }
}

pub struct FontLoadedRule;

impl ValidationRule for FontLoadedRule {
    fn name(&self) -> &'static str { "font_loaded" }

    fn validate(&self, input: &CheckInput<'_>) -> Vec<ValidationViolation> {
        let font = input.config.render.font;
        if input.resolver.has_glyphs(font) {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Error,
            message: format!("Font {} has no glyphs loaded", font),
            expected: Some(format!("{}.jhf", font.file_stem())),
            actual: None,
            remediation: vec![
                "Point fonts_dir at a directory holding the Hershey .jhf files".to_string(),
                "Or pick a font whose glyph file is present".to_string(),
            ],
        }]
    }
}

pub struct UnrenderableCharactersRule;

impl ValidationRule for UnrenderableCharactersRule {
    fn name(&self) -> &'static str { "unrenderable_characters" }

    fn validate(&self, input: &CheckInput<'_>) -> Vec<ValidationViolation> {
        let font = input.config.render.font;
        if !input.resolver.has_glyphs(font) {
            return vec![];
        }
        let mut unsupported: Vec<char> = vec![];
        for ch in input.template.literal_text().chars() {
            if !unsupported.contains(&ch) && input.resolver.resolve(ch, font).is_none() {
                unsupported.push(ch);
            }
        }
        if unsupported.is_empty() {
            return vec![];
        }

        let listed: String = unsupported.iter().collect();
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Warning,
            message: format!("Font {} has no glyphs for: {}", font, listed),
            expected: None,
            actual: Some(listed),
            remediation: vec!["These characters will be left out of every note".to_string()],
        }]
    }
}

/// Validator orchestrates rules
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(BlankTemplateRule),
                Box::new(MissingColumnsRule),
                Box::new(IdentityColumnRule),
                Box::new(FontLoadedRule),
                Box::new(UnrenderableCharactersRule),
            ],
        }
    }

    pub fn validate(&self, input: &CheckInput<'_>) -> ValidationResult {
        #[cfg(feature = "test-hooks")]
        CHECK_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let mut violations = vec![];
        for rule in &self.rules {
            violations.extend(rule.validate(input));
        }

        let mut result = ValidationResult {
            valid: true,
            violations,
            missing_columns: missing_columns(input.template, input.dataset),
        };
        result.valid = !result.has_errors();
        result
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Row;
    use crate::glyphs::HersheyFontSet;
    use crate::options::{RenderOptions, StrokeFont};

    fn dataset() -> Dataset {
        Dataset::new(
            vec!["First Name".to_string()],
            vec![Row::new().with("First Name", "Ada")],
        )
    }

    fn run(template: &str, config: &BatchConfig) -> ValidationResult {
        let fonts = HersheyFontSet::new().with_jhf(StrokeFont::RomanSimplex, "12345  1JZ\n");
        let template = Template::new(template);
        let dataset = dataset();
        Validator::new().validate(&CheckInput {
            template: &template,
            dataset: &dataset,
            config,
            resolver: &fonts,
        })
    }

    #[test]
    fn test_missing_columns_warning() {
        let result = run("[First Name] [Email]", &BatchConfig::default());
        assert!(result.valid);
        assert_eq!(result.missing_columns, vec!["Email".to_string()]);
        let warning = result.warnings().find(|v| v.rule == "missing_columns").unwrap();
        assert!(warning.message.contains("Email"));
    }

    #[test]
    fn test_blank_template_is_error() {
        let result = run("   ", &BatchConfig::default());
        assert!(!result.valid);
        assert!(result.has_errors());
    }

    #[test]
    fn test_identity_column_info() {
        let config = BatchConfig {
            identity_column: "Customer".to_string(),
            ..BatchConfig::default()
        };
        let result = run(" ", &config);
        assert!(result
            .violations
            .iter()
            .any(|v| v.rule == "identity_column" && v.severity == ViolationSeverity::Info));
    }

    #[test]
    fn test_font_without_glyphs_is_error() {
        let config = BatchConfig {
            render: RenderOptions::default().with_font(StrokeFont::ScriptSimplex),
            ..BatchConfig::default()
        };
        let result = run("Hi [First Name]", &config);
        assert!(!result.valid);
        let error = result
            .violations
            .iter()
            .find(|v| v.rule == "font_loaded")
            .unwrap();
        assert_eq!(error.severity, ViolationSeverity::Error);
        assert_eq!(error.expected.as_deref(), Some("scripts.jhf"));
    }

    #[test]
    fn test_unrenderable_characters_listed_once() {
        // Only the space glyph is loaded
        let result = run("a a [First Name]", &BatchConfig::default());
        let warning = result
            .warnings()
            .find(|v| v.rule == "unrenderable_characters")
            .unwrap();
        assert_eq!(warning.actual.as_deref(), Some("a"));
    }
}
