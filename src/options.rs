//! Rendering Options - Fixed For The Whole Batch
//!
//! Fonts, colors and stroke width are validated here, once, when options
//! are built. Nothing downstream re-checks them per row or per character.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Unsupported font '{}' (expected one of: {})", .0, StrokeFont::names().join(", "))]
    UnknownFont(String),

    #[error("Invalid color '{0}': expected #rgb, #rrggbb or a color name")]
    InvalidColor(String),

    #[error("Stroke width must be a positive number, got {0}")]
    InvalidStrokeWidth(f64),

    #[error("Invalid layout: {field} must be a positive number, got {value}")]
    InvalidLayout { field: &'static str, value: f64 },

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// The supported Hershey stroke fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeFont {
    RomanSimplex,
    RomanDuplex,
    RomanTriplex,
    ItalicComplex,
    ItalicTriplex,
    ScriptSimplex,
    ScriptComplex,
}

impl StrokeFont {
    pub const ALL: [StrokeFont; 7] = [
        StrokeFont::RomanSimplex,
        StrokeFont::RomanDuplex,
        StrokeFont::RomanTriplex,
        StrokeFont::ItalicComplex,
        StrokeFont::ItalicTriplex,
        StrokeFont::ScriptSimplex,
        StrokeFont::ScriptComplex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrokeFont::RomanSimplex => "roman_simplex",
            StrokeFont::RomanDuplex => "roman_duplex",
            StrokeFont::RomanTriplex => "roman_triplex",
            StrokeFont::ItalicComplex => "italic_complex",
            StrokeFont::ItalicTriplex => "italic_triplex",
            StrokeFont::ScriptSimplex => "script_simplex",
            StrokeFont::ScriptComplex => "script_complex",
        }
    }

    /// File stem of the Hershey `.jhf` glyph file for this font.
    pub fn file_stem(&self) -> &'static str {
        match self {
            StrokeFont::RomanSimplex => "rowmans",
            StrokeFont::RomanDuplex => "rowmand",
            StrokeFont::RomanTriplex => "rowmant",
            StrokeFont::ItalicComplex => "italicc",
            StrokeFont::ItalicTriplex => "italict",
            StrokeFont::ScriptSimplex => "scripts",
            StrokeFont::ScriptComplex => "scriptc",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.name()).collect()
    }
}

impl Default for StrokeFont {
    fn default() -> Self {
        Self::RomanSimplex
    }
}

impl fmt::Display for StrokeFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrokeFont {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| OptionsError::UnknownFont(s.to_string()))
    }
}

/// A validated SVG paint value. Only hex colors and plain names are
/// accepted, so the value is always safe inside an XML attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn parse(value: &str) -> Result<Self, OptionsError> {
        let value = value.trim();
        let valid = match value.strip_prefix('#') {
            Some(hex) => {
                (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
            }
            None => !value.is_empty() && value.chars().all(|c| c.is_ascii_alphabetic()),
        };
        if valid {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(OptionsError::InvalidColor(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Color {
    type Error = OptionsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options applied to every document in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub font: StrokeFont,
    pub stroke_color: Color,
    pub stroke_width: f64,
    pub background: Option<Color>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            font: StrokeFont::default(),
            stroke_color: Color("#000000".to_string()),
            stroke_width: 1.0,
            background: None,
        }
    }
}

impl RenderOptions {
    /// Build options from user input with validation
    pub fn from_user(
        font: &str,
        stroke_color: &str,
        stroke_width: f64,
        background: Option<&str>,
    ) -> Result<Self, OptionsError> {
        let options = Self {
            font: font.parse()?,
            stroke_color: Color::parse(stroke_color)?,
            stroke_width,
            background: background.map(Color::parse).transpose()?,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if !self.stroke_width.is_finite() || self.stroke_width <= 0.0 {
            return Err(OptionsError::InvalidStrokeWidth(self.stroke_width));
        }
        Ok(())
    }

    pub fn with_font(mut self, font: StrokeFont) -> Self {
        self.font = font;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }
}

/// Fixed canvas and monospaced text metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub canvas_width: f64,
    pub canvas_height: f64,
    pub scale: f64,
    pub x_offset: f64,
    pub y_offset: f64,
    pub base_advance: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            canvas_width: 600.0,
            canvas_height: 200.0,
            scale: 1.5,
            x_offset: 10.0,
            y_offset: 70.0,
            base_advance: 20.0,
        }
    }
}

impl Layout {
    /// Horizontal advance applied after every character.
    pub fn pitch(&self) -> f64 {
        self.base_advance * self.scale
    }

    /// Canvas size, scale and advance must be finite and positive.
    /// Offsets may be any finite value.
    pub fn validate(&self) -> Result<(), OptionsError> {
        let positive = [
            ("canvas_width", self.canvas_width),
            ("canvas_height", self.canvas_height),
            ("scale", self.scale),
            ("base_advance", self.base_advance),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(OptionsError::InvalidLayout { field, value });
            }
        }
        for (field, value) in [("x_offset", self.x_offset), ("y_offset", self.y_offset)] {
            if !value.is_finite() {
                return Err(OptionsError::InvalidLayout { field, value });
            }
        }
        Ok(())
    }
}

/// What to do when a row has no value for a placeholder the template uses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePolicy {
    /// Keep the literal `[Name]` token, render the row and flag it.
    #[default]
    Warn,
    /// Skip the row with a `MissingPlaceholder` failure.
    Skip,
}

/// Batch-wide configuration, optionally loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub render: RenderOptions,
    pub layout: Layout,
    pub identity_column: String,
    pub missing_values: MissingValuePolicy,
    pub archive_name: String,
    pub fonts_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            layout: Layout::default(),
            identity_column: "First Name".to_string(),
            missing_values: MissingValuePolicy::default(),
            archive_name: "notes.zip".to_string(),
            fonts_dir: None,
        }
    }
}

impl BatchConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, OptionsError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check render options and layout together.
    pub fn validate(&self) -> Result<(), OptionsError> {
        self.render.validate()?;
        self.layout.validate()
    }

    pub fn from_file(path: &Path) -> Result<Self, OptionsError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
