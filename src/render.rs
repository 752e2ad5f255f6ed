//! Row Renderer - One Row To One SVG Document
//!
//! Fill the template, derive the file name, lay the message out on a
//! single monospaced line and emit a fixed-size SVG. Text that runs past
//! the canvas edge is clipped by the viewer, not treated as an error.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use thiserror::Error;

use crate::dataset::Row;
use crate::glyphs::GlyphResolver;
use crate::options::{BatchConfig, Layout, MissingValuePolicy, RenderOptions, StrokeFont};
use crate::path::{transform_strokes, PathData, Transform};
use crate::template::Template;

pub const NOTE_EXTENSION: &str = "svg";
const NAME_SEPARATOR: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFailureKind {
    MissingPlaceholder,
    RenderError,
    Cancelled,
}

impl fmt::Display for RowFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RowFailureKind::MissingPlaceholder => "missing placeholder",
            RowFailureKind::RenderError => "render error",
            RowFailureKind::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// A row that produced no document.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("row {row_index}: {kind}: {detail}")]
pub struct RowFailure {
    pub kind: RowFailureKind,
    pub row_index: usize,
    pub detail: String,
}

impl RowFailure {
    pub fn new(kind: RowFailureKind, row_index: usize, detail: impl Into<String>) -> Self {
        Self {
            kind,
            row_index,
            detail: detail.into(),
        }
    }
}

/// One generated note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub name: String,
    pub row_index: usize,
    pub message: String,
    /// Placeholders left literal because the row had no value.
    pub missing_placeholders: Vec<String>,
    pub svg: Vec<u8>,
}

/// `<identity>_note.svg` from the identity column, else `note_<index>.svg`.
/// Whitespace-only identities fall back to the positional name; others are
/// normalized as-is, surrounding spaces included.
pub fn document_name(row: &Row, row_index: usize, identity_column: &str) -> String {
    match row.get(identity_column).filter(|v| !v.trim().is_empty()) {
        Some(identity) => format!("{}_note.{}", normalize_name(identity), NOTE_EXTENSION),
        None => format!("note_{}.{}", row_index, NOTE_EXTENSION),
    }
}

/// Lower-case, spaces to `_`. Path separators are flattened too so every
/// entry lands at the archive root.
pub fn normalize_name(identity: &str) -> String {
    identity
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => NAME_SEPARATOR,
            other => other,
        })
        .collect()
}

/// Lay `text` out left to right. Characters without a glyph add no
/// commands but still take up one pitch.
pub fn text_to_path(
    text: &str,
    font: StrokeFont,
    resolver: &dyn GlyphResolver,
    layout: &Layout,
) -> PathData {
    let mut data = PathData::new();
    let mut current_x = layout.x_offset;
    for ch in text.chars() {
        if let Some(strokes) = resolver.resolve(ch, font) {
            let transform = Transform::new(layout.scale, current_x, layout.y_offset);
            data.extend(transform_strokes(&strokes, &transform));
        }
        current_x += layout.pitch();
    }
    data
}

/// Build SVG elements incrementally
pub struct SvgBuilder {
    width: f64,
    height: f64,
    elements: Vec<String>,
}

impl SvgBuilder {
    pub fn new(layout: &Layout) -> Self {
        Self {
            width: layout.canvas_width,
            height: layout.canvas_height,
            elements: vec![],
        }
    }

    /// Full-canvas background rectangle
    pub fn add_background(&mut self, fill: &str) {
        self.elements.push(format!(
            r#"<rect x="0" y="0" width="100%" height="100%" fill="{}"/>"#,
            fill
        ));
    }

    /// Stroked, unfilled path
    pub fn add_stroke_path(&mut self, d: &str, stroke: &str, stroke_width: f64) {
        self.elements.push(format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"/>"#,
            d, stroke, stroke_width
        ));
    }

    pub fn build(&self) -> Result<String, fmt::Error> {
        let mut svg = String::new();
        writeln!(svg, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        )?;
        for element in &self.elements {
            writeln!(svg, "  {}", element)?;
        }
        writeln!(svg, "</svg>")?;
        Ok(svg)
    }
}

/// Serialize one note. Fails if any coordinate is not finite.
pub fn render_svg(path: &PathData, options: &RenderOptions, layout: &Layout) -> Result<String, String> {
    if let Some(bad) = path.first_non_finite() {
        return Err(format!("non-finite coordinate in path command {:?}", bad));
    }

    let mut builder = SvgBuilder::new(layout);
    if let Some(background) = &options.background {
        builder.add_background(background.as_str());
    }
    builder.add_stroke_path(&path.to_svg_d(), options.stroke_color.as_str(), options.stroke_width);
    builder.build().map_err(|e| format!("failed to write SVG: {}", e))
}

/// Renders rows against one template and one set of options.
pub struct RowRenderer<'a> {
    resolver: &'a dyn GlyphResolver,
    config: &'a BatchConfig,
}

impl<'a> RowRenderer<'a> {
    pub fn new(resolver: &'a dyn GlyphResolver, config: &'a BatchConfig) -> Self {
        Self { resolver, config }
    }

    pub fn render_row(
        &self,
        row_index: usize,
        row: &Row,
        template: &Template,
    ) -> Result<RenderedDocument, RowFailure> {
        let filled = template.fill(row);
        if !filled.is_complete() && self.config.missing_values == MissingValuePolicy::Skip {
            return Err(RowFailure::new(
                RowFailureKind::MissingPlaceholder,
                row_index,
                format!("no value for {}", filled.missing.join(", ")),
            ));
        }

        let name = document_name(row, row_index, &self.config.identity_column);
        let path = text_to_path(&filled.text, self.config.render.font, self.resolver, &self.config.layout);
        let svg = render_svg(&path, &self.config.render, &self.config.layout)
            .map_err(|detail| RowFailure::new(RowFailureKind::RenderError, row_index, detail))?;

        log::debug!("row {}: rendered {} ({} commands)", row_index, name, path.commands().len());
        Ok(RenderedDocument {
            name,
            row_index,
            message: filled.text,
            missing_placeholders: filled.missing,
            svg: svg.into_bytes(),
        })
    }
}
