//! Path Transformer - Glyph-Local Strokes To Absolute Commands
//!
//! Every coordinate pair goes through the same affine map:
//! `x' = x * scale + x_offset`, `y' = y * scale + y_offset`.

use std::fmt;

use crate::glyphs::StrokePath;

/// An absolute drawing command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    /// Lift the pen and move
    MoveTo(f64, f64),
    /// Draw a straight line
    LineTo(f64, f64),
}

impl PathCommand {
    pub fn point(&self) -> (f64, f64) {
        match *self {
            PathCommand::MoveTo(x, y) | PathCommand::LineTo(x, y) => (x, y),
        }
    }
}

impl fmt::Display for PathCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (op, (x, y)) = match self {
            PathCommand::MoveTo(..) => ('M', self.point()),
            PathCommand::LineTo(..) => ('L', self.point()),
        };
        write!(f, "{}{},{}", op, clean_zero(x), clean_zero(y))
    }
}

// Avoid emitting "-0"
fn clean_zero(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Uniform scale plus translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

impl Transform {
    pub fn new(scale: f64, x_offset: f64, y_offset: f64) -> Self {
        Self { scale, x_offset, y_offset }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.x_offset, y * self.scale + self.y_offset)
    }
}

/// Transform a glyph's stroke description into absolute commands.
///
/// Tokens that are not `M`/`L` commands with exactly two numeric
/// coordinates are dropped; the remaining strokes still render.
pub fn transform_strokes(path: &StrokePath, transform: &Transform) -> Vec<PathCommand> {
    path.as_str()
        .split_whitespace()
        .filter_map(parse_token)
        .map(|(pen_down, x, y)| {
            let (x, y) = transform.apply(x, y);
            if pen_down {
                PathCommand::LineTo(x, y)
            } else {
                PathCommand::MoveTo(x, y)
            }
        })
        .collect()
}

fn parse_token(token: &str) -> Option<(bool, f64, f64)> {
    let pen_down = match token.chars().next()? {
        'M' => false,
        'L' => true,
        _ => return None,
    };
    let mut coords = token[1..].split(',');
    let x = parse_coord(coords.next()?)?;
    let y = parse_coord(coords.next()?)?;
    if coords.next().is_some() {
        return None;
    }
    Some((pen_down, x, y))
}

fn parse_coord(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accumulated commands for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathData {
    commands: Vec<PathCommand>,
}

impl PathData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, commands: impl IntoIterator<Item = PathCommand>) {
        self.commands.extend(commands);
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// First command with a non-finite coordinate, if any.
    pub fn first_non_finite(&self) -> Option<&PathCommand> {
        self.commands.iter().find(|c| {
            let (x, y) = c.point();
            !x.is_finite() || !y.is_finite()
        })
    }

    /// SVG `d` attribute value.
    pub fn to_svg_d(&self) -> String {
        self.commands
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
