//! Glyph Resolver - Character To Stroke Path
//!
//! Glyphs come from Hershey `.jhf` files. Each glyph line holds a 5-char id,
//! a 3-char vertex count, then coordinate pairs encoded as offsets from `'R'`.
//! The first pair is the left/right bearing and `" R"` lifts the pen.
//! Glyph N of a file renders ASCII character `32 + N`.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::options::StrokeFont;

/// Textual stroke description in glyph-local units: whitespace separated
/// `M<x>,<y>` (pen-move) and `L<x>,<y>` (pen-draw) tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrokePath(String);

impl StrokePath {
    pub fn new(description: impl Into<String>) -> Self {
        Self(description.into())
    }

    /// Build a description from pen-down polylines.
    pub fn from_strokes(strokes: &[Vec<(i32, i32)>]) -> Self {
        let mut d = String::new();
        for stroke in strokes {
            for (i, (x, y)) in stroke.iter().enumerate() {
                let op = if i == 0 { 'M' } else { 'L' };
                if !d.is_empty() {
                    d.push(' ');
                }
                // Writing to a String cannot fail
                let _ = write!(d, "{op}{x},{y}");
            }
        }
        Self(d)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Maps a character in a font to its strokes. `None` means the font has no
/// glyph for it; callers omit the character and keep going.
pub trait GlyphResolver {
    fn resolve(&self, ch: char, font: StrokeFont) -> Option<StrokePath>;

    /// Whether `font` has any glyphs at all. A font with none cannot
    /// render a batch.
    fn has_glyphs(&self, _font: StrokeFont) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
struct HersheyGlyph {
    path: StrokePath,
}

/// Hershey glyph tables for the supported stroke fonts.
#[derive(Debug, Clone, Default)]
pub struct HersheyFontSet {
    fonts: HashMap<StrokeFont, Vec<Option<HersheyGlyph>>>,
}

const FIRST_CHAR: u32 = 32;

impl HersheyFontSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `<stem>.jhf` for every supported font from `dir`.
    /// Fonts whose file is missing stay empty; batches selecting them are
    /// rejected before the first row.
    pub fn load_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut set = Self::new();
        for font in StrokeFont::ALL {
            let path = dir.join(format!("{}.jhf", font.file_stem()));
            if !path.exists() {
                log::warn!("glyph file {} not found; font {} will render no characters", path.display(), font);
                continue;
            }
            let content = fs::read_to_string(&path)?;
            set.insert_jhf(font, &content);
        }
        Ok(set)
    }

    /// Parse Hershey glyph text and install it as the table for `font`.
    pub fn insert_jhf(&mut self, font: StrokeFont, content: &str) {
        let glyphs = parse_jhf(content);
        log::debug!("font {}: {} glyphs", font, glyphs.len());
        self.fonts.insert(font, glyphs);
    }

    pub fn with_jhf(mut self, font: StrokeFont, content: &str) -> Self {
        self.insert_jhf(font, content);
        self
    }

    pub fn glyph_count(&self, font: StrokeFont) -> usize {
        self.fonts.get(&font).map_or(0, |g| g.iter().flatten().count())
    }
}

impl GlyphResolver for HersheyFontSet {
    fn resolve(&self, ch: char, font: StrokeFont) -> Option<StrokePath> {
        let index = (ch as u32).checked_sub(FIRST_CHAR)? as usize;
        let glyphs = self.fonts.get(&font)?;
        glyphs.get(index)?.as_ref().map(|g| g.path.clone())
    }

    fn has_glyphs(&self, font: StrokeFont) -> bool {
        self.glyph_count(font) > 0
    }
}

fn parse_jhf(content: &str) -> Vec<Option<HersheyGlyph>> {
    let mut glyphs = vec![];
    let mut lines = content.lines().map(|l| l.trim_end_matches('\r'));

    while let Some(line) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        let count = if line.is_ascii() {
            line.get(5..8).and_then(|c| c.trim().parse::<usize>().ok())
        } else {
            None
        };
        let Some(count) = count else {
            log::warn!("skipping malformed glyph line: {:?}", line);
            glyphs.push(None);
            continue;
        };

        // Long glyphs wrap onto continuation lines
        let mut body = line.get(8..).unwrap_or("").to_string();
        while body.len() < count * 2 {
            match lines.next() {
                Some(next) => body.push_str(next),
                None => break,
            }
        }
        glyphs.push(decode_glyph(&body, count));
    }

    glyphs
}

fn decode_glyph(body: &str, count: usize) -> Option<HersheyGlyph> {
    let bytes = body.as_bytes();
    if count == 0 || bytes.len() < count * 2 {
        return None;
    }

    let mut pairs = bytes[..count * 2].chunks(2);
    let bearing = pairs.next()?;
    let left = decode(bearing[0]);

    let mut strokes: Vec<Vec<(i32, i32)>> = vec![];
    let mut current: Vec<(i32, i32)> = vec![];
    for pair in pairs {
        if pair == b" R" {
            if !current.is_empty() {
                strokes.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push((decode(pair[0]) - left, decode(pair[1])));
    }
    if !current.is_empty() {
        strokes.push(current);
    }

    Some(HersheyGlyph {
        path: StrokePath::from_strokes(&strokes),
    })
}

fn decode(byte: u8) -> i32 {
    byte as i32 - b'R' as i32
}
