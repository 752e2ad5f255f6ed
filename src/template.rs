//! Template Engine - `[Column]` Placeholders
//!
//! Grammar: `'[' name ']'` where name is one or more characters other
//! than `]`. Matching is leftmost-first; a `[` that never closes, or `[]`,
//! is ordinary text. Names are matched verbatim and case-sensitively.

use serde::{Deserialize, Serialize};

use crate::dataset::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn scan(template: &str) -> Vec<Segment<'_>> {
    let mut segments = vec![];
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(offset) = template[cursor..].find('[') {
        let open = cursor + offset;
        let name_start = open + 1;
        match template[name_start..].find(']') {
            Some(0) => {
                // "[]" is not a placeholder; retry after this bracket
                cursor = name_start;
            }
            Some(len) => {
                if open > text_start {
                    segments.push(Segment::Text(&template[text_start..open]));
                }
                let close = name_start + len;
                segments.push(Segment::Placeholder(&template[name_start..close]));
                cursor = close + 1;
                text_start = cursor;
            }
            None => break,
        }
    }

    if text_start < template.len() {
        segments.push(Segment::Text(&template[text_start..]));
    }
    segments
}

/// Placeholder names in order of first occurrence, without duplicates.
pub fn extract_placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = vec![];
    for segment in scan(template) {
        if let Segment::Placeholder(name) = segment {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Result of filling a template for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filled {
    pub text: String,
    /// Placeholders with no value in the row, in order of first occurrence.
    pub missing: Vec<String>,
}

impl Filled {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Substitute every placeholder with the row's value. A placeholder with
/// no value is left as its literal `[name]` token and listed in `missing`.
pub fn fill(template: &str, row: &Row) -> Filled {
    let mut text = String::with_capacity(template.len());
    let mut missing: Vec<String> = vec![];

    for segment in scan(template) {
        match segment {
            Segment::Text(t) => text.push_str(t),
            Segment::Placeholder(name) => match row.get(name) {
                Some(value) => text.push_str(value),
                None => {
                    text.push('[');
                    text.push_str(name);
                    text.push(']');
                    if !missing.iter().any(|m| m == name) {
                        missing.push(name.to_string());
                    }
                }
            },
        }
    }

    Filled { text, missing }
}

/// A message template with its placeholder set resolved up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Template {
    source: String,
    placeholders: Vec<String>,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let placeholders = extract_placeholders(&source);
        Self { source, placeholders }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn fill(&self, row: &Row) -> Filled {
        fill(&self.source, row)
    }

    /// The template with every placeholder token removed.
    pub fn literal_text(&self) -> String {
        scan(&self.source)
            .into_iter()
            .filter_map(|s| match s {
                Segment::Text(t) => Some(t),
                Segment::Placeholder(_) => None,
            })
            .collect()
    }

    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }
}

impl From<String> for Template {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

impl From<Template> for String {
    fn from(template: Template) -> Self {
        template.source
    }
}
