//! Heading boundary detection and chapter naming.
//!
//! ## Exactness contract
//!
//! A boundary is a line matching `^#{N}[ \t]+<title>` with *exactly* N
//! hashes — shallower and deeper headings flow into the current section
//! unchanged. Sections are expressed as line ranges over the document
//! split with `split_inclusive('\n')`, so every line slice keeps its own
//! terminator and concatenating any range reproduces the source bytes
//! byte-for-byte. The splitter leans on that: chapters must jointly
//! reconstruct the document, not a re-normalised rendition of it.

use crate::error::CorpusError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that cannot appear in a chapter file name.
static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Recogniser for boundary headings at one fixed depth.
///
/// Compiled once per run; matching is per line, not per document, so the
/// pattern never needs multi-line mode.
#[derive(Debug)]
pub struct HeadingMatcher {
    re: Regex,
}

impl HeadingMatcher {
    /// Build a matcher for headings of exactly `depth` hashes (1–6).
    pub fn new(depth: u8) -> Result<Self, CorpusError> {
        let re = Regex::new(&format!(r"^(#{{{}}})[ \t]+(.+?)\s*$", depth))
            .map_err(|e| CorpusError::Internal(format!("heading pattern: {e}")))?;
        Ok(Self { re })
    }

    /// The heading's title if `line` is a boundary. The line may carry its
    /// trailing newline; a deeper heading, a missing space after the
    /// hashes, or an empty title all disqualify it.
    pub fn title<'l>(&self, line: &'l str) -> Option<&'l str> {
        self.re
            .captures(line)
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str().trim())
    }
}

/// A contiguous run of lines: `[start, end)` indexes into the inclusive
/// line slice, heading line included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub start: usize,
    pub end: usize,
}

/// Everything the splitter needs to know about one document's structure.
#[derive(Debug, Clone)]
pub struct DocOutline {
    /// Content before the first boundary, when present and not all blank.
    /// Carries the fixed title "prologue".
    pub preamble: Option<Section>,
    /// One section per boundary heading, in document order, jointly
    /// covering first boundary → EOF.
    pub sections: Vec<Section>,
}

impl DocOutline {
    /// Zero boundaries: the no-match policies apply.
    pub fn is_unsplit(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Scan `lines` (as produced by `split_inclusive('\n')`) for boundaries.
pub fn outline(lines: &[&str], matcher: &HeadingMatcher) -> DocOutline {
    let mut bounds: Vec<(usize, String)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(title) = matcher.title(line) {
            bounds.push((i, title.to_string()));
        }
    }

    let mut sections = Vec::with_capacity(bounds.len());
    for (bi, (start, title)) in bounds.iter().enumerate() {
        let end = bounds.get(bi + 1).map(|(s, _)| *s).unwrap_or(lines.len());
        sections.push(Section {
            title: title.clone(),
            start: *start,
            end,
        });
    }

    let preamble = match bounds.first() {
        Some((first, _)) if *first > 0 => {
            let all_blank = lines[..*first].iter().all(|l| l.trim().is_empty());
            if all_blank {
                None
            } else {
                Some(Section {
                    title: "prologue".to_string(),
                    start: 0,
                    end: *first,
                })
            }
        }
        _ => None,
    };

    DocOutline { preamble, sections }
}

/// Turn a heading title into a filesystem-safe slug: unsafe runs become
/// `_`, edges are trimmed, lowercased, capped at 80 chars, with
/// "untitled" as the last resort.
pub fn slugify(title: &str) -> String {
    let slug = RE_UNSAFE_CHARS.replace_all(title, "_");
    let slug = slug.trim_matches('_').to_ascii_lowercase();
    let slug: String = slug.chars().take(80).collect();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Chapter file name: zero-padded ordinal prefix plus slug. The ordinal
/// keeps names unique even when two headings share a slug.
pub fn chapter_file_name(ordinal: usize, title: &str) -> String {
    format!("ch{:02}_{}.md", ordinal, slugify(title))
}
