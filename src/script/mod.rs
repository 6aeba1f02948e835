//! Script segmentation.
//!
//! A [`Script`] is the ordered list of non-blank, trimmed lines of the text
//! the user submitted.  [`Script::paragraphs`] windows those lines into
//! [`Paragraph`]s of exactly [`PANELS_PER_PARAGRAPH`] lines: one composite
//! image is generated per paragraph, one panel per line.
//!
//! ```rust
//! use stickman_studio::script::Script;
//!
//! let script = Script::parse("A stickman waves.\n\n  He walks away.  \n").unwrap();
//! let paragraphs = script.paragraphs();
//! assert_eq!(paragraphs.len(), 1);
//! assert_eq!(
//!     paragraphs[0].lines(),
//!     ["A stickman waves.", "He walks away.", "He walks away.", "He walks away."]
//! );
//! ```

use thiserror::Error;

/// Lines per paragraph, and therefore panels per composite image.
pub const PANELS_PER_PARAGRAPH: usize = 4;

/// Separator used when the script is read out as one narration blob.
const SENTENCE_JOINER: &str = ". ";

// ---------------------------------------------------------------------------
// ScriptError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// Nothing but whitespace was submitted.
    #[error("Script is empty")]
    Empty,
}

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// Ordered sequence of non-blank, trimmed script lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    lines: Vec<String>,
}

impl Script {
    /// Trim every line and drop the blank ones.
    ///
    /// Fails with [`ScriptError::Empty`] when no line survives.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if lines.is_empty() {
            return Err(ScriptError::Empty);
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Window the lines into groups of [`PANELS_PER_PARAGRAPH`], padding the
    /// last group by repeating its own final line.
    pub fn paragraphs(&self) -> Vec<Paragraph> {
        self.lines
            .chunks(PANELS_PER_PARAGRAPH)
            .map(|chunk| {
                let mut lines = chunk.to_vec();
                // chunks() never yields an empty slice
                let last = lines[lines.len() - 1].clone();
                while lines.len() < PANELS_PER_PARAGRAPH {
                    lines.push(last.clone());
                }
                Paragraph { lines }
            })
            .collect()
    }

    /// The whole script as a single sentence-joined text blob.
    pub fn narration_text(&self) -> String {
        self.lines.join(SENTENCE_JOINER)
    }
}

// ---------------------------------------------------------------------------
// Paragraph
// ---------------------------------------------------------------------------

/// Exactly [`PANELS_PER_PARAGRAPH`] lines that become one composite image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    lines: Vec<String>,
}

impl Paragraph {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of panels the composite image for this paragraph must contain.
    pub fn panel_count(&self) -> usize {
        self.lines.len()
    }
}

/// Segment raw text straight into paragraphs.
pub fn segment(text: &str) -> Result<Vec<Paragraph>, ScriptError> {
    Ok(Script::parse(text)?.paragraphs())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    // ---- parse ---

    #[test]
    fn empty_text_is_rejected() {
        assert_eq!(Script::parse(""), Err(ScriptError::Empty));
    }

    #[test]
    fn whitespace_only_text_is_rejected() {
        assert_eq!(Script::parse("  \n\t\n   \r\n"), Err(ScriptError::Empty));
    }

    #[test]
    fn lines_are_trimmed_and_blanks_dropped() {
        let script = Script::parse("\n  one \n\n two\r\n   \nthree").unwrap();
        assert_eq!(script.lines(), ["one", "two", "three"]);
    }

    // ---- paragraphs ---

    #[test]
    fn paragraph_count_is_ceil_of_quarter() {
        for n in 1..=13 {
            let paragraphs = segment(&numbered(n)).unwrap();
            assert_eq!(paragraphs.len(), n.div_ceil(PANELS_PER_PARAGRAPH), "n = {n}");
            assert!(paragraphs.iter().all(|p| p.panel_count() == 4));
        }
    }

    #[test]
    fn exact_multiple_needs_no_padding() {
        let paragraphs = segment(&numbered(8)).unwrap();
        assert_eq!(paragraphs[1].lines(), ["line 5", "line 6", "line 7", "line 8"]);
    }

    #[test]
    fn last_paragraph_repeats_its_own_last_line() {
        let paragraphs = segment(&numbered(5)).unwrap();
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[1].lines(), ["line 5", "line 5", "line 5", "line 5"]);

        let paragraphs = segment(&numbered(7)).unwrap();
        assert_eq!(paragraphs[1].lines(), ["line 5", "line 6", "line 7", "line 7"]);
    }

    #[test]
    fn two_line_script_pads_second_line_twice() {
        let paragraphs = segment("A stickman waves.\nHe walks away.").unwrap();
        assert_eq!(paragraphs.len(), 1);
        assert_eq!(
            paragraphs[0].lines(),
            [
                "A stickman waves.",
                "He walks away.",
                "He walks away.",
                "He walks away."
            ]
        );
    }

    // ---- narration_text ---

    #[test]
    fn narration_text_joins_real_lines_only() {
        let script = Script::parse("Hello there\nGeneral Kenobi").unwrap();
        assert_eq!(script.narration_text(), "Hello there. General Kenobi");
    }
}
