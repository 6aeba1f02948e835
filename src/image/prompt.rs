//! Prompt builder for composite stickman comic strips.
//!
//! The service is asked for a single image with one panel per paragraph
//! line, arranged left to right in a single row, so that the composite can
//! be cut into equal-width frames afterwards.

// ---------------------------------------------------------------------------
// Style instructions
// ---------------------------------------------------------------------------

const STYLE_RULES: &str = "\
Style requirements:
- {n} equal-width panels in a single horizontal row (no gaps between panels)
- Clean white or very light background
- Minimalist style with thin black outlines
- Simple stickman figure (circle head, stick body, arms, legs) performing the action described
- Use subtle colors ONLY to highlight key elements mentioned in the text
- Show the ACTION or CONCEPT visually through the stickman's pose, positioning, and simple props
- Label each panel with a small panel number in the top corner
- MINIMAL TEXT: at most 1-3 words where a label is essential, NO sentence captions
- Each panel must be exactly the same width and height
- Clean separation between panels (subtle vertical lines if needed)
- Professional educational comic style";

const CLOSING_REMINDER: &str =
    "REMEMBER: SHOW the action visually, don't just write the sentence below a standing stickman!";

// ---------------------------------------------------------------------------
// PanelPromptBuilder
// ---------------------------------------------------------------------------

/// Builds the image-generation prompt for one paragraph.
///
/// # Example
/// ```rust
/// use stickman_studio::image::PanelPromptBuilder;
///
/// let lines = vec!["A stickman waves.".to_string(), "He walks away.".to_string()];
/// let prompt = PanelPromptBuilder::new().build(&lines);
/// assert!(prompt.contains("2 panels"));
/// assert!(prompt.contains("1. A stickman waves."));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PanelPromptBuilder {
    extra_style: Option<String>,
}

impl PanelPromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a free-form style hint after the built-in rules.
    pub fn with_style_hint(mut self, hint: impl Into<String>) -> Self {
        self.extra_style = Some(hint.into());
        self
    }

    /// Prompt asking for `lines.len()` horizontally arranged panels, one per line.
    pub fn build(&self, lines: &[String]) -> String {
        let n = lines.len();
        let numbered = lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}. {}", i + 1, line))
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt = String::with_capacity(1024 + numbered.len());
        prompt.push_str(&format!(
            "Create a single high-quality stickman comic strip with {n} panels arranged \
             horizontally in a single row.\n\n"
        ));
        prompt.push_str(
            "CRITICAL: Each panel MUST visually illustrate the action/concept - DO NOT just draw \
             a stickman with the sentence written below it.\n\n",
        );
        prompt.push_str(&format!(
            "Each panel should visualize the following {n} sentences in order:\n{numbered}\n\n"
        ));
        prompt.push_str(&STYLE_RULES.replace("{n}", &n.to_string()));
        if let Some(hint) = &self.extra_style {
            prompt.push_str("\n- ");
            prompt.push_str(hint);
        }
        prompt.push_str("\n\n");
        prompt.push_str(CLOSING_REMINDER);
        prompt
    }
}
