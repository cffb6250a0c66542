//! Prompt composition: fixed instruction preamble plus journal rules and input.

use crate::catalog::Journal;
use crate::request::{AnalysisRequest, InputMode};

/// System instruction sent with every request.
pub const SYSTEM_INSTRUCTION: &str = r#"You are a senior typesetting editor for finance and economics journals. Restructure the user's paper text into strict, structured JSON.

### Procedure
1. Semantic classification:
   - Classify every paragraph as one of: title, author, abstract, keywords, jel, heading_l1, heading_l2, body, table, figure, footnote, references.
   - Funding statements and acknowledgements are separated out as type "footnote" and marked as the starred title-page note.

2. Three-line tables:
   - Parse every textual table into a 2-D array in "data".
   - Identify the table caption and the data source; put them in "caption" and "source".
   - Never put the caption inside "data".

3. Mathematics:
   - Wrap variables in body text with <i> tags (for example <i>R2</i>, <i>β</i>).
   - Equation paragraphs are classified as body.

4. Audit alerts ("auditAlerts"):
   - Always report a title or abstract that exceeds the journal limit.
   - Always report missing JEL codes.
   - Always report conflicting citation styles (author-year vs numeric).

5. Placeholders:
   - Keep every [[IMAGE_X]] placeholder in place, each as its own paragraph.

### Output constraints
1. Return JSON only: no Markdown code fences, no explanations, no preamble.
2. Follow the AnalysisResult shape exactly: {"metadata": {...}, "statusReport": {...}, "segments": [...], "auditAlerts": [...], "titleSuggestions": [...]}. If there is no content, still return {"segments": [], "auditAlerts": []}.
3. Variables in body text must be wrapped in <i>.
4. Close every JSON structure; never stop midway.
5. Do not wrap the JSON in ``` fences."#;

/// The composed request text, built once per analysis and reused for every
/// provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn compose(journal: &Journal, request: &AnalysisRequest) -> Self {
        Self::from_parts(journal, request.mode, &request.text)
    }

    pub fn from_parts(journal: &Journal, mode: InputMode, text: &str) -> Self {
        let mut user = format!(
            "Target Journal: {}\nRules: {}\n",
            journal.name,
            journal.rules_json()
        );
        if mode == InputMode::Snippet {
            user.push_str(
                "Mode: snippet (an excerpt, not a full manuscript; do not flag missing sections)\n",
            );
        }
        user.push_str("Content: ");
        user.push_str(text);
        Self {
            system: SYSTEM_INSTRUCTION.to_string(),
            user,
        }
    }

    /// System instruction and task merged into one block, for providers
    /// without a separate system role.
    pub fn combined(&self) -> String {
        format!("{}\n\nTask:\n{}", self.system, self.user)
    }
}
