//! Local length checks against the journal's limits.
//!
//! The model is asked to report violations itself but does not always do so.
//! These checks only add alerts; they never drop the model's own.

use crate::catalog::JournalRules;
use crate::types::{AnalysisResult, SegmentKind};

/// How a length was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Chars,
    Words,
}

impl LengthUnit {
    fn label(&self) -> &'static str {
        match self {
            LengthUnit::Chars => "characters",
            LengthUnit::Words => "words",
        }
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{AC00}'..='\u{D7AF}')
}

/// Length of `text` in the unit a journal would use: characters for CJK
/// text, whitespace-separated words otherwise.
pub fn measure(text: &str) -> (usize, LengthUnit) {
    let without_tags = strip_tags(text);
    if without_tags.chars().any(is_cjk) {
        let n = without_tags
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
            .count();
        (n, LengthUnit::Chars)
    } else {
        (without_tags.split_whitespace().count(), LengthUnit::Words)
    }
}

/// Drop inline markup such as `<i>` so it does not count toward limits.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Alerts for title and abstract segments that exceed `rules`.
pub fn length_alerts(result: &AnalysisResult, rules: &JournalRules) -> Vec<String> {
    let checks = [
        (SegmentKind::Title, "Title", rules.title_limit),
        (SegmentKind::Abstract, "Abstract", rules.abstract_limit),
    ];

    checks
        .into_iter()
        .filter_map(|(kind, label, limit)| {
            let text = result.first_of(kind)?.text();
            let (len, unit) = measure(&text);
            (len > limit as usize).then(|| {
                format!(
                    "{label} is {len} {unit}, over the limit of {limit}.",
                    unit = unit.label()
                )
            })
        })
        .collect()
}

/// Append local alerts to `result`, skipping exact duplicates.
/// Returns how many were added.
pub fn apply(result: &mut AnalysisResult, rules: &JournalRules) -> usize {
    let mut added = 0;
    for alert in length_alerts(result, rules) {
        if !result.audit_alerts.contains(&alert) {
            result.audit_alerts.push(alert);
            added += 1;
        }
    }
    added
}
