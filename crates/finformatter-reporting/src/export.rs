use std::io::Write;
use std::path::Path;

use finformatter_core::{Segment, SegmentKind};
use serde::Serialize;
use serde_json::Value;

use crate::types::{ExportFormat, ReportDocument};

/// Export one analysis to the given path.
///
/// Refuses to write anything when the result has no segments.
pub fn export_results(
    doc: &ReportDocument<'_>,
    format: ExportFormat,
    path: &Path,
) -> Result<(), String> {
    let content = render(doc, format)?;

    let mut file =
        std::fs::File::create(path).map_err(|e| format!("Failed to create file: {}", e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| format!("Failed to write: {}", e))?;
    Ok(())
}

/// Render one analysis in `format`.
pub fn render(doc: &ReportDocument<'_>, format: ExportFormat) -> Result<String, String> {
    if doc.result.segments.is_empty() {
        return Err("No segments to export".to_string());
    }
    Ok(match format {
        ExportFormat::Text => export_text(doc),
        ExportFormat::Markdown => export_markdown(doc),
        ExportFormat::Html => export_html(doc),
        ExportFormat::Json => export_json(doc)?,
    })
}

/// Plain-text rendition for pasting elsewhere.
///
/// Tables become their caption followed by tab-separated rows; structured
/// content is written as compact JSON. Segments are separated by a blank line.
pub fn copy_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|seg| {
            if seg.kind == SegmentKind::Table
                && let Some(rows) = &seg.data
            {
                let mut out = format!("{}\n", seg.caption.as_deref().unwrap_or(""));
                out.push_str(
                    &rows
                        .iter()
                        .map(|r| r.join("\t"))
                        .collect::<Vec<_>>()
                        .join("\n"),
                );
                return out;
            }
            match &seg.content {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ── inline markup ────────────────────────────────────────────────────

/// Remove `<i>` / `</i>` markers, leaving the variable names.
fn strip_italic(s: &str) -> String {
    s.replace("<i>", "").replace("</i>", "")
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Escape for HTML, optionally letting `<i>` through.
fn html_inline(s: &str, keep_italic: bool) -> String {
    if keep_italic {
        html_escape(s)
            .replace("&lt;i&gt;", "<i>")
            .replace("&lt;/i&gt;", "</i>")
    } else {
        html_escape(&strip_italic(s))
    }
}

fn md_escape(s: &str) -> String {
    s.replace('|', "\\|")
}

fn md_inline(s: &str) -> String {
    s.replace("<i>", "*").replace("</i>", "*")
}

fn heading_label(kind: SegmentKind) -> Option<&'static str> {
    match kind {
        SegmentKind::Author => Some("Authors"),
        SegmentKind::Abstract => Some("Abstract"),
        SegmentKind::Keywords => Some("Keywords"),
        SegmentKind::Jel => Some("JEL Classification"),
        _ => None,
    }
}

// ── text ─────────────────────────────────────────────────────────────

fn export_text(doc: &ReportDocument<'_>) -> String {
    let rules = &doc.journal.rules;
    let mut out = String::new();
    let mut footnotes = 0usize;

    for seg in &doc.result.segments {
        let text = strip_italic(&seg.text());
        match seg.kind {
            SegmentKind::Title => {
                out.push_str(&text);
                out.push('\n');
                out.push_str(&"=".repeat(text.chars().count().max(1)));
                out.push_str("\n\n");
            }
            SegmentKind::HeadingL1 => {
                out.push_str(&format!("\n{}\n\n", text));
            }
            SegmentKind::HeadingL2 => {
                out.push_str(&format!("{}\n\n", text));
            }
            SegmentKind::Table => write_text_table(&mut out, seg, rules.use_three_line_table),
            SegmentKind::Figure => {
                let caption = seg.caption.as_deref().map(strip_italic).unwrap_or(text);
                out.push_str(&format!("[Figure] {}\n", caption));
                if let Some(src) = &seg.source {
                    out.push_str(&format!("Source: {}\n", src));
                }
                out.push('\n');
            }
            SegmentKind::Footnote => {
                footnotes += 1;
                out.push_str(&format!("[{}] {}\n\n", footnotes, text));
            }
            SegmentKind::References => {
                out.push_str("References\n\n");
                for item in seg.items() {
                    out.push_str(&strip_italic(&item));
                    out.push('\n');
                }
                out.push('\n');
            }
            kind => match heading_label(kind) {
                Some(label) if !text.is_empty() => {
                    out.push_str(&format!("{}: {}\n\n", label, text));
                }
                _ if !text.is_empty() => {
                    out.push_str(&text);
                    out.push_str("\n\n");
                }
                _ => {}
            },
        }
    }

    if !doc.result.audit_alerts.is_empty() {
        out.push_str(&"-".repeat(40));
        out.push_str("\nAudit alerts\n");
        for alert in &doc.result.audit_alerts {
            out.push_str(&format!("  ! {}\n", alert));
        }
    }

    out.trim_end().to_string() + "\n"
}

fn write_text_table(out: &mut String, seg: &Segment, three_line: bool) {
    if let Some(caption) = &seg.caption {
        out.push_str(&strip_italic(caption));
        out.push('\n');
    }
    match &seg.data {
        Some(rows) if !rows.is_empty() => {
            let widths = column_widths(rows);
            let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
            let rule = "─".repeat(total.max(1));
            if three_line {
                out.push_str(&rule);
                out.push('\n');
            }
            for (ri, row) in rows.iter().enumerate() {
                let cells: Vec<String> = widths
                    .iter()
                    .enumerate()
                    .map(|(ci, w)| {
                        let cell = row.get(ci).map(String::as_str).unwrap_or("");
                        let pad = w.saturating_sub(cell.chars().count());
                        format!("{}{}", cell, " ".repeat(pad))
                    })
                    .collect();
                out.push_str(cells.join("  ").trim_end());
                out.push('\n');
                if three_line && ri == 0 {
                    out.push_str(&rule);
                    out.push('\n');
                }
            }
            if three_line {
                out.push_str(&rule);
                out.push('\n');
            }
        }
        _ => {
            let text = seg.text();
            if !text.is_empty() {
                out.push_str(&strip_italic(&text));
                out.push('\n');
            }
        }
    }
    if let Some(src) = &seg.source {
        out.push_str(&format!("Source: {}\n", src));
    }
    out.push('\n');
}

fn column_widths(rows: &[Vec<String>]) -> Vec<usize> {
    let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    (0..cols)
        .map(|ci| {
            rows.iter()
                .filter_map(|r| r.get(ci))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect()
}

// ── markdown ─────────────────────────────────────────────────────────

fn export_markdown(doc: &ReportDocument<'_>) -> String {
    let mut out = String::new();
    let mut footnotes: Vec<String> = Vec::new();

    for seg in &doc.result.segments {
        let text = md_inline(&seg.text());
        match seg.kind {
            SegmentKind::Title => out.push_str(&format!("# {}\n\n", text)),
            SegmentKind::HeadingL1 => out.push_str(&format!("## {}\n\n", text)),
            SegmentKind::HeadingL2 => out.push_str(&format!("### {}\n\n", text)),
            SegmentKind::Table => write_md_table(&mut out, seg),
            SegmentKind::Figure => {
                let caption = seg.caption.as_deref().map(md_inline).unwrap_or(text);
                out.push_str(&format!("**Figure.** {}\n\n", caption));
                if let Some(src) = &seg.source {
                    out.push_str(&format!("*Source: {}*\n\n", src));
                }
            }
            SegmentKind::Footnote => {
                footnotes.push(text);
                out.push_str(&format!("[^{}]\n\n", footnotes.len()));
            }
            SegmentKind::References => {
                out.push_str("## References\n\n");
                for item in seg.items() {
                    out.push_str(&format!("- {}\n", md_inline(&item)));
                }
                out.push('\n');
            }
            kind => match heading_label(kind) {
                Some(label) if !text.is_empty() => {
                    out.push_str(&format!("**{}:** {}\n\n", label, text));
                }
                _ if !text.is_empty() => out.push_str(&format!("{}\n\n", text)),
                _ => {}
            },
        }
    }

    for (i, note) in footnotes.iter().enumerate() {
        out.push_str(&format!("[^{}]: {}\n", i + 1, note));
    }
    if !footnotes.is_empty() {
        out.push('\n');
    }

    if !doc.result.audit_alerts.is_empty() {
        out.push_str("---\n\n### Audit Alerts\n\n");
        for alert in &doc.result.audit_alerts {
            out.push_str(&format!("- {}\n", alert));
        }
        out.push('\n');
    }

    out
}

fn write_md_table(out: &mut String, seg: &Segment) {
    if let Some(caption) = &seg.caption {
        out.push_str(&format!("**{}**\n\n", md_inline(caption)));
    }
    match &seg.data {
        Some(rows) if !rows.is_empty() => {
            let cols = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
            for (ri, row) in rows.iter().enumerate() {
                let cells: Vec<String> = (0..cols)
                    .map(|ci| md_escape(&md_inline(row.get(ci).map(String::as_str).unwrap_or(""))))
                    .collect();
                out.push_str(&format!("| {} |\n", cells.join(" | ")));
                if ri == 0 {
                    out.push_str(&format!("|{}\n", " --- |".repeat(cols)));
                }
            }
            out.push('\n');
        }
        _ => {
            let text = seg.text();
            if !text.is_empty() {
                out.push_str(&format!("{}\n\n", md_inline(&text)));
            }
        }
    }
    if let Some(src) = &seg.source {
        out.push_str(&format!("*Source: {}*\n\n", src));
    }
}

// ── html ─────────────────────────────────────────────────────────────

fn export_html(doc: &ReportDocument<'_>) -> String {
    let rules = &doc.journal.rules;
    let italic = rules.variable_italic;
    let mut out = String::with_capacity(8192);

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
    let title = doc
        .result
        .first_of(SegmentKind::Title)
        .map(|s| strip_italic(&s.text()))
        .unwrap_or_else(|| doc.journal.name.to_string());
    out.push_str(&format!("<title>{}</title>\n<style>\n", html_escape(&title)));
    out.push_str(&format!(
        "body {{ font-family: \"{}\", serif; max-width: 48rem; margin: 2rem auto; line-height: 1.8; }}\n",
        html_escape(rules.font)
    ));
    out.push_str(
        r#"h1 { text-align: center; font-size: 1.6rem; }
p.body { text-indent: 2em; }
.caption { text-align: center; font-weight: bold; margin: 1rem 0 0.5rem; }
.source { font-size: 0.85rem; }
table { width: 100%; border-collapse: collapse; }
td, th { text-align: center; padding: 0.2rem 0.5rem; }
.footnote { font-size: 0.85rem; }
.alerts { border-top: 1px solid #999; margin-top: 2rem; color: #a00; }
"#,
    );
    if rules.use_three_line_table {
        out.push_str(
            r#"table.three-line { border-top: 1.5pt solid #000; border-bottom: 1.5pt solid #000; }
table.three-line thead th { border-bottom: 0.75pt solid #000; }
"#,
        );
    } else {
        out.push_str("td, th { border: 1px solid #000; }\n");
    }
    out.push_str("</style>\n</head>\n<body>\n");

    let mut footnotes = 0usize;
    for seg in &doc.result.segments {
        let text = html_inline(&seg.text(), italic);
        match seg.kind {
            SegmentKind::Title => out.push_str(&format!("<h1>{}</h1>\n", text)),
            SegmentKind::HeadingL1 => out.push_str(&format!("<h2>{}</h2>\n", text)),
            SegmentKind::HeadingL2 => out.push_str(&format!("<h3>{}</h3>\n", text)),
            SegmentKind::Body => out.push_str(&format!("<p class=\"body\">{}</p>\n", text)),
            SegmentKind::Table => {
                write_html_table(&mut out, seg, italic, rules.use_three_line_table)
            }
            SegmentKind::Figure => {
                let caption = seg
                    .caption
                    .as_deref()
                    .map(|c| html_inline(c, italic))
                    .unwrap_or(text);
                out.push_str(&format!("<p class=\"caption\">{}</p>\n", caption));
                if let Some(src) = &seg.source {
                    out.push_str(&format!(
                        "<p class=\"source\">Source: {}</p>\n",
                        html_escape(src)
                    ));
                }
            }
            SegmentKind::Footnote => {
                footnotes += 1;
                out.push_str(&format!(
                    "<p class=\"footnote\"><sup>{}</sup> {}</p>\n",
                    footnotes, text
                ));
            }
            SegmentKind::References => {
                out.push_str("<h2>References</h2>\n<ol>\n");
                for item in seg.items() {
                    out.push_str(&format!("<li>{}</li>\n", html_inline(&item, italic)));
                }
                out.push_str("</ol>\n");
            }
            kind => match heading_label(kind) {
                Some(label) if !text.is_empty() => out.push_str(&format!(
                    "<p><strong>{}:</strong> {}</p>\n",
                    label, text
                )),
                _ if !text.is_empty() => out.push_str(&format!("<p>{}</p>\n", text)),
                _ => {}
            },
        }
    }

    if !doc.result.audit_alerts.is_empty() {
        out.push_str("<div class=\"alerts\">\n<h3>Audit Alerts</h3>\n<ul>\n");
        for alert in &doc.result.audit_alerts {
            out.push_str(&format!("<li>{}</li>\n", html_escape(alert)));
        }
        out.push_str("</ul>\n</div>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn write_html_table(out: &mut String, seg: &Segment, italic: bool, three_line: bool) {
    if let Some(caption) = &seg.caption {
        out.push_str(&format!(
            "<p class=\"caption\">{}</p>\n",
            html_inline(caption, italic)
        ));
    }
    match &seg.data {
        Some(rows) if !rows.is_empty() => {
            let class = if three_line { " class=\"three-line\"" } else { "" };
            out.push_str(&format!("<table{}>\n<thead>\n<tr>", class));
            for cell in &rows[0] {
                out.push_str(&format!("<th>{}</th>", html_inline(cell, italic)));
            }
            out.push_str("</tr>\n</thead>\n<tbody>\n");
            for row in &rows[1..] {
                out.push_str("<tr>");
                for cell in row {
                    out.push_str(&format!("<td>{}</td>", html_inline(cell, italic)));
                }
                out.push_str("</tr>\n");
            }
            out.push_str("</tbody>\n</table>\n");
        }
        _ => {
            let text = seg.text();
            if !text.is_empty() {
                out.push_str(&format!("<p>{}</p>\n", html_inline(&text, italic)));
            }
        }
    }
    if let Some(src) = &seg.source {
        out.push_str(&format!(
            "<p class=\"source\">Source: {}</p>\n",
            html_escape(src)
        ));
    }
}

// ── json ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct JsonExport<'a> {
    journal: &'a str,
    journal_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<&'a str>,
    #[serde(flatten)]
    result: &'a finformatter_core::AnalysisResult,
}

fn export_json(doc: &ReportDocument<'_>) -> Result<String, String> {
    let export = JsonExport {
        journal: doc.journal.id,
        journal_name: doc.journal.name,
        provider: doc.provider,
        result: doc.result,
    };
    serde_json::to_string_pretty(&export).map_err(|e| format!("Failed to serialize: {}", e))
}
