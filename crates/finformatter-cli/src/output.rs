use std::io::Write;
use std::time::Duration;

use finformatter_core::{
    Analysis, AttemptFailure, Config, Journal, ProgressEvent, ProviderKind, catalog,
};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Spinner shown on stderr while a provider call is in flight.
pub fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Reflect a fallback-chain event on the spinner.
pub fn report_progress(bar: &ProgressBar, event: &ProgressEvent, color: ColorMode) {
    match event {
        ProgressEvent::Attempting {
            index,
            total,
            provider,
            model,
        } => {
            bar.reset_elapsed();
            bar.set_message(format!(
                "[{}/{}] Asking {} ({})...",
                index + 1,
                total,
                provider,
                model
            ));
        }
        ProgressEvent::AttemptFailed {
            provider, error, ..
        } => {
            let line = format!("{} failed: {}; trying the next provider", provider, error);
            if color.enabled() {
                bar.println(format!("{} {}", "WARNING:".yellow(), line));
            } else {
                bar.println(format!("WARNING: {}", line));
            }
        }
        ProgressEvent::Succeeded { provider, elapsed } => {
            bar.set_message(format!(
                "{} answered in {:.1}s",
                provider,
                elapsed.as_secs_f64()
            ));
        }
    }
}

/// Per-provider diagnostics after every attempt failed.
pub fn print_failures(
    w: &mut dyn Write,
    failures: &[AttemptFailure],
    color: ColorMode,
) -> std::io::Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    writeln!(w, "Provider attempts:")?;
    for (i, f) in failures.iter().enumerate() {
        let label = format!("  {}. {} ({})", i + 1, f.provider, f.model);
        if color.enabled() {
            writeln!(
                w,
                "{} {} {}",
                label,
                f.error.to_string().red(),
                format!("[{:.1}s]", f.elapsed.as_secs_f64()).dimmed()
            )?;
        } else {
            writeln!(
                w,
                "{} {} [{:.1}s]",
                label,
                f.error,
                f.elapsed.as_secs_f64()
            )?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Compliance report, alerts and title suggestions for a finished analysis.
pub fn print_summary(
    w: &mut dyn Write,
    analysis: &Analysis,
    journal: &Journal,
    color: ColorMode,
) -> std::io::Result<()> {
    let result = &analysis.result;

    writeln!(w, "{}", "=".repeat(60))?;
    let header = format!(
        "Formatted for {} by {} ({})",
        journal.name, analysis.provider, analysis.model
    );
    if color.enabled() {
        writeln!(w, "{}", header.bold())?;
    } else {
        writeln!(w, "{}", header)?;
    }
    if !analysis.failures.is_empty() {
        let skipped: Vec<String> = analysis
            .failures
            .iter()
            .map(|f| format!("{} ({})", f.provider, f.error))
            .collect();
        let line = format!("Fell back past: {}", skipped.join(", "));
        if color.enabled() {
            writeln!(w, "{}", line.dimmed())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }
    writeln!(w, "{} segments", result.segments.len())?;

    if let Some(report) = &result.status_report {
        if let Some(n) = report.title_count {
            writeln!(w, "  Title length:    {} (limit {})", n, journal.rules.title_limit)?;
        }
        if let Some(n) = report.abstract_count {
            writeln!(
                w,
                "  Abstract length: {} (limit {})",
                n, journal.rules.abstract_limit
            )?;
        }
        match report.is_compliant {
            Some(true) if color.enabled() => writeln!(w, "  {}", "COMPLIANT".green())?,
            Some(true) => writeln!(w, "  COMPLIANT")?,
            Some(false) if color.enabled() => writeln!(w, "  {}", "NOT COMPLIANT".red())?,
            Some(false) => writeln!(w, "  NOT COMPLIANT")?,
            None => {}
        }
        if let Some(summary) = &report.compliance_summary {
            writeln!(w, "  {}", summary)?;
        }
        if !report.major_changes.is_empty() {
            writeln!(w, "  Major changes:")?;
            for change in &report.major_changes {
                writeln!(w, "    - {}", change)?;
            }
        }
    }

    if !result.audit_alerts.is_empty() {
        writeln!(w)?;
        if color.enabled() {
            writeln!(w, "{}", "AUDIT ALERTS:".red().bold())?;
        } else {
            writeln!(w, "AUDIT ALERTS:")?;
        }
        for alert in &result.audit_alerts {
            writeln!(w, "  ! {}", alert)?;
        }
    }

    if !result.title_suggestions.is_empty() {
        writeln!(w)?;
        writeln!(w, "Title suggestions:")?;
        for (i, t) in result.title_suggestions.iter().enumerate() {
            writeln!(w, "  {}. {}", i + 1, t)?;
        }
    }
    Ok(())
}

/// Catalog listing for `finformatter journals`.
pub fn print_journals(w: &mut dyn Write, color: ColorMode) -> std::io::Result<()> {
    let default_id = catalog::default_journal().id;
    for j in catalog::journals() {
        let marker = if j.id == default_id { " (default)" } else { "" };
        if color.enabled() {
            writeln!(w, "{:<6} {}{}", j.id.bold().cyan(), j.name, marker.dimmed())?;
        } else {
            writeln!(w, "{:<6} {}{}", j.id, j.name, marker)?;
        }
        writeln!(
            w,
            "       title <= {}, abstract <= {}, headings {}, font {}",
            j.rules.title_limit,
            j.rules.abstract_limit,
            j.rules.heading_sequence.join(" / "),
            j.rules.font
        )?;
    }
    Ok(())
}

/// Resolved configuration with masked keys.
pub fn print_config(w: &mut dyn Write, config: &Config, color: ColorMode) -> std::io::Result<()> {
    writeln!(w, "Fallback chain (tried in order):")?;
    for (i, p) in config.providers.iter().enumerate() {
        let key = if p.api_key.trim().is_empty() {
            "no key"
        } else {
            "key set"
        };
        let state = if p.enabled { "enabled" } else { "disabled" };
        let line = format!(
            "  {}. {:<9} {:<18} {:<8} {}",
            i + 1,
            p.provider,
            p.model,
            state,
            key
        );
        if !color.enabled() {
            writeln!(w, "{}", line)?;
        } else if p.is_active() {
            writeln!(w, "{}", line.green())?;
        } else {
            writeln!(w, "{}", line.dimmed())?;
        }
        match p.provider.parse::<ProviderKind>() {
            Ok(kind) => writeln!(
                w,
                "     get a key: {}  (env: {})",
                kind.key_guide(),
                kind.api_key_env()
            )?,
            Err(e) => writeln!(w, "     {}", e)?,
        }
    }
    writeln!(w)?;
    writeln!(w, "Endpoints:")?;
    writeln!(w, "  glm:      {}", config.endpoints.glm)?;
    writeln!(w, "  deepseek: {}", config.endpoints.deepseek)?;
    writeln!(w, "  gemini:   {}", config.endpoints.gemini)?;
    writeln!(w)?;
    writeln!(w, "Attempt timeout: {}s", config.attempt_timeout_secs)?;
    writeln!(w, "Default journal: {}", config.default_journal)?;
    Ok(())
}
