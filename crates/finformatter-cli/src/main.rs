use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use finformatter_core::config_file::{self, ConfigFile};
use finformatter_core::{
    AnalysisRequest, Config, InputMode, Orchestrator, ProgressEvent, ProviderConfig, ProviderKind,
    catalog, check_input_length,
};
use finformatter_reporting::{ExportFormat, ReportDocument};
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// FinFormatter - Reformat economics and finance manuscripts to journal style
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reformat a manuscript (or an excerpt) for a target journal
    Analyze {
        /// Text file to read; reads stdin when omitted or "-"
        file_path: Option<PathBuf>,

        /// Target journal id (see `finformatter journals`)
        #[arg(short, long)]
        journal: Option<String>,

        /// Input mode: full or snippet
        #[arg(short, long)]
        mode: Option<InputMode>,

        /// Output format: text, markdown, html or json
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Write the formatted document to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Per-provider timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// GLM API key (enables GLM for this run)
        #[arg(long)]
        glm_key: Option<String>,

        /// DeepSeek API key (enables DeepSeek for this run)
        #[arg(long)]
        deepseek_key: Option<String>,

        /// Gemini API key (enables Gemini for this run)
        #[arg(long)]
        gemini_key: Option<String>,

        /// Print plain text for pasting instead of the formatted document
        #[arg(long)]
        plain: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// List the supported journals
    Journals {
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Show or edit the provider configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the resolved configuration (keys are masked)
    Show {
        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Store an API key for a provider
    SetKey {
        /// glm, deepseek or gemini
        provider: ProviderKind,
        key: String,
    },
    /// Enable a provider in the fallback chain
    Enable { provider: ProviderKind },
    /// Disable a provider in the fallback chain
    Disable { provider: ProviderKind },
    /// Print the config file locations
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Analyze {
            file_path,
            journal,
            mode,
            format,
            output,
            timeout,
            glm_key,
            deepseek_key,
            gemini_key,
            plain,
            no_color,
        } => {
            let flag_keys = [
                (ProviderKind::Glm, glm_key),
                (ProviderKind::DeepSeek, deepseek_key),
                (ProviderKind::Gemini, gemini_key),
            ];
            analyze(AnalyzeArgs {
                file_path,
                journal,
                mode,
                format,
                output,
                timeout,
                flag_keys,
                plain,
                no_color,
            })
            .await
        }
        Command::Journals { no_color } => {
            let color = ColorMode(!no_color);
            output::print_journals(&mut std::io::stdout(), color)?;
            Ok(())
        }
        Command::Config { action } => config_command(action),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

struct AnalyzeArgs {
    file_path: Option<PathBuf>,
    journal: Option<String>,
    mode: Option<InputMode>,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
    timeout: Option<u64>,
    flag_keys: [(ProviderKind, Option<String>); 3],
    plain: bool,
    no_color: bool,
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    // Resolve configuration: CLI flags > env vars > config files > defaults
    let file = config_file::load_config();
    let file_mode = file.analysis.as_ref().and_then(|a| a.mode);
    let mut config = file.into_config();
    apply_env_keys(&mut config, |name| std::env::var(name).ok());
    for (kind, key) in &args.flag_keys {
        if let Some(key) = key {
            apply_key(&mut config, *kind, key, true);
        }
    }
    if let Some(secs) = args.timeout {
        if secs == 0 {
            anyhow::bail!("--timeout must be at least 1 second");
        }
        config.attempt_timeout_secs = secs;
    }
    tracing::debug!(?config, "resolved configuration");

    let journal = match args.journal.as_deref() {
        Some(id) => catalog::find(id).ok_or_else(|| {
            anyhow::anyhow!("Unknown journal '{id}'. Run `finformatter journals` to list them.")
        })?,
        None => catalog::resolve(&config.default_journal),
    };
    let mode = args.mode.or(file_mode).unwrap_or_default();

    let text = read_input(args.file_path.as_deref())?;
    check_input_length(&text).map_err(|e| anyhow::anyhow!("Cannot analyze: {e}"))?;

    let request = AnalysisRequest::new(text, mode, &config);
    if request.active_configs().is_empty() {
        anyhow::bail!(
            "No AI provider is enabled with an API key. Set one with \
             `finformatter config set-key <provider> <key>` or an environment variable \
             such as {}.",
            ProviderKind::Glm.api_key_env()
        );
    }

    let use_color = !args.no_color && args.output.is_none();
    let color = ColorMode(use_color);

    let spinner = output::spinner();
    let progress = {
        let spinner = spinner.clone();
        move |event: ProgressEvent| output::report_progress(&spinner, &event, color)
    };
    let progress_cb: &(dyn Fn(ProgressEvent) + Send + Sync) = &progress;

    let orchestrator = Orchestrator::new(&config);
    let outcome = orchestrator
        .analyze(&request, journal, Some(progress_cb))
        .await;
    spinner.finish_and_clear();

    let analysis = match outcome {
        Ok(analysis) => analysis,
        Err(err) => {
            output::print_failures(&mut std::io::stderr(), err.failures(), color)?;
            anyhow::bail!("{err}");
        }
    };

    let doc = ReportDocument {
        result: &analysis.result,
        journal,
        provider: Some(&analysis.provider),
    };
    let mut stdout = std::io::stdout();

    if let Some(path) = &args.output {
        let format = args
            .format
            .or_else(|| ExportFormat::from_path(path))
            .unwrap_or(ExportFormat::Text);
        finformatter_reporting::export_results(&doc, format, path)
            .map_err(|e| anyhow::anyhow!("Export failed: {e}"))?;
        output::print_summary(&mut stdout, &analysis, journal, color)?;
        writeln!(stdout, "Wrote {} to {}", format.label(), path.display())?;
        return Ok(());
    }

    if args.plain {
        writeln!(stdout, "{}", finformatter_reporting::copy_text(&analysis.result.segments))?;
        return Ok(());
    }

    let format = args.format.unwrap_or(ExportFormat::Text);
    let rendered = finformatter_reporting::render(&doc, format)
        .map_err(|e| anyhow::anyhow!("Cannot render result: {e}"))?;
    write!(stdout, "{rendered}")?;
    if format == ExportFormat::Text {
        writeln!(stdout)?;
        output::print_summary(&mut stdout, &analysis, journal, color)?;
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            if !p.exists() {
                anyhow::bail!("File not found: {}", p.display());
            }
            Ok(std::fs::read_to_string(p)?)
        }
        _ => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Fill keys from `GLM_API_KEY` and friends. An environment key never
/// changes whether a provider is enabled.
fn apply_env_keys(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    for kind in ProviderKind::ALL {
        if let Some(key) = lookup(kind.api_key_env()).filter(|k| !k.trim().is_empty()) {
            apply_key(config, kind, &key, false);
        }
    }
}

fn apply_key(config: &mut Config, kind: ProviderKind, key: &str, enable: bool) {
    match config.provider_mut(kind) {
        Some(entry) => {
            entry.api_key = key.trim().to_string();
            entry.enabled |= enable;
        }
        None => config
            .providers
            .push(ProviderConfig::new(kind, key.trim(), enable)),
    }
}

fn config_command(action: ConfigAction) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();

    match action {
        ConfigAction::Show { no_color } => {
            let mut config = config_file::load_config().into_config();
            apply_env_keys(&mut config, |name| std::env::var(name).ok());
            output::print_config(&mut stdout, &config, ColorMode(!no_color))?;
        }
        ConfigAction::Path => {
            match config_file::config_path() {
                Some(p) => writeln!(stdout, "{}", p.display())?,
                None => writeln!(stdout, "(no platform config directory)")?,
            }
            writeln!(stdout, "{} (overrides, if present)", config_file::LOCAL_CONFIG)?;
        }
        ConfigAction::SetKey { provider, key } => {
            if key.trim().is_empty() {
                anyhow::bail!("API key must not be empty");
            }
            let path = update_platform_config(|file| file.set_api_key(provider, &key))?;
            writeln!(
                stdout,
                "Saved {} key to {}",
                provider.display_name(),
                path.display()
            )?;
        }
        ConfigAction::Enable { provider } => {
            let path = update_platform_config(|file| file.set_enabled(provider, true))?;
            writeln!(
                stdout,
                "Enabled {} in {}",
                provider.display_name(),
                path.display()
            )?;
        }
        ConfigAction::Disable { provider } => {
            let path = update_platform_config(|file| file.set_enabled(provider, false))?;
            writeln!(
                stdout,
                "Disabled {} in {}",
                provider.display_name(),
                path.display()
            )?;
        }
    }
    Ok(())
}

/// Load the platform config file alone, edit it, and write it back.
fn update_platform_config(edit: impl FnOnce(&mut ConfigFile)) -> anyhow::Result<PathBuf> {
    let mut file = config_file::config_path()
        .and_then(|p| config_file::load_from_path(&p))
        .unwrap_or_default();
    edit(&mut file);
    Ok(config_file::save_config(&file)?)
}
