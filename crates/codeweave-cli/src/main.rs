//! codeweave - turn LLM output into previews and runnable scripts
//!
//! ## Commands
//!
//! - `inspect`: Show the fragments found in a message and what the pipeline makes of it
//! - `repair`: Restore dropped braces in a CSS or JavaScript snippet
//! - `preview`: Assemble a message into one self-contained HTML document
//! - `run`: Gate a message's script and hand it to a runner

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};

use codeweave_core::{
    classify_all, detect_execution_target, gather_fragments, process_with, repair_if_needed,
    render_fenced, ClassifiedFragment, ExecutionTarget, Language, Message, PayloadSource,
    PipelineConfig, PreviewHandle, Rendition, SourceFile,
};
use codeweave_exec::{run_rendition_with, runner_from_config, ExecConfig, RunOutcome};

#[derive(Parser)]
#[command(name = "codeweave")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reassemble mixed-language LLM output into previews and scripts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the message comes from.
#[derive(clap::Args, Debug)]
struct InputArgs {
    /// Message file; `-` or omitted reads stdin
    input: Option<PathBuf>,

    /// Attach a source file; used when the message itself carries little code
    #[arg(short, long = "attach", value_name = "FILE")]
    attach: Vec<PathBuf>,

    /// Below this many characters of fenced code, attachments are used instead
    #[arg(long, default_value_t = 40)]
    min_payload_chars: usize,

    /// Python snippets shorter than this skip the keyword check
    #[arg(long, default_value_t = 100)]
    short_python_chars: usize,
}

impl InputArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            min_payload_chars: self.min_payload_chars,
            short_python_chars: self.short_python_chars,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show fragments, their classification, and the resulting rendition
    Inspect {
        #[command(flatten)]
        input: InputArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Repair a CSS or JavaScript snippet and print it
    Repair {
        /// Snippet file; `-` or omitted reads stdin
        input: Option<PathBuf>,

        /// Language of the snippet
        #[arg(short, long, value_enum)]
        lang: LangArg,
    },

    /// Assemble a message into a single HTML document
    Preview {
        #[command(flatten)]
        input: InputArgs,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Publish to a temporary file, print its sandboxed iframe, and keep it
        /// until Ctrl-C
        #[arg(long, conflicts_with = "output")]
        hold: bool,
    },

    /// Gate the message's script and run it
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Timeout for one run in milliseconds
        #[arg(long, env = "CODEWEAVE_TIMEOUT_MS")]
        timeout_ms: Option<u64>,

        /// Shell used by the local runner
        #[arg(long, env = "CODEWEAVE_SHELL")]
        shell: Option<String>,

        /// Remote runner URL; runs locally when unset
        #[arg(long, env = "CODEWEAVE_RUNNER_URL")]
        runner_url: Option<String>,

        /// Print the run outcome as JSON
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LangArg {
    Css,
    #[value(alias = "js")]
    Javascript,
}

impl From<LangArg> for Language {
    fn from(lang: LangArg) -> Self {
        match lang {
            LangArg::Css => Language::Css,
            LangArg::Javascript => Language::Javascript,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    codeweave_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Inspect { input, format } => cmd_inspect(&input, format),
        Commands::Repair { input, lang } => cmd_repair(input.as_deref(), lang.into()),
        Commands::Preview {
            input,
            output,
            hold,
        } => cmd_preview(&input, output.as_deref(), hold).await,
        Commands::Run {
            input,
            timeout_ms,
            shell,
            runner_url,
            format,
        } => cmd_run(&input, timeout_ms, shell, runner_url, format).await,
    }
}

/// Read a path, or stdin for `-` / `None`.
fn read_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => {
            std::fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display()))
        }
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn load_message(args: &InputArgs) -> Result<Message> {
    let text = read_source(args.input.as_deref())?;
    let files = args
        .attach
        .iter()
        .map(|path| {
            let code = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read attachment {}", path.display()))?;
            Ok(SourceFile::new(path.display().to_string(), code))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Message::new(text).with_files(files))
}

#[derive(Serialize)]
struct InspectReport {
    target: ExecutionTarget,
    fragments: Vec<ClassifiedFragment>,
    rendition: Rendition,
}

/// Show what the pipeline sees in a message
fn cmd_inspect(args: &InputArgs, format: Format) -> Result<()> {
    let message = load_message(args)?;
    let config = args.pipeline_config();

    let (raw, source) = gather_fragments(&message, config.min_payload_chars);
    let target_text = match source {
        PayloadSource::Text => message.text.clone(),
        PayloadSource::Files => render_fenced(&raw),
    };
    let report = InspectReport {
        target: detect_execution_target(&target_text),
        fragments: classify_all(raw),
        rendition: process_with(&message, &config),
    };

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Target: {}", report.target);
    println!("Fragments: {}", report.fragments.len());
    for fragment in &report.fragments {
        println!(
            "  #{:<3} {:<8} tag={:<12} {} chars",
            fragment.raw.source_order,
            fragment.kind.as_str(),
            fragment.raw.declared_tag.as_deref().unwrap_or("-"),
            fragment.raw.content.chars().count()
        );
    }
    println!("Rendition: {}", report.rendition.kind());
    match &report.rendition {
        Rendition::Preview(doc) => {
            let s = &doc.stats;
            println!(
                "  html={} css={} js={} dropped={} stripped={} css_repaired={} js_repaired={} bytes={}",
                s.html_fragments,
                s.css_fragments,
                s.js_fragments,
                s.dropped_fragments,
                s.stripped_resources,
                s.css_repaired,
                s.js_repaired,
                s.bytes
            );
        }
        Rendition::Script(cmd) => {
            println!("  Interpreter: {}", cmd.interpreter);
            println!();
            println!("{}", cmd.command);
        }
        other => {
            if let Some(msg) = other.user_message() {
                println!("  {msg}");
            }
        }
    }

    Ok(())
}

/// Repair a single snippet
fn cmd_repair(input: Option<&Path>, lang: Language) -> Result<()> {
    let text = read_source(input)?;
    let (repaired, decision) = repair_if_needed(&text, lang);
    info!(
        lang = %lang,
        needs_repair = decision.needs_repair(),
        changed = repaired != text,
        "repair finished"
    );
    print!("{repaired}");
    Ok(())
}

/// Assemble a preview document
async fn cmd_preview(args: &InputArgs, output: Option<&Path>, hold: bool) -> Result<()> {
    let message = load_message(args)?;
    let doc = match process_with(&message, &args.pipeline_config()) {
        Rendition::Preview(doc) => doc,
        other => bail!(
            "Message does not render as HTML (got {}){}",
            other.kind(),
            other
                .user_message()
                .map(|m| format!(": {m}"))
                .unwrap_or_default()
        ),
    };

    if hold {
        let handle = PreviewHandle::create(&doc).context("Failed to publish preview")?;
        println!("Preview: {}", handle.url());
        println!("{}", handle.iframe());
        eprintln!("Holding preview {}; press Ctrl-C to release it.", handle.id());
        tokio::signal::ctrl_c()
            .await
            .context("Failed to wait for Ctrl-C")?;
        handle.release().context("Failed to release preview")?;
        return Ok(());
    }

    match output {
        Some(path) => {
            std::fs::write(path, doc.as_str())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Wrote {} bytes to {}", doc.stats.bytes, path.display());
        }
        None => println!("{doc}"),
    }
    Ok(())
}

fn exec_config(
    timeout_ms: Option<u64>,
    shell: Option<String>,
    runner_url: Option<String>,
) -> Result<ExecConfig> {
    let mut config = ExecConfig::default();
    if let Some(ms) = timeout_ms {
        config.timeout_ms = ms;
    }
    if let Some(shell) = shell {
        config.shell = shell;
    }
    config.remote_url = runner_url.filter(|u| !u.trim().is_empty());
    config.validate().context("Invalid execution settings")?;
    Ok(config)
}

/// Gate and run the message's script
async fn cmd_run(
    args: &InputArgs,
    timeout_ms: Option<u64>,
    shell: Option<String>,
    runner_url: Option<String>,
    format: Format,
) -> Result<()> {
    let message = load_message(args)?;
    let config = exec_config(timeout_ms, shell, runner_url)?;
    let runner = runner_from_config(&config).context("Failed to set up runner")?;

    let pipeline = args.pipeline_config();
    let rendition = process_with(&message, &pipeline);
    let outcome = run_rendition_with(&rendition, runner.as_ref(), &pipeline)
        .await
        .context("Run failed")?;

    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        RunOutcome::Ran(report) => {
            print!("{}", report.stdout);
            eprint!("{}", report.stderr);
            match report.exit_code {
                Some(0) => Ok(()),
                Some(code) => std::process::exit(code),
                None => bail!("Script was terminated without an exit code"),
            }
        }
        RunOutcome::Preview => {
            println!("This message is an HTML page; use `codeweave preview` instead.");
            Ok(())
        }
        RunOutcome::Declined { message } => {
            println!("{message}");
            Ok(())
        }
        RunOutcome::NoCode => {
            println!("No code found in message.");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_attachments() {
        let cli = Cli::try_parse_from([
            "codeweave", "run", "msg.md", "-a", "main.py", "--attach", "util.py", "--timeout-ms",
            "500",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                input, timeout_ms, ..
            } => {
                assert_eq!(input.input, Some(PathBuf::from("msg.md")));
                assert_eq!(input.attach.len(), 2);
                assert_eq!(timeout_ms, Some(500));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_repair_lang_alias() {
        let cli = Cli::try_parse_from(["codeweave", "--verbose", "repair", "--lang", "js"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Repair { input, lang } => {
                assert!(input.is_none());
                assert_eq!(Language::from(lang), Language::Javascript);
            }
            _ => panic!("expected repair"),
        }
    }

    #[test]
    fn test_preview_hold_conflicts_with_output() {
        assert!(Cli::try_parse_from(["codeweave", "preview", "--hold", "-o", "x.html"]).is_err());
    }

    #[test]
    fn test_exec_config_overrides() {
        let config = exec_config(Some(250), Some("sh".into()), Some(String::new())).unwrap();
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.shell, "sh");
        assert!(config.remote_url.is_none());
        assert!(exec_config(Some(0), None, None).is_err());
    }

    #[test]
    fn test_load_message_with_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let msg = dir.path().join("msg.md");
        let file = dir.path().join("app.py");
        std::fs::write(&msg, "see attached").unwrap();
        std::fs::write(&file, "print('attached')\n").unwrap();

        let args = InputArgs {
            input: Some(msg),
            attach: vec![file],
            min_payload_chars: 40,
            short_python_chars: 100,
        };
        let message = load_message(&args).unwrap();
        assert_eq!(message.text, "see attached");
        assert_eq!(message.files.len(), 1);
        assert!(message.files[0].path.ends_with("app.py"));
    }
}
