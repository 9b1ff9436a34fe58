// Inherit lint configuration from lib.rs for consistency
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value
)]

use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docweave::batch::BatchRunner;
use docweave::cli::commands::{Cli, Command, ParseOptions};
use docweave::cli::output::{self, DetectOutput};
use docweave::config::{ParseConfig, Settings};
use docweave::ingest::{FormatClassifier, ParserRegistry};
use docweave::{CancellationToken, DocumentAssembler, DocumentInput, DocweaveError, Result};

fn main() {
    // Logs go to stderr; stdout carries the JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref())?;
    match cli.command {
        Command::Detect {
            path,
            content_type,
            threshold,
        } => cmd_detect(&settings, &path, content_type.as_deref(), threshold),
        Command::Parse {
            path,
            options,
            content_type,
            title,
            author,
            pretty,
        } => {
            let mut config = apply_options(&options, settings.parse);
            if let Some(title) = title {
                config.custom_metadata.title = Some(title);
            }
            if let Some(author) = author {
                config.custom_metadata.author = Some(author);
            }
            cmd_parse(&config, &path, content_type, pretty)
        }
        Command::Batch {
            path,
            options,
            workers,
            pretty,
        } => {
            let config = apply_options(&options, settings.parse);
            let mut batch = settings.batch;
            if let Some(workers) = workers {
                batch.max_workers = workers;
            }
            let runner = BatchRunner::new(DocumentAssembler::default(), config, batch);
            let report = runner.run(&path, &CancellationToken::new())?;
            print(&report, pretty);
            Ok(())
        }
        Command::Formats => {
            println!("{}", output::format_json(&ParserRegistry::with_defaults().describe()));
            Ok(())
        }
    }
}

/// Settings from `--config`, else `docweave.toml` in the working directory.
fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) if !path.exists() => Err(DocweaveError::Config(format!(
            "settings file not found: {}",
            path.display()
        ))),
        Some(path) => Ok(Settings::load(path)),
        None => Ok(std::env::current_dir()
            .map(|dir| Settings::discover(&dir))
            .unwrap_or_default()),
    }
}

/// Command-line flags override settings file values.
fn apply_options(options: &ParseOptions, mut config: ParseConfig) -> ParseConfig {
    if let Some(method) = options.method {
        config.chapter_detection_method = method;
    }
    if let Some(threshold) = options.threshold {
        config.confidence_threshold = threshold;
    }
    if let Some(min) = options.min_chapter_length {
        config.min_chapter_length = min;
    }
    if let Some(on_error) = options.on_error {
        config.on_error = on_error;
    }
    if let Some(timeout) = options.timeout {
        config.timeout = Some(timeout);
    }
    if let Some(max) = options.max_file_size {
        config.max_file_size = Some(max);
    }
    config
}

fn cmd_detect(
    settings: &Settings,
    path: &Path,
    content_type: Option<&str>,
    threshold: Option<f64>,
) -> Result<()> {
    let input = DocumentInput::from_path(path)?;
    let classifier =
        FormatClassifier::new(threshold.unwrap_or(settings.parse.confidence_threshold));
    let detection = classifier.classify(input.bytes(), input.filename(), content_type)?;
    let extractable = ParserRegistry::with_defaults().supports(detection.kind());
    println!(
        "{}",
        output::format_json(&DetectOutput::new(
            path.display().to_string(),
            &detection,
            extractable
        ))
    );
    Ok(())
}

fn cmd_parse(
    config: &ParseConfig,
    path: &Path,
    content_type: Option<String>,
    pretty: bool,
) -> Result<()> {
    let assembler = DocumentAssembler::default();
    let cancel = CancellationToken::new();
    let document = match content_type {
        Some(content_type) => {
            let input = DocumentInput::from_path(path)?.with_content_type(content_type);
            assembler.parse(&input, config, &cancel)?
        }
        None => assembler.parse_file(path, config, &cancel)?,
    };
    print(&document, pretty);
    Ok(())
}

fn print<T: serde::Serialize>(value: &T, pretty: bool) {
    if pretty {
        println!("{}", output::format_json_pretty(value));
    } else {
        println!("{}", output::format_json(value));
    }
}
