//! EC relativity search: rank comparator positions for a work description

use clap::Parser;
use ec_relativity::cli::{self, Cli, Commands, ConfigAction, CorpusAction};
use ec_relativity::config::{Config, OutputFormat};
use ec_relativity::input::InputManager;
use ec_relativity::llm::extractor::{load_elements_file, ElementExtractor, OpenAiElementExtractor};
use ec_relativity::output::formatter::{parse_output_format, save_report_to_file, ReportGenerator};
use ec_relativity::output::report::{ComparisonReport, ReportMetadata};
use ec_relativity::processing::comparator::{ComparatorEngine, Paging, ResultWindow};
use ec_relativity::processing::corpus::{
    build_corpus, read_json, write_corpus, Corpus, CorpusSource, CorpusSourceRecord, FileCorpusSource,
};
use ec_relativity::processing::element::ElementTextMap;
use ec_relativity::processing::embeddings::{ConfiguredEmbedder, EmbeddingService};
use ec_relativity::session::{SessionContext, SessionEvent, View};
use ec_relativity::{RelativityError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

const INPUT_EXTENSIONS: &[&str] = &["pdf", "txt", "text", "md", "markdown"];

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command, config, cli.config).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, config: Config, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Compare {
            file,
            elements,
            top_k,
            output,
            save,
            show_elements,
        } => {
            let output_format = match output {
                Some(name) => parse_output_format(&name)?,
                None => config.output.format,
            };
            let mut search = Search::prepare(&config)?;
            let paging = match top_k {
                Some(top_k) => search.paging.with_initial(top_k)?,
                None => search.paging,
            };
            println!("🔎 EC relativity search");
            println!("📄 Work description: {}", file.display());
            println!("📚 Corpus: {} positions ({} dimensions)", search.corpus.len(), search.corpus.dimensions());

            let texts = search.elements_for(&file, elements.as_deref()).await?;
            let window = search.run(&texts, paging).await?;

            let mut report = ComparisonReport::new(
                ReportMetadata::new(
                    file.to_string_lossy(),
                    search.engine.embedder().model_name(),
                    search.corpus.len(),
                ),
                window.visible().to_vec(),
            );
            if show_elements {
                report = report.with_elements(texts);
            }

            let generator = ReportGenerator::with_options(
                config.output.color_output,
                config.output.detailed || show_elements,
            );
            let rendered = generator.generate_report(&report, output_format)?;
            println!("{}", rendered);

            if let Some(path) = save {
                let content = if output_format == OutputFormat::Console {
                    ReportGenerator::with_options(false, config.output.detailed || show_elements)
                        .generate_report(&report, output_format)?
                } else {
                    rendered
                };
                save_report_to_file(&content, &path)?;
                println!("💾 Saved report to {}", path.display());
            }
        }

        Commands::Session => {
            let search = Search::prepare(&config)?;
            run_session(search, &config).await?;
        }

        Commands::Corpus { action } => match action {
            CorpusAction::Info { path } => {
                let path = path.unwrap_or_else(|| config.corpus.path.clone());
                let corpus = FileCorpusSource::new(&path, config.embedding.dimensions).load_corpus()?;
                let summary = corpus.summary();

                println!("📚 Corpus: {}", path.display());
                println!("  • Records: {}", summary.record_count);
                println!("  • Dimensions: {}", summary.dimensions);
                println!("  • Levels:");
                for (level, count) in &summary.levels {
                    println!("      {}: {}", level, count);
                }
                if summary.repair_count == 0 {
                    println!("✅ No malformed embeddings");
                } else {
                    println!("⚠️  {} malformed embeddings repaired:", summary.repair_count);
                    for repair in corpus.repairs() {
                        println!(
                            "      #{} {} / {}: {}",
                            repair.record_index, repair.job_title, repair.element, repair.reason
                        );
                    }
                }
            }
            CorpusAction::Build { input, output } => {
                let sources: Vec<CorpusSourceRecord> = read_json(&input)?;
                let embedder = ConfiguredEmbedder::from_config(&config.embedding)?;
                println!(
                    "🧠 Embedding {} records with {} ({} dimensions)",
                    sources.len(),
                    embedder.model_name(),
                    embedder.dimensions()
                );

                let start_time = Instant::now();
                let progress = spinner("Embedding comparator elements...");
                let call_timeout = Duration::from_secs(config.embedding.timeout_secs);
                let stored = build_corpus(&sources, &embedder, call_timeout).await;
                progress.finish_and_clear();
                let stored = stored?;

                write_corpus(&stored, &output)?;
                println!(
                    "✅ Wrote {} records to {} in {:.1?}",
                    stored.len(),
                    output.display(),
                    start_time.elapsed()
                );
            }
        },

        Commands::Config { action } => {
            let config_path = config_override.unwrap_or_else(Config::config_path);
            match action {
                Some(ConfigAction::Show) | None => {
                    let content = toml::to_string_pretty(&config).map_err(|e| {
                        RelativityError::Configuration(format!("Failed to serialize config: {}", e))
                    })?;
                    println!("📋 Configuration ({})\n", config_path.display());
                    println!("{}", content);
                }
                Some(ConfigAction::Reset) => {
                    Config::default().save_to(&config_path)?;
                    println!("✅ Configuration reset to defaults at {}", config_path.display());
                }
                Some(ConfigAction::Path) => {
                    println!("{}", config_path.display());
                }
            }
        }
    }

    Ok(())
}

/// Everything one search needs, built once per command
struct Search {
    corpus: Arc<Corpus>,
    engine: ComparatorEngine<ConfiguredEmbedder>,
    extractor: OpenAiElementExtractor,
    input: InputManager,
    paging: Paging,
}

impl Search {
    fn prepare(config: &Config) -> Result<Self> {
        let weights = config.element_weights()?;
        let paging = config.paging()?;
        let embedder = ConfiguredEmbedder::from_config(&config.embedding)?;

        let corpus = FileCorpusSource::new(&config.corpus.path, embedder.dimensions()).load_corpus()?;
        if !corpus.is_empty() && corpus.dimensions() != embedder.dimensions() {
            return Err(RelativityError::Configuration(format!(
                "Corpus has {}-dimensional embeddings but {} produces {}",
                corpus.dimensions(),
                embedder.model_name(),
                embedder.dimensions()
            )));
        }

        let engine = ComparatorEngine::new(embedder, weights)
            .with_timeout(Duration::from_secs(config.embedding.timeout_secs));

        Ok(Self {
            corpus: Arc::new(corpus),
            engine,
            extractor: OpenAiElementExtractor::from_config(&config.extraction)?,
            input: InputManager::new(),
            paging,
        })
    }

    /// Element text for a work description: from a JSON file when given, else extracted
    async fn elements_for(&mut self, file: &Path, elements_file: Option<&Path>) -> Result<ElementTextMap> {
        let texts = match elements_file {
            Some(path) => {
                println!("📋 Using elements from {}", path.display());
                load_elements_file(path)?
            }
            None => {
                cli::validate_file_extension(file, INPUT_EXTENSIONS)
                    .map_err(|e| RelativityError::InvalidInput(format!("Work description: {}", e)))?;
                let description = self.input.extract_text(file).await?;
                info!("Extracted {} characters from {}", description.len(), file.display());

                let progress = spinner(&format!("Extracting EC elements with {}...", self.extractor.model()));
                let texts = self.extractor.extract_elements(&description).await;
                progress.finish_and_clear();
                texts?
            }
        };

        if texts.is_blank() {
            println!("⚠️  No element text found; every comparator will score 0");
        } else {
            println!("✅ {} of 9 elements populated", texts.populated().len());
        }
        Ok(texts)
    }

    async fn run(&self, texts: &ElementTextMap, paging: Paging) -> Result<ResultWindow> {
        let progress = spinner("Scoring comparators...");
        let window = self
            .engine
            .compare_window(texts, self.corpus.records(), paging)
            .await;
        progress.finish_and_clear();
        window
    }
}

async fn run_session(mut search: Search, config: &Config) -> Result<()> {
    let generator = ReportGenerator::with_options(config.output.color_output, config.output.detailed);
    let mut session = SessionContext::with_initial_display(search.paging.initial());
    let mut input_file = String::new();

    loop {
        let prompt = match session.view() {
            View::Home => "\n🏠 [u] upload a work description, [q] quit",
            View::Upload => "\n📄 Enter a file path ([h] home, [q] quit)",
            View::Results => "\n📊 [m] show more, [n] new search, [h] home, [q] quit",
        };
        let line = match read_line(prompt)? {
            Some(line) => line,
            None => break,
        };

        let event = match (session.view(), line.as_str()) {
            (_, "q") => break,
            (_, "h") => SessionEvent::ReturnHome,
            (_, "u") => SessionEvent::OpenUpload,
            (_, "m") => SessionEvent::ShowMore,
            (_, "n") => SessionEvent::NewSearch,
            (View::Upload, path) if !path.is_empty() => {
                let path = PathBuf::from(path);
                let outcome = match search.elements_for(&path, None).await {
                    Ok(texts) => search.run(&texts, search.paging).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(window) => {
                        input_file = path.to_string_lossy().to_string();
                        SessionEvent::ResultsReady(window)
                    }
                    Err(e) => SessionEvent::ExtractionFailed(e.to_string()),
                }
            }
            _ => continue,
        };

        match session.handle(event) {
            Ok(View::Results) => {
                if let Some(window) = session.results() {
                    let report = ComparisonReport::new(
                        ReportMetadata::new(
                            input_file.as_str(),
                            search.engine.embedder().model_name(),
                            search.corpus.len(),
                        ),
                        window.visible().to_vec(),
                    );
                    println!("{}", generator.generate_report(&report, OutputFormat::Console)?);
                    if !window.can_show_more() {
                        println!("ℹ️  All available comparators are shown");
                    }
                }
            }
            Ok(View::Upload) => {
                if let Some(message) = session.last_error() {
                    println!("⚠️  {}", message);
                }
            }
            Ok(View::Home) => {}
            Err(e) => println!("⚠️  {}", e),
        }
    }

    println!("👋 Goodbye");
    Ok(())
}

fn read_line(prompt: &str) -> Result<Option<String>> {
    println!("{}", prompt);
    print!("> ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn spinner(message: &str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_message(message.to_string());
    progress
}
