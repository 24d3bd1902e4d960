//! CLI interface for EC relativity search

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ec-relativity")]
#[command(version)]
#[command(about = "EC classification relativity search")]
#[command(long_about = "Find the closest EC comparator positions for a work description by weighted, element-by-element similarity")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank comparator positions for a work description
    Compare {
        /// Work description file (PDF, TXT, MD)
        file: PathBuf,

        /// JSON file of pre-extracted elements; skips the extraction call
        #[arg(short, long)]
        elements: Option<PathBuf>,

        /// Number of comparators to show
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Output format: console, json, markdown, html
        #[arg(short, long)]
        output: Option<String>,

        /// Save output to file
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Print the extracted element text and per-element scores
        #[arg(long)]
        show_elements: bool,
    },

    /// Interactive search session
    Session,

    /// Reference corpus commands
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum CorpusAction {
    /// Load the corpus and summarize it
    Info {
        /// Corpus file (defaults to the configured path)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Embed categorized job records into a corpus file
    Build {
        /// JSON array of records with per-element text
        input: PathBuf,

        /// Output corpus file; `.gz` compresses it
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file path
    Path,
}

/// Validate file extension
pub fn validate_file_extension(path: &std::path::Path, allowed_extensions: &[&str]) -> Result<(), String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => {
            if allowed_extensions.contains(&ext.to_lowercase().as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "Unsupported file extension: .{}. Allowed: {}",
                    ext,
                    allowed_extensions.join(", ")
                ))
            }
        }
        None => Err("File has no extension".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_arguments() {
        let cli = Cli::parse_from([
            "ec-relativity",
            "-v",
            "compare",
            "jd.pdf",
            "--top-k",
            "10",
            "--output",
            "markdown",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Compare { file, top_k, output, .. } => {
                assert_eq!(file, PathBuf::from("jd.pdf"));
                assert_eq!(top_k, Some(10));
                assert_eq!(output.as_deref(), Some("markdown"));
            }
            _ => panic!("expected compare"),
        }
    }

    #[test]
    fn test_validate_file_extension() {
        let allowed = ["pdf", "txt", "md"];
        assert!(validate_file_extension(std::path::Path::new("a.PDF"), &allowed).is_ok());
        assert!(validate_file_extension(std::path::Path::new("a.docx"), &allowed).is_err());
        assert!(validate_file_extension(std::path::Path::new("a"), &allowed).is_err());
    }
}
