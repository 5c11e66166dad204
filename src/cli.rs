use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe a media file into subtitles
    Transcribe {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,

        /// Source language ("auto" to detect)
        #[arg(short, long)]
        language: Option<String>,

        /// Copy the finished subtitles here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also translate the result into these languages (comma-separated)
        #[arg(short, long)]
        target_langs: Option<String>,
    },

    /// Transcribe every media file in a directory
    Batch {
        /// Input directory containing media files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Source language ("auto" to detect)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Translate an existing subtitle file
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Target language
        #[arg(short, long)]
        target: String,

        /// Source language (default: auto)
        #[arg(short, long)]
        source: Option<String>,

        /// Copy the translated subtitles here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the duration of a media file in seconds
    Probe {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// List supported languages
    Languages,

    /// Write the default configuration as TOML
    Config {
        /// Output file
        #[arg(short, long, default_value = "whisub.toml")]
        output: PathBuf,
    },
}

/// Split a comma-separated language list
pub fn parse_language_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transcribe_command() {
        let args = Args::try_parse_from([
            "whisub", "-v", "transcribe", "--input", "movie.mp4", "--language", "de", "--target-langs", "en,fr",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Commands::Transcribe { input, language, target_langs, output } => {
                assert_eq!(input, PathBuf::from("movie.mp4"));
                assert_eq!(language.as_deref(), Some("de"));
                assert_eq!(target_langs.as_deref(), Some("en,fr"));
                assert!(output.is_none());
            }
            _ => panic!("expected transcribe"),
        }
    }

    #[test]
    fn test_parse_language_list() {
        assert_eq!(parse_language_list(" en, fr ,,de"), vec!["en", "fr", "de"]);
    }
}
