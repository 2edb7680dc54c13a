//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use shiftboard_core::OutputFormat;

use crate::config::{ClientConfig, SourceSettings};

/// shiftboard - Provider schedules from portal pages
#[derive(Debug, Parser)]
#[command(name = "shiftboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "SHIFTBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log as JSON lines with timestamps (for cron and CI runs)
    #[arg(long)]
    pub log_json: bool,

    // --- Source flags ---
    /// Schedule file or URL; replaces configured sources (can be repeated)
    #[arg(long = "source", short = 's', action = clap::ArgAction::Append)]
    pub sources: Vec<String>,

    /// Document parser for every source (table or slots)
    #[arg(long)]
    pub parser: Option<String>,

    // --- Range flags ---
    /// First date to show (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Number of days to show
    #[arg(long, conflicts_with = "end")]
    pub days: Option<u32>,

    /// Last date to show (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    // --- Output flags ---
    /// Output format (text, json or html)
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Write the rendered schedule to this file
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Document title
    #[arg(long)]
    pub title: Option<String>,

    /// Exit with an error when any warning was reported
    #[arg(long)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration.
    pub fn apply_to(&self, config: &mut ClientConfig) {
        if self.debug {
            config.debug = true;
        }

        if !self.sources.is_empty() {
            config.sources = self
                .sources
                .iter()
                .map(|arg| SourceSettings::from_arg(arg))
                .collect();
        }
        if let Some(ref parser) = self.parser {
            for source in &mut config.sources {
                source.parser = Some(parser.clone());
            }
        }

        if let Some(start) = self.start {
            config.range.start = Some(start);
        }
        if let Some(days) = self.days {
            config.range.days = Some(days);
            config.range.end = None;
        }
        if let Some(end) = self.end {
            config.range.end = Some(end);
            config.range.days = None;
        }

        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(ref output) = self.output {
            config.output.path = Some(output.clone());
        }
        if let Some(ref title) = self.title {
            config.output.title = Some(title.clone());
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("shiftboard").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn sources_replace_configured_ones() {
        let cli = parse(&[
            "-s",
            "week.html",
            "--source",
            "https://portal.example.com/slots",
            "--parser",
            "slots",
        ]);
        let mut config = ClientConfig::default();
        config.sources.push(SourceSettings::from_arg("old.html"));
        cli.apply_to(&mut config);

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].path, Some(PathBuf::from("week.html")));
        assert!(config.sources[1].url.is_some());
        assert!(config.sources.iter().all(|s| s.parser.as_deref() == Some("slots")));
    }

    #[test]
    fn range_flags_override_each_other() {
        let cli = parse(&["--start", "2025-02-03", "--end", "2025-02-09"]);
        let mut config = ClientConfig::default();
        config.range.days = Some(3);
        cli.apply_to(&mut config);

        assert_eq!(config.range.start, NaiveDate::from_ymd_opt(2025, 2, 3));
        assert_eq!(config.range.end, NaiveDate::from_ymd_opt(2025, 2, 9));
        assert_eq!(config.range.days, None);
    }

    #[test]
    fn days_and_end_conflict() {
        let result = Cli::try_parse_from(["shiftboard", "--days", "3", "--end", "2025-02-09"]);
        assert!(result.is_err());
    }

    #[test]
    fn output_flags() {
        let cli = parse(&["--format", "html", "-o", "week.html", "--title", "Week 6", "--strict"]);
        let mut config = ClientConfig::default();
        cli.apply_to(&mut config);

        assert!(cli.strict);
        assert_eq!(config.output.format, OutputFormat::Html);
        assert_eq!(config.output.path, Some(PathBuf::from("week.html")));
        assert_eq!(config.output.title.as_deref(), Some("Week 6"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Cli::try_parse_from(["shiftboard", "--format", "pdf"]).is_err());
        assert!(Cli::try_parse_from(["shiftboard", "--start", "next monday"]).is_err());
    }

    #[test]
    fn config_subcommand() {
        let cli = parse(&["config", "validate"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: ConfigAction::Validate
            })
        ));
    }
}
