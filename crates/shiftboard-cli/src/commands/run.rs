//! The default command: fetch every source, ingest, merge and render.

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, error, info};

use shiftboard_core::{
    IngestWarning, Normalizer, OutputFormat, ScheduleModel, ingest, parser_for, renderer_for,
};
use shiftboard_sources::{ScheduleSource, fetch_all};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// A warning together with the source whose document produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceWarning {
    pub source: String,
    pub warning: IngestWarning,
}

impl fmt::Display for SourceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.source, self.warning)
    }
}

/// A rendered schedule and the warnings collected on the way.
#[derive(Debug)]
pub struct RunReport {
    pub document: String,
    pub format: OutputFormat,
    pub warnings: Vec<SourceWarning>,
    pub shift_count: usize,
}

/// Fetches, ingests, merges and renders without writing anything.
///
/// A source that cannot be fetched fails the run; so does a document without
/// schedule anchors and a pair of sources with overlapping ranges.
pub async fn execute(config: &ClientConfig, today: NaiveDate) -> ClientResult<RunReport> {
    if config.sources.is_empty() {
        return Err(ClientError::Config(format!(
            "no sources configured. Pass --source or add [[sources]] to {}",
            ClientConfig::default_path().display()
        )));
    }

    let global = config.range.resolve(today)?;
    let options = config.normalize_options();

    let sources = config
        .sources
        .iter()
        .map(|s| s.build(&config.fetch))
        .collect::<ClientResult<Vec<Box<dyn ScheduleSource>>>>()?;
    let fetched = fetch_all(&sources, config.fetch.retry_policy()).await;

    let mut failures = Vec::new();
    let mut models = Vec::with_capacity(sources.len());
    let mut warnings = Vec::new();
    for (settings, result) in config.sources.iter().zip(fetched) {
        let doc = match result {
            Ok(doc) => doc,
            Err(e) => {
                error!(source = %settings.name, error = %e, "fetch failed");
                failures.push(e.to_string());
                continue;
            }
        };

        let parser_id = settings
            .parser
            .as_deref()
            .unwrap_or_else(|| doc.suggested_parser());
        let parser = parser_for(parser_id)?;
        let normalizer = Normalizer::new(
            options.clone().for_parser(parser.as_ref()),
            settings.range(global)?,
        )?;
        let outcome = ingest(&doc.body, parser.as_ref(), &normalizer)
            .inspect_err(|e| error!(source = %settings.name, error = %e, "ingest failed"))?;

        info!(
            source = %settings.name,
            parser = parser.name(),
            range = %normalizer.range(),
            shifts = outcome.model.shift_count(),
            warnings = outcome.warnings.len(),
            "ingested source"
        );
        models.push(outcome.model);
        warnings.extend(outcome.warnings.into_iter().map(|warning| SourceWarning {
            source: settings.name.clone(),
            warning,
        }));
    }
    if !failures.is_empty() {
        return Err(ClientError::Source(failures.join("; ")));
    }

    let model = if models.len() == 1 {
        models.remove(0)
    } else {
        let merged = ScheduleModel::merge(models, &options.identity)?;
        for entry in &mut warnings {
            entry.warning.canonicalize(&merged);
        }
        merged
    };

    let format = config.output.format;
    let renderer = renderer_for(format, config.output.format_options());
    let rendered: Vec<IngestWarning> = warnings.iter().map(|w| w.warning.clone()).collect();
    let document = renderer.render(&model, &rendered)?;
    debug!(format = %format, bytes = document.len(), "rendered schedule");

    Ok(RunReport {
        document,
        format,
        warnings,
        shift_count: model.shift_count(),
    })
}

/// Runs the pipeline, writes the document and reports warnings on stderr.
///
/// With `strict`, a run that produced warnings still writes its output and
/// then fails with [`ClientError::Strict`].
pub async fn run(config: &ClientConfig, today: NaiveDate, strict: bool) -> ClientResult<()> {
    let report = execute(config, today).await?;

    match config.output.path {
        Some(ref path) => write_document(path, &report.document).await?,
        None => print!("{}", report.document),
    }

    if !report.warnings.is_empty() {
        eprintln!("{}", summarize(&report.warnings));
        if strict {
            return Err(ClientError::Strict(report.warnings.len()));
        }
    }
    Ok(())
}

async fn write_document(path: &Path, document: &str) -> ClientResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, document).await?;
    info!(path = %path.display(), "wrote schedule");
    Ok(())
}

/// Short warning summary for stderr.
pub fn summarize(warnings: &[SourceWarning]) -> String {
    let mut dropped = 0;
    let mut conflicts = 0;
    let mut out_of_range = 0;
    let mut truncated = 0;
    for entry in warnings {
        match entry.warning {
            IngestWarning::DroppedRecord { .. } | IngestWarning::SkippedEntry { .. } => dropped += 1,
            IngestWarning::Conflict { .. } => conflicts += 1,
            IngestWarning::OutOfRange { .. } => out_of_range += 1,
            IngestWarning::Truncated { .. } => truncated += 1,
        }
    }

    let mut summary = format!(
        "{} warning(s): {} dropped, {} conflict(s), {} outside range, {} truncated",
        warnings.len(),
        dropped,
        conflicts,
        out_of_range,
        truncated
    );
    for warning in warnings {
        summary.push_str(&format!("\n  - {warning}"));
    }
    summary
}
