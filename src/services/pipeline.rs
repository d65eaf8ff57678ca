//! One file in one target language: load, decide, translate, merge, save.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{ResourceError, RunError};
use crate::model::{ResourceFile, ResourceFormat, StringMap};
use crate::parsers::{self, plain_text};
use crate::services::ai::TranslationClient;
use crate::services::backend::Backend;
use crate::services::context::RunContext;
use crate::services::progress::{ProgressDelta, ProgressSink};
use crate::services::qa::{self, Glossary};
use crate::services::{batcher, diff, files, scheduler};

/// Per-run knobs the pipeline needs.
#[derive(Debug, Clone)]
pub struct PipelineSettings<'a> {
    pub max_concurrency: usize,
    pub batch_budget: usize,
    pub validate: bool,
    pub source_language: &'a str,
    pub glossary: &'a Glossary,
}

/// One file × language unit of work.
#[derive(Debug, Clone, Copy)]
pub struct FileJob<'a> {
    pub source_path: &'a Path,
    pub output_path: &'a Path,
    pub format: ResourceFormat,
    pub language: &'a str,
    pub language_name: &'a str,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FileReport {
    pub strings_translated: usize,
    pub kept: usize,
    pub missing: Vec<String>,
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    pub invalid: usize,
}

pub async fn process_file<B: Backend>(
    client: &TranslationClient<B>,
    ctx: &RunContext,
    settings: &PipelineSettings<'_>,
    job: FileJob<'_>,
    sink: &ProgressSink,
) -> Result<FileReport, RunError> {
    let source = parsers::load(job.source_path, job.format)?;
    let prior = load_prior(job);

    let records = diff::decide(&source.entries, prior.as_ref().map(|p| &p.entries));
    let (blank, pending) = split_blank(diff::pending(&records));

    let mut report = FileReport {
        kept: records.len() - pending.len(),
        ..FileReport::default()
    };

    if pending.is_empty() && blank.is_empty() {
        info!(
            "{}: nothing to translate ({} kept)",
            job.source_path.display(),
            report.kept
        );
        return Ok(report);
    }

    let mut updates = StringMap::new();
    let outcome = if pending.is_empty() {
        Ok(())
    } else {
        match job.format {
            ResourceFormat::PlainText => {
                translate_whole(client, ctx, settings, job, sink, &pending, &mut updates).await
            }
            _ => {
                translate_batched(client, ctx, settings, job, sink, &pending, &mut report.missing, &mut updates)
                    .await
            }
        }
    };

    report.strings_translated = updates.len();

    // Results gathered so far are saved even when the run is aborting.
    let mut output = blank;
    for (key, value) in updates.iter() {
        output.insert(key, value);
    }
    let saved = save(&source, prior.as_ref(), &output, job.output_path);
    match (&outcome, saved) {
        (_, Ok(written)) => report.written = written,
        (Ok(()), Err(e)) => return Err(e.into()),
        (Err(_), Err(e)) => error!("failed to flush partial output {}: {e}", job.output_path.display()),
    }

    if let Err(e) = outcome {
        warn!(
            "{}: stopped after {} of {} strings",
            job.source_path.display(),
            report.strings_translated,
            pending.len()
        );
        return Err(e);
    }

    if settings.validate {
        score(&source, &updates, job, settings, &mut report);
    }

    info!(
        "{} [{}]: {} translated, {} kept, {} missing",
        job.source_path.display(),
        job.language,
        report.strings_translated,
        report.kept,
        report.missing.len()
    );

    Ok(report)
}

/// Separates blank sources from the rest. Blank strings are copied through as-is
/// and never sent to the backend.
fn split_blank(pending: StringMap) -> (StringMap, StringMap) {
    let mut blank = StringMap::new();
    let mut rest = StringMap::new();
    for (key, text) in pending.iter() {
        if text.trim().is_empty() {
            blank.insert(key, text);
        } else {
            rest.insert(key, text);
        }
    }
    if !blank.is_empty() {
        debug!("{} blank strings copied without translation", blank.len());
    }
    (blank, rest)
}

/// Existing output for this file, if any. An unreadable prior output is treated as absent.
fn load_prior(job: FileJob<'_>) -> Option<ResourceFile> {
    if !job.output_path.exists() {
        return None;
    }
    match parsers::load(job.output_path, job.format) {
        Ok(file) => Some(file),
        Err(e) => {
            warn!(
                "ignoring unreadable existing output {}: {e}",
                job.output_path.display()
            );
            None
        }
    }
}

async fn translate_whole<B: Backend>(
    client: &TranslationClient<B>,
    ctx: &RunContext,
    settings: &PipelineSettings<'_>,
    job: FileJob<'_>,
    sink: &ProgressSink,
    pending: &StringMap,
    updates: &mut StringMap,
) -> Result<(), RunError> {
    let Some(text) = pending.get(plain_text::TEXT_KEY) else {
        return Ok(());
    };

    let translated = client.translate_text(ctx, text, job.language_name).await?;
    updates.insert(
        plain_text::TEXT_KEY,
        settings.glossary.apply(&translated, job.language),
    );
    sink.emit(
        format!("Translated {} as a whole", job.source_path.display()),
        Some(translated_delta(1)),
    );
    Ok(())
}

async fn translate_batched<B: Backend>(
    client: &TranslationClient<B>,
    ctx: &RunContext,
    settings: &PipelineSettings<'_>,
    job: FileJob<'_>,
    sink: &ProgressSink,
    pending: &StringMap,
    missing: &mut Vec<String>,
    updates: &mut StringMap,
) -> Result<(), RunError> {
    let batches = batcher::pack(pending, settings.batch_budget);
    let total = batches.len();
    debug!(
        "{}: {} strings in {} batches",
        job.source_path.display(),
        pending.len(),
        batches.len()
    );

    let language_name = job.language_name;
    let glossary = settings.glossary;

    scheduler::dispatch(
        batches,
        settings.max_concurrency,
        ctx,
        move |batch| async move {
            let result = client.translate_batch(ctx, &batch, language_name).await;
            (batch, result)
        },
        |batch, result| {
            let mut translated = 0;
            for key in batch.keys() {
                match result.get(key).filter(|v| !v.trim().is_empty()) {
                    Some(value) => {
                        updates.insert(key, glossary.apply(value, job.language));
                        translated += 1;
                    }
                    None => {
                        warn!("no translation returned for '{key}', keeping previous value");
                        missing.push(key.to_string());
                    }
                }
            }
            sink.emit(
                format!(
                    "Batch {}/{total} of {}: {translated} of {} strings translated",
                    batch.id + 1,
                    job.source_path.display(),
                    batch.len()
                ),
                Some(translated_delta(translated)),
            );
        },
    )
    .await
}

fn translated_delta(count: usize) -> ProgressDelta {
    ProgressDelta {
        strings_translated: Some(count),
        ..ProgressDelta::default()
    }
}

/// Returns whether anything was written.
fn save(
    source: &ResourceFile,
    prior: Option<&ResourceFile>,
    updates: &StringMap,
    output_path: &Path,
) -> Result<bool, ResourceError> {
    if updates.is_empty() {
        return Ok(false);
    }
    match parsers::render(source, prior, updates)? {
        Some(text) => {
            files::write_atomic(output_path, text.as_bytes())?;
            debug!("saved {}", output_path.display());
            Ok(true)
        }
        None => Ok(false),
    }
}

fn score(
    source: &ResourceFile,
    updates: &StringMap,
    job: FileJob<'_>,
    settings: &PipelineSettings<'_>,
    report: &mut FileReport,
) {
    let mut total = 0u64;
    let mut count = 0u64;

    for (key, translated) in updates.iter() {
        let original = source.entries.get(key).unwrap_or_default();
        let result = qa::validate_translation_with_source(
            original,
            translated,
            job.language,
            settings.source_language,
        );

        if !result.valid {
            report.invalid += 1;
            warn!("[{}] {key}: {}", job.language, result.errors.join("; "));
        } else if !result.warnings.is_empty() {
            debug!("[{}] {key}: {}", job.language, result.warnings.join("; "));
        }

        total += u64::from(result.score);
        count += 1;
    }

    if count > 0 {
        report.average_score = Some(total as f64 / count as f64);
    }
}
