//! Languages × files.
//!
//! Files and languages are processed strictly one after another; only the
//! batches of the current file run concurrently. Cancellation is checked before
//! every language, file and batch.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::error::{AbortReason, RunError};
use crate::model::ResourceFormat;
use crate::services::ai::{PromptOptions, TranslationClient};
use crate::services::backend::{Backend, HttpBackend};
use crate::services::context::{CancelHandle, RunContext};
use crate::services::pipeline::{self, FileJob, PipelineSettings};
use crate::services::progress::{ProgressDelta, ProgressSink};
use crate::services::qa::Glossary;
use crate::services::{files, languages};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub languages: usize,
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    pub strings_translated: usize,
    pub missing: usize,
    pub invalid: usize,
}

/// One translation run. Owns the run's [`RunContext`]; consumed by [`Run::execute`].
pub struct Run<B: Backend> {
    config: RunConfig,
    client: TranslationClient<B>,
    ctx: RunContext,
    glossary: Glossary,
}

impl Run<HttpBackend> {
    pub fn new(config: RunConfig) -> Result<Self, RunError> {
        let backend = HttpBackend::new(&config.endpoint, &config.active_model)
            .map_err(|e| RunError::Config(e.to_string()))?;
        Self::with_backend(config, backend)
    }
}

impl<B: Backend> Run<B> {
    pub fn with_backend(config: RunConfig, backend: B) -> Result<Self, RunError> {
        config.validate()?;

        let glossary = match &config.glossary_path {
            Some(path) => Glossary::load(path)?,
            None => Glossary::default(),
        };

        let prompt = PromptOptions {
            context: config.prompt_context.clone(),
            preserve: glossary.preserve.clone(),
        };
        let client = TranslationClient::new(backend, config.retry_delay(), prompt);
        let ctx = RunContext::new(config.keys.clone(), config.max_errors);

        Ok(Self {
            config,
            client,
            ctx,
            glossary,
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.ctx.cancel_handle()
    }

    pub async fn execute(
        self,
        languages: &[String],
        format: ResourceFormat,
        sink: &ProgressSink,
    ) -> Result<RunSummary, RunError> {
        let input_dir = &self.config.input_dir;
        let sources = files::discover(input_dir, format)?;

        let mut summary = RunSummary {
            languages: languages.len(),
            total_files: sources.len() * languages.len(),
            ..RunSummary::default()
        };

        info!("run config: {:?}", self.config);
        sink.emit(
            format!("Total files to process: {}", sources.len()),
            Some(ProgressDelta {
                total_files: Some(summary.total_files),
                ..ProgressDelta::default()
            }),
        );

        let settings = PipelineSettings {
            max_concurrency: self.config.max_concurrency,
            batch_budget: self.config.max_batch_char_limit,
            validate: self.config.validate,
            source_language: &self.config.source_language,
            glossary: &self.glossary,
        };

        for language in languages {
            self.check_cancelled(sink)?;

            let language_name = languages::display_name(language);
            sink.message(format!(
                "Starting translation for language: {language} ({language_name})"
            ));

            for rel in &sources {
                self.check_cancelled(sink)?;

                let file_label = rel.display().to_string();
                sink.emit(
                    format!("Processing file: {file_label} as {format} for language: {language}"),
                    Some(ProgressDelta {
                        current_file: Some(file_label.clone()),
                        completed_files: Some(summary.completed_files),
                        ..ProgressDelta::default()
                    }),
                );

                let source_path = input_dir.join(rel);
                let output_path: PathBuf = self.config.output_dir.join(language).join(rel);
                let job = FileJob {
                    source_path: &source_path,
                    output_path: &output_path,
                    format,
                    language,
                    language_name: &language_name,
                };

                match pipeline::process_file(&self.client, &self.ctx, &settings, job, sink).await {
                    Ok(report) => {
                        summary.completed_files += 1;
                        summary.strings_translated += report.strings_translated;
                        summary.missing += report.missing.len();
                        summary.invalid += report.invalid;

                        let mut message = format!("Completed {file_label}");
                        if let Some(avg) = report.average_score {
                            message.push_str(&format!(" (average score {avg:.0}, {} invalid)", report.invalid));
                        }
                        sink.emit(
                            message,
                            Some(ProgressDelta {
                                completed_files: Some(summary.completed_files),
                                file_completed: Some(true),
                                ..ProgressDelta::default()
                            }),
                        );
                    }
                    Err(RunError::Resource(e)) => {
                        summary.failed_files += 1;
                        warn!("skipping {file_label}: {e}");
                        sink.emit(
                            format!("Error processing {file_label}: {e}"),
                            Some(ProgressDelta {
                                current_file: Some(file_label),
                                completed_files: Some(summary.completed_files),
                                error: Some(true),
                                ..ProgressDelta::default()
                            }),
                        );
                    }
                    Err(e) => {
                        if e.is_cancelled() {
                            sink.message("Translation cancelled");
                        } else {
                            error!("run aborted on {file_label}: {e}");
                            sink.emit(
                                format!("Translation aborted: {e}"),
                                Some(ProgressDelta {
                                    current_file: Some(file_label),
                                    completed_files: Some(summary.completed_files),
                                    error: Some(true),
                                    ..ProgressDelta::default()
                                }),
                            );
                        }
                        return Err(e);
                    }
                }
            }

            sink.message(format!("Finished translation for language: {language}"));
        }

        sink.message(format!(
            "All translations complete! Total: {} strings in {} files",
            summary.strings_translated, summary.completed_files
        ));
        Ok(summary)
    }

    fn check_cancelled(&self, sink: &ProgressSink) -> Result<(), RunError> {
        if self.ctx.is_cancelled() {
            sink.message("Translation cancelled");
            return Err(AbortReason::Cancelled.into());
        }
        Ok(())
    }
}
