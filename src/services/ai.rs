use std::time::Duration;

use rand::{thread_rng, Rng};
use tracing::{debug, error, warn};

use crate::error::{AbortReason, BackendError, RunError};
use crate::model::{Batch, StringMap};
use crate::services::backend::Backend;
use crate::services::context::RunContext;
use crate::services::response;

pub const MAX_ATTEMPTS: usize = 3;
const RATE_LIMIT_MULTIPLIER: u32 = 3;
pub const SINGLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(90);

/// Prompt decorations shared by every call of a run.
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    pub context: Option<String>,
    pub preserve: Vec<String>,
}

/// Backend calls with retry, backoff, timeouts and credential rotation.
pub struct TranslationClient<B: Backend> {
    backend: B,
    retry_delay: Duration,
    prompt: PromptOptions,
}

fn backoff(base: Duration, multiplier: u32) -> Duration {
    let base_ms = base.as_millis() as u64 * multiplier as u64;
    let jitter: u64 = thread_rng().gen_range(0..=base_ms / 10);
    Duration::from_millis(base_ms + jitter)
}

/// Checked before every attempt, including the first and each one after a backoff.
fn ensure_running(ctx: &RunContext) -> Result<(), RunError> {
    if ctx.is_cancelled() {
        return Err(AbortReason::Cancelled.into());
    }
    if ctx.budget_exhausted() {
        return Err(AbortReason::ErrorBudget {
            count: ctx.error_count(),
            max: ctx.max_errors(),
        }
        .into());
    }
    if ctx.is_halted() {
        return Err(AbortReason::Halted.into());
    }
    Ok(())
}

impl<B: Backend> TranslationClient<B> {
    pub fn new(backend: B, retry_delay: Duration, prompt: PromptOptions) -> Self {
        Self {
            backend,
            retry_delay,
            prompt,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// One batch, keyed like the input. Keys the model dropped are simply absent.
    pub async fn translate_batch(
        &self,
        ctx: &RunContext,
        batch: &Batch,
        language_name: &str,
    ) -> Result<StringMap, RunError> {
        let prompt = self.batch_prompt(&batch.entries, language_name);
        debug!(
            "batch {}: {} keys, {} chars -> {language_name}",
            batch.id,
            batch.len(),
            batch.char_len()
        );

        self.call_with_retry(ctx, &prompt, BATCH_TIMEOUT, |raw| {
            response::parse_batch(raw, &batch.entries)
        })
        .await
    }

    /// Whole text as one unit (plain-text files).
    pub async fn translate_text(
        &self,
        ctx: &RunContext,
        text: &str,
        language_name: &str,
    ) -> Result<String, RunError> {
        let prompt = self.single_prompt(text, language_name);
        self.call_with_retry(ctx, &prompt, SINGLE_TIMEOUT, response::parse_single)
            .await
    }

    async fn call_with_retry<T, F>(
        &self,
        ctx: &RunContext,
        prompt: &str,
        timeout: Duration,
        parse: F,
    ) -> Result<T, RunError>
    where
        F: Fn(&str) -> Result<T, BackendError>,
    {
        let mut last: Option<BackendError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            ensure_running(ctx)?;

            let credential = ctx.next_credential().ok_or_else(|| {
                RunError::Config("no API keys configured".into())
            })?;

            let outcome = match tokio::time::timeout(timeout, self.backend.complete(credential, prompt)).await {
                Ok(Ok(raw)) => parse(&raw),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(BackendError::Transient(format!(
                    "request timed out after {}s",
                    timeout.as_secs()
                ))),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if let BackendError::Authentication(msg) = err {
                error!("authentication failed, aborting run: {msg}");
                ctx.halt();
                return Err(RunError::Authentication(msg));
            }

            let count = ctx.record_error();
            warn!(
                "attempt {attempt}/{MAX_ATTEMPTS} failed ({err}); errors {count}/{}",
                ctx.max_errors()
            );

            if count >= ctx.max_errors() {
                error!("too many errors ({count}/{}), aborting run", ctx.max_errors());
                ctx.halt();
                return Err(AbortReason::ErrorBudget {
                    count,
                    max: ctx.max_errors(),
                }
                .into());
            }

            if attempt < MAX_ATTEMPTS {
                let multiplier = match err {
                    BackendError::RateLimited(_) => RATE_LIMIT_MULTIPLIER,
                    _ => 1,
                };
                tokio::time::sleep(backoff(self.retry_delay, multiplier)).await;
            }

            last = Some(err);
        }

        let last = last.unwrap_or_else(|| BackendError::Transient("no attempt made".into()));
        error!("retries exhausted: {last}");
        ctx.halt();
        Err(AbortReason::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
            last,
        }
        .into())
    }

    fn preamble(&self) -> String {
        let mut p = String::new();
        if let Some(context) = self.prompt.context.as_deref().filter(|c| !c.trim().is_empty()) {
            p.push_str(context.trim());
            p.push_str("\n\n");
        }
        p
    }

    fn preserve_line(&self) -> String {
        if self.prompt.preserve.is_empty() {
            return String::new();
        }
        let terms: Vec<String> = self.prompt.preserve.iter().map(|t| format!("\"{t}\"")).collect();
        format!("Do NOT translate these terms: {}.\n", terms.join(", "))
    }

    pub fn batch_prompt(&self, entries: &StringMap, language_name: &str) -> String {
        let input = serde_json::to_string_pretty(&entries.to_json()).unwrap_or_default();

        let mut p = self.preamble();
        p.push_str(&format!(
            "Translate each value in the following JSON object to {language_name}.\n"
        ));
        p.push_str(&self.preserve_line());
        p.push_str("Keep placeholders such as :name, {count}, %s and $var and any HTML tags unchanged.\n");
        p.push_str("DO NOT CUT THE TEXT, every value needs a full translation.\n\n");
        p.push_str("Respond ONLY with valid JSON in the SAME structure, with the same keys. Example format:\n");
        p.push_str("{\n  \"key1\": \"value\",\n  \"key2\": \"value\"\n}\n\n");
        p.push_str("Input:\n");
        p.push_str(&input);
        p
    }

    pub fn single_prompt(&self, text: &str, language_name: &str) -> String {
        let quoted = serde_json::to_string(text).unwrap_or_default();

        let mut p = String::from(
            "Respond ONLY with valid JSON in this format: {\"translated\": \"...\"}.\n\
             Ensure all double quotes in the translated text are properly escaped (e.g., use \\\"). \
             Do not include Markdown, backticks, explanation, or extra text.\n\n",
        );
        p.push_str(&self.preamble());
        p.push_str(&format!("Translate the following text to {language_name}.\n"));
        p.push_str(&self.preserve_line());
        p.push_str("\nText: ");
        p.push_str(&quoted);
        p
    }
}
