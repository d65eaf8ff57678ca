//! JSON-line control surface.
//!
//! Requests are `{"id": .., "cmd": "..", "payload": {..}}`; every request gets exactly
//! one response line. A started run additionally streams `progress` events and
//! ends with a `finished` or `failed` event.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{error, info};

use crate::config::{RunConfig, RunConfigOverrides};
use crate::model::ResourceFormat;
use crate::services::context::CancelHandle;
use crate::services::driver::Run;
use crate::services::progress::{ProgressEvent, ProgressSink};
use crate::services::{languages, merge, qa};

mod command;
use command::Command;

pub const MAX_LOG_ENTRIES: usize = 500;

fn get_cmd(req: &Value) -> &str {
    req.get("cmd").and_then(|v| v.as_str()).unwrap_or("")
}

fn get_id(req: &Value) -> Value {
    req.get("id").cloned().unwrap_or(Value::Null)
}

fn get_payload(req: &Value) -> &Value {
    static EMPTY: Value = Value::Null;
    req.get("payload").unwrap_or(&EMPTY)
}

fn get_str<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn ok(id: Value, payload: Value) -> String {
    json!({
        "id": id,
        "status": "ok",
        "payload": payload
    })
    .to_string()
}

fn err(id: Value, message: impl Into<String>) -> String {
    json!({
        "id": id,
        "status": "error",
        "message": message.into()
    })
    .to_string()
}

fn event(id: &Value, name: &str, body: Value) -> String {
    let mut line = json!({ "id": id, "event": name });
    if let (Some(line), Value::Object(body)) = (line.as_object_mut(), body) {
        line.extend(body);
    }
    line.to_string()
}

#[derive(Debug, Default)]
struct SessionState {
    running: bool,
    cancel: Option<CancelHandle>,
    total_files: usize,
    completed_files: usize,
    strings_translated: usize,
    current_file: Option<String>,
    last_error: Option<String>,
    logs: VecDeque<String>,
}

impl SessionState {
    fn record(&mut self, ev: &ProgressEvent) {
        if self.logs.len() == MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
        self.logs.push_back(ev.message.clone());

        let Some(delta) = &ev.delta else {
            return;
        };
        if let Some(n) = delta.total_files {
            self.total_files = n;
        }
        if let Some(n) = delta.completed_files {
            self.completed_files = n;
        }
        if let Some(f) = &delta.current_file {
            self.current_file = Some(f.clone());
        }
        if let Some(n) = delta.strings_translated {
            self.strings_translated += n;
        }
        if delta.error == Some(true) {
            self.last_error = Some(ev.message.clone());
        }
    }
}

/// Command handler shared by the stdin loop and the run tasks it spawns.
#[derive(Clone)]
pub struct Session {
    out: UnboundedSender<String>,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    /// `out` receives every line that must go to stdout besides direct responses.
    pub fn new(out: UnboundedSender<String>) -> Self {
        Self {
            out,
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn handle(&self, input: &str) -> String {
        let req: Value = match serde_json::from_str(input) {
            Ok(v) => v,
            Err(_) => {
                return json!({
                    "status": "error",
                    "message": "invalid json"
                })
                .to_string();
            }
        };

        let id = get_id(&req);
        let payload = get_payload(&req);

        match Command::from(get_cmd(&req)) {
            Command::Ping => ok(id, json!({ "message": "lingo-core alive" })),
            Command::Run => self.start_run(id, payload),
            Command::Stop => self.stop(id),
            Command::Status => self.status(id),

            Command::Validate => {
                let original = get_str(payload, "original");
                let translated = get_str(payload, "translated");
                let language = get_str(payload, "language");
                if language.is_empty() {
                    return err(id, "payload.language is required");
                }
                let source = payload
                    .get("source_language")
                    .and_then(|v| v.as_str())
                    .unwrap_or("en");

                let result = qa::validate_translation_with_source(original, translated, language, source);
                ok(id, serde_json::to_value(result).unwrap_or(Value::Null))
            }

            Command::ExtractPlaceholders => {
                let text = get_str(payload, "text");
                ok(id, json!({ "placeholders": qa::extract_placeholders(text) }))
            }

            Command::MergeLocales => {
                let locales_dir = get_str(payload, "locales_dir");
                let translated_dir = get_str(payload, "translated_dir");
                let file_name = get_str(payload, "file_name");
                if locales_dir.is_empty() || translated_dir.is_empty() || file_name.is_empty() {
                    return err(id, "payload.locales_dir, translated_dir and file_name are required");
                }
                let format: ResourceFormat = match get_str(payload, "file_type").parse() {
                    Ok(f) => f,
                    Err(e) => return err(id, e),
                };

                match merge::merge_locales(
                    &PathBuf::from(locales_dir),
                    &PathBuf::from(translated_dir),
                    file_name,
                    format,
                ) {
                    Ok(report) => ok(id, serde_json::to_value(report).unwrap_or(Value::Null)),
                    Err(e) => err(id, e.to_string()),
                }
            }

            Command::Unknown => err(id, "unknown command"),
        }
    }

    /// Cancels a running translation, if any.
    pub fn shutdown(&self) {
        if let Some(cancel) = &self.state.lock().cancel {
            cancel.cancel();
        }
    }

    fn start_run(&self, id: Value, payload: &Value) -> String {
        if self.state.lock().running {
            return err(id, "translation already running");
        }

        let langs = match payload.get("languages") {
            Some(Value::String(s)) => languages::parse_list(s),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .flat_map(languages::parse_list)
                .collect(),
            _ => Vec::new(),
        };
        if langs.is_empty() {
            return err(id, "payload.languages is required");
        }

        let format: ResourceFormat = match get_str(payload, "file_type").parse() {
            Ok(f) => f,
            Err(e) => return err(id, e),
        };

        let overrides: RunConfigOverrides = match payload.get("config") {
            Some(v) if !v.is_null() => match serde_json::from_value(v.clone()) {
                Ok(o) => o,
                Err(e) => return err(id, format!("invalid payload.config: {e}")),
            },
            _ => RunConfigOverrides::default(),
        };

        let mut config = RunConfig::from_env();
        config.apply(overrides);

        let run = match Run::new(config) {
            Ok(r) => r,
            Err(e) => return err(id, e.to_string()),
        };

        {
            let mut state = self.state.lock();
            if state.running {
                return err(id, "translation already running");
            }
            *state = SessionState {
                running: true,
                cancel: Some(run.cancel_handle()),
                ..SessionState::default()
            };
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

        let forwarder = {
            let session = self.clone();
            let id = id.clone();
            tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    session.state.lock().record(&ev);
                    let body = serde_json::to_value(&ev).unwrap_or(Value::Null);
                    let _ = session.out.send(event(&id, "progress", body));
                }
            })
        };

        let session = self.clone();
        let run_id = id.clone();
        let format_name = format.to_string();
        tokio::spawn(async move {
            let sink = ProgressSink::new(tx);
            let result = run.execute(&langs, format, &sink).await;
            drop(sink);
            let _ = forwarder.await;

            let line = match result {
                Ok(summary) => {
                    info!("run finished: {summary:?}");
                    event(&run_id, "finished", json!({ "summary": summary }))
                }
                Err(e) => {
                    error!("run failed: {e}");
                    event(
                        &run_id,
                        "failed",
                        json!({ "message": e.to_string(), "cancelled": e.is_cancelled() }),
                    )
                }
            };

            {
                let mut state = session.state.lock();
                state.running = false;
                state.cancel = None;
            }
            let _ = session.out.send(line);
        });

        ok(id, json!({ "started": true, "file_type": format_name }))
    }

    fn stop(&self, id: Value) -> String {
        let state = self.state.lock();
        match (&state.cancel, state.running) {
            (Some(cancel), true) => {
                cancel.cancel();
                ok(id, json!({ "stopping": true }))
            }
            _ => ok(id, json!({ "stopping": false, "message": "no translation running" })),
        }
    }

    fn status(&self, id: Value) -> String {
        let state = self.state.lock();
        ok(
            id,
            json!({
                "running": state.running,
                "totalFiles": state.total_files,
                "completedFiles": state.completed_files,
                "stringsTranslated": state.strings_translated,
                "currentFile": state.current_file,
                "lastError": state.last_error,
                "logs": state.logs,
            }),
        )
    }
}
