use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use lingo_core::{
    AbortReason, Backend, BackendError, CancelHandle, ProgressSink, ResourceFormat, Run, RunConfig,
    RunError,
};

#[derive(Clone)]
enum Mode {
    Echo,
    Fail(BackendError),
    /// Echo for the first `n` calls, then reject the credential.
    EchoThenAuth(usize),
    /// Transient failure on the first call, rejected credential on every later one.
    TransientThenAuth,
    /// Echo, cancelling the run during the first call.
    CancelOnFirst,
}

/// Upper-cases whatever it is asked to translate; counts calls and concurrency.
struct FakeBackend {
    mode: Mode,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    credentials: Mutex<Vec<String>>,
    cancel: Mutex<Option<CancelHandle>>,
}

impl FakeBackend {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            delay: Duration::from_millis(2),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
            cancel: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn echo(prompt: &str) -> String {
        if let Some(idx) = prompt.find("Text: ") {
            let text: String = serde_json::from_str(&prompt[idx + 6..]).unwrap();
            return json!({ "translated": text.to_uppercase() }).to_string();
        }
        let idx = prompt.find("Input:\n").unwrap();
        let input: Map<String, Value> = serde_json::from_str(&prompt[idx + 7..]).unwrap();
        let out: Map<String, Value> = input
            .into_iter()
            .map(|(k, v)| (k, Value::String(v.as_str().unwrap().to_uppercase())))
            .collect();
        format!("```json\n{}\n```", Value::Object(out))
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn complete(&self, credential: &str, prompt: &str) -> Result<String, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.credentials.lock().push(credential.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.mode {
            Mode::Echo => Ok(Self::echo(prompt)),
            Mode::Fail(e) => Err(e.clone()),
            Mode::EchoThenAuth(n) if call <= *n => Ok(Self::echo(prompt)),
            Mode::EchoThenAuth(_) => Err(BackendError::Authentication("HTTP 401: invalid key".into())),
            Mode::TransientThenAuth if call == 1 => Err(BackendError::Transient("connection reset".into())),
            Mode::TransientThenAuth => Err(BackendError::Authentication("HTTP 401: invalid key".into())),
            Mode::CancelOnFirst => {
                if let Some(handle) = self.cancel.lock().as_ref() {
                    handle.cancel();
                }
                Ok(Self::echo(prompt))
            }
        }
    }
}

fn config(root: &Path) -> RunConfig {
    RunConfig {
        keys: vec!["key-a".into(), "key-b".into()],
        input_dir: root.join("in"),
        output_dir: root.join("out"),
        retry_delay_ms: 1,
        max_batch_char_limit: 20,
        max_concurrency: 2,
        ..RunConfig::default()
    }
}

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn langs(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

#[tokio::test]
async fn translates_every_language_then_rerun_makes_no_calls() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("in/messages.php"),
        "<?php\nreturn [\n    'title' => 'Hello',\n    'body' => \"Welcome back, :name\\n\",\n];\n",
    );
    write(&root.join("in/auth/login.php"), "<?php return array('submit' => 'Sign in');");
    write(&root.join("in/README.md"), "ignored for php runs");

    let backend = FakeBackend::new(Mode::Echo);
    let run = Run::with_backend(config(root), Arc::clone(&backend)).unwrap();
    let summary = run
        .execute(&langs(&["uk", "de"]), ResourceFormat::KeyedArray, &ProgressSink::silent())
        .await
        .unwrap();

    assert_eq!(summary.total_files, 4);
    assert_eq!(summary.completed_files, 4);
    assert_eq!(summary.strings_translated, 6);

    let uk = fs::read_to_string(root.join("out/uk/messages.php")).unwrap();
    assert!(uk.contains("\"WELCOME BACK, :NAME\\n\""));
    assert!(root.join("out/de/auth/login.php").exists());
    assert!(!root.join("out/uk/README.md").exists());

    // both credentials were used
    let used = backend.credentials.lock().clone();
    assert!(used.iter().any(|c| c == "key-a"));
    assert!(used.iter().any(|c| c == "key-b"));

    let again = FakeBackend::new(Mode::Echo);
    let rerun = Run::with_backend(config(root), Arc::clone(&again)).unwrap();
    let summary = rerun
        .execute(&langs(&["uk", "de"]), ResourceFormat::KeyedArray, &ProgressSink::silent())
        .await
        .unwrap();

    assert_eq!(summary.strings_translated, 0);
    assert_eq!(again.calls(), 0);
}

#[tokio::test]
async fn short_existing_translation_is_redone_and_stale_keys_survive() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("in/messages.json"),
        r#"{"nav": {"home": "Home page", "settings": "Settings"}, "count": 3}"#,
    );
    write(
        &root.join("out/uk/messages.json"),
        r#"{"nav": {"home": "Д", "settings": "Налаштування"}, "removed": "Старе"}"#,
    );

    let backend = FakeBackend::new(Mode::Echo);
    let run = Run::with_backend(config(root), Arc::clone(&backend)).unwrap();
    run.execute(&langs(&["uk"]), ResourceFormat::NestedObject, &ProgressSink::silent())
        .await
        .unwrap();

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(root.join("out/uk/messages.json")).unwrap()).unwrap();
    assert_eq!(
        saved,
        json!({"nav": {"home": "HOME PAGE", "settings": "Налаштування"}, "removed": "Старе"})
    );
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn in_flight_calls_never_exceed_the_limit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let entries: Map<String, Value> = (0..24)
        .map(|i| (format!("key_{i:02}"), Value::String(format!("Value number {i:02}"))))
        .collect();
    write(&root.join("in/big.json"), &Value::Object(entries).to_string());

    let backend = FakeBackend::new(Mode::Echo);
    let cfg = RunConfig {
        max_concurrency: 3,
        ..config(root)
    };
    let run = Run::with_backend(cfg, Arc::clone(&backend)).unwrap();
    let summary = run
        .execute(&langs(&["fr"]), ResourceFormat::NestedObject, &ProgressSink::silent())
        .await
        .unwrap();

    assert_eq!(summary.strings_translated, 24);
    assert_eq!(backend.calls(), 24);
    let peak = backend.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight was {peak}");
    assert!(peak >= 2);
}

#[tokio::test]
async fn error_budget_aborts_without_touching_later_work() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("in/a.php"), "<?php return ['a' => 'First'];");
    write(&root.join("in/b.php"), "<?php return ['b' => 'Second'];");

    let backend = FakeBackend::new(Mode::Fail(BackendError::Malformed("garbage".into())));
    let cfg = RunConfig {
        max_errors: 2,
        max_concurrency: 1,
        ..config(root)
    };
    let run = Run::with_backend(cfg, Arc::clone(&backend)).unwrap();
    let err = run
        .execute(&langs(&["uk", "de"]), ResourceFormat::KeyedArray, &ProgressSink::silent())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::Aborted(AbortReason::ErrorBudget { count: 2, max: 2 })
    ));
    assert_eq!(backend.calls(), 2);
    assert!(!root.join("out").exists());
}

#[tokio::test]
async fn exhausted_retries_abort_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("in/a.php"), "<?php return ['a' => 'First'];");
    write(&root.join("in/b.php"), "<?php return ['b' => 'Second'];");

    let backend = FakeBackend::new(Mode::Fail(BackendError::Transient("connection reset".into())));
    let run = Run::with_backend(config(root), Arc::clone(&backend)).unwrap();
    let err = run
        .execute(&langs(&["uk"]), ResourceFormat::KeyedArray, &ProgressSink::silent())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::Aborted(AbortReason::RetriesExhausted { attempts: 3, .. })
    ));
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn authentication_failure_flushes_partial_output_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("in/a.php"),
        "<?php return ['one' => 'Alpha alpha', 'two' => 'Beta beta', 'three' => 'Gamma gamma'];",
    );
    write(&root.join("in/b.php"), "<?php return ['b' => 'Second'];");

    let backend = FakeBackend::new(Mode::EchoThenAuth(1));
    let cfg = RunConfig {
        max_concurrency: 1,
        max_batch_char_limit: 11,
        ..config(root)
    };
    let run = Run::with_backend(cfg, Arc::clone(&backend)).unwrap();
    let err = run
        .execute(&langs(&["uk"]), ResourceFormat::KeyedArray, &ProgressSink::silent())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Authentication(_)));
    assert_eq!(backend.calls(), 2);

    let partial = fs::read_to_string(root.join("out/uk/a.php")).unwrap();
    assert!(partial.contains("ALPHA ALPHA"));
    assert!(!partial.contains("Beta"));
    assert!(!root.join("out/uk/b.php").exists());
}

#[tokio::test]
async fn cancellation_stops_before_the_next_batch() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("in/a.php"),
        "<?php return ['one' => 'Alpha alpha', 'two' => 'Beta beta'];",
    );
    write(&root.join("in/b.php"), "<?php return ['b' => 'Second'];");

    let backend = FakeBackend::new(Mode::CancelOnFirst);
    let cfg = RunConfig {
        max_concurrency: 1,
        max_batch_char_limit: 11,
        ..config(root)
    };
    let run = Run::with_backend(cfg, Arc::clone(&backend)).unwrap();
    *backend.cancel.lock() = Some(run.cancel_handle());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let err = run
        .execute(&langs(&["uk", "de"]), ResourceFormat::KeyedArray, &ProgressSink::new(tx))
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(backend.calls(), 1);
    assert!(root.join("out/uk/a.php").exists());
    assert!(!root.join("out/uk/b.php").exists());

    let mut messages = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        messages.push(ev.message);
    }
    assert!(messages.iter().any(|m| m == "Translation cancelled"));
}

#[tokio::test]
async fn plain_text_files_are_translated_whole() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("in/docs/intro.txt"), "Line one\nLine \"two\"\n");

    let backend = FakeBackend::new(Mode::Echo);
    let run = Run::with_backend(config(root), Arc::clone(&backend)).unwrap();
    run.execute(&langs(&["pt_BR"]), ResourceFormat::PlainText, &ProgressSink::silent())
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(root.join("out/pt_BR/docs/intro.txt")).unwrap(),
        "LINE ONE\nLINE \"TWO\"\n"
    );
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn authentication_failure_stops_retries_of_concurrent_batches() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("in/a.php"),
        "<?php return ['one' => 'Alpha alpha', 'two' => 'Beta beta'];",
    );

    let backend = FakeBackend::new(Mode::TransientThenAuth);
    let cfg = RunConfig {
        max_concurrency: 2,
        max_batch_char_limit: 11,
        ..config(root)
    };
    let run = Run::with_backend(cfg, Arc::clone(&backend)).unwrap();
    let err = run
        .execute(&langs(&["uk"]), ResourceFormat::KeyedArray, &ProgressSink::silent())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Authentication(_)));
    assert_eq!(backend.calls(), 2);
    assert!(!root.join("out/uk/a.php").exists());
}

#[tokio::test]
async fn error_budget_stops_retries_of_concurrent_batches() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("in/a.php"),
        "<?php return ['one' => 'Alpha alpha', 'two' => 'Beta beta'];",
    );

    let backend = FakeBackend::new(Mode::Fail(BackendError::Transient("connection reset".into())));
    let cfg = RunConfig {
        max_errors: 2,
        max_concurrency: 2,
        max_batch_char_limit: 11,
        ..config(root)
    };
    let run = Run::with_backend(cfg, Arc::clone(&backend)).unwrap();
    let err = run
        .execute(&langs(&["uk", "de"]), ResourceFormat::KeyedArray, &ProgressSink::silent())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::Aborted(AbortReason::ErrorBudget { count: 2, max: 2 })
    ));
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn blank_plain_text_file_is_copied_without_a_call() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("in/.gitkeep"), "");
    write(&root.join("in/notes.txt"), "  \n");
    write(&root.join("in/z.txt"), "Hello");

    let backend = FakeBackend::new(Mode::Echo);
    let run = Run::with_backend(config(root), Arc::clone(&backend)).unwrap();
    let summary = run
        .execute(&langs(&["uk"]), ResourceFormat::PlainText, &ProgressSink::silent())
        .await
        .unwrap();

    assert_eq!(summary.completed_files, 3);
    assert_eq!(summary.strings_translated, 1);
    assert_eq!(backend.calls(), 1);
    assert_eq!(fs::read_to_string(root.join("out/uk/.gitkeep")).unwrap(), "");
    assert_eq!(fs::read_to_string(root.join("out/uk/notes.txt")).unwrap(), "  \n");
    assert_eq!(fs::read_to_string(root.join("out/uk/z.txt")).unwrap(), "HELLO");
}

#[tokio::test]
async fn empty_values_are_kept_out_of_batches() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("in/m.json"), r#"{"blank": "", "title": "Title"}"#);

    let backend = FakeBackend::new(Mode::Echo);
    let run = Run::with_backend(config(root), Arc::clone(&backend)).unwrap();
    run.execute(&langs(&["uk"]), ResourceFormat::NestedObject, &ProgressSink::silent())
        .await
        .unwrap();

    let saved: Value =
        serde_json::from_str(&fs::read_to_string(root.join("out/uk/m.json")).unwrap()).unwrap();
    assert_eq!(saved, json!({"blank": "", "title": "TITLE"}));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn progress_is_reported_for_every_batch() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("in/m.json"),
        r#"{"a": "Hello", "b": "World", "c": "Again"}"#,
    );

    let backend = FakeBackend::new(Mode::Echo);
    let cfg = RunConfig {
        max_batch_char_limit: 10,
        ..config(root)
    };
    let run = Run::with_backend(cfg, Arc::clone(&backend)).unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let summary = run
        .execute(&langs(&["uk"]), ResourceFormat::NestedObject, &ProgressSink::new(tx))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }

    let batch_events: Vec<_> = events.iter().filter(|e| e.message.starts_with("Batch ")).collect();
    assert_eq!(batch_events.len(), 2);
    assert_eq!(backend.calls(), 2);

    let reported: usize = events
        .iter()
        .filter_map(|e| e.delta.as_ref().and_then(|d| d.strings_translated))
        .sum();
    assert_eq!(reported, 3);
    assert_eq!(summary.strings_translated, 3);
}
