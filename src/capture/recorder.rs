use std::cell::Cell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::warn;

use crate::model::DynamicUsageRecord;

/// Sink file for captured records. Unset means capture is a no-op.
pub const OUTPUT_PATH_ENV: &str = "DYN_EXTRACTOR_OUTPUT_PATH";

/// Case-insensitive `"true"` enables call-stack capture.
pub const STACKTRACE_ENV: &str = "DYN_EXTRACTOR_REPORT_STACKTRACE";

static RECORDER: OnceLock<Recorder> = OnceLock::new();

#[derive(Error, Debug)]
enum SinkError {
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write to sink: {0}")]
    Io(#[from] std::io::Error),
}

/// Process-wide capture registry for the interception agent.
///
/// Constructed once and passed by reference to every instrumented call site;
/// installation is an explicit "already installed" check rather than a
/// mutation of shared dispatch state.
pub struct Recorder {
    sink_path: Option<PathBuf>,
    capture_stack: bool,
}

impl Recorder {
    /// Installs the process-wide recorder, reading the sink path and
    /// stack-capture toggle from the environment.
    ///
    /// Idempotent: a second call returns the recorder installed by the first
    /// and changes nothing, so initialization code running twice cannot
    /// double-wrap.
    pub fn install() -> &'static Recorder {
        RECORDER.get_or_init(Recorder::from_env)
    }

    fn from_env() -> Self {
        let capture_stack = std::env::var(STACKTRACE_ENV)
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            sink_path: std::env::var_os(OUTPUT_PATH_ENV).map(PathBuf::from),
            capture_stack,
        }
    }

    /// Recorder with explicit configuration, for embedding and tests.
    pub fn with_config(sink_path: Option<PathBuf>, capture_stack: bool) -> Self {
        Self {
            sink_path,
            capture_stack,
        }
    }

    /// Call-stack text for a record: a captured backtrace when the toggle is
    /// enabled, empty otherwise.
    pub fn stack(&self) -> String {
        if self.capture_stack {
            std::backtrace::Backtrace::force_capture().to_string()
        } else {
            String::new()
        }
    }

    /// Best-effort append of one record as a JSON line.
    ///
    /// With no sink configured this is a no-op. Faults are logged and
    /// absorbed here; they never reach the instrumented caller and never
    /// change the result of the intercepted operation.
    pub fn append(&self, record: &DynamicUsageRecord) {
        let Some(path) = &self.sink_path else {
            return;
        };
        if let Err(err) = append_line(path, record) {
            warn!(sink = %path.display(), error = %err, "failed to append usage record");
        }
    }
}

fn append_line(path: &Path, record: &DynamicUsageRecord) -> Result<(), SinkError> {
    let payload = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(payload.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

thread_local! {
    static SUPPRESS_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Suppresses record emission on the current thread for as long as it lives.
///
/// Compound operations hold one of these while delegating, so the primitive
/// operations they trigger internally do not emit their own records.
/// Restoration happens in `Drop`, so the guard is released on every exit
/// path, including unwinding.
pub(crate) struct SuppressGuard;

impl SuppressGuard {
    pub(crate) fn new() -> Self {
        SUPPRESS_DEPTH.with(|depth| depth.set(depth.get() + 1));
        SuppressGuard
    }

    pub(crate) fn active() -> bool {
        SUPPRESS_DEPTH.with(|depth| depth.get() > 0)
    }
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        SUPPRESS_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FuncName;

    fn sample_record() -> DynamicUsageRecord {
        DynamicUsageRecord {
            pattern: "a+".to_string(),
            subject: "aaa".to_string(),
            stack: String::new(),
            func_name: FuncName::Test,
            def: false,
        }
    }

    #[test]
    fn install_is_idempotent() {
        let first = Recorder::install();
        let second = Recorder::install();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn append_without_sink_is_a_no_op() {
        let recorder = Recorder::with_config(None, false);
        recorder.append(&sample_record());
    }

    #[test]
    fn append_writes_one_json_line_per_record() {
        let sink = tempfile::NamedTempFile::new().unwrap();
        let recorder = Recorder::with_config(Some(sink.path().to_path_buf()), false);

        recorder.append(&sample_record());
        recorder.append(&sample_record());

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: DynamicUsageRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, sample_record());
    }

    #[test]
    fn sink_faults_are_absorbed() {
        let recorder = Recorder::with_config(
            Some(PathBuf::from("/nonexistent-dir/sink.jsonl")),
            false,
        );
        // Must not panic or surface the error.
        recorder.append(&sample_record());
    }

    #[test]
    fn stack_is_empty_when_capture_disabled() {
        let recorder = Recorder::with_config(None, false);
        assert!(recorder.stack().is_empty());
    }

    #[test]
    fn stack_is_populated_when_capture_enabled() {
        let recorder = Recorder::with_config(None, true);
        assert!(!recorder.stack().is_empty());
    }

    #[test]
    fn suppress_guard_nests_and_restores() {
        assert!(!SuppressGuard::active());
        {
            let _outer = SuppressGuard::new();
            assert!(SuppressGuard::active());
            {
                let _inner = SuppressGuard::new();
                assert!(SuppressGuard::active());
            }
            assert!(SuppressGuard::active());
        }
        assert!(!SuppressGuard::active());
    }

    #[test]
    fn suppress_guard_restores_across_unwinding() {
        let result = std::panic::catch_unwind(|| {
            let _guard = SuppressGuard::new();
            panic!("fault inside delegated call");
        });
        assert!(result.is_err());
        assert!(!SuppressGuard::active());
    }
}
