//! Call recording and canned responses

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use switchboard_core::{GateError, Result};

/// One recorded backend invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Position in call order, starting at 1
    pub seq: u64,
    pub operation: String,
    pub args: Vec<String>,
}

/// Owned, cloneable call history
///
/// Clones share the same history, so one log can be handed to several fakes
/// and inspected from the test.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    records: Arc<Mutex<Vec<CallRecord>>>,
    seq: Arc<AtomicU64>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call; the sequence number is taken under the lock, so history
    /// order and sequence order agree across tasks
    pub fn record(&self, operation: &str, args: &[String]) {
        if let Ok(mut records) = self.records.lock() {
            let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            records.push(CallRecord {
                seq,
                operation: operation.to_string(),
                args: args.to_vec(),
            });
        }
    }

    /// Every call, in order
    pub fn calls(&self) -> Vec<CallRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<CallRecord> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls_to(operation).len()
    }

    pub fn total(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// True if `operation` was called with arguments starting with `args`
    ///
    /// An empty `args` matches any call to `operation`.
    pub fn was_called(&self, operation: &str, args: &[&str]) -> bool {
        self.calls_to(operation).iter().any(|call| {
            call.args.len() >= args.len() && call.args.iter().zip(args).all(|(a, b)| a == b)
        })
    }

    /// Clear history; sequence numbers keep increasing
    pub fn reset(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

type Canned = std::result::Result<Value, GateError>;

/// Canned responses keyed by operation, optionally narrowed by arguments
///
/// An argument-scoped entry wins over an operation-wide one, and never
/// affects calls with other arguments.
#[derive(Debug, Clone, Default)]
pub struct Stubs {
    by_op: Arc<Mutex<HashMap<String, Canned>>>,
    by_args: Arc<Mutex<HashMap<(String, Vec<String>), Canned>>>,
}

impl Stubs {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, operation: &str, args: Option<&[&str]>, canned: Canned) {
        match args {
            Some(args) => {
                let key = (
                    operation.to_string(),
                    args.iter().map(|s| s.to_string()).collect(),
                );
                if let Ok(mut map) = self.by_args.lock() {
                    map.insert(key, canned);
                }
            }
            None => {
                if let Ok(mut map) = self.by_op.lock() {
                    map.insert(operation.to_string(), canned);
                }
            }
        }
    }

    pub fn stub(&self, operation: &str, response: impl Serialize) {
        self.set(operation, None, Ok(to_value(response)));
    }

    pub fn stub_with(&self, operation: &str, args: &[&str], response: impl Serialize) {
        self.set(operation, Some(args), Ok(to_value(response)));
    }

    pub fn fail(&self, operation: &str, error: GateError) {
        self.set(operation, None, Err(error));
    }

    pub fn fail_with(&self, operation: &str, args: &[&str], error: GateError) {
        self.set(operation, Some(args), Err(error));
    }

    /// Drop every canned response
    pub fn clear(&self) {
        if let Ok(mut map) = self.by_op.lock() {
            map.clear();
        }
        if let Ok(mut map) = self.by_args.lock() {
            map.clear();
        }
    }

    /// The canned response for this call, if any
    pub fn lookup<T: DeserializeOwned>(
        &self,
        operation: &str,
        args: &[String],
    ) -> Option<Result<T>> {
        let key = (operation.to_string(), args.to_vec());
        let canned = self
            .by_args
            .lock()
            .ok()
            .and_then(|map| map.get(&key).cloned())
            .or_else(|| self.by_op.lock().ok().and_then(|map| map.get(operation).cloned()))?;

        Some(canned.and_then(|value| {
            serde_json::from_value(value).map_err(|e| {
                GateError::execution(format!(
                    "Canned response for {} has the wrong shape: {}",
                    operation, e
                ))
            })
        }))
    }
}

fn to_value(response: impl Serialize) -> Value {
    serde_json::to_value(response).unwrap_or(Value::Null)
}

/// A call log plus canned responses: the state every fake carries
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub log: CallLog,
    pub stubs: Stubs,
}

impl Recorder {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            stubs: Stubs::new(),
        }
    }

    /// Record the call, then return its canned response if one is set
    pub fn begin<T: DeserializeOwned>(
        &self,
        operation: &str,
        args: Vec<String>,
    ) -> Option<Result<T>> {
        self.log.record(operation, &args);
        self.stubs.lookup(operation, &args)
    }
}

/// Forward the recording and stubbing API of a fake to its [`Recorder`]
macro_rules! recorder_api {
    ($fake:ty) => {
        impl $fake {
            pub fn log(&self) -> &$crate::CallLog {
                &self.recorder.log
            }

            pub fn stub(&self, operation: &str, response: impl serde::Serialize) {
                self.recorder.stubs.stub(operation, response);
            }

            pub fn stub_with(
                &self,
                operation: &str,
                args: &[&str],
                response: impl serde::Serialize,
            ) {
                self.recorder.stubs.stub_with(operation, args, response);
            }

            pub fn fail(&self, operation: &str, error: switchboard_core::GateError) {
                self.recorder.stubs.fail(operation, error);
            }

            pub fn fail_with(
                &self,
                operation: &str,
                args: &[&str],
                error: switchboard_core::GateError,
            ) {
                self.recorder.stubs.fail_with(operation, args, error);
            }

            pub fn was_called(&self, operation: &str, args: &[&str]) -> bool {
                self.recorder.log.was_called(operation, args)
            }

            pub fn call_count(&self, operation: &str) -> usize {
                self.recorder.log.call_count(operation)
            }

            pub fn calls(&self) -> Vec<$crate::CallRecord> {
                self.recorder.log.calls()
            }

            /// Clear call history; canned responses stay
            pub fn reset(&self) {
                self.recorder.log.reset();
            }
        }
    };
}

pub(crate) use recorder_api;

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::ErrorKind;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_call_count_and_reset() {
        let log = CallLog::new();
        log.record("install", &args(&["alpha"]));
        log.record("install", &args(&["alpha"]));
        log.record("list", &[]);
        assert_eq!(log.call_count("install"), 2);
        assert!(log.was_called("install", &["alpha"]));
        assert!(!log.was_called("install", &["beta"]));
        assert!(log.was_called("list", &[]));

        let seqs: Vec<u64> = log.calls().iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);

        log.reset();
        assert_eq!(log.call_count("install"), 0);
        assert_eq!(log.total(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_recording_keeps_sequence_order() {
        let log = CallLog::new();
        let mut handles = Vec::new();
        for task in 0..8 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..50 {
                    log.record("install", &[format!("server-{}-{}", task, n)]);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let seqs: Vec<u64> = log.calls().iter().map(|c| c.seq).collect();
        assert_eq!(seqs.len(), 400);
        assert_eq!(seqs, (1..=400).collect::<Vec<u64>>());
        assert_eq!(log.call_count("install"), 400);
    }

    #[test]
    fn test_argument_scoped_stub() {
        let stubs = Stubs::new();
        stubs.stub_with("info", &["alpha"], "scoped");
        assert_eq!(
            stubs.lookup::<String>("info", &args(&["alpha"])).unwrap().unwrap(),
            "scoped"
        );
        assert!(stubs.lookup::<String>("info", &args(&["beta"])).is_none());

        stubs.stub("info", "general");
        assert_eq!(
            stubs.lookup::<String>("info", &args(&["beta"])).unwrap().unwrap(),
            "general"
        );
        assert_eq!(
            stubs.lookup::<String>("info", &args(&["alpha"])).unwrap().unwrap(),
            "scoped"
        );
    }

    #[test]
    fn test_reset_keeps_stubs() {
        let recorder = Recorder::new(CallLog::new());
        recorder.stubs.fail("doctor", GateError::unavailable("down"));
        let first: Option<Result<()>> = recorder.begin("doctor", vec![]);
        assert_eq!(first.unwrap().unwrap_err().kind(), ErrorKind::BackendUnavailable);

        recorder.log.reset();
        assert_eq!(recorder.log.call_count("doctor"), 0);
        let again: Option<Result<()>> = recorder.begin("doctor", vec![]);
        assert!(again.unwrap().is_err());
        assert_eq!(recorder.log.call_count("doctor"), 1);
    }

    #[test]
    fn test_wrong_shape_is_reported() {
        let stubs = Stubs::new();
        stubs.stub("list", "not a list");
        let err = stubs.lookup::<Vec<String>>("list", &[]).unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendExecution);
    }
}
