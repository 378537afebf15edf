//! Process-wide usage telemetry.
//!
//! One sink for the whole process, installed once at startup. Tests use
//! `reset_usage_sink` to swap it out between cases.

use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};

/// Usage emitted for every LLM response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

pub trait UsageSink: Send + Sync {
    fn record(&self, usage: &UsageRecord);
}

fn sink_slot() -> &'static Mutex<Option<Arc<dyn UsageSink>>> {
    static SLOT: OnceLock<Mutex<Option<Arc<dyn UsageSink>>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Install the process-wide sink. Later installs replace earlier ones.
pub fn install_usage_sink(sink: Arc<dyn UsageSink>) {
    *sink_slot().lock().expect("usage sink lock poisoned") = Some(sink);
}

/// Remove the installed sink (test teardown).
pub fn reset_usage_sink() {
    *sink_slot().lock().expect("usage sink lock poisoned") = None;
}

/// Emit a record through the installed sink, if any.
pub fn emit_usage(usage: &UsageRecord) {
    let sink = sink_slot().lock().expect("usage sink lock poisoned").clone();
    if let Some(sink) = sink {
        sink.record(usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl UsageSink for Counting {
        fn record(&self, _usage: &UsageRecord) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn install_emit_reset() {
        let sink = Arc::new(Counting(AtomicUsize::new(0)));
        install_usage_sink(sink.clone());
        emit_usage(&UsageRecord::default());
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);

        reset_usage_sink();
        emit_usage(&UsageRecord::default());
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }
}
