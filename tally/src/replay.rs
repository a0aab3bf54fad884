use crate::domain::{CallRecord, OperationIdentity, int_or_zero};
use crate::ports::KeyValueStore;
use bytes::Bytes;
use serde::Serialize;
use shared::Result;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

pub const UNDECODABLE_INPUT: &str = "Unable to decode input";
pub const UNDECODABLE_OUTPUT: &str = "Unable to decode output";

/// Call history of one operation, oldest call first
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReplayReport {
    pub identity: OperationIdentity,
    pub call_count: i64,
    pub calls: Vec<CallRecord>,
}

impl ReplayReport {
    pub fn header(&self) -> String {
        format!("{} was called {} times:", self.identity, self.call_count)
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls
            .iter()
            .map(|call| format!("{}(*{}) -> {}", self.identity, call.input, call.output))
            .collect()
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())?;
        for line in self.lines() {
            write!(f, "\n{line}")?;
        }
        Ok(())
    }
}

/// Reads counters and history lists back out of the store
pub struct ReplayReporter {
    store: Arc<dyn KeyValueStore>,
}

impl ReplayReporter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn report(&self, identity: &OperationIdentity) -> Result<ReplayReport> {
        let raw_count = self.store.get(identity.counter_key()).await?;
        let call_count = int_or_zero(raw_count.as_deref());

        let inputs = self.store.lrange(&identity.inputs_key(), 0, -1).await?;
        let outputs = self.store.lrange(&identity.outputs_key(), 0, -1).await?;

        if inputs.len() != outputs.len() {
            warn!(
                "History of {} is uneven ({} inputs, {} outputs), pairing the shorter prefix",
                identity,
                inputs.len(),
                outputs.len()
            );
        }

        let calls = inputs
            .iter()
            .zip(outputs.iter())
            .map(|(input, output)| {
                CallRecord::new(
                    decode_or(input, UNDECODABLE_INPUT),
                    decode_or(output, UNDECODABLE_OUTPUT),
                )
            })
            .collect();

        Ok(ReplayReport {
            identity: identity.clone(),
            call_count,
            calls,
        })
    }
}

fn decode_or(raw: &Bytes, placeholder: &str) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => placeholder.to_string(),
    }
}

impl fmt::Debug for ReplayReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayReporter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{FnOperation, OperationExt};
    use crate::ports::Operation;
    use crate::storage::MemoryStore;
    use shared::Error;

    fn setup() -> (Arc<dyn KeyValueStore>, ReplayReporter) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let reporter = ReplayReporter::new(store.clone());
        (store, reporter)
    }

    #[tokio::test]
    async fn test_unknown_identity_reports_zero_calls() {
        let (_store, reporter) = setup();

        let report = reporter.report(&OperationIdentity::new("Nobody.calls")).await.unwrap();

        assert_eq!(report.call_count, 0);
        assert!(report.calls.is_empty());
        assert_eq!(report.to_string(), "Nobody.calls was called 0 times:");
    }

    #[tokio::test]
    async fn test_replay_preserves_invocation_order() {
        let (store, reporter) = setup();
        let op = FnOperation::new("Cache.store", |s: String| async move {
            Ok::<_, Error>(format!("key-{s}"))
        })
        .counted(store.clone())
        .with_history(store.clone());

        for input in ["a", "b", "c"] {
            op.call(input.to_string()).await.unwrap();
        }

        let report = reporter.report(&OperationIdentity::new("Cache.store")).await.unwrap();
        assert_eq!(
            report.to_string(),
            "Cache.store was called 3 times:\n\
             Cache.store(*(\"a\",)) -> key-a\n\
             Cache.store(*(\"b\",)) -> key-b\n\
             Cache.store(*(\"c\",)) -> key-c"
        );
    }

    #[tokio::test]
    async fn test_undecodable_entries_use_placeholders() {
        let (store, reporter) = setup();
        let identity = OperationIdentity::new("Blob.put");

        store.incr(identity.counter_key()).await.unwrap();
        store.incr(identity.counter_key()).await.unwrap();
        store
            .rpush(&identity.inputs_key(), Bytes::from_static(&[0xff, 0xfe]))
            .await
            .unwrap();
        store
            .rpush(&identity.outputs_key(), Bytes::from("ok"))
            .await
            .unwrap();
        store
            .rpush(&identity.inputs_key(), Bytes::from("second"))
            .await
            .unwrap();
        store
            .rpush(&identity.outputs_key(), Bytes::from_static(&[0xc3, 0x28]))
            .await
            .unwrap();

        let report = reporter.report(&identity).await.unwrap();
        assert_eq!(
            report.lines(),
            vec![
                format!("Blob.put(*{UNDECODABLE_INPUT}) -> ok"),
                format!("Blob.put(*second) -> {UNDECODABLE_OUTPUT}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_numeric_counter_reads_zero() {
        let (store, reporter) = setup();
        store.set("Odd.counter", Bytes::from("many")).await.unwrap();

        let report = reporter.report(&OperationIdentity::new("Odd.counter")).await.unwrap();
        assert_eq!(report.call_count, 0);
    }

    #[tokio::test]
    async fn test_report_serializes_to_json() {
        let (store, reporter) = setup();
        let identity = OperationIdentity::new("Json.op");
        store.incr(identity.counter_key()).await.unwrap();
        store
            .rpush_many(vec![
                (identity.inputs_key(), Bytes::from("1")),
                (identity.outputs_key(), Bytes::from("2")),
            ])
            .await
            .unwrap();

        let report = reporter.report(&identity).await.unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "identity": "Json.op",
                "call_count": 1,
                "calls": [{ "input": "1", "output": "2" }],
            })
        );
    }
}
