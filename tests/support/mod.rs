#![allow(dead_code)]

use std::sync::Arc;

use tempfile::TempDir;

use spanloom::config::RecorderConfig;
use spanloom::store::{CloseAttributes, Execution, ExecutionStatus, Workflow};
use spanloom::{RecordStore, SpanRecorder, SqliteRecordStore};

/// File-backed store in a scratch directory. Keep the `TempDir` alive for
/// the duration of the test.
pub fn temp_store() -> (TempDir, Arc<dyn RecordStore>) {
    let tmp = TempDir::new().expect("tempdir");
    let store = SqliteRecordStore::open(&tmp.path().join("records.db")).expect("record store");
    (tmp, Arc::new(store))
}

pub fn recorder_over(store: &Arc<dyn RecordStore>) -> SpanRecorder {
    SpanRecorder::new(Arc::clone(store), &RecorderConfig::default())
}

/// Workflow with an open root span, the common starting point.
pub fn open_tree(recorder: &SpanRecorder) -> (Workflow, Execution) {
    let workflow = recorder.open_workflow("build", "fixture").expect("workflow");
    let root = recorder
        .open_execution(&workflow.id, None, "orchestrator", "coordinate the build")
        .expect("root execution");
    (workflow, root)
}

pub fn close_ok(recorder: &SpanRecorder, execution_id: &str) -> Execution {
    recorder
        .close_execution(execution_id, ExecutionStatus::Success, CloseAttributes::default())
        .expect("close execution")
}

pub fn close_failed(recorder: &SpanRecorder, execution_id: &str) -> Execution {
    recorder
        .close_execution(
            execution_id,
            ExecutionStatus::Failed,
            CloseAttributes {
                error_message: Some("boom".into()),
                ..CloseAttributes::default()
            },
        )
        .expect("close execution")
}
