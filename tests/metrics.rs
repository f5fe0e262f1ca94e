mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use spanloom::metrics::{MetricsAggregator, Trend};
use spanloom::store::{CloseAttributes, ExecutionStatus};
use support::{close_failed, close_ok, open_tree, recorder_over, temp_store};

#[test]
fn mixed_children_average_to_half() {
    let (_tmp, store) = temp_store();
    let recorder = recorder_over(&store);
    let (workflow, root) = open_tree(&recorder);

    let ok = recorder
        .open_execution(&workflow.id, Some(&root.id), "coder", "write the feature")
        .unwrap();
    let bad = recorder
        .open_execution(&workflow.id, Some(&root.id), "coder", "write the fix")
        .unwrap();
    recorder
        .close_execution(
            &ok.id,
            ExecutionStatus::Success,
            CloseAttributes {
                tokens_input: 800,
                tokens_output: 200,
                cost_units: 0.02,
                ..CloseAttributes::default()
            },
        )
        .unwrap();
    close_failed(&recorder, &bad.id);

    let rollup = MetricsAggregator::new(Arc::clone(&store))
        .agent_performance(Utc::now() - Duration::days(1))
        .unwrap();
    let coder = rollup.iter().find(|a| a.agent_name == "coder").unwrap();
    assert_eq!(coder.count, 2);
    assert_eq!(coder.successes, 1);
    assert!((coder.success_rate - 0.5).abs() < f64::EPSILON);
    assert!((coder.avg_tokens - 500.0).abs() < f64::EPSILON);
    assert!((coder.total_cost - 0.02).abs() < 1e-12);
}

#[test]
fn running_spans_never_enter_the_rollup() {
    let (_tmp, store) = temp_store();
    let recorder = recorder_over(&store);
    let (workflow, root) = open_tree(&recorder);
    close_ok(&recorder, &root.id);

    // Opened but never closed; stays out of the averages.
    let second = recorder.open_workflow("again", "fixture").unwrap();
    recorder
        .open_execution(&second.id, None, "orchestrator", "coordinate")
        .unwrap();
    let _ = workflow;

    let rollup = MetricsAggregator::new(Arc::clone(&store))
        .agent_performance(Utc::now() - Duration::days(1))
        .unwrap();
    let agent = rollup
        .iter()
        .find(|a| a.agent_name == "orchestrator")
        .unwrap();
    assert_eq!(agent.count, 1);
}

#[test]
fn agents_sort_by_volume_then_name() {
    let (_tmp, store) = temp_store();
    let recorder = recorder_over(&store);
    let (workflow, root) = open_tree(&recorder);

    for task in ["a", "b", "c"] {
        let e = recorder
            .open_execution(&workflow.id, Some(&root.id), "busy", task)
            .unwrap();
        close_ok(&recorder, &e.id);
    }
    let quiet = recorder
        .open_execution(&workflow.id, Some(&root.id), "quiet", "one thing")
        .unwrap();
    close_ok(&recorder, &quiet.id);
    close_ok(&recorder, &root.id);

    let rollup = MetricsAggregator::new(Arc::clone(&store))
        .agent_performance(Utc::now() - Duration::days(1))
        .unwrap();
    assert_eq!(rollup[0].agent_name, "busy");
    assert_eq!(rollup[0].count, 3);
}

#[test]
fn daily_summary_covers_today() {
    let (_tmp, store) = temp_store();
    let recorder = recorder_over(&store);
    let (_workflow, root) = open_tree(&recorder);
    recorder
        .close_execution(
            &root.id,
            ExecutionStatus::Success,
            CloseAttributes {
                tokens_input: 100,
                tokens_output: 50,
                cost_units: 0.01,
                ..CloseAttributes::default()
            },
        )
        .unwrap();

    let summary = MetricsAggregator::new(Arc::clone(&store))
        .daily_summary(7)
        .unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].date, Utc::now().date_naive());
    assert_eq!(summary[0].total, 1);
    assert_eq!(summary[0].successes, 1);
    assert_eq!(summary[0].total_tokens, 150);
}

#[test]
fn single_day_window_reads_stable() {
    let (_tmp, store) = temp_store();
    let recorder = recorder_over(&store);
    let (_workflow, root) = open_tree(&recorder);
    close_ok(&recorder, &root.id);

    let trend = MetricsAggregator::new(Arc::clone(&store)).trend(7).unwrap();
    assert_eq!(trend, Trend::Stable);
}

#[test]
fn empty_store_reads_stable() {
    let (_tmp, store) = temp_store();
    let trend = MetricsAggregator::new(Arc::clone(&store)).trend(7).unwrap();
    assert_eq!(trend, Trend::Stable);
}

// Backdated series can't be produced through the recorder, so trend
// direction runs against a canned store.
mod canned {
    use chrono::{DateTime, Duration, Utc};
    use spanloom::error::Result;
    use spanloom::hooks::HookRegistration;
    use spanloom::store::{
        ArtifactClaim, CloseAttributes, Execution, ExecutionStatus, Validation, Workflow,
        WorkflowStatus,
    };
    use spanloom::RecordStore;

    pub struct CannedStore {
        pub executions: Vec<Execution>,
    }

    impl CannedStore {
        /// One execution per (days-ago, succeeded) entry.
        pub fn series(entries: &[(i64, bool)]) -> Self {
            let executions = entries
                .iter()
                .enumerate()
                .map(|(i, (days_ago, ok))| {
                    let started_at = Utc::now() - Duration::days(*days_ago);
                    Execution {
                        id: format!("exec_{i}"),
                        workflow_id: "wf_canned".into(),
                        parent_execution_id: None,
                        agent_name: "agent".into(),
                        task_description: "task".into(),
                        started_at,
                        ended_at: Some(started_at + Duration::seconds(1)),
                        duration_ms: Some(1_000),
                        status: if *ok {
                            ExecutionStatus::Success
                        } else {
                            ExecutionStatus::Failed
                        },
                        tokens_input: 0,
                        tokens_output: 0,
                        cost_units: 0.0,
                        claimed_outputs: Vec::new(),
                        error_message: None,
                    }
                })
                .collect();
            Self { executions }
        }
    }

    impl RecordStore for CannedStore {
        fn list_executions_since(&self, since: DateTime<Utc>) -> Result<Vec<Execution>> {
            Ok(self
                .executions
                .iter()
                .filter(|e| e.started_at >= since)
                .cloned()
                .collect())
        }

        fn create_workflow(
            &self,
            _: &str,
            _: &str,
            _: Option<&str>,
            _: Option<&str>,
        ) -> Result<Workflow> {
            unimplemented!()
        }
        fn get_workflow(&self, _: &str) -> Result<Option<Workflow>> {
            unimplemented!()
        }
        fn close_workflow(&self, _: &str, _: WorkflowStatus) -> Result<Workflow> {
            unimplemented!()
        }
        fn list_workflows(&self, _: usize) -> Result<Vec<Workflow>> {
            unimplemented!()
        }
        fn insert_execution(
            &self,
            _: &str,
            _: Option<&str>,
            _: &str,
            _: &str,
            _: i64,
        ) -> Result<Execution> {
            unimplemented!()
        }
        fn insert_execution_group(
            &self,
            _: &str,
            _: &str,
            _: &[(String, String)],
            _: i64,
        ) -> Result<Vec<Execution>> {
            unimplemented!()
        }
        fn get_execution(&self, _: &str) -> Result<Option<Execution>> {
            unimplemented!()
        }
        fn root_execution(&self, _: &str) -> Result<Option<Execution>> {
            unimplemented!()
        }
        fn close_execution(
            &self,
            _: &str,
            _: ExecutionStatus,
            _: &CloseAttributes,
        ) -> Result<Execution> {
            unimplemented!()
        }
        fn list_recent_executions(&self, _: usize, _: bool) -> Result<Vec<Execution>> {
            unimplemented!()
        }
        fn list_children(&self, _: &str) -> Result<Vec<Execution>> {
            unimplemented!()
        }
        fn running_executions_started_before(&self, _: DateTime<Utc>) -> Result<Vec<Execution>> {
            unimplemented!()
        }
        fn insert_validation(
            &self,
            _: &str,
            _: &[ArtifactClaim],
            _: &[ArtifactClaim],
            _: bool,
        ) -> Result<Validation> {
            unimplemented!()
        }
        fn latest_validation(&self, _: &str) -> Result<Option<Validation>> {
            unimplemented!()
        }
        fn list_validations(&self, _: &str) -> Result<Vec<Validation>> {
            unimplemented!()
        }
        fn replace_hook_registrations(&self, _: &[HookRegistration]) -> Result<()> {
            unimplemented!()
        }
        fn load_hook_registrations(&self) -> Result<Vec<HookRegistration>> {
            unimplemented!()
        }
        fn purge_older_than(&self, _: i64) -> Result<usize> {
            unimplemented!()
        }
        fn vacuum(&self) -> Result<()> {
            unimplemented!()
        }
    }
}

#[test]
fn rising_pass_rate_reads_improving() {
    // Older half failing, newer half passing.
    let store: Arc<dyn spanloom::RecordStore> = Arc::new(canned::CannedStore::series(&[
        (6, false),
        (5, false),
        (4, false),
        (2, true),
        (1, true),
        (0, true),
    ]));
    let trend = MetricsAggregator::new(store).trend(7).unwrap();
    assert_eq!(trend, Trend::Improving);
}

#[test]
fn falling_pass_rate_reads_degrading() {
    let store: Arc<dyn spanloom::RecordStore> = Arc::new(canned::CannedStore::series(&[
        (6, true),
        (5, true),
        (4, true),
        (2, false),
        (1, false),
        (0, false),
    ]));
    let trend = MetricsAggregator::new(store).trend(7).unwrap();
    assert_eq!(trend, Trend::Degrading);
}
