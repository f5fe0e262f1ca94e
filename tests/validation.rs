mod support;

use std::fs;
use std::sync::Arc;

use spanloom::store::{ArtifactClaim, CloseAttributes, ExecutionStatus};
use spanloom::validator::Validator;
use support::{open_tree, recorder_over, temp_store};
use tempfile::TempDir;

#[test]
fn missing_file_claim_fails_the_validation() {
    let (_tmp, store) = temp_store();
    let recorder = recorder_over(&store);
    let (_workflow, root) = open_tree(&recorder);

    let scratch = TempDir::new().unwrap();
    fs::write(scratch.path().join("report.md"), "done").unwrap();

    recorder
        .close_execution(
            &root.id,
            ExecutionStatus::Success,
            CloseAttributes {
                claimed_outputs: vec![
                    ArtifactClaim::file("report.md"),
                    ArtifactClaim::file("missing/artifact.bin"),
                ],
                ..CloseAttributes::default()
            },
        )
        .unwrap();

    let validator = Validator::new(Arc::clone(&store), scratch.path());
    let validation = validator.validate(&root.id).unwrap();
    assert!(!validation.passed);
    assert_eq!(validation.claimed_outputs.len(), 2);
    assert_eq!(validation.actual_outputs, vec![ArtifactClaim::file("report.md")]);
}

#[test]
fn all_claims_confirmed_passes() {
    let (_tmp, store) = temp_store();
    let recorder = recorder_over(&store);
    let (_workflow, root) = open_tree(&recorder);

    let scratch = TempDir::new().unwrap();
    fs::create_dir(scratch.path().join("out")).unwrap();
    fs::write(scratch.path().join("out/artifact.rs"), "pub fn f() {}").unwrap();

    recorder
        .close_execution(
            &root.id,
            ExecutionStatus::Success,
            CloseAttributes {
                claimed_outputs: vec![
                    ArtifactClaim::file("out/artifact.rs"),
                    ArtifactClaim::command("cargo test", 0),
                ],
                ..CloseAttributes::default()
            },
        )
        .unwrap();

    let validator = Validator::new(Arc::clone(&store), scratch.path());
    let validation = validator.validate(&root.id).unwrap();
    assert!(validation.passed);
    assert_eq!(validation.actual_outputs.len(), 2);
}

#[test]
fn revalidation_appends_and_is_deterministic() {
    let (_tmp, store) = temp_store();
    let recorder = recorder_over(&store);
    let (_workflow, root) = open_tree(&recorder);

    let scratch = TempDir::new().unwrap();
    recorder
        .close_execution(
            &root.id,
            ExecutionStatus::Failed,
            CloseAttributes {
                claimed_outputs: vec![ArtifactClaim::file("never-written.txt")],
                error_message: Some("task crashed".into()),
                ..CloseAttributes::default()
            },
        )
        .unwrap();

    let validator = Validator::new(Arc::clone(&store), scratch.path());
    let first = validator.validate(&root.id).unwrap();
    let second = validator.validate(&root.id).unwrap();

    // Same world, same verdict; the earlier row is untouched.
    assert_eq!(first.passed, second.passed);
    assert_eq!(first.actual_outputs, second.actual_outputs);
    let history = store.list_validations(&root.id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, first.id);

    // The world changed; only the new row reflects it.
    fs::write(scratch.path().join("never-written.txt"), "now it exists").unwrap();
    let third = validator.validate(&root.id).unwrap();
    assert!(third.passed);
    assert_eq!(store.list_validations(&root.id).unwrap().len(), 3);
    assert!(!store.list_validations(&root.id).unwrap()[0].passed);
}

#[test]
fn latest_validation_tracks_the_newest_row() {
    let (_tmp, store) = temp_store();
    let recorder = recorder_over(&store);
    let (_workflow, root) = open_tree(&recorder);

    recorder
        .close_execution(&root.id, ExecutionStatus::Success, CloseAttributes::default())
        .unwrap();

    assert!(store.latest_validation(&root.id).unwrap().is_none());

    let validator = Validator::new(Arc::clone(&store), ".");
    validator.validate(&root.id).unwrap();
    let newest = validator.validate(&root.id).unwrap();

    let latest = store.latest_validation(&root.id).unwrap().unwrap();
    assert_eq!(latest.id, newest.id);
}

#[tokio::test]
async fn validate_command_reports_failure_through_the_exit_code() {
    use clap::Parser;
    use spanloom::{Cli, Config, SqliteRecordStore};
    use std::process::ExitCode;

    let workspace = TempDir::new().unwrap();
    let config = Config::load_from_workspace(workspace.path()).unwrap();
    let store: Arc<dyn spanloom::RecordStore> =
        Arc::new(SqliteRecordStore::open(&config.db_path()).unwrap());
    let recorder = recorder_over(&store);
    let (_workflow, root) = open_tree(&recorder);

    let missing = workspace.path().join("missing.bin");
    recorder
        .close_execution(
            &root.id,
            ExecutionStatus::Success,
            CloseAttributes {
                claimed_outputs: vec![ArtifactClaim::file(missing.to_string_lossy())],
                ..CloseAttributes::default()
            },
        )
        .unwrap();

    let cli = Cli::try_parse_from(["spanloom", "validate", &root.id]).unwrap();
    let code = spanloom::app::dispatch::dispatch(cli, Arc::new(config.clone()))
        .await
        .unwrap();
    assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::FAILURE));

    // A confirmed claim set exits cleanly.
    fs::write(&missing, b"present after all").unwrap();
    let cli = Cli::try_parse_from(["spanloom", "validate", &root.id]).unwrap();
    let code = spanloom::app::dispatch::dispatch(cli, Arc::new(config))
        .await
        .unwrap();
    assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));
}
