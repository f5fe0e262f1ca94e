use crate::error::{Result, StoreError, ValidationError};
use crate::store::{ArtifactClaim, RecordStore, Validation};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Compares an execution's claimed outputs against observable reality and
/// records the verdict. Reports discrepancies only; remediation belongs to a
/// human or the improvement engine.
pub struct Validator {
    store: Arc<dyn RecordStore>,
    validation_root: PathBuf,
}

impl Validator {
    /// `validation_root` anchors relative file claims; absolute claims are
    /// checked as-is.
    pub fn new(store: Arc<dyn RecordStore>, validation_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            validation_root: validation_root.into(),
        }
    }

    /// Check every claim of a terminal execution and persist a new
    /// validation row. Re-validation always inserts; earlier rows are never
    /// touched. `passed` means every claim was confirmed — no partial credit.
    pub fn validate(&self, execution_id: &str) -> Result<Validation> {
        let execution =
            self.store
                .get_execution(execution_id)?
                .ok_or_else(|| StoreError::NotFound {
                    kind: "execution",
                    id: execution_id.to_string(),
                })?;
        if !execution.status.is_terminal() {
            return Err(ValidationError::NotTerminal(execution_id.to_string()).into());
        }

        let actual: Vec<ArtifactClaim> = execution
            .claimed_outputs
            .iter()
            .filter(|claim| self.confirm(claim))
            .cloned()
            .collect();
        let passed = actual == execution.claimed_outputs;

        debug!(
            execution = execution_id,
            claimed = execution.claimed_outputs.len(),
            confirmed = actual.len(),
            passed,
            "validation recorded"
        );
        self.store
            .insert_validation(execution_id, &execution.claimed_outputs, &actual, passed)
    }

    fn confirm(&self, claim: &ArtifactClaim) -> bool {
        match claim {
            ArtifactClaim::File { path } => {
                let candidate = Path::new(path);
                if candidate.is_absolute() {
                    candidate.exists()
                } else {
                    self.validation_root.join(candidate).exists()
                }
            }
            ArtifactClaim::Command { exit_code, .. } => *exit_code == 0,
        }
    }
}
