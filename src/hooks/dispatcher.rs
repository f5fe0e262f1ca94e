use super::handler::{CommandHandler, HookContext, HookHandler};
use super::registration::{HookEvent, HookRegistration};
use crate::error::{HookError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringStatus {
    Completed,
    TimedOut,
    Errored,
}

/// Record of one handler invocation within a dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookFiring {
    pub handler_ref: String,
    pub blocking: bool,
    pub status: FiringStatus,
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

/// Event-driven extension point invoked at lifecycle instants.
///
/// Constructed from an explicit registration list (dependency injection, not
/// a process-wide global) so concurrent sessions under test never share
/// mutable state. Handlers fire in registration order; a non-blocking
/// handler's outcome is logged and swallowed, a blocking failure or timeout
/// aborts the triggering operation.
pub struct HookDispatcher {
    registrations: Vec<HookRegistration>,
    handlers: HashMap<String, Arc<dyn HookHandler>>,
}

impl HookDispatcher {
    /// Build a dispatcher whose handlers run each `handler_ref` as an
    /// external command. Use [`with_handler`](Self::with_handler) to swap in
    /// an in-process handler for a given ref.
    pub fn new(registrations: Vec<HookRegistration>) -> Self {
        let mut handlers: HashMap<String, Arc<dyn HookHandler>> = HashMap::new();
        for reg in &registrations {
            handlers
                .entry(reg.handler_ref.clone())
                .or_insert_with(|| Arc::new(CommandHandler::new(reg.handler_ref.clone())));
        }
        Self {
            registrations,
            handlers,
        }
    }

    pub fn with_handler(mut self, handler_ref: &str, handler: Arc<dyn HookHandler>) -> Self {
        self.handlers.insert(handler_ref.to_string(), handler);
        self
    }

    pub fn registrations(&self) -> &[HookRegistration] {
        &self.registrations
    }

    /// Fire all handlers registered for `event` whose filters match the task
    /// attributes. Returns one firing record per matched handler.
    pub async fn dispatch(
        &self,
        event: HookEvent,
        attributes: &HashMap<String, String>,
    ) -> Result<Vec<HookFiring>> {
        let context = HookContext {
            event,
            attributes: attributes.clone(),
        };

        let mut firings = Vec::new();
        for reg in self
            .registrations
            .iter()
            .filter(|r| r.matches(event, attributes))
        {
            let handler = self
                .handlers
                .get(&reg.handler_ref)
                .ok_or_else(|| HookError::UnknownHandler(reg.handler_ref.clone()))?;

            let started = Instant::now();
            let budget = Duration::from_millis(reg.timeout_ms);
            let outcome = timeout(budget, handler.run(&context)).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(Ok(())) => {
                    debug!(handler = %reg.handler_ref, event = %event, elapsed_ms, "hook completed");
                    firings.push(HookFiring {
                        handler_ref: reg.handler_ref.clone(),
                        blocking: reg.blocking,
                        status: FiringStatus::Completed,
                        detail: None,
                        elapsed_ms,
                    });
                }
                Ok(Err(e)) => {
                    if reg.blocking {
                        return Err(HookError::BlockingFailure {
                            handler: reg.handler_ref.clone(),
                            reason: e.to_string(),
                        }
                        .into());
                    }
                    // Isolated: later handlers for this event still run.
                    warn!(handler = %reg.handler_ref, event = %event, "non-blocking hook failed: {e}");
                    firings.push(HookFiring {
                        handler_ref: reg.handler_ref.clone(),
                        blocking: false,
                        status: FiringStatus::Errored,
                        detail: Some(e.to_string()),
                        elapsed_ms,
                    });
                }
                Err(_) => {
                    if reg.blocking {
                        return Err(HookError::BlockingTimeout {
                            handler: reg.handler_ref.clone(),
                            timeout_ms: reg.timeout_ms,
                        }
                        .into());
                    }
                    warn!(
                        handler = %reg.handler_ref,
                        event = %event,
                        timeout_ms = reg.timeout_ms,
                        "non-blocking hook timed out"
                    );
                    firings.push(HookFiring {
                        handler_ref: reg.handler_ref.clone(),
                        blocking: false,
                        status: FiringStatus::TimedOut,
                        detail: None,
                        elapsed_ms,
                    });
                }
            }
        }

        Ok(firings)
    }
}
