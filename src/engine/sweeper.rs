//! Timeout sweeper
//!
//! Periodically scans in-progress steps for expired timeouts and applies
//! the step's configured timeout action. Each expired step is handed to the
//! engine's locked timeout path, so a sweep can never race a human decision
//! on the same execution. Collaborator and store errors are logged and the
//! sweep continues with the next step.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::engine::coordinator::WorkflowEngine;
use crate::model::StepStatus;

/// What the sweeper did to one expired step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    Escalated,
    AutoApproved,
    AutoRejected,
    Reminded,
}

/// One entry in a sweep's report
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub execution_id: String,
    pub step_id: String,
    pub action: SweepAction,
}

pub struct TimeoutSweeper {
    engine: Arc<WorkflowEngine>,
    interval: Duration,
}

impl TimeoutSweeper {
    pub fn new(engine: Arc<WorkflowEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Scan every active execution once and apply timeout actions to
    /// expired steps. Returns what was done.
    pub async fn sweep_once(&self) -> Vec<SweepOutcome> {
        let executions = match self.engine.active_executions().await {
            Ok(executions) => executions,
            Err(e) => {
                error!(error = %e, "sweep could not list active executions");
                return Vec::new();
            }
        };
        let now = self.engine.clock().now().await;

        let mut outcomes = Vec::new();
        for execution in &executions {
            for step in &execution.steps {
                let expired = step.status == StepStatus::InProgress
                    && step.timeout_at.map_or(false, |deadline| deadline <= now);
                if !expired {
                    continue;
                }

                // Re-checked under the execution lock; the step may have
                // been decided between the scan and here.
                match self.engine.handle_timeout(&execution.id, &step.step_id).await {
                    Ok(Some(action)) => outcomes.push(SweepOutcome {
                        execution_id: execution.id.clone(),
                        step_id: step.step_id.clone(),
                        action,
                    }),
                    Ok(None) => {}
                    Err(e) => {
                        error!(
                            execution_id = %execution.id,
                            step_id = %step.step_id,
                            error = %e,
                            "timeout handling failed, sweep continues"
                        );
                    }
                }
            }
        }
        outcomes
    }

    /// Drive `sweep_once` on a fixed interval forever
    pub async fn run(self) {
        let mut tick = tokio::time::interval(self.interval);
        loop {
            tick.tick().await;
            let outcomes = self.sweep_once().await;
            if !outcomes.is_empty() {
                info!(count = outcomes.len(), "sweep applied timeout actions");
            }
        }
    }
}
