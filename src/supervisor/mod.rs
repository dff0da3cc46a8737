//! Worker supervisor: bounds concurrent pipeline executions, claims queued
//! tasks to fill spare capacity, reaps finished executions, and records
//! completion against the originating target.
//!
//! Multiple supervisor instances may run against the same store; the atomic
//! claim in the task queue is the only mutual-exclusion primitive they need.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::db::Database;
use crate::dispatch::{Delivery, DispatchQueue};
use crate::errors::HiveError;
use crate::pipeline::PipelineEngine;

type ExecutionResult = (String, String, Result<(), HiveError>);

pub struct Supervisor {
    db: Database,
    engine: Arc<PipelineEngine>,
    concurrency: usize,
    poll: Duration,
    dispatch: Option<DispatchQueue>,
    running: JoinSet<ExecutionResult>,
}

impl Supervisor {
    pub fn new(db: Database, engine: Arc<PipelineEngine>, concurrency: usize, poll: Duration) -> Self {
        Self {
            db,
            engine,
            concurrency,
            poll,
            dispatch: None,
            running: JoinSet::new(),
        }
    }

    /// Attach a push-dispatch queue whose deliveries wake the loop early.
    pub fn with_dispatch(mut self, queue: DispatchQueue) -> Self {
        self.dispatch = Some(queue);
        self
    }

    /// One control-loop iteration: reap terminated executions, then claim up
    /// to the spare capacity and start one execution per claimed task.
    /// Returns how many executions were started.
    pub fn cycle(&mut self) -> usize {
        self.reap_finished();
        match self.fill_capacity() {
            Ok(started) => started,
            Err(e) => {
                // Claim exhausted its retry budget: the tasks remain queued
                // and untouched, so the next iteration simply tries again.
                warn!(error = %e, "Claim failed, will retry next cycle");
                0
            }
        }
    }

    fn reap_finished(&mut self) {
        while let Some(joined) = self.running.try_join_next() {
            self.record_completion(joined);
        }
    }

    fn fill_capacity(&mut self) -> Result<usize, HiveError> {
        let spare = self.concurrency.saturating_sub(self.running.len());
        if spare == 0 {
            return Ok(0);
        }
        let claimed = self.db.claim_tasks(spare)?;
        let started = claimed.len();
        for (task_id, target) in claimed {
            info!(task_id, target, "Execution starting");
            let engine = self.engine.clone();
            self.running.spawn(async move {
                let outcome = engine.run(&task_id, &target).await;
                (task_id, target, outcome)
            });
        }
        Ok(started)
    }

    fn record_completion(&self, joined: Result<ExecutionResult, tokio::task::JoinError>) {
        match joined {
            Ok((task_id, target, outcome)) => {
                // The pipeline already recorded its own terminal status; the
                // supervisor's job is the target bookkeeping.
                if let Err(e) = &outcome {
                    warn!(task_id, error = %e, "Execution finished with error status");
                } else {
                    info!(task_id, "Execution finished");
                }
                if let Err(e) = self.db.mark_seed_scanned(&target, crate::db::now_epoch()) {
                    warn!(task_id, target, error = %e, "Failed to stamp target last_scanned");
                }
            }
            Err(e) => {
                // A panicked execution cannot tell us its task id; the task
                // stays `running` with a stale heartbeat until the operator
                // reclaim rule returns it to the queue.
                error!(error = %e, "Execution panicked; task recoverable via stale-heartbeat reclaim");
            }
        }
    }

    /// A dispatch delivery is only a hint to poll sooner. The atomic claim
    /// still decides who runs what, so duplicates are harmless. The delivery
    /// is acked once a claim attempt has been made for it and nacked on a
    /// malformed payload or a failed claim, leaving redelivery to the queue.
    fn handle_delivery(&mut self, delivery: Delivery) {
        match delivery.hint() {
            Ok(hint) => {
                info!(task_id = hint.task_id, target = hint.target, "Dispatch hint received");
                self.reap_finished();
                match self.fill_capacity() {
                    Ok(_) => delivery.ack(),
                    Err(e) => {
                        warn!(error = %e, "Claim failed on dispatch hint");
                        delivery.nack();
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Malformed dispatch payload");
                delivery.nack();
            }
        }
    }

    /// Await every in-flight execution. Used by one-shot runs and tests.
    pub async fn drain(&mut self) {
        while let Some(joined) = self.running.join_next().await {
            self.record_completion(joined);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    /// Main control loop: never returns under normal operation.
    pub async fn run(mut self) {
        info!(
            concurrency = self.concurrency,
            poll_secs = self.poll.as_secs(),
            "Supervisor starting"
        );
        let heartbeat_every = (10 / self.poll.as_secs().max(1)).max(1);
        let mut beat: u64 = 0;
        loop {
            self.cycle();

            beat += 1;
            if beat % heartbeat_every == 0 {
                info!(
                    running = self.running.len(),
                    spare = self.concurrency.saturating_sub(self.running.len()),
                    "Supervisor heartbeat"
                );
            }

            match self.dispatch.clone() {
                Some(queue) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll) => {}
                        delivery = queue.recv() => self.handle_delivery(delivery),
                    }
                }
                None => tokio::time::sleep(self.poll).await,
            }
        }
    }
}
