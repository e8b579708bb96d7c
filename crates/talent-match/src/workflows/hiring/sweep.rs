use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use super::machine::PipelineStateMachine;
use super::repository::{IdentityDirectory, PipelineRepository};

/// Spawn the low-frequency sweep that advances lapsed invitations and guarantees even
/// when no request touches the affected entries.
pub fn spawn_sweeper<R, D>(
    machine: Arc<PipelineStateMachine<R, D>>,
    period: Duration,
) -> JoinHandle<()>
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_sweep(&machine);
        }
    })
}

/// One pass of both sweeps; failures are logged and left for the next tick.
pub fn run_sweep<R, D>(machine: &PipelineStateMachine<R, D>)
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let now = machine.now();
    match machine.expire_stale_invitations(now) {
        Ok(report) => debug!(expired = report.advanced.len(), "invitation sweep complete"),
        Err(err) => error!(error = %err, "invitation sweep failed"),
    }
    match machine.evaluate_guarantees(now) {
        Ok(report) => debug!(completed = report.advanced.len(), "guarantee sweep complete"),
        Err(err) => error!(error = %err, "guarantee sweep failed"),
    }
}
