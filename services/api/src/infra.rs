use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use talent_match::workflows::hiring::{
    AnonId, CandidateIdentity, DirectoryError, IdentityDirectory, InMemoryPipelineStore,
    PipelineStateMachine,
};

pub(crate) type ServiceMachine = PipelineStateMachine<InMemoryPipelineStore, InMemoryIdentityDirectory>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local PII store keyed by anonymized id. Only the disclosure path reads it.
#[derive(Default, Clone)]
pub(crate) struct InMemoryIdentityDirectory {
    identities: Arc<Mutex<HashMap<AnonId, CandidateIdentity>>>,
}

impl InMemoryIdentityDirectory {
    /// Returns `true` when an existing identity was replaced.
    pub(crate) fn register(
        &self,
        anon_id: AnonId,
        identity: CandidateIdentity,
    ) -> Result<bool, DirectoryError> {
        let mut guard = self.identities.lock().map_err(poisoned)?;
        Ok(guard.insert(anon_id, identity).is_some())
    }
}

fn poisoned<T>(_: T) -> DirectoryError {
    DirectoryError::Unavailable("identity mutex poisoned".to_string())
}

impl IdentityDirectory for InMemoryIdentityDirectory {
    fn identity(&self, anon_id: &AnonId) -> Result<Option<CandidateIdentity>, DirectoryError> {
        let guard = self.identities.lock().map_err(poisoned)?;
        Ok(guard.get(anon_id).cloned())
    }
}
