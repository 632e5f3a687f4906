use lead_scoring::scoring::{Lead, LeadId, LeadRepository, RepositoryError};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local lead storage backing the HTTP service and CLI commands.
#[derive(Default, Clone)]
pub(crate) struct InMemoryLeadRepository {
    records: Arc<Mutex<HashMap<LeadId, Lead>>>,
}

impl InMemoryLeadRepository {
    fn guard(&self) -> Result<MutexGuard<'_, HashMap<LeadId, Lead>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("lead store lock poisoned".to_string()))
    }
}

impl LeadRepository for InMemoryLeadRepository {
    fn upsert(&self, lead: Lead) -> Result<(), RepositoryError> {
        self.guard()?.insert(lead.id.clone(), lead);
        Ok(())
    }

    fn fetch(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.guard()?.get(id).cloned())
    }

    fn all(&self) -> Result<Vec<Lead>, RepositoryError> {
        let mut leads: Vec<Lead> = self.guard()?.values().cloned().collect();
        leads.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(leads)
    }
}
