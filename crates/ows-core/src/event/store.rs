use std::collections::HashMap;

use chrono::Utc;

use super::{JobEvent, JobEventKind};

/// Almacenamiento de eventos append-only.
pub trait JobEventStore {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&mut self, job: &str, kind: JobEventKind) -> JobEvent;
    /// Eventos de un job en orden ascendente de seq.
    fn list(&self, job: &str) -> Vec<JobEvent>;
}

#[derive(Debug, Default)]
pub struct InMemoryJobEventStore {
    inner: HashMap<String, Vec<JobEvent>>,
}

impl JobEventStore for InMemoryJobEventStore {
    fn append_kind(&mut self, job: &str, kind: JobEventKind) -> JobEvent {
        let events = self.inner.entry(job.to_string()).or_default();
        let ev = JobEvent { seq: events.len() as u64,
                            job: job.to_string(),
                            kind,
                            ts: Utc::now() };
        events.push(ev.clone());
        ev
    }

    fn list(&self, job: &str) -> Vec<JobEvent> {
        self.inner.get(job).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_assigned_per_job() {
        let mut store = InMemoryJobEventStore::default();
        store.append_kind("a", JobEventKind::Archived);
        store.append_kind("b", JobEventKind::Archived);
        let ev = store.append_kind("a", JobEventKind::Deleted);
        assert_eq!(ev.seq, 1);
        assert_eq!(store.list("a").len(), 2);
        assert_eq!(store.list("b")[0].seq, 0);
        assert!(store.list("c").is_empty());
    }
}
