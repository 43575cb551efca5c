use uuid::Uuid;
use wayfarer_core::{RequestStatus, StatusHistoryEntry, StoreError, StoreResult};

use crate::gateway::StoreGateway;

/// Append-only status ledger. Exposes no update or delete.
#[derive(Clone)]
pub struct AuditTrail {
    store: StoreGateway,
}

impl AuditTrail {
    pub fn new(store: StoreGateway) -> Self {
        Self { store }
    }

    /// Append one entry. `from` is `None` only for the creation event.
    ///
    /// A request enters each status once; if the entry is already there it is
    /// returned instead.
    pub async fn record(
        &self,
        request_id: Uuid,
        from: Option<RequestStatus>,
        to: RequestStatus,
        actor_id: Option<Uuid>,
        note: Option<String>,
    ) -> StoreResult<StatusHistoryEntry> {
        let entry = StatusHistoryEntry::new(request_id, from, to, actor_id, note);
        match self
            .store
            .write("append_history", |s| s.append_history(&entry))
            .await
        {
            Ok(()) => Ok(entry),
            Err(StoreError::Duplicate(_)) => self.entry_into(request_id, to).await?.ok_or_else(|| {
                StoreError::Backend(format!(
                    "history entry for request {} into {} reported as duplicate but not found",
                    request_id, to
                ))
            }),
            Err(err) => Err(err),
        }
    }

    /// The entry that moved the request into `to`, if one was written.
    pub async fn entry_into(&self, request_id: Uuid, to: RequestStatus) -> StoreResult<Option<StatusHistoryEntry>> {
        Ok(self
            .list(request_id)
            .await?
            .into_iter()
            .find(|e| e.to_status.same_as(to)))
    }

    /// Newest first.
    pub async fn list(&self, request_id: Uuid) -> StoreResult<Vec<StatusHistoryEntry>> {
        self.store
            .read("list_history", |s| s.list_history(request_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use wayfarer_core::InMemoryRequestStore;

    #[tokio::test]
    async fn test_record_and_list() {
        let gateway = StoreGateway::new(
            Arc::new(InMemoryRequestStore::new()),
            Duration::from_secs(1),
            0,
        );
        let audit = AuditTrail::new(gateway);
        let request_id = Uuid::new_v4();
        let admin = Uuid::new_v4();

        audit
            .record(request_id, None, RequestStatus::Pending, Some(admin), None)
            .await
            .unwrap();
        audit
            .record(
                request_id,
                Some(RequestStatus::Pending),
                RequestStatus::Processing,
                Some(admin),
                Some("picked up".to_string()),
            )
            .await
            .unwrap();

        let entries = audit.list(request_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].from_status, Some(RequestStatus::Pending));
        assert_eq!(entries[0].note.as_deref(), Some("picked up"));
        assert!(entries[1].is_creation());
    }
    #[tokio::test]
    async fn test_record_twice_returns_first_entry() {
        let store = InMemoryRequestStore::new();
        let audit = AuditTrail::new(StoreGateway::new(Arc::new(store), Duration::from_secs(1), 0));
        let request_id = Uuid::new_v4();

        let first = audit
            .record(
                request_id,
                Some(RequestStatus::Processing),
                RequestStatus::Confirmed,
                None,
                None,
            )
            .await
            .unwrap();
        let second = audit
            .record(
                request_id,
                Some(RequestStatus::Processing),
                RequestStatus::Confirmed,
                None,
                Some("retried".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(audit.list(request_id).await.unwrap().len(), 1);
    }
}
