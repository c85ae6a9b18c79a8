use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    NewSubject, ProvisioningSubject, Result, SubjectError, SubjectId, SubjectStatus,
    store::SubjectStore,
};

#[derive(Debug, Default)]
struct StoreState {
    subjects: BTreeMap<SubjectId, ProvisioningSubject>,
    next_id: i64,
    unavailable: bool,
}

impl StoreState {
    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(SubjectError::Unavailable(
                "in-memory subject store offline".to_string(),
            ));
        }
        Ok(())
    }
}

/// In-memory subject store for testing.
#[derive(Clone, Default)]
pub struct InMemorySubjectStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemorySubjectStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully formed subject, keeping its ID.
    ///
    /// Later `create` calls are assigned IDs above the highest inserted one.
    pub async fn insert(&self, subject: ProvisioningSubject) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(subject.id.as_i64());
        state.subjects.insert(subject.id, subject);
    }

    /// Makes every operation fail as if the store were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl SubjectStore for InMemorySubjectStore {
    async fn create(&self, subject: NewSubject) -> Result<ProvisioningSubject> {
        let mut state = self.state.write().await;
        state.check_available()?;

        state.next_id += 1;
        let now = Utc::now();
        let created = ProvisioningSubject {
            id: SubjectId::new(state.next_id),
            client_id: subject.client_id,
            service_id: subject.service_id,
            name: subject.name,
            operation_type: subject.operation_type,
            status: subject.status,
            provider_name: None,
            provider_order_id: None,
            auth_code: subject.auth_code,
            retry_of: subject.retry_of,
            created_at: now,
            updated_at: now,
        };
        state.subjects.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: SubjectId) -> Result<ProvisioningSubject> {
        let state = self.state.read().await;
        state.check_available()?;
        state
            .subjects
            .get(&id)
            .cloned()
            .ok_or(SubjectError::NotFound(id))
    }

    async fn update_status(
        &self,
        id: SubjectId,
        status: SubjectStatus,
    ) -> Result<ProvisioningSubject> {
        let mut state = self.state.write().await;
        state.check_available()?;

        let subject = state
            .subjects
            .get_mut(&id)
            .ok_or(SubjectError::NotFound(id))?;
        if !subject.status.can_transition_to(status) {
            return Err(SubjectError::InvalidTransition {
                subject_id: id,
                from: subject.status,
                to: status,
            });
        }
        subject.status = status;
        subject.updated_at = Utc::now();
        Ok(subject.clone())
    }

    async fn set_provider_order(
        &self,
        id: SubjectId,
        provider_name: &str,
        provider_order_id: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_available()?;

        let subject = state
            .subjects
            .get_mut(&id)
            .ok_or(SubjectError::NotFound(id))?;
        subject.provider_name = Some(provider_name.to_string());
        subject.provider_order_id = Some(provider_order_id.to_string());
        subject.updated_at = Utc::now();
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: SubjectStatus,
        after: Option<SubjectId>,
        limit: usize,
    ) -> Result<Vec<ProvisioningSubject>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state
            .subjects
            .values()
            .filter(|s| s.status == status && after.is_none_or(|after| s.id > after))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn lineage(&self, root: SubjectId) -> Result<Vec<ProvisioningSubject>> {
        let state = self.state.read().await;
        state.check_available()?;
        Ok(state
            .subjects
            .values()
            .filter(|s| s.id == root || s.retry_of == Some(root))
            .cloned()
            .collect())
    }
}
