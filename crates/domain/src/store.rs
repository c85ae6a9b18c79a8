use async_trait::async_trait;

use crate::{NewSubject, ProvisioningSubject, Result, SubjectId, SubjectStatus};

/// Storage for provisioning subjects.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SubjectStore: Send + Sync {
    /// Creates a subject and returns it with its assigned ID.
    async fn create(&self, subject: NewSubject) -> Result<ProvisioningSubject>;

    /// Loads a subject, failing with `NotFound` if it does not exist.
    async fn get(&self, id: SubjectId) -> Result<ProvisioningSubject>;

    /// Moves a subject to `status`.
    ///
    /// The transition is checked against the subject's status at the time of
    /// the write, so a concurrent change cannot be overwritten.
    async fn update_status(&self, id: SubjectId, status: SubjectStatus)
    -> Result<ProvisioningSubject>;

    /// Records the registrar order that was placed for the subject.
    async fn set_provider_order(
        &self,
        id: SubjectId,
        provider_name: &str,
        provider_order_id: &str,
    ) -> Result<()>;

    /// Lists subjects in a status, oldest first, starting after the id
    /// `after` when given.
    async fn list_by_status(
        &self,
        status: SubjectStatus,
        after: Option<SubjectId>,
        limit: usize,
    ) -> Result<Vec<ProvisioningSubject>>;

    /// Returns the lineage rooted at `root`: the root followed by its retries
    /// in creation order.
    async fn lineage(&self, root: SubjectId) -> Result<Vec<ProvisioningSubject>>;
}
