use async_trait::async_trait;

use crate::domain::AuthorizationRecord;

/// Persistence contract for authorization records.
///
/// Storage itself is an external collaborator; the core only drives the
/// read-modify-write sequence and never manages transactions.
#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    /// Fetch the record for a user/scheme pair, if one exists.
    async fn find(&self, user_id: &str, scheme: &str)
        -> anyhow::Result<Option<AuthorizationRecord>>;

    /// Fetch the record, creating an empty one on first touch.
    async fn find_or_create(
        &self,
        user_id: &str,
        scheme: &str,
    ) -> anyhow::Result<AuthorizationRecord>;

    /// Persist the record's current metadata and grant timestamp.
    async fn save(&self, record: &AuthorizationRecord) -> anyhow::Result<()>;
}
