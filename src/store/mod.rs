mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Collection, Policy, Principal, Record, Subject};

/// VaultStore defines the storage interface.
///
/// Record values cross this boundary as ciphertext; the store never sees
/// plaintext. Lookups report misses as `Ok(None)` (or `false` for deletes)
/// and reserve errors for genuine failures, except `get_records_by_field`,
/// which returns `Error::Index` when the field is not declared indexed.
#[async_trait]
pub trait VaultStore: Send + Sync {
    // Collection operations
    async fn create_collection(&self, col: &Collection) -> Result<()>;
    async fn get_collection(&self, name: &str) -> Result<Option<Collection>>;
    async fn get_collections(&self) -> Result<Vec<String>>;
    async fn delete_collection(&self, name: &str) -> Result<bool>;
    async fn has_records(&self, collection: &str) -> Result<bool>;

    // Record operations
    async fn create_records(&self, collection: &str, records: &[Record]) -> Result<Vec<String>>;
    async fn get_records(
        &self,
        collection: &str,
        record_ids: &[String],
    ) -> Result<HashMap<String, Record>>;
    async fn get_records_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<String>>;
    async fn update_record(&self, collection: &str, record_id: &str, patch: &Record) -> Result<()>;
    async fn delete_record(&self, collection: &str, record_id: &str) -> Result<bool>;

    // Principal operations (keyed by access key)
    async fn create_principal(&self, principal: &Principal) -> Result<()>;
    async fn get_principal(&self, access_key: &str) -> Result<Option<Principal>>;
    async fn delete_principal(&self, access_key: &str) -> Result<bool>;

    // Policy operations
    async fn create_policy(&self, policy: &Policy) -> Result<()>;
    async fn get_policy(&self, policy_id: &str) -> Result<Option<Policy>>;
    /// Returns the policies that exist, silently omitting dangling ids.
    async fn get_policies(&self, policy_ids: &[String]) -> Result<Vec<Policy>>;
    async fn delete_policy(&self, policy_id: &str) -> Result<bool>;

    // Token operations
    async fn create_token(&self, token_id: &str, value: &str) -> Result<()>;
    async fn get_token_value(&self, token_id: &str) -> Result<Option<String>>;
    async fn delete_token(&self, token_id: &str) -> Result<bool>;

    // Subject operations
    async fn create_subject(&self, subject: &Subject) -> Result<()>;
    async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>>;
    async fn delete_subject(&self, subject_id: &str) -> Result<bool>;

    /// Removes all stored data. Test affordance only.
    async fn flush(&self) -> Result<()>;
}
