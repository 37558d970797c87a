use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::task;

use crate::auth::SecretHasher;
use crate::crypto::Privatiser;
use crate::error::{Error, Result};
use crate::id;
use crate::ptypes;
use crate::store::VaultStore;
use crate::types::{
    Collection, Policy, PolicyAction, Principal, Record, Request, Subject, evaluate,
};
use crate::validate;

const COLLECTIONS_PATH: &str = "/collections";
const PRINCIPALS_PATH: &str = "/principals";
const RECORDS_PATH: &str = "/records";
const POLICIES_PATH: &str = "/policies";
const SUBJECTS_PATH: &str = "/subjects";

/// The vault orchestrator: every public operation authorizes first, then
/// validates, type-checks, encrypts, and persists in that order. Holds no
/// cross-request state beyond the shared capabilities.
#[derive(Clone)]
pub struct Vault {
    store: Arc<dyn VaultStore>,
    privatiser: Arc<dyn Privatiser>,
    hasher: Arc<SecretHasher>,
}

impl Vault {
    pub fn new(store: Arc<dyn VaultStore>, privatiser: Arc<dyn Privatiser>) -> Self {
        Self {
            store,
            privatiser,
            hasher: Arc::new(SecretHasher::new()),
        }
    }

    fn forbidden(request: &Request) -> Error {
        tracing::debug!(
            principal = %request.actor.access_key,
            action = %request.action,
            resource = %request.resource,
            "request denied"
        );
        Error::Forbidden {
            principal: request.actor.access_key.clone(),
            action: request.action,
            resource: request.resource.clone(),
        }
    }

    /// Fetches the actor's live policies and evaluates the request. Policy
    /// fetch failures propagate as errors, never as a deny.
    async fn authorize(
        &self,
        actor: &Principal,
        action: PolicyAction,
        resource: String,
    ) -> Result<()> {
        let policies = self.store.get_policies(&actor.policies).await?;
        let request = Request {
            actor: actor.clone(),
            action,
            resource,
        };
        if evaluate(&request, &policies) {
            Ok(())
        } else {
            Err(Self::forbidden(&request))
        }
    }

    // Collections

    pub async fn create_collection(
        &self,
        actor: &Principal,
        mut col: Collection,
    ) -> Result<Collection> {
        self.authorize(actor, PolicyAction::Write, COLLECTIONS_PATH.to_string())
            .await?;
        validate::validate_collection(&col)?;

        col.id = id::generate(id::COLLECTION);
        let now = Utc::now();
        col.created_at = Some(now);
        col.updated_at = Some(now);

        self.store.create_collection(&col).await?;
        tracing::info!(collection = %col.name, "created collection");
        Ok(col)
    }

    pub async fn get_collection(&self, actor: &Principal, name: &str) -> Result<Collection> {
        self.authorize(
            actor,
            PolicyAction::Read,
            format!("{COLLECTIONS_PATH}/{name}"),
        )
        .await?;

        self.store
            .get_collection(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("collection '{name}'")))
    }

    pub async fn get_collections(&self, actor: &Principal) -> Result<Vec<String>> {
        self.authorize(actor, PolicyAction::Read, COLLECTIONS_PATH.to_string())
            .await?;
        self.store.get_collections().await
    }

    /// Deletes an empty collection. Deletion does not cascade: while records
    /// remain the call fails with `Conflict`.
    pub async fn delete_collection(&self, actor: &Principal, name: &str) -> Result<()> {
        self.authorize(
            actor,
            PolicyAction::Write,
            format!("{COLLECTIONS_PATH}/{name}"),
        )
        .await?;

        if self.store.has_records(name).await? {
            return Err(Error::Conflict(format!(
                "collection '{name}' still has records"
            )));
        }
        if !self.store.delete_collection(name).await? {
            return Err(Error::NotFound(format!("collection '{name}'")));
        }
        Ok(())
    }

    // Records

    pub async fn create_records(
        &self,
        actor: &Principal,
        collection_name: &str,
        records: &[Record],
    ) -> Result<Vec<String>> {
        self.authorize(
            actor,
            PolicyAction::Write,
            format!("{COLLECTIONS_PATH}/{collection_name}{RECORDS_PATH}"),
        )
        .await?;

        let collection = self
            .store
            .get_collection(collection_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("collection '{collection_name}'")))?;

        let mut encrypted_records = Vec::with_capacity(records.len());
        for record in records {
            let mut encrypted = Record::with_capacity(record.len());
            for (field_name, value) in record {
                let field = collection.fields.get(field_name).ok_or_else(|| {
                    Error::Value(format!(
                        "field '{field_name}' not found on collection '{collection_name}'"
                    ))
                })?;
                ptypes::parse(&field.type_name, value)?;
                encrypted.insert(field_name.clone(), self.privatiser.encrypt(value)?);
            }
            encrypted_records.push(encrypted);
        }

        self.store
            .create_records(collection_name, &encrypted_records)
            .await
    }

    /// Reads records with each requested field rendered in its requested
    /// projection. Authorization is checked per (record, field, projection)
    /// tuple before anything is read from storage.
    pub async fn get_records(
        &self,
        actor: &Principal,
        collection_name: &str,
        record_ids: &[String],
        formats: &HashMap<String, String>,
    ) -> Result<HashMap<String, Record>> {
        if record_ids.is_empty() {
            return Err(Error::Value("record_ids must not be empty".to_string()));
        }

        let policies = self.store.get_policies(&actor.policies).await?;
        for record_id in record_ids {
            for (field, format) in formats {
                let request = Request {
                    actor: actor.clone(),
                    action: PolicyAction::Read,
                    resource: format!(
                        "{COLLECTIONS_PATH}/{collection_name}{RECORDS_PATH}/{record_id}/{field}.{format}"
                    ),
                };
                if !evaluate(&request, &policies) {
                    return Err(Self::forbidden(&request));
                }
            }
        }

        let collection = self
            .store
            .get_collection(collection_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("collection '{collection_name}'")))?;
        for field in formats.keys() {
            if !collection.fields.contains_key(field) {
                return Err(Error::NotFound(format!(
                    "field '{field}' not found on collection '{collection_name}'"
                )));
            }
        }

        let encrypted_records = self
            .store
            .get_records(collection_name, record_ids)
            .await?;
        for record_id in record_ids {
            if !encrypted_records.contains_key(record_id) {
                return Err(Error::NotFound(format!("record '{record_id}'")));
            }
        }

        let mut records = HashMap::with_capacity(encrypted_records.len());
        for (record_id, encrypted) in encrypted_records {
            let mut record = Record::with_capacity(formats.len());
            for (field, format) in formats {
                // Sparse records may not hold every declared field.
                let Some(ciphertext) = encrypted.get(field) else {
                    continue;
                };
                let plaintext = self.privatiser.decrypt(ciphertext)?;
                let value = ptypes::parse(&collection.fields[field].type_name, &plaintext)?;
                record.insert(field.clone(), value.render(format)?);
            }
            records.insert(record_id, record);
        }
        Ok(records)
    }

    /// Exact-match lookup on an indexed field. The probe value is encrypted
    /// under the storage key so the index never sees plaintext.
    pub async fn get_records_filter(
        &self,
        actor: &Principal,
        collection_name: &str,
        field_name: &str,
        value: &str,
        formats: &HashMap<String, String>,
    ) -> Result<HashMap<String, Record>> {
        let encrypted_value = self.privatiser.encrypt(value)?;
        let record_ids = self
            .store
            .get_records_by_field(collection_name, field_name, &encrypted_value)
            .await?;

        self.get_records(actor, collection_name, &record_ids, formats)
            .await
    }

    pub async fn update_record(
        &self,
        actor: &Principal,
        collection_name: &str,
        record_id: &str,
        record: &Record,
    ) -> Result<()> {
        self.authorize(
            actor,
            PolicyAction::Write,
            format!("{COLLECTIONS_PATH}/{collection_name}{RECORDS_PATH}"),
        )
        .await?;

        let collection = self
            .store
            .get_collection(collection_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("collection '{collection_name}'")))?;

        let mut encrypted = Record::with_capacity(record.len());
        for (field_name, value) in record {
            let field = collection.fields.get(field_name).ok_or_else(|| {
                Error::Value(format!(
                    "field '{field_name}' not found on collection '{collection_name}'"
                ))
            })?;
            ptypes::parse(&field.type_name, value)?;
            encrypted.insert(field_name.clone(), self.privatiser.encrypt(value)?);
        }

        self.store
            .update_record(collection_name, record_id, &encrypted)
            .await
    }

    pub async fn delete_record(
        &self,
        actor: &Principal,
        collection_name: &str,
        record_id: &str,
    ) -> Result<()> {
        self.authorize(
            actor,
            PolicyAction::Write,
            format!("{COLLECTIONS_PATH}/{collection_name}{RECORDS_PATH}"),
        )
        .await?;

        if !self.store.delete_record(collection_name, record_id).await? {
            return Err(Error::NotFound(format!("record '{record_id}'")));
        }
        Ok(())
    }

    // Principals

    pub async fn create_principal(
        &self,
        actor: &Principal,
        mut principal: Principal,
    ) -> Result<Principal> {
        self.authorize(actor, PolicyAction::Write, PRINCIPALS_PATH.to_string())
            .await?;
        validate::validate_principal(&principal)?;

        let hasher = self.hasher.clone();
        let secret = std::mem::take(&mut principal.access_secret);
        principal.access_secret = task::spawn_blocking(move || hasher.hash(&secret)).await??;

        principal.id = id::generate(id::PRINCIPAL);
        let now = Utc::now();
        principal.created_at = Some(now);
        principal.updated_at = Some(now);

        self.store.create_principal(&principal).await?;
        tracing::info!(access_key = %principal.access_key, "created principal");

        principal.access_secret = String::new();
        Ok(principal)
    }

    pub async fn get_principal(&self, actor: &Principal, access_key: &str) -> Result<Principal> {
        self.authorize(
            actor,
            PolicyAction::Read,
            format!("{PRINCIPALS_PATH}/{access_key}"),
        )
        .await?;

        let mut principal = self
            .store
            .get_principal(access_key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("principal '{access_key}'")))?;
        principal.access_secret = String::new();
        Ok(principal)
    }

    pub async fn delete_principal(&self, actor: &Principal, access_key: &str) -> Result<()> {
        self.authorize(
            actor,
            PolicyAction::Write,
            format!("{PRINCIPALS_PATH}/{access_key}"),
        )
        .await?;

        if !self.store.delete_principal(access_key).await? {
            return Err(Error::NotFound(format!("principal '{access_key}'")));
        }
        Ok(())
    }

    /// Authenticates by access key and secret. Not policy-gated. Every
    /// failure path returns the same `Forbidden` so callers cannot tell a
    /// missing principal from a bad secret.
    pub async fn login(&self, access_key: &str, access_secret: &str) -> Result<Principal> {
        let deny = || Error::Forbidden {
            principal: access_key.to_string(),
            action: PolicyAction::Read,
            resource: PRINCIPALS_PATH.to_string(),
        };

        if access_key.is_empty() || access_secret.is_empty() {
            return Err(deny());
        }

        let mut principal = match self.store.get_principal(access_key).await {
            Ok(Some(principal)) if !principal.access_secret.is_empty() => principal,
            Ok(_) => return Err(deny()),
            Err(e) => {
                tracing::error!(error = %e, "principal lookup failed during login");
                return Err(deny());
            }
        };

        let hasher = self.hasher.clone();
        let stored_hash = principal.access_secret.clone();
        let secret = access_secret.to_string();
        let verified = task::spawn_blocking(move || hasher.verify(&secret, &stored_hash))
            .await?
            .unwrap_or(false);
        if !verified {
            tracing::warn!(access_key = %access_key, "failed login attempt");
            return Err(deny());
        }

        principal.access_secret = String::new();
        Ok(principal)
    }

    // Policies

    pub async fn create_policy(&self, actor: &Principal, mut policy: Policy) -> Result<Policy> {
        self.authorize(actor, PolicyAction::Write, POLICIES_PATH.to_string())
            .await?;

        for resource in &policy.resources {
            if !resource.starts_with('/') {
                return Err(Error::Value(format!(
                    "resources must start with a slash - '{resource}' is not a valid resource"
                )));
            }
        }
        validate::validate_policy(&policy)?;

        if policy.id.is_empty() {
            policy.id = id::generate(id::POLICY);
        }
        let now = Utc::now();
        policy.created_at = Some(now);
        policy.updated_at = Some(now);

        self.store.create_policy(&policy).await?;
        Ok(policy)
    }

    pub async fn get_policy(&self, actor: &Principal, policy_id: &str) -> Result<Policy> {
        self.authorize(
            actor,
            PolicyAction::Read,
            format!("{POLICIES_PATH}/{policy_id}"),
        )
        .await?;

        self.store
            .get_policy(policy_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("policy '{policy_id}'")))
    }

    pub async fn delete_policy(&self, actor: &Principal, policy_id: &str) -> Result<()> {
        self.authorize(
            actor,
            PolicyAction::Write,
            format!("{POLICIES_PATH}/{policy_id}"),
        )
        .await?;

        if !self.store.delete_policy(policy_id).await? {
            return Err(Error::NotFound(format!("policy '{policy_id}'")));
        }
        Ok(())
    }

    /// Returns the policies attached to the actor itself.
    pub async fn get_principal_policies(&self, actor: &Principal) -> Result<Vec<Policy>> {
        self.authorize(actor, PolicyAction::Read, POLICIES_PATH.to_string())
            .await?;
        self.store.get_policies(&actor.policies).await
    }

    // Tokens

    /// Mints a surrogate id for one projected field of one record. The
    /// underlying read is authorized and performed first, so a token can
    /// only be created for a value the actor could read directly.
    pub async fn create_token(
        &self,
        actor: &Principal,
        collection_name: &str,
        record_id: &str,
        field_name: &str,
        format: &str,
    ) -> Result<String> {
        let record_ids = vec![record_id.to_string()];
        let formats = HashMap::from([(field_name.to_string(), format.to_string())]);
        self.get_records(actor, collection_name, &record_ids, &formats)
            .await?;

        let token_id = id::generate(id::TOKEN);
        self.store
            .create_token(
                &token_id,
                &format!("{collection_name}/{record_id}/{field_name}/{format}"),
            )
            .await?;
        Ok(token_id)
    }

    /// Resolves a token to its projected field value. The actor's live
    /// policies are evaluated now, not at token-creation time.
    pub async fn get_token_value(&self, actor: &Principal, token_id: &str) -> Result<Record> {
        let value = self
            .store
            .get_token_value(token_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("token '{token_id}'")))?;

        let parts: Vec<&str> = value.split('/').collect();
        let &[collection_name, record_id, field_name, format] = parts.as_slice() else {
            return Err(Error::Value(format!(
                "invalid token value stored in token '{token_id}'"
            )));
        };

        let record_ids = vec![record_id.to_string()];
        let formats = HashMap::from([(field_name.to_string(), format.to_string())]);
        let mut records = self
            .get_records(actor, collection_name, &record_ids, &formats)
            .await?;
        records
            .remove(record_id)
            .ok_or_else(|| Error::NotFound(format!("record '{record_id}'")))
    }

    /// Deletes a token. Not policy-gated: possession of the token id is the
    /// capability.
    pub async fn delete_token(&self, token_id: &str) -> Result<()> {
        if !self.store.delete_token(token_id).await? {
            return Err(Error::NotFound(format!("token '{token_id}'")));
        }
        Ok(())
    }

    // Subjects

    pub async fn create_subject(&self, actor: &Principal, mut subject: Subject) -> Result<Subject> {
        self.authorize(actor, PolicyAction::Write, SUBJECTS_PATH.to_string())
            .await?;
        validate::validate_subject(&subject)?;

        subject.id = id::generate(id::SUBJECT);
        let now = Utc::now();
        subject.created_at = Some(now);
        subject.updated_at = Some(now);

        self.store.create_subject(&subject).await?;
        Ok(subject)
    }

    pub async fn get_subject(&self, actor: &Principal, subject_id: &str) -> Result<Subject> {
        self.authorize(
            actor,
            PolicyAction::Read,
            format!("{SUBJECTS_PATH}/{subject_id}"),
        )
        .await?;

        self.store
            .get_subject(subject_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("subject '{subject_id}'")))
    }

    pub async fn delete_subject(&self, actor: &Principal, subject_id: &str) -> Result<()> {
        self.authorize(
            actor,
            PolicyAction::Write,
            format!("{SUBJECTS_PATH}/{subject_id}"),
        )
        .await?;

        if !self.store.delete_subject(subject_id).await? {
            return Err(Error::NotFound(format!("subject '{subject_id}'")));
        }
        Ok(())
    }
}
