use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PolicyAction, PolicyEffect};

/// A schema slot within a collection: a primitive type name and whether the
/// storage layer maintains an exact-match index for the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub indexed: bool,
}

/// A named schema. Immutable after creation apart from `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: HashMap<String, Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A stored record: field name to value. Values are plaintext at the vault
/// boundary and ciphertext at rest.
pub type Record = HashMap<String, String>;

/// An authenticated caller. The access secret holds the caller-supplied
/// plaintext on create and the argon2id hash at rest; it is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub access_key: String,
    #[serde(default, skip_serializing)]
    pub access_secret: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An allow/deny rule over a set of actions and resource patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub effect: PolicyEffect,
    pub actions: Vec<PolicyAction>,
    pub resources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A data-subject reference: the human whose PII is stored. Subjects are
/// identity anchors only; the core does not link them to records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default)]
    pub id: String,
    pub eid: String,
    #[serde(default)]
    pub metadata: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
