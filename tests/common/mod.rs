use std::collections::HashMap;
use std::sync::Arc;

use strongroom::crypto::AesPrivatiser;
use strongroom::store::{SqliteStore, VaultStore};
use strongroom::types::{Collection, Field, Policy, PolicyAction, PolicyEffect, Principal};
use strongroom::vault::Vault;

pub const TEST_KEY: [u8; 32] = [
    35, 46, 57, 24, 85, 35, 24, 74, 87, 35, 88, 98, 66, 32, 14, 5, 35, 46, 57, 24, 85, 35, 24, 74,
    87, 35, 88, 98, 66, 32, 14, 5,
];

fn policy(id: &str, effect: PolicyEffect, actions: &[PolicyAction], resources: &[&str]) -> Policy {
    Policy {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        effect,
        actions: actions.to_vec(),
        resources: resources.iter().map(|r| (*r).to_string()).collect(),
        created_at: None,
        updated_at: None,
    }
}

/// Fresh vault over an in-memory store, seeded with the admin and
/// customers-scoped policies the scenarios rely on.
pub async fn init_vault() -> Vault {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let store = SqliteStore::open_in_memory().expect("open in-memory store");
    store.initialize().expect("apply schema");

    store
        .create_policy(&policy(
            "admin-read",
            PolicyEffect::Allow,
            &[PolicyAction::Read],
            &["/*"],
        ))
        .await
        .expect("seed admin-read");
    store
        .create_policy(&policy(
            "admin-write",
            PolicyEffect::Allow,
            &[PolicyAction::Write],
            &["/*"],
        ))
        .await
        .expect("seed admin-write");
    store
        .create_policy(&policy(
            "read-all-customers",
            PolicyEffect::Allow,
            &[PolicyAction::Read],
            &["/collections/customers*"],
        ))
        .await
        .expect("seed read-all-customers");

    let privatiser = AesPrivatiser::new(&TEST_KEY).expect("build privatiser");
    Vault::new(Arc::new(store), Arc::new(privatiser))
}

pub fn principal(access_key: &str, policies: &[&str]) -> Principal {
    Principal {
        id: String::new(),
        name: access_key.to_string(),
        access_key: access_key.to_string(),
        access_secret: "test_password".to_string(),
        description: "test principal".to_string(),
        policies: policies.iter().map(|p| (*p).to_string()).collect(),
        created_at: None,
        updated_at: None,
    }
}

pub fn admin() -> Principal {
    principal("test_user", &["admin-read", "admin-write"])
}

pub fn collection(name: &str, fields: &[(&str, &str, bool)]) -> Collection {
    Collection {
        id: String::new(),
        name: name.to_string(),
        description: String::new(),
        fields: fields
            .iter()
            .map(|(field_name, type_name, indexed)| {
                ((*field_name).to_string(), Field {
                    type_name: (*type_name).to_string(),
                    indexed: *indexed,
                })
            })
            .collect(),
        created_at: None,
        updated_at: None,
    }
}

pub fn formats(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(field, format)| ((*field).to_string(), (*format).to_string()))
        .collect()
}

pub fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(field, value)| ((*field).to_string(), (*value).to_string()))
        .collect()
}
