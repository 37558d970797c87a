use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::VaultStore;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::id;
use crate::types::{Collection, Policy, PolicyAction, PolicyEffect, Principal, Record, Subject};

/// Bundled reference backend. Suitable for embedding and tests; the
/// `VaultStore` trait is the contract for anything heavier.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn stamp(dt: Option<DateTime<Utc>>) -> String {
    format_datetime(&dt.unwrap_or_else(Utc::now))
}

/// Maps a unique-constraint violation to `Conflict`, passing other database
/// errors through.
fn conflict_on_constraint(err: rusqlite::Error, what: impl Into<String>) -> Error {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(what.into())
        }
        other => Error::Database(other),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(what: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::Value(format!("corrupt {what}: {e}")))
}

fn to_json<T: serde::Serialize>(what: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Value(format!("unencodable {what}: {e}")))
}

fn load_collection(conn: &Connection, name: &str) -> Result<Option<Collection>> {
    let row = conn
        .query_row(
            "SELECT name, id, description, fields, created_at, updated_at
             FROM collections WHERE name = ?1",
            params![name],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((name, col_id, description, fields, created_at, updated_at)) = row else {
        return Ok(None);
    };

    Ok(Some(Collection {
        id: col_id,
        name,
        description,
        fields: parse_json("collection field map", &fields)?,
        created_at: Some(parse_datetime(&created_at)),
        updated_at: Some(parse_datetime(&updated_at)),
    }))
}

fn load_policy(conn: &Connection, policy_id: &str) -> Result<Option<Policy>> {
    let row = conn
        .query_row(
            "SELECT id, name, description, effect, actions, resources, created_at, updated_at
             FROM policies WHERE id = ?1",
            params![policy_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            },
        )
        .optional()?;

    let Some((pol_id, name, description, effect, actions, resources, created_at, updated_at)) = row
    else {
        return Ok(None);
    };

    Ok(Some(Policy {
        id: pol_id,
        name,
        description,
        effect: PolicyEffect::parse(&effect)
            .ok_or_else(|| Error::Value(format!("corrupt policy effect: '{effect}'")))?,
        actions: parse_json::<Vec<PolicyAction>>("policy action list", &actions)?,
        resources: parse_json("policy resource list", &resources)?,
        created_at: Some(parse_datetime(&created_at)),
        updated_at: Some(parse_datetime(&updated_at)),
    }))
}

#[async_trait::async_trait]
impl VaultStore for SqliteStore {
    // Collection operations

    async fn create_collection(&self, col: &Collection) -> Result<()> {
        let fields = to_json("collection field map", &col.fields)?;
        self.conn()
            .execute(
                "INSERT INTO collections (name, id, description, fields, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    col.name,
                    col.id,
                    col.description,
                    fields,
                    stamp(col.created_at),
                    stamp(col.updated_at),
                ],
            )
            .map_err(|e| {
                conflict_on_constraint(e, format!("collection '{}' already exists", col.name))
            })?;
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<Option<Collection>> {
        load_collection(&self.conn(), name)
    }

    async fn get_collections(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM collections WHERE name = ?1", params![name])
            .map_err(|e| {
                conflict_on_constraint(e, format!("collection '{name}' still has records"))
            })?;
        Ok(rows > 0)
    }

    async fn has_records(&self, collection: &str) -> Result<bool> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM records WHERE collection_name = ?1)",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // Record operations

    async fn create_records(&self, collection: &str, records: &[Record]) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = format_datetime(&Utc::now());
        let mut ids = Vec::with_capacity(records.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (record_id, collection_name, field_name, value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                let record_id = id::generate(id::RECORD);
                for (field, value) in record {
                    stmt.execute(params![record_id, collection, field, value, now])?;
                }
                ids.push(record_id);
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    async fn get_records(
        &self,
        collection: &str,
        record_ids: &[String],
    ) -> Result<HashMap<String, Record>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT field_name, value FROM records
             WHERE collection_name = ?1 AND record_id = ?2",
        )?;

        let mut out = HashMap::with_capacity(record_ids.len());
        for record_id in record_ids {
            let rows = stmt.query_map(params![collection, record_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut record = Record::new();
            for row in rows {
                let (field, value) = row?;
                record.insert(field, value);
            }
            if !record.is_empty() {
                out.insert(record_id.clone(), record);
            }
        }
        Ok(out)
    }

    async fn get_records_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<String>> {
        let conn = self.conn();
        let col = load_collection(&conn, collection)?
            .ok_or_else(|| Error::NotFound(format!("collection '{collection}'")))?;

        match col.fields.get(field) {
            Some(f) if f.indexed => {}
            _ => {
                return Err(Error::Index(format!(
                    "field '{field}' is not indexed on collection '{collection}'"
                )));
            }
        }

        let mut stmt = conn.prepare(
            "SELECT DISTINCT record_id FROM records
             WHERE collection_name = ?1 AND field_name = ?2 AND value = ?3",
        )?;
        let rows = stmt.query_map(params![collection, field, value], |row| {
            row.get::<_, String>(0)
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    async fn update_record(&self, collection: &str, record_id: &str, patch: &Record) -> Result<()> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM records WHERE collection_name = ?1 AND record_id = ?2)",
            params![collection, record_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::NotFound(format!("record '{record_id}'")));
        }

        let now = format_datetime(&Utc::now());
        let mut stmt = conn.prepare(
            "INSERT INTO records (record_id, collection_name, field_name, value, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(record_id, field_name) DO UPDATE SET value = excluded.value",
        )?;
        for (field, value) in patch {
            stmt.execute(params![record_id, collection, field, value, now])?;
        }
        Ok(())
    }

    async fn delete_record(&self, collection: &str, record_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM records WHERE collection_name = ?1 AND record_id = ?2",
            params![collection, record_id],
        )?;
        Ok(rows > 0)
    }

    // Principal operations

    async fn create_principal(&self, principal: &Principal) -> Result<()> {
        let policies = to_json("principal policy list", &principal.policies)?;
        self.conn()
            .execute(
                "INSERT INTO principals
                 (access_key, id, name, access_secret, description, policies, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    principal.access_key,
                    principal.id,
                    principal.name,
                    principal.access_secret,
                    principal.description,
                    policies,
                    stamp(principal.created_at),
                    stamp(principal.updated_at),
                ],
            )
            .map_err(|e| {
                conflict_on_constraint(
                    e,
                    format!("principal '{}' already exists", principal.access_key),
                )
            })?;
        Ok(())
    }

    async fn get_principal(&self, access_key: &str) -> Result<Option<Principal>> {
        let row = self
            .conn()
            .query_row(
                "SELECT access_key, id, name, access_secret, description, policies,
                        created_at, updated_at
                 FROM principals WHERE access_key = ?1",
                params![access_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((key, prin_id, name, secret, description, policies, created_at, updated_at)) = row
        else {
            return Ok(None);
        };

        Ok(Some(Principal {
            id: prin_id,
            name,
            access_key: key,
            access_secret: secret,
            description,
            policies: parse_json("principal policy list", &policies)?,
            created_at: Some(parse_datetime(&created_at)),
            updated_at: Some(parse_datetime(&updated_at)),
        }))
    }

    async fn delete_principal(&self, access_key: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM principals WHERE access_key = ?1",
            params![access_key],
        )?;
        Ok(rows > 0)
    }

    // Policy operations

    async fn create_policy(&self, policy: &Policy) -> Result<()> {
        let actions = to_json("policy action list", &policy.actions)?;
        let resources = to_json("policy resource list", &policy.resources)?;
        self.conn()
            .execute(
                "INSERT INTO policies
                 (id, name, description, effect, actions, resources, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    policy.id,
                    policy.name,
                    policy.description,
                    policy.effect.as_str(),
                    actions,
                    resources,
                    stamp(policy.created_at),
                    stamp(policy.updated_at),
                ],
            )
            .map_err(|e| {
                conflict_on_constraint(e, format!("policy '{}' already exists", policy.id))
            })?;
        Ok(())
    }

    async fn get_policy(&self, policy_id: &str) -> Result<Option<Policy>> {
        load_policy(&self.conn(), policy_id)
    }

    async fn get_policies(&self, policy_ids: &[String]) -> Result<Vec<Policy>> {
        let conn = self.conn();
        let mut policies = Vec::with_capacity(policy_ids.len());
        for policy_id in policy_ids {
            if let Some(policy) = load_policy(&conn, policy_id)? {
                policies.push(policy);
            }
        }
        Ok(policies)
    }

    async fn delete_policy(&self, policy_id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM policies WHERE id = ?1", params![policy_id])?;
        Ok(rows > 0)
    }

    // Token operations

    async fn create_token(&self, token_id: &str, value: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO tokens (id, value, created_at) VALUES (?1, ?2, ?3)",
                params![token_id, value, format_datetime(&Utc::now())],
            )
            .map_err(|e| conflict_on_constraint(e, format!("token '{token_id}' already exists")))?;
        Ok(())
    }

    async fn get_token_value(&self, token_id: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM tokens WHERE id = ?1",
                params![token_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }

    async fn delete_token(&self, token_id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE id = ?1", params![token_id])?;
        Ok(rows > 0)
    }

    // Subject operations

    async fn create_subject(&self, subject: &Subject) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO subjects (id, eid, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    subject.id,
                    subject.eid,
                    subject.metadata,
                    stamp(subject.created_at),
                    stamp(subject.updated_at),
                ],
            )
            .map_err(|e| {
                conflict_on_constraint(e, format!("subject '{}' already exists", subject.id))
            })?;
        Ok(())
    }

    async fn get_subject(&self, subject_id: &str) -> Result<Option<Subject>> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, eid, metadata, created_at, updated_at FROM subjects WHERE id = ?1",
                params![subject_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(sub_id, eid, metadata, created_at, updated_at)| Subject {
            id: sub_id,
            eid,
            metadata,
            created_at: Some(parse_datetime(&created_at)),
            updated_at: Some(parse_datetime(&updated_at)),
        }))
    }

    async fn delete_subject(&self, subject_id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM subjects WHERE id = ?1", params![subject_id])?;
        Ok(rows > 0)
    }

    async fn flush(&self) -> Result<()> {
        self.conn().execute_batch(
            "DELETE FROM records;
             DELETE FROM collections;
             DELETE FROM principals;
             DELETE FROM policies;
             DELETE FROM tokens;
             DELETE FROM subjects;",
        )?;
        Ok(())
    }
}
