pub const SCHEMA: &str = r#"
-- Collections are named schemas; the field map is JSON: name -> {type, indexed}
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    id TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    fields TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- One row per stored field; value is ciphertext
CREATE TABLE IF NOT EXISTS records (
    record_id TEXT NOT NULL,
    collection_name TEXT NOT NULL REFERENCES collections(name),
    field_name TEXT NOT NULL,
    value TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (record_id, field_name)
);

CREATE TABLE IF NOT EXISTS principals (
    access_key TEXT PRIMARY KEY,
    id TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    access_secret TEXT NOT NULL,  -- argon2id PHC string
    description TEXT NOT NULL DEFAULT '',
    policies TEXT NOT NULL,       -- JSON array of policy ids
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS policies (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    effect TEXT NOT NULL,
    actions TEXT NOT NULL,        -- JSON array
    resources TEXT NOT NULL,      -- JSON array
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- A token's value is the collection/record/field/format tuple string
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    id TEXT PRIMARY KEY,
    eid TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection_name);
CREATE INDEX IF NOT EXISTS idx_records_lookup ON records(collection_name, field_name, value);
"#;
