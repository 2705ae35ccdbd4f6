//! Database schema definition.

/// Initial schema (version 1).
pub const SCHEMA_V1: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Telephony backends devices register against
CREATE TABLE IF NOT EXISTS pabxes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    host TEXT NOT NULL,
    port INTEGER NOT NULL DEFAULT 5060,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Hardware classes, matched by the model string phones report
CREATE TABLE IF NOT EXISTS device_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    model TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Provisionable phones; mac is stored stripped-uppercase
CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    mac TEXT NOT NULL UNIQUE,
    device_type_id INTEGER REFERENCES device_types(id) ON DELETE SET NULL,
    model TEXT,
    pabx_id INTEGER REFERENCES pabxes(id) ON DELETE SET NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Editable config templates
CREATE TABLE IF NOT EXISTS templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Per-template variable declarations; options is a JSON array
CREATE TABLE IF NOT EXISTS template_variables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    var_type TEXT NOT NULL DEFAULT 'text',
    default_value TEXT,
    required BOOLEAN NOT NULL DEFAULT FALSE,
    validation_regex TEXT,
    min_value REAL,
    max_value REAL,
    options TEXT,
    parent_id INTEGER REFERENCES template_variables(id) ON DELETE SET NULL,
    visible_when TEXT,
    UNIQUE (template_id, name)
);

-- Global operator-managed variables
CREATE TABLE IF NOT EXISTS variables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    value TEXT NOT NULL,
    description TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Immutable config snapshots, numbered per (pabx, device type) scope
CREATE TABLE IF NOT EXISTS config_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pabx_id INTEGER NOT NULL REFERENCES pabxes(id),
    device_type_id INTEGER NOT NULL REFERENCES device_types(id),
    version_number INTEGER NOT NULL,
    content TEXT NOT NULL,
    changelog TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (pabx_id, device_type_id, version_number)
);

-- Device <-> version links; at most one active per device
CREATE TABLE IF NOT EXISTS device_config_assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
    config_version_id INTEGER NOT NULL REFERENCES config_versions(id) ON DELETE CASCADE,
    is_active BOOLEAN NOT NULL DEFAULT FALSE,
    assigned_at TEXT NOT NULL DEFAULT (datetime('now')),
    assigned_by TEXT NOT NULL,
    UNIQUE (device_id, config_version_id)
);

-- Append-only activation ledger. No foreign key on version ids: rows
-- must survive retention cleanup of the versions they mention
CREATE TABLE IF NOT EXISTS config_version_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
    config_version_id INTEGER NOT NULL,
    activated_at TEXT NOT NULL DEFAULT (datetime('now')),
    activated_by TEXT NOT NULL,
    deactivated_at TEXT,
    duration_secs INTEGER
);

-- One row per find/replace run
CREATE TABLE IF NOT EXISTS bulk_operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    search_term TEXT NOT NULL,
    replace_term TEXT NOT NULL,
    executed_by TEXT NOT NULL,
    executed_at TEXT NOT NULL DEFAULT (datetime('now')),
    affected_count INTEGER NOT NULL DEFAULT 0,
    rolled_back_at TEXT,
    rolled_back_by TEXT
);

-- Per-device reversal data; version ids unconstrained, as in history
CREATE TABLE IF NOT EXISTS bulk_operation_details (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation_id INTEGER NOT NULL REFERENCES bulk_operations(id) ON DELETE CASCADE,
    device_id INTEGER NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
    old_version_id INTEGER NOT NULL,
    new_version_id INTEGER NOT NULL,
    match_count INTEGER NOT NULL DEFAULT 0
);

-- One row per distinct (mac, filename) pair seen by provisioning
CREATE TABLE IF NOT EXISTS provision_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mac TEXT NOT NULL,
    filename TEXT NOT NULL,
    attempt_count INTEGER NOT NULL DEFAULT 1,
    first_seen_at TEXT NOT NULL DEFAULT (datetime('now')),
    last_seen_at TEXT NOT NULL DEFAULT (datetime('now')),
    last_status TEXT NOT NULL,
    last_model TEXT,
    UNIQUE (mac, filename)
);

-- Single-use download capabilities
CREATE TABLE IF NOT EXISTS download_tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token TEXT NOT NULL UNIQUE,
    config_version_id INTEGER NOT NULL REFERENCES config_versions(id) ON DELETE CASCADE,
    mac TEXT,
    device_model TEXT,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    expires_at TEXT NOT NULL,
    used_at TEXT
);

-- Audit trail for mutating operator actions
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor TEXT NOT NULL,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id INTEGER,
    detail TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Indexes
CREATE UNIQUE INDEX IF NOT EXISTS ux_assignments_active
    ON device_config_assignments(device_id) WHERE is_active = 1;
CREATE INDEX IF NOT EXISTS idx_versions_scope
    ON config_versions(pabx_id, device_type_id, version_number);
CREATE INDEX IF NOT EXISTS idx_history_device
    ON config_version_history(device_id, activated_at);
CREATE INDEX IF NOT EXISTS idx_attempts_last_seen
    ON provision_attempts(last_seen_at);
CREATE INDEX IF NOT EXISTS idx_tokens_expires
    ON download_tokens(expires_at);
CREATE INDEX IF NOT EXISTS idx_audit_created
    ON audit_log(created_at);
"#;
