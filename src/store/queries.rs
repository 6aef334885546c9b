//! SQL query constants
//!
//! Every value reaches the database as a bind parameter, status included.

/// Schema, created if absent at startup
pub const CREATE_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        username TEXT PRIMARY KEY,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('requestor', 'manager', 'support')),
        email TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS dml_requests (
        request_id UUID PRIMARY KEY,
        requestor TEXT NOT NULL,
        dml_statement TEXT NOT NULL,
        target_db TEXT NOT NULL,
        target_schema TEXT NOT NULL,
        status TEXT NOT NULL,
        created_date TIMESTAMPTZ NOT NULL,
        manager_username TEXT,
        manager_comments TEXT,
        manager_action_date TIMESTAMPTZ,
        support_username TEXT,
        support_comments TEXT,
        support_action_date TIMESTAMPTZ,
        execution_date TIMESTAMPTZ,
        execution_result TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS db_connections (
        env_name TEXT PRIMARY KEY,
        connection_string TEXT NOT NULL,
        description TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_dml_requests_status ON dml_requests(status)",
    "CREATE INDEX IF NOT EXISTS idx_dml_requests_requestor ON dml_requests(requestor)",
    "CREATE INDEX IF NOT EXISTS idx_dml_requests_manager ON dml_requests(manager_username)",
    "CREATE INDEX IF NOT EXISTS idx_dml_requests_support ON dml_requests(support_username)",
];

macro_rules! request_columns {
    () => {
        "request_id, requestor, dml_statement, target_db, target_schema, status, \
         created_date, manager_username, manager_comments, manager_action_date, \
         support_username, support_comments, support_action_date, execution_date, execution_result"
    };
}

pub const INSERT_REQUEST: &str = r#"
    INSERT INTO dml_requests
        (request_id, requestor, dml_statement, target_db, target_schema, status, created_date)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

/// Guarded whole-record update: `$11` is the status the caller last saw
pub const UPDATE_REQUEST: &str = r#"
    UPDATE dml_requests
    SET status = $2,
        manager_username = $3, manager_comments = $4, manager_action_date = $5,
        support_username = $6, support_comments = $7, support_action_date = $8,
        execution_date = $9, execution_result = $10
    WHERE request_id = $1 AND status = $11
"#;

pub const SELECT_REQUEST_BY_ID: &str =
    concat!("SELECT ", request_columns!(), " FROM dml_requests WHERE request_id = $1");

pub const SELECT_REQUESTS_BY_STATUS: &str = concat!(
    "SELECT ",
    request_columns!(),
    " FROM dml_requests WHERE status = $1 ORDER BY created_date ASC"
);

pub const SELECT_REQUESTS_BY_REQUESTOR: &str = concat!(
    "SELECT ",
    request_columns!(),
    " FROM dml_requests WHERE requestor = $1 ORDER BY created_date DESC"
);

pub const SELECT_REQUESTS_BY_MANAGER: &str = concat!(
    "SELECT ",
    request_columns!(),
    " FROM dml_requests WHERE manager_username = $1 ORDER BY manager_action_date DESC"
);

pub const SELECT_REQUESTS_BY_SUPPORT: &str = concat!(
    "SELECT ",
    request_columns!(),
    " FROM dml_requests WHERE support_username = $1 ORDER BY support_action_date DESC"
);

pub const SELECT_USER: &str = r#"
    SELECT username, password_hash, role, email FROM users WHERE username = $1
"#;

pub const UPSERT_USER: &str = r#"
    INSERT INTO users (username, password_hash, role, email)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (username) DO UPDATE
    SET password_hash = EXCLUDED.password_hash, role = EXCLUDED.role, email = EXCLUDED.email
"#;

pub const SELECT_ENVIRONMENT: &str = r#"
    SELECT env_name, connection_string, description FROM db_connections WHERE env_name = $1
"#;

pub const LIST_ENVIRONMENTS: &str = r#"
    SELECT env_name, connection_string, description FROM db_connections ORDER BY env_name
"#;

pub const UPSERT_ENVIRONMENT: &str = r#"
    INSERT INTO db_connections (env_name, connection_string, description)
    VALUES ($1, $2, $3)
    ON CONFLICT (env_name) DO UPDATE
    SET connection_string = EXCLUDED.connection_string, description = EXCLUDED.description
"#;
