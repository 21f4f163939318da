//! SQL statement constants for database operations

pub const CREATE_MIGRATIONS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL,
    description TEXT NOT NULL
)
"#;

pub const CREATE_LOTTERIES_TABLE_SQL: &str = r#"
CREATE TABLE lotteries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    due_date TEXT NOT NULL, -- YYYY-MM-DD, inclusive close
    created_at TEXT NOT NULL
)
"#;

pub const CREATE_USERS_TABLE_SQL: &str = r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
)
"#;

pub const CREATE_BALLOTS_TABLE_SQL: &str = r#"
CREATE TABLE ballots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lottery_id INTEGER NOT NULL REFERENCES lotteries(id),
    user_id INTEGER REFERENCES users(id),
    submission_date TEXT NOT NULL -- YYYY-MM-DD
)
"#;

pub const CREATE_WINNERS_TABLE_SQL: &str = r#"
CREATE TABLE winners (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lottery_id INTEGER NOT NULL REFERENCES lotteries(id),
    lottery_name TEXT NOT NULL,
    user_name TEXT NOT NULL,
    ballot_id INTEGER NOT NULL REFERENCES ballots(id),
    selection_date TEXT NOT NULL, -- YYYY-MM-DD
    UNIQUE (lottery_id, selection_date)
)
"#;

pub const CREATE_DB_INDEXES: &[&str] = &[
    "CREATE INDEX idx_ballots_lottery_date ON ballots(lottery_id, submission_date)",
    "CREATE INDEX idx_lotteries_due_date ON lotteries(due_date)",
    "CREATE INDEX idx_winners_selection_date ON winners(selection_date)",
];
