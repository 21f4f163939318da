//! Database constants and migration metadata

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Migration descriptions
pub const MIGRATION_DESCRIPTIONS: &[&str] =
    &["Initial schema: lotteries, users, ballots, winners"];

/// Default database file name
pub const DEFAULT_DB_PATH: &str = "lottery.db";
