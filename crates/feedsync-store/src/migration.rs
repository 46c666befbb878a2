//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration is a SQL batch that
//! transforms the schema from version N to N+1.

use rusqlite::Connection;
use tracing::debug;

use feedsync_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            debug!(version, "applying schema migration");
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: chain record, device cache, feeds and items.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- The single sync chain record
        CREATE TABLE sync_remote (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            relay_url TEXT NOT NULL,
            sync_chain_id TEXT NOT NULL,
            device_id INTEGER NOT NULL,
            device_name TEXT NOT NULL,
            secret_key TEXT NOT NULL,
            latest_message_timestamp INTEGER NOT NULL,   -- Unix ms, never decreases
            last_feeds_remote_hash INTEGER NOT NULL      -- 0 = never synced
        );

        -- Device list cache, replaced wholesale
        CREATE TABLE sync_device (
            device_id INTEGER PRIMARY KEY,
            device_name TEXT NOT NULL
        );

        -- URLs seen in the last feed pull
        CREATE TABLE remote_feed (
            url TEXT PRIMARY KEY
        );

        CREATE TABLE feeds (
            url TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            custom_title TEXT NOT NULL DEFAULT '',
            tag TEXT NOT NULL DEFAULT '',
            image_url TEXT,
            full_text_by_default INTEGER NOT NULL DEFAULT 0,
            notify INTEGER NOT NULL DEFAULT 0,
            when_modified INTEGER NOT NULL,
            last_sync INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE feed_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            feed_url TEXT NOT NULL,
            guid TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0,
            read_mark_synced INTEGER NOT NULL DEFAULT 0,

            UNIQUE(feed_url, guid)
        );

        CREATE INDEX idx_feed_items_unsynced ON feed_items(read, read_mark_synced);
        "#,
    )?;

    Ok(())
}

/// Migration v2: remote read marks awaiting their item.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE remote_read_mark (
            feed_url TEXT NOT NULL,
            guid TEXT NOT NULL,
            received_at INTEGER NOT NULL,
            PRIMARY KEY (feed_url, guid)
        );

        CREATE INDEX idx_remote_read_mark_received ON remote_read_mark(received_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "sync_remote",
            "sync_device",
            "remote_feed",
            "feeds",
            "feed_items",
            "remote_read_mark",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_upgrade_from_v1() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL)",
            [],
        )
        .unwrap();
        apply_v1(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (1, 0)",
            [],
        )
        .unwrap();

        migrate(&mut conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'remote_read_mark'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
