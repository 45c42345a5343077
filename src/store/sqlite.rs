//! SQLite-backed block store.
//!
//! The reconciliation core treats the database as read-only: `open` refuses
//! write access at the connection level. `open_in_memory` and `insert_block`
//! exist for tests and seeding tooling, standing in for the external ledger
//! writer.

use crate::models::{Block, BlockKind};
use crate::store::BlockStore;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, warn};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    seq INTEGER NOT NULL,
    position TEXT NOT NULL,
    owner TEXT NOT NULL,
    kind INTEGER NOT NULL,
    payload TEXT NOT NULL,
    link_hash TEXT NOT NULL DEFAULT '0',
    mint_count INTEGER NOT NULL DEFAULT 0,
    nonce INTEGER NOT NULL DEFAULT 0,
    timestamp_ms INTEGER NOT NULL,
    object_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_blocks_position
    ON blocks(position, seq);
"#;

/// Block store over a SQLite file.
pub struct SqliteBlockStore {
    conn: Mutex<Connection>,
}

impl SqliteBlockStore {
    /// Open an existing database read-only.
    pub fn open(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open block database at {}", db_path))?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))
            .context("Block database has no readable blocks table")?;

        debug!("block store opened at {} ({} blocks)", db_path, count);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a fresh in-memory store with the schema applied.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize block schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Seed a block record. This is the writer's job in production; exposed
    /// for tests and tooling only.
    pub fn insert_block(&self, block: &Block) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO blocks \
             (seq, position, owner, kind, payload, link_hash, mint_count, nonce, timestamp_ms, object_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                block.sequence_index,
                &block.position_id,
                &block.owner_id,
                block.kind.code(),
                &block.payload,
                &block.link_hash,
                block.mint_count,
                block.nonce,
                block.timestamp_ms,
                &block.object_id,
            ],
        )?;
        Ok(())
    }

    /// Total number of stored blocks.
    pub fn len(&self) -> usize {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockStore for SqliteBlockStore {
    fn fetch_blocks(&self, position_id: &str) -> Result<Vec<Block>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare_cached(
            "SELECT seq, position, owner, kind, payload, link_hash, \
                    mint_count, nonce, timestamp_ms, object_id \
             FROM blocks WHERE position = ?1",
        )?;

        let mut rows = stmt.query([position_id])?;
        let mut out: Vec<Block> = Vec::new();

        while let Some(row) = rows.next()? {
            let code: i64 = row.get(3)?;
            let Some(kind) = BlockKind::from_code(code) else {
                warn!(
                    "excluding block with unknown kind code {} at position {}",
                    code, position_id
                );
                continue;
            };

            out.push(Block {
                sequence_index: row.get(0)?,
                position_id: row.get(1)?,
                owner_id: row.get(2)?,
                kind,
                payload: row.get(4)?,
                link_hash: row.get(5)?,
                mint_count: row.get(6)?,
                nonce: row.get(7)?,
                timestamp_ms: row.get(8)?,
                object_id: row.get(9)?,
            });
        }

        Ok(out)
    }
}
