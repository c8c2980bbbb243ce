//! SQLite implementation of [`GraphStore`].
//!
//! [`SqliteStore`] persists brains in a SQLite database with WAL mode, one
//! transaction per write and automatic schema migrations. Kinds, payloads
//! and adjacency lists are stored as JSON TEXT columns via serde_json.

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use cortex_core::{CancelToken, ChangeSet, LinkKey, LinkParts, NeuronId, NeuronParts};

use crate::document::{BrainDocument, FORMAT_VERSION};
use crate::error::StorageError;
use crate::schema::{META_NEXT_ID, META_VERSION};
use crate::traits::GraphStore;

/// SQLite-backed implementation of [`GraphStore`].
pub struct SqliteStore {
    conn: Connection,
}

/// Ids are stored as SQLite integers. Stored ids never reach `i64::MAX`.
fn sql_id(id: NeuronId) -> i64 {
    id.0 as i64
}

fn from_sql(raw: i64) -> NeuronId {
    NeuronId(raw as u64)
}

fn list_json<T: serde::Serialize>(list: &Option<Vec<T>>) -> Result<Option<String>, StorageError> {
    list.as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(StorageError::from)
}

fn list_from_json<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Result<Option<Vec<T>>, StorageError> {
    raw.as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(StorageError::from)
}

/// Raw TEXT columns of one neuron row, decoded after the statement is done.
struct NeuronRow {
    id: i64,
    kind: String,
    payload: String,
    links_out: Option<String>,
    links_in: Option<String>,
    clustered_by: Option<String>,
    children: Option<String>,
}

impl NeuronRow {
    const COLUMNS: &'static str =
        "id, kind_json, payload_json, links_out_json, links_in_json, clustered_by_json, children_json";

    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(NeuronRow {
            id: row.get(0)?,
            kind: row.get(1)?,
            payload: row.get(2)?,
            links_out: row.get(3)?,
            links_in: row.get(4)?,
            clustered_by: row.get(5)?,
            children: row.get(6)?,
        })
    }

    fn decode(self) -> Result<NeuronParts, StorageError> {
        Ok(NeuronParts {
            id: from_sql(self.id),
            kind: serde_json::from_str(&self.kind)?,
            payload: serde_json::from_str(&self.payload)?,
            links_out: list_from_json(self.links_out)?,
            links_in: list_from_json(self.links_in)?,
            clustered_by: list_from_json(self.clustered_by)?,
            children: list_from_json(self.children)?,
        })
    }
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn meta(&self, key: &str) -> Result<Option<i64>, StorageError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?)
    }

    fn set_meta(tx: &Transaction<'_>, key: &str, value: i64) -> Result<(), StorageError> {
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Raises the stored id counter to at least `at_least`.
    fn bump_next_id(tx: &Transaction<'_>, at_least: u64) -> Result<(), StorageError> {
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = MAX(value, excluded.value)",
            params![META_NEXT_ID, at_least as i64],
        )?;
        Ok(())
    }

    fn put_neuron(tx: &Transaction<'_>, n: &NeuronParts) -> Result<(), StorageError> {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO neurons (id, kind_json, payload_json, links_out_json, links_in_json, clustered_by_json, children_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                kind_json = excluded.kind_json,
                payload_json = excluded.payload_json,
                links_out_json = excluded.links_out_json,
                links_in_json = excluded.links_in_json,
                clustered_by_json = excluded.clustered_by_json,
                children_json = excluded.children_json",
        )?;
        stmt.execute(params![
            sql_id(n.id),
            serde_json::to_string(&n.kind)?,
            serde_json::to_string(&n.payload)?,
            list_json(&n.links_out)?,
            list_json(&n.links_in)?,
            list_json(&n.clustered_by)?,
            list_json(&n.children)?,
        ])?;
        Ok(())
    }

    fn put_link(tx: &Transaction<'_>, l: &LinkParts) -> Result<(), StorageError> {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO links (from_id, to_id, meaning_id, info_json) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(from_id, to_id, meaning_id) DO UPDATE SET info_json = excluded.info_json",
        )?;
        stmt.execute(params![
            sql_id(l.key.from),
            sql_id(l.key.to),
            sql_id(l.key.meaning),
            serde_json::to_string(&l.info)?,
        ])?;
        Ok(())
    }

    fn remove_link(tx: &Transaction<'_>, key: LinkKey) -> Result<usize, StorageError> {
        Ok(tx.execute(
            "DELETE FROM links WHERE from_id = ?1 AND to_id = ?2 AND meaning_id = ?3",
            params![sql_id(key.from), sql_id(key.to), sql_id(key.meaning)],
        )?)
    }
}

impl GraphStore for SqliteStore {
    fn save_document(&mut self, document: &BrainDocument, cancel: &CancelToken) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM links", [])?;
        tx.execute("DELETE FROM neurons", [])?;

        for n in &document.neurons {
            if cancel.is_cancelled() {
                // Dropping the transaction rolls everything back.
                return Err(StorageError::Cancelled);
            }
            Self::put_neuron(&tx, n)?;
        }
        for l in &document.links {
            Self::put_link(&tx, l)?;
        }
        Self::set_meta(&tx, META_VERSION, document.version as i64)?;
        Self::set_meta(&tx, META_NEXT_ID, document.next_id as i64)?;
        tx.commit()?;
        Ok(())
    }

    fn load_document(&self) -> Result<BrainDocument, StorageError> {
        let next_id = self.meta(META_NEXT_ID)?.ok_or(StorageError::Empty)?;
        let version = self.meta(META_VERSION)?.unwrap_or(FORMAT_VERSION as i64);
        if version != FORMAT_VERSION as i64 {
            return Err(StorageError::UnsupportedVersion {
                found: version as u32,
                expected: FORMAT_VERSION,
            });
        }

        let rows: Vec<NeuronRow> = {
            let mut stmt = self
                .conn
                .prepare_cached(&format!("SELECT {} FROM neurons ORDER BY id", NeuronRow::COLUMNS))?;
            let rows = stmt.query_map([], NeuronRow::read)?;
            rows.collect::<Result<_, _>>()?
        };
        let neurons = rows.into_iter().map(NeuronRow::decode).collect::<Result<Vec<_>, _>>()?;

        let links: Vec<LinkParts> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT from_id, to_id, meaning_id, info_json FROM links ORDER BY from_id, to_id, meaning_id",
            )?;
            let rows = stmt.query_map([], |row| {
                let from: i64 = row.get(0)?;
                let to: i64 = row.get(1)?;
                let meaning: i64 = row.get(2)?;
                let info: String = row.get(3)?;
                Ok((LinkKey::new(from_sql(from), from_sql(to), from_sql(meaning)), info))
            })?;
            let mut result = Vec::new();
            for row in rows {
                let (key, info) = row?;
                result.push(LinkParts {
                    key,
                    info: serde_json::from_str(&info)?,
                });
            }
            result
        };

        Ok(BrainDocument::new(next_id as u64, neurons, links))
    }

    fn save_changes(&mut self, changes: &ChangeSet) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for &id in &changes.deleted_neurons {
            tx.execute("DELETE FROM neurons WHERE id = ?1", params![sql_id(id)])?;
        }
        for &key in &changes.removed_links {
            Self::remove_link(&tx, key)?;
        }
        for n in &changes.neurons {
            Self::put_neuron(&tx, n)?;
        }
        for l in &changes.links {
            Self::put_link(&tx, l)?;
        }
        Self::bump_next_id(&tx, changes.next_id)?;
        tx.commit()?;
        tracing::debug!(records = changes.total(), "changes saved");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Neuron CRUD
    // -------------------------------------------------------------------

    fn upsert_neuron(&mut self, neuron: &NeuronParts) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::put_neuron(&tx, neuron)?;
        Self::bump_next_id(&tx, neuron.id.0 + 1)?;
        tx.commit()?;
        Ok(())
    }

    fn get_neuron(&self, id: NeuronId) -> Result<NeuronParts, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM neurons WHERE id = ?1", NeuronRow::COLUMNS),
                params![sql_id(id)],
                NeuronRow::read,
            )
            .optional()?;
        match row {
            Some(row) => row.decode(),
            None => Err(StorageError::NeuronNotFound(id)),
        }
    }

    fn delete_neuron(&mut self, id: NeuronId) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let rows = tx.execute("DELETE FROM neurons WHERE id = ?1", params![sql_id(id)])?;
        tx.commit()?;
        if rows == 0 {
            return Err(StorageError::NeuronNotFound(id));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Link CRUD
    // -------------------------------------------------------------------

    fn upsert_link(&mut self, link: &LinkParts) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        Self::put_link(&tx, link)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_link(&mut self, key: LinkKey) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let rows = Self::remove_link(&tx, key)?;
        tx.commit()?;
        if rows == 0 {
            return Err(StorageError::LinkNotFound(key));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Query methods
    // -------------------------------------------------------------------

    fn neuron_count(&self) -> Result<usize, StorageError> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM neurons", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn link_count(&self) -> Result<usize, StorageError> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
