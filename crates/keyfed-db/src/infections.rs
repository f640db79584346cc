//! Persistence and scanning of published diagnosis keys.
//!
//! Writes go through [`insert_infection`]. Federation reads go through
//! [`iterate_infections`], which returns a [`SqliteInfectionIterator`]
//! walking the `infections` table in `(created_at, id)` order one page at
//! a time. Paging is keyset-based, so a continuation token is just the
//! position of the last record handed out.

use std::collections::VecDeque;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use keyfed_types::InfectionRecord;
use rusqlite::{params, Connection, Row};

use crate::error::StoreError;
use crate::iterator::{FetchInfectionsCriteria, InfectionIterator, IteratorStep};

/// Default number of rows loaded per page.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Stores a published key and returns its row id.
///
/// Region codes are stored uppercased, matching how fetch requests are
/// normalized.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure, including a duplicate
/// `key_id`.
pub fn insert_infection(conn: &Connection, record: &InfectionRecord) -> Result<i64, StoreError> {
    let regions: Vec<String> = record.regions.iter().map(|r| r.to_uppercase()).collect();
    let regions_json = serde_json::to_string(&regions)?;

    conn.execute(
        "INSERT INTO infections (
            key_id,
            diagnosis_key,
            regions_json,
            local_provenance,
            diagnosis_status,
            verification_authority_name,
            interval_number,
            interval_count,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.key_id,
            record.diagnosis_key,
            regions_json,
            record.local_provenance,
            record.diagnosis_status,
            record.verification_authority_name,
            record.interval_number,
            record.interval_count,
            record.created_at,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Opens a scan over the records matching `criteria`.
///
/// The first page is loaded eagerly so that query errors surface here
/// rather than on the first call to `next`.
///
/// # Errors
///
/// Returns `StoreError::InvalidCursor` if `criteria.last_cursor` is not a
/// token produced by this store, or `StoreError::Database` on SQL failure.
pub fn iterate_infections<'c>(
    conn: &'c Connection,
    criteria: &FetchInfectionsCriteria,
    page_size: usize,
) -> Result<SqliteInfectionIterator<'c>, StoreError> {
    let position = if criteria.last_cursor.is_empty() {
        ScanPosition::ORIGIN
    } else {
        ScanPosition::decode(&criteria.last_cursor)?
    };

    let mut it = SqliteInfectionIterator {
        conn,
        criteria: criteria.clone(),
        page_size: page_size.max(1),
        buffer: VecDeque::new(),
        position,
        drained: false,
    };
    it.load_page()?;
    Ok(it)
}

/// A position in the `(created_at, id)` scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScanPosition {
    created_at: i64,
    id: i64,
}

impl ScanPosition {
    /// Sorts before every stored row.
    const ORIGIN: Self = Self {
        created_at: i64::MIN,
        id: 0,
    };

    fn encode(self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.created_at, self.id))
    }

    fn decode(token: &str) -> Result<Self, StoreError> {
        let invalid = || StoreError::InvalidCursor(token.to_string());

        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let text = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (created_at, id) = text.split_once(':').ok_or_else(invalid)?;

        Ok(Self {
            created_at: created_at.parse().map_err(|_| invalid())?,
            id: id.parse().map_err(|_| invalid())?,
        })
    }
}

/// A paged scan over the `infections` table.
///
/// Borrows the connection for its lifetime; dropping the iterator releases
/// everything it holds.
pub struct SqliteInfectionIterator<'c> {
    conn: &'c Connection,
    criteria: FetchInfectionsCriteria,
    page_size: usize,
    /// Rows that failed to decode are kept as `None` so the position
    /// still advances past them.
    buffer: VecDeque<(ScanPosition, Option<InfectionRecord>)>,
    /// Position of the last record returned by `next`.
    position: ScanPosition,
    /// Set once a page came back short; no further rows exist.
    drained: bool,
}

impl SqliteInfectionIterator<'_> {
    fn load_page(&mut self) -> Result<(), StoreError> {
        // Rows already buffered sort after `position`; resume after the last one.
        let after = self
            .buffer
            .back()
            .map(|(pos, _)| *pos)
            .unwrap_or(self.position);

        let conn = self.conn;
        let mut stmt = conn.prepare_cached(
            "SELECT id, key_id, diagnosis_key, regions_json, local_provenance,
                    diagnosis_status, verification_authority_name,
                    interval_number, interval_count, created_at
             FROM infections
             WHERE created_at > ?1
               AND created_at < ?2
               AND (created_at, id) > (?3, ?4)
               AND (?5 = 0 OR local_provenance = 1)
               AND (?6 IS NULL OR EXISTS (
                    SELECT 1 FROM json_each(infections.regions_json) AS r
                    WHERE r.value = ?6))
             ORDER BY created_at ASC, id ASC
             LIMIT ?7",
        )?;

        let page_size = i64::try_from(self.page_size).unwrap_or(i64::MAX);
        let rows = stmt.query_map(
            params![
                self.criteria.since_timestamp,
                self.criteria.until_timestamp,
                after.created_at,
                after.id,
                self.criteria.only_local_provenance,
                self.criteria.include_region,
                page_size,
            ],
            read_row,
        )?;

        let mut loaded = 0usize;
        for row in rows {
            self.buffer.push_back(row?);
            loaded += 1;
        }

        if loaded < self.page_size {
            self.drained = true;
        }

        tracing::debug!(
            loaded,
            drained = self.drained,
            "loaded infection page"
        );

        Ok(())
    }
}

impl InfectionIterator for SqliteInfectionIterator<'_> {
    fn next(&mut self) -> Result<IteratorStep, StoreError> {
        if self.buffer.is_empty() && !self.drained {
            self.load_page()?;
        }

        match self.buffer.pop_front() {
            Some((position, record)) => {
                self.position = position;
                Ok(IteratorStep::Record(record))
            }
            None => Ok(IteratorStep::Exhausted),
        }
    }

    fn cursor(&self) -> Result<String, StoreError> {
        Ok(self.position.encode())
    }
}

/// Stand-in for a stored status that does not fit an `i32`. Never a
/// recognized [`keyfed_types::DiagnosisStatus`] code.
const UNREPRESENTABLE_STATUS: i32 = i32::MIN;

/// Maps a row to its scan position and, when the row decodes, its record.
///
/// Only the position columns are required. Any other decoding failure
/// yields `None` so one bad row cannot stall the scan.
fn read_row(row: &Row<'_>) -> rusqlite::Result<(ScanPosition, Option<InfectionRecord>)> {
    let position = ScanPosition {
        created_at: row.get(9)?,
        id: row.get(0)?,
    };

    match decode_record(row, position.created_at) {
        Ok(record) => Ok((position, Some(record))),
        Err(e) => {
            tracing::debug!(row_id = position.id, error = %e, "skipping undecodable infection row");
            Ok((position, None))
        }
    }
}

fn decode_record(row: &Row<'_>, created_at: i64) -> rusqlite::Result<InfectionRecord> {
    let key_id: String = row.get(1)?;

    let regions_json: String = row.get(3)?;
    let regions = match serde_json::from_str::<Vec<String>>(&regions_json) {
        Ok(regions) => regions,
        Err(e) => {
            // Empty regions make the record fail the region check downstream.
            tracing::debug!(key_id = %key_id, error = %e, "infection has unreadable regions");
            Vec::new()
        }
    };

    let status: i64 = row.get(5)?;

    Ok(InfectionRecord {
        key_id,
        diagnosis_key: row.get(2)?,
        regions,
        local_provenance: row.get(4)?,
        diagnosis_status: i32::try_from(status).unwrap_or(UNREPRESENTABLE_STATUS),
        verification_authority_name: row.get(6)?,
        interval_number: row.get(7)?,
        interval_count: row.get(8)?,
        created_at,
    })
}
