//! Knowledge entry repository.
//!
//! CRUD facade over the entry table and its full-text index. Every
//! mutation touches both inside one transaction, so readers never see
//! the index out of sync with committed rows.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};

use crate::database::KnowledgeDb;
use crate::database::models::{EntryPatch, KnowledgeContent, KnowledgeEntry, KnowledgeSource, KnowledgeType};
use crate::error::{KnowledgeError, Result};

const SELECT_COLS: &str = "id, type, source, content_json, confidence, created_at, updated_at, \
                           refs_json, tags_json, context_tags_json";

/// Repository for knowledge entries.
#[derive(Debug, Clone)]
pub struct EntryRepository {
    db: KnowledgeDb,
}

impl EntryRepository {
    pub fn new(db: KnowledgeDb) -> Self {
        Self { db }
    }

    /// Insert a new entry.
    ///
    /// # Errors
    /// `DuplicateKey` if the id already exists; the store is left
    /// unchanged in that case.
    pub async fn create(&self, entry: &KnowledgeEntry) -> Result<()> {
        entry.validate()?;
        let row = EntryRow::from_entry(entry)?;
        self.db.call(move |conn| insert_row(conn, &row)).await
    }

    /// Insert many entries, best effort: an invalid or duplicate entry
    /// is skipped and never aborts the rest. Returns the number
    /// actually inserted.
    pub async fn create_batch(&self, entries: Vec<KnowledgeEntry>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::with_capacity(entries.len());
        for entry in &entries {
            match entry.validate().and_then(|()| EntryRow::from_entry(entry)) {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Skipping invalid entry '{}': {e}", entry.id),
            }
        }

        self.db
            .call(move |conn| {
                let mut inserted = 0usize;
                for row in &rows {
                    match insert_row(conn, row) {
                        Ok(()) => inserted += 1,
                        Err(KnowledgeError::DuplicateKey { id }) => {
                            debug!("Entry '{id}' already exists, skipping");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(inserted)
            })
            .await
    }

    /// Look up an entry by id. Absence is not an error.
    pub async fn read(&self, id: &str) -> Result<Option<KnowledgeEntry>> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let raw = conn
                    .query_row(
                        &format!("SELECT {SELECT_COLS} FROM knowledge_entries WHERE id = ?1"),
                        params![id],
                        RawRow::read,
                    )
                    .optional()?;
                raw.map(RawRow::into_entry).transpose()
            })
            .await
    }

    /// Entries of one type, most recently updated first.
    pub async fn read_by_type(
        &self,
        kind: KnowledgeType,
        limit: Option<usize>,
    ) -> Result<Vec<KnowledgeEntry>> {
        self.db
            .call(move |conn| {
                let mut sql = format!(
                    "SELECT {SELECT_COLS} FROM knowledge_entries \
                     WHERE type = ?1 ORDER BY updated_at DESC"
                );
                if let Some(limit) = limit {
                    sql.push_str(&format!(" LIMIT {limit}"));
                }
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![kind.as_str()], RawRow::read)?;
                collect_entries(rows)
            })
            .await
    }

    /// Merge non-empty patch fields into an existing entry. The entry
    /// type is immutable; `updated_at` always moves forward.
    ///
    /// # Errors
    /// `NotFound` if the id is absent.
    pub async fn update(&self, id: &str, patch: EntryPatch) -> Result<()> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;

                let raw = tx
                    .query_row(
                        &format!("SELECT {SELECT_COLS} FROM knowledge_entries WHERE id = ?1"),
                        params![id],
                        RawRow::read,
                    )
                    .optional()?;
                let Some(raw) = raw else {
                    return Err(KnowledgeError::NotFound { id: id.clone() });
                };

                let mut entry = raw.into_entry()?;
                if let Some(content) = &patch.content {
                    entry.content = content.clone();
                }
                if let Some(source) = patch.source {
                    entry.source = source;
                }
                if let Some(confidence) = patch.confidence {
                    entry.confidence = confidence;
                }
                if let Some(references) = &patch.references {
                    entry.references = references.clone();
                }
                if let Some(tags) = &patch.tags {
                    entry.tags = tags.clone();
                }
                if let Some(context_tags) = &patch.context_tags {
                    entry.context_tags = context_tags.clone();
                }

                // updated_at must strictly increase even within one
                // clock tick (storage precision is microseconds).
                let now = Utc::now();
                entry.updated_at = if now > entry.updated_at {
                    now
                } else {
                    entry.updated_at + chrono::Duration::microseconds(1)
                };

                entry.validate()?;
                let row = EntryRow::from_entry(&entry)?;

                tx.execute(
                    "UPDATE knowledge_entries SET \
                         source = ?2, content_json = ?3, confidence = ?4, updated_at = ?5, \
                         refs_json = ?6, tags_json = ?7, context_tags_json = ?8 \
                     WHERE id = ?1",
                    params![
                        row.id,
                        row.source,
                        row.content_json,
                        row.confidence,
                        row.updated_at,
                        row.refs_json,
                        row.tags_json,
                        row.context_tags_json,
                    ],
                )?;
                tx.execute(
                    "UPDATE knowledge_fts SET body = ?2 WHERE entry_id = ?1",
                    params![row.id, row.fts_body],
                )?;

                tx.commit()?;
                Ok(())
            })
            .await
    }

    /// Remove an entry and its index row. Idempotent: returns `false`
    /// if the id was already absent.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                let removed =
                    tx.execute("DELETE FROM knowledge_entries WHERE id = ?1", params![id])?;
                tx.execute("DELETE FROM knowledge_fts WHERE entry_id = ?1", params![id])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await
    }

    /// Ranked full-text search, best match first.
    ///
    /// The query is tokenized and OR-joined; hostile input degrades to
    /// empty results rather than an error.
    pub async fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeEntry>> {
        let match_expr = fts_match_expr(query);
        if match_expr.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        self.db
            .call(move |conn| {
                let cols = SELECT_COLS
                    .split(", ")
                    .map(|c| format!("e.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut stmt = conn.prepare(&format!(
                    "SELECT {cols} FROM knowledge_entries e \
                     JOIN knowledge_fts ON e.id = knowledge_fts.entry_id \
                     WHERE knowledge_fts MATCH ?1 \
                     ORDER BY bm25(knowledge_fts) \
                     LIMIT {limit}"
                ))?;

                let rows = match stmt.query_map(params![match_expr], RawRow::read) {
                    Ok(rows) => rows,
                    Err(e) if e.to_string().contains("fts5: syntax error") => {
                        warn!("FTS query rejected, returning no results: {e}");
                        return Ok(Vec::new());
                    }
                    Err(e) => return Err(e.into()),
                };

                let mut out = Vec::new();
                for raw in rows {
                    match raw {
                        Ok(raw) => out.push(raw.into_entry()?),
                        Err(e) if e.to_string().contains("fts5: syntax error") => {
                            warn!("FTS query rejected, returning no results: {e}");
                            return Ok(Vec::new());
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(out)
            })
            .await
    }

    /// Entries whose tags (or context tags) contain all of the given
    /// tags (`match_all`) or any of them. Ties break by confidence,
    /// then recency.
    pub async fn search_by_tags(
        &self,
        tags: &[String],
        match_all: bool,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>> {
        if tags.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // Tags are matched as quoted elements of the stored JSON
        // arrays, so a quote inside a tag cannot widen the pattern.
        let patterns: Vec<String> = tags
            .iter()
            .map(|t| format!("%\"{}\"%", t.replace('"', "")))
            .collect();

        let joiner = if match_all { " AND " } else { " OR " };
        let conditions = (0..patterns.len())
            .map(|i| {
                let n = i + 1;
                format!("(tags_json LIKE ?{n} OR context_tags_json LIKE ?{n})")
            })
            .collect::<Vec<_>>()
            .join(joiner);

        self.db
            .call(move |conn| {
                let sql = format!(
                    "SELECT {SELECT_COLS} FROM knowledge_entries \
                     WHERE {conditions} \
                     ORDER BY confidence DESC, updated_at DESC \
                     LIMIT {limit}"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows =
                    stmt.query_map(rusqlite::params_from_iter(patterns.iter()), RawRow::read)?;
                collect_entries(rows)
            })
            .await
    }

    /// Aggregate statistics over the whole store.
    pub async fn get_statistics(&self) -> Result<KnowledgeStats> {
        self.db
            .call(|conn| {
                let total_entries: i64 =
                    conn.query_row("SELECT COUNT(*) FROM knowledge_entries", [], |r| r.get(0))?;

                let mut by_type = BTreeMap::new();
                let mut stmt = conn
                    .prepare("SELECT type, COUNT(*) FROM knowledge_entries GROUP BY type")?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    by_type.insert(row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64);
                }

                let mut by_source = BTreeMap::new();
                let mut stmt = conn
                    .prepare("SELECT source, COUNT(*) FROM knowledge_entries GROUP BY source")?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    by_source.insert(row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64);
                }

                let avg_confidence: f64 = conn.query_row(
                    "SELECT COALESCE(AVG(confidence), 0.0) FROM knowledge_entries",
                    [],
                    |r| r.get(0),
                )?;

                let recent_updates: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM knowledge_entries \
                     WHERE datetime(updated_at) > datetime('now', '-1 day')",
                    [],
                    |r| r.get(0),
                )?;

                Ok(KnowledgeStats {
                    total_entries: total_entries as u64,
                    by_type,
                    by_source,
                    avg_confidence,
                    recent_updates: recent_updates as u64,
                })
            })
            .await
    }
}

/// Aggregate counters returned by [`EntryRepository::get_statistics`].
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStats {
    pub total_entries: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_source: BTreeMap<String, u64>,
    pub avg_confidence: f64,
    /// Entries updated within the last day.
    pub recent_updates: u64,
}

/// Fully serialized row, built outside the blocking closure so the
/// closure stays retry-safe.
struct EntryRow {
    id: String,
    kind: &'static str,
    source: &'static str,
    content_json: String,
    confidence: f64,
    created_at: String,
    updated_at: String,
    refs_json: String,
    tags_json: String,
    context_tags_json: String,
    fts_body: String,
}

impl EntryRow {
    fn from_entry(entry: &KnowledgeEntry) -> Result<Self> {
        Ok(Self {
            id: entry.id.clone(),
            kind: entry.kind.as_str(),
            source: entry.source.as_str(),
            content_json: entry.content.to_json()?,
            confidence: entry.confidence,
            created_at: format_ts(entry.created_at),
            updated_at: format_ts(entry.updated_at),
            refs_json: serde_json::to_string(&entry.references)?,
            tags_json: serde_json::to_string(&entry.tags)?,
            context_tags_json: serde_json::to_string(&entry.context_tags)?,
            fts_body: entry.searchable_text(),
        })
    }
}

/// Raw column values before domain decoding.
struct RawRow {
    id: String,
    kind: String,
    source: String,
    content_json: String,
    confidence: f64,
    created_at: String,
    updated_at: String,
    refs_json: String,
    tags_json: String,
    context_tags_json: String,
}

impl RawRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            source: row.get(2)?,
            content_json: row.get(3)?,
            confidence: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            refs_json: row.get(7)?,
            tags_json: row.get(8)?,
            context_tags_json: row.get(9)?,
        })
    }

    fn into_entry(self) -> Result<KnowledgeEntry> {
        let kind = KnowledgeType::parse(&self.kind)?;
        let content = KnowledgeContent::from_parts(kind, &self.content_json)?;
        Ok(KnowledgeEntry {
            id: self.id,
            kind,
            source: KnowledgeSource::parse(&self.source)?,
            content,
            confidence: self.confidence,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            references: serde_json::from_str(&self.refs_json)?,
            tags: serde_json::from_str(&self.tags_json)?,
            context_tags: serde_json::from_str(&self.context_tags_json)?,
        })
    }
}

/// Insert one entry plus its index row in a single transaction.
fn insert_row(conn: &mut Connection, row: &EntryRow) -> Result<()> {
    let tx = conn.transaction()?;

    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM knowledge_entries WHERE id = ?1)",
        params![row.id],
        |r| r.get(0),
    )?;
    if exists {
        return Err(KnowledgeError::DuplicateKey { id: row.id.clone() });
    }

    tx.execute(
        "INSERT INTO knowledge_entries \
             (id, type, source, content_json, confidence, created_at, updated_at, \
              refs_json, tags_json, context_tags_json) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            row.id,
            row.kind,
            row.source,
            row.content_json,
            row.confidence,
            row.created_at,
            row.updated_at,
            row.refs_json,
            row.tags_json,
            row.context_tags_json,
        ],
    )?;
    tx.execute(
        "INSERT INTO knowledge_fts (entry_id, body) VALUES (?1, ?2)",
        params![row.id, row.fts_body],
    )?;

    tx.commit()?;
    Ok(())
}

fn collect_entries(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
) -> Result<Vec<KnowledgeEntry>> {
    let mut out = Vec::new();
    for raw in rows {
        out.push(raw?.into_entry()?);
    }
    Ok(out)
}

/// Quote each query token so user text can never form FTS5 syntax.
fn fts_match_expr(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| token.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// UTC, microsecond precision: lexicographic order matches time order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| KnowledgeError::StoreUnavailable(format!("corrupt timestamp '{s}': {e}")))
}
