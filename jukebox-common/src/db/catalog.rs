//! Catalog queries: upsert scanned tracks, find tracks with filter/order/paging

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row as _, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;

/// Queryable catalog fields, in default output order
pub const FIELDS: [&str; 5] = ["artist", "album", "title", "tracknum", "path"];

/// Default sort order when a query gives none
const DEFAULT_ORDER: [&str; 5] = ["artist", "album", "tracknum", "title", "path"];

/// One query result: field name to value
pub type Record = BTreeMap<String, String>;

/// Metadata for one mp3 file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackRecord {
    pub path: String,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub tracknum: i64,
}

impl TrackRecord {
    /// All fields as a [`Record`]
    pub fn to_record(&self) -> Record {
        let mut m = Record::new();
        m.insert("artist".to_string(), self.artist.clone());
        m.insert("album".to_string(), self.album.clone());
        m.insert("title".to_string(), self.title.clone());
        m.insert("tracknum".to_string(), self.tracknum.to_string());
        m.insert("path".to_string(), self.path.clone());
        m
    }
}

impl std::fmt::Display for TrackRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "path: '{}' artist: '{}' album: '{}' tracknum: '{}' title: '{}'",
            self.path, self.artist, self.album, self.tracknum, self.title
        )
    }
}

/// Which page of results to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    /// Rows per page
    pub page_size: u32,
    /// Zero-based page index
    pub page: u32,
}

/// Catalog query
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Fields to return. Empty means all of [`FIELDS`].
    pub fields: Vec<String>,
    /// Case-insensitive substring match per field, all must match
    pub filter: BTreeMap<String, String>,
    /// Fields to sort ascending by. Empty means the default order.
    pub order: Vec<String>,
    /// `None` returns every matching row
    pub paging: Option<Paging>,
}

/// One page of query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    /// No rows exist beyond this page
    pub eof: bool,
}

fn check_field(name: &str) -> Result<&'static str> {
    FIELDS
        .iter()
        .copied()
        .find(|f| *f == name)
        .ok_or_else(|| Error::UnknownField(name.to_string()))
}

fn is_text_field(name: &str) -> bool {
    name != "tracknum"
}

/// Build the SQL and the bind values for a query
fn build_select(query: &Query) -> Result<(String, Vec<&'static str>, Vec<String>)> {
    let fields: Vec<&'static str> = if query.fields.is_empty() {
        FIELDS.to_vec()
    } else {
        query
            .fields
            .iter()
            .map(|f| check_field(f))
            .collect::<Result<_>>()?
    };

    let columns: Vec<String> = fields
        .iter()
        .map(|f| format!("CAST({f} AS TEXT) AS {f}"))
        .collect();

    let mut sql = format!("SELECT DISTINCT {} FROM mp3", columns.join(", "));

    let mut binds = Vec::new();
    let mut clauses = Vec::new();
    for (field, value) in &query.filter {
        if value.is_empty() {
            continue;
        }
        let field = check_field(field)?;
        clauses.push(format!("instr(lower({}), lower(?)) > 0", field));
        binds.push(value.clone());
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let order: Vec<&'static str> = if query.order.is_empty() {
        DEFAULT_ORDER.to_vec()
    } else {
        query
            .order
            .iter()
            .map(|f| check_field(f))
            .collect::<Result<_>>()?
    };
    let order: Vec<String> = order
        .iter()
        .map(|f| {
            if is_text_field(f) {
                format!("lower({})", f)
            } else {
                f.to_string()
            }
        })
        .collect();
    sql.push_str(" ORDER BY ");
    sql.push_str(&order.join(", "));

    if let Some(p) = query.paging {
        // One row more than a page: if it comes back, this is not the last page.
        sql.push_str(&format!(
            " LIMIT {} OFFSET {}",
            u64::from(p.page_size) + 1,
            u64::from(p.page) * u64::from(p.page_size)
        ));
    }

    Ok((sql, fields, binds))
}

/// Handle to the mp3 catalog
#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a track, or update the row already stored for its path
    pub async fn upsert(&self, track: &TrackRecord) -> Result<()> {
        let scanned_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO mp3 (path, artist, album, title, tracknum, scanned_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                artist = excluded.artist,
                album = excluded.album,
                title = excluded.title,
                tracknum = excluded.tracknum,
                scanned_at = excluded.scanned_at
            "#,
        )
        .bind(&track.path)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(&track.title)
        .bind(track.tracknum)
        .bind(scanned_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Run a query and return the requested page
    pub async fn find(&self, query: &Query) -> Result<Page> {
        let (sql, fields, binds) = build_select(query)?;
        debug!("Query: {}", sql);

        let mut q = sqlx::query(&sql);
        for value in &binds {
            q = q.bind(value);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Record::new();
            for (idx, field) in fields.iter().enumerate() {
                let value: Option<String> = row.try_get(idx)?;
                record.insert(field.to_string(), value.unwrap_or_default());
            }
            records.push(record);
        }

        let eof = match query.paging {
            Some(p) if records.len() > p.page_size as usize => {
                records.truncate(p.page_size as usize);
                false
            }
            _ => true,
        };

        Ok(Page { records, eof })
    }

    /// Exact lookup by catalog path
    pub async fn find_by_path(&self, path: &str) -> Result<Option<TrackRecord>> {
        let row = sqlx::query(
            "SELECT path, artist, album, title, tracknum FROM mp3 WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(TrackRecord {
            path: row.try_get(0)?,
            artist: row.try_get::<Option<String>, _>(1)?.unwrap_or_default(),
            album: row.try_get::<Option<String>, _>(2)?.unwrap_or_default(),
            title: row.try_get::<Option<String>, _>(3)?.unwrap_or_default(),
            tracknum: row.try_get::<Option<i64>, _>(4)?.unwrap_or_default(),
        }))
    }

    /// Number of tracks in the catalog
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mp3")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
