use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::client::AnalysisResult;
use crate::config::CacheScope;
use crate::logging::{log, obj, v_str, Domain, Level};

/// Analyses keyed by `analysis_id`, kept in SQLite (in-memory for a
/// session, on disk for local scope).
pub struct AnalysisCache {
    conn: Mutex<Connection>,
    ttl_secs: u64,
}

impl AnalysisCache {
    pub fn open(scope: &CacheScope, ttl_secs: u64) -> Result<Self> {
        let conn = match scope {
            CacheScope::Session => Connection::open_in_memory()?,
            CacheScope::Local(path) => Connection::open(path)?,
        };
        let cache = Self {
            conn: Mutex::new(conn),
            ttl_secs,
        };
        cache.init()?;
        Ok(cache)
    }

    pub fn session(ttl_secs: u64) -> Result<Self> {
        Self::open(&CacheScope::Session, ttl_secs)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("analysis cache lock poisoned"))
    }

    fn init(&self) -> Result<()> {
        self.lock()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS analyses (
                analysis_id TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                stored_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn put(&self, analysis: &AnalysisResult) -> Result<()> {
        self.put_at(analysis, now_ts())
    }

    pub fn put_at(&self, analysis: &AnalysisResult, stored_at: u64) -> Result<()> {
        let body = serde_json::to_string(analysis)?;
        self.lock()?.execute(
            "INSERT INTO analyses (analysis_id, body, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(analysis_id) DO UPDATE SET body = excluded.body, stored_at = excluded.stored_at",
            params![analysis.analysis_id, body, stored_at as i64],
        )?;
        log(
            Level::Debug,
            Domain::Cache,
            "store",
            obj(&[("analysis_id", v_str(&analysis.analysis_id))]),
        );
        Ok(())
    }

    pub fn get(&self, analysis_id: &str) -> Result<Option<AnalysisResult>> {
        self.get_at(analysis_id, now_ts())
    }

    /// Lookup as of `now`; entries older than the TTL are treated as absent.
    pub fn get_at(&self, analysis_id: &str, now: u64) -> Result<Option<AnalysisResult>> {
        let row: Option<(String, i64)> = self
            .lock()?
            .query_row(
                "SELECT body, stored_at FROM analyses WHERE analysis_id = ?1",
                params![analysis_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let hit = match row {
            Some((body, stored_at)) if !self.is_expired(stored_at as u64, now) => {
                Some(serde_json::from_str(&body)?)
            }
            _ => None,
        };
        log(
            Level::Debug,
            Domain::Cache,
            if hit.is_some() { "hit" } else { "miss" },
            obj(&[("analysis_id", v_str(analysis_id))]),
        );
        Ok(hit)
    }

    pub fn remove(&self, analysis_id: &str) -> Result<bool> {
        let n = self
            .lock()?
            .execute("DELETE FROM analyses WHERE analysis_id = ?1", params![analysis_id])?;
        Ok(n > 0)
    }

    /// Drop expired entries; returns how many were removed.
    pub fn prune_expired(&self, now: u64) -> Result<usize> {
        let cutoff = now.saturating_sub(self.ttl_secs) as i64;
        let n = self
            .lock()?
            .execute("DELETE FROM analyses WHERE stored_at < ?1", params![cutoff])?;
        if n > 0 {
            log(
                Level::Info,
                Domain::Cache,
                "pruned",
                obj(&[("removed", n.into())]),
            );
        }
        Ok(n)
    }

    pub fn len(&self) -> Result<usize> {
        let n: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM analyses", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn is_expired(&self, stored_at: u64, now: u64) -> bool {
        now.saturating_sub(stored_at) > self.ttl_secs
    }
}

fn now_ts() -> u64 {
    Utc::now().timestamp() as u64
}
