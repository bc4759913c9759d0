//! Query latency and pool gauges for the toggle manager's database.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// How a timed query ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Ok,
    NotFound,
    Error,
}

impl QueryOutcome {
    pub fn of<T>(result: &Result<T, sqlx::Error>) -> Self {
        match result {
            Ok(_) => QueryOutcome::Ok,
            Err(sqlx::Error::RowNotFound) => QueryOutcome::NotFound,
            Err(_) => QueryOutcome::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryOutcome::Ok => "ok",
            QueryOutcome::NotFound => "not_found",
            QueryOutcome::Error => "error",
        }
    }
}

/// Times one repository call into
/// `toggle_manager_db_query_duration_seconds{query,outcome}`.
///
/// Dropping an unfinished timer records `error`, so transactional paths
/// that bail out with `?` are still counted.
pub struct QueryTimer {
    query: &'static str,
    start: Instant,
    finished: bool,
}

impl QueryTimer {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            start: Instant::now(),
            finished: false,
        }
    }

    /// Record a successful run.
    pub fn record(mut self) {
        self.observe(QueryOutcome::Ok);
    }

    /// Record the run with the outcome of `result`.
    pub fn finish<T>(mut self, result: &Result<T, sqlx::Error>) {
        self.observe(QueryOutcome::of(result));
    }

    fn observe(&mut self, outcome: QueryOutcome) {
        if self.finished {
            return;
        }
        self.finished = true;
        histogram!(
            "toggle_manager_db_query_duration_seconds",
            "query" => self.query,
            "outcome" => outcome.as_str()
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        self.observe(QueryOutcome::Error);
    }
}

/// Connection counts at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total: u32,
    pub idle: u32,
    pub active: u32,
}

impl PoolStats {
    pub fn new(total: u32, idle: u32) -> Self {
        Self {
            total,
            idle,
            // idle can briefly exceed size while connections are reaped
            active: total.saturating_sub(idle),
        }
    }
}

/// Publishes `toggle_manager_db_connections{state}` and returns the counts.
pub fn record_pool_metrics(pool: &PgPool) -> PoolStats {
    let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX);
    let stats = PoolStats::new(pool.size(), idle);

    for (state, value) in [
        ("active", stats.active),
        ("idle", stats.idle),
        ("total", stats.total),
    ] {
        gauge!("toggle_manager_db_connections", "state" => state).set(f64::from(value));
    }
    stats
}
