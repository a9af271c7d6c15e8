pub mod accounts;
pub mod contracts;
pub mod db;
pub mod entries;
pub mod packages;
pub mod sessions;

use std::env;

pub use db::SqliteDatabase;
use log::info;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::traits::LedgerError;

const SQLITE_DB_URL: &str = "sqlite://data/tally_ledger.db";

pub fn db_url() -> String {
    let result = env::var("TALLY_DATABASE_URL").unwrap_or_else(|_| {
        info!("TALLY_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, LedgerError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
