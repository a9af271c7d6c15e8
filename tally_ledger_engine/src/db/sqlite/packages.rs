use sqlx::SqliteConnection;

use crate::{
    db_types::{Package, ValueKind},
    traits::LedgerError,
};

const PACKAGE_COLUMNS: &str = "id, name, kind, amount, price, currency, active";

pub async fn package_by_id(package_id: i64, conn: &mut SqliteConnection) -> Result<Option<Package>, LedgerError> {
    let package =
        sqlx::query_as::<_, Package>(&format!("SELECT {PACKAGE_COLUMNS} FROM packages WHERE id = $1"))
            .bind(package_id)
            .fetch_optional(conn)
            .await?;
    Ok(package)
}

pub async fn active_packages(kind: ValueKind, conn: &mut SqliteConnection) -> Result<Vec<Package>, LedgerError> {
    let packages = sqlx::query_as::<_, Package>(&format!(
        "SELECT {PACKAGE_COLUMNS} FROM packages WHERE kind = $1 AND active = TRUE ORDER BY price ASC"
    ))
    .bind(kind.to_string())
    .fetch_all(conn)
    .await?;
    Ok(packages)
}
