use common::error::StoreError;

/// Sorts driver errors into the store contract: unique violations are
/// conflicts, undecodable rows are corruption, anything else means the store
/// could not be reached or used.
pub fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::Decode(e) => StoreError::Corrupt(e.to_string()),
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Corrupt(format!("column {}: {}", index, source))
        }
        other => StoreError::Connectivity(other.to_string()),
    }
}
