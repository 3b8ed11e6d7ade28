//! Row-level queries for the SQLite backend. These functions all take a bare connection so that
//! [`super::SqliteDatabase`] can compose them inside a single database transaction where atomicity
//! matters.
pub mod audit;
pub mod events;
pub mod referrals;
pub mod transactions;

use sqlx::{sqlite::SqliteRow, Row};
use std::str::FromStr;

use crate::{db_types::ConversionError, traits::ReconciliationError};

/// Reads a TEXT column and parses it into one of the db_types enums.
pub(crate) fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = ConversionError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode { index: column.to_string(), source: Box::new(e) })
}

impl From<ConversionError> for ReconciliationError {
    fn from(e: ConversionError) -> Self {
        ReconciliationError::DatabaseError(e.to_string())
    }
}
