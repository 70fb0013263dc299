// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table.

pub mod attempts;
pub mod audit;
pub mod consent;
pub mod messages;
pub mod queue;

use std::str::FromStr;

/// Map an enum-typed TEXT column value, converting parse failures into a
/// column-level rusqlite error instead of panicking on bad rows.
pub(crate) fn parse_column<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Same as [`parse_column`] for nullable TEXT columns.
pub(crate) fn parse_opt_column<T>(idx: usize, value: Option<String>) -> Result<Option<T>, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.map(|v| parse_column(idx, v)).transpose()
}
