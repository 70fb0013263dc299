// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Forecourt notification service.
//!
//! A single WAL-mode database holds messages, consent records, the
//! verification queue, delivery attempts, and the append-only audit log.
//! All access goes through [`Database`] and the typed functions in
//! [`queries`].

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::Database;
