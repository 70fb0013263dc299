// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles for the Forecourt workspace.

pub mod mock_provider;

pub use mock_provider::MockProvider;
