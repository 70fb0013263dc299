// SPDX-FileCopyrightText: 2026 Forecourt Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Forecourt notification service: the operator
//! send/queue API and the provider webhook receiver.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod webhook;

pub use server::{build_router, serve, GatewayState};
