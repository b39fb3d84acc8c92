//! # Donation server
//! The HTTP front of the donation platform. It is responsible for:
//! * Serving the public project catalogue, donation creation and status polling, and platform statistics.
//! * Receiving M-Pesa STK callbacks and timeouts, guarded by an HMAC signature and an optional IP whitelist.
//! * The admin console API, guarded by session tokens.
//! * Running the reconciliation worker that settles or expires donations whose callback never arrived.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: The public API.
//! * `/api/admin/...`: The admin API. Everything except `/api/admin/login` requires a session token.
//! * `/mpesa/callback`: STK push results (`POST`) and timeouts (`PUT`) from M-Pesa.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
