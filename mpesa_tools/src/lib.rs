//! A small client for Safaricom's Daraja API, covering the Lipa na M-Pesa Online (STK push) flow.
//!
//! * [`MpesaApi`] handles OAuth, STK push requests and STK push status queries.
//! * [`StkCallbackEnvelope`] is the payload Safaricom POSTs to the callback URL once the customer has responded to
//!   the push prompt.
mod api;
mod callback;
mod config;
mod data_objects;
mod error;

pub mod helpers;

pub use api::MpesaApi;
pub use callback::{CallbackItem, CallbackMetadata, StkCallback, StkCallbackBody, StkCallbackEnvelope};
pub use config::{MpesaConfig, MpesaEnvironment};
pub use data_objects::{
    AccessToken,
    DarajaErrorResponse,
    StkPushParams,
    StkPushRequest,
    StkPushResponse,
    StkQueryRequest,
    StkQueryResponse,
};
pub use error::MpesaApiError;

/// Result code for a successful transaction
pub const RESULT_CODE_SUCCESS: i64 = 0;
/// Result code sent when the customer dismisses the push prompt
pub const RESULT_CODE_CANCELLED_BY_USER: i64 = 1032;
/// Daraja error code returned by the query endpoint while the customer has not yet responded
pub const ERROR_CODE_STILL_PROCESSING: &str = "500.001.1001";
