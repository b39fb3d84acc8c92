mod admin_session;
mod hmac;

pub use admin_session::{session_token, AdminSessionMiddlewareFactory, AdminSessionMiddlewareService, SESSION_TOKEN_HEADER};
pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService, CALLBACK_SIGNATURE_HEADER};
