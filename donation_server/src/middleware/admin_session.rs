//! Admin session middleware.
//! This middleware can be placed on any route or service, and is used on the `/api/admin` scope.
//!
//! It reads the session token from the `donate_session_token` header, or failing that, from an
//! `Authorization: Bearer` header, and validates it against the session store. If the session is live, the admin's
//! [`AdminIdentity`] is inserted into the request extensions, where handlers pick it up with
//! `web::ReqData<AdminIdentity>`. Otherwise a 401 is returned and the handler never runs.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    Error,
    HttpMessage,
};
use donation_engine::{db_types::AdminIdentity, AdminAuthApi, AdminAuthManagement};
use futures::future::LocalBoxFuture;
use log::{debug, trace};

use crate::errors::{AuthError, ServerError};

pub const SESSION_TOKEN_HEADER: &str = "donate_session_token";

pub struct AdminSessionMiddlewareFactory<A> {
    api: AdminAuthApi<A>,
}

impl<A> AdminSessionMiddlewareFactory<A> {
    pub fn new(api: AdminAuthApi<A>) -> Self {
        Self { api }
    }
}

impl<S, B, A> Transform<S, ServiceRequest> for AdminSessionMiddlewareFactory<A>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    A: AdminAuthManagement + Clone + 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminSessionMiddlewareService<S, A>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminSessionMiddlewareService { api: Rc::new(self.api.clone()), service: Rc::new(service) }))
    }
}

pub struct AdminSessionMiddlewareService<S, A> {
    api: Rc<AdminAuthApi<A>>,
    service: Rc<S>,
}

impl<S, B, A> Service<ServiceRequest> for AdminSessionMiddlewareService<S, A>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    A: AdminAuthManagement + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let api = Rc::clone(&self.api);
        Box::pin(async move {
            let token = session_token(req.headers()).ok_or_else(|| {
                debug!("🔐️ No session token in request to {}", req.path());
                ServerError::AuthenticationError(AuthError::MissingToken)
            })?;
            let identity: AdminIdentity = api.validate_session(&token).await.map_err(ServerError::from)?;
            trace!("🔐️ Session for {} is valid", identity.username);
            req.extensions_mut().insert(identity);
            service.call(req).await
        })
    }
}

/// The session token, from the `donate_session_token` header or a bearer authorization header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
}
