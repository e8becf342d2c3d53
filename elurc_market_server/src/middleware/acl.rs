//! Access control middleware for the admin API.
//!
//! Admin clients authenticate with a shared API key sent in the `X-Elurc-Admin-Key` header. The middleware is placed
//! on the `/api` scope. Requests without the header get a 401 response, and requests with the wrong key get a 403.
//!
//! If no API key is configured, every request is refused. There is no way to run the admin API unauthenticated.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use elurc_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::{
    errors::{AuthError, ServerError},
    helpers::{calculate_hmac, verify_hmac},
};

pub const ADMIN_KEY_HEADER: &str = "X-Elurc-Admin-Key";
const ADMIN_KEY_CONTEXT: &[u8] = b"elurc-admin-api-key";

pub struct AclMiddlewareFactory {
    api_key: Secret<String>,
}

impl AclMiddlewareFactory {
    pub fn new(api_key: Secret<String>) -> Self {
        if api_key.is_empty() {
            warn!("🔐️ No admin API key is configured. The admin API will refuse all requests.");
        }
        AclMiddlewareFactory { api_key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AclMiddlewareService { api_key: self.api_key.clone(), service: Rc::new(service) }))
    }
}

pub struct AclMiddlewareService<S> {
    api_key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let verdict = check_api_key(&req, &self.api_key);
        Box::pin(async move {
            match verdict {
                Ok(()) => {
                    trace!("🔐️ Admin API key check for {} ✅️", req.path());
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                },
                Err(e) => {
                    warn!("🔐️ Admin request to {} denied. {e}", req.path());
                    let err = ServerError::AuthenticationError(e);
                    Ok(req.error_response(err).map_into_right_body())
                },
            }
        })
    }
}

fn check_api_key(req: &ServiceRequest, api_key: &Secret<String>) -> Result<(), AuthError> {
    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .ok_or(AuthError::MissingApiKey)?
        .to_str()
        .map_err(|_| AuthError::InvalidApiKey)?;
    if api_key.is_empty() || !keys_match(provided, api_key.reveal()) {
        return Err(AuthError::InvalidApiKey);
    }
    Ok(())
}

/// Compares two keys by their HMAC tags over a fixed message, so the check runs in constant time.
fn keys_match(provided: &str, expected: &str) -> bool {
    match calculate_hmac(expected, ADMIN_KEY_CONTEXT) {
        Ok(tag) => verify_hmac(provided, ADMIN_KEY_CONTEXT, &tag),
        Err(e) => {
            warn!("🔐️ Could not derive a tag from the admin API key. {e}");
            false
        },
    }
}
