//! HMAC middleware for Actix Web.
//!
//! The ledger verifier signs every payment confirmation with HMAC-SHA256, using `ELURC_WEBHOOK_HMAC_SECRET` as the
//! key and the raw request body as the data. The base64-encoded tag is sent in the `X-Elurc-Hmac-Sha256` header.
//!
//! Wrap the webhook scope with this middleware to reject any confirmation that was not signed with the shared secret.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use elurc_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::{
    errors::{AuthError, ServerError},
    helpers::verify_hmac,
};

pub const HMAC_HEADER: &str = "X-Elurc-Hmac-Sha256";

pub struct HmacMiddlewareFactory {
    hmac_header: String,
    key: Secret<String>,
    // If false, then the middleware will not check the HMAC signature and always allow the call
    enabled: bool,
}

impl HmacMiddlewareFactory {
    pub fn new(hmac_header: &str, key: Secret<String>, enabled: bool) -> Self {
        HmacMiddlewareFactory { hmac_header: hmac_header.into(), key, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            hmac_header: self.hmac_header.clone(),
            key: self.key.clone(),
            enabled: self.enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    hmac_header: String,
    key: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.key.reveal().clone();
        let hmac_header = self.hmac_header.clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking HMAC for request");
            if !enabled {
                trace!("🔐️ HMAC checks are disabled. Allowing request.");
                return service.call(req).await.map(ServiceResponse::map_into_left_body);
            }
            let data = match req.extract::<web::Bytes>().await {
                Ok(data) => data,
                Err(e) => {
                    warn!("🔐️ Failed to extract request data: {e:?}");
                    let err = ServerError::InvalidRequestBody("Failed to extract request data.".into());
                    return Ok(req.error_response(err).map_into_right_body());
                },
            };
            let signature = req.headers().get(&hmac_header).and_then(|v| v.to_str().ok()).map(String::from);
            let verdict = match signature {
                None => Err(AuthError::InvalidSignature("No HMAC signature found.".into())),
                Some(_) if secret.is_empty() => Err(AuthError::InvalidSignature("No HMAC secret configured.".into())),
                Some(sig) if verify_hmac(&secret, data.as_ref(), &sig) => Ok(()),
                Some(_) => Err(AuthError::InvalidSignature("Invalid HMAC signature.".into())),
            };
            match verdict {
                Ok(()) => {
                    trace!("🔐️ HMAC check for request ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                },
                Err(e) => {
                    warn!("🔐️ {e} Denying access.");
                    Ok(req.error_response(ServerError::AuthenticationError(e)).map_into_right_body())
                },
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
