//! IP whitelist middleware.
//!
//! Only callers whose address appears in the whitelist are let through. With no whitelist configured, every caller
//! is allowed. The caller's address is resolved with [`get_remote_ip`], so proxy headers are honoured only when the
//! server is configured to trust them.

use std::{
    future::{ready, Ready},
    net::IpAddr,
    rc::Rc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{info, warn};

use crate::{
    config::ServerOptions,
    errors::{AuthError, ServerError},
    helpers::get_remote_ip,
};

pub struct WhitelistMiddlewareFactory {
    whitelist: Option<Rc<Vec<IpAddr>>>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
}

impl WhitelistMiddlewareFactory {
    pub fn new(options: &ServerOptions) -> Self {
        Self {
            whitelist: options.verifier_whitelist.clone().map(Rc::new),
            use_x_forwarded_for: options.use_x_forwarded_for,
            use_forwarded: options.use_forwarded,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WhitelistMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = WhitelistMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WhitelistMiddlewareService {
            whitelist: self.whitelist.clone(),
            use_x_forwarded_for: self.use_x_forwarded_for,
            use_forwarded: self.use_forwarded,
            service: Rc::new(service),
        }))
    }
}

pub struct WhitelistMiddlewareService<S> {
    whitelist: Option<Rc<Vec<IpAddr>>>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WhitelistMiddlewareService<S>
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
        let whitelisted = match &self.whitelist {
            None => true,
            Some(whitelist) => {
                match get_remote_ip(req.request(), self.use_x_forwarded_for, self.use_forwarded) {
                    Some(ip) => {
                        info!("🔐️ Payment verifier call from {ip}");
                        whitelist.contains(&ip)
                    },
                    None => {
                        warn!("🔐️ No IP address found for the payment verifier request, denying access.");
                        false
                    },
                }
            },
        };
        Box::pin(async move {
            if whitelisted {
                service.call(req).await.map(ServiceResponse::map_into_left_body)
            } else {
                warn!("🔐️ Payment verifier request from a peer that is not whitelisted. Denying access.");
                let err = ServerError::AuthenticationError(AuthError::ForbiddenPeer);
                Ok(req.error_response(err).map_into_right_body())
            }
        })
    }
}
