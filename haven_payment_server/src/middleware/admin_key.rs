//! Admin API-key middleware for Actix Web.
//!
//! Admin clients must present the configured static key in the `x-admin-api-key` header. The
//! comparison runs in constant time, and a server with no key configured rejects every admin
//! call rather than letting them through unchecked.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error,
};
use futures::future::LocalBoxFuture;
use hps_common::Secret;
use log::{trace, warn};

use crate::helpers::constant_time_eq;

pub const ADMIN_KEY_HEADER: &str = "x-admin-api-key";

pub struct AdminKeyMiddlewareFactory {
    key: Option<Secret<String>>,
}

impl AdminKeyMiddlewareFactory {
    pub fn new(key: Option<Secret<String>>) -> Self {
        AdminKeyMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminKeyMiddlewareService { key: self.key.clone(), service: Rc::new(service) }))
    }
}

pub struct AdminKeyMiddlewareService<S> {
    key: Option<Secret<String>>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let key = self.key.clone();
        Box::pin(async move {
            trace!("🔐️ Checking admin API key for request");
            let Some(key) = key else {
                warn!("🔐️ Admin API call received but no admin key is configured. Denying access.");
                return Err(ErrorUnauthorized("Admin API is not enabled."));
            };
            let presented = req.headers().get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()).ok_or_else(|| {
                warn!("🔐️ No admin API key found in request. Denying access.");
                ErrorUnauthorized("No admin API key provided.")
            })?;
            if constant_time_eq(presented.as_bytes(), key.reveal().as_bytes()) {
                trace!("🔐️ Admin API key check ✅️");
                service.call(req).await
            } else {
                warn!("🔐️ Invalid admin API key presented. Denying access.");
                Err(ErrorUnauthorized("Invalid admin API key."))
            }
        })
    }
}
