//! Request and response hooks around the HTTP round trip.
//!
//! Interceptors run after rate-limit admission and after signing, so they can observe or
//! rewrite what goes over the wire but cannot skip either step.

use std::sync::Arc;

use crate::rest::transport::{ApiRequest, ApiResponse};

/// Transform applied to every outgoing request.
pub type RequestInterceptor = Arc<dyn Fn(ApiRequest) -> ApiRequest + Send + Sync>;

/// Transform applied to every incoming response, before its status is checked.
pub type ResponseInterceptor = Arc<dyn Fn(ApiResponse) -> ApiResponse + Send + Sync>;

/// Ordered interceptor chains.
#[derive(Clone, Default)]
pub(crate) struct Interceptors {
    request: Vec<RequestInterceptor>,
    response: Vec<ResponseInterceptor>,
}

impl Interceptors {
    pub(crate) fn push_request(&mut self, interceptor: RequestInterceptor) {
        self.request.push(interceptor);
    }

    pub(crate) fn push_response(&mut self, interceptor: ResponseInterceptor) {
        self.response.push(interceptor);
    }

    /// Run the request chain in registration order.
    pub(crate) fn on_request(&self, request: ApiRequest) -> ApiRequest {
        self.request.iter().fold(request, |request, f| f(request))
    }

    /// Run the response chain in registration order.
    pub(crate) fn on_response(&self, response: ApiResponse) -> ApiResponse {
        self.response.iter().fold(response, |response, f| f(response))
    }

    pub(crate) fn len(&self) -> (usize, usize) {
        (self.request.len(), self.response.len())
    }
}
