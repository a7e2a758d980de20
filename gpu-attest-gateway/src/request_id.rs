use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue},
    response::Response,
};
use std::{
    convert::Infallible,
    fmt,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// The headers a caller can use to provide a request id, in priority order.
pub const REQUEST_ID_HEADERS: [HeaderName; 4] = [
    HeaderName::from_static("x-request-id"),
    HeaderName::from_static("x-ms-request-id"),
    HeaderName::from_static("request-id"),
    HeaderName::from_static("requestid"),
];

/// The header the resolved request id is echoed back in.
pub const RESPONSE_REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-ms-request-id");

/// The correlation id for a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestId {
    /// Taken verbatim from one of the [`REQUEST_ID_HEADERS`].
    Provided(HeaderValue),

    /// Generated because the caller didn't provide one.
    Generated(Uuid),
}

impl RequestId {
    /// Resolve the id for a request out of its headers, generating a new one if none is present.
    ///
    /// The first present, non-empty header wins and its value is kept as is, whatever bytes it contains.
    pub fn resolve(headers: &HeaderMap) -> Self {
        REQUEST_ID_HEADERS
            .iter()
            .filter_map(|name| headers.get(name))
            .find(|value| !value.is_empty())
            .map(|value| Self::Provided(value.clone()))
            .unwrap_or_else(Self::generate)
    }

    pub fn generate() -> Self {
        Self::Generated(Uuid::new_v4())
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }

    /// The value to echo back in the response.
    pub fn header_value(&self) -> Option<HeaderValue> {
        match self {
            Self::Provided(value) => Some(value.clone()),
            Self::Generated(id) => HeaderValue::from_str(&id.to_string()).ok(),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provided(value) => f.write_str(&String::from_utf8_lossy(value.as_bytes())),
            Self::Generated(id) => write!(f, "{id}"),
        }
    }
}

/// A layer that assigns every request a [`RequestId`].
///
/// The id is stored as a request extension, every log emitted while handling the request is tagged with
/// it, and it is echoed back in the `x-ms-request-id` response header.
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestIdMiddleware<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let request_id = RequestId::resolve(req.headers());
        let span = info_span!("request", request_id = %request_id);
        let header = request_id.header_value();
        let generated = request_id.is_generated();
        req.extensions_mut().insert(request_id);
        Box::pin(
            async move {
                if generated {
                    info!("Assigned new request ID");
                }
                let mut response = inner.call(req).await?;
                if let Some(header) = header {
                    response.headers_mut().insert(RESPONSE_REQUEST_ID_HEADER, header);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
