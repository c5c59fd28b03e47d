use std::future::Future;
use std::sync::Arc;

use crate::data::{Request, Response};

/// Sends one request and returns whatever the server answered.
///
/// This is the only capability the executor needs from the network. A
/// transport must not interpret status codes: a `503` is an `Ok` response,
/// and only failures to obtain a response at all are errors. Retries,
/// caching and cancellation are layered on top by [`Client`](crate::Client).
///
/// # Implementations
///
/// - [`ReqwestTransport`]: production implementation using `reqwest`
/// - Scripted mocks for testing
///
/// # Examples
///
/// ```
/// use std::convert::Infallible;
///
/// use http::{Method, StatusCode};
/// use tenaci::{Request, Response, Transport};
///
/// struct Overloaded;
///
/// impl Transport for Overloaded {
///     type Error = Infallible;
///
///     async fn send(&self, _request: Request) -> Result<Response, Infallible> {
///         Ok(Response::new(StatusCode::SERVICE_UNAVAILABLE, "busy"))
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let request = Request::new(Method::GET, "http://svc.test/".parse().unwrap());
/// let response = Overloaded.send(request).await.unwrap();
/// assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
/// # });
/// ```
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Perform one attempt of `request`.
    ///
    /// # Arguments
    ///
    /// * `request` - The request to send. The retry loop passes a fresh clone
    ///   on every attempt, so the body can be consumed.
    ///
    /// # Returns
    ///
    /// The response with its status, headers and a body that may still be
    /// streaming. Any status, including `4xx` and `5xx`, is returned as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` when no response was obtained: connection
    /// refused or reset, DNS failure, TLS errors, or a transport-level timeout.
    fn send(&self, request: Request) -> impl Future<Output = Result<Response, Self::Error>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    type Error = T::Error;

    fn send(&self, request: Request) -> impl Future<Output = Result<Response, Self::Error>> + Send {
        (**self).send(request)
    }
}

impl<T: Transport> Transport for &T {
    type Error = T::Error;

    fn send(&self, request: Request) -> impl Future<Output = Result<Response, Self::Error>> + Send {
        (**self).send(request)
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use futures_util::TryStreamExt;
    use reqwest::Client;

    use super::*;
    use crate::data::Body;
    use crate::error::BoxError;

    /// Transport backed by a `reqwest::Client`. Response bodies are streamed.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Result<Self, reqwest::Error> {
            let client = Client::builder().build()?;
            Ok(Self { client })
        }

        pub fn with_client(client: Client) -> Self { Self { client } }
    }

    impl Transport for ReqwestTransport {
        type Error = reqwest::Error;

        async fn send(&self, request: Request) -> Result<Response, Self::Error> {
            let mut builder = self
                .client
                .request(request.method, request.url)
                .headers(request.headers);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let stream = response.bytes_stream().map_err(|e| Box::new(e) as BoxError);

            Ok(Response {
                status,
                headers,
                body: Body::from_stream(stream),
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;
