use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream of response body chunks.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Response head plus the body stream.
pub struct HttpResponse<E> {
    pub status: u16,
    pub content_length: Option<u64>,
    /// `Location` header, kept so the fetcher can follow redirects itself.
    pub location: Option<String>,
    pub body: BoxStream<'static, std::result::Result<Bytes, E>>,
}

impl<E> std::fmt::Debug for HttpResponse<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Asynchronous HTTP client abstraction.
///
/// Implementations must not follow redirects or turn error statuses into errors:
/// the [`Fetcher`](super::Fetcher) owns both policies so they behave the same for
/// every client.
///
/// # Implementations
///
/// - [`ReqwestClient`]: production implementation using `reqwest`
/// - in-memory clients in tests
pub trait HttpClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Issue a GET and return as soon as the response head is available.
    fn stream(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = std::result::Result<HttpResponse<Self::Error>, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::time::Duration;

    use futures_util::StreamExt;
    use reqwest::header::LOCATION;
    use reqwest::redirect::Policy;

    use super::*;

    const USER_AGENT: &str = concat!("keygate-fetch/", env!("CARGO_PKG_VERSION"));

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Client with the given TCP/TLS connect timeout.
        pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .redirect(Policy::none())
                .tcp_keepalive(Duration::from_secs(60))
                .user_agent(USER_AGENT)
                .build()?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn stream(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> std::result::Result<HttpResponse<Self::Error>, Self::Error> {
            let mut request = self.client.get(url);
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }

            let response = request.send().await?;
            let status = response.status().as_u16();
            let content_length = response.content_length();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let body = response.bytes_stream().boxed();

            Ok(HttpResponse {
                status,
                content_length,
                location,
                body,
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
