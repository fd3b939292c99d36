//! The one outbound call the importer makes, behind a small trait so tests
//! can stand in for the network.

use bankfeed_core::SubmissionError;
use reqwest::header::HeaderMap;
use std::future::Future;
use std::thread;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking POST. Any HTTP status is a response; only transport failures are errors.
pub trait HttpClient {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, SubmissionError>;
}

/// reqwest-backed client that blocks on its own current-thread runtime.
/// Requests always run on that runtime, so its connection pool never outlives
/// the runtime that owns it.
pub struct ReqwestClient {
    // Only `None` while dropping
    runtime: Option<Runtime>,
    client: reqwest::Client,
}

impl ReqwestClient {
    /// `timeout` of `None` keeps reqwest's default (no timeout)
    pub fn new(timeout: Option<Duration>) -> Result<Self, SubmissionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SubmissionError::Transport(format!("create tokio runtime: {e}")))?;

        let mut builder =
            reqwest::Client::builder().user_agent(concat!("bankfeed/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SubmissionError::Transport(format!("build http client: {e}")))?;

        Ok(Self {
            runtime: Some(runtime),
            client,
        })
    }

    async fn post_async(&self, request: &HttpRequest) -> Result<HttpResponse, reqwest::Error> {
        let resp = self
            .client
            .post(request.url.as_str())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(HttpResponse { status, body })
    }

    fn block_on<F>(&self, fut: F) -> Result<F::Output, SubmissionError>
    where
        F: Future + Send,
        F::Output: Send,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| SubmissionError::Transport("runtime has shut down".to_string()))?;

        if Handle::try_current().is_err() {
            return Ok(runtime.block_on(fut));
        }

        // Called from inside some runtime (any flavor): a runtime cannot be
        // entered from within another on the same thread
        thread::scope(|scope| scope.spawn(|| runtime.block_on(fut)).join())
            .map_err(|_| SubmissionError::Transport("request thread panicked".to_string()))
    }
}

impl HttpClient for ReqwestClient {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, SubmissionError> {
        tracing::debug!(url = %request.url, bytes = request.body.len(), "POST");
        self.block_on(self.post_async(request))?
            .map_err(|e| SubmissionError::Transport(e.to_string()))
    }
}

impl Drop for ReqwestClient {
    fn drop(&mut self) {
        // A plain drop panics when the client is dropped inside async code
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
