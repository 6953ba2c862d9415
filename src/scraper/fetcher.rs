use crate::scraper::error::{RetryExhausted, TransportError};
use crate::scraper::rate_limiter::RateLimiter;
use crate::scraper::retry::RetryPolicy;
use crate::types::window::FetchTask;
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;

/// Issues a GET request and returns the response body as text.
///
/// Only failures below HTTP count as errors. A response with an error status is
/// still a body: the monitoring service reports its errors in the body.
pub trait SourceClient: Send + Sync {
    fn get_text(&self, url: &str) -> impl Future<Output = Result<String, TransportError>> + Send;
}

impl SourceClient for reqwest::Client {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        let request_error = |source| TransportError::Request {
            url: url.to_string(),
            source,
        };
        let response = self.get(url).send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            debug!("{} answered with status {}", url, status);
        }
        response.text().await.map_err(request_error)
    }
}

/// Adapts an async closure into a [`SourceClient`].
///
/// ```
/// use sealevel_observer::{FnSource, TransportError};
///
/// let source = FnSource(|_url: &str| async { Ok::<_, TransportError>("[]".to_string()) });
/// ```
pub struct FnSource<F>(pub F);

impl<F, Fut> SourceClient for FnSource<F>
where
    F: Fn(&str) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, TransportError>> + Send,
{
    fn get_text(&self, url: &str) -> impl Future<Output = Result<String, TransportError>> + Send {
        (self.0)(url)
    }
}

/// The terminal result of one [`FetchTask`]: the body, or the reason retries ran out.
#[derive(Debug)]
pub struct FetchOutcome {
    pub task: FetchTask,
    pub result: Result<String, RetryExhausted>,
}

impl FetchOutcome {
    pub fn body(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }
}

pub struct Fetcher<C> {
    client: C,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl<C: SourceClient> Fetcher<C> {
    pub fn new(client: C, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            client,
            limiter,
            retry,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetches the task's URL; every attempt first passes the rate limiter.
    pub async fn fetch(&self, task: FetchTask) -> FetchOutcome {
        let label = task.to_string();
        let result = {
            let limiter = &self.limiter;
            let client = &self.client;
            let url = task.url();
            self.retry
                .run(&label, || async move {
                    limiter.acquire().await;
                    client.get_text(url).await
                })
                .await
        };
        if let Err(e) = &result {
            warn!("{}: fetch failed: {}", label, e);
        }
        FetchOutcome { task, result }
    }
}
