//! Concurrency limits for async dispatch
//!
//! `Dispatcher` bounds in-flight async calls two ways: a global semaphore
//! of `max_requests` permits and one semaphore of `max_requests_per_host`
//! permits per `host:port`. Permits are held for one physical attempt, so
//! a caller sleeping between rate-limit retries does not hold a slot.
//! The synchronous path is not throttled; it runs on the caller's thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::trace;

use crate::error::{Error, Result};
use crate::{BoxFuture, HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug)]
pub struct Dispatcher<T> {
    inner: T,
    total: Arc<Semaphore>,
    per_host_limit: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl<T: HttpTransport> Dispatcher<T> {
    pub fn new(inner: T, max_requests: usize, max_requests_per_host: usize) -> Self {
        Self {
            inner,
            total: Arc::new(Semaphore::new(max_requests)),
            per_host_limit: max_requests_per_host,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn host_semaphore(&self, host: String) -> Arc<Semaphore> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)))
            .clone()
    }
}

impl<T: HttpTransport> HttpTransport for Dispatcher<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.inner.execute(request)
    }

    fn execute_async<'a>(
        &'a self,
        request: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<HttpResponse>> {
        Box::pin(async move {
            let host = request.host_key();
            let host_permits = self.host_semaphore(host.clone());
            // host first, so a call parked on a busy host does not hold a global slot
            let _host = host_permits
                .acquire()
                .await
                .map_err(|_| Error::DispatcherClosed)?;
            let _total = self
                .total
                .acquire()
                .await
                .map_err(|_| Error::DispatcherClosed)?;
            trace!(host = %host, available = self.total.available_permits(), "dispatching");
            self.inner.execute_async(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::status;
    use crate::{HttpMethod, Url};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Tracks the peak number of overlapping async calls.
    #[derive(Default)]
    struct SlowTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl HttpTransport for SlowTransport {
        fn execute(&self, _request: &HttpRequest) -> Result<HttpResponse> {
            Ok(status(200))
        }

        fn execute_async<'a>(
            &'a self,
            _request: &'a HttpRequest,
        ) -> BoxFuture<'a, Result<HttpResponse>> {
            Box::pin(async move {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(status(200))
            })
        }
    }

    fn request_to(host: &str) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Get,
            Url::parse(&format!("https://{host}/api/v2/users")).unwrap(),
        )
    }

    async fn run_batch(dispatcher: Arc<Dispatcher<SlowTransport>>, hosts: &[&str]) {
        let mut handles = Vec::new();
        for host in hosts {
            let dispatcher = dispatcher.clone();
            let request = request_to(host);
            handles.push(tokio::spawn(async move {
                dispatcher.execute_async(&request).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn per_host_limit_bounds_concurrency() {
        let dispatcher = Arc::new(Dispatcher::new(SlowTransport::default(), 64, 2));
        run_batch(dispatcher.clone(), &["a.test"; 8]).await;
        assert_eq!(dispatcher.inner().peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn total_limit_bounds_across_hosts() {
        let dispatcher = Arc::new(Dispatcher::new(SlowTransport::default(), 3, 5));
        run_batch(
            dispatcher.clone(),
            &["a.test", "b.test", "c.test", "d.test", "e.test", "f.test"],
        )
        .await;
        assert_eq!(dispatcher.inner().peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_hosts_get_independent_limits() {
        let dispatcher = Arc::new(Dispatcher::new(SlowTransport::default(), 64, 1));
        run_batch(dispatcher.clone(), &["a.test", "b.test", "c.test"]).await;
        assert_eq!(dispatcher.inner().peak.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn sync_path_is_not_throttled() {
        let dispatcher = Dispatcher::new(SlowTransport::default(), 1, 1);
        let response = dispatcher.execute(&request_to("a.test")).unwrap();
        assert_eq!(response.status(), 200);
    }
}
