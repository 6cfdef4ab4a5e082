use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::broadcast;

use djed_effect::{Effect, EffectError, RetryPolicy};

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::descriptor::RequestDescriptor;
use crate::error::HttpError;
use crate::events::HttpEvent;

pub type Interceptor = Arc<dyn Fn(RequestDescriptor) -> Effect<(), HttpError, RequestDescriptor> + Send + Sync>;

/// A completed response (spec.md §4.3's third pipeline stage).
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

struct Inner {
    http: reqwest::Client,
    breaker: CircuitBreaker,
    interceptors: Vec<Interceptor>,
    events: broadcast::Sender<HttpEvent>,
}

/// The request pipeline: interceptors, retry, circuit breaker (spec.md
/// §4.3). Cheap to clone — internals are `Arc`-shared, which is what lets
/// `send` build a 'static [`Effect`] closure capturing the client.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::with_breaker_config(BreakerConfig::default())
    }

    pub fn with_breaker_config(config: BreakerConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                breaker: CircuitBreaker::new(config),
                interceptors: Vec::new(),
                events,
            }),
        }
    }

    /// Appends an interceptor to the pipeline. Interceptors run in
    /// registration order, each receiving the previous one's output
    /// (spec.md §4.3 step 2). Must be called before the client is cloned.
    pub fn add_interceptor(mut self, interceptor: impl Fn(RequestDescriptor) -> Effect<(), HttpError, RequestDescriptor> + Send + Sync + 'static) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("add_interceptor must run before the client is shared/cloned")
            .interceptors
            .push(Arc::new(interceptor));
        self
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<HttpEvent> {
        self.inner.events.subscribe()
    }

    pub fn breaker_state(&self, endpoint_key: &str) -> crate::breaker::BreakerState {
        self.inner.breaker.state(endpoint_key)
    }

    /// Runs every interceptor over `descriptor` in order, short-circuiting
    /// on the first failure.
    fn run_interceptors(&self, descriptor: RequestDescriptor) -> Effect<(), HttpError, RequestDescriptor> {
        self.inner.interceptors.iter().cloned().fold(Effect::succeed(descriptor), |acc, interceptor| {
            acc.flat_map(move |descriptor| interceptor(descriptor))
        })
    }

    fn emit_breaker_transition(&self, endpoint_key: &str, transition: Option<crate::breaker::BreakerState>) {
        if let Some(to) = transition {
            let _ = self.inner.events.send(HttpEvent::BreakerTransitioned { endpoint_key: endpoint_key.to_string(), to });
        }
    }

    /// Sends one request attempt: no retry, no interceptors — just breaker
    /// check, dispatch, and breaker bookkeeping. `attempt_counter` is shared
    /// across every invocation of this effect within one `send()` call (the
    /// retry loop re-runs the same `Effect`, so its `Arc`-captured state
    /// persists across attempts) so events report the real attempt number.
    fn attempt(&self, descriptor: RequestDescriptor, attempt_counter: Arc<AtomicU32>) -> Effect<(), HttpError, HttpResponse> {
        let client = self.clone();
        Effect::from_async(move || {
            let client = client.clone();
            let descriptor = descriptor.clone();
            let attempt_counter = attempt_counter.clone();
            async move {
                let attempt = attempt_counter.fetch_add(1, Ordering::SeqCst) + 1;
                let endpoint_key = descriptor.resolved_endpoint_key();
                let transition = client.inner.breaker.before_call(&endpoint_key)?;
                client.emit_breaker_transition(&endpoint_key, transition);

                let mut request = client.inner.http.request(descriptor.method.clone(), &descriptor.url);
                let mut header_map = HeaderMap::new();
                for (name, value) in &descriptor.headers {
                    if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                        header_map.insert(name, value);
                    }
                }
                request = request.headers(header_map);
                if let Some(ref body) = descriptor.body {
                    request = request.body(body.clone());
                }
                if let Some(timeout) = descriptor.timeout {
                    request = request.timeout(timeout);
                }

                let _ = client.inner.events.send(HttpEvent::AttemptStarted { endpoint_key: endpoint_key.clone(), attempt });
                let started_at = Instant::now();

                let outcome = request.send().await;
                let response = match outcome {
                    Ok(response) => response,
                    Err(e) if e.is_timeout() => {
                        let transition = client.inner.breaker.record_failure(&endpoint_key);
                        client.emit_breaker_transition(&endpoint_key, transition);
                        let _ = client.inner.events.send(HttpEvent::AttemptFailed {
                            endpoint_key,
                            attempt,
                            error: "timeout".to_string(),
                            duration_ms: started_at.elapsed().as_millis() as u64,
                        });
                        return Err(HttpError::Timeout);
                    }
                    Err(e) => {
                        let transition = client.inner.breaker.record_failure(&endpoint_key);
                        client.emit_breaker_transition(&endpoint_key, transition);
                        let _ = client.inner.events.send(HttpEvent::AttemptFailed {
                            endpoint_key,
                            attempt,
                            error: e.to_string(),
                            duration_ms: started_at.elapsed().as_millis() as u64,
                        });
                        return Err(HttpError::Network(e.to_string()));
                    }
                };

                let status = response.status();
                let headers: Vec<(String, String)> = response
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                    .collect();

                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    let transition = client.inner.breaker.record_failure(&endpoint_key);
                    client.emit_breaker_transition(&endpoint_key, transition);
                    let _ = client.inner.events.send(HttpEvent::AttemptFailed {
                        endpoint_key,
                        attempt,
                        error: format!("status {}", status.as_u16()),
                        duration_ms: started_at.elapsed().as_millis() as u64,
                    });
                    return Err(HttpError::Non2xx { status: status.as_u16(), body });
                }

                let body = response.bytes().await.map_err(|e| HttpError::Network(e.to_string()))?.to_vec();
                let transition = client.inner.breaker.record_success(&endpoint_key);
                client.emit_breaker_transition(&endpoint_key, transition);
                let _ = client.inner.events.send(HttpEvent::AttemptSucceeded {
                    endpoint_key,
                    attempt,
                    status: status.as_u16(),
                    duration_ms: started_at.elapsed().as_millis() as u64,
                });
                Ok(HttpResponse { status: status.as_u16(), headers, body })
            }
        })
    }

    /// Runs the full pipeline: interceptors, attempt, retry (if the
    /// descriptor carries a [`djed_effect::RetryPolicy`]), and an overall
    /// timeout (if the descriptor carries one).
    pub fn send(&self, descriptor: RequestDescriptor) -> Effect<(), HttpError, HttpResponse> {
        let client = self.clone();
        let retry_policy = descriptor.retry.clone();
        let overall_timeout = descriptor.timeout;

        let pipeline = self.run_interceptors(descriptor).flat_map(move |descriptor| {
            let attempt_counter = Arc::new(AtomicU32::new(0));
            let attempt_effect = client.attempt(descriptor, attempt_counter);
            match &retry_policy {
                Some(policy) => retry_eligible(attempt_effect, policy.clone()),
                None => attempt_effect,
            }
        });

        match overall_timeout {
            Some(duration) => collapse(pipeline.timeout(duration)),
            None => pipeline,
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-runs `effect` up to `policy.attempts` times like
/// `djed_effect::Effect::retry`, but additionally consults
/// [`HttpError::is_retryable`] so a non-retryable failure (a plain 4xx, a
/// tripped breaker) short-circuits the loop immediately instead of burning
/// through the remaining attempts (spec.md §4.3 step 5). The generic
/// combinator in `djed-effect` has no notion of per-domain retry
/// eligibility, so this stays local to `djed-http`.
fn retry_eligible(effect: Effect<(), HttpError, HttpResponse>, policy: RetryPolicy) -> Effect<(), HttpError, HttpResponse> {
    Effect::new(move |env: (), token| {
        let effect = effect.clone();
        let policy = policy.clone();
        async move {
            let mut attempt = 1;
            loop {
                match effect.run_with_cancellation(env, token.clone()).await {
                    Ok(value) => return Ok(value),
                    Err(error) => {
                        if attempt >= policy.attempts || !error.is_retryable() {
                            return Err(error);
                        }
                        tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                        attempt += 1;
                    }
                }
            }
        }
    })
}

/// Folds [`EffectError<HttpError>`] back into plain `HttpError`, mapping the
/// combinator-introduced `Timeout`/`Cancelled` variants onto their
/// `HttpError` counterparts so callers always see one error type.
fn collapse<A>(effect: Effect<(), EffectError<HttpError>, A>) -> Effect<(), HttpError, A>
where
    A: Send + 'static,
{
    Effect::new(move |env, token| {
        let effect = effect.clone();
        async move {
            effect.run_with_cancellation(env, token).await.map_err(|error| match error {
                EffectError::Timeout => HttpError::Timeout,
                EffectError::Cancelled => HttpError::Cancelled,
                EffectError::Failure(inner) => inner,
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn get_request_returns_body_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/widgets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "sprocket"})))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        let response = client.send(RequestDescriptor::get(format!("{}/widgets", server.uri()))).run(()).await.unwrap();

        assert_eq!(response.status, 200);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["name"], "sprocket");
    }

    #[tokio::test]
    async fn non_2xx_response_is_reported_as_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/missing")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let client = HttpClient::new();
        let result = client.send(RequestDescriptor::get(format!("{}/missing", server.uri()))).run(()).await;

        assert!(matches!(result, Err(HttpError::Non2xx { status: 404, .. })));
    }

    #[tokio::test]
    async fn interceptors_run_in_registration_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/order")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let client = HttpClient::new()
            .add_interceptor(|descriptor: RequestDescriptor| Effect::succeed(descriptor.header("x-order", "1")))
            .add_interceptor(|descriptor: RequestDescriptor| {
                let previous = descriptor.headers.iter().find(|(k, _)| k == "x-order").map(|(_, v)| v.clone());
                Effect::succeed(descriptor.header("x-order", format!("{}-2", previous.unwrap_or_default())))
            });

        let descriptor = client.run_interceptors(RequestDescriptor::get(format!("{}/order", server.uri()))).run(()).await.unwrap();

        let values: Vec<&str> = descriptor.headers.iter().filter(|(k, _)| k == "x-order").map(|(_, v)| v.as_str()).collect();
        assert_eq!(values, vec!["1", "1-2"]);
    }

    #[tokio::test]
    async fn retry_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET")).and(path("/flaky")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let client = HttpClient::new();
        let descriptor = RequestDescriptor::get(format!("{}/flaky", server.uri())).retry(RetryPolicy::fixed(3, Duration::from_millis(1)));
        let response = client.send(descriptor).run(()).await.unwrap();

        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn retry_exhaustion_surfaces_last_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/always-down")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let client = HttpClient::new();
        let descriptor = RequestDescriptor::get(format!("{}/always-down", server.uri())).retry(RetryPolicy::fixed(2, Duration::from_millis(1)));
        let result = client.send(descriptor).run(()).await;

        assert!(matches!(result, Err(HttpError::Non2xx { status: 503, .. })));
    }

    #[tokio::test]
    async fn non_retryable_status_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/bad-request")).respond_with(ResponseTemplate::new(400)).mount(&server).await;

        let client = HttpClient::new();
        let mut events = client.subscribe_events();
        let descriptor = RequestDescriptor::get(format!("{}/bad-request", server.uri())).retry(RetryPolicy::fixed(5, Duration::from_millis(1)));
        let result = client.send(descriptor).run(()).await;

        assert!(matches!(result, Err(HttpError::Non2xx { status: 400, .. })));
        let mut attempts = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, HttpEvent::AttemptStarted { .. }) {
                attempts += 1;
            }
        }
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn retryable_status_429_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate-limited"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET")).and(path("/rate-limited")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let client = HttpClient::new();
        let descriptor = RequestDescriptor::get(format!("{}/rate-limited", server.uri())).retry(RetryPolicy::fixed(3, Duration::from_millis(1)));
        let response = client.send(descriptor).run(()).await.unwrap();

        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn breaker_opens_after_threshold_and_short_circuits_further_sends() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/unstable")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let client = HttpClient::with_breaker_config(BreakerConfig {
            failure_threshold: 2,
            open_duration: Duration::from_secs(30),
            half_open_max_calls: 1,
            success_threshold: 1,
        });
        let descriptor = RequestDescriptor::get(format!("{}/unstable", server.uri()));

        for _ in 0..2 {
            let result = client.send(descriptor.clone()).run(()).await;
            assert!(matches!(result, Err(HttpError::Non2xx { .. })));
        }

        let result = client.send(descriptor).run(()).await;
        assert!(matches!(result, Err(HttpError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn events_report_increasing_attempt_numbers_and_duration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/count"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET")).and(path("/count")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let client = HttpClient::new();
        let mut events = client.subscribe_events();
        let descriptor = RequestDescriptor::get(format!("{}/count", server.uri())).retry(RetryPolicy::fixed(3, Duration::from_millis(1)));
        client.send(descriptor).run(()).await.unwrap();

        let mut attempts_seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                HttpEvent::AttemptStarted { attempt, .. } => attempts_seen.push(attempt),
                HttpEvent::AttemptSucceeded { duration_ms, .. } | HttpEvent::AttemptFailed { duration_ms, .. } => {
                    let _ = duration_ms;
                }
                HttpEvent::BreakerTransitioned { .. } => {}
            }
        }
        assert_eq!(attempts_seen, vec![1, 2]);
    }

    #[tokio::test]
    async fn events_are_broadcast_for_each_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/events")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

        let client = HttpClient::new();
        let mut events = client.subscribe_events();
        client.send(RequestDescriptor::get(format!("{}/events", server.uri()))).run(()).await.unwrap();

        let seen = AtomicUsize::new(0);
        while let Ok(event) = events.try_recv() {
            if matches!(event, HttpEvent::AttemptStarted { .. } | HttpEvent::AttemptSucceeded { .. }) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
