use std::time::Duration;

use reqwest::Method;

use djed_effect::RetryPolicy;

/// An immutable description of a request to send. Interceptors receive a
/// `RequestDescriptor` and return a new one rather than mutating in place
/// (spec.md §4.3 step 2).
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    /// Overrides the default `METHOD + host + path-template` breaker key
    /// (spec.md §6) for endpoints whose URL contains high-cardinality path
    /// segments (IDs) that would otherwise fragment the breaker's state.
    pub endpoint_key: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            retry: None,
            endpoint_key: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn endpoint_key(mut self, key: impl Into<String>) -> Self {
        self.endpoint_key = Some(key.into());
        self
    }

    /// The key a [`crate::breaker::CircuitBreaker`] tracks state under:
    /// the explicit override, or `METHOD + host + path-template` with
    /// dynamic segments collapsed (spec.md §6) so `/users/123` and
    /// `/users/456` share one breaker bucket instead of fragmenting state
    /// per resource id.
    pub fn resolved_endpoint_key(&self) -> String {
        if let Some(ref key) = self.endpoint_key {
            return key.clone();
        }
        match reqwest::Url::parse(&self.url) {
            Ok(parsed) => format!("{} {}{}", self.method, parsed.host_str().unwrap_or(""), collapse_dynamic_segments(parsed.path())),
            Err(_) => format!("{} {}", self.method, self.url),
        }
    }
}

/// Replaces path segments that look like an id (all-digit, or a UUID) with
/// `:id`, so per-resource URLs collapse onto one breaker/event bucket by
/// default.
fn collapse_dynamic_segments(path: &str) -> String {
    path.split('/').map(|segment| if is_dynamic_segment(segment) { ":id" } else { segment }).collect::<Vec<_>>().join("/")
}

fn is_dynamic_segment(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    is_uuid_like(segment)
}

fn is_uuid_like(segment: &str) -> bool {
    let parts: Vec<&str> = segment.split('-').collect();
    parts.len() == 5
        && [8, 4, 4, 4, 12].iter().zip(&parts).all(|(len, part)| part.len() == *len && part.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments_collapse_to_id() {
        assert_eq!(collapse_dynamic_segments("/users/123/orders/456"), "/users/:id/orders/:id");
    }

    #[test]
    fn uuid_segments_collapse_to_id() {
        assert_eq!(collapse_dynamic_segments("/sessions/550e8400-e29b-41d4-a716-446655440000"), "/sessions/:id");
    }

    #[test]
    fn static_segments_are_untouched() {
        assert_eq!(collapse_dynamic_segments("/users/search"), "/users/search");
    }

    #[test]
    fn same_resource_different_ids_share_one_key() {
        let first = RequestDescriptor::get("https://api.example.com/users/123").resolved_endpoint_key();
        let second = RequestDescriptor::get("https://api.example.com/users/456").resolved_endpoint_key();
        assert_eq!(first, second);
    }
}
