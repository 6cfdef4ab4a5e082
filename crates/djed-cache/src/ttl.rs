use std::time::Duration;

/// A time-to-live that combines with another by taking the longer one
/// (spec.md §3 "TTL monoid: combining two TTLs yields `max`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ttl(Duration);

impl Ttl {
    pub fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Resolves the effective TTL of a `get_or_set` call (SPEC_FULL.md's
    /// Open Question resolution): the per-call TTL if given, else the
    /// instance default; when both are present, the longer of the two.
    pub fn resolve(per_call: Option<Ttl>, default: Option<Ttl>) -> Option<Ttl> {
        match (per_call, default) {
            (Some(a), Some(b)) => Some(a.combine(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    pub fn combine(self, other: Ttl) -> Ttl {
        Ttl(self.0.max(other.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_keeps_the_longer_duration() {
        let a = Ttl::from_secs(30);
        let b = Ttl::from_secs(60);
        assert_eq!(a.combine(b), Ttl::from_secs(60));
        assert_eq!(b.combine(a), Ttl::from_secs(60));
    }

    #[test]
    fn resolve_prefers_per_call_when_default_absent() {
        let resolved = Ttl::resolve(Some(Ttl::from_secs(10)), None);
        assert_eq!(resolved, Some(Ttl::from_secs(10)));
    }

    #[test]
    fn resolve_combines_both_when_present() {
        let resolved = Ttl::resolve(Some(Ttl::from_secs(10)), Some(Ttl::from_secs(45)));
        assert_eq!(resolved, Some(Ttl::from_secs(45)));
    }

    #[test]
    fn resolve_is_none_when_neither_present() {
        assert_eq!(Ttl::resolve(None, None), None);
    }
}
