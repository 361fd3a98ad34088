//! Metric naming and eligibility filtering.
//!
//! Two textual forms of a [`MetricIdentity`] coexist because exclusion
//! patterns are written against one or the other:
//! - dotted: `group.type[.scope].name`, used for document names and
//!   [`ExcludeRegexPredicate`]
//! - MBean-style: `group:type=T[,scope=S],name=N`, used by [`ExcludeMBeanPredicate`]

use crate::core::{MetricIdentity, MetricSample, Result};
use regex::Regex;

/// Dotted form of an identity: `group.type.name` or `group.type.scope.name`.
pub fn sanitize_name(identity: &MetricIdentity) -> String {
    let mut name = String::with_capacity(
        identity.group().len() + identity.kind().len() + identity.name().len() + 16,
    );
    name.push_str(identity.group());
    name.push('.');
    name.push_str(identity.kind());
    name.push('.');
    if let Some(scope) = identity.scope() {
        name.push_str(scope);
        name.push('.');
    }
    name.push_str(identity.name());
    name
}

/// MBean-style form of an identity: `group:type=T[,scope=S],name=N`.
pub fn sanitize_mbean_name(identity: &MetricIdentity) -> String {
    let mut name = String::with_capacity(
        identity.group().len() + identity.kind().len() + identity.name().len() + 32,
    );
    name.push_str(identity.group());
    name.push_str(":type=");
    name.push_str(identity.kind());
    if let Some(scope) = identity.scope() {
        name.push_str(",scope=");
        name.push_str(scope);
    }
    name.push_str(",name=");
    name.push_str(identity.name());
    name
}

/// Replace spaces and hyphens with underscores.
pub fn replace_special_chars(value: &str) -> String {
    value.replace([' ', '-'], "_")
}

/// Decides whether a metric is reported this cycle.
///
/// Only the identity is required; `sample` is `None` when the predicate is
/// evaluated before the registry has been sampled.
pub trait MetricPredicate: Send + Sync {
    /// Returns true if the metric should be reported
    fn matches(&self, identity: &MetricIdentity, sample: Option<&MetricSample>) -> bool;
}

/// Accepts every metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMetrics;

impl MetricPredicate for AllMetrics {
    fn matches(&self, _identity: &MetricIdentity, _sample: Option<&MetricSample>) -> bool {
        true
    }
}

/// Compile `pattern` so that it only matches a whole string.
fn full_match(pattern: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", pattern))?)
}

/// Excludes metrics whose dotted name fully matches a pattern.
#[derive(Debug, Clone)]
pub struct ExcludeRegexPredicate {
    pattern: Regex,
}

impl ExcludeRegexPredicate {
    /// Compile the exclusion pattern
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: full_match(pattern)?,
        })
    }
}

impl MetricPredicate for ExcludeRegexPredicate {
    fn matches(&self, identity: &MetricIdentity, _sample: Option<&MetricSample>) -> bool {
        !self.pattern.is_match(&sanitize_name(identity))
    }
}

/// Excludes metrics whose MBean-style name fully matches a pattern.
#[derive(Debug, Clone)]
pub struct ExcludeMBeanPredicate {
    pattern: Regex,
}

impl ExcludeMBeanPredicate {
    /// Compile the exclusion pattern
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: full_match(pattern)?,
        })
    }
}

impl MetricPredicate for ExcludeMBeanPredicate {
    fn matches(&self, identity: &MetricIdentity, _sample: Option<&MetricSample>) -> bool {
        !self.pattern.is_match(&sanitize_mbean_name(identity))
    }
}

impl<F> MetricPredicate for F
where
    F: Fn(&MetricIdentity) -> bool + Send + Sync,
{
    fn matches(&self, identity: &MetricIdentity, _sample: Option<&MetricSample>) -> bool {
        self(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name(&MetricIdentity::new("group", "type", "name")), "group.type.name");
        assert_eq!(
            sanitize_name(&MetricIdentity::scoped("group", "type", "name", "scope")),
            "group.type.scope.name"
        );
    }

    #[test]
    fn test_sanitize_mbean_name() {
        assert_eq!(
            sanitize_mbean_name(&MetricIdentity::new("group", "type", "name")),
            "group:type=type,name=name"
        );
        assert_eq!(
            sanitize_mbean_name(&MetricIdentity::scoped("group", "type", "name", "scope")),
            "group:type=type,scope=scope,name=name"
        );
    }

    #[test]
    fn test_replace_special_chars() {
        assert_eq!(replace_special_chars("PS Old-Gen"), "PS_Old_Gen");
        assert_eq!(replace_special_chars("plain"), "plain");
    }

    #[test]
    fn test_replace_special_chars_is_idempotent() {
        for input in ["a b-c", "  --", "already_clean", "Code Cache", ""] {
            let once = replace_special_chars(input);
            assert_eq!(replace_special_chars(&once), once);
        }
    }

    #[test]
    fn test_all_metrics() {
        assert!(AllMetrics.matches(&MetricIdentity::new("g", "t", "n"), None));
    }

    #[test]
    fn test_exclude_regex() {
        let one = ExcludeRegexPredicate::new("group.*").unwrap();
        assert!(!one.matches(&MetricIdentity::new("group", "type", "matche"), None));

        let two = ExcludeRegexPredicate::new("hoge.*").unwrap();
        assert!(two.matches(&MetricIdentity::new("group", "type", "bar"), None));
    }

    #[test]
    fn test_exclude_regex_is_full_match() {
        // A search would find "type" inside the name; a full match must not.
        let predicate = ExcludeRegexPredicate::new("type").unwrap();
        assert!(predicate.matches(&MetricIdentity::new("group", "type", "name"), None));

        let predicate = ExcludeRegexPredicate::new("group.type.gauge|group.type.counter").unwrap();
        assert!(!predicate.matches(&MetricIdentity::new("group", "type", "gauge"), None));
        assert!(!predicate.matches(&MetricIdentity::new("group", "type", "counter"), None));
        assert!(predicate.matches(&MetricIdentity::new("group", "type", "meter"), None));
    }

    #[test]
    fn test_exclude_mbean() {
        let id = MetricIdentity::scoped("group", "type", "name", "scope");

        let one = ExcludeMBeanPredicate::new("group:.*").unwrap();
        assert!(!one.matches(&id, None));

        let two = ExcludeMBeanPredicate::new("name:.*").unwrap();
        assert!(two.matches(&id, None));
    }

    #[test]
    fn test_closure_predicate() {
        let predicate = |id: &MetricIdentity| id.group() != "internal";
        assert!(predicate.matches(&MetricIdentity::new("kafka", "t", "n"), None));
        assert!(!predicate.matches(&MetricIdentity::new("internal", "t", "n"), None));
    }
}
