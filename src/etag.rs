//! Optimistic-concurrency support.
//!
//! Entities that can be updated or deleted conditionally implement
//! [`ETagHolder`]. The transport turns the held ETag into an `If-Match`
//! header via [`if_match_value`].

/// Capability of an entity that carries the service's version token.
pub trait ETagHolder {
    /// The current ETag, `None` until the entity has round-tripped through
    /// the service.
    fn etag(&self) -> Option<&str>;

    /// Replaces the held ETag.
    fn set_etag(&mut self, etag: String);
}

/// Formats an ETag for the `If-Match` header.
///
/// Surrounding quotes are added when missing. The `*` wildcard is passed
/// through unquoted.
pub fn if_match_value(etag: &str) -> String {
    let etag = etag.trim();
    if etag == "*" {
        return etag.to_string();
    }
    let mut value = String::with_capacity(etag.len() + 2);
    if !etag.starts_with('"') {
        value.push('"');
    }
    value.push_str(etag);
    if !etag.ends_with('"') || etag.len() == 1 {
        value.push('"');
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_etag_is_quoted() {
        assert_eq!(if_match_value("abc"), "\"abc\"");
    }

    #[test]
    fn quoted_etag_is_unchanged() {
        assert_eq!(if_match_value("\"abc\""), "\"abc\"");
    }

    #[test]
    fn half_quoted_etag_is_completed() {
        assert_eq!(if_match_value("\"abc"), "\"abc\"");
        assert_eq!(if_match_value("abc\""), "\"abc\"");
    }

    #[test]
    fn wildcard_is_not_quoted() {
        assert_eq!(if_match_value("*"), "*");
    }

    #[test]
    fn lone_quote_becomes_empty_quoted_string() {
        assert_eq!(if_match_value("\""), "\"\"");
    }
}
