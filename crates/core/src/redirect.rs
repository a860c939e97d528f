//! Validation of post-login return URLs.

/// Path prefixes a user is never sent back to after signing in.
pub const DENIED_PREFIXES: &[&str] = &["/auth", "/admin", "/api", "/result", "/logout"];

/// Where to land when no usable return URL was stashed.
pub const FALLBACK: &str = "/";

/// Whether `candidate` is a same-site path that is safe to redirect to.
///
/// Rejects absolute and protocol-relative URLs, backslashes, control
/// characters and anything under [`DENIED_PREFIXES`].
#[must_use]
pub fn is_safe_return_url(candidate: &str) -> bool {
    if !candidate.starts_with('/') || candidate.starts_with("//") {
        return false;
    }
    if candidate.contains('\\') || candidate.contains("://") {
        return false;
    }
    if candidate.chars().any(char::is_control) {
        return false;
    }

    let path = candidate
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    !DENIED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// The stashed return URL if it is safe, otherwise [`FALLBACK`].
#[must_use]
pub fn safe_return_url(candidate: Option<&str>) -> String {
    candidate
        .map(str::trim)
        .filter(|url| is_safe_return_url(url))
        .unwrap_or(FALLBACK)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_paths() {
        assert!(is_safe_return_url("/"));
        assert!(is_safe_return_url("/orders/42"));
        assert!(is_safe_return_url("/search?q=tea#top"));
        assert!(is_safe_return_url("/authors"));
    }

    #[test]
    fn test_rejects_external() {
        assert!(!is_safe_return_url("https://evil.example/"));
        assert!(!is_safe_return_url("//evil.example/"));
        assert!(!is_safe_return_url("/\\evil.example"));
        assert!(!is_safe_return_url("orders"));
        assert!(!is_safe_return_url("/x?next=http://evil"));
    }

    #[test]
    fn test_rejects_denied_paths() {
        for url in ["/auth/login", "/auth", "/admin", "/API/keys", "/result?status=ok", "/logout"] {
            assert!(!is_safe_return_url(url), "{url}");
        }
    }

    #[test]
    fn test_fallback() {
        assert_eq!(safe_return_url(None), "/");
        assert_eq!(safe_return_url(Some("/auth/verify")), "/");
        assert_eq!(safe_return_url(Some(" /cart ")), "/cart");
    }
}
