use thiserror::Error;
use url::Url;

/// Persisted link URLs are capped at this length.
///
/// Anything longer after query/fragment stripping is dropped outright:
/// such URLs are almost always tracking junk, and the store indexes the
/// column for dedup lookups.
pub const MAX_LINK_URL_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum LinkUrlError {
    /// The URL string could not be parsed at all.
    #[error("Invalid link URL: {0}")]
    Invalid(#[from] url::ParseError),
    /// Still over the length ceiling after stripping query and fragment.
    #[error("Link URL exceeds {MAX_LINK_URL_LEN} chars after normalization")]
    TooLong,
}

/// Normalizes a link URL extracted from a post entity.
///
/// URLs at or under the ceiling pass through untouched. Over-long URLs
/// lose their query string and fragment; if that is not enough the link
/// is rejected and the caller drops it (documented loss, not an error
/// the sync unit cares about).
pub fn normalize_link_url(raw: &str) -> Result<String, LinkUrlError> {
    // The ceiling counts characters, not bytes: a multibyte URL under
    // 200 characters is well within the column's intent.
    if raw.chars().count() <= MAX_LINK_URL_LEN {
        return Ok(raw.to_string());
    }

    let mut url = Url::parse(raw)?;
    url.set_query(None);
    url.set_fragment(None);

    let stripped = url.to_string();
    if stripped.chars().count() > MAX_LINK_URL_LEN {
        return Err(LinkUrlError::TooLong);
    }
    Ok(stripped)
}

/// Canonical URL of a post on the remote provider.
///
/// This is the post's global dedup key: two syncs observing the same
/// remote entry always derive the same URL.
pub fn status_url(profile_base: &str, handle: &str, remote_id: &str) -> String {
    format!(
        "{}/{}/status/{}",
        profile_base.trim_end_matches('/'),
        handle,
        remote_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_url_untouched() {
        let url = "https://example.com/a?x=1#y";
        assert_eq!(normalize_link_url(url).unwrap(), url);
    }

    #[test]
    fn test_long_url_stripped_to_path() {
        let query: String = std::iter::repeat('q').take(180).collect();
        let url = format!("https://example.com/article?tracking={}#frag", query);
        assert!(url.len() > MAX_LINK_URL_LEN);
        assert_eq!(
            normalize_link_url(&url).unwrap(),
            "https://example.com/article"
        );
    }

    #[test]
    fn test_still_too_long_rejected() {
        let path: String = std::iter::repeat('p').take(250).collect();
        let url = format!("https://example.com/{}?x=1", path);
        assert!(matches!(
            normalize_link_url(&url),
            Err(LinkUrlError::TooLong)
        ));
    }

    #[test]
    fn test_unparseable_long_url_rejected() {
        let junk: String = std::iter::repeat('j').take(210).collect();
        assert!(normalize_link_url(&junk).is_err());
    }

    #[test]
    fn test_multibyte_url_measured_in_chars_not_bytes() {
        // 170 chars but well over 200 bytes; must pass through untouched.
        let path: String = std::iter::repeat('é').take(150).collect();
        let url = format!("https://example.com/{}", path);
        assert!(url.len() > MAX_LINK_URL_LEN);
        assert!(url.chars().count() <= MAX_LINK_URL_LEN);
        assert_eq!(normalize_link_url(&url).unwrap(), url);
    }

    #[test]
    fn test_status_url_shape() {
        assert_eq!(
            status_url("https://example.social", "alice", "42"),
            "https://example.social/alice/status/42"
        );
    }
}
