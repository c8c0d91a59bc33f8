//! URL secret masking: query parameters that look like secrets are replaced
//! with `***` before any adapter observes a tag or annotation.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static SECRET_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(pas+wo?r?d|pass(phrase)?|pwd|token|secrete?)$").unwrap());

/// If `value` parses as a URL, masks any matching query parameter's value
/// and returns the re-serialized URL. Otherwise returns `value` unchanged.
///
/// Masking is idempotent: a value already masked parses to the same masked
/// URL on a second pass, since `***` never matches the secret-parameter
/// pattern as a *value* (only parameter *names* are matched).
pub fn mask_url_value(value: &str) -> String {
    let Ok(mut url) = Url::parse(value) else {
        return value.to_string();
    };
    if url.query().is_none() {
        return value.to_string();
    }

    let masked: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if SECRET_PARAM.is_match(&k) { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();

    url.query_pairs_mut().clear().extend_pairs(masked.iter());
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_password_query_param() {
        let masked = mask_url_value("https://example.com/x?token=abc123&q=1");
        assert!(masked.contains("token=%2A%2A%2A") || masked.contains("token=***"));
        assert!(masked.contains("q=1"));
    }

    #[test]
    fn leaves_non_url_values_alone() {
        assert_eq!(mask_url_value("not a url"), "not a url");
    }

    #[test]
    fn masking_is_idempotent() {
        let once = mask_url_value("https://example.com/?password=hunter2");
        let twice = mask_url_value(&once);
        assert_eq!(once, twice);
    }
}
