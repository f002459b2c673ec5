//! URL utilities for consistent URL handling
//!
//! This module provides utilities for URL manipulation, validation, and
//! normalization used by the dialect clients, the classifier and the proxy.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static SENSITIVE_PARAMS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["username", "password", "user", "pass", "pwd", "passwd", "token", "mac"]
        .iter()
        .filter_map(|param| {
            Regex::new(&format!(r"(?i)([?&]{}=)[^&\s]*", regex::escape(param))).ok()
        })
        .collect()
});

static XTREAM_PATH_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(live|movie|series)/([^/\s]+)/([^/\s]+)/").expect("literal pattern")
});

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Normalize URL scheme by ensuring it has a proper HTTP/HTTPS prefix
    ///
    /// Defaults to HTTP when no scheme is given, which is how most portal
    /// addresses are typed by users.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use portal_proxy::utils::url::UrlUtils;
    ///
    /// assert_eq!(UrlUtils::normalize_scheme("portal.example"), "http://portal.example");
    /// assert_eq!(UrlUtils::normalize_scheme("https://portal.example"), "https://portal.example");
    /// ```
    pub fn normalize_scheme(url: &str) -> String {
        let trimmed = url.trim();

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        }
    }

    /// Extract the host from a URL
    ///
    /// * `Some(String)` - host without port if the URL parses
    /// * `None` - if the URL is invalid or has no host
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
    }

    /// Host plus explicit port, e.g. `portal.example:8080`.
    pub fn host_with_port(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        Some(match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// `scheme://host[:port]` of a URL, without path or query.
    pub fn origin(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = Self::host_with_port(url)?;
        Some(format!("{}://{}", parsed.scheme(), host))
    }

    /// Sanitize URL by removing trailing slashes and normalizing the scheme
    pub fn sanitize(url: &str) -> String {
        let mut sanitized = Self::normalize_scheme(url);

        // Remove trailing slashes (but keep the one after the scheme)
        while sanitized.len() > 8 && sanitized.ends_with('/') {
            sanitized.pop();
        }

        sanitized
    }

    /// Obfuscate sensitive information in URLs for safe logging
    ///
    /// Masks URL userinfo, credential-like query parameters (including the
    /// portal `mac` and `token`) and Xtream path credentials.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use portal_proxy::utils::url::UrlUtils;
    ///
    /// let url = "http://panel.example/live/alice/secret/42.ts";
    /// assert_eq!(
    ///     UrlUtils::obfuscate_credentials(url),
    ///     "http://panel.example/live/****/****/42.ts"
    /// );
    /// ```
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        // Handle URL auth (user:pass@host)
        if let Ok(parsed) = Url::parse(url)
            && (!parsed.username().is_empty() || parsed.password().is_some())
        {
            let mut new_url = parsed.clone();
            let _ = new_url.set_username("****");
            let _ = new_url.set_password(Some("****"));
            obfuscated = new_url.to_string();
        }

        for re in SENSITIVE_PARAMS.iter() {
            obfuscated = re.replace_all(&obfuscated, "${1}****").to_string();
        }

        XTREAM_PATH_CREDENTIALS
            .replace_all(&obfuscated, "/${1}/****/****/")
            .to_string()
    }
}
