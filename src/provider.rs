//! Provider descriptors.
//!
//! A [`Provider`] describes one oEmbed-compatible service: the URL patterns
//! it recognizes, its API endpoint, the wire format of its responses, and
//! how those responses are routed (directly, through the same-origin relay,
//! or through the legacy cross-domain query service).
//!
//! Descriptors are immutable once registered. The built-in set lives in
//! [`crate::registry`].

use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;

/// Builds embed markup from a raw oEmbed payload.
pub type CodeBuilder = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// oEmbed content type of a provider's resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Link,
    #[default]
    Rich,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Link => "link",
            Self::Rich => "rich",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire format of a provider's API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Jsonp,
}

impl ResponseFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Jsonp => "jsonp",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One oEmbed-compatible provider.
#[derive(Clone)]
pub struct Provider {
    /// Lowercase identifier (e.g., `"youtube"`).
    pub name: String,
    /// Display name (e.g., `"YouTube"`).
    pub title: String,
    /// Content type of the provider's resources.
    pub media: MediaKind,
    /// Ordered regex patterns, matched case-insensitively against URLs.
    pub urls: Vec<String>,
    /// API endpoint template; `https://` is assumed when no scheme is given.
    pub api: String,
    /// Wire format of the API's responses.
    pub format: ResponseFormat,
    /// JSONP callback parameter name (`callback` when unset).
    pub callback_param: Option<String>,
    /// Route the request through the same-origin relay endpoint.
    ///
    /// Needed for APIs without cross-origin support.
    pub relay: bool,
    /// Route the request through the legacy cross-domain query service.
    pub legacy_query: bool,
    /// Provider-level markup builder, consulted when the invocation supplies
    /// none.
    pub code_builder: Option<CodeBuilder>,

    compiled: OnceLock<Vec<Regex>>,
}

impl Provider {
    /// Create a descriptor with the given identifier and content type.
    ///
    /// The display title defaults to the identifier; set the rest through
    /// the builder methods.
    #[must_use]
    pub fn new(name: impl Into<String>, media: MediaKind) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            media,
            urls: Vec::new(),
            api: String::new(),
            format: ResponseFormat::Json,
            callback_param: None,
            relay: false,
            legacy_query: false,
            code_builder: None,
            compiled: OnceLock::new(),
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the ordered URL patterns.
    #[must_use]
    pub fn urls<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the API endpoint template.
    #[must_use]
    pub fn api(mut self, endpoint: impl Into<String>) -> Self {
        self.api = endpoint.into();
        self
    }

    /// Set the response wire format.
    #[must_use]
    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the JSONP callback parameter name.
    #[must_use]
    pub fn callback_param(mut self, param: impl Into<String>) -> Self {
        self.callback_param = Some(param.into());
        self
    }

    /// Route requests through the same-origin relay endpoint.
    #[must_use]
    pub fn via_relay(mut self) -> Self {
        self.relay = true;
        self
    }

    /// Route requests through the legacy cross-domain query service.
    #[must_use]
    pub fn via_legacy_query(mut self) -> Self {
        self.legacy_query = true;
        self
    }

    /// Set the provider-level markup builder.
    #[must_use]
    pub fn code_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.code_builder = Some(Arc::new(builder));
        self
    }

    /// Check whether any of this provider's patterns match the URL.
    ///
    /// Patterns are tested in declared order, case-insensitively.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.patterns().iter().any(|re| re.is_match(url))
    }

    /// Compiled patterns, built on first use.
    ///
    /// An invalid pattern is logged and skipped, never a panic.
    fn patterns(&self) -> &[Regex] {
        self.compiled.get_or_init(|| {
            self.urls
                .iter()
                .filter_map(|pattern| {
                    match RegexBuilder::new(pattern).case_insensitive(true).build() {
                        Ok(re) => Some(re),
                        Err(e) => {
                            tracing::warn!(
                                "Invalid URL pattern {:?} for provider {}: {}",
                                pattern,
                                self.name,
                                e
                            );
                            None
                        }
                    }
                })
                .collect()
        })
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("media", &self.media)
            .field("urls", &self.urls)
            .field("api", &self.api)
            .field("format", &self.format)
            .field("relay", &self.relay)
            .field("legacy_query", &self.legacy_query)
            .field("code_builder", &self.code_builder.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch_provider() -> Provider {
        Provider::new("example", MediaKind::Video)
            .urls([r"example\.com/watch"])
            .api("https://api.example.com/oembed")
    }

    #[test]
    fn matches_are_case_insensitive() {
        let provider = watch_provider();
        assert!(provider.matches("https://example.com/watch?v=1"));
        assert!(provider.matches("https://EXAMPLE.COM/WATCH?v=1"));
        assert!(!provider.matches("https://example.com/profile"));
    }

    #[test]
    fn patterns_are_tested_in_order() {
        let provider = Provider::new("multi", MediaKind::Video)
            .urls([r"first\.example/a", r"second\.example/b"]);
        assert!(provider.matches("https://second.example/b/123"));
    }

    #[test]
    fn invalid_patterns_are_skipped_not_fatal() {
        let provider = Provider::new("broken", MediaKind::Rich)
            .urls([r"([unclosed", r"valid\.example/"]);
        assert!(provider.matches("https://valid.example/page"));
        assert!(!provider.matches("https://([unclosed"));
    }

    #[test]
    fn new_defaults_match_the_descriptor_contract() {
        let provider = Provider::new("plain", MediaKind::Link);
        assert_eq!(provider.title, "plain");
        assert_eq!(provider.format, ResponseFormat::Json);
        assert!(!provider.relay);
        assert!(!provider.legacy_query);
        assert!(provider.code_builder.is_none());
    }

    #[test]
    fn media_kind_deserializes_lowercase() {
        let kind: MediaKind = serde_json::from_str("\"photo\"").unwrap();
        assert_eq!(kind, MediaKind::Photo);
        let format: ResponseFormat = serde_json::from_str("\"jsonp\"").unwrap();
        assert_eq!(format, ResponseFormat::Jsonp);
    }
}
