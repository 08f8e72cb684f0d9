//! Request construction.
//!
//! Turns a (resource URL, provider) pair into the outbound request: direct
//! JSON, JSONP, relay-proxied, or wrapped for the legacy cross-domain query
//! service. Construction is pure string work — the same inputs always yield
//! the same request URL. JSONP callback names are only assigned at dispatch
//! time, through [`RequestSpec::assign_callback`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::provider::{Provider, ResponseFormat};

/// Default same-origin relay endpoint path.
pub const DEFAULT_RELAY_PATH: &str = "proxy2.php";

/// Relay parameter naming the true target URL.
pub const RELAY_PARAM: &str = "csurl";

/// The legacy cross-domain query service endpoint.
pub const LEGACY_QUERY_ENDPOINT: &str = "https://query.yahooapis.com/v1/public/yql";

/// Default JSONP callback parameter name.
pub const DEFAULT_CALLBACK_PARAM: &str = "callback";

/// How the response of a request must be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Plain JSON body.
    Json,
    /// JSON wrapped in a callback invocation.
    Jsonp,
    /// JSONP-wrapped query-service envelope; the single result record must
    /// be extracted before interpretation.
    LegacyQuery,
}

/// A fully constructed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    /// The outbound URL. For JSONP shapes the callback parameter still holds
    /// the literal `=?` placeholder.
    pub url: String,
    /// How to interpret the response body.
    pub mode: RequestMode,
}

impl RequestSpec {
    /// Whether dispatch must substitute a callback name first.
    #[must_use]
    pub fn needs_callback(&self) -> bool {
        !matches!(self.mode, RequestMode::Json)
    }

    /// Produce the dispatchable URL, substituting a freshly generated
    /// callback name for the trailing `=?` placeholder when the mode calls
    /// for one. Returns the URL and the assigned name, if any.
    #[must_use]
    pub fn assign_callback(&self) -> (String, Option<String>) {
        if !self.needs_callback() {
            return (self.url.clone(), None);
        }
        let name = next_callback_name();
        (substitute_callback(&self.url, &name), Some(name))
    }
}

/// Construct the request for `resource_url` against `provider`.
///
/// `relay_path` is the same-origin relay endpoint used for relay-flagged
/// providers (see [`DEFAULT_RELAY_PATH`]).
#[must_use]
pub fn build_request(resource_url: &str, provider: &Provider, relay_path: &str) -> RequestSpec {
    let mut url = provider.api.clone();
    if !url.contains("://") {
        url = format!("https://{url}");
    }

    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str("format=");
    url.push_str(provider.format.as_str());
    url.push_str("&url=");
    url.push_str(&urlencoding::encode(resource_url));

    if provider.format == ResponseFormat::Jsonp {
        let param = provider
            .callback_param
            .as_deref()
            .unwrap_or(DEFAULT_CALLBACK_PARAM);
        url.push('&');
        url.push_str(param);
        url.push_str("=?");
    }

    // The relay wins over the query service when a provider carries both
    // flags.
    if provider.relay {
        return RequestSpec {
            url: format!("{relay_path}?{RELAY_PARAM}={}", urlencoding::encode(&url)),
            mode: RequestMode::Json,
        };
    }

    if provider.legacy_query {
        let query = format!("select * from json where url ='{url}'");
        return RequestSpec {
            url: format!(
                "{LEGACY_QUERY_ENDPOINT}?q={}&format=json&{DEFAULT_CALLBACK_PARAM}=?",
                urlencoding::encode(&query)
            ),
            mode: RequestMode::LegacyQuery,
        };
    }

    let mode = match provider.format {
        ResponseFormat::Json => RequestMode::Json,
        ResponseFormat::Jsonp => RequestMode::Jsonp,
    };
    RequestSpec { url, mode }
}

static CALLBACK_NONCE: AtomicU64 = AtomicU64::new(0);

/// Generate a process-unique callback name.
///
/// Plain alphanumerics only — some providers reject punctuation in callback
/// function names.
fn next_callback_name() -> String {
    let nonce = CALLBACK_NONCE.fetch_add(1, Ordering::Relaxed);
    format!("inlaycb{nonce}")
}

/// Replace the trailing `=?` placeholder with `={name}`.
///
/// Only a placeholder at the very end of the URL is substituted; percent
/// encoding guarantees a wrapped inner URL cannot end with one.
fn substitute_callback(url: &str, name: &str) -> String {
    match url.rfind("=?") {
        Some(idx) if idx + 2 == url.len() => format!("{}={name}", &url[..idx]),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MediaKind;

    fn example_provider() -> Provider {
        Provider::new("example", MediaKind::Video)
            .urls([r"example\.com/watch"])
            .api("api.example.com/oembed")
    }

    #[test]
    fn builds_the_documented_request_url() {
        let spec = build_request(
            "https://example.com/watch?x=1",
            &example_provider(),
            DEFAULT_RELAY_PATH,
        );
        assert_eq!(
            spec.url,
            "https://api.example.com/oembed?format=json&url=https%3A%2F%2Fexample.com%2Fwatch%3Fx%3D1"
        );
        assert_eq!(spec.mode, RequestMode::Json);
    }

    #[test]
    fn construction_is_idempotent() {
        let provider = example_provider();
        let a = build_request("https://example.com/watch?x=1", &provider, DEFAULT_RELAY_PATH);
        let b = build_request("https://example.com/watch?x=1", &provider, DEFAULT_RELAY_PATH);
        assert_eq!(a, b);
    }

    #[test]
    fn keeps_an_existing_scheme() {
        let provider = Provider::new("http-only", MediaKind::Link)
            .api("http://plain.example/oembed");
        let spec = build_request("https://plain.example/x", &provider, DEFAULT_RELAY_PATH);
        assert!(spec.url.starts_with("http://plain.example/oembed?"));
    }

    #[test]
    fn appends_with_ampersand_when_endpoint_has_a_query() {
        let provider = Provider::new("query", MediaKind::Rich)
            .api("https://q.example/oembed?key=abc");
        let spec = build_request("https://q.example/page", &provider, DEFAULT_RELAY_PATH);
        assert!(spec.url.starts_with("https://q.example/oembed?key=abc&format=json&url="));
    }

    #[test]
    fn jsonp_appends_the_callback_placeholder() {
        let provider = Provider::new("p", MediaKind::Photo)
            .api("https://p.example/oembed")
            .format(ResponseFormat::Jsonp)
            .callback_param("jsoncallback");
        let spec = build_request("https://p.example/photos/1", &provider, DEFAULT_RELAY_PATH);
        assert!(spec.url.ends_with("&jsoncallback=?"));
        assert_eq!(spec.mode, RequestMode::Jsonp);
        assert!(spec.url.contains("format=jsonp"));
    }

    #[test]
    fn jsonp_callback_param_defaults_to_callback() {
        let provider = Provider::new("p", MediaKind::Rich)
            .api("https://p.example/oembed")
            .format(ResponseFormat::Jsonp);
        let spec = build_request("https://p.example/x", &provider, DEFAULT_RELAY_PATH);
        assert!(spec.url.ends_with("&callback=?"));
    }

    #[test]
    fn assign_callback_substitutes_only_the_placeholder() {
        let provider = Provider::new("p", MediaKind::Rich)
            .api("https://p.example/oembed")
            .format(ResponseFormat::Jsonp);
        let spec = build_request("https://p.example/a?b=c", &provider, DEFAULT_RELAY_PATH);

        let (url, name) = spec.assign_callback();
        let name = name.expect("jsonp requests get a callback");
        assert!(url.ends_with(&format!("&callback={name}")));
        assert!(!url.contains("=?"));

        // The encoded resource URL is untouched.
        assert!(url.contains("url=https%3A%2F%2Fp.example%2Fa%3Fb%3Dc"));
    }

    #[test]
    fn assigned_callback_names_are_unique() {
        let provider = Provider::new("p", MediaKind::Rich)
            .api("https://p.example/oembed")
            .format(ResponseFormat::Jsonp);
        let spec = build_request("https://p.example/x", &provider, DEFAULT_RELAY_PATH);

        let (_, first) = spec.assign_callback();
        let (_, second) = spec.assign_callback();
        assert_ne!(first, second);
    }

    #[test]
    fn direct_json_requests_get_no_callback() {
        let spec = build_request(
            "https://example.com/watch?x=1",
            &example_provider(),
            DEFAULT_RELAY_PATH,
        );
        let (url, name) = spec.assign_callback();
        assert_eq!(url, spec.url);
        assert!(name.is_none());
    }

    #[test]
    fn relay_wraps_the_whole_request_as_one_parameter() {
        let provider = Provider::new("walled", MediaKind::Rich)
            .api("https://api.walled.example/oembed")
            .via_relay();
        let spec = build_request("https://walled.example/p/1", &provider, DEFAULT_RELAY_PATH);

        assert!(spec.url.starts_with("proxy2.php?csurl="));
        assert_eq!(spec.mode, RequestMode::Json);

        // The inner request survives one level of decoding.
        let encoded = spec.url.strip_prefix("proxy2.php?csurl=").unwrap();
        let inner = urlencoding::decode(encoded).unwrap();
        assert!(inner.starts_with("https://api.walled.example/oembed?format=json&url="));
    }

    #[test]
    fn relay_path_is_configurable() {
        let provider = Provider::new("walled", MediaKind::Rich)
            .api("https://api.walled.example/oembed")
            .via_relay();
        let spec = build_request("https://walled.example/p/1", &provider, "/relay/fetch");
        assert!(spec.url.starts_with("/relay/fetch?csurl="));
    }

    #[test]
    fn relay_wins_over_legacy_query() {
        let provider = Provider::new("both", MediaKind::Rich)
            .api("https://api.both.example/oembed")
            .via_relay()
            .via_legacy_query();
        let spec = build_request("https://both.example/x", &provider, DEFAULT_RELAY_PATH);
        assert!(spec.url.starts_with("proxy2.php?csurl="));
        assert_eq!(spec.mode, RequestMode::Json);
    }

    #[test]
    fn legacy_query_wraps_the_request_in_a_select() {
        let provider = Provider::new("old", MediaKind::Rich)
            .api("https://api.old.example/oembed")
            .via_legacy_query();
        let spec = build_request("https://old.example/x", &provider, DEFAULT_RELAY_PATH);

        assert!(spec
            .url
            .starts_with("https://query.yahooapis.com/v1/public/yql?q="));
        assert!(spec.url.ends_with("&format=json&callback=?"));
        assert_eq!(spec.mode, RequestMode::LegacyQuery);

        let encoded = spec
            .url
            .strip_prefix("https://query.yahooapis.com/v1/public/yql?q=")
            .unwrap()
            .strip_suffix("&format=json&callback=?")
            .unwrap();
        let query = urlencoding::decode(encoded).unwrap();
        assert!(query.starts_with("select * from json where url ='https://api.old.example/oembed?"));
        assert!(query.ends_with("'"));
    }
}
