//! Provider registry and URL matching.
//!
//! Providers are kept in registration order and matched first-wins, the
//! same way they would be scanned in a hand-maintained list: no scoring,
//! no specificity ranking.
//!
//! A process-wide registry is initialized once with the built-in provider
//! set and read by every invocation; it is mutated only through the
//! administrative calls [`register`] and [`install`].
//!
//! # Example
//!
//! ```rust
//! use inlay::registry::{self, ProviderFilter};
//!
//! let registry = registry::snapshot();
//! let provider = registry
//!     .find("https://vimeo.com/76979871", &ProviderFilter::Any)
//!     .expect("vimeo is built in");
//! assert_eq!(provider.name, "vimeo");
//! ```

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde::Deserialize;
use serde_json::Value;

use crate::provider::{MediaKind, Provider, ResponseFormat};

/// Restricts which providers an invocation may match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProviderFilter {
    /// The wildcard: every registered provider, in registration order.
    #[default]
    Any,
    /// Only the named providers, scanned in the order given.
    Allow(Vec<String>),
}

impl ProviderFilter {
    /// Build an allow-list filter.
    pub fn allow<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Allow(names.into_iter().map(Into::into).collect())
    }

    /// Membership test: is the named provider authorized by this filter?
    #[must_use]
    pub fn permits(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Allow(names) => names.iter().any(|n| n.eq_ignore_ascii_case(name)),
        }
    }
}

/// Ordered collection of providers.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    providers: Vec<Arc<Provider>>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The mainstream provider set.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for provider in builtin_providers() {
            registry.register(provider);
        }
        registry
    }

    /// Add a provider.
    ///
    /// A provider with the same name is replaced in place, keeping its
    /// position in the matching order; otherwise the provider is appended.
    pub fn register(&mut self, provider: Provider) {
        let provider = Arc::new(provider);
        match self
            .providers
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&provider.name))
        {
            Some(slot) => *slot = provider,
            None => self.providers.push(provider),
        }
    }

    /// Look up a provider by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Provider>> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Find the first provider whose patterns match `url`.
    ///
    /// With [`ProviderFilter::Any`] the registry is scanned in registration
    /// order; with an allow-list, exactly the named providers are scanned in
    /// the order given (names absent from the registry are skipped). Returns
    /// `None` when nothing matches.
    #[must_use]
    pub fn find(&self, url: &str, filter: &ProviderFilter) -> Option<Arc<Provider>> {
        match filter {
            ProviderFilter::Any => self.providers.iter().find(|p| p.matches(url)).cloned(),
            ProviderFilter::Allow(names) => names
                .iter()
                .filter_map(|name| self.get(name))
                .find(|p| p.matches(url))
                .cloned(),
        }
    }

    /// Iterate providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Provider>> {
        self.providers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Parse a provider table from TOML text into a new registry.
    ///
    /// See [`Registry::extend_from_toml`] for the expected shape.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        let mut registry = Self::empty();
        registry.extend_from_toml(text)?;
        Ok(registry)
    }

    /// Append providers parsed from TOML text.
    ///
    /// ```toml
    /// [[provider]]
    /// name = "example"
    /// media = "video"
    /// urls = ["example\\.com/watch"]
    /// api = "https://api.example.com/oembed"
    /// format = "json"
    /// ```
    ///
    /// Markup builders cannot be expressed in TOML; loaded providers rely on
    /// the payload's `html` field or an invocation-level builder.
    pub fn extend_from_toml(&mut self, text: &str) -> Result<(), toml::de::Error> {
        let file: ProviderFile = toml::from_str(text)?;
        for entry in file.provider {
            self.register(entry.into_provider());
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Process-wide registry
// ────────────────────────────────────────────────────────────────────────────

static GLOBAL: LazyLock<RwLock<Registry>> = LazyLock::new(|| RwLock::new(Registry::builtin()));

/// Snapshot of the process-wide registry (cheap: providers are shared).
#[must_use]
pub fn snapshot() -> Registry {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Administrative call: add or replace a provider in the process-wide
/// registry.
pub fn register(provider: Provider) {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(provider);
}

/// Administrative call: replace the process-wide registry wholesale.
pub fn install(registry: Registry) {
    *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = registry;
}

// ────────────────────────────────────────────────────────────────────────────
// TOML provider files
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProviderFile {
    #[serde(default)]
    provider: Vec<ProviderEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderEntry {
    name: String,
    title: Option<String>,
    #[serde(default)]
    media: MediaKind,
    urls: Vec<String>,
    api: String,
    #[serde(default)]
    format: ResponseFormat,
    callback_param: Option<String>,
    #[serde(default)]
    relay: bool,
    #[serde(default)]
    legacy_query: bool,
}

impl ProviderEntry {
    fn into_provider(self) -> Provider {
        let mut provider = Provider::new(self.name, self.media)
            .urls(self.urls)
            .api(self.api)
            .format(self.format);
        if let Some(title) = self.title {
            provider = provider.title(title);
        }
        if let Some(param) = self.callback_param {
            provider = provider.callback_param(param);
        }
        if self.relay {
            provider = provider.via_relay();
        }
        if self.legacy_query {
            provider = provider.via_legacy_query();
        }
        provider
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in providers
// ────────────────────────────────────────────────────────────────────────────

/// The mainstream provider set, in matching order.
///
/// Relay-flagged providers have APIs without cross-origin support; the
/// legacy query service covers endpoints that only speak plain JSON to
/// same-origin callers.
fn builtin_providers() -> Vec<Provider> {
    vec![
        Provider::new("youtube", MediaKind::Video)
            .title("YouTube")
            .urls([
                r"youtube\.com/watch.+v=[\w-]+",
                r"youtu\.be/[\w-]+",
                r"youtube\.com/shorts/[\w-]+",
            ])
            .api("https://www.youtube.com/oembed"),
        Provider::new("vimeo", MediaKind::Video)
            .title("Vimeo")
            .urls([r"vimeo\.com/(groups/\d+/videos/)?\d+"])
            .api("https://vimeo.com/api/oembed.json"),
        Provider::new("dailymotion", MediaKind::Video)
            .title("Dailymotion")
            .urls([r"dailymotion\.com/video/[\w-]+", r"dai\.ly/[\w-]+"])
            .api("https://www.dailymotion.com/services/oembed"),
        Provider::new("flickr", MediaKind::Photo)
            .title("Flickr")
            .urls([r"flickr\.com/photos/[\w@-]+/\d+", r"flic\.kr/p/\w+"])
            .api("https://www.flickr.com/services/oembed")
            .format(ResponseFormat::Jsonp)
            .callback_param("jsoncallback")
            .code_builder(photo_markup),
        Provider::new("soundcloud", MediaKind::Rich)
            .title("SoundCloud")
            .urls([r"soundcloud\.com/[\w-]+/[\w-]+"])
            .api("https://soundcloud.com/oembed"),
        Provider::new("spotify", MediaKind::Rich)
            .title("Spotify")
            .urls([r"open\.spotify\.com/(track|album|playlist|episode|show)/\w+"])
            .api("https://open.spotify.com/oembed"),
        Provider::new("slideshare", MediaKind::Rich)
            .title("SlideShare")
            .urls([r"slideshare\.net/[\w-]+/[\w-]+"])
            .api("https://www.slideshare.net/api/oembed/2")
            .format(ResponseFormat::Jsonp),
        Provider::new("ted", MediaKind::Video)
            .title("TED")
            .urls([r"ted\.com/talks/[\w-]+"])
            .api("https://www.ted.com/services/v1/oembed.json"),
        Provider::new("codepen", MediaKind::Rich)
            .title("CodePen")
            .urls([r"codepen\.io/[\w-]+/pen/[\w-]+"])
            .api("https://codepen.io/api/oembed"),
        Provider::new("giphy", MediaKind::Photo)
            .title("GIPHY")
            .urls([r"giphy\.com/gifs/[\w-]+", r"gph\.is/[\w-]+"])
            .api("https://giphy.com/services/oembed")
            .code_builder(photo_markup),
        Provider::new("mixcloud", MediaKind::Rich)
            .title("Mixcloud")
            .urls([r"mixcloud\.com/[\w-]+/[\w-]+"])
            .api("https://www.mixcloud.com/oembed/")
            .format(ResponseFormat::Jsonp),
        Provider::new("instagram", MediaKind::Rich)
            .title("Instagram")
            .urls([r"instagram\.com/(p|reel|tv)/[\w-]+", r"instagr\.am/p/[\w-]+"])
            .api("https://api.instagram.com/oembed")
            .via_relay(),
        Provider::new("deviantart", MediaKind::Photo)
            .title("DeviantArt")
            .urls([r"deviantart\.com/[\w-]+/art/[\w-]+", r"fav\.me/\w+"])
            .api("https://backend.deviantart.com/oembed")
            .via_relay()
            .code_builder(photo_markup),
        Provider::new("twitter", MediaKind::Rich)
            .title("Twitter")
            .urls([r"twitter\.com/\w+/status(es)?/\d+", r"x\.com/\w+/status/\d+"])
            .api("https://publish.twitter.com/oembed")
            .via_legacy_query(),
        Provider::new("tumblr", MediaKind::Rich)
            .title("Tumblr")
            .urls([r"[\w-]+\.tumblr\.com/post/\d+"])
            .api("https://www.tumblr.com/oembed/1.0")
            .via_legacy_query(),
        Provider::new("streamable", MediaKind::Video)
            .title("Streamable")
            .urls([r"streamable\.com/\w+"])
            .api("https://api.streamable.com/oembed.json"),
        Provider::new("kickstarter", MediaKind::Rich)
            .title("Kickstarter")
            .urls([r"kickstarter\.com/projects/[\w-]+/[\w-]+"])
            .api("https://www.kickstarter.com/services/oembed"),
        Provider::new("imgur", MediaKind::Rich)
            .title("Imgur")
            .urls([r"imgur\.com/(gallery/|a/)?\w+"])
            // Scheme-less on purpose: the request builder defaults to https.
            .api("api.imgur.com/oembed.json"),
    ]
}

/// Markup builder for photo-type payloads: prefer the provider's `html`,
/// fall back to an `<img>` built from the photo fields.
fn photo_markup(data: &Value) -> String {
    if let Some(html) = data.get("html").and_then(Value::as_str) {
        return html.to_string();
    }
    let src = data.get("url").and_then(Value::as_str).unwrap_or_default();
    let alt = data.get("title").and_then(Value::as_str).unwrap_or_default();
    format!(r#"<img src="{src}" alt="{alt}" />"#)
}
