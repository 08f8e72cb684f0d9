//! The embed pipeline.
//!
//! Orchestrates one embed invocation: resolve the resource URL, match a
//! provider, build and dispatch the request, interpret the response, run
//! the lifecycle hooks, and hand the resulting container to the target.
//!
//! Each invocation owns its resolved [`EmbedOptions`] copy; the only shared
//! state is the read-only provider registry snapshot and the process-wide
//! defaults, so concurrent invocations never observe each other.
//!
//! # Example
//!
//! ```rust,no_run
//! use inlay::{EmbedOptions, Embedder, Slot};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let embedder = Embedder::new()?;
//! let mut slot = Slot::with_link("https://vimeo.com/76979871");
//!
//! if let Some(container) = embedder.embed(&mut slot, None, &EmbedOptions::current()).await {
//!     println!("{}", container.to_html());
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::EmbedError;
use crate::provider::{CodeBuilder, Provider};
use crate::registry::{self, ProviderFilter, Registry};
use crate::request::{build_request, DEFAULT_RELAY_PATH};
use crate::response::{build_markup, parse_payload};
use crate::transport::{Fetch, HttpFetcher, TransportError};

/// Default CSS class applied to inserted containers.
pub const DEFAULT_CONTAINER_CLASS: &str = "oembed-container";

/// Rewrites markup before insertion: `(payload, markup, provider) -> markup`.
pub type BeforeEmbed = Arc<dyn Fn(&Value, String, &Provider) -> String + Send + Sync>;

/// Observes the inserted container: `(payload, container, provider)`.
pub type AfterEmbed = Arc<dyn Fn(&Value, &Container, &Provider) + Send + Sync>;

/// Receives every pipeline failure.
pub type OnError = Arc<dyn Fn(&EmbedError) + Send + Sync>;

/// Options for one embed invocation.
///
/// [`EmbedOptions::current`] snapshots the process-wide defaults; callers
/// adjust the snapshot through the builder methods. Cloning is cheap — the
/// hooks are shared.
#[derive(Clone)]
pub struct EmbedOptions {
    /// Which providers the invocation may match.
    pub providers: ProviderFilter,
    /// CSS class for the inserted container.
    pub class_container: String,
    /// Detach the original target element after insertion.
    pub remove_origin: bool,
    /// Invocation-level markup builder, overriding the provider's.
    pub code_builder: Option<CodeBuilder>,
    /// Hook run on the markup before the container is built.
    pub before_embed: Option<BeforeEmbed>,
    /// Hook run after the container has been inserted.
    pub after_embed: Option<AfterEmbed>,
    /// Hook receiving every failure. Failures are logged when unset.
    pub on_error: Option<OnError>,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            providers: ProviderFilter::Any,
            class_container: DEFAULT_CONTAINER_CLASS.to_string(),
            remove_origin: true,
            code_builder: None,
            before_embed: None,
            after_embed: None,
            on_error: None,
        }
    }
}

impl EmbedOptions {
    /// Snapshot of the process-wide default options.
    #[must_use]
    pub fn current() -> Self {
        DEFAULTS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Restrict matching to the given filter.
    #[must_use]
    pub fn providers(mut self, filter: ProviderFilter) -> Self {
        self.providers = filter;
        self
    }

    /// Set the container CSS class.
    #[must_use]
    pub fn class_container(mut self, class: impl Into<String>) -> Self {
        self.class_container = class.into();
        self
    }

    /// Keep or detach the original element after insertion.
    #[must_use]
    pub fn remove_origin(mut self, remove: bool) -> Self {
        self.remove_origin = remove;
        self
    }

    /// Set the invocation-level markup builder.
    #[must_use]
    pub fn code_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.code_builder = Some(Arc::new(builder));
        self
    }

    /// Set the before-embed hook.
    #[must_use]
    pub fn before_embed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, String, &Provider) -> String + Send + Sync + 'static,
    {
        self.before_embed = Some(Arc::new(hook));
        self
    }

    /// Set the after-embed hook.
    #[must_use]
    pub fn after_embed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, &Container, &Provider) + Send + Sync + 'static,
    {
        self.after_embed = Some(Arc::new(hook));
        self
    }

    /// Set the error hook.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&EmbedError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for EmbedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedOptions")
            .field("providers", &self.providers)
            .field("class_container", &self.class_container)
            .field("remove_origin", &self.remove_origin)
            .field("code_builder", &self.code_builder.is_some())
            .field("before_embed", &self.before_embed.is_some())
            .field("after_embed", &self.after_embed.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

static DEFAULTS: LazyLock<RwLock<EmbedOptions>> =
    LazyLock::new(|| RwLock::new(EmbedOptions::default()));

/// Administrative call: replace the process-wide default options.
///
/// Invocation logic never mutates the defaults; it snapshots them.
pub fn set_defaults(options: EmbedOptions) {
    *DEFAULTS.write().unwrap_or_else(PoisonError::into_inner) = options;
}

/// The wrapper element built around resolved embed markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// CSS class of the wrapper.
    pub class: String,
    /// The embed markup placed inside the wrapper.
    pub markup: String,
}

impl Container {
    #[must_use]
    pub fn new(class: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            markup: markup.into(),
        }
    }

    /// Render the container as HTML.
    #[must_use]
    pub fn to_html(&self) -> String {
        format!(r#"<div class="{}">{}</div>"#, self.class, self.markup)
    }
}

/// The host-document seam.
///
/// The pipeline consumes this contract; it never manipulates a document
/// itself. A target hands out the link it carries, receives the replacement
/// container, and detaches itself on request.
pub trait EmbedTarget {
    /// The resource URL carried by the target (its link attribute), if any.
    fn resource_link(&self) -> Option<String>;

    /// Receive the replacement container, inserted immediately after the
    /// target.
    fn insert_after(&mut self, container: &Container);

    /// Remove the original target from its document.
    fn detach(&mut self);
}

/// Minimal in-memory [`EmbedTarget`] for hosts without a document tree.
///
/// Records what the pipeline did to it; the host reads `embedded` and
/// `detached` afterwards.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    link: Option<String>,
    /// The container received from the pipeline, if any.
    pub embedded: Option<Container>,
    /// Whether the pipeline detached this target.
    pub detached: bool,
}

impl Slot {
    /// A slot with no link; the resource URL must be supplied explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot carrying a link, the way an anchor element carries `href`.
    #[must_use]
    pub fn with_link(url: impl Into<String>) -> Self {
        Self {
            link: Some(url.into()),
            embedded: None,
            detached: false,
        }
    }
}

impl EmbedTarget for Slot {
    fn resource_link(&self) -> Option<String> {
        self.link.clone()
    }

    fn insert_after(&mut self, container: &Container) {
        self.embedded = Some(container.clone());
    }

    fn detach(&mut self) {
        self.detached = true;
    }
}

/// Runs embed invocations.
///
/// Holds the transport and, optionally, an instance registry; without one,
/// every invocation snapshots the process-wide registry.
pub struct Embedder {
    fetcher: Arc<dyn Fetch>,
    registry: Option<Registry>,
    relay_path: String,
}

impl Embedder {
    /// An embedder over the default HTTP transport and the process-wide
    /// registry.
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            fetcher: Arc::new(HttpFetcher::new()?),
            registry: None,
            relay_path: DEFAULT_RELAY_PATH.to_string(),
        })
    }

    #[must_use]
    pub fn builder() -> EmbedderBuilder {
        EmbedderBuilder::default()
    }

    /// Run one embed invocation against `target`.
    ///
    /// The resource URL is the explicit `url` when it is absolute
    /// (`http://` or `https://`), otherwise the target's own link. On
    /// success the markup lands in the target via
    /// [`EmbedTarget::insert_after`] and a copy of the container is
    /// returned. Every failure is delivered to the `on_error` hook (or
    /// logged when none is set) and leaves the target untouched.
    pub async fn embed<T: EmbedTarget>(
        &self,
        target: &mut T,
        url: Option<&str>,
        options: &EmbedOptions,
    ) -> Option<Container> {
        match self.run(target, url, options).await {
            Ok(container) => Some(container),
            Err(error) => {
                match &options.on_error {
                    Some(hook) => hook(&error),
                    None => warn!("Embed failed ({}): {}", error.kind(), error),
                }
                None
            }
        }
    }

    async fn run<T: EmbedTarget>(
        &self,
        target: &mut T,
        url: Option<&str>,
        options: &EmbedOptions,
    ) -> Result<Container, EmbedError> {
        let resource = resolve_resource_url(target, url).ok_or(EmbedError::UrlNotFound)?;

        let registry = match &self.registry {
            Some(registry) => registry.clone(),
            None => registry::snapshot(),
        };
        let provider = registry
            .find(&resource, &options.providers)
            .ok_or_else(|| EmbedError::ProviderNotAuthorized {
                url: resource.clone(),
            })?;
        debug!("Matched provider: {}", provider.name);

        let spec = build_request(&resource, &provider, &self.relay_path);
        let (request_url, callback) = spec.assign_callback();
        if let Some(name) = &callback {
            debug!("Assigned JSONP callback: {}", name);
        }
        debug!("Requesting: {}", request_url);

        let body = self
            .fetcher
            .fetch(&request_url)
            .await
            .map_err(|source| EmbedError::Transport {
                url: request_url.clone(),
                source,
            })?;

        let data = parse_payload(&body, spec.mode)?;
        let mut markup = build_markup(&data, options.code_builder.as_ref(), &provider)?;

        if let Some(hook) = &options.before_embed {
            markup = hook(&data, markup, &provider);
        }

        let container = Container::new(options.class_container.clone(), markup);
        target.insert_after(&container);
        if options.remove_origin {
            target.detach();
        }

        if let Some(hook) = &options.after_embed {
            hook(&data, &container, &provider);
        }

        Ok(container)
    }
}

/// Configures an [`Embedder`].
#[derive(Default)]
pub struct EmbedderBuilder {
    fetcher: Option<Arc<dyn Fetch>>,
    registry: Option<Registry>,
    relay_path: Option<String>,
}

impl EmbedderBuilder {
    /// Use a specific transport instead of the default HTTP client.
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use an instance registry instead of the process-wide one.
    #[must_use]
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the same-origin relay endpoint path.
    #[must_use]
    pub fn relay_path(mut self, path: impl Into<String>) -> Self {
        self.relay_path = Some(path.into());
        self
    }

    /// Build the embedder, creating the default HTTP transport when none
    /// was supplied.
    pub fn build(self) -> Result<Embedder, TransportError> {
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new()?),
        };
        Ok(Embedder {
            fetcher,
            registry: self.registry,
            relay_path: self.relay_path.unwrap_or_else(|| DEFAULT_RELAY_PATH.to_string()),
        })
    }
}

/// Resolve the resource URL for an invocation.
///
/// The explicit URL is used only when it is absolute; anything else falls
/// back to the link the target carries.
fn resolve_resource_url<T: EmbedTarget>(target: &T, url: Option<&str>) -> Option<String> {
    match url {
        Some(u) if u.starts_with("http://") || u.starts_with("https://") => Some(u.to_string()),
        _ => target.resource_link(),
    }
}
