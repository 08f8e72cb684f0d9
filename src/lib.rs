//! `inlay` — resolve media URLs into embeddable HTML.
//!
//! Given a resource URL (a link to a video, photo, or track page), `inlay`
//! picks the first matching oEmbed-compatible provider from an ordered
//! registry, queries its API (direct JSON, JSONP, same-origin relay, or the
//! legacy cross-domain query service), resolves the embed markup through a
//! small builder chain, and hands the resulting container to the host
//! document through the [`EmbedTarget`] seam.
//!
//! # Example
//!
//! ```rust,no_run
//! use inlay::{EmbedOptions, Embedder, Slot};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = Embedder::new()?;
//!     let mut slot = Slot::with_link("https://vimeo.com/76979871");
//!
//!     let options = EmbedOptions::current()
//!         .class_container("media-embed")
//!         .on_error(|e| eprintln!("embed failed: {e}"));
//!
//!     if let Some(container) = embedder.embed(&mut slot, None, &options).await {
//!         println!("{}", container.to_html());
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod request;
pub mod response;
pub mod transport;

pub use error::{EmbedError, ErrorKind};
pub use pipeline::{
    set_defaults, AfterEmbed, BeforeEmbed, Container, EmbedOptions, EmbedTarget, Embedder,
    EmbedderBuilder, OnError, Slot, DEFAULT_CONTAINER_CLASS,
};
pub use provider::{CodeBuilder, MediaKind, Provider, ResponseFormat};
pub use registry::{ProviderFilter, Registry};
pub use request::{build_request, RequestMode, RequestSpec, DEFAULT_RELAY_PATH};
pub use transport::{Fetch, HttpFetcher, TransportError};

/// Version of inlay
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
