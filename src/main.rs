//! `inlay` CLI — match, resolve, and embed media URLs from the terminal.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use url::Url;

use inlay::{
    registry, EmbedOptions, Embedder, ProviderFilter, Registry, Slot, DEFAULT_CONTAINER_CLASS,
    DEFAULT_RELAY_PATH,
};

#[derive(Parser)]
#[command(name = "inlay")]
#[command(about = "Resolves media URLs into embeddable HTML via oEmbed providers")]
#[command(version)]
struct Cli {
    /// Verbose logging (DEBUG level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered providers
    Providers,

    /// Match a URL against the registry and print the constructed request (offline)
    Resolve {
        /// Resource URL to resolve
        url: String,

        /// Comma-separated provider allow-list
        #[arg(short, long)]
        providers: Option<String>,

        /// TOML file with extra provider definitions
        #[arg(long, value_name = "FILE")]
        registry: Option<PathBuf>,

        /// Same-origin relay endpoint path for relay-flagged providers
        #[arg(long, default_value = DEFAULT_RELAY_PATH)]
        relay_path: String,
    },

    /// Fetch the oEmbed payload and print the embed container
    Embed {
        /// Resource URL to embed
        url: String,

        /// Comma-separated provider allow-list
        #[arg(short, long)]
        providers: Option<String>,

        /// TOML file with extra provider definitions
        #[arg(long, value_name = "FILE")]
        registry: Option<PathBuf>,

        /// CSS class for the container element
        #[arg(long, default_value = DEFAULT_CONTAINER_CLASS)]
        class: String,

        /// Keep the original element in place
        #[arg(long)]
        keep_origin: bool,

        /// Same-origin relay endpoint path for relay-flagged providers
        #[arg(long, default_value = DEFAULT_RELAY_PATH)]
        relay_path: String,

        /// Print the raw oEmbed payload instead of the container HTML
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Providers => cmd_providers(),
        Commands::Resolve {
            url,
            providers,
            registry,
            relay_path,
        } => cmd_resolve(&url, providers.as_deref(), registry.as_deref(), &relay_path)?,
        Commands::Embed {
            url,
            providers,
            registry,
            class,
            keep_origin,
            relay_path,
            json,
        } => {
            cmd_embed(
                &url,
                providers.as_deref(),
                registry.as_deref(),
                &class,
                keep_origin,
                &relay_path,
                json,
            )
            .await?;
        }
    }

    Ok(())
}

fn cmd_providers() {
    let registry = registry::snapshot();
    println!("{} providers registered\n", registry.len());

    for provider in registry.iter() {
        let mut notes = Vec::new();
        if provider.relay {
            notes.push("relay");
        }
        if provider.legacy_query {
            notes.push("legacy-query");
        }
        if provider.code_builder.is_some() {
            notes.push("builder");
        }

        println!(
            "{:<12} {:<12} {:<6} {:<6} {}",
            provider.name,
            provider.title,
            provider.media.as_str(),
            provider.format.as_str(),
            notes.join(",")
        );
    }
}

fn cmd_resolve(
    url: &str,
    providers: Option<&str>,
    extra_registry: Option<&Path>,
    relay_path: &str,
) -> Result<()> {
    Url::parse(url).context("invalid resource URL")?;

    let registry = load_registry(extra_registry)?;
    let filter = parse_filter(providers);
    let Some(provider) = registry.find(url, &filter) else {
        bail!("no provider matches {url}");
    };

    let spec = inlay::build_request(url, &provider, relay_path);
    println!("Provider: {} ({})", provider.title, provider.name);
    println!("Media:    {}", provider.media.as_str());
    println!("Mode:     {:?}", spec.mode);
    println!("Request:  {}", spec.url);

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_embed(
    url: &str,
    providers: Option<&str>,
    extra_registry: Option<&Path>,
    class: &str,
    keep_origin: bool,
    relay_path: &str,
    as_json: bool,
) -> Result<()> {
    Url::parse(url).context("invalid resource URL")?;

    let embedder = Embedder::builder()
        .registry(load_registry(extra_registry)?)
        .relay_path(relay_path)
        .build()?;

    // The payload and the failure reason only surface through the hooks.
    let payload: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
    let failure: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let options = EmbedOptions::current()
        .providers(parse_filter(providers))
        .class_container(class)
        .remove_origin(!keep_origin)
        .after_embed({
            let payload = Arc::clone(&payload);
            move |data, _container, _provider| {
                *payload.lock().unwrap() = Some(data.clone());
            }
        })
        .on_error({
            let failure = Arc::clone(&failure);
            move |error| {
                *failure.lock().unwrap() = Some(format!("{error} ({})", error.kind()));
            }
        });

    let mut slot = Slot::with_link(url);
    match embedder.embed(&mut slot, None, &options).await {
        Some(_) if as_json => {
            let data = payload.lock().unwrap().take().unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Some(container) => println!("{}", container.to_html()),
        None => {
            let reason = failure
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| "unknown failure".to_string());
            bail!("embed failed: {reason}");
        }
    }

    Ok(())
}

/// The process-wide registry, extended with providers from a TOML file when
/// one was given.
fn load_registry(extra: Option<&Path>) -> Result<Registry> {
    let mut registry = registry::snapshot();
    if let Some(path) = extra {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        registry
            .extend_from_toml(&text)
            .with_context(|| format!("invalid provider file {}", path.display()))?;
    }
    Ok(registry)
}

fn parse_filter(list: Option<&str>) -> ProviderFilter {
    match list {
        Some(names) => ProviderFilter::allow(
            names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        ),
        None => ProviderFilter::Any,
    }
}
