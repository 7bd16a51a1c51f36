use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratecache::cache::{MemoryCache, MemoryPubSub};
use ratecache::cli::{Cli, Commands, OutputFormat};
use ratecache::config::Config;
use ratecache::diagnostics::{log_keys, KeyDump};
use ratecache::instrumentation::{AlertSink, FanoutSink, MetricsSink};
use ratecache::output::{format_keys, format_output, format_report, RateOutcome, RateReport};
use ratecache::pricing::{PricingService, RateApiClient, RateRequest};
use ratecache_core::cache::{CacheStore, NotificationChannel};

/// Store, channel and key listing for one backend.
struct Backend {
    store: Arc<dyn CacheStore>,
    channel: Arc<dyn NotificationChannel>,
    keys: Arc<dyn KeyDump>,
}

impl Backend {
    fn memory(config: &Config) -> Self {
        let cache = MemoryCache::new(config.cache_max_entries);
        Self {
            store: Arc::new(cache.clone()),
            channel: Arc::new(MemoryPubSub::new()),
            keys: Arc::new(cache),
        }
    }

    #[cfg(feature = "redis")]
    async fn connect(config: &Config) -> Result<Self> {
        use ratecache::cache::{RedisCache, RedisPubSub};

        let Some(url) = config.redis_url.as_deref() else {
            tracing::info!("No Redis URL configured, using in-memory cache");
            return Ok(Self::memory(config));
        };
        let cache = RedisCache::new(url)
            .await
            .with_context(|| format!("connecting to Redis at {url}"))?;
        let pubsub = RedisPubSub::new(url)
            .await
            .with_context(|| format!("opening Redis pub/sub at {url}"))?;
        tracing::info!(url = %url, "Using Redis cache");
        Ok(Self {
            store: Arc::new(cache.clone()),
            channel: Arc::new(pubsub),
            keys: Arc::new(cache),
        })
    }

    #[cfg(not(feature = "redis"))]
    async fn connect(config: &Config) -> Result<Self> {
        if config.redis_url.is_some() {
            tracing::warn!("Redis URL ignored: built without the `redis` feature");
        }
        Ok(Self::memory(config))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ratecache=debug,ratecache_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env();
    if let Some(url) = cli.api_url {
        config.rate_api_url = url;
    }
    if cli.redis_url.is_some() {
        config.redis_url = cli.redis_url;
    }

    let backend = Backend::connect(&config).await?;

    match cli.command {
        Commands::Rate {
            hotel,
            room,
            period,
            concurrency,
        } => {
            let metrics = Arc::new(MetricsSink::new());
            let sink = FanoutSink::new()
                .with(Arc::new(AlertSink))
                .with(metrics.clone());
            let service = PricingService::new(
                backend.store,
                backend.channel,
                RateApiClient::new(&config.rate_api_url),
                config.to_coordinator_config(),
            )
            .context("invalid cache configuration")?
            .with_sink(Arc::new(sink));

            let request = RateRequest::new(period, hotel, room);
            let results = lookup_concurrently(&service, &request, concurrency).await?;
            let failed = results
                .iter()
                .filter(|r| matches!(r, RateOutcome::Error { .. }))
                .count();

            let report = RateReport {
                request,
                results,
                metrics: metrics.snapshot(),
            };
            match cli.format {
                OutputFormat::Json => println!("{}", format_output(&report, cli.format)),
                OutputFormat::Pretty => println!("{}", format_report(&report)),
            }

            if failed == report.results.len() {
                anyhow::bail!("all {} rate lookups failed", failed);
            }
        }
        Commands::DumpKeys { pattern } => {
            let entries = log_keys(backend.keys.as_ref(), &pattern)
                .await
                .context("listing cache keys")?;
            match cli.format {
                OutputFormat::Json => println!("{}", format_output(&entries, cli.format)),
                OutputFormat::Pretty => println!("{}", format_keys(&entries)),
            }
        }
    }

    Ok(())
}

/// Issues `concurrency` lookups for the same rate at once.
async fn lookup_concurrently(
    service: &PricingService,
    request: &RateRequest,
    concurrency: u32,
) -> Result<Vec<RateOutcome>> {
    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            let service = service.clone();
            let request = request.clone();
            tokio::spawn(async move { service.rate(&request).await })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let outcome = match handle.await.context("rate lookup task panicked")? {
            Ok(rate) => RateOutcome::Ok { rate },
            Err(err) => RateOutcome::Error {
                message: err.to_string(),
            },
        };
        results.push(outcome);
    }
    Ok(results)
}
