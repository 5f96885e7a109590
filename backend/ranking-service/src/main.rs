use clap::{Parser, Subcommand};
use ranking_service::{
    api::{RankFeedRequest, RecallRequest, CORRELATION_HEADER},
    Config, RankingPipeline, RankingServiceImpl, RedisStore,
};
use std::sync::Arc;
use tonic::{metadata::MetadataValue, Request};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Run the feed ranking pipeline against the configured Redis stores and
/// print the result as JSON.
#[derive(Parser, Debug)]
#[command(name = "ranking-service", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank a feed for a user
    Rank {
        user_id: String,
        #[arg(short, long, default_value_t = 20)]
        limit: i32,
    },
    /// Show the fused recall pool before scoring
    Recall {
        user_id: String,
        #[arg(short, long, default_value_t = 100)]
        limit: i32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    info!(
        service = %config.service.service_name,
        redis = %config.redis.url,
        "Starting ranking pipeline"
    );

    // Initialize Redis-backed stores
    let redis_client = redis::Client::open(config.redis.url.clone())?;
    let store = Arc::new(RedisStore::new(redis_client));

    let pipeline = RankingPipeline::new(
        config.pipeline.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store,
    )?;
    let service = RankingServiceImpl::new(pipeline, config.service.request_timeout);

    let output = match cli.command {
        Command::Rank { user_id, limit } => {
            let request = with_correlation_id(RankFeedRequest { user_id, limit })?;
            let response = service.rank_feed(request).await?;
            serde_json::to_string_pretty(response.get_ref())?
        }
        Command::Recall { user_id, limit } => {
            let request = with_correlation_id(RecallRequest { user_id, limit })?;
            let response = service.recall_candidates(request).await?;
            serde_json::to_string_pretty(response.get_ref())?
        }
    };

    println!("{}", output);
    Ok(())
}

fn with_correlation_id<T>(message: T) -> Result<Request<T>, Box<dyn std::error::Error>> {
    let mut request = Request::new(message);
    let value = MetadataValue::try_from(Uuid::new_v4().to_string().as_str())?;
    request.metadata_mut().insert(CORRELATION_HEADER, value);
    Ok(request)
}
