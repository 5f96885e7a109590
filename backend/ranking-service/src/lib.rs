pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use api::RankingServiceImpl;
pub use config::Config;
pub use error::PipelineError;
pub use services::{DiversityLayer, RankingLayer, RankingPipeline, RecallLayer, RedisStore};
