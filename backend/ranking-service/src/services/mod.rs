pub mod diversity;
pub mod features;
pub mod pipeline;
pub mod ranking;
pub mod recall;
pub mod stores;

pub use diversity::DiversityLayer;
pub use features::FeatureExtractor;
pub use pipeline::{RankedFeed, RankingPipeline, RecalledPool};
pub use ranking::RankingLayer;
pub use recall::RecallLayer;
pub use stores::{NoSignals, RedisStore};
