pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod search;
pub mod server;
pub mod timestamp;
pub mod walker;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{LogSearchError, Result};
pub use metrics::Metrics;
pub use search::{
    LogFile, MatchMode, SearchCoordinator, SearchCriteria, SearchOutcome, SearchPhase, TimeWindow,
};
pub use timestamp::{TimestampCodec, Zone};
