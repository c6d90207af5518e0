//! Command implementations for rivet.

pub mod homopolymer;
pub mod lowmapq;
pub mod merge;
pub mod motif;
pub mod nregions;
pub mod readdepth;

pub use homopolymer::{
    HomopolymerCommand, HomopolymerStats, HomopolymerStatsCommand, HomopolymerTally,
};
pub use lowmapq::{LowMapqCommand, LowMapqStats};
pub use merge::{MergeCommand, MergeStats};
pub use motif::{MotifCommand, MotifHit, MotifStats, PatternHits};
pub use nregions::{NRegionsCommand, NRegionsStats};
pub use readdepth::{Direction, ReadDepthCommand, ReadDepthStats};
