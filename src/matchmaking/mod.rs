//! Matchmaking engine
//!
//! Queue ordering, AI-eligibility promotion, the tiered subset search and
//! match finalization, driven one tick at a time by [`Matchmaker`].

pub mod eligibility;
pub mod engine;
pub mod finalizer;
pub mod queue;
pub mod search;

pub use eligibility::EligibilityClock;
pub use engine::{Matchmaker, MatchmakerStats, QueuedLobbyView, TickReport};
pub use finalizer::{FinalizedMatch, MatchFinalizer};
pub use queue::{MatchQueue, QueueEntry};
pub use search::{ClassPolicy, MatchResult, MatchSearch, TieredMatchSearch};
