// ABOUTME: Image pulls with ordered fallback strategies.
// ABOUTME: Resolution is pure over a context snapshot; support mode changes come back as deltas.

mod context;
mod puller;
mod resolver;
mod strategy;

pub use context::{PullContext, PullResult, StateDelta, SupportMode};
pub use puller::{DEFAULT_PLATFORM, PullOptions, Puller};
pub use resolver::{PullStrategyResolver, Resolution};
pub use strategy::{
    PullStrategy, SkopeoTagLister, StrategyEnv, TagListError, TagLister, pick_most_recent_tag,
};
