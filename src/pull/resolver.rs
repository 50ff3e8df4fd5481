// ABOUTME: First-match resolution over the ordered fallback strategies.
// ABOUTME: Skips fallbacks already attempted for the same image.

use crate::types::ImageReference;

use super::{PullContext, PullStrategy, StateDelta, StrategyEnv};

/// A chosen fallback and the state change it carries if it pulls successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub strategy: PullStrategy,
    pub image: ImageReference,
    pub on_success: StateDelta,
}

pub struct PullStrategyResolver {
    env: StrategyEnv,
}

impl PullStrategyResolver {
    pub fn new(env: StrategyEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &StrategyEnv {
        &self.env
    }

    /// Next fallback for `ctx`, or `None` when every strategy is exhausted.
    pub async fn resolve(&self, ctx: &PullContext) -> Option<Resolution> {
        for strategy in PullStrategy::ORDER {
            if !strategy.can_apply(ctx, &self.env) {
                continue;
            }
            let Some(image) = strategy.fallback_image(ctx, &self.env).await else {
                continue;
            };
            if ctx.was_attempted(&image) {
                tracing::debug!("Skipping {} fallback {}: already attempted", strategy, image);
                continue;
            }
            return Some(Resolution {
                strategy,
                on_success: strategy.on_success(ctx, &self.env),
                image,
            });
        }
        None
    }
}
