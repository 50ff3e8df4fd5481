// ABOUTME: Shared wiring of the runner, credential helpers and pullers for commands.
// ABOUTME: Keeps tool names and timeouts flowing from one loaded Config.

use pullwarden::auth::{CliRefresher, CloudCli, VendorCli};
use pullwarden::config::Config;
use pullwarden::diagnostics::{Diagnostics, Warning};
use pullwarden::output::Output;
use pullwarden::process::{CommandRunner, SystemRunner, tool_available};
use pullwarden::pull::{PullStrategyResolver, Puller, SkopeoTagLister, StrategyEnv};
use pullwarden::token::TokenManager;
use std::sync::Arc;

pub struct Services {
    pub config: Config,
    pub runner: Arc<dyn CommandRunner>,
}

impl Services {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            runner: Arc::new(SystemRunner),
        }
    }

    pub fn vendor_cli(&self) -> VendorCli {
        VendorCli::new(
            self.runner.clone(),
            &self.config.tools.vendor_cli,
            self.config.timeouts.auth,
        )
    }

    fn cloud_cli(&self) -> CloudCli {
        CloudCli::new(
            self.runner.clone(),
            &self.config.tools.cloud_cli,
            &self.config.tools.runtime,
            self.config.registries.cloud_login_hosts(),
            self.config.timeouts.auth,
        )
    }

    pub fn token_manager(&self) -> TokenManager {
        let refresher = CliRefresher::new(self.vendor_cli(), self.cloud_cli());
        TokenManager::new(
            Arc::new(refresher),
            self.config.registries.clone(),
            &self.config.tokens,
        )
    }

    /// Build a puller, enabling the most-recent-tag fallback only when the tag lister is installed.
    pub async fn puller(&self, output: &Output, diagnostics: &mut Diagnostics) -> Puller {
        let tools = &self.config.tools;
        let timeouts = &self.config.timeouts;

        if !tool_available(self.runner.as_ref(), &tools.runtime, timeouts.version_check).await {
            diagnostics.warn(Warning::tool_missing(&tools.runtime));
        }

        let mut env = StrategyEnv::new(self.config.registries.clone());
        if tool_available(self.runner.as_ref(), &tools.tag_lister, timeouts.version_check).await {
            output.progress(&format!("  → Using {} for tag listing", tools.tag_lister));
            env = env.with_tag_lister(Arc::new(SkopeoTagLister::new(
                self.runner.clone(),
                &tools.tag_lister,
                timeouts.inspect,
            )));
        } else {
            diagnostics.warn(Warning::tool_missing(&tools.tag_lister));
        }

        Puller::new(
            self.runner.clone(),
            &tools.runtime,
            timeouts.pull,
            PullStrategyResolver::new(env),
        )
    }
}

/// Print collected warnings after a command's result.
pub fn report_diagnostics(output: &Output, diagnostics: &Diagnostics) {
    for warning in diagnostics.warnings() {
        output.warning(&warning.message);
    }
}
