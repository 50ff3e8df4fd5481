// ABOUTME: Vendor registry credentials through the vendor CLI.
// ABOUTME: Caches the bearer token and falls back to a full login when the session expired.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use super::{BearerTokenSource, CredentialError, expect_success};
use crate::process::CommandRunner;

pub struct VendorCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
    cached_token: Mutex<Option<String>>,
}

impl VendorCli {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
            cached_token: Mutex::new(None),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Fetch a bearer token, reusing the cached one unless `use_cache` is false.
    pub async fn token(&self, use_cache: bool) -> Result<String, CredentialError> {
        if use_cache && let Some(token) = self.cached_token.lock().clone() {
            return Ok(token);
        }

        let result = self
            .runner
            .run(&self.program, &["auth", "token"], self.timeout)
            .await;
        let token = expect_success(&self.program, result)?;
        if token.is_empty() {
            return Err(CredentialError::NotAuthenticated {
                program: self.program.clone(),
                detail: "empty token".to_string(),
            });
        }

        *self.cached_token.lock() = Some(token.clone());
        Ok(token)
    }

    pub fn clear_cache(&self) {
        *self.cached_token.lock() = None;
    }

    /// Write registry credentials into the container runtime's config.
    pub async fn configure_docker(&self) -> Result<(), CredentialError> {
        let result = self
            .runner
            .run(&self.program, &["auth", "configure-docker"], self.timeout)
            .await;
        expect_success(&self.program, result).map(|_| ())
    }

    pub async fn login(&self) -> Result<(), CredentialError> {
        let result = self
            .runner
            .run(&self.program, &["auth", "login"], self.timeout)
            .await;
        expect_success(&self.program, result)?;
        self.clear_cache();
        Ok(())
    }

    /// Fresh token plus runtime configuration; a failed token fetch triggers a full login.
    pub async fn refresh(&self) -> Result<(), CredentialError> {
        self.clear_cache();

        match self.token(false).await {
            Ok(_) => {}
            Err(CredentialError::NotInstalled(program)) => {
                return Err(CredentialError::NotInstalled(program));
            }
            Err(e) => {
                tracing::warn!("{} token unavailable ({}), attempting login", self.program, e);
                if let Err(login_err) = self.login().await {
                    tracing::error!(
                        "{} login failed: {}. Run `{} auth login` and retry",
                        self.program,
                        login_err,
                        self.program
                    );
                    return Err(login_err);
                }
            }
        }

        self.configure_docker().await?;
        tracing::info!("{} credentials refreshed", self.program);
        Ok(())
    }
}

#[async_trait]
impl BearerTokenSource for VendorCli {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        self.token(true).await
    }
}
