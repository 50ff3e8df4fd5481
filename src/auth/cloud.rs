// ABOUTME: Cloud registry credentials through the cloud provider CLI.
// ABOUTME: Logs the container runtime into every cloud registry host, passing the short-lived token on stdin.

use std::sync::Arc;
use std::time::Duration;

use super::{CredentialError, expect_success};
use crate::process::CommandRunner;

const OAUTH_USER: &str = "oauth2accesstoken";

pub struct CloudCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
    runtime: String,
    hosts: Vec<String>,
    timeout: Duration,
}

impl CloudCli {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: impl Into<String>,
        runtime: impl Into<String>,
        hosts: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            runtime: runtime.into(),
            hosts,
            timeout,
        }
    }

    pub async fn access_token(&self) -> Result<String, CredentialError> {
        let result = self
            .runner
            .run(&self.program, &["auth", "print-access-token"], self.timeout)
            .await;
        let token = expect_success(&self.program, result)?;
        if token.is_empty() {
            return Err(CredentialError::NotAuthenticated {
                program: self.program.clone(),
                detail: "no access token returned".to_string(),
            });
        }
        Ok(token)
    }

    /// Log the runtime into each host; at least one login must succeed.
    pub async fn authenticate(&self) -> Result<(), CredentialError> {
        let token = self.access_token().await?;

        let mut last_error = None;
        let mut logged_in = 0usize;
        for host in &self.hosts {
            let server = format!("https://{host}");
            let result = self
                .runner
                .run_with_input(
                    &self.runtime,
                    &["login", "-u", OAUTH_USER, "--password-stdin", &server],
                    Some(&token),
                    self.timeout,
                )
                .await;
            match expect_success(&self.runtime, result) {
                Ok(_) => {
                    tracing::debug!("Configured {} credentials for {}", self.runtime, host);
                    logged_in += 1;
                }
                Err(e) => {
                    tracing::debug!("{} login to {} failed: {}", self.runtime, host, e);
                    last_error = Some(e);
                }
            }
        }

        if logged_in > 0 {
            tracing::info!("Cloud registry credentials refreshed for {} host(s)", logged_in);
            return Ok(());
        }

        Err(last_error.unwrap_or_else(|| CredentialError::Failed {
            program: self.runtime.clone(),
            detail: "no cloud registry hosts configured".to_string(),
        }))
    }
}
