// ABOUTME: Credential sources backed by external authentication CLIs.
// ABOUTME: Distinguishes missing tools, expired sessions and timeouts so callers can act on them.

mod cloud;
mod vendor;

pub use cloud::CloudCli;
pub use vendor::VendorCli;

use async_trait::async_trait;
use thiserror::Error;

use crate::classify;
use crate::process::{CommandOutput, ProcessError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{0} is not installed or not in PATH")]
    NotInstalled(String),

    #[error("{program} is not authenticated, run `{program} auth login` ({detail})")]
    NotAuthenticated { program: String, detail: String },

    #[error("{0} timed out")]
    TimedOut(String),

    #[error("{program} failed: {detail}")]
    Failed { program: String, detail: String },
}

/// Renews registry credentials for the runtime's credential store.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Refresh credentials for the primary vendor registry.
    async fn refresh_primary(&self) -> Result<(), CredentialError>;

    /// Refresh credentials for the cloud registry family.
    async fn refresh_cloud(&self) -> Result<(), CredentialError>;
}

/// Supplies bearer tokens for authenticated HTTP APIs.
#[async_trait]
pub trait BearerTokenSource: Send + Sync {
    async fn bearer_token(&self) -> Result<String, CredentialError>;
}

/// A pre-issued token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl BearerTokenSource for StaticToken {
    async fn bearer_token(&self) -> Result<String, CredentialError> {
        Ok(self.0.clone())
    }
}

/// Refreshes the vendor registry through its CLI and cloud registries through theirs.
pub struct CliRefresher {
    vendor: VendorCli,
    cloud: CloudCli,
}

impl CliRefresher {
    pub fn new(vendor: VendorCli, cloud: CloudCli) -> Self {
        Self { vendor, cloud }
    }
}

#[async_trait]
impl CredentialRefresher for CliRefresher {
    async fn refresh_primary(&self) -> Result<(), CredentialError> {
        self.vendor.refresh().await
    }

    async fn refresh_cloud(&self) -> Result<(), CredentialError> {
        self.cloud.authenticate().await
    }
}

/// Turn a tool invocation into its trimmed stdout or a credential error.
pub(crate) fn expect_success(
    program: &str,
    result: Result<CommandOutput, ProcessError>,
) -> Result<String, CredentialError> {
    let output = match result {
        Ok(output) => output,
        Err(ProcessError::NotInstalled(_)) => {
            return Err(CredentialError::NotInstalled(program.to_string()));
        }
        Err(e) => {
            return Err(CredentialError::Failed {
                program: program.to_string(),
                detail: e.to_string(),
            });
        }
    };

    if output.is_timeout() {
        return Err(CredentialError::TimedOut(program.to_string()));
    }
    if output.success {
        return Ok(output.stdout.trim().to_string());
    }

    let detail = output.stderr.trim().to_string();
    let lower = detail.to_lowercase();
    if lower.contains("not authenticated") || lower.contains("login") || classify::is_auth_error(&detail)
    {
        Err(CredentialError::NotAuthenticated {
            program: program.to_string(),
            detail,
        })
    } else {
        Err(CredentialError::Failed {
            program: program.to_string(),
            detail,
        })
    }
}
