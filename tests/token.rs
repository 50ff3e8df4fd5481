// ABOUTME: Integration tests for per-registry token bookkeeping with real CLI refreshers.
// ABOUTME: Verifies which tools run for which registry family.

mod support;

use pullwarden::auth::{CliRefresher, CloudCli, VendorCli};
use pullwarden::config::{RegistriesConfig, TokenConfig};
use pullwarden::token::{RegistryFamily, TokenManager};
use std::sync::Arc;
use std::time::Duration;
use support::FakeRunner;

fn manager(runner: &Arc<FakeRunner>) -> TokenManager {
    let registries = RegistriesConfig::default();
    let timeout = Duration::from_secs(5);
    let vendor = VendorCli::new(runner.clone(), "chainctl", timeout);
    let cloud = CloudCli::new(
        runner.clone(),
        "gcloud",
        "docker",
        registries.cloud_login_hosts(),
        timeout,
    );
    TokenManager::new(
        Arc::new(CliRefresher::new(vendor, cloud)),
        registries,
        &TokenConfig::default(),
    )
}

#[tokio::test]
async fn unseen_vendor_host_needs_refresh_others_do_not() {
    let runner = Arc::new(FakeRunner::new());
    let tokens = manager(&runner);

    assert!(tokens.needs_refresh("cgr.dev"));
    assert!(!tokens.needs_refresh("docker.io"));
    assert!(!tokens.needs_refresh("gcr.io"));
}

#[tokio::test]
async fn vendor_refresh_runs_vendor_cli_once() {
    let runner = Arc::new(FakeRunner::new());
    runner.succeed("chainctl auth token", "tok");
    runner.succeed("chainctl auth configure-docker", "");
    let tokens = manager(&runner);

    tokens.refresh_if_needed("cgr.dev").await.unwrap();
    tokens.refresh_if_needed("cgr.dev").await.unwrap();

    assert_eq!(runner.calls_matching("chainctl").len(), 2);
    assert!(!tokens.needs_refresh("cgr.dev"));
    assert!(tokens.status("cgr.dev").last_refresh.is_some());
}

#[tokio::test(start_paused = true)]
async fn cloud_refresh_stamps_the_whole_family() {
    let runner = Arc::new(FakeRunner::new());
    runner.succeed("gcloud auth print-access-token", "ya29");
    runner.succeed("docker login", "Login Succeeded");
    let tokens = manager(&runner);

    assert_eq!(tokens.family("us-docker.pkg.dev"), RegistryFamily::Cloud);
    tokens.refresh_proactively("us-docker.pkg.dev").await.unwrap();
    // Not due: nothing has been recorded for the host yet.
    assert!(runner.calls().is_empty());

    tokens.record_use("us-docker.pkg.dev");
    tokio::time::advance(Duration::from_secs(50 * 60)).await;
    assert!(tokens.needs_proactive_refresh("us-docker.pkg.dev"));

    tokens.refresh_proactively("us-docker.pkg.dev").await.unwrap();
    assert_eq!(runner.calls_matching("gcloud").len(), 1);
    assert_eq!(runner.calls_matching("docker login").len(), 5);
    assert_eq!(runner.calls_matching("https://pkg.dev").len(), 1);
    assert!(!tokens.needs_proactive_refresh("gcr.io"));
    assert!(!tokens.needs_proactive_refresh("us-docker.pkg.dev"));
}

#[tokio::test]
async fn other_registries_are_never_refreshed() {
    let runner = Arc::new(FakeRunner::new());
    let tokens = manager(&runner);

    tokens.record_use("quay.io");
    assert_eq!(tokens.family("quay.io"), RegistryFamily::Other);
    tokens.refresh_if_needed("quay.io").await.unwrap();
    assert!(runner.calls().is_empty());
}
