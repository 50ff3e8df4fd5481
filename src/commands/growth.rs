// ABOUTME: Growth command handler.
// ABOUTME: Fetches monthly vulnerability counts per tag through one shared client and prints growth ratios.

use futures::StreamExt;
use pullwarden::config::Config;
use pullwarden::error::Result;
use pullwarden::output::Output;
use pullwarden::remote::{GrowthRates, Severity, VulnApiClient};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::services::Services;

#[derive(Serialize)]
struct TagGrowth<'a> {
    repo: &'a str,
    tag: &'a str,
    /// `None` when the API returned no history.
    rates: Option<BTreeMap<&'static str, f64>>,
}

fn describe(rates: &GrowthRates) -> String {
    Severity::ALL
        .iter()
        .filter_map(|s| rates.get(s).map(|r| format!("{}: {:.2}", s.as_str(), r)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn growth(config: Config, repo: &str, tags: &[String], output: &Output) -> Result<()> {
    let services = Services::new(config);
    let remote = &services.config.remote;
    let client = VulnApiClient::new(remote, Arc::new(services.vendor_cli()))?;

    output.progress(&format!(
        "Fetching vulnerability counts for {} tag(s) of {repo}...",
        tags.len()
    ));

    let mut results = futures::stream::iter(tags)
        .map(|tag| {
            let client = &client;
            async move { (tag, client.calculate_growth_rate(repo, tag).await) }
        })
        .buffered(remote.concurrency);

    while let Some((tag, rates)) = results.next().await {
        let rates = rates?;
        let human = match rates {
            Some(ref rates) => format!("{repo}:{tag}  {}", describe(rates)),
            None => format!("{repo}:{tag}  no vulnerability history"),
        };
        let data = TagGrowth {
            repo,
            tag,
            rates: rates.map(|r| r.iter().map(|(s, v)| (s.as_str(), *v)).collect()),
        };
        output.result("growth", &human, &data);
    }
    Ok(())
}
