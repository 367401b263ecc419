//! Subcommand implementations. Each returns the JSON printed on stdout.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use mediaurl_client::{
    candidate_urls, Action, CallOptions, Client, EndpointType, ProbeResult,
};

pub fn candidates(input: &str) -> Value {
    json!(candidate_urls(input))
}

/// Discover addons from user input. Server results are probed once more,
/// this time accepting addon answers only.
pub async fn discover(client: &Client, input: &str) -> Result<Vec<Value>> {
    let results = client
        .discover(input)
        .await
        .ok_or_else(|| anyhow!("No addon or server found for \"{}\"", input))?;

    let mut addons = Vec::new();
    for result in results {
        match result {
            ProbeResult::Addon { addon, .. } => addons.push(addon.to_value()?),
            ProbeResult::Server { endpoints } => {
                tracing::info!(endpoints = ?endpoints, "Server found, probing its addons");
                let Some(found) = client.probe(&endpoints, false, EndpointType::Addon).await else {
                    tracing::warn!(endpoints = ?endpoints, "No working addon endpoint");
                    continue;
                };
                for addon in found.into_iter().filter_map(ProbeResult::into_addon) {
                    addons.push(addon.to_value()?);
                }
            }
        }
    }
    Ok(addons)
}

/// Discover the addon at `url`, then call `action` on it.
pub async fn call(
    client: &Client,
    url: &str,
    action: &str,
    input: Value,
    signature: Option<String>,
) -> Result<Value> {
    let results = client
        .probe(&[url.to_string()], false, EndpointType::Addon)
        .await
        .ok_or_else(|| anyhow!("No addon found at {}", url))?;
    let Some(descriptor) = results.into_iter().find_map(ProbeResult::into_addon) else {
        bail!("No addon found at {}", url);
    };

    let action = Action::parse(action);
    let mut addon = client.addon(descriptor);
    let options = CallOptions {
        signature,
        ..CallOptions::default()
    };
    addon
        .call(action.clone(), input, &options)
        .await
        .with_context(|| format!("Calling {} on addon {}", action, addon.id()))
}
