// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Normalizes registry host lists and rejects empty entries.

use serde::Deserialize;

pub fn deserialize_hosts<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|host| {
            let host = host.trim().to_lowercase();
            if host.is_empty() {
                Err(serde::de::Error::custom("registry host cannot be empty"))
            } else {
                Ok(host)
            }
        })
        .collect()
}

pub fn deserialize_host<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let host = String::deserialize(deserializer)?.trim().to_lowercase();
    if host.is_empty() {
        return Err(serde::de::Error::custom("registry host cannot be empty"));
    }
    Ok(host)
}
