//! Search Console URL Inspection API client

use anyhow::{Context, Result, bail};
use seolens_core::gsc::UrlInspectionResult;
use serde::Deserialize;
use serde_json::json;

const INSPECT_ENDPOINT: &str =
    "https://searchconsole.googleapis.com/v1/urlInspection/index:inspect";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct InspectResponse {
    inspection_result: Option<UrlInspectionResult>,
}

/// Inspect one URL under a Search Console property.
pub async fn inspect(
    client: &reqwest::Client,
    access_token: &str,
    property: &str,
    url: &str,
) -> Result<UrlInspectionResult> {
    let response = client
        .post(INSPECT_ENDPOINT)
        .bearer_auth(access_token)
        .json(&json!({
            "inspectionUrl": url,
            "siteUrl": property,
        }))
        .send()
        .await
        .context("url inspection request failed")?;

    if !response.status().is_success() {
        bail!("url inspection returned {}", response.status());
    }

    let parsed: InspectResponse = response
        .json()
        .await
        .context("unreadable url inspection response")?;
    Ok(parsed.inspection_result.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_envelope_unwraps_the_inspection_result() {
        let parsed: InspectResponse = serde_json::from_str(
            r#"{
                "inspectionResult": {
                    "indexStatusResult": {
                        "verdict": "FAIL",
                        "coverageState": "Page with redirect"
                    }
                }
            }"#,
        )
        .unwrap();
        let result = parsed.inspection_result.unwrap();
        assert_eq!(
            result.index_status_result.unwrap().coverage_state.as_deref(),
            Some("Page with redirect")
        );

        let empty: InspectResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.inspection_result.is_none());
    }
}
