//! Overpass API gateway.
//!
//! Region lookups run Overpass QL queries against the configured
//! interpreter:
//!
//! - bounds: `relation["boundary"="administrative"]["admin_level"=N](s,w,n,e); out ids;`
//! - detail: `relation(ID); out geom;`
//!
//! Flood depths come from a separate JSON feed that returns either a bare
//! array of `{ "id", "depth" }` readings or an object wrapping it under
//! `readings`.
//!
//! See <https://wiki.openstreetmap.org/wiki/Overpass_API/Overpass_QL>

use flood_map_region_models::{FloodDepthReading, RegionDetail, RegionId, RegionRef, SelectionBounds};

use crate::config::GatewayConfig;
use crate::{GatewayError, RegionGateway};

/// Server-side timeout passed inside every query, in seconds.
const QUERY_TIMEOUT_SECS: u64 = 25;

/// HTTP gateway backed by Overpass and a flood status feed.
pub struct OverpassGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl OverpassGateway {
    /// Builds a gateway with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Http`] if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("flood-map/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Builds a gateway around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json(&self, req: reqwest::RequestBuilder) -> Result<serde_json::Value, GatewayError> {
        let resp = self.authorize(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        Ok(resp.json().await?)
    }

    async fn run_query(&self, query: &str) -> Result<serde_json::Value, GatewayError> {
        log::debug!("Overpass query: {query}");
        self.get_json(
            self.client
                .get(&self.config.overpass_url)
                .query(&[("data", query)]),
        )
        .await
    }
}

#[async_trait::async_trait]
impl RegionGateway for OverpassGateway {
    async fn find_regions_in_bounds(
        &self,
        bounds: &SelectionBounds,
    ) -> Result<Vec<RegionRef>, GatewayError> {
        let body = self
            .run_query(&bounds_query(bounds, self.config.admin_level))
            .await?;
        parse_region_refs(&body)
    }

    async fn get_region_detail(&self, id: &RegionId) -> Result<RegionDetail, GatewayError> {
        let body = self.run_query(&detail_query(id)?).await?;
        parse_region_detail(&body, id)
    }

    async fn get_flood_depth_status(&self) -> Result<Vec<FloodDepthReading>, GatewayError> {
        let body = self
            .get_json(self.client.get(&self.config.status_url))
            .await?;
        parse_status(body)
    }
}

/// Builds the Overpass QL query for regions intersecting `bounds`.
#[must_use]
pub fn bounds_query(bounds: &SelectionBounds, admin_level: u8) -> String {
    format!(
        "[out:json][timeout:{QUERY_TIMEOUT_SECS}];\
         relation[\"boundary\"=\"administrative\"][\"admin_level\"=\"{admin_level}\"]\
         ({},{},{},{});out ids;",
        bounds.south(),
        bounds.west(),
        bounds.north(),
        bounds.east(),
    )
}

/// Builds the Overpass QL query for a single region's tags and geometry.
///
/// # Errors
///
/// Returns [`GatewayError::Parse`] if `id` is not a numeric relation id.
pub fn detail_query(id: &RegionId) -> Result<String, GatewayError> {
    let raw = id.as_str();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GatewayError::Parse {
            message: format!("'{raw}' is not an Overpass relation id"),
        });
    }
    Ok(format!(
        "[out:json][timeout:{QUERY_TIMEOUT_SECS}];relation({raw});out geom;"
    ))
}

fn elements(body: &serde_json::Value) -> Result<&Vec<serde_json::Value>, GatewayError> {
    body.get("elements")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| GatewayError::Parse {
            message: "Overpass response missing 'elements' array".to_string(),
        })
}

/// Parses an `out ids` response.
fn parse_region_refs(body: &serde_json::Value) -> Result<Vec<RegionRef>, GatewayError> {
    elements(body)?
        .iter()
        .map(|e| serde_json::from_value(e.clone()).map_err(GatewayError::from))
        .collect()
}

/// Parses an `out geom` response for a single relation.
fn parse_region_detail(
    body: &serde_json::Value,
    id: &RegionId,
) -> Result<RegionDetail, GatewayError> {
    let Some(first) = elements(body)?.first() else {
        return Err(GatewayError::NotFound { id: id.clone() });
    };
    Ok(serde_json::from_value(first.clone())?)
}

/// Parses the status feed, accepting a bare array or `{ "readings": [...] }`.
fn parse_status(body: serde_json::Value) -> Result<Vec<FloodDepthReading>, GatewayError> {
    let readings = match body {
        serde_json::Value::Array(_) => body,
        serde_json::Value::Object(mut map) => {
            map.remove("readings").ok_or_else(|| GatewayError::Parse {
                message: "status response missing 'readings'".to_string(),
            })?
        }
        other => {
            return Err(GatewayError::Parse {
                message: format!("unexpected status response: {other}"),
            });
        }
    };
    Ok(serde_json::from_value(readings)?)
}
