#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region data gateway.
//!
//! The selection coordinator and the polling monitor never talk to a data
//! service directly; they go through the [`RegionGateway`] trait. Two
//! implementations ship here:
//!
//! - [`overpass::OverpassGateway`]: administrative boundaries and tags from
//!   an Overpass API endpoint, flood depths from a JSON status feed.
//! - [`memory::InMemoryGateway`]: a fixed region set indexed by an R-tree,
//!   with the embedded demo dataset and hooks for latency and failures.
//!
//! Gateway settings come from [`config::GatewayConfig`].

pub mod config;
pub mod memory;
pub mod overpass;

use flood_map_region_models::{
    FloodDepthReading, RegionDetail, RegionId, RegionRef, SelectionBounds,
};
use thiserror::Error;

/// Errors from region data gateway calls.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response was well-formed JSON but not the expected shape.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The service has no region with this id.
    #[error("Region {id} not found")]
    NotFound {
        /// Requested region.
        id: RegionId,
    },

    /// The service is temporarily unavailable.
    #[error("Gateway unavailable: {message}")]
    Unavailable {
        /// Why the call could not be served.
        message: String,
    },
}

/// Source of region boundaries, attributes, and flood status.
#[async_trait::async_trait]
pub trait RegionGateway: Send + Sync {
    /// Returns references to every region intersecting `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the lookup fails.
    async fn find_regions_in_bounds(
        &self,
        bounds: &SelectionBounds,
    ) -> Result<Vec<RegionRef>, GatewayError>;

    /// Returns tags and boundary geometry for a single region.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the request fails or the region is
    /// unknown.
    async fn get_region_detail(&self, id: &RegionId) -> Result<RegionDetail, GatewayError>;

    /// Returns the current flood depth for every monitored region.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the status feed cannot be read.
    async fn get_flood_depth_status(&self) -> Result<Vec<FloodDepthReading>, GatewayError>;
}
