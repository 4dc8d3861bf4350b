//! Region and platform lookup.
//!
//! A region label (`"euw"`, `"kr"`, `"europe"`) resolves to the routing target used as the
//! URL host prefix (`"euw1"`, `"kr"`, `"europe"`).

use crate::{Error, ErrorContext, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const EUROPE: &str = "europe";
pub const AMERICAS: &str = "americas";
pub const ASIA: &str = "asia";
pub const SEA: &str = "sea";

pub trait RegionResolver: Send + Sync {
    /// Canonical label of a known region, error for anything else.
    fn region_name(&self, region: &str) -> Result<String>;
    fn routing_target(&self, region: &str) -> Result<String>;
    /// Continental route serving a platform region.
    fn continent_of(&self, region: &str) -> Result<String>;
}

static PLATFORMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (EUROPE, EUROPE),
        (AMERICAS, AMERICAS),
        (ASIA, ASIA),
        (SEA, SEA),
        ("na", "na1"),
        ("euw", "euw1"),
        ("eune", "eun1"),
        ("las", "la2"),
        ("lan", "la1"),
        ("br", "br1"),
        ("ru", "ru"),
        ("tr", "tr1"),
        ("oce", "oc1"),
        ("kr", "kr"),
        ("jp", "jp1"),
        ("ph", "ph2"),
        ("sg", "sg2"),
        ("tw", "tw2"),
        ("th", "th2"),
        ("vn", "vn2"),
    ])
});

/// The standard region → platform table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformTable;

impl PlatformTable {
    pub fn new() -> Self {
        Self
    }

    pub fn regions(&self) -> Vec<&'static str> {
        let mut regions: Vec<_> = PLATFORMS.keys().copied().collect();
        regions.sort_unstable();
        regions
    }

    fn platform(&self, region: &str) -> Result<&'static str> {
        PLATFORMS
            .get(region.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| {
                Error::configuration_with_context(
                    "Invalid region provided. Can not find requested platform.",
                    ErrorContext::new()
                        .with_field_path("region")
                        .with_details(region.to_string())
                        .with_source("region"),
                )
            })
    }
}

impl RegionResolver for PlatformTable {
    fn region_name(&self, region: &str) -> Result<String> {
        self.platform(region)?;
        Ok(region.to_ascii_lowercase())
    }

    fn routing_target(&self, region: &str) -> Result<String> {
        self.platform(region).map(str::to_string)
    }

    fn continent_of(&self, region: &str) -> Result<String> {
        let continent = match self.platform(region)? {
            "euw1" | "eun1" | "tr1" | "ru" => EUROPE,
            "na1" | "la1" | "la2" | "br1" | "oc1" => AMERICAS,
            "kr" | "jp1" => ASIA,
            "ph2" | "sg2" | "tw2" | "th2" | "vn2" => SEA,
            _ => {
                return Err(Error::configuration_with_context(
                    format!(
                        "Unable to convert '{}' platform ID to corresponding continent region.",
                        region
                    ),
                    ErrorContext::new().with_field_path("region").with_source("region"),
                ))
            }
        };
        Ok(continent.to_string())
    }
}
