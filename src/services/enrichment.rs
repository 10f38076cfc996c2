use once_cell::sync::Lazy;
use serde::Deserialize;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config;

/// Response shape of the ip-api.com JSON endpoint. Every field may be
/// absent or null; a partial result is still worth storing.
#[derive(Debug, Deserialize)]
pub struct GeoIpResponse {
    pub country: Option<String>,
    pub region: Option<String>,
    #[serde(rename = "regionName")]
    pub region_name: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Field mask asking ip-api.com for exactly the fields above.
const GEOIP_FIELDS: u32 = 61439;

// One shared HTTP client for every enrichment; reqwest pools connections
// per client, so rebuilding it per lookup would discard the pool.
static HTTP: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config::config().enrichment.timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

pub struct GeoIpClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeoIpClient {
    /// The base URL is injectable so lookups can be pointed at a stand-in
    /// endpoint in tests.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: HTTP.clone(), base_url: base_url.into() }
    }

    pub fn from_config() -> Self {
        Self::new(&config::config().enrichment.base_url)
    }

    pub async fn lookup(&self, ip: &str) -> anyhow::Result<GeoIpResponse> {
        let url = format!("{}/json/{}?fields={}", self.base_url, ip, GEOIP_FIELDS);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json::<GeoIpResponse>().await?)
    }
}

/// Attach a location record to a freshly-inserted sale, best effort. Runs
/// off the request path; the sale stands whether or not this ever lands,
/// and any failure is only logged.
pub fn spawn_enrichment(pool: PgPool, sale_id: Uuid, ip: String) {
    if !config::config().enrichment.enabled {
        debug!(%sale_id, "enrichment disabled, skipping");
        return;
    }

    tokio::spawn(async move {
        if let Err(e) = enrich_sale(&pool, sale_id, &ip).await {
            warn!(%sale_id, ip = %ip, "sale enrichment failed: {:#}", e);
        }
    });
}

async fn enrich_sale(pool: &PgPool, sale_id: Uuid, ip: &str) -> anyhow::Result<()> {
    let client = GeoIpClient::from_config();
    let location = client.lookup(ip).await?;

    sqlx::query(
        "INSERT INTO sale_locations \
         (id, sale_id, country, region, region_name, city, latitude, longitude) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(Uuid::new_v4())
    .bind(sale_id)
    .bind(location.country)
    .bind(location.region)
    .bind(location.region_name)
    .bind(location.city)
    .bind(location.lat)
    .bind(location.lon)
    .execute(pool)
    .await?;

    debug!(%sale_id, "sale enrichment stored");
    Ok(())
}
