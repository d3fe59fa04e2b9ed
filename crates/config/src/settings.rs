use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub store: StoreSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub rooms: RoomSettings,
    pub geo: GeoSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Which document store backs the DAOs.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Capacity of each watch channel before slow subscribers start missing snapshots.
    pub watch_buffer: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoomSettings {
    pub max_code_attempts: u32,
    pub default_description: String,
    pub max_name_len: usize,
    pub max_description_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeoSettings {
    pub fallback_lat: f64,
    pub fallback_lng: f64,
    pub fallback_accuracy_m: f64,
    pub eta: EtaSettings,
    pub osrm_url: String,
    pub nominatim_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub tracking_interval_secs: u64,
    pub tracking_distance_m: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EtaSettings {
    pub local_speed_kmh: f64,
    pub urban_speed_kmh: f64,
    pub highway_speed_kmh: f64,
    pub local_below_km: f64,
    pub highway_above_km: f64,
    pub route_speed_kmh: f64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("IMHERE"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("store.backend", "mongo")?
            .set_default("store.watch_buffer", 64)?
            .set_default("database.url", "mongodb://localhost:27017/?replicaSet=rs0")?
            .set_default("database.name", "imhere")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.refresh_token_ttl_secs", 604800)?
            .set_default("jwt.issuer", "imhere")?
            .set_default("rooms.max_code_attempts", 16)?
            .set_default("rooms.default_description", "Let's meet up!")?
            .set_default("rooms.max_name_len", 50)?
            .set_default("rooms.max_description_len", 200)?
            .set_default("geo.fallback_lat", -6.2088)?
            .set_default("geo.fallback_lng", 106.8456)?
            .set_default("geo.fallback_accuracy_m", 1000.0)?
            .set_default("geo.eta.local_speed_kmh", 15.0)?
            .set_default("geo.eta.urban_speed_kmh", 25.0)?
            .set_default("geo.eta.highway_speed_kmh", 40.0)?
            .set_default("geo.eta.local_below_km", 5.0)?
            .set_default("geo.eta.highway_above_km", 50.0)?
            .set_default("geo.eta.route_speed_kmh", 50.0)?
            .set_default("geo.osrm_url", "https://router.project-osrm.org")?
            .set_default("geo.nominatim_url", "https://nominatim.openstreetmap.org")?
            .set_default("geo.user_agent", "imhere/0.1")?
            .set_default("geo.request_timeout_secs", 8)?
            .set_default("geo.tracking_interval_secs", 5)?
            .set_default("geo.tracking_distance_m", 10.0)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}
