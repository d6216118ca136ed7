pub mod generate;
pub mod latest;
pub mod onboard;
pub mod profiles;
pub mod serve;
pub mod status;

use evoweb_config::AppConfig;

/// Load configuration with a readable error.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
