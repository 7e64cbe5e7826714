//! `threadclaw config`: print configuration.

use threadclaw_config::{AppConfig, ConfigError};

pub fn run(
    config: Result<AppConfig, ConfigError>,
    default: bool,
    path: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if path {
        println!("{}", AppConfig::config_dir().join("config.toml").display());
        return Ok(());
    }

    if default {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = config.map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() {
        eprintln!("# warning: no API key set (THREADCLAW_API_KEY, OPENAI_API_KEY or OPENROUTER_API_KEY)");
    }
    print!("{}", config.redacted_toml());
    Ok(())
}
