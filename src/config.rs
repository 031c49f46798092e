use anyhow::{anyhow, Context, Result};
use std::env;

#[derive(Clone)]
pub struct Config {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub emon_url: String,
    pub api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mqtt_host = env::var("MQTT_HOST").unwrap_or_else(|_| "localhost".to_string());
        let mqtt_port = env::var("MQTT_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(1883);
        let emon_url = env::var("EMON_URL")
            .unwrap_or_else(|_| "https://emon.example.org/input/post".to_string());
        let api_key =
            env::var("EMON_API_KEY").context("EMON_API_KEY environment variable is required")?;

        if api_key.trim().is_empty() {
            return Err(anyhow!("EMON_API_KEY must not be empty"));
        }

        Ok(Self {
            mqtt_host,
            mqtt_port,
            emon_url,
            api_key,
        })
    }
}
