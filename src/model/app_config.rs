use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub static APP_CONFIG: Lazy<AppConfig> =
    Lazy::new(|| AppConfig::load().expect("Failed to load configuration"));

#[derive(Debug, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub validate: ValidateConfig,
    pub log: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ValidateConfig {
    /// 批量验证的最大并发数
    pub semaphore: usize,
    /// 单个代理的验证超时（毫秒）
    pub timeout: u64,
    /// 存活探测的目标地址，要求返回 2xx（含 204 空响应）
    pub probe_url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub console_levels: Vec<String>,
}

impl AppConfig {
    fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("Config"))
            .build()?;
        let config = config.try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config() {
        assert!(APP_CONFIG.validate.semaphore > 0);
        assert!(APP_CONFIG.validate.timeout > 0);
    }
}
