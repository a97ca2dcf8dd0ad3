mod app_config;
mod proxy;
mod result;

pub use app_config::{AppConfig, APP_CONFIG};
pub use proxy::{ProxyEndpoint, ProxyKind, ValidationOptions};
pub use result::{BatchProgress, GeoInfo, ValidationResult, ValidationStatus, UNKNOWN};
