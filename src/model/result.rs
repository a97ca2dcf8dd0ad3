use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::ProxyKind;

/// 地理信息完全无法解析时的占位值。
pub const UNKNOWN: &str = "未知";

/// 代理出口的 IP 与大致归属地。
///
/// 由地理解析器产出；所有来源都失败时各字段退化为 [`UNKNOWN`]。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub ip: String,
    pub country: String,
    pub city: String,
}

impl GeoInfo {
    pub fn unknown() -> Self {
        Self {
            ip: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
        }
    }

    /// 内网/回环地址的固定归属地，不发起任何网络查询。
    pub fn local(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            country: "本地".to_string(),
            city: "局域网".to_string(),
        }
    }

    /// country 字段非空才算有效解析结果。
    pub fn is_resolved(&self) -> bool {
        !self.country.is_empty() && self.country != UNKNOWN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// 探测成功，代理可转发流量
    Success,
    /// 连接失败或超时
    Failed,
    /// 描述串格式错误，未发起任何网络请求
    Invalid,
}

/// 单个代理的最终验证记录，构造后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// 原始描述串，原样回传给调用方
    pub proxy: String,
    pub status: ValidationStatus,
    pub message: String,
    /// 探测耗时（毫秒），地理查询不计入
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub proxy_kind: ProxyKind,
    pub checked_at: NaiveDateTime,
}

impl ValidationResult {
    pub fn invalid(descriptor: &str, kind: ProxyKind) -> Self {
        Self {
            proxy: descriptor.to_string(),
            status: ValidationStatus::Invalid,
            message: "无效的代理格式".to_string(),
            response_time_ms: 0,
            ip: None,
            country: None,
            city: None,
            proxy_kind: kind,
            checked_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn failed(descriptor: &str, kind: ProxyKind, message: String, elapsed_ms: u64) -> Self {
        Self {
            proxy: descriptor.to_string(),
            status: ValidationStatus::Failed,
            message,
            response_time_ms: elapsed_ms,
            ip: None,
            country: None,
            city: None,
            proxy_kind: kind,
            checked_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn success(descriptor: &str, kind: ProxyKind, elapsed_ms: u64, geo: GeoInfo) -> Self {
        Self {
            proxy: descriptor.to_string(),
            status: ValidationStatus::Success,
            message: "代理可用".to_string(),
            response_time_ms: elapsed_ms,
            ip: Some(geo.ip),
            country: Some(geo.country),
            city: Some(geo.city),
            proxy_kind: kind,
            checked_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// 流式模式下的进度快照，每完成一条重新计算，仅用于进度上报。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub checked: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
    pub elapsed_ms: u64,
}

impl BatchProgress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            100
        } else {
            (self.checked * 100 / self.total) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_sentinels() {
        let local = GeoInfo::local("10.0.0.1");
        assert_eq!(local.ip, "10.0.0.1");
        assert_eq!(local.country, "本地");
        assert_eq!(local.city, "局域网");
        assert!(local.is_resolved());

        assert!(!GeoInfo::unknown().is_resolved());
    }

    #[test]
    fn test_result_serialization() {
        let r = ValidationResult::invalid("bad", ProxyKind::Http);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(r#""status":"invalid""#));
        assert!(json.contains(r#""responseTimeMs":0"#));
        // 非 success 状态不输出地理字段
        assert!(!json.contains(r#""ip""#));

        let ok = ValidationResult::success("1.2.3.4:80", ProxyKind::Socks5, 120, GeoInfo::unknown());
        let json = serde_json::to_string(&ok).unwrap();
        assert!(json.contains(r#""proxyKind":"socks5""#));
        assert!(json.contains(r#""ip":"未知""#));
    }

    #[test]
    fn test_progress_percent() {
        let p = BatchProgress { checked: 5, succeeded: 2, failed: 3, total: 20, elapsed_ms: 10 };
        assert_eq!(p.percent(), 25);
    }
}
