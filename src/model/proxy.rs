use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::APP_CONFIG;

/// 从描述串解析出的代理端点。
///
/// 描述串格式为 `host:port` 或 `host:port:username:password`，
/// 解析成功后端点不再变化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    /// 端口号，范围 1-65535
    pub port: u16,
    /// 认证用户名，无认证时为空串
    pub username: String,
    /// 认证密码，无认证时为空串
    pub password: String,
}

impl ProxyEndpoint {
    /// 解析单条代理描述串。
    ///
    /// 按 `:` 拆分，至少要求 host 和 port 两段；第 3、4 段为可选的
    /// 用户名和密码，缺省为空串，多余的段被忽略。端口必须是 1-65535
    /// 的整数。格式不符时返回 `None`，不产生部分填充的端点。
    ///
    /// 本函数不做任何网络校验，主机是否可达由探测阶段判断。
    pub fn parse(descriptor: &str) -> Option<Self> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return None;
        }

        let parts: Vec<&str> = descriptor.split(':').collect();
        if parts.len() < 2 {
            return None;
        }

        let host = parts[0];
        if host.is_empty() {
            return None;
        }
        let port: u16 = parts[1].parse().ok().filter(|p| *p > 0)?;

        Some(Self {
            host: host.to_string(),
            port,
            username: parts.get(2).copied().unwrap_or("").to_string(),
            password: parts.get(3).copied().unwrap_or("").to_string(),
        })
    }

    /// 仅当用户名和密码同时非空时才算携带认证信息。
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// 代理协议类型，决定出站流量如何经过代理转发。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// 明文 HTTP 代理
    #[default]
    Http,
    /// TLS 隧道的 HTTP 代理
    Https,
    /// SOCKS5 代理
    Socks5,
}

impl ProxyKind {
    /// 从调用方传入的字符串解析类型，无法识别时回退为 HTTP，
    /// 保证验证管线不会因类型参数而失败。
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "https" => Self::Https,
            "socks5" => Self::Socks5,
            _ => Self::Http,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scheme())
    }
}

/// 一次批量验证的参数，对该批次内的所有代理统一生效。
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub kind: ProxyKind,
    pub timeout_ms: u64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            kind: ProxyKind::Http,
            timeout_ms: APP_CONFIG.validate.timeout,
        }
    }
}

impl ValidationOptions {
    /// 由调用方参数构造，超时缺省或非正数时取配置的默认值。
    pub fn new(kind: ProxyKind, timeout_ms: Option<u64>) -> Self {
        Self {
            kind,
            timeout_ms: timeout_ms
                .filter(|t| *t > 0)
                .unwrap_or(APP_CONFIG.validate.timeout),
        }
    }
}
