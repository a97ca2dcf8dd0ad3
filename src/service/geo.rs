//! # geo 模块
//!
//! 代理出口 IP 的地理归属解析。
//!
//! 同时向三个公共查询服务发起请求（经代理转发，空 IP 即查询
//! 代理自身的出口地址），各自携带独立的截止时间。结果写入与
//! 注册顺序一致的槽位，全部完成后按注册顺序取第一个有效结果，
//! 保证在并发竞速下仍然是确定性的选择。
//!
//! 地理解析是尽力而为的：全部失败只会退化为"未知"，
//! 永远不会使一次存活验证失败。

use reqwest::Client;
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

use crate::model::GeoInfo;

/// 地理查询的保底时长（毫秒）。即使探测耗尽了外层超时，
/// 每个查询服务仍至少获得这么多预算。
const GEO_TIMEOUT_FLOOR_MS: u64 = 3000;

struct Provider {
    name: &'static str,
    url: fn(&str) -> String,
    normalize: fn(&Value) -> GeoInfo,
}

/// 查询服务按优先级注册，槽位顺序即回退顺序。
fn providers() -> [Provider; 3] {
    [
        Provider {
            name: "ip-api.com",
            url: |ip| format!("http://ip-api.com/json/{}", ip),
            normalize: from_ip_api,
        },
        Provider {
            name: "ipwho.is",
            url: |ip| format!("https://ipwho.is/{}", ip),
            normalize: from_ipwho,
        },
        Provider {
            name: "ipapi.co",
            url: |ip| {
                if ip.is_empty() {
                    "https://ipapi.co/json/".to_string()
                } else {
                    format!("https://ipapi.co/{}/json/", ip)
                }
            },
            normalize: from_ipapi_co,
        },
    ]
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn from_ip_api(v: &Value) -> GeoInfo {
    let ok = v.get("status").and_then(Value::as_str) == Some("success");
    GeoInfo {
        ip: str_field(v, "query"),
        country: if ok { str_field(v, "country") } else { String::new() },
        city: str_field(v, "city"),
    }
}

fn from_ipwho(v: &Value) -> GeoInfo {
    let ok = v.get("success").and_then(Value::as_bool).unwrap_or(false);
    GeoInfo {
        ip: str_field(v, "ip"),
        country: if ok { str_field(v, "country") } else { String::new() },
        city: str_field(v, "city"),
    }
}

fn from_ipapi_co(v: &Value) -> GeoInfo {
    let err = v.get("error").and_then(Value::as_bool).unwrap_or(false);
    GeoInfo {
        ip: str_field(v, "ip"),
        country: if err { String::new() } else { str_field(v, "country_name") },
        city: str_field(v, "city"),
    }
}

/// 回环、内网网段、链路本地地址不具备公网归属，直接短路。
pub fn is_private_addr(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// 解析代理出口的地理信息。
///
/// `host` 为内网/回环地址时立即返回固定的本地归属，不发起任何
/// 网络请求；否则三个服务并发竞速，按注册顺序取第一个 country
/// 非空的结果。全部失败或为空时返回"未知"占位值。
pub async fn resolve(client: &Client, host: &str, remaining_ms: u64) -> GeoInfo {
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_addr(&ip) {
            return GeoInfo::local(host);
        }
    }

    let budget = remaining_ms.max(GEO_TIMEOUT_FLOOR_MS);
    let handles: Vec<_> = providers()
        .into_iter()
        .map(|provider| {
            let client = client.clone();
            tokio::spawn(async move { query_provider(&client, &provider, budget).await })
        })
        .collect();

    // 槽位与注册顺序一致，完成时序不影响最终选择
    let slots = futures::future::join_all(handles).await;
    for slot in slots {
        if let Ok(Some(info)) = slot {
            if info.is_resolved() {
                return info;
            }
        }
    }
    GeoInfo::unknown()
}

async fn query_provider(client: &Client, provider: &Provider, budget_ms: u64) -> Option<GeoInfo> {
    // 空 IP 即查询经代理出口看到的自身地址
    let url = (provider.url)("");
    let deadline = Duration::from_millis(budget_ms);

    let value: Value = tokio::time::timeout(deadline, async {
        client.get(&url).send().await?.json::<Value>().await
    })
    .await
    .ok()?
    .ok()?;

    let info = (provider.normalize)(&value);
    if info.is_resolved() {
        debug!("{} 返回归属地: {} / {}", provider.name, info.country, info.city);
        Some(info)
    } else {
        debug!("{} 未返回有效归属地", provider.name);
        None
    }
}
