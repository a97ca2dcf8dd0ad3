//! # prober 模块
//!
//! 代理存活探测：经代理向固定的轻量地址发起一次 GET 请求，
//! 在截止时间内收到 2xx（含 204 空响应）即判定隧道可用。
//! 超时与其他连接失败分开归类，差异体现在结果消息里。

use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::model::APP_CONFIG;

/// 一次探测的结果。`elapsed_ms` 为从发起到成功/失败/取消的墙钟耗时。
#[derive(Debug)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub elapsed_ms: u64,
    pub error: Option<ProbeError>,
}

#[derive(Debug)]
pub enum ProbeError {
    /// 截止时间先于响应到达，请求已被取消
    Timeout,
    /// 网络层失败（拒绝连接、DNS 失败等）
    Connect(String),
    /// 隧道通了但探测地址返回非成功状态码
    Status(u16),
}

impl ProbeOutcome {
    fn alive(elapsed_ms: u64) -> Self {
        Self { ok: true, elapsed_ms, error: None }
    }

    fn dead(elapsed_ms: u64, error: ProbeError) -> Self {
        Self { ok: false, elapsed_ms, error: Some(error) }
    }

    /// 面向调用方的结果消息，区分超时与其他失败。
    pub fn message(&self, timeout_ms: u64) -> String {
        match &self.error {
            None => "代理可用".to_string(),
            Some(ProbeError::Timeout) => format!("连接超时（{}ms）", timeout_ms),
            Some(ProbeError::Connect(e)) => format!("连接失败: {}", e),
            Some(ProbeError::Status(code)) => format!("探测返回异常状态码: {}", code),
        }
    }
}

/// 经 `client` 对探测地址发起一次请求，附带 `timeout_ms` 截止时间。
///
/// 截止时间到达时请求被取消并归类为超时；`tokio::time::timeout`
/// 丢弃未完成的 future，底层连接随之释放。
pub async fn probe(client: &Client, timeout_ms: u64) -> ProbeOutcome {
    let url = APP_CONFIG.validate.probe_url.as_str();
    let deadline = Duration::from_millis(timeout_ms);

    let start = Instant::now();
    let result = tokio::time::timeout(deadline, client.get(url).send()).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Err(_) => ProbeOutcome::dead(elapsed_ms, ProbeError::Timeout),
        Ok(Err(e)) if e.is_timeout() => ProbeOutcome::dead(elapsed_ms, ProbeError::Timeout),
        Ok(Err(e)) => ProbeOutcome::dead(elapsed_ms, ProbeError::Connect(e.to_string())),
        Ok(Ok(resp)) => {
            let status = resp.status();
            debug!("探测响应状态码: {}，耗时 {}ms", status, elapsed_ms);
            // 204 无内容同样代表隧道可用
            if status == StatusCode::NO_CONTENT || status.is_success() {
                ProbeOutcome::alive(elapsed_ms)
            } else {
                ProbeOutcome::dead(elapsed_ms, ProbeError::Status(status.as_u16()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProxyEndpoint, ProxyKind};
    use crate::service::transport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_probe_no_content_success() {
        // 本地代理读完请求后回 204 空响应，视为隧道可用
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n")
                .await;
        });

        let ep = ProxyEndpoint::parse(&format!("127.0.0.1:{}", addr.port())).unwrap();
        let client = transport::build(&ep, ProxyKind::Http).unwrap();

        let outcome = probe(&client, 2000).await;
        assert!(outcome.ok);
        assert!(outcome.error.is_none());
        assert!(outcome.elapsed_ms < 2000);
        assert_eq!(outcome.message(2000), "代理可用");
    }

    #[tokio::test]
    async fn test_probe_connect_refused() {
        // 端口 1 无人监听，连接被立即拒绝
        let ep = ProxyEndpoint::parse("127.0.0.1:1").unwrap();
        let client = transport::build(&ep, ProxyKind::Http).unwrap();

        let outcome = probe(&client, 2000).await;
        assert!(!outcome.ok);
        assert!(matches!(outcome.error, Some(ProbeError::Connect(_))));
        assert!(outcome.message(2000).contains("连接失败"));
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        // 本地监听但永不响应，触发截止时间
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let ep = ProxyEndpoint::parse(&format!("127.0.0.1:{}", addr.port())).unwrap();
        let client = transport::build(&ep, ProxyKind::Http).unwrap();

        let outcome = probe(&client, 500).await;
        assert!(!outcome.ok);
        assert!(matches!(outcome.error, Some(ProbeError::Timeout)));
        assert!(outcome.elapsed_ms >= 500);
        // 取消开销不应显著超过截止时间
        assert!(outcome.elapsed_ms < 2000);
        assert!(outcome.message(500).contains("超时"));
    }
}
