//! 验证接口：批量 JSON 与 SSE 流式两种输出边界。
//!
//! 引擎本身不感知传输方式，这里只是把结果接收端接到
//! HTTP 响应上：批量模式一次性返回全部结果，流式模式把
//! 每条结果、进度快照和终止标记作为 SSE 事件推送。

use async_trait::async_trait;
use futures::StreamExt;
use salvo::prelude::*;
use salvo::sse::{self, SseEvent};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;

use crate::model::{BatchProgress, ProxyKind, ValidationOptions, ValidationResult};
use crate::service::validator::{self, ResultSink};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    proxies: Vec<String>,
    #[serde(default)]
    proxy_kind: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

impl ValidateRequest {
    fn options(&self) -> ValidationOptions {
        let kind = self
            .proxy_kind
            .as_deref()
            .map(ProxyKind::from_str_or_default)
            .unwrap_or_default();
        ValidationOptions::new(kind, self.timeout)
    }
}

/// 推往 SSE 连接的事件。
enum StreamEvent {
    Result(ValidationResult),
    Progress(BatchProgress),
    Done,
}

impl StreamEvent {
    fn into_sse(self) -> Result<SseEvent, Infallible> {
        Ok(match self {
            Self::Result(r) => SseEvent::default()
                .name("result")
                .text(serde_json::to_string(&r).unwrap_or_default()),
            Self::Progress(p) => SseEvent::default()
                .name("progress")
                .text(serde_json::to_string(&p).unwrap_or_default()),
            Self::Done => SseEvent::default().name("done").text("1"),
        })
    }
}

/// 把结果写进 mpsc 通道的接收端，通道另一头接 SSE 流。
/// 客户端断开导致通道关闭时写入报错，由编排层终止处理。
struct ChannelSink {
    tx: mpsc::Sender<StreamEvent>,
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn push(&self, result: &ValidationResult) -> anyhow::Result<()> {
        self.tx
            .send(StreamEvent::Result(result.clone()))
            .await
            .map_err(|_| anyhow::anyhow!("客户端已断开"))
    }

    async fn finish(&self) -> anyhow::Result<()> {
        self.tx
            .send(StreamEvent::Done)
            .await
            .map_err(|_| anyhow::anyhow!("客户端已断开"))
    }
}

#[handler]
async fn validate_batch(req: &mut Request, res: &mut Response) {
    let body: ValidateRequest = match req.parse_json().await {
        Ok(body) => body,
        Err(_) => {
            res.status_code(StatusCode::BAD_REQUEST);
            return;
        }
    };

    let options = body.options();
    let results = validator::validate_all(body.proxies, options).await;
    res.render(Json(results));
}

#[handler]
async fn validate_sse(req: &mut Request, res: &mut Response) {
    let body: ValidateRequest = match req.parse_json().await {
        Ok(body) => body,
        Err(_) => {
            res.status_code(StatusCode::BAD_REQUEST);
            return;
        }
    };

    let options = body.options();
    let proxies = body.proxies;
    let (tx, rx) = mpsc::channel::<StreamEvent>(64);

    tokio::spawn(async move {
        let sink = ChannelSink { tx: tx.clone() };
        let progress_tx = tx.clone();
        let report = move |p: &BatchProgress| {
            // 进度属于带外信息，通道拥塞时宁可丢弃也不阻塞验证
            let _ = progress_tx.try_send(StreamEvent::Progress(p.clone()));
        };

        if let Err(e) = validator::validate_stream(&proxies, &options, &sink, Some(&report)).await {
            error!("流式验证中止: {}", e);
        }
    });

    sse::stream(res, ReceiverStream::new(rx).map(StreamEvent::into_sse));
}

pub fn validate_router() -> Router {
    Router::with_path("validate")
        .post(validate_batch)
        .push(Router::with_path("stream").post(validate_sse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::APP_CONFIG;

    #[test]
    fn test_request_options_mapping() {
        let req: ValidateRequest =
            serde_json::from_str(r#"{"proxies":["1.2.3.4:80"],"proxyKind":"socks5","timeout":800}"#)
                .unwrap();
        let options = req.options();
        assert_eq!(options.kind, ProxyKind::Socks5);
        assert_eq!(options.timeout_ms, 800);
    }

    #[test]
    fn test_request_defaults() {
        let req: ValidateRequest =
            serde_json::from_str(r#"{"proxies":["1.2.3.4:80"]}"#).unwrap();
        let options = req.options();
        assert_eq!(options.kind, ProxyKind::Http);
        assert_eq!(options.timeout_ms, APP_CONFIG.validate.timeout);
    }

    #[test]
    fn test_request_unknown_kind_falls_back() {
        let req: ValidateRequest =
            serde_json::from_str(r#"{"proxies":[],"proxyKind":"socks9"}"#).unwrap();
        assert_eq!(req.options().kind, ProxyKind::Http);
    }
}
