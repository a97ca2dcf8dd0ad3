//! # validator 模块
//!
//! 验证编排：对每条代理依次执行 解析 → 构建传输 → 存活探测 →
//! 地理解析，并把结果汇总为一条 [`ValidationResult`]。
//!
//! 提供两种调度模式：
//!
//! - 流式（[`validate_stream`]）：逐条顺序验证，每完成一条立即推给
//!   结果接收端，最后发送终止标记；每完成一条重算进度并按节奏上报。
//! - 批量（[`validate_all`]）：全部代理并发验证（信号量限流），
//!   按输入顺序一次性返回全部结果。
//!
//! 单条代理内部的任何错误都会被收敛进它自己的结果记录，
//! 不会中断兄弟验证；唯一的致命条件是结果接收端写入失败。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::common::error::ApiError;
use crate::model::{
    BatchProgress, ProxyEndpoint, ValidationOptions, ValidationResult, ValidationStatus,
    APP_CONFIG,
};
use crate::service::{geo, prober, transport};

/// 流式模式的结果接收端（输出边界）。
///
/// 引擎不关心其底层传输：可以是 SSE 通道、内存列表或文件。
/// 保证每条完整写入一次，结束后恰好收到一次 `finish`。
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// 推送一条已完成的验证结果。
    async fn push(&self, result: &ValidationResult) -> anyhow::Result<()>;
    /// 发送流结束标记。
    async fn finish(&self) -> anyhow::Result<()>;
}

/// 进度观察回调，由调用方注入，每次进度刷新时被调用。
pub type ProgressFn = dyn Fn(&BatchProgress) + Send + Sync;

/// 验证单条代理，永不失败：所有错误都转化为结果记录的
/// status 与 message 字段。
///
/// 状态机：解析失败 → invalid（不构建传输、不探测）；
/// 探测失败 → failed（消息区分超时与连接失败）；
/// 探测成功 → success，随后的地理解析只影响归属字段，
/// 其耗时不计入 `response_time_ms`。
pub async fn validate_one(descriptor: &str, options: &ValidationOptions) -> ValidationResult {
    let Some(endpoint) = ProxyEndpoint::parse(descriptor) else {
        return ValidationResult::invalid(descriptor, options.kind);
    };

    let client = match transport::build(&endpoint, options.kind) {
        Ok(c) => c,
        Err(e) => {
            return ValidationResult::failed(
                descriptor,
                options.kind,
                format!("构建代理客户端失败: {}", e),
                0,
            );
        }
    };

    let outcome = prober::probe(&client, options.timeout_ms).await;
    if !outcome.ok {
        return ValidationResult::failed(
            descriptor,
            options.kind,
            outcome.message(options.timeout_ms),
            outcome.elapsed_ms,
        );
    }

    // 测量窗口到此关闭，地理解析用剩余预算继续
    let remaining = options.timeout_ms.saturating_sub(outcome.elapsed_ms);
    let geo = geo::resolve(&client, &endpoint.host, remaining).await;

    ValidationResult::success(descriptor, options.kind, outcome.elapsed_ms, geo)
}

/// 流式验证：逐条顺序执行，结果即时推送。
///
/// 进度按 `clamp(total/10, 1, 5)` 条的步长上报，且最后一条
/// 必定上报，100% 恰好出现一次。接收端写入失败返回
/// [`ApiError::StreamAborted`]，处理立即停止。
pub async fn validate_stream(
    descriptors: &[String],
    options: &ValidationOptions,
    sink: &dyn ResultSink,
    progress: Option<&ProgressFn>,
) -> Result<(), ApiError> {
    let total = descriptors.len();
    let step = (total / 10).clamp(1, 5);
    let started = Instant::now();
    let (mut succeeded, mut failed) = (0usize, 0usize);

    info!("开始流式验证，共 {} 条代理", total);

    for (i, descriptor) in descriptors.iter().enumerate() {
        let result = validate_one(descriptor, options).await;
        match result.status {
            ValidationStatus::Success => succeeded += 1,
            _ => failed += 1,
        }

        sink.push(&result)
            .await
            .map_err(|e| ApiError::StreamAborted(e.to_string()))?;

        let checked = i + 1;
        if checked == total || checked % step == 0 {
            let snapshot = BatchProgress {
                checked,
                succeeded,
                failed,
                total,
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
            info!(
                "验证进度 {}%（{}/{}），成功 {} 条",
                snapshot.percent(),
                checked,
                total,
                succeeded
            );
            if let Some(report) = progress {
                report(&snapshot);
            }
        }
    }

    sink.finish()
        .await
        .map_err(|e| ApiError::StreamAborted(e.to_string()))?;

    info!("流式验证完成：总计 {} 条，成功 {} 条，失败 {} 条", total, succeeded, failed);
    Ok(())
}

/// 批量验证：全部代理并发执行（信号量限流），按输入顺序返回。
///
/// 单条代理的任何意外失败（包括任务 join 失败）都会被捕获进
/// 它自己的结果，绝不中断整个批次。
pub async fn validate_all(
    descriptors: Vec<String>,
    options: ValidationOptions,
) -> Vec<ValidationResult> {
    info!("开始批量验证代理，共 {} 条", descriptors.len());
    let kind = options.kind;
    let semaphore = Arc::new(Semaphore::new(APP_CONFIG.validate.semaphore));
    let options = Arc::new(options);

    let tasks: Vec<_> = descriptors
        .into_iter()
        .map(|descriptor| {
            let semaphore = Arc::clone(&semaphore);
            let options = Arc::clone(&options);
            let handle = tokio::spawn({
                let descriptor = descriptor.clone();
                async move {
                    let _permit = semaphore.acquire_owned().await.unwrap();
                    validate_one(&descriptor, &options).await
                }
            });
            (descriptor, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(tasks.len());
    for (descriptor, task) in tasks {
        match task.await {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!("代理 {} 的验证任务异常退出：{}", descriptor, e);
                results.push(ValidationResult::failed(
                    &descriptor,
                    kind,
                    format!("内部错误: {}", e),
                    0,
                ));
            }
        }
    }

    let ok = results
        .iter()
        .filter(|r| r.status == ValidationStatus::Success)
        .count();
    info!("批量验证完成：总计 {} 条，成功 {} 条", results.len(), ok);
    results
}
