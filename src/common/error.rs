use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// 结果流写入失败，是验证流程中唯一的致命错误。
    /// 单条代理内部的失败不会走到这里，它们全部收敛进各自的结果记录。
    #[error("结果流已中止: {0}")]
    StreamAborted(String),
}
