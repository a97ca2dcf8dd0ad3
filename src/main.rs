mod common;
mod model;
mod service;
mod web;

use salvo::prelude::*;
use tracing::info;

use crate::common::log::init_logging;
use crate::model::APP_CONFIG;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 必须是程序第一个调用！
    init_logging().expect("Failed to initialize logging");

    let addr = format!("{}:{}", APP_CONFIG.server.host, APP_CONFIG.server.port);
    info!("ProxyScope 启动，监听地址 http://{}", addr);

    let acceptor = TcpListener::new(addr).bind().await;
    Server::new(acceptor).serve(web::router()).await;

    Ok(())
}
