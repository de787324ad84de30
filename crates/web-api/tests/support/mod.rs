#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use config::AppConfig;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const ALICE: &str = "alice@0000000001";
pub const BOB: &str = "bob@0000000002";

/// 绑定在随机端口上的进程内服务，析构时优雅关闭
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn api(&self, path: &str) -> String {
        self.url(&format!("/api/v1{}", path))
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/api/v1/ws", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn spawn_server() -> TestServer {
    spawn_server_with(AppConfig::default()).await
}

pub async fn spawn_server_with(config: AppConfig) -> TestServer {
    let router = router(AppState::from_config(&config));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        addr,
        shutdown: Some(shutdown_tx),
    }
}

/// 建立连接并读取首帧快照
pub async fn connect(server: &TestServer) -> (WsStream, Value) {
    let (mut ws, _) = connect_async(server.ws_url()).await.expect("ws connect");
    let bootstrap = next_frame(&mut ws).await;
    assert_eq!(bootstrap["type"], "bootstrap", "首帧必须是快照");
    (ws, bootstrap)
}

pub async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(TungsteniteMessage::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

/// 读取下一个 JSON 文本帧，忽略协议层的 ping/pong
pub async fn next_frame(ws: &mut WsStream) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        match message {
            TungsteniteMessage::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("json frame")
            }
            TungsteniteMessage::Ping(_) | TungsteniteMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// 跳过其他类型的帧，直到读到指定类型
pub async fn next_frame_of(ws: &mut WsStream, frame_type: &str) -> Value {
    loop {
        let frame = next_frame(ws).await;
        if frame["type"] == frame_type {
            return frame;
        }
    }
}

/// 在给定时间内没有任何文本帧到达
pub async fn assert_silent(ws: &mut WsStream, wait: Duration) {
    if let Ok(Some(Ok(TungsteniteMessage::Text(text)))) = timeout(wait, ws.next()).await {
        panic!("unexpected frame: {}", text.as_str());
    }
}

/// 注册身份并等待确认帧
pub async fn register(ws: &mut WsStream, identity: &str) {
    send_json(
        ws,
        serde_json::json!({"type": "register", "identity": identity}),
    )
    .await;
    let registered = next_frame_of(ws, "registered").await;
    assert_eq!(registered["identity"], identity);
}

/// 等待指定身份的下一次在线状态变化
pub async fn next_presence(ws: &mut WsStream, identity: &str) -> Value {
    loop {
        let frame = next_frame_of(ws, "presence_changed").await;
        if frame["identity"] == identity {
            return frame;
        }
    }
}
