use crate::error::ApiError;
use crate::frames::{ClientCommand, ServerFrame};
use crate::state::AppState;
use application::{Bootstrap, SendMessageRequest, SessionHandle};
use axum::body::Bytes;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::ConnectionId;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

/// WebSocket 连接管理器
///
/// 封装单个 WebSocket 连接的所有状态和逻辑，包括：
/// - 首帧快照
/// - 广播事件转发
/// - 客户端命令分发
/// - 断开时的在线状态清理
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    connection_id: ConnectionId,
    bootstrap: Bootstrap,
}

impl WebSocketConnection {
    /// 登记匿名会话，并在同一时刻取得商品快照和事件订阅
    pub async fn open(socket: WebSocket, state: AppState) -> Self {
        let SessionHandle {
            connection_id,
            bootstrap,
        } = state.session_service.connect().await;

        tracing::info!(%connection_id, "WebSocket 连接已建立");

        Self {
            socket,
            state,
            connection_id,
            bootstrap,
        }
    }

    /// 运行 WebSocket 连接的主循环，直到任一方向结束
    pub async fn run(self) {
        let Self {
            socket,
            state,
            connection_id,
            bootstrap,
        } = self;
        let Bootstrap {
            snapshot,
            mut events,
        } = bootstrap;

        let (mut sender, mut incoming) = socket.split();

        // 快照必须是第一帧，之后才开始转发事件
        if send_frame(&mut sender, &ServerFrame::bootstrap(&snapshot))
            .await
            .is_err()
        {
            tracing::warn!(%connection_id, "发送初始快照失败");
            state.session_service.disconnect(connection_id).await;
            return;
        }

        // 创建 mpsc channel 来解耦对 sender 的访问
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：统一处理所有对 WebSocket sender 的写操作
        let mut send_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(cmd) = cmd_rx.recv() => {
                        let sent = match cmd {
                            WsCommand::SendFrame(frame) => send_frame(&mut sender, &frame).await,
                            WsCommand::SendPong(data) => sender.send(WsMessage::Pong(data)).await,
                        };
                        if sent.is_err() {
                            tracing::warn!("Failed to write to websocket");
                            break;
                        }
                    }
                    event = events.recv() => {
                        let Some(event) = event else {
                            break;
                        };
                        if send_frame(&mut sender, &ServerFrame::from(&event)).await.is_err() {
                            // 单个连接投递失败不影响其他连接
                            tracing::debug!(event_type = event.event_type(), "事件投递失败");
                            break;
                        }
                    }
                }
            }
            tracing::info!("WebSocket发送任务结束");
        });

        // 接收任务：处理来自WebSocket客户端的消息
        let mut recv_task = {
            let state = state.clone();
            tokio::spawn(async move {
                while let Some(Ok(message)) = incoming.next().await {
                    if Self::handle_incoming(message, &state, connection_id, &cmd_tx)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                tracing::info!("WebSocket接收任务结束");
            })
        };

        // 等待任意一个任务完成（连接断开），并停止另一个
        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        // 连接断开时清理在线状态
        state.session_service.disconnect(connection_id).await;
        tracing::info!(%connection_id, "WebSocket连接已断开，在线状态已清理");
    }

    /// 处理来自客户端的消息
    ///
    /// 返回 `Err` 表示连接应当结束。
    async fn handle_incoming(
        message: WsMessage,
        state: &AppState,
        connection_id: ConnectionId,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Result<(), ()> {
        let reply = match message {
            WsMessage::Close(_) => {
                tracing::info!("WebSocket收到关闭消息");
                return Err(());
            }
            WsMessage::Ping(data) => {
                tracing::debug!("收到ping消息，发送pong回应");
                return cmd_tx.send(WsCommand::SendPong(data)).await.map_err(|_| ());
            }
            WsMessage::Pong(_) => {
                tracing::debug!("收到pong消息");
                return Ok(());
            }
            WsMessage::Text(text) => match serde_json::from_str::<ClientCommand>(text.as_str()) {
                Ok(command) => Self::dispatch(command, state, connection_id).await,
                Err(err) => Some(ServerFrame::Error {
                    code: "BAD_FRAME".to_string(),
                    message: err.to_string(),
                }),
            },
            WsMessage::Binary(_) => Some(ServerFrame::Error {
                code: "BAD_FRAME".to_string(),
                message: "binary frames are not supported".to_string(),
            }),
        };

        match reply {
            Some(frame) => cmd_tx
                .send(WsCommand::SendFrame(frame))
                .await
                .map_err(|_| ()),
            None => Ok(()),
        }
    }

    /// 执行客户端命令。成功的修改通过广播回显，错误只回给发起连接。
    async fn dispatch(
        command: ClientCommand,
        state: &AppState,
        connection_id: ConnectionId,
    ) -> Option<ServerFrame> {
        let result = match command {
            ClientCommand::Register { identity } => state
                .session_service
                .register(connection_id, &identity)
                .await
                .map(|identity| {
                    Some(ServerFrame::Registered {
                        identity: identity.to_string(),
                    })
                }),
            ClientCommand::Rate { id, rating } => state
                .listing_service
                .rate(id, rating)
                .await
                .map(|_| None),
            ClientCommand::SendMessage { from, to, content } => state
                .conversation_service
                .send_message(SendMessageRequest { from, to, content })
                .await
                .map(|_| None),
            ClientCommand::Ping => Ok(Some(ServerFrame::Pong)),
        };

        result.unwrap_or_else(|err| {
            tracing::debug!(%connection_id, error = %err, "客户端命令被拒绝");
            Some(ServerFrame::error(ApiError::from(err).into_body()))
        })
    }
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, WsMessage>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize websocket payload");
            return Ok(());
        }
    };
    sender.send(WsMessage::Text(payload.into())).await
}

/// WebSocket 写操作命令
///
/// 使用命令模式统一管理所有对 WebSocket sender 的写操作
#[derive(Debug)]
enum WsCommand {
    SendFrame(ServerFrame),
    SendPong(Bytes),
}
