//! 每连接任务 / Per-connection task
//!
//! 接收首个 connect 事件作为握手（由外部鉴权环节补全 uid/平台/房间），
//! 命中已注册命名空间后触发连接生命周期处理。
//! The first connect event acts as the handshake (uid/platform/rooms are
//! enriched by the external auth step); a registered namespace triggers the
//! connection lifecycle handler.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::message::{GatewayEvent, Handshake};
use crate::domain::session::{Platform, SessionState};
use crate::server::{Connection, GatewayServer};
use crate::session::lifecycle;

/// 处理新连接 / Handle new connection
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    server: GatewayServer,
) -> Result<()> {
    info!("📨 New connection from: {}", peer_addr);

    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let client_id = Uuid::new_v4().to_string();

    let client_id_clone = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(&msg, Message::Close(_));
            if let Err(e) = ws_sender.send(msg).await {
                error!("Failed to send message to {}: {}", client_id_clone, e);
                break;
            }
            if is_close {
                let _ = ws_sender.close().await;
                break;
            }
        }
    });

    let connection = Connection {
        client_id: client_id.clone(),
        namespace: "/".to_string(),
        uid: None,
        platform: Platform::Unknown,
        addr: peer_addr,
        sender: tx,
        state: Arc::new(Mutex::new(SessionState::Connecting)),
        handshake_rooms: Arc::new(Mutex::new(None)),
    };
    server.connections.insert(client_id.clone(), connection);
    info!("✅ Client {} connected from {}", client_id, peer_addr);

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                debug!("📨 Received text from {}: {}", client_id, text);
                match serde_json::from_str::<GatewayEvent>(&text) {
                    Ok(event) if event.event_type == "connect" => {
                        handle_handshake(&server, &client_id, event.data).await;
                    }
                    Ok(event) => {
                        if let Err(e) = lifecycle::dispatch(&server, &client_id, event).await {
                            error!("Error handling event from {}: {}", client_id, e);
                        }
                    }
                    Err(_) => {
                        let err = GatewayEvent::new(
                            "error",
                            serde_json::json!({"message": "invalid json"}),
                        );
                        let _ = server.emit(&client_id, &err).await;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                error!("WebSocket error from {}: {}", client_id, e);
                break;
            }
        }
    }

    // 连接终止即隐式释放房间成员关系，无需额外清理
    // Terminating the connection implicitly releases room memberships
    if let Some((_, conn)) = server.connections.remove(&client_id) {
        conn.set_state(SessionState::Closed);
    }
    server.release_rooms(&client_id);
    send_task.abort();
    info!("👋 Client {} disconnected", client_id);
    Ok(())
}

/// 应用握手上下文并触发命名空间绑定的处理器
/// Apply the handshake context and fire the listener bound to the namespace
async fn handle_handshake(server: &GatewayServer, client_id: &str, data: serde_json::Value) {
    let handshake: Handshake = match serde_json::from_value(data) {
        Ok(h) => h,
        Err(e) => {
            warn!("Bad handshake from {}: {}", client_id, e);
            let err = GatewayEvent::new("error", serde_json::json!({"message": "invalid handshake"}));
            let _ = server.emit(client_id, &err).await;
            return;
        }
    };

    let namespace = handshake.namespace.clone();
    {
        let mut conn = match server.connections.get_mut(client_id) {
            Some(conn) => conn,
            None => return,
        };
        if conn.state() != SessionState::Connecting {
            warn!("Duplicate connect event from {}", client_id);
            return;
        }
        conn.namespace = namespace.clone();
        conn.uid = Some(handshake.uid);
        conn.platform = Platform::parse(&handshake.platform);
        *conn.handshake_rooms.lock() = handshake.rooms;
    }

    match server.registrar.lookup(&namespace) {
        Some(listener) => listener.on_connection(server, client_id).await,
        None => debug!("Namespace {} has no lifecycle handler bound", namespace),
    }
}
