//! 连接生命周期处理 / Connection lifecycle handling
//!
//! 每个连接独立走 Connecting → Provisioning → Active → Closed 状态机。
//! 开通阶段的各步骤相互独立容错：单步失败只记日志，连接继续开通。
//! Each connection runs its own Connecting → Provisioning → Active → Closed
//! state machine. Provisioning steps are independently fault-tolerant: a
//! failing step is logged and the connection proceeds.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::domain::message::{AckReport, GatewayEvent, OpResult, ProvisionedInfo, RoomRequest};
use crate::domain::session::{Platform, SessionState};
use crate::server::GatewayServer;
use crate::session::registrar::ConnectionListener;

/// 标准连接处理器，由命名空间注册器安装 / Standard lifecycle listener installed by the registrar
pub struct LifecycleListener;

#[async_trait]
impl ConnectionListener for LifecycleListener {
    async fn on_connection(&self, server: &GatewayServer, client_id: &str) {
        provision(server, client_id).await;
    }
}

/// 开通一个新连接 / Provision a freshly connected client
pub async fn provision(server: &GatewayServer, client_id: &str) {
    // 快照后立即释放连接表守卫，不能跨 await 持有
    // Snapshot then drop the map guard, it must not be held across awaits
    let (namespace, uid, platform, pending_rooms) = match server.connections.get(client_id) {
        Some(conn) => {
            // 主命名空间下的连接不做开通 / Connections on the root namespace are not provisioned
            if conn.namespace == "/" {
                return;
            }
            conn.set_state(SessionState::Provisioning);
            (
                conn.namespace.clone(),
                conn.uid.clone().unwrap_or_default(),
                conn.platform,
                conn.handshake_rooms.lock().take(),
            )
        }
        None => return,
    };

    // 更新用户和设备信息 / Update user and device info
    if let Err(e) = server.record_session(client_id, &uid).await {
        error!("record_session {} failed: {}", client_id, e);
    }

    // android 平台补发离线消息列表 / Replay the offline message list for android
    if platform == Platform::Android {
        if let Err(e) = server.replay_offline(client_id).await {
            error!("replay_offline {} failed: {}", client_id, e);
        }
    }

    // 自动加入用户房间 / Auto-join the user-scoped room
    {
        let server = server.clone();
        let client_id = client_id.to_string();
        let user_room = server.config.prefix.user_room_name(&uid);
        tokio::spawn(async move {
            let result = server.change_membership(&client_id, &[user_room], true).await;
            if !result.is_ok() {
                error!("join user room error: {}", result.message);
            }
        });
    }

    // 上游返回的初始房间列表只消费一次 / The upstream room list is consumed exactly once
    if let Some(rooms) = pending_rooms {
        let server = server.clone();
        let client_id = client_id.to_string();
        tokio::spawn(async move {
            let result = server.change_membership(&client_id, &rooms, true).await;
            if !result.is_ok() {
                error!("join handshake rooms error: {}", result.message);
            }
        });
    }

    // 发送连接成功消息 / Send the provisioning-complete message
    let provisioned = ProvisionedInfo {
        system: server.hostname.clone(),
        port: server.config.port,
        client_id: client_id.to_string(),
    };
    let payload = serde_json::to_value(&provisioned).unwrap_or(Value::Null);
    if let Err(e) = server.emit(client_id, &GatewayEvent::new("ok", payload)).await {
        error!("send ok to {} failed: {}", client_id, e);
    }

    if let Some(conn) = server.connections.get(client_id) {
        conn.set_state(SessionState::Active);
    }
    info!("✅ Client {} provisioned on {}", client_id, namespace);
}

/// 分发一条入站客户端事件 / Dispatch one inbound client event
pub async fn dispatch(server: &GatewayServer, client_id: &str, event: GatewayEvent) -> Result<()> {
    let (platform, state) = match server.connections.get(client_id) {
        Some(conn) => (conn.platform, conn.state()),
        None => return Ok(()),
    };

    match event.event_type.as_str() {
        "ping" => {
            debug!("🏓 Ping from {}", client_id);
            let pong = GatewayEvent::new(
                "pong",
                serde_json::json!({
                    "timestamp": chrono::Utc::now().timestamp_millis(),
                    "clientId": client_id
                }),
            );
            server.emit(client_id, &pong).await?;
        }
        // 未开通的连接只响应心跳 / Unprovisioned connections only answer heartbeats
        _ if state == SessionState::Connecting => {
            debug!("Ignoring {} from unprovisioned client {}", event.event_type, client_id);
        }
        "joinRoom" => {
            let result = room_request(server, client_id, event.data, true).await;
            server.emit(client_id, &GatewayEvent::new("joinRoomResult", serde_json::to_value(&result)?)).await?;
        }
        "leaveRoom" => {
            let result = room_request(server, client_id, event.data, false).await;
            server.emit(client_id, &GatewayEvent::new("leaveRoomResult", serde_json::to_value(&result)?)).await?;
        }
        // 接收推送后的确认上报，无应答 / Push acknowledgment report, fire-and-forget
        "ackPush" => {
            if let Ok(report) = serde_json::from_value::<AckReport>(event.data) {
                if let Err(e) = server.acknowledge(client_id, platform, report.id.as_deref()).await {
                    error!("ackPush from {} failed: {}", client_id, e);
                }
            }
        }
        "doNotDisturb" => {
            let result = do_not_disturb(server, client_id, platform, event.data).await;
            server.emit(client_id, &GatewayEvent::new("doNotDisturbResult", serde_json::to_value(&result)?)).await?;
        }
        "info" => {
            let result = client_info(server, client_id, event.data).await;
            server.emit(client_id, &GatewayEvent::new("infoResult", serde_json::to_value(&result)?)).await?;
        }
        other => {
            debug!("Unknown event {} from {}", other, client_id);
        }
    }
    Ok(())
}

async fn room_request(server: &GatewayServer, client_id: &str, data: Value, is_join: bool) -> OpResult {
    match serde_json::from_value::<RoomRequest>(data) {
        Ok(req) => server.change_membership(client_id, &req.rooms, is_join).await,
        Err(e) => OpResult::error(400, format!("invalid room request: {}", e)),
    }
}

/// 免打扰仅对 ios 开放 / Do-not-disturb is ios-only
async fn do_not_disturb(
    server: &GatewayServer,
    client_id: &str,
    platform: Platform,
    data: Value,
) -> OpResult {
    if platform != Platform::Ios {
        return OpResult::error(403, "Forbidden");
    }
    let mut data = if data.is_object() { data } else { Value::Object(Default::default()) };
    if let Some(object) = data.as_object_mut() {
        object.insert("id".to_string(), Value::String(client_id.to_string()));
    }
    match server.client_service.do_not_disturb(data).await {
        Ok(result) => result,
        Err(e) => OpResult::error(500, e.to_string()),
    }
}

async fn client_info(server: &GatewayServer, client_id: &str, data: Value) -> OpResult {
    let mut target = client_id.to_string();
    if let Some(requested) = data.get("clientId").and_then(|v| v.as_str()) {
        if requested != client_id {
            // 可能是伪造身份查询其它设备 / Possibly a spoofed identity querying another device
            warn!("client {} fake identity clientId: {}", client_id, requested);
        }
        target = requested.to_string();
    }
    match server.client_service.info(&target, data).await {
        Ok(result) => result,
        Err(e) => OpResult::error(500, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::server::Connection;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;

    fn attach_client(
        server: &GatewayServer,
        client_id: &str,
        namespace: &str,
        platform: Platform,
        rooms: Option<Vec<String>>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection {
            client_id: client_id.to_string(),
            namespace: namespace.to_string(),
            uid: Some("u1".to_string()),
            platform,
            addr: "127.0.0.1:9000".parse().unwrap(),
            sender: tx,
            state: Arc::new(Mutex::new(SessionState::Connecting)),
            handshake_rooms: Arc::new(Mutex::new(rooms)),
        };
        server.connections.insert(client_id.to_string(), conn);
        rx
    }

    fn next_event(rx: &mut mpsc::UnboundedReceiver<Message>) -> GatewayEvent {
        match rx.try_recv().expect("expected an event") {
            Message::Text(t) => serde_json::from_str(&t).unwrap(),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn provision_records_session_and_sends_ok() {
        let server = GatewayServer::new(GatewayConfig::default());
        let mut rx = attach_client(&server, "c1", "/push", Platform::Web, None);

        provision(&server, "c1").await;

        let session_key = server.config.prefix.session_key("c1");
        assert!(server.store.exists(&session_key).await.unwrap());

        let event = next_event(&mut rx);
        assert_eq!(event.event_type, "ok");
        assert_eq!(event.data["clientId"], "c1");
        assert_eq!(event.data["port"], server.config.port);

        let state = server.connections.get("c1").unwrap().state();
        assert_eq!(state, SessionState::Active);
    }

    #[tokio::test]
    async fn provision_joins_user_and_handshake_rooms() {
        let server = GatewayServer::new(GatewayConfig::default());
        let _rx = attach_client(
            &server,
            "c1",
            "/push",
            Platform::Web,
            Some(vec!["news".to_string()]),
        );

        provision(&server, "c1").await;
        // 房间加入是异步扇出 / Room joins fan out asynchronously
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(server.room_members("ipush#user_u1"), vec!["c1".to_string()]);
        assert_eq!(server.room_members("ipush#news"), vec!["c1".to_string()]);
        // 握手房间列表一次性消费 / Handshake room list was consumed once
        assert!(server.connections.get("c1").unwrap().handshake_rooms.lock().is_none());
    }

    #[tokio::test]
    async fn android_gets_offline_replay_before_ok() {
        let server = GatewayServer::new(GatewayConfig::default());
        let mut rx = attach_client(&server, "c1", "/push", Platform::Android, None);

        let msg_key = server.config.prefix.message_key("m1");
        server
            .store
            .hset_all(
                &msg_key,
                &[
                    ("namespace".to_string(), "/push".to_string()),
                    ("room".to_string(), "news".to_string()),
                    ("pushData".to_string(), "{\"title\":\"x\"}".to_string()),
                ],
            )
            .await
            .unwrap();
        let list_key = server.config.prefix.unread_list_key("c1");
        server.store.rpush(&list_key, "m1").await.unwrap();

        provision(&server, "c1").await;

        let first = next_event(&mut rx);
        assert_eq!(first.event_type, "offlineMessage");
        let second = next_event(&mut rx);
        assert_eq!(second.event_type, "ok");
    }

    #[tokio::test]
    async fn root_namespace_is_not_provisioned() {
        let server = GatewayServer::new(GatewayConfig::default());
        let mut rx = attach_client(&server, "c1", "/", Platform::Web, None);

        provision(&server, "c1").await;

        assert!(rx.try_recv().is_err());
        let session_key = server.config.prefix.session_key("c1");
        assert!(!server.store.exists(&session_key).await.unwrap());
        assert_eq!(server.connections.get("c1").unwrap().state(), SessionState::Connecting);
    }

    #[tokio::test]
    async fn join_room_dispatch_replies_with_result() {
        let server = GatewayServer::new(GatewayConfig::default());
        let mut rx = attach_client(&server, "c1", "/push", Platform::Web, None);
        server.connections.get("c1").unwrap().set_state(SessionState::Active);

        let event = GatewayEvent::new("joinRoom", serde_json::json!({"rooms": ["a", "b"]}));
        dispatch(&server, "c1", event).await.unwrap();

        let reply = next_event(&mut rx);
        assert_eq!(reply.event_type, "joinRoomResult");
        assert_eq!(reply.data["status"], 200);
        assert_eq!(server.room_members("ipush#a"), vec!["c1".to_string()]);

        let event = GatewayEvent::new("leaveRoom", serde_json::json!({"rooms": ["a"]}));
        dispatch(&server, "c1", event).await.unwrap();
        let reply = next_event(&mut rx);
        assert_eq!(reply.event_type, "leaveRoomResult");
        assert!(server.room_members("ipush#a").is_empty());
    }

    #[tokio::test]
    async fn ack_push_dispatch_counts_once() {
        let server = GatewayServer::new(GatewayConfig::default());
        let _rx = attach_client(&server, "c1", "/push", Platform::Ios, None);
        server.connections.get("c1").unwrap().set_state(SessionState::Active);

        let msg_key = server.config.prefix.message_key("m1");
        server
            .store
            .hset_all(
                &msg_key,
                &[
                    ("namespace".to_string(), "/push".to_string()),
                    ("room".to_string(), "news".to_string()),
                ],
            )
            .await
            .unwrap();

        for _ in 0..3 {
            let event = GatewayEvent::new("ackPush", serde_json::json!({"id": "m1"}));
            dispatch(&server, "c1", event).await.unwrap();
        }

        let counts = server
            .store
            .hget_multi(&msg_key, &["ackCount", "ackIOSCount"])
            .await
            .unwrap();
        assert_eq!(counts[0].as_deref(), Some("1"));
        assert_eq!(counts[1].as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn do_not_disturb_is_forbidden_off_ios() {
        let server = GatewayServer::new(GatewayConfig::default());
        let mut rx = attach_client(&server, "c1", "/push", Platform::Android, None);
        server.connections.get("c1").unwrap().set_state(SessionState::Active);

        let event = GatewayEvent::new("doNotDisturb", serde_json::json!({"rooms": ["news"]}));
        dispatch(&server, "c1", event).await.unwrap();

        let reply = next_event(&mut rx);
        assert_eq!(reply.event_type, "doNotDisturbResult");
        assert_eq!(reply.data["status"], 403);
    }

    #[tokio::test]
    async fn unprovisioned_client_only_gets_pong() {
        let server = GatewayServer::new(GatewayConfig::default());
        let mut rx = attach_client(&server, "c1", "/push", Platform::Web, None);

        dispatch(&server, "c1", GatewayEvent::new("joinRoom", serde_json::json!({"rooms": ["a"]})))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());

        dispatch(&server, "c1", GatewayEvent::new("ping", Value::Null)).await.unwrap();
        assert_eq!(next_event(&mut rx).event_type, "pong");
    }
}
