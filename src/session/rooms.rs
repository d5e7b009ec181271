//! 房间成员管理 / Room membership management
//!
//! 成员关系是传输层原生的：加入即订阅该房间的广播。逻辑房间名统一
//! 加固定前缀，避免与传输层内部房间冲突。
//! Membership is transport-native: joining subscribes the connection to that
//! room's broadcasts. Logical room names get a fixed prefix so they never
//! collide with transport-internal room usage.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures_util::future::join_all;

use crate::config::KeyPrefixes;
use crate::domain::message::OpResult;
use crate::server::GatewayServer;

/// 传输层房间操作接口，便于测试替换 / Transport room operations, swappable in tests
#[async_trait]
pub trait RoomBus: Send + Sync {
    async fn join(&self, client_id: &str, room: &str) -> Result<()>;
    async fn leave(&self, client_id: &str, room: &str) -> Result<()>;
}

#[async_trait]
impl RoomBus for GatewayServer {
    async fn join(&self, client_id: &str, room: &str) -> Result<()> {
        if !self.connections.contains_key(client_id) {
            return Err(anyhow!("client {} not connected", client_id));
        }
        self.rooms.entry(room.to_string()).or_default().insert(client_id.to_string());
        Ok(())
    }

    async fn leave(&self, client_id: &str, room: &str) -> Result<()> {
        if let Some(members) = self.rooms.get(room) {
            members.remove(client_id);
        }
        Ok(())
    }
}

/// 对列表中每个房间独立执行进出操作，并发扇出后聚合结果。任一失败
/// 整体报 500，但已生效的变更不回滚。
/// Applies join or leave to every room in the list independently, concurrent
/// fan-out with aggregated result. Any failure reports 500 overall, while
/// changes already applied are not rolled back.
pub async fn change_membership(
    bus: &dyn RoomBus,
    prefix: &KeyPrefixes,
    client_id: &str,
    rooms: &[String],
    is_join: bool,
) -> OpResult {
    let ops = rooms.iter().map(|room| {
        let transport_room = prefix.room_name(room);
        async move {
            if is_join {
                bus.join(client_id, &transport_room).await
            } else {
                bus.leave(client_id, &transport_room).await
            }
        }
    });

    let errors: Vec<String> = join_all(ops)
        .await
        .into_iter()
        .filter_map(|r| r.err().map(|e| e.to_string()))
        .collect();

    if errors.is_empty() {
        OpResult::ok()
    } else {
        OpResult::error(500, format!("joinOrLeaveRoom error: {}", errors.join("; ")))
    }
}

impl GatewayServer {
    pub async fn change_membership(&self, client_id: &str, rooms: &[String], is_join: bool) -> OpResult {
        change_membership(self, &self.config.prefix, client_id, rooms, is_join).await
    }
}
