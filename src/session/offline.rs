//! 离线回放管理 / Offline replay management
//!
//! 重连时把离线期间积压的消息一次性补发给客户端。未读列表在批量读取
//! 成功后整键删除，而不是按条弹出，回放窗口内并发入队的条目会被一并
//! 丢弃，这是已接受的竞态。
//! On reconnect, messages queued while the client was offline are replayed
//! as one batch. The unread list is deleted wholesale after a successful
//! batch read rather than popped per entry, so entries enqueued concurrently
//! during the replay window are discarded too; this race is accepted.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::domain::message::GatewayEvent;
use crate::server::GatewayServer;

impl GatewayServer {
    /// 排空未读队列并作为单个 offlineMessage 事件投递，返回补发条数
    /// Drain the unread queue and deliver it as one offlineMessage event,
    /// returns the number of replayed records
    pub async fn replay_offline(&self, client_id: &str) -> Result<usize> {
        let limit = self.config.unread_message_max_limit;
        if limit == 0 {
            return Ok(0);
        }

        let list_key = self.config.prefix.unread_list_key(client_id);
        let message_ids = self.store.lrange(&list_key, 0, limit - 1).await?;
        if message_ids.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = message_ids
            .iter()
            .map(|id| self.config.prefix.message_key(id))
            .collect();
        // 单次原子批量读取 / One atomic batch read
        let records = self.store.hgetall_batch(&keys).await?;

        let mut batch = Vec::new();
        for (message_id, record) in message_ids.iter().zip(records) {
            // 记录缺失（已过期）导致整体失败，队列保持原样
            // A missing (expired) record fails the whole replay, queue left intact
            let record = record
                .with_context(|| format!("unread message {} has no record", message_id))?;
            let mut object = serde_json::Map::new();
            for (field, value) in record {
                if field == "pushData" {
                    let parsed: Value = serde_json::from_str(&value)
                        .with_context(|| format!("bad pushData in unread message for {}", client_id))?;
                    object.insert(field, parsed);
                } else {
                    object.insert(field, Value::String(value));
                }
            }
            batch.push(Value::Object(object));
        }

        // 批量读取成功后才清空整个列表 / The whole list is cleared only after a successful batch read
        self.store.del(&list_key).await?;

        let count = batch.len();
        self.emit(client_id, &GatewayEvent::new("offlineMessage", Value::Array(batch)))
            .await?;
        debug!("Replayed {} unread messages to {}", count, client_id);
        Ok(count)
    }
}
