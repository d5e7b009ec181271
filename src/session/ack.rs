//! 确认跟踪器 / Acknowledgment tracker
//!
//! 记录客户端对已送达推送的确认。去重集合保证同一连接对同一消息的
//! 重复上报绝不重复计数；不同连接各计一次，计数按连接数而非用户数。
//! Records client acknowledgments of delivered pushes. The dedup set
//! guarantees duplicate reports from one connection never double-count; each
//! distinct connection counts once, so counts track connections, not users.

use anyhow::Result;

use crate::domain::session::Platform;
use crate::server::GatewayServer;

impl GatewayServer {
    /// 处理一条确认上报 / Process one acknowledgment report
    ///
    /// 未知消息ID和不识别的平台都静默忽略 / Unknown message ids and
    /// unrecognized platforms are silently ignored
    pub async fn acknowledge(
        &self,
        client_id: &str,
        platform: Platform,
        message_id: Option<&str>,
    ) -> Result<()> {
        let message_id = match message_id {
            Some(id) if !id.is_empty() => id,
            _ => return Ok(()),
        };

        let msg_key = self.config.prefix.message_key(message_id);
        let fields = self.store.hget_multi(&msg_key, &["namespace", "room"]).await?;
        let (namespace, room) = match (fields.first(), fields.get(1)) {
            (Some(Some(ns)), Some(Some(room))) => (ns.clone(), room.clone()),
            // 消息记录已过期或不存在 / Message record expired or unknown
            _ => return Ok(()),
        };

        if !platform.is_countable() {
            return Ok(());
        }

        let ack_key =
            self.config
                .prefix
                .ack_set_key(platform.as_str(), &namespace, &room, message_id);

        // 原子的"新增才计数"：只有集合成员真正变化时才递增计数器
        // Atomic add-and-detect-novelty: counters only move when set membership changed
        if !self.store.sadd(&ack_key, client_id).await? {
            return Ok(());
        }

        self.store.hincr_by(&msg_key, "ackCount", 1).await?;
        match platform {
            Platform::Ios => {
                self.store.hincr_by(&msg_key, "ackIOSCount", 1).await?;
            }
            Platform::Android => {
                self.store.hincr_by(&msg_key, "ackAndroidCount", 1).await?;
            }
            // web 按设计没有平台计数器 / web has no platform counter by design
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;

    async fn server_with_message(message_id: &str) -> GatewayServer {
        let server = GatewayServer::new(GatewayConfig::default());
        let key = server.config.prefix.message_key(message_id);
        server
            .store
            .hset_all(
                &key,
                &[
                    ("namespace".to_string(), "/push".to_string()),
                    ("room".to_string(), "news".to_string()),
                    ("pushData".to_string(), "{\"title\":\"hi\"}".to_string()),
                ],
            )
            .await
            .unwrap();
        server
    }

    async fn counter(server: &GatewayServer, message_id: &str, field: &str) -> i64 {
        let key = server.config.prefix.message_key(message_id);
        server.store.hget_multi(&key, &[field]).await.unwrap()[0]
            .as_deref()
            .map(|v| v.parse().unwrap())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn duplicate_acks_count_once() {
        let server = server_with_message("m1").await;
        for _ in 0..5 {
            server.acknowledge("c1", Platform::Android, Some("m1")).await.unwrap();
        }
        assert_eq!(counter(&server, "m1", "ackCount").await, 1);
        assert_eq!(counter(&server, "m1", "ackAndroidCount").await, 1);
    }

    #[tokio::test]
    async fn ios_increments_aggregate_and_platform_counter() {
        let server = server_with_message("m1").await;
        server.acknowledge("c1", Platform::Ios, Some("m1")).await.unwrap();
        assert_eq!(counter(&server, "m1", "ackCount").await, 1);
        assert_eq!(counter(&server, "m1", "ackIOSCount").await, 1);
        assert_eq!(counter(&server, "m1", "ackAndroidCount").await, 0);
    }

    #[tokio::test]
    async fn web_increments_only_aggregate() {
        let server = server_with_message("m1").await;
        server.acknowledge("c1", Platform::Web, Some("m1")).await.unwrap();
        assert_eq!(counter(&server, "m1", "ackCount").await, 1);
        assert_eq!(counter(&server, "m1", "ackIOSCount").await, 0);
        assert_eq!(counter(&server, "m1", "ackAndroidCount").await, 0);
    }

    #[tokio::test]
    async fn unknown_platform_counts_nothing() {
        let server = server_with_message("m1").await;
        server.acknowledge("c1", Platform::Unknown, Some("m1")).await.unwrap();
        assert_eq!(counter(&server, "m1", "ackCount").await, 0);
    }

    #[tokio::test]
    async fn distinct_connections_count_separately() {
        let server = server_with_message("m1").await;
        server.acknowledge("c1", Platform::Web, Some("m1")).await.unwrap();
        server.acknowledge("c2", Platform::Web, Some("m1")).await.unwrap();
        assert_eq!(counter(&server, "m1", "ackCount").await, 2);
    }

    #[tokio::test]
    async fn unknown_message_and_missing_id_are_ignored() {
        let server = GatewayServer::new(GatewayConfig::default());
        server.acknowledge("c1", Platform::Ios, Some("ghost")).await.unwrap();
        server.acknowledge("c1", Platform::Ios, None).await.unwrap();
        server.acknowledge("c1", Platform::Ios, Some("")).await.unwrap();
        assert_eq!(counter(&server, "ghost", "ackCount").await, 0);
    }
}
