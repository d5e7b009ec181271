//! 会话记录器 / Session recorder
//!
//! 每次连接成功后把会话元数据 upsert 到存储，first_connect_time 只在
//! 首次建档时写入。
//! Upserts session metadata into the store on every successful connection,
//! first_connect_time is written only when the record is first created.

use anyhow::Result;

use crate::server::GatewayServer;

impl GatewayServer {
    pub async fn record_session(&self, client_id: &str, uid: &str) -> Result<()> {
        let key = self.config.prefix.session_key(client_id);
        let now = chrono::Utc::now().timestamp_millis();

        let mut fields = vec![
            ("userid".to_string(), uid.to_string()),
            ("last_connect_time".to_string(), now.to_string()),
            ("leaveMessage".to_string(), "true".to_string()),
        ];
        if !self.store.exists(&key).await? {
            fields.push(("first_connect_time".to_string(), now.to_string()));
        }

        self.store.hset_all(&key, &fields).await
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GatewayConfig;
    use crate::server::GatewayServer;

    #[tokio::test]
    async fn first_connect_marks_both_timestamps() {
        let server = GatewayServer::new(GatewayConfig::default());
        server.record_session("c1", "u1").await.unwrap();

        let key = server.config.prefix.session_key("c1");
        let fields = server
            .store
            .hget_multi(&key, &["userid", "first_connect_time", "last_connect_time", "leaveMessage"])
            .await
            .unwrap();
        assert_eq!(fields[0].as_deref(), Some("u1"));
        assert_eq!(fields[1], fields[2]);
        assert_eq!(fields[3].as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn reconnect_keeps_first_connect_time() {
        let server = GatewayServer::new(GatewayConfig::default());
        let key = server.config.prefix.session_key("c1");

        server.record_session("c1", "u1").await.unwrap();
        let before = server
            .store
            .hget_multi(&key, &["first_connect_time"])
            .await
            .unwrap()[0]
            .clone()
            .unwrap();

        // 保证时间戳可前进 / Make sure the timestamp can advance
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        server.record_session("c1", "u1").await.unwrap();

        let after = server
            .store
            .hget_multi(&key, &["first_connect_time", "last_connect_time"])
            .await
            .unwrap();
        assert_eq!(after[0].as_deref(), Some(before.as_str()));
        assert!(after[1].clone().unwrap().parse::<i64>().unwrap() > before.parse::<i64>().unwrap());
    }
}
