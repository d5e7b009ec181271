//! 配置模块 / Configuration module
//!
//! 支持 TOML/JSON/YAML 配置文件与 IPUSH_ 前缀环境变量覆盖
//! Supports TOML/JSON/YAML config files plus IPUSH_ env var overrides

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// 监听地址 / Listen host
    #[serde(default = "default_host")]
    pub host: String,
    /// WebSocket 端口 / WebSocket port
    #[serde(default = "default_port")]
    pub port: u16,
    /// 启动时注册连接处理器的命名空间 / Namespaces whose lifecycle handler is bound at startup
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
    /// 单次重连最多回放的未读消息条数 / Max unread messages drained per reconnect
    #[serde(default = "default_unread_limit")]
    pub unread_message_max_limit: usize,
    /// 存储键前缀约定 / Store key prefix conventions
    #[serde(default)]
    pub prefix: KeyPrefixes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyPrefixes {
    #[serde(default = "default_client_hash")]
    pub client_hash: String,
    #[serde(default = "default_push_msg_id")]
    pub push_msg_id: String,
    #[serde(default = "default_push_ack_set")]
    pub push_ack_set: String,
    #[serde(default = "default_unread_list")]
    pub unread_message_list: String,
    #[serde(default = "default_room")]
    pub room: String,
    #[serde(default = "default_user_room")]
    pub user_room: String,
}

impl Default for KeyPrefixes {
    fn default() -> Self {
        Self {
            client_hash: default_client_hash(),
            push_msg_id: default_push_msg_id(),
            push_ack_set: default_push_ack_set(),
            unread_message_list: default_unread_list(),
            room: default_room(),
            user_room: default_user_room(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            namespaces: default_namespaces(),
            unread_message_max_limit: default_unread_limit(),
            prefix: KeyPrefixes::default(),
        }
    }
}

impl KeyPrefixes {
    /// 会话哈希键 / Session hash key
    pub fn session_key(&self, client_id: &str) -> String {
        format!("{}{}", self.client_hash, client_id)
    }

    /// 推送消息记录键 / Push message record key
    pub fn message_key(&self, message_id: &str) -> String {
        format!("{}{}", self.push_msg_id, message_id)
    }

    /// 确认去重集合键，大括号段为集群哈希标签
    /// Ack dedup set key, the braced segment is the cluster hash tag
    pub fn ack_set_key(&self, platform: &str, namespace: &str, room: &str, message_id: &str) -> String {
        format!("{}{}_{{{}_{}}}_{}", self.push_ack_set, platform, namespace, room, message_id)
    }

    /// 未读消息列表键 / Unread message list key
    pub fn unread_list_key(&self, client_id: &str) -> String {
        format!("{}{}", self.unread_message_list, client_id)
    }

    /// 用户房间名（未加房间前缀）/ User room name (room prefix not yet applied)
    pub fn user_room_name(&self, uid: &str) -> String {
        format!("{}{}", self.user_room, uid)
    }

    /// 逻辑房间到传输层房间 / Logical room to transport-level room
    pub fn room_name(&self, room: &str) -> String {
        format!("{}{}", self.room, room)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5100
}
fn default_namespaces() -> Vec<String> {
    vec!["/push".to_string()]
}
fn default_unread_limit() -> usize {
    100
}
fn default_client_hash() -> String {
    "ipush:client:".to_string()
}
fn default_push_msg_id() -> String {
    "ipush:msg:".to_string()
}
fn default_push_ack_set() -> String {
    "ipush:ack:".to_string()
}
fn default_unread_list() -> String {
    "ipush:unread:android:".to_string()
}
fn default_room() -> String {
    "ipush#".to_string()
}
fn default_user_room() -> String {
    "user_".to_string()
}

/// 加载配置，文件缺失时退回默认值 / Load config, fall back to defaults when file is absent
pub fn load(path: &str) -> Result<GatewayConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("IPUSH").separator("__"))
        .build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_set_key_keeps_hash_tag_shape() {
        let p = KeyPrefixes::default();
        assert_eq!(
            p.ack_set_key("ios", "/push", "news", "m1"),
            "ipush:ack:ios_{/push_news}_m1"
        );
    }

    #[test]
    fn defaults_are_complete() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.port, 5100);
        assert_eq!(cfg.namespaces, vec!["/push".to_string()]);
        assert_eq!(cfg.prefix.room_name("news"), "ipush#news");
        assert_eq!(cfg.prefix.user_room_name("u1"), "user_u1");
    }
}
