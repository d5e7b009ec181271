//! ipush-gateway — 实时推送网关的会话与投递跟踪核心
//! ipush-gateway — session and delivery-tracking core of a real-time push gateway
//!
//! 管理持久连接的生命周期、房间成员关系、推送确认去重计数和断线
//! 重连后的离线消息回放。
//! Manages the lifecycle of persistent connections, room membership, dedup
//! counting of push acknowledgments, and offline message replay on reconnect.

pub mod config;
pub mod domain;
pub mod server;
pub mod service;
pub mod session;
pub mod store;
pub mod ws;

pub use config::GatewayConfig;
pub use server::{Connection, GatewayServer};
