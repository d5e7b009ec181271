//! 客户端服务协作方 / Client service collaborator
//!
//! 免打扰设置与设备详情查询属于外部服务，网关只做透传。
//! Do-not-disturb settings and device detail lookups belong to an external
//! service, the gateway only passes them through.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::message::OpResult;

#[async_trait]
pub trait ClientService: Send + Sync {
    /// 设置或查询免打扰房间列表 / Set or query do-not-disturb room list
    async fn do_not_disturb(&self, data: Value) -> Result<OpResult>;

    /// 查询客户端详情 / Look up client details
    async fn info(&self, client_id: &str, data: Value) -> Result<OpResult>;
}

/// 默认内置实现，始终返回 ok / Built-in default, always answers ok
pub struct DefaultClientService;

#[async_trait]
impl ClientService for DefaultClientService {
    async fn do_not_disturb(&self, _data: Value) -> Result<OpResult> {
        Ok(OpResult::ok())
    }

    async fn info(&self, _client_id: &str, _data: Value) -> Result<OpResult> {
        Ok(OpResult::ok())
    }
}
