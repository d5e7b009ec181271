use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 网关消息结构 / Gateway Message Structure
///
/// 客户端与网关之间的统一JSON信封 / Uniform JSON envelope between client and gateway
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
pub struct GatewayEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl GatewayEvent {
    pub fn new(event_type: &str, data: serde_json::Value) -> Self {
        Self { event_type: event_type.to_string(), data }
    }
}

/// 握手上下文 / Handshake Context
///
/// 由外部鉴权环节补全，随 connect 事件到达
/// Produced by the external auth enrichment step, arrives with the connect event
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
pub struct Handshake {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub uid: String,
    #[serde(default)]
    pub platform: String,
    /// 上游返回的初始房间列表，一次性消费 / Initial room list from upstream, consumed once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rooms: Option<Vec<String>>,
}

fn default_namespace() -> String {
    "/".to_string()
}

/// 统一操作结果 / Uniform operation result
///
/// 所有对调用方报告结果的操作均使用该类型
/// Every operation that reports an outcome to a caller uses this type
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct OpResult {
    pub status: u16,
    pub message: String,
}

impl OpResult {
    pub fn ok() -> Self {
        Self { status: 200, message: "ok".to_string() }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// 开通完成事件载荷 / Provisioning-complete event payload
#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct ProvisionedInfo {
    pub system: String,
    pub port: u16,
    #[serde(rename = "clientId")]
    pub client_id: String,
}

/// 进出房间请求 / Join or leave room request
#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct RoomRequest {
    pub rooms: Vec<String>,
}

/// 推送确认上报 / Push acknowledgment report
#[derive(Serialize, Deserialize, Debug, JsonSchema)]
pub struct AckReport {
    #[serde(default)]
    pub id: Option<String>,
}
