use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 客户端平台 / Client platform
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Web,
    Unknown,
}

impl Platform {
    pub fn parse(s: &str) -> Self {
        match s {
            "android" => Platform::Android,
            "ios" => Platform::Ios,
            "web" => Platform::Web,
            _ => Platform::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
            Platform::Unknown => "unknown",
        }
    }

    /// 确认计数只识别这三个平台 / Ack counting only recognizes these three platforms
    pub fn is_countable(&self) -> bool {
        !matches!(self, Platform::Unknown)
    }
}

/// 连接会话状态机 / Connection session state machine
///
/// Closed 为终态，重连会产生全新会话 / Closed is terminal, a reconnect creates a new session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Provisioning,
    Active,
    Closed,
}
