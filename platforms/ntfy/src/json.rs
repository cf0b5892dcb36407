use common::PushError;
use serde::{Deserialize, Serialize};

/// 发送到 ntfy API 的消息体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageRequest {
    pub topic: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(rename = "tag", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub priority: u8,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub click: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub attach: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filename: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub delay: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
}

fn is_zero(value: &u8) -> bool {
    *value == 0
}

/// 发送成功时的响应, 包含请求回显
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(flatten)]
    pub request: MessageRequest,
    pub id: String,
    /// ntfy 服务端返回 `time`, 部分兼容实现返回 `timestamp`
    #[serde(default)]
    pub time: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    pub event: String,
}

impl MessageResponse {
    /// 服务端记录的发送时间 (Unix秒), 缺失或为0时返回 None
    pub fn sent_at(&self) -> Option<u64> {
        self.time.or(self.timestamp).filter(|secs| *secs > 0)
    }
}

/// 服务端返回的错误体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "error")]
    pub name: String,
    #[serde(rename = "errorCode", default)]
    pub code: u64,
    #[serde(rename = "errorDescription", default)]
    pub description: String,
}

impl From<ErrorResponse> for PushError {
    fn from(err: ErrorResponse) -> Self {
        PushError::ProviderError {
            name: err.name,
            code: err.code,
            description: err.description,
        }
    }
}
