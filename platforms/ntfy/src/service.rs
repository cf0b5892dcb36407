use crate::config::NtfyConfig;
use crate::json::{ErrorResponse, MessageRequest, MessageResponse};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use common::{Params, PushError, PushResult, PushService, format};
use log::*;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::time::Duration;
use url::Url;

const SERVICE_NAME: &str = "ntfy";
/// 单次请求的超时时间, 防止一个无响应的服务器阻塞后续发送
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// ntfy 推送服务
pub struct NtfyService {
    config: NtfyConfig,
    http_client: Client,
}

impl NtfyService {
    /// 从配置URL初始化服务
    pub fn initialize(url: &Url) -> Result<Self, PushError> {
        let config = NtfyConfig::from_url(url)?;
        Self::new(config)
    }

    /// 使用已解析的配置创建服务
    pub fn new(config: NtfyConfig) -> Result<Self, PushError> {
        let mut headers = HeaderMap::new();
        // 用户名和密码都存在时, 每个请求都带上认证头
        if config.has_credentials() {
            headers.insert(AUTHORIZATION, authorization(&config)?);
        }

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.disable_tls)
            .default_headers(headers)
            .build()
            .map_err(|e| PushError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// 当前保存的配置
    pub fn config(&self) -> &NtfyConfig {
        &self.config
    }

    async fn send_request(
        &self,
        post_url: &str,
        request: &MessageRequest,
    ) -> Result<PushResult, PushError> {
        let response = self
            .http_client
            .post(post_url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                PushError::NetworkError(format!("failed to send notification to Ntfy: {e}"))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PushError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&text) {
                return Err(error.into());
            }
            return Err(PushError::NetworkError(format!(
                "failed to send notification to Ntfy: status {status}, body: {text}"
            )));
        }

        let ack: MessageResponse = serde_json::from_str(&text)
            .map_err(|e| PushError::PlatformError(format!("invalid Ntfy response: {e}")))?;
        debug!("ntfy accepted message {} ({})", ack.id, ack.event);

        let timestamp = ack
            .sent_at()
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);
        Ok(PushResult {
            message_id: Some(ack.id),
            success: true,
            response: Some(ack.event),
            timestamp,
        })
    }
}

#[async_trait]
impl PushService for NtfyService {
    async fn send(&self, message: &str, params: &Params) -> Result<PushResult, PushError> {
        let mut config = self.config.clone();
        for (key, value) in params {
            if let Err(e) = format::set_key(&mut config, key, value) {
                warn!("Failed to update params: {e}");
            }
        }

        let post_url = build_post_url(&config);
        let request = build_request(&config, message);
        debug!("Sending ntfy message to {post_url} (topic: {})", config.topic);
        self.send_request(&post_url, &request).await
    }

    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }
}

fn authorization(config: &NtfyConfig) -> Result<HeaderValue, PushError> {
    let credentials = STANDARD.encode(format!("{}:{}", config.username, config.password));
    let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))
        .map_err(|e| PushError::ConfigError(format!("invalid credentials: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

fn build_post_url(config: &NtfyConfig) -> String {
    let scheme = if config.disable_tls { "http" } else { "https" };
    format!("{scheme}://{}", config.host)
}

// click, attach, email, delay 目前不会转发给服务端
fn build_request(config: &NtfyConfig, message: &str) -> MessageRequest {
    MessageRequest {
        topic: config.topic.clone(),
        message: message.to_string(),
        title: config.title.clone(),
        tags: config.tags.clone(),
        priority: config.priority,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn local_url(server: &MockServer, userinfo: &str) -> Url {
        Url::parse(&format!(
            "ntfy://{userinfo}{}/topic?disabletls=yes",
            server.address()
        ))
        .unwrap()
    }

    fn success_body() -> serde_json::Value {
        json!({
            "id": "hwQ2YpKdmg",
            "time": 1635528741,
            "timestamp": 1635528741,
            "event": "message",
            "topic": "topic",
            "message": "Message",
        })
    }

    #[test]
    fn test_build_post_url() {
        let mut config = NtfyConfig {
            host: "ntfy.test:8080".to_string(),
            topic: "topic".to_string(),
            ..Default::default()
        };
        assert_eq!(build_post_url(&config), "https://ntfy.test:8080");
        config.disable_tls = true;
        assert_eq!(build_post_url(&config), "http://ntfy.test:8080");
    }

    #[test]
    fn test_build_request_skips_delivery_hints() {
        let config = NtfyConfig {
            topic: "topic".to_string(),
            title: "Title".to_string(),
            click: "https://example.com".to_string(),
            email: "jone@doe.me".to_string(),
            ..Default::default()
        };
        let request = build_request(&config, "Message");
        assert_eq!(request.topic, "topic");
        assert_eq!(request.message, "Message");
        assert_eq!(request.title, "Title");
        assert_eq!(request.priority, 3);
        assert!(request.click.is_empty());
        assert!(request.email.is_empty());
    }

    #[test]
    fn test_authorization_header() {
        let config = NtfyConfig {
            topic: "topic".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            ..Default::default()
        };
        let value = authorization(&config).unwrap();
        assert_eq!(value.to_str().unwrap(), "Basic dXNlcjpwYXNz");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_initialize_rejects_missing_topic() {
        let url = Url::parse("ntfy://ntfy.sh").unwrap();
        assert!(NtfyService::initialize(&url).is_err());
    }

    #[tokio::test]
    async fn test_send_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .json_body(json!({
                        "topic": "topic",
                        "message": "Message",
                        "priority": 3,
                    }));
                then.status(200).json_body(success_body());
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "")).unwrap();
        let mut params = Params::new();
        params.insert("title".to_string(), String::new());
        let result = service.send("Message", &params).await.unwrap();

        mock.assert_async().await;
        assert!(result.success);
        assert_eq!(result.message_id.as_deref(), Some("hwQ2YpKdmg"));
        assert_eq!(result.response.as_deref(), Some("message"));
        assert_eq!(result.timestamp.timestamp(), 1635528741);
    }

    #[tokio::test]
    async fn test_send_success_without_timestamp() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({
                    "id": "abc",
                    "event": "message",
                    "topic": "topic",
                }));
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "")).unwrap();
        let before = Utc::now();
        let result = service.send("Message", &Params::new()).await.unwrap();
        assert!(result.timestamp >= before);
    }

    #[tokio::test]
    async fn test_send_success_with_time_field() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({
                    "id": "abc",
                    "time": 1635528741,
                    "event": "message",
                    "topic": "topic",
                }));
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "")).unwrap();
        let result = service.send("Message", &Params::new()).await.unwrap();
        assert_eq!(result.timestamp.timestamp(), 1635528741);
    }

    #[tokio::test]
    async fn test_send_structured_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(401).json_body(json!({
                    "error": "err",
                    "errorCode": 401,
                    "errorDescription": "Not authorized",
                }));
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "")).unwrap();
        let err = service.send("Message", &Params::new()).await.unwrap_err();

        match err {
            PushError::ProviderError {
                name,
                code,
                description,
            } => {
                assert_eq!(name, "err");
                assert_eq!(code, 401);
                assert_eq!(description, "Not authorized");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_send_unstructured_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(502).body("Bad Gateway");
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "")).unwrap();
        let err = service.send("Message", &Params::new()).await.unwrap_err();
        assert!(matches!(err, PushError::NetworkError(_)));
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_send_malformed_success_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).body("ok");
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "")).unwrap();
        let err = service.send("Message", &Params::new()).await.unwrap_err();
        assert!(matches!(err, PushError::PlatformError(_)));
    }

    #[tokio::test]
    async fn test_send_transport_error() {
        // 端口1上没有服务监听
        let url = Url::parse("ntfy://127.0.0.1:1/topic?disabletls=yes").unwrap();
        let service = NtfyService::initialize(&url).unwrap();
        let err = service.send("Message", &Params::new()).await.unwrap_err();
        assert!(matches!(err, PushError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_send_with_basic_auth() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .header("Authorization", "Basic dXNlcjpwYXNz");
                then.status(200).json_body(success_body());
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "user:pass@")).unwrap();
        service.send("Message", &Params::new()).await.unwrap();
        service.send("Again", &Params::new()).await.unwrap();

        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_send_without_credentials_has_no_auth_header() {
        let server = MockServer::start_async().await;
        let auth_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/").header_exists("Authorization");
                then.status(200).json_body(success_body());
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "user@")).unwrap();
        assert!(service.send("Message", &Params::new()).await.is_err());

        auth_mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_overrides_apply_to_single_send() {
        let server = MockServer::start_async().await;
        let override_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/").json_body(json!({
                    "topic": "topic",
                    "message": "First",
                    "title": "Override",
                    "tag": ["x", "y"],
                    "priority": 5,
                }));
                then.status(200).json_body(success_body());
            })
            .await;
        let default_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/").json_body(json!({
                    "topic": "topic",
                    "message": "Second",
                    "priority": 3,
                }));
                then.status(200).json_body(success_body());
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "")).unwrap();
        let mut params = Params::new();
        params.insert("title".to_string(), "Override".to_string());
        params.insert("tags".to_string(), "x,y".to_string());
        params.insert("priority".to_string(), "5".to_string());
        service.send("First", &params).await.unwrap();
        service.send("Second", &Params::new()).await.unwrap();

        override_mock.assert_async().await;
        default_mock.assert_async().await;
        assert_eq!(service.config().priority, 3);
        assert!(service.config().title.is_empty());
    }

    #[tokio::test]
    async fn test_bad_override_is_skipped() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/").json_body(json!({
                    "topic": "topic",
                    "message": "Message",
                    "title": "Kept",
                    "priority": 3,
                }));
                then.status(200).json_body(success_body());
            })
            .await;

        let service = NtfyService::initialize(&local_url(&server, "")).unwrap();
        let mut params = Params::new();
        params.insert("priority".to_string(), "urgent".to_string());
        params.insert("title".to_string(), "Kept".to_string());
        params.insert("unknown".to_string(), "value".to_string());
        service.send("Message", &params).await.unwrap();

        mock.assert_async().await;
    }
}
