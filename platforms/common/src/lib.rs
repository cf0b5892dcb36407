use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use url::Url;

pub mod format;

pub use format::{ConfigField, FieldInfo};

/// 推送平台错误类型
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Platform error: {0}")]
    PlatformError(String),

    /// 服务端返回的结构化错误
    #[error("server responds with {name} ({code}): {description}")]
    ProviderError {
        name: String,
        code: u64,
        description: String,
    },
}

/// 单次发送时覆盖配置的参数 (key -> value)
pub type Params = BTreeMap<String, String>;

/// 推送结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResult {
    /// 消息ID
    pub message_id: Option<String>,
    /// 是否成功
    pub success: bool,
    /// 响应信息
    pub response: Option<String>,
    /// 时间戳
    pub timestamp: DateTime<Utc>,
}

impl Default for PushResult {
    fn default() -> Self {
        Self {
            message_id: None,
            success: false,
            response: None,
            timestamp: Utc::now(),
        }
    }
}

/// 服务配置trait
///
/// 配置与URL之间双向转换, 查询参数通过 [`ServiceConfig::fields`] 声明的字段表映射。
pub trait ServiceConfig: Clone + Default + Send + Sync + Sized + 'static {
    /// 获取字段声明表
    fn fields() -> &'static [ConfigField<Self>];

    /// 根据当前字段值生成URL
    fn get_url(&self) -> Result<Url, PushError>;

    /// 从URL更新配置
    fn set_url(&mut self, url: &Url) -> Result<(), PushError>;
}

/// 推送服务trait（用于dyn兼容）
#[async_trait]
pub trait PushService: Send + Sync {
    /// 发送消息, `params` 仅对本次发送生效
    async fn send(&self, message: &str, params: &Params) -> Result<PushResult, PushError>;

    /// 获取服务名称
    fn service_name(&self) -> &'static str;
}

/// 服务工厂trait
pub trait ServiceFactory: Send + Sync {
    /// 根据配置URL创建服务实例
    fn create(&self, url: &Url) -> Result<Box<dyn PushService>, PushError>;

    /// 获取URL scheme
    fn scheme(&self) -> &'static str;

    /// 配置URL支持的查询参数
    fn config_fields(&self) -> Vec<FieldInfo> {
        Vec::new()
    }
}

/// 服务注册表, 按URL scheme分发
#[derive(Default)]
pub struct ServiceRegistry {
    factories: HashMap<String, Box<dyn ServiceFactory>>,
}

impl ServiceRegistry {
    /// 创建新的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册服务工厂
    pub fn register(&mut self, factory: Box<dyn ServiceFactory>) {
        self.factories.insert(factory.scheme().to_string(), factory);
    }

    /// 获取服务工厂
    pub fn get_factory(&self, scheme: &str) -> Option<&dyn ServiceFactory> {
        self.factories.get(scheme).map(|f| f.as_ref())
    }

    /// 获取所有支持的scheme
    pub fn list_services(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.factories.keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// 解析配置URL并创建对应的服务
    pub fn create(&self, raw_url: &str) -> Result<Box<dyn PushService>, PushError> {
        let url = Url::parse(raw_url)
            .map_err(|e| PushError::ConfigError(format!("invalid service URL: {e}")))?;
        let factory = self.get_factory(url.scheme()).ok_or_else(|| {
            PushError::ConfigError(format!("unknown service scheme '{}'", url.scheme()))
        })?;
        factory.create(&url)
    }
}
