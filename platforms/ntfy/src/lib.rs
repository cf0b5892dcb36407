//! ntfy 推送平台
//!
//! 配置URL格式: `ntfy://[user:pass@]host[:port]/topic[?key=value&...]`

use common::{FieldInfo, PushError, PushService, ServiceConfig, ServiceFactory, format};
use url::Url;

mod config;
mod json;
mod service;

pub use config::{DEFAULT_HOST, DEFAULT_PRIORITY, NtfyConfig, SCHEME};
pub use json::{ErrorResponse, MessageRequest, MessageResponse};
pub use service::NtfyService;

/// 从配置URL创建配置
pub fn config_from_url(url: &Url) -> Result<NtfyConfig, PushError> {
    NtfyConfig::from_url(url)
}

/// 将配置转换为配置URL
pub fn config_to_url(config: &NtfyConfig) -> Result<Url, PushError> {
    config.get_url()
}

// --- Service Factory ---

pub struct NtfyServiceFactory;

impl ServiceFactory for NtfyServiceFactory {
    fn create(&self, url: &Url) -> Result<Box<dyn PushService>, PushError> {
        let service = NtfyService::initialize(url)?;
        Ok(Box::new(service))
    }

    fn scheme(&self) -> &'static str {
        SCHEME
    }

    fn config_fields(&self) -> Vec<FieldInfo> {
        format::field_infos::<NtfyConfig>()
    }
}
