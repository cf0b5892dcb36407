use common::format::{self, ConfigField};
use common::{PushError, ServiceConfig};
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// 配置URL的scheme
pub const SCHEME: &str = "ntfy";
/// 默认服务器
pub const DEFAULT_HOST: &str = "ntfy.sh";
/// 默认优先级 (1=min, 3=default, 5=max)
pub const DEFAULT_PRIORITY: u8 = 3;

static HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&//=]*)",
    )
    .expect("host pattern is a valid regex")
});

/// ntfy 配置
///
/// `ntfy://[user:pass@]host[:port]/topic[?key=value&...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtfyConfig {
    /// 服务器地址 (可带端口)
    pub host: String,
    /// 目标topic (必填)
    pub topic: String,
    /// 受保护topic的用户名
    pub username: String,
    /// 受保护topic的密码
    pub password: String,
    pub priority: u8,
    /// 消息标题
    pub title: String,
    /// 使用http而不是https
    pub disable_tls: bool,
    /// 标签, 可能映射为emoji
    pub tags: Vec<String>,
    /// 点击通知时打开的网址
    pub click: String,
    /// 附件URL
    pub attach: String,
    /// 邮件通知地址
    pub email: String,
    /// 延迟发送的时间点或时长
    pub delay: String,
}

impl Default for NtfyConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            topic: String::new(),
            username: String::new(),
            password: String::new(),
            priority: DEFAULT_PRIORITY,
            title: String::new(),
            disable_tls: false,
            tags: Vec::new(),
            click: String::new(),
            attach: String::new(),
            email: String::new(),
            delay: String::new(),
        }
    }
}

fn parse_priority(value: &str) -> Result<u8, PushError> {
    let priority: u8 = value
        .parse()
        .map_err(|_| PushError::ConfigError(format!("'{value}' is not a valid priority")))?;
    if !(1..=5).contains(&priority) {
        return Err(PushError::ConfigError(format!(
            "priority {priority} is out of range 1-5"
        )));
    }
    Ok(priority)
}

static FIELDS: LazyLock<Vec<ConfigField<NtfyConfig>>> = LazyLock::new(|| {
    vec![
        ConfigField {
            name: "Priority",
            keys: &["priority"],
            description: "Message priority with 1=min, 3=default and 5=max",
            default: "3",
            get: |c: &NtfyConfig| c.priority.to_string(),
            set: |c: &mut NtfyConfig, v: &str| -> Result<(), PushError> {
                c.priority = parse_priority(v)?;
                Ok(())
            },
        },
        ConfigField {
            name: "DisableTLS",
            keys: &["disabletls"],
            description: "Using http instead of https",
            default: "No",
            get: |c: &NtfyConfig| format::format_bool(c.disable_tls),
            set: |c: &mut NtfyConfig, v: &str| -> Result<(), PushError> {
                c.disable_tls = format::parse_bool(v)?;
                Ok(())
            },
        },
        ConfigField {
            name: "Tags",
            keys: &["tags", "tag"],
            description: "List of tags that may or not map to emojis separated by \",\" (comma)",
            default: "",
            get: |c: &NtfyConfig| format::format_list(&c.tags),
            set: |c: &mut NtfyConfig, v: &str| -> Result<(), PushError> {
                c.tags = format::parse_list(v);
                Ok(())
            },
        },
        ConfigField {
            name: "Title",
            keys: &["title"],
            description: "Message title",
            default: "",
            get: |c: &NtfyConfig| c.title.clone(),
            set: |c: &mut NtfyConfig, v: &str| -> Result<(), PushError> {
                c.title = v.to_string();
                Ok(())
            },
        },
        ConfigField {
            name: "ClickURL",
            keys: &["click"],
            description: "Website opened when notification is clicked",
            default: "",
            get: |c: &NtfyConfig| c.click.clone(),
            set: |c: &mut NtfyConfig, v: &str| -> Result<(), PushError> {
                c.click = v.to_string();
                Ok(())
            },
        },
        ConfigField {
            name: "Attachment",
            keys: &["attach"],
            description: "URL of an attachment",
            default: "",
            get: |c: &NtfyConfig| c.attach.clone(),
            set: |c: &mut NtfyConfig, v: &str| -> Result<(), PushError> {
                c.attach = v.to_string();
                Ok(())
            },
        },
        ConfigField {
            name: "Email",
            keys: &["email"],
            description: "E-mail address for e-mail notifications",
            default: "",
            get: |c: &NtfyConfig| c.email.clone(),
            set: |c: &mut NtfyConfig, v: &str| -> Result<(), PushError> {
                c.email = v.to_string();
                Ok(())
            },
        },
        ConfigField {
            name: "Delay",
            keys: &["delay"],
            description: "Timestamp or duration for delayed delivery",
            default: "",
            get: |c: &NtfyConfig| c.delay.clone(),
            set: |c: &mut NtfyConfig, v: &str| -> Result<(), PushError> {
                c.delay = v.to_string();
                Ok(())
            },
        },
    ]
});

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

impl NtfyConfig {
    /// 从配置URL创建配置
    pub fn from_url(url: &Url) -> Result<Self, PushError> {
        let mut config = Self::default();
        config.set_url(url)?;
        Ok(config)
    }

    /// 是否同时设置了用户名和密码
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl ServiceConfig for NtfyConfig {
    fn fields() -> &'static [ConfigField<Self>] {
        &FIELDS
    }

    fn get_url(&self) -> Result<Url, PushError> {
        let invalid = |reason: String| PushError::ConfigError(format!("invalid ntfy URL: {reason}"));

        let mut url =
            Url::parse(&format!("{SCHEME}://{}/", self.host)).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot set topic".to_string()))?
            .pop_if_empty()
            .push(&self.topic);

        if self.has_credentials() {
            url.set_username(&self.username)
                .map_err(|_| invalid("cannot set username".to_string()))?;
            url.set_password(Some(&self.password))
                .map_err(|_| invalid("cannot set password".to_string()))?;
        }

        let query = format::build_query(self);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn set_url(&mut self, url: &Url) -> Result<(), PushError> {
        let hostname = url.host_str().unwrap_or_default();
        self.host = if HOST_PATTERN.is_match(hostname) {
            match url.port() {
                Some(port) => format!("{hostname}:{port}"),
                None => hostname.to_string(),
            }
        } else {
            DEFAULT_HOST.to_string()
        };

        let username = decode(url.username());
        let password = decode(url.password().unwrap_or_default());
        if !username.is_empty() && !password.is_empty() {
            self.username = username;
            self.password = password;
        } else {
            self.username.clear();
            self.password.clear();
        }

        self.topic = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(decode)
            .unwrap_or_default();
        if self.topic.is_empty() {
            return Err(PushError::ConfigError("ntfy topic is invalid".to_string()));
        }

        format::apply_defaults(self)?;
        let mut seen = HashSet::new();
        for (key, value) in url.query_pairs() {
            // 同一个字段只取第一次出现的值, 别名视为同一字段
            let field_key = format::primary_key::<Self>(&key)
                .map(str::to_string)
                .unwrap_or_else(|| key.to_ascii_lowercase());
            if !seen.insert(field_key) {
                continue;
            }
            format::set_key(self, &key, &value)?;
        }
        Ok(())
    }
}
