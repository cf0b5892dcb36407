//! 配置字段映射
//!
//! 每种服务配置静态声明一张字段表 ([`ConfigField`]), 查询参数与配置字段之间的
//! 读写都通过这张表完成, 不依赖运行时反射。

use crate::{PushError, ServiceConfig};
use serde::Serialize;

/// 配置字段声明
pub struct ConfigField<C> {
    /// 字段名称
    pub name: &'static str,
    /// 查询参数key, 第一个为主key
    pub keys: &'static [&'static str],
    /// 字段说明
    pub description: &'static str,
    /// 默认值 (文本形式)
    pub default: &'static str,
    /// 读取并格式化字段值
    pub get: fn(&C) -> String,
    /// 解析并写入字段值
    pub set: fn(&mut C, &str) -> Result<(), PushError>,
}

impl<C> ConfigField<C> {
    /// 主key
    pub fn key(&self) -> &'static str {
        self.keys.first().copied().unwrap_or(self.name)
    }

    fn matches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k.eq_ignore_ascii_case(key))
    }
}

fn find_field<C: ServiceConfig>(key: &str) -> Result<&'static ConfigField<C>, PushError> {
    C::fields()
        .iter()
        .find(|field| field.matches(key))
        .ok_or_else(|| PushError::ConfigError(format!("'{key}' is not a valid config key")))
}

/// 根据查询参数key设置配置字段
pub fn set_key<C: ServiceConfig>(config: &mut C, key: &str, value: &str) -> Result<(), PushError> {
    let field = find_field::<C>(key)?;
    (field.set)(config, value).map_err(|e| match e {
        PushError::ConfigError(reason) => PushError::ConfigError(format!(
            "failed to set config key '{key}' to '{value}': {reason}"
        )),
        other => other,
    })
}

/// 查询参数key对应字段的主key, 未知key返回 None
pub fn primary_key<C: ServiceConfig>(key: &str) -> Option<&'static str> {
    find_field::<C>(key).ok().map(|field| field.key())
}

/// 对外展示的字段说明
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: &'static str,
    pub keys: &'static [&'static str],
    pub description: &'static str,
    pub default: &'static str,
}

/// 所有字段的说明, 按主key排序
pub fn field_infos<C: ServiceConfig>() -> Vec<FieldInfo> {
    let mut infos: Vec<FieldInfo> = C::fields()
        .iter()
        .map(|field| FieldInfo {
            name: field.name,
            keys: field.keys,
            description: field.description,
            default: field.default,
        })
        .collect();
    infos.sort_by_key(|info| info.keys.first().copied().unwrap_or(info.name));
    infos
}

/// 生成查询参数, 空值字段不输出
pub fn build_query<C: ServiceConfig>(config: &C) -> Vec<(&'static str, String)> {
    let mut pairs: Vec<(&'static str, String)> = C::fields()
        .iter()
        .map(|field| (field.key(), (field.get)(config)))
        .filter(|(_, value)| !value.is_empty())
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
}

/// 将所有字段重置为声明的默认值
pub fn apply_defaults<C: ServiceConfig>(config: &mut C) -> Result<(), PushError> {
    for field in C::fields() {
        (field.set)(config, field.default)?;
    }
    Ok(())
}

/// 解析布尔值
pub fn parse_bool(value: &str) -> Result<bool, PushError> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(true),
        "no" | "n" | "false" | "0" => Ok(false),
        _ => Err(PushError::ConfigError(format!(
            "'{value}' is not a valid boolean"
        ))),
    }
}

/// 格式化布尔值
pub fn format_bool(value: bool) -> String {
    let text = if value { "Yes" } else { "No" };
    text.to_string()
}

/// 解析逗号分隔的列表, 忽略空项
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// 格式化列表
pub fn format_list(values: &[String]) -> String {
    values.join(",")
}
