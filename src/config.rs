//! 运行时配置
//!
//! 启动时由 CLI 参数构建一次，之后只读，按值传入服务器。

use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;

use reqwest::Url;

use crate::error::StartupError;

/// type_url 白名单
///
/// 空集合表示放行所有类型。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: BTreeSet<String>,
}

impl AllowList {
    /// 放行所有类型的空白名单
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// 解析逗号分隔的列表，逐项 trim，丢弃空项
    pub fn parse(raw: &str) -> Self {
        raw.split(',').collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, type_url: &str) -> bool {
        self.entries.contains(type_url.trim())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { entries }
    }
}

impl fmt::Display for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{}", joined.join(","))
    }
}

/// 中继服务配置
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 监听地址
    pub listen_addr: SocketAddr,
    /// 是否输出 debug 日志
    pub verbose: bool,
    /// 允许转发的 type_url
    pub allowed_type_urls: AllowList,
    /// Slack incoming webhook 地址
    pub webhook_url: Url,
}

impl RelayConfig {
    /// 校验并构建配置，webhook 地址必须是合法的绝对 URL
    pub fn new(
        port: u16,
        verbose: bool,
        allowed_type_urls: AllowList,
        webhook_url: &str,
    ) -> Result<Self, StartupError> {
        let webhook_url =
            Url::parse(webhook_url).map_err(|e| StartupError::InvalidWebhookUrl {
                url: webhook_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            verbose,
            allowed_type_urls,
            webhook_url,
        })
    }
}
