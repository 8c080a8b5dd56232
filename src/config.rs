//! 配置
//!
//! JSON 格式，所有字段都有默认值，未知字段报错：
//!
//! ```json
//! {
//!     "log": { "verbosity": "debug", "forward": true },
//!     "listeners": { "on-unbound": "abort" }
//! }
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::listener::{set_unbound_policy, UnboundPolicy};
use crate::log::{configure_logging, tracing_handler, LogImportance};

pub const CONFIG_PATH_ENV: &str = "WLR_TRAMPOLINE_CONFIG";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub log: LogConfig,
    pub listeners: ListenerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LogConfig {
    pub verbosity: LogImportance,
    /// 是否把原生日志转发到 tracing。
    pub forward: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            verbosity: LogImportance::Info,
            forward: true,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ListenerConfig {
    pub on_unbound: UnboundPolicy,
}

impl Config {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("error parsing config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("error reading config file at {path:?}"))?;
        let config = Self::parse(&text).with_context(|| format!("in {path:?}"))?;
        debug!("loaded config from {path:?}");
        Ok(config)
    }

    /// 把配置应用到进程级状态：日志槽位与未绑定触发策略。
    pub fn apply(&self, backend: &Backend) {
        let handler = self.log.forward.then(tracing_handler);
        configure_logging(backend, self.log.verbosity, handler);
        set_unbound_policy(self.listeners.on_unbound);
    }
}

/// 显式路径优先，其次是环境变量；都没有时返回 `None`（使用默认配置）。
pub fn config_path(cli_path: Option<PathBuf>) -> Option<PathBuf> {
    cli_path.or_else(|| {
        env::var_os(CONFIG_PATH_ENV)
            .filter(|x| !x.is_empty())
            .map(PathBuf::from)
    })
}
