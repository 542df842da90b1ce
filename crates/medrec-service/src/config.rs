//! 配置管理
//!
//! 支持配置文件与 MEDREC_* 环境变量覆盖。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// 服务名称
    pub name: String,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（env-filter语法）
    pub level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "medrec".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// 加载配置
    ///
    /// 默认值 < 配置文件 < 环境变量，层层覆盖。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&ServiceConfig::default())?);

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("MEDREC").separator("_"))
            .build()?;

        let config: ServiceConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        info!("Configuration loaded: service {}", config.name);
        Ok(config)
    }
}

/// 初始化日志
pub fn init_logging(config: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(config.level.as_str())
        .init();
}
