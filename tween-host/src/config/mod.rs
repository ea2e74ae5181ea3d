//! # Config 模块
//!
//! 宿主配置管理。
//!
//! ## 配置优先级
//!
//! 1. 命令行参数（最高）
//! 2. 配置文件 (config.json)
//! 3. 默认值（最低）

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{Level, debug, warn};

/// 宿主配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// 每帧的时间步长（毫秒）
    #[serde(default = "default_frame_delta_ms")]
    pub frame_delta_ms: f64,

    /// 最多运行的帧数；管理器提前空闲时会提前结束
    #[serde(default = "default_max_frames")]
    pub max_frames: u64,

    /// 全局时间缩放 (0.0 - 1.0)
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// 每隔多少帧采样一次属性值
    #[serde(default = "default_sample_every")]
    pub sample_every: u64,

    /// 日志级别（trace/debug/info/warn/error）
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 场景目录；相对路径的场景文件找不到时在这里查找
    #[serde(default = "default_scenes_dir")]
    pub scenes_dir: PathBuf,
}

// 默认值函数
fn default_frame_delta_ms() -> f64 {
    16.6
}

fn default_max_frames() -> u64 {
    3600
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_sample_every() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_scenes_dir() -> PathBuf {
    PathBuf::from("scenes")
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            frame_delta_ms: default_frame_delta_ms(),
            max_frames: default_max_frames(),
            time_scale: default_time_scale(),
            sample_every: default_sample_every(),
            log_level: default_log_level(),
            scenes_dir: default_scenes_dir(),
        }
    }
}

impl HostConfig {
    /// 读取并解析配置文件，文件必须存在
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// 加载配置文件
    ///
    /// 如果文件不存在或解析失败，返回默认配置并记录警告。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            debug!(path = %path.display(), "配置文件不存在，使用默认配置");
            return Self::default();
        }

        match Self::try_load(path) {
            Ok(config) => {
                debug!(path = %path.display(), "配置文件加载成功");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "配置文件加载失败，使用默认配置");
                Self::default()
            }
        }
    }

    /// 保存配置到文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// 解析日志级别
    pub fn level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::ValidationFailed(format!("未知日志级别: {}", self.log_level)))
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.frame_delta_ms.is_finite() || self.frame_delta_ms <= 0.0 {
            return Err(ConfigError::ValidationFailed(format!(
                "帧步长必须为正数: {}",
                self.frame_delta_ms
            )));
        }

        if self.max_frames == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_frames 必须大于 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.time_scale) {
            return Err(ConfigError::ValidationFailed(
                "时间缩放必须在 0.0 - 1.0 之间".to_string(),
            ));
        }

        if self.sample_every == 0 {
            return Err(ConfigError::ValidationFailed(
                "sample_every 必须大于 0".to_string(),
            ));
        }

        self.level()?;
        Ok(())
    }

    /// 定位场景文件
    ///
    /// 路径本身存在时直接使用，否则尝试 `scenes_dir` 下的同名文件。
    pub fn resolve_scene(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.exists() || path.is_absolute() {
            return path.to_path_buf();
        }
        let candidate = self.scenes_dir.join(path);
        if candidate.exists() {
            candidate
        } else {
            path.to_path_buf()
        }
    }
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("配置 IO 错误: {0}")]
    Io(#[from] std::io::Error),
    /// 序列化失败
    #[error("配置序列化失败: {0}")]
    Json(#[from] serde_json::Error),
    /// 验证失败
    #[error("配置验证失败: {0}")]
    ValidationFailed(String),
}
