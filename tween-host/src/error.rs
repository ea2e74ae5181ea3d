//! # Error 模块
//!
//! 宿主层的错误类型。

use std::path::PathBuf;

use thiserror::Error;
use tween_runtime::TweenError;

use crate::config::ConfigError;
use crate::store::StoreError;

/// 场景加载与构建错误
#[derive(Error, Debug)]
pub enum SceneError {
    /// 场景文件读取失败
    #[error("读取场景文件失败: {path:?} - {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 场景 JSON 解析失败
    #[error("场景解析失败: {0}")]
    Json(#[from] serde_json::Error),

    /// 补间引用了不存在的对象
    #[error("补间 #{tween} 引用了未知对象: {name}")]
    UnknownObject { tween: usize, name: String },

    /// 补间引用了对象上不存在的属性
    #[error("补间 #{tween} 引用了对象 {object} 上不存在的属性: {property}")]
    UnknownProperty {
        tween: usize,
        object: String,
        property: String,
    },

    /// 补间没有目标或没有属性
    #[error("补间 #{tween} 为空: {reason}")]
    EmptyTween { tween: usize, reason: String },

    /// 对象注册失败
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 缓动名称等运行时参数无效
    #[error(transparent)]
    Tween(#[from] TweenError),
}

/// 宿主错误
#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    /// 轨迹输出失败
    #[error("写入轨迹失败: {path:?} - {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("轨迹序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}
