//! # Error 模块
//!
//! 定义 tween-runtime 中使用的错误类型。
//!
//! 补间系统本身几乎没有失败路径：非法的时长、延迟等配置会被规整，
//! 空目标会让对应条目直接完成。只有缓动函数名解析和 `seek` 会返回错误。

use thiserror::Error;

use crate::tween::TweenState;

/// 补间错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TweenError {
    /// 未知的缓动函数名
    #[error("未知的缓动函数名 '{name}'")]
    UnknownEase { name: String },

    /// seek 步长无效
    #[error("无效的 seek 步长 {delta}：必须是大于 0 的有限值")]
    InvalidSeekStep { delta: f64 },

    /// seek 目标不可达
    #[error("seek 目标 {position} 不可达：{reason}")]
    SeekUnreachable { position: f64, reason: String },

    /// 当前状态不允许此操作
    #[error("补间当前状态 {state:?} 不允许此操作")]
    InvalidState { state: TweenState },
}

/// Result 类型别名
pub type TweenResult<T> = Result<T, TweenError>;
