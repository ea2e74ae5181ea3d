//! # Tween Runtime
//!
//! 帧驱动的属性补间核心库。
//!
//! ## 架构概述
//!
//! `tween-runtime` 是纯逻辑核心，不做任何 IO，也不关心目标对象是什么。
//! 目标只是不透明的 [`TargetHandle`]，插值结果通过调用方提供的 action 回调写回：
//!
//! ```text
//! Host                                 Runtime
//!   │                                     │
//!   │── add(TweenConfig) ───────────────►│ to_add
//!   │── pre_update(time, delta) ────────►│ to_add → active / pending, to_remove → Removed
//!   │── update(time, delta) ────────────►│ Tween::update → TweenData 推进
//!   │◄─ action(target, value) ───────────│
//!   │◄─ 事件回调 (start/update/complete…) ─│
//! ```
//!
//! ## 核心类型
//!
//! - [`Easing`] / [`Ease`]：缓动函数库
//! - [`TweenConfig`] / [`TweenEntry`]：补间配置
//! - [`TweenData`]：单个（目标，条目）的插值单元
//! - [`Tween`]：聚合补间与状态机
//! - [`TweenManager`]：两阶段调度器
//!
//! ## 使用示例
//!
//! ```ignore
//! use tween_runtime::{TweenConfig, TweenEntry, TweenManager, Easing};
//!
//! let manager = TweenManager::new();
//! let handle = manager.add(
//!     TweenConfig::single(target, TweenEntry::new(0.0, 100.0, |t, v| store.set(t, "x", v))
//!         .with_duration(500.0)
//!         .with_ease("Quad.easeOut".parse::<Easing>()?)),
//! );
//!
//! loop {
//!     manager.pre_update(time, delta);
//!     manager.update(time, delta);
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`easing`]：缓动函数
//! - [`target`]：目标句柄
//! - [`config`]：补间配置与参数生成器
//! - [`event`]：事件与监听器
//! - [`data`]：TweenData
//! - [`tween`]：Tween 状态机
//! - [`manager`]：TweenManager
//! - [`error`]：错误类型

pub mod config;
pub mod data;
pub mod easing;
pub mod error;
pub mod event;
pub mod manager;
pub mod target;
pub mod tween;

// 重导出核心类型
pub use config::{
    Action, FlipAxis, GenContext, Param, TweenCallbacks, TweenConfig, TweenEntry, stagger,
    stagger_from,
};
pub use data::{REPEAT_FOREVER, TweenData, TweenDataState};
pub use easing::{Ease, EaseMode, Easing};
pub use error::{TweenError, TweenResult};
pub use event::{EntryEvent, ListenerId, TweenCallback, TweenEvent, TweenEventKind};
pub use manager::{TweenHandle, TweenManager, WeakTweenManager};
pub use target::TargetHandle;
pub use tween::{DEFAULT_SEEK_STEP, Tween, TweenId, TweenState};
