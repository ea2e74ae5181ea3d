//! # Tween Host
//!
//! 补间引擎的无头宿主。
//!
//! ## 架构说明
//!
//! Host 层负责：
//! - 持有对象仓库（[`PropertyStore`]），为补间分配目标句柄
//! - 把 JSON 场景转换为补间配置
//! - 以固定步长驱动 [`tween_runtime::TweenManager`]
//! - 采样属性值并输出轨迹
//!
//! Host 层不包含任何插值或调度逻辑，这些全部由 `tween-runtime` 完成。

pub mod config;
pub mod error;
pub mod runner;
pub mod scene;
pub mod store;

pub use config::{ConfigError, HostConfig};
pub use error::{HostError, SceneError};
pub use runner::{EventRecord, FrameSample, Runner, Trace};
pub use scene::{ObjectDef, PropDef, SceneFile, SceneTween, TweenDef};
pub use store::{PropertyStore, StoreError, StoredObject};

use std::fs;
use std::path::Path;

/// 载入场景并运行到结束
pub fn run_scene(config: &HostConfig, scene_path: impl AsRef<Path>) -> Result<Trace, HostError> {
    let scene = SceneFile::load(config.resolve_scene(scene_path))?;
    let mut runner = Runner::new(config.clone());
    runner.load(&scene)?;
    Ok(runner.run())
}

/// 把轨迹写成 JSON 文件
pub fn write_trace(trace: &Trace, path: impl AsRef<Path>) -> Result<(), HostError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(trace)?;
    fs::write(path, json).map_err(|source| HostError::Output {
        path: path.to_path_buf(),
        source,
    })
}
