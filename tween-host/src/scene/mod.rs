//! # Scene 模块
//!
//! JSON 场景描述：一组具名对象及作用于它们的补间。
//!
//! ```json
//! {
//!   "name": "demo",
//!   "objects": [{ "name": "box", "properties": { "x": 0, "alpha": 1 } }],
//!   "tweens": [{
//!     "targets": ["box"],
//!     "props": [{ "property": "x", "to": 300, "ease": "Quad.easeOut", "duration": 500 }],
//!     "loop": 1
//!   }]
//! }
//! ```
//!
//! 省略 `from` 时，起始值取渲染那一刻对象属性的当前值；
//! `relative` 为 true 时 `to` 是相对起始值的增量。

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use tween_runtime::{Easing, Param, TargetHandle, TweenConfig, TweenEntry, stagger_from};

use crate::error::SceneError;
use crate::store::{PropertyStore, StoreError};

/// 场景文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
    #[serde(default)]
    pub tweens: Vec<TweenDef>,
}

/// 对象定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, f64>,
}

/// 补间定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweenDef {
    /// 目标对象名
    pub targets: Vec<String>,
    pub props: Vec<PropDef>,
    /// 整体循环次数，-1 为无限
    #[serde(default, rename = "loop")]
    pub loop_count: i32,
    #[serde(default)]
    pub loop_delay: f64,
    #[serde(default)]
    pub complete_delay: f64,
    #[serde(default)]
    pub paused: bool,
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    /// 以暂停状态创建时，在第几帧开始播放
    #[serde(default)]
    pub play_at_frame: Option<u64>,
}

/// 单个属性的补间定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropDef {
    pub property: String,
    #[serde(default)]
    pub from: Option<f64>,
    pub to: f64,
    #[serde(default)]
    pub relative: bool,
    /// 缓动名称，如 `"Quad.easeOut"`、`"Power2"`
    #[serde(default)]
    pub ease: Option<String>,
    #[serde(default = "default_duration")]
    pub duration: f64,
    #[serde(default)]
    pub delay: f64,
    /// 每个后续目标额外增加的延迟
    #[serde(default)]
    pub stagger: Option<f64>,
    #[serde(default)]
    pub hold: f64,
    /// 重复次数，-1 为无限
    #[serde(default)]
    pub repeat: i32,
    #[serde(default)]
    pub repeat_delay: f64,
    #[serde(default)]
    pub yoyo: bool,
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_duration() -> f64 {
    TweenEntry::DEFAULT_DURATION
}

/// 构建完成、可交给管理器的补间
pub struct SceneTween {
    /// 在场景 `tweens` 中的位置
    pub index: usize,
    pub config: TweenConfig,
    pub play_at_frame: Option<u64>,
}

impl SceneFile {
    /// 读取场景文件
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scene = Self::from_json(&content)?;
        if scene.name.is_empty() {
            scene.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(scene)
    }

    pub fn from_json(content: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(content)?)
    }

    /// 检查引用与缓动名称，不创建任何对象
    pub fn validate(&self) -> Result<(), SceneError> {
        let mut objects: HashMap<&str, &ObjectDef> = HashMap::with_capacity(self.objects.len());
        for object in &self.objects {
            if objects.insert(object.name.as_str(), object).is_some() {
                return Err(StoreError::DuplicateName(object.name.clone()).into());
            }
        }

        for (index, tween) in self.tweens.iter().enumerate() {
            if tween.targets.is_empty() {
                return Err(SceneError::EmptyTween {
                    tween: index,
                    reason: "没有目标".to_string(),
                });
            }
            if tween.props.is_empty() {
                return Err(SceneError::EmptyTween {
                    tween: index,
                    reason: "没有属性".to_string(),
                });
            }

            for name in &tween.targets {
                let object = objects.get(name.as_str()).ok_or_else(|| SceneError::UnknownObject {
                    tween: index,
                    name: name.clone(),
                })?;
                for prop in &tween.props {
                    if !object.properties.contains_key(&prop.property) {
                        return Err(SceneError::UnknownProperty {
                            tween: index,
                            object: name.clone(),
                            property: prop.property.clone(),
                        });
                    }
                }
            }

            for prop in &tween.props {
                prop.easing()?;
            }
        }
        Ok(())
    }

    /// 把对象注册进仓库
    pub fn register_objects(
        &self,
        store: &mut PropertyStore,
    ) -> Result<HashMap<String, TargetHandle>, SceneError> {
        let mut handles = HashMap::with_capacity(self.objects.len());
        for object in &self.objects {
            let handle = store.register(
                object.name.clone(),
                object.properties.iter().map(|(k, v)| (k.clone(), *v)),
            )?;
            handles.insert(object.name.clone(), handle);
        }
        Ok(handles)
    }

    /// 校验并注册对象，然后构建所有补间配置
    pub fn build(&self, store: &Rc<RefCell<PropertyStore>>) -> Result<Vec<SceneTween>, SceneError> {
        self.validate()?;
        let handles = self.register_objects(&mut store.borrow_mut())?;

        let mut built = Vec::with_capacity(self.tweens.len());
        for (index, tween) in self.tweens.iter().enumerate() {
            let mut config = TweenConfig::new()
                .with_loop(tween.loop_count)
                .with_loop_delay(tween.loop_delay)
                .with_complete_delay(tween.complete_delay)
                .with_paused(tween.paused)
                .with_time_scale(tween.time_scale);

            for name in &tween.targets {
                let handle = handles.get(name).copied().ok_or_else(|| SceneError::UnknownObject {
                    tween: index,
                    name: name.clone(),
                })?;
                config = config.target(handle);
            }
            for prop in &tween.props {
                config = config.entry(prop.entry(store)?);
            }

            debug!(
                scene = %self.name,
                tween = index,
                targets = tween.targets.len(),
                props = tween.props.len(),
                "构建补间"
            );
            built.push(SceneTween {
                index,
                config,
                play_at_frame: tween.play_at_frame,
            });
        }
        Ok(built)
    }
}

impl PropDef {
    fn easing(&self) -> Result<Easing, SceneError> {
        match &self.ease {
            Some(name) => Ok(name.parse::<Easing>()?),
            None => Ok(Easing::default()),
        }
    }

    /// 构建写入仓库的条目
    fn entry(&self, store: &Rc<RefCell<PropertyStore>>) -> Result<TweenEntry, SceneError> {
        let writer = Rc::clone(store);
        let property = self.property.clone();
        let mut entry = TweenEntry::new(self.from.unwrap_or(0.0), self.to, move |target, value| {
            if let Err(e) = writer.borrow_mut().set(target, &property, value) {
                debug!(error = %e, "属性写入被忽略");
            }
        })
        .with_ease(self.easing()?)
        .with_duration(self.duration)
        .with_hold(self.hold)
        .with_repeat(self.repeat)
        .with_repeat_delay(self.repeat_delay)
        .with_yoyo(self.yoyo);

        entry = match self.stagger {
            Some(step) => entry.with_delay(stagger_from(self.delay, step)),
            None => entry.with_delay(Param::Fixed(self.delay)),
        };

        if self.from.is_none() {
            // 每个成员只在首次渲染时读取一次，之后重播沿用同一起始值
            let reader = Rc::clone(store);
            let property = self.property.clone();
            let cache = RefCell::new(HashMap::new());
            entry = entry.with_get_start(move |ctx| {
                *cache.borrow_mut().entry(ctx.index).or_insert_with(|| {
                    reader.borrow().get(ctx.target, &property).unwrap_or(ctx.value)
                })
            });
        }

        if self.relative {
            let delta = self.to;
            entry = entry.with_get_end(move |ctx| ctx.value + delta);
        }

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "objects": [
            { "name": "a", "properties": { "x": 10 } },
            { "name": "b", "properties": { "x": 20, "y": 0 } }
        ],
        "tweens": [
            {
                "targets": ["a", "b"],
                "props": [{ "property": "x", "to": 100, "ease": "Quad.easeOut", "stagger": 50 }],
                "loop": 2
            }
        ]
    }"#;

    #[test]
    fn test_parse_defaults() {
        let scene = SceneFile::from_json(SCENE).unwrap();
        let prop = &scene.tweens[0].props[0];
        assert_eq!(prop.duration, 1000.0);
        assert_eq!(prop.from, None);
        assert_eq!(scene.tweens[0].loop_count, 2);
        assert_eq!(scene.tweens[0].time_scale, 1.0);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn test_unknown_object() {
        let mut scene = SceneFile::from_json(SCENE).unwrap();
        scene.tweens[0].targets.push("ghost".to_string());
        assert!(matches!(
            scene.validate(),
            Err(SceneError::UnknownObject { tween: 0, ref name }) if name == "ghost"
        ));
    }

    #[test]
    fn test_unknown_property() {
        let mut scene = SceneFile::from_json(SCENE).unwrap();
        scene.tweens[0].props[0].property = "y".to_string();
        // a 没有 y
        assert!(matches!(
            scene.validate(),
            Err(SceneError::UnknownProperty { ref object, .. }) if object == "a"
        ));
    }

    #[test]
    fn test_bad_ease_name() {
        let mut scene = SceneFile::from_json(SCENE).unwrap();
        scene.tweens[0].props[0].ease = Some("Wobble.easeIn".to_string());
        assert!(matches!(scene.validate(), Err(SceneError::Tween(_))));
    }

    #[test]
    fn test_duplicate_object() {
        let mut scene = SceneFile::from_json(SCENE).unwrap();
        scene.objects.push(scene.objects[0].clone());
        assert!(matches!(scene.validate(), Err(SceneError::Store(_))));
    }

    #[test]
    fn test_build_registers_objects() {
        let scene = SceneFile::from_json(SCENE).unwrap();
        let store = Rc::new(RefCell::new(PropertyStore::new()));
        let built = scene.build(&store).unwrap();

        assert_eq!(built.len(), 1);
        assert_eq!(built[0].config.targets.len(), 2);
        assert_eq!(store.borrow().len(), 2);
        let a = store.borrow().find("a").unwrap();
        assert_eq!(store.borrow().get(a, "x"), Ok(10.0));
    }
}
