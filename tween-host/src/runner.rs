//! # Runner 模块
//!
//! 以固定步长驱动补间管理器，直到所有补间结束或达到帧数上限，
//! 并记录属性采样与事件日志。
//!
//! 每帧顺序：到期的定时播放 → `pre_update` → `update` → 采样。

use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeMap;
use std::mem;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tween_runtime::{TweenConfig, TweenEventKind, TweenHandle, TweenId, TweenManager};

use crate::config::HostConfig;
use crate::error::SceneError;
use crate::scene::SceneFile;
use crate::store::PropertyStore;

/// 单帧的属性采样
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    pub frame: u64,
    pub time: f64,
    /// 对象名 → 属性名 → 值
    pub values: BTreeMap<String, BTreeMap<String, f64>>,
}

/// 事件记录（不含逐帧的 update 事件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub frame: u64,
    pub time: f64,
    pub tween: TweenId,
    pub event: TweenEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// 运行轨迹
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub scene: String,
    pub frame_delta_ms: f64,
    /// 实际运行的帧数
    pub frames: u64,
    pub time: f64,
    /// 是否在帧数上限前全部结束
    pub finished: bool,
    pub samples: Vec<FrameSample>,
    pub events: Vec<EventRecord>,
}

impl Trace {
    /// 最后一次采样中的属性值
    pub fn final_value(&self, object: &str, property: &str) -> Option<f64> {
        self.samples
            .last()
            .and_then(|s| s.values.get(object))
            .and_then(|props| props.get(property))
            .copied()
    }

    /// 某类事件的记录
    pub fn events_of(&self, kind: TweenEventKind) -> impl Iterator<Item = &EventRecord> {
        self.events.iter().filter(move |e| e.event == kind)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Clock {
    frame: u64,
    time: f64,
}

/// 场景运行器
pub struct Runner {
    config: HostConfig,
    store: Rc<RefCell<PropertyStore>>,
    manager: TweenManager,
    clock: Rc<Cell<Clock>>,
    events: Rc<RefCell<Vec<EventRecord>>>,
    /// (开始播放的帧, 补间)
    scheduled: Vec<(u64, TweenHandle)>,
    samples: Vec<FrameSample>,
    scene: String,
}

impl Runner {
    pub fn new(config: HostConfig) -> Self {
        let manager = TweenManager::new();
        manager.set_global_time_scale(config.time_scale);
        Self {
            config,
            store: Rc::new(RefCell::new(PropertyStore::new())),
            manager,
            clock: Rc::new(Cell::new(Clock::default())),
            events: Rc::new(RefCell::new(Vec::new())),
            scheduled: Vec::new(),
            samples: Vec::new(),
            scene: String::new(),
        }
    }

    /// 载入场景：注册对象并把补间加入管理器
    pub fn load(&mut self, scene: &SceneFile) -> Result<Vec<TweenHandle>, SceneError> {
        let built = scene.build(&self.store)?;
        self.scene = scene.name.clone();

        let mut handles = Vec::with_capacity(built.len());
        for tween in built {
            let handle = self.manager.add(self.with_recorder(tween.config));
            if let Some(frame) = tween.play_at_frame {
                self.scheduled.push((frame, handle.clone()));
            }
            debug!(scene = %self.scene, index = tween.index, tween = %handle.id(), "补间已加入");
            handles.push(handle);
        }

        info!(
            scene = %self.scene,
            objects = self.store.borrow().len(),
            tweens = handles.len(),
            "场景已载入"
        );
        Ok(handles)
    }

    /// 给配置挂上事件记录回调
    fn with_recorder(&self, mut config: TweenConfig) -> TweenConfig {
        for kind in TweenEventKind::ALL {
            if kind == TweenEventKind::Update {
                continue;
            }
            let clock = Rc::clone(&self.clock);
            let events = Rc::clone(&self.events);
            let store = Rc::clone(&self.store);
            config = config.with_callback(kind, move |tween, event| {
                let now = clock.get();
                let entry = event.entry();
                let target =
                    entry.and_then(|e| store.borrow().name_of(e.target).map(str::to_string));
                events.borrow_mut().push(EventRecord {
                    frame: now.frame,
                    time: now.time,
                    tween: tween.id(),
                    event: event.kind(),
                    target,
                    index: entry.map(|e| e.index),
                    value: entry.map(|e| e.current),
                });
            });
        }
        config
    }

    pub fn manager(&self) -> &TweenManager {
        &self.manager
    }

    pub fn store(&self) -> Ref<'_, PropertyStore> {
        self.store.borrow()
    }

    pub fn frame(&self) -> u64 {
        self.clock.get().frame
    }

    pub fn time(&self) -> f64 {
        self.clock.get().time
    }

    /// 当前已记录的事件
    pub fn events(&self) -> Ref<'_, Vec<EventRecord>> {
        self.events.borrow()
    }

    /// 没有补间，也没有等待播放的定时项
    pub fn is_done(&self) -> bool {
        self.manager.is_idle() && self.scheduled.is_empty()
    }

    /// 推进一帧
    pub fn step(&mut self) {
        let delta = self.config.frame_delta_ms;
        let mut clock = self.clock.get();
        clock.frame += 1;
        clock.time += delta;
        self.clock.set(clock);

        self.scheduled.retain(|(frame, handle)| {
            if *frame > clock.frame {
                return true;
            }
            handle.borrow_mut().play();
            debug!(tween = %handle.id(), frame = clock.frame, "定时播放");
            false
        });

        self.manager.pre_update(clock.time, delta);
        self.manager.update(clock.time, delta);
    }

    fn sample(&mut self) {
        let clock = self.clock.get();
        self.samples.push(FrameSample {
            frame: clock.frame,
            time: clock.time,
            values: self.store.borrow().snapshot(),
        });
    }

    /// 运行到结束或帧数上限，返回轨迹
    pub fn run(mut self) -> Trace {
        self.sample();

        while self.frame() < self.config.max_frames {
            self.step();
            if self.frame() % self.config.sample_every == 0 {
                self.sample();
            }
            if self.is_done() {
                break;
            }
        }

        if self.samples.last().map(|s| s.frame) != Some(self.frame()) {
            self.sample();
        }

        let finished = self.is_done();
        let clock = self.clock.get();
        info!(
            scene = %self.scene,
            frames = clock.frame,
            finished,
            events = self.events.borrow().len(),
            "场景运行结束"
        );

        Trace {
            scene: mem::take(&mut self.scene),
            frame_delta_ms: self.config.frame_delta_ms,
            frames: clock.frame,
            time: clock.time,
            finished,
            samples: mem::take(&mut self.samples),
            events: mem::take(&mut *self.events.borrow_mut()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(delta: f64) -> HostConfig {
        HostConfig {
            frame_delta_ms: delta,
            ..HostConfig::default()
        }
    }

    const LINEAR: &str = r#"{
        "name": "linear",
        "objects": [{ "name": "box", "properties": { "x": 0 } }],
        "tweens": [{ "targets": ["box"], "props": [{ "property": "x", "from": 0, "to": 100, "duration": 100 }] }]
    }"#;

    #[test]
    fn test_run_linear() {
        let scene = SceneFile::from_json(LINEAR).unwrap();
        let mut runner = Runner::new(config(25.0));
        runner.load(&scene).unwrap();
        let trace = runner.run();

        assert!(trace.finished);
        assert_eq!(trace.final_value("box", "x"), Some(100.0));
        // 采样包括第 0 帧
        assert_eq!(trace.samples[0].frame, 0);
        assert_eq!(trace.samples[1].values["box"]["x"], 25.0);
    }

    #[test]
    fn test_step_by_step() {
        let scene = SceneFile::from_json(LINEAR).unwrap();
        let mut runner = Runner::new(config(50.0));
        runner.load(&scene).unwrap();

        runner.step();
        let h = runner.store().find("box").unwrap();
        assert_eq!(runner.store().get(h, "x"), Ok(50.0));
        assert_eq!(runner.frame(), 1);
        assert_eq!(runner.time(), 50.0);
    }

    #[test]
    fn test_event_log_skips_update() {
        let scene = SceneFile::from_json(LINEAR).unwrap();
        let mut runner = Runner::new(config(25.0));
        runner.load(&scene).unwrap();
        let trace = runner.run();

        assert_eq!(trace.events_of(TweenEventKind::Update).count(), 0);
        let kinds: Vec<TweenEventKind> = trace.events.iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![
                TweenEventKind::Active,
                TweenEventKind::Start,
                TweenEventKind::Complete
            ]
        );
    }

    #[test]
    fn test_frame_limit() {
        let scene = SceneFile::from_json(LINEAR).unwrap();
        let mut runner = Runner::new(HostConfig {
            frame_delta_ms: 10.0,
            max_frames: 3,
            ..HostConfig::default()
        });
        runner.load(&scene).unwrap();
        let trace = runner.run();

        assert!(!trace.finished);
        assert_eq!(trace.frames, 3);
        assert_eq!(trace.final_value("box", "x"), Some(30.0));
    }
}
