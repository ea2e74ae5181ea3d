//! # Event 模块
//!
//! 补间事件与监听器。
//!
//! 补间级事件（active、start、loop、complete、stop、remove）不带负载，
//! 目标列表可通过 `tween.targets()` 获取；条目级事件（update、repeat、yoyo）
//! 携带 [`EntryEvent`]。
//!
//! 派发时先对监听器列表做快照，再逐个检查存活后调用：
//! 回调中移除的监听器不会在本轮之后被调用。

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::target::TargetHandle;
use crate::tween::Tween;

/// 回调签名：接收补间本身，可在回调内暂停、停止或移除它
pub type TweenCallback = Rc<dyn Fn(&mut Tween, &TweenEvent)>;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TweenEventKind {
    Active,
    Start,
    Update,
    Repeat,
    Yoyo,
    Loop,
    Complete,
    Stop,
    Remove,
}

impl TweenEventKind {
    pub const ALL: [TweenEventKind; 9] = [
        TweenEventKind::Active,
        TweenEventKind::Start,
        TweenEventKind::Update,
        TweenEventKind::Repeat,
        TweenEventKind::Yoyo,
        TweenEventKind::Loop,
        TweenEventKind::Complete,
        TweenEventKind::Stop,
        TweenEventKind::Remove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TweenEventKind::Active => "active",
            TweenEventKind::Start => "start",
            TweenEventKind::Update => "update",
            TweenEventKind::Repeat => "repeat",
            TweenEventKind::Yoyo => "yoyo",
            TweenEventKind::Loop => "loop",
            TweenEventKind::Complete => "complete",
            TweenEventKind::Stop => "stop",
            TweenEventKind::Remove => "remove",
        }
    }
}

impl fmt::Display for TweenEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 条目级事件负载
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryEvent {
    pub target: TargetHandle,
    /// TweenData 在补间中的位置
    pub index: usize,
    pub current: f64,
    pub previous: f64,
}

/// 补间事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenEvent {
    Active,
    Start,
    Update(EntryEvent),
    Repeat(EntryEvent),
    Yoyo(EntryEvent),
    Loop,
    Complete,
    Stop,
    Remove,
}

impl TweenEvent {
    /// 事件类型
    pub fn kind(&self) -> TweenEventKind {
        match self {
            TweenEvent::Active => TweenEventKind::Active,
            TweenEvent::Start => TweenEventKind::Start,
            TweenEvent::Update(_) => TweenEventKind::Update,
            TweenEvent::Repeat(_) => TweenEventKind::Repeat,
            TweenEvent::Yoyo(_) => TweenEventKind::Yoyo,
            TweenEvent::Loop => TweenEventKind::Loop,
            TweenEvent::Complete => TweenEventKind::Complete,
            TweenEvent::Stop => TweenEventKind::Stop,
            TweenEvent::Remove => TweenEventKind::Remove,
        }
    }

    /// 条目级负载
    pub fn entry(&self) -> Option<&EntryEvent> {
        match self {
            TweenEvent::Update(e) | TweenEvent::Repeat(e) | TweenEvent::Yoyo(e) => Some(e),
            _ => None,
        }
    }
}

/// 监听器 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

struct Listener {
    id: ListenerId,
    kind: TweenEventKind,
    callback: TweenCallback,
    once: bool,
}

/// 事件监听器表
#[derive(Default)]
pub struct EventEmitter {
    listeners: Vec<Listener>,
    next_id: u64,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, kind: TweenEventKind, callback: TweenCallback, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            kind,
            callback,
            once,
        });
        id
    }

    /// 注册监听器
    pub fn on(&mut self, kind: TweenEventKind, callback: TweenCallback) -> ListenerId {
        self.insert(kind, callback, false)
    }

    /// 注册一次性监听器
    pub fn once(&mut self, kind: TweenEventKind, callback: TweenCallback) -> ListenerId {
        self.insert(kind, callback, true)
    }

    /// 移除监听器，返回是否存在
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// 移除监听器；`kind` 为 `None` 时移除全部
    pub fn remove_all(&mut self, kind: Option<TweenEventKind>) {
        match kind {
            Some(kind) => self.listeners.retain(|l| l.kind != kind),
            None => self.listeners.clear(),
        }
    }

    /// 指定事件的监听器数量
    pub fn listener_count(&self, kind: TweenEventKind) -> usize {
        self.listeners.iter().filter(|l| l.kind == kind).count()
    }

    /// 监听器是否仍然存在
    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|l| l.id == id)
    }

    /// 派发前的快照
    pub(crate) fn snapshot(&self, kind: TweenEventKind) -> Vec<(ListenerId, TweenCallback, bool)> {
        self.listeners
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| (l.id, l.callback.clone(), l.once))
            .collect()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TweenCallback {
        Rc::new(|_: &mut Tween, _: &TweenEvent| {})
    }

    #[test]
    fn test_on_off() {
        let mut emitter = EventEmitter::new();
        let a = emitter.on(TweenEventKind::Update, noop());
        let b = emitter.once(TweenEventKind::Update, noop());
        let c = emitter.on(TweenEventKind::Complete, noop());

        assert_eq!(emitter.listener_count(TweenEventKind::Update), 2);
        assert!(emitter.off(a));
        // 重复移除返回 false
        assert!(!emitter.off(a));
        assert!(emitter.contains(b));
        assert!(emitter.contains(c));

        let snap = emitter.snapshot(TweenEventKind::Update);
        assert_eq!(snap.len(), 1);
        assert!(snap[0].2);
    }

    #[test]
    fn test_remove_all() {
        let mut emitter = EventEmitter::new();
        emitter.on(TweenEventKind::Update, noop());
        emitter.on(TweenEventKind::Stop, noop());

        emitter.remove_all(Some(TweenEventKind::Update));
        assert_eq!(emitter.listener_count(TweenEventKind::Update), 0);
        assert_eq!(emitter.listener_count(TweenEventKind::Stop), 1);

        emitter.remove_all(None);
        assert_eq!(emitter.listener_count(TweenEventKind::Stop), 0);
    }

    #[test]
    fn test_event_kind() {
        let entry = EntryEvent {
            target: TargetHandle::new(0, 0),
            index: 0,
            current: 1.0,
            previous: 0.5,
        };
        assert_eq!(TweenEvent::Yoyo(entry).kind(), TweenEventKind::Yoyo);
        assert_eq!(TweenEvent::Yoyo(entry).entry(), Some(&entry));
        assert_eq!(TweenEvent::Complete.entry(), None);
        assert_eq!(TweenEventKind::Complete.to_string(), "complete");
        assert_eq!(
            serde_json::to_string(&TweenEventKind::Repeat).unwrap(),
            "\"repeat\""
        );
    }
}
