//! # Config 模块
//!
//! 补间配置：[`TweenEntry`] 描述单个属性的插值，[`TweenConfig`] 描述整个补间。
//!
//! 所有时间值单位与驱动方传入的 `delta` 一致（参考配置下为毫秒）。
//! 时长、延迟等既可以是固定值，也可以是按目标求值的生成器（[`Param::Dynamic`]），
//! 交错动画（stagger）就是用后者构造的。

use std::fmt;
use std::rc::Rc;

use crate::easing::Ease;
use crate::event::{TweenCallback, TweenEvent, TweenEventKind};
use crate::target::TargetHandle;
use crate::tween::Tween;

/// 写入回调：把插值结果提交给目标
pub type Action = Rc<dyn Fn(TargetHandle, f64)>;

/// 值生成器
pub type ValueGenerator = Rc<dyn Fn(&GenContext) -> f64>;

/// 翻转回调：在 yoyo / repeat 边界切换目标的翻转状态
pub type FlipToggle = Rc<dyn Fn(TargetHandle, FlipAxis)>;

/// 翻转轴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    X,
    Y,
}

/// 生成器上下文
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenContext {
    /// 当前目标
    pub target: TargetHandle,
    /// 输入值：时间生成器为 0，起止值生成器为当前值
    pub value: f64,
    /// TweenData 在补间中的位置
    pub index: usize,
    /// 目标在补间目标列表中的位置
    pub target_index: usize,
    /// 目标总数
    pub target_count: usize,
}

/// 固定值或按目标求值的参数
#[derive(Clone)]
pub enum Param<T> {
    Fixed(T),
    Dynamic(Rc<dyn Fn(&GenContext) -> T>),
}

impl<T: Copy> Param<T> {
    /// 从闭包创建动态参数
    pub fn dynamic(f: impl Fn(&GenContext) -> T + 'static) -> Self {
        Param::Dynamic(Rc::new(f))
    }

    /// 求值
    pub fn resolve(&self, ctx: &GenContext) -> T {
        match self {
            Param::Fixed(v) => *v,
            Param::Dynamic(f) => f(ctx),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Fixed(v) => write!(f, "Fixed({:?})", v),
            Param::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

impl From<f64> for Param<f64> {
    fn from(value: f64) -> Self {
        Param::Fixed(value)
    }
}

impl From<i32> for Param<i32> {
    fn from(value: i32) -> Self {
        Param::Fixed(value)
    }
}

/// 交错延迟：第 n 个目标延迟 `n * step`
pub fn stagger(step: f64) -> Param<f64> {
    stagger_from(0.0, step)
}

/// 交错延迟：第 n 个目标延迟 `start + n * step`
pub fn stagger_from(start: f64, step: f64) -> Param<f64> {
    Param::dynamic(move |ctx| start + ctx.target_index as f64 * step)
}

/// 单个属性条目
#[derive(Clone)]
pub struct TweenEntry {
    pub from: f64,
    pub to: f64,
    pub action: Action,
    pub ease: Ease,
    pub duration: Param<f64>,
    pub delay: Param<f64>,
    pub hold: Param<f64>,
    /// 重复次数，-1 为无限
    pub repeat: Param<i32>,
    pub repeat_delay: Param<f64>,
    pub yoyo: bool,
    pub flip_x: bool,
    pub flip_y: bool,
    pub flip: Option<FlipToggle>,
    /// 激活时（reset）立即写入目标的值
    pub get_active: Option<ValueGenerator>,
    /// 每次重播时重新计算起始值
    pub get_start: Option<ValueGenerator>,
    /// 每次重播时重新计算结束值
    pub get_end: Option<ValueGenerator>,
}

impl TweenEntry {
    /// 默认时长
    pub const DEFAULT_DURATION: f64 = 1000.0;

    /// 创建条目
    pub fn new(from: f64, to: f64, action: impl Fn(TargetHandle, f64) + 'static) -> Self {
        Self {
            from,
            to,
            action: Rc::new(action),
            ease: Ease::default(),
            duration: Param::Fixed(Self::DEFAULT_DURATION),
            delay: Param::Fixed(0.0),
            hold: Param::Fixed(0.0),
            repeat: Param::Fixed(0),
            repeat_delay: Param::Fixed(0.0),
            yoyo: false,
            flip_x: false,
            flip_y: false,
            flip: None,
            get_active: None,
            get_start: None,
            get_end: None,
        }
    }

    /// 计数器条目：不写入任何目标，值通过 `Tween::counter_value` 读取
    pub fn counter(from: f64, to: f64) -> Self {
        Self::new(from, to, |_, _| {})
    }

    pub fn with_ease(mut self, ease: impl Into<Ease>) -> Self {
        self.ease = ease.into();
        self
    }

    pub fn with_duration(mut self, duration: impl Into<Param<f64>>) -> Self {
        self.duration = duration.into();
        self
    }

    pub fn with_delay(mut self, delay: impl Into<Param<f64>>) -> Self {
        self.delay = delay.into();
        self
    }

    pub fn with_hold(mut self, hold: impl Into<Param<f64>>) -> Self {
        self.hold = hold.into();
        self
    }

    pub fn with_repeat(mut self, repeat: impl Into<Param<i32>>) -> Self {
        self.repeat = repeat.into();
        self
    }

    pub fn with_repeat_delay(mut self, repeat_delay: impl Into<Param<f64>>) -> Self {
        self.repeat_delay = repeat_delay.into();
        self
    }

    pub fn with_yoyo(mut self, yoyo: bool) -> Self {
        self.yoyo = yoyo;
        self
    }

    /// 设置翻转回调以及需要翻转的轴
    pub fn with_flip(
        mut self,
        flip_x: bool,
        flip_y: bool,
        toggle: impl Fn(TargetHandle, FlipAxis) + 'static,
    ) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self.flip = Some(Rc::new(toggle));
        self
    }

    pub fn with_get_active(mut self, f: impl Fn(&GenContext) -> f64 + 'static) -> Self {
        self.get_active = Some(Rc::new(f));
        self
    }

    pub fn with_get_start(mut self, f: impl Fn(&GenContext) -> f64 + 'static) -> Self {
        self.get_start = Some(Rc::new(f));
        self
    }

    pub fn with_get_end(mut self, f: impl Fn(&GenContext) -> f64 + 'static) -> Self {
        self.get_end = Some(Rc::new(f));
        self
    }
}

impl fmt::Debug for TweenEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TweenEntry")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("ease", &self.ease)
            .field("duration", &self.duration)
            .field("delay", &self.delay)
            .field("hold", &self.hold)
            .field("repeat", &self.repeat)
            .field("repeat_delay", &self.repeat_delay)
            .field("yoyo", &self.yoyo)
            .finish_non_exhaustive()
    }
}

/// 补间生命周期回调
///
/// 每种事件最多一个回调，在事件监听器之后调用。
#[derive(Clone, Default)]
pub struct TweenCallbacks {
    pub on_active: Option<TweenCallback>,
    pub on_start: Option<TweenCallback>,
    pub on_update: Option<TweenCallback>,
    pub on_repeat: Option<TweenCallback>,
    pub on_yoyo: Option<TweenCallback>,
    pub on_loop: Option<TweenCallback>,
    pub on_complete: Option<TweenCallback>,
    pub on_stop: Option<TweenCallback>,
}

impl TweenCallbacks {
    /// 获取事件对应的回调
    pub fn get(&self, kind: TweenEventKind) -> Option<&TweenCallback> {
        match kind {
            TweenEventKind::Active => self.on_active.as_ref(),
            TweenEventKind::Start => self.on_start.as_ref(),
            TweenEventKind::Update => self.on_update.as_ref(),
            TweenEventKind::Repeat => self.on_repeat.as_ref(),
            TweenEventKind::Yoyo => self.on_yoyo.as_ref(),
            TweenEventKind::Loop => self.on_loop.as_ref(),
            TweenEventKind::Complete => self.on_complete.as_ref(),
            TweenEventKind::Stop => self.on_stop.as_ref(),
            TweenEventKind::Remove => None,
        }
    }

    fn slot(&mut self, kind: TweenEventKind) -> Option<&mut Option<TweenCallback>> {
        match kind {
            TweenEventKind::Active => Some(&mut self.on_active),
            TweenEventKind::Start => Some(&mut self.on_start),
            TweenEventKind::Update => Some(&mut self.on_update),
            TweenEventKind::Repeat => Some(&mut self.on_repeat),
            TweenEventKind::Yoyo => Some(&mut self.on_yoyo),
            TweenEventKind::Loop => Some(&mut self.on_loop),
            TweenEventKind::Complete => Some(&mut self.on_complete),
            TweenEventKind::Stop => Some(&mut self.on_stop),
            TweenEventKind::Remove => None,
        }
    }
}

impl fmt::Debug for TweenCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = TweenEventKind::ALL
            .iter()
            .filter(|k| self.get(**k).is_some())
            .map(|k| k.as_str())
            .collect();
        f.debug_tuple("TweenCallbacks").field(&set).finish()
    }
}

/// 补间配置
#[derive(Clone, Debug)]
pub struct TweenConfig {
    pub targets: Vec<TargetHandle>,
    pub entries: Vec<TweenEntry>,
    pub complete_delay: f64,
    /// 整体循环次数，-1 为无限
    pub loop_count: i32,
    pub loop_delay: f64,
    /// 以暂停状态创建，需要 `play()` 才会开始
    pub paused: bool,
    pub time_scale: f64,
    pub callbacks: TweenCallbacks,
}

impl Default for TweenConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            entries: Vec::new(),
            complete_delay: 0.0,
            loop_count: 0,
            loop_delay: 0.0,
            paused: false,
            time_scale: 1.0,
            callbacks: TweenCallbacks::default(),
        }
    }
}

impl TweenConfig {
    /// 创建空配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 单目标、单条目
    pub fn single(target: TargetHandle, entry: TweenEntry) -> Self {
        Self::new().target(target).entry(entry)
    }

    /// 计数器补间
    pub fn counter(entry: TweenEntry) -> Self {
        Self::new().target(TargetHandle::DETACHED).entry(entry)
    }

    /// 添加目标
    pub fn target(mut self, target: TargetHandle) -> Self {
        self.targets.push(target);
        self
    }

    /// 批量添加目标
    pub fn targets(mut self, targets: impl IntoIterator<Item = TargetHandle>) -> Self {
        self.targets.extend(targets);
        self
    }

    /// 添加条目
    pub fn entry(mut self, entry: TweenEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_loop(mut self, loop_count: i32) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn with_loop_delay(mut self, loop_delay: f64) -> Self {
        self.loop_delay = loop_delay;
        self
    }

    pub fn with_complete_delay(mut self, complete_delay: f64) -> Self {
        self.complete_delay = complete_delay;
        self
    }

    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale;
        self
    }

    /// 设置指定事件的回调（`Remove` 没有回调槽，会被忽略）
    pub fn with_callback(
        mut self,
        kind: TweenEventKind,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> Self {
        if let Some(slot) = self.callbacks.slot(kind) {
            *slot = Some(Rc::new(f));
        }
        self
    }

    pub fn on_active(
        self,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> Self {
        self.with_callback(TweenEventKind::Active, f)
    }

    pub fn on_start(
        self,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> Self {
        self.with_callback(TweenEventKind::Start, f)
    }

    pub fn on_update(
        self,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> Self {
        self.with_callback(TweenEventKind::Update, f)
    }

    pub fn on_repeat(
        self,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> Self {
        self.with_callback(TweenEventKind::Repeat, f)
    }

    pub fn on_yoyo(
        self,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> Self {
        self.with_callback(TweenEventKind::Yoyo, f)
    }

    pub fn on_loop(
        self,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> Self {
        self.with_callback(TweenEventKind::Loop, f)
    }

    pub fn on_complete(
        self,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> Self {
        self.with_callback(TweenEventKind::Complete, f)
    }

    pub fn on_stop(
        self,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> Self {
        self.with_callback(TweenEventKind::Stop, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::Easing;

    fn ctx(target_index: usize) -> GenContext {
        GenContext {
            target: TargetHandle::new(target_index as u32, 0),
            value: 0.0,
            index: target_index,
            target_index,
            target_count: 4,
        }
    }

    #[test]
    fn test_param_resolve() {
        let fixed: Param<f64> = 250.0.into();
        assert_eq!(fixed.resolve(&ctx(2)), 250.0);

        let dynamic = Param::dynamic(|c: &GenContext| c.target_count as i32 - 1);
        assert_eq!(dynamic.resolve(&ctx(0)), 3);
    }

    #[test]
    fn test_stagger() {
        let delay = stagger(100.0);
        assert_eq!(delay.resolve(&ctx(0)), 0.0);
        assert_eq!(delay.resolve(&ctx(3)), 300.0);

        let delay = stagger_from(50.0, 25.0);
        assert_eq!(delay.resolve(&ctx(2)), 100.0);
    }

    #[test]
    fn test_entry_defaults() {
        let entry = TweenEntry::counter(0.0, 1.0);
        assert_eq!(entry.duration.resolve(&ctx(0)), TweenEntry::DEFAULT_DURATION);
        assert_eq!(entry.repeat.resolve(&ctx(0)), 0);
        assert!(!entry.yoyo);
        assert!(matches!(entry.ease, Ease::Named(Easing::Linear)));
    }

    #[test]
    fn test_config_builders() {
        let config = TweenConfig::counter(TweenEntry::counter(0.0, 10.0))
            .with_loop(-1)
            .with_paused(true)
            .on_complete(|_, _| {});

        assert_eq!(config.targets, vec![TargetHandle::DETACHED]);
        assert_eq!(config.loop_count, -1);
        assert!(config.paused);
        assert_eq!(config.time_scale, 1.0);
        assert!(config.callbacks.get(TweenEventKind::Complete).is_some());
        assert!(config.callbacks.get(TweenEventKind::Start).is_none());
    }
}
