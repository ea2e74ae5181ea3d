//! # Data 模块
//!
//! [`TweenData`]：一个（目标，条目）对的计时与插值单元。
//!
//! TweenData 只保存数据和少量纯计算；每帧的状态推进由所属的
//! `Tween` 负责（见 `tween::step`），因为推进过程需要派发补间事件。

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{Action, FlipAxis, FlipToggle, GenContext, Param, TweenEntry, ValueGenerator};
use crate::easing::Ease;
use crate::event::EntryEvent;
use crate::target::TargetHandle;

/// 无限重复的计数器哨兵值，永不递减
pub const REPEAT_FOREVER: u32 = u32::MAX;

/// TweenData 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TweenDataState {
    /// 刚创建，尚未 reset
    #[default]
    Created,
    /// 等待起始延迟
    Delay,
    /// 下一步渲染起始值
    PendingRender,
    /// 正向播放
    PlayingForward,
    /// 反向播放（yoyo）
    PlayingBackward,
    /// 在结束值处停留
    HoldDelay,
    /// 等待下一次重复
    RepeatDelay,
    /// 已完成
    Complete,
}

impl TweenDataState {
    /// 是否仍在运行（未完成）
    pub fn is_running(&self) -> bool {
        !matches!(self, Self::Complete)
    }

    /// 是否正在插值
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::PlayingForward | Self::PlayingBackward)
    }
}

/// 时长规整：非有限值或小于 1 的值按 1 处理
pub(crate) fn normalize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration >= 1.0 {
        duration
    } else {
        warn!(duration, "非法时长，按 1 处理");
        1.0
    }
}

/// 延迟类参数规整：负数与 NaN 按 0 处理
pub(crate) fn non_negative(value: f64) -> f64 {
    if value >= 0.0 {
        value
    } else {
        warn!(value, "非法延迟，按 0 处理");
        0.0
    }
}

/// 饱和减法：结果不小于 0
pub(crate) fn sub_saturating(a: f64, b: f64) -> f64 {
    (a - b).max(0.0)
}

/// 把配置中的重复次数转换为计数器
pub(crate) fn counter_from(repeat: i32) -> u32 {
    match repeat {
        -1 => REPEAT_FOREVER,
        r if r < 0 => {
            warn!(repeat = r, "非法重复次数，按 0 处理");
            0
        }
        r => r as u32,
    }
}

/// 计数器递减；无限计数器保持不变
pub(crate) fn step_down(counter: &mut u32) {
    if *counter != REPEAT_FOREVER && *counter > 0 {
        *counter -= 1;
    }
}

#[derive(Clone)]
struct TimingGen {
    duration: Param<f64>,
    delay: Param<f64>,
    hold: Param<f64>,
    repeat: Param<i32>,
    repeat_delay: Param<f64>,
}

/// 单个（目标，条目）的插值单元
#[derive(Clone)]
pub struct TweenData {
    pub(crate) target: TargetHandle,
    pub(crate) index: usize,
    pub(crate) target_index: usize,
    pub(crate) target_count: usize,
    pub(crate) entry_index: usize,

    pub(crate) from: f64,
    pub(crate) to: f64,
    pub(crate) start: f64,
    pub(crate) end: f64,
    pub(crate) current: f64,
    pub(crate) previous: f64,

    pub(crate) action: Action,
    pub(crate) ease: Ease,

    pub(crate) duration: f64,
    pub(crate) delay: f64,
    pub(crate) hold: f64,
    pub(crate) repeat: i32,
    pub(crate) repeat_delay: f64,
    pub(crate) t1: f64,
    pub(crate) t2: f64,
    pub(crate) total_duration: f64,

    pub(crate) yoyo: bool,
    pub(crate) flip_x: bool,
    pub(crate) flip_y: bool,
    flip: Option<FlipToggle>,

    pub(crate) elapsed: f64,
    pub(crate) progress: f64,
    pub(crate) repeat_counter: u32,
    pub(crate) state: TweenDataState,

    timing: TimingGen,
    get_active: Option<ValueGenerator>,
    get_start: Option<ValueGenerator>,
    get_end: Option<ValueGenerator>,
}

impl TweenData {
    /// 从条目构造
    pub(crate) fn new(
        target: TargetHandle,
        index: usize,
        target_index: usize,
        target_count: usize,
        entry_index: usize,
        entry: &TweenEntry,
    ) -> Self {
        let mut data = Self {
            target,
            index,
            target_index,
            target_count,
            entry_index,
            from: entry.from,
            to: entry.to,
            start: entry.from,
            end: entry.to,
            current: entry.from,
            previous: entry.from,
            action: entry.action.clone(),
            ease: entry.ease.clone(),
            duration: 1.0,
            delay: 0.0,
            hold: 0.0,
            repeat: 0,
            repeat_delay: 0.0,
            t1: 0.0,
            t2: 0.0,
            total_duration: 0.0,
            yoyo: entry.yoyo,
            flip_x: entry.flip_x,
            flip_y: entry.flip_y,
            flip: entry.flip.clone(),
            elapsed: 0.0,
            progress: 0.0,
            repeat_counter: 0,
            state: TweenDataState::Created,
            timing: TimingGen {
                duration: entry.duration.clone(),
                delay: entry.delay.clone(),
                hold: entry.hold.clone(),
                repeat: entry.repeat.clone(),
                repeat_delay: entry.repeat_delay.clone(),
            },
            get_active: entry.get_active.clone(),
            get_start: entry.get_start.clone(),
            get_end: entry.get_end.clone(),
        };
        data.resolve_timing();
        data.calc_duration();
        data
    }

    // ============ 只读访问 ============

    pub fn target(&self) -> TargetHandle {
        self.target
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    /// 对应的配置条目位置
    pub fn entry_index(&self) -> usize {
        self.entry_index
    }

    pub fn from(&self) -> f64 {
        self.from
    }

    pub fn to(&self) -> f64 {
        self.to
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn previous(&self) -> f64 {
        self.previous
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn hold(&self) -> f64 {
        self.hold
    }

    pub fn repeat(&self) -> i32 {
        self.repeat
    }

    pub fn repeat_delay(&self) -> f64 {
        self.repeat_delay
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn yoyo(&self) -> bool {
        self.yoyo
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// 剩余重复次数（无限重复时为 [`REPEAT_FOREVER`]）
    pub fn repeat_counter(&self) -> u32 {
        self.repeat_counter
    }

    pub fn state(&self) -> TweenDataState {
        self.state
    }

    // ============ 计算 ============

    pub(crate) fn context(&self, value: f64) -> GenContext {
        GenContext {
            target: self.target,
            value,
            index: self.index,
            target_index: self.target_index,
            target_count: self.target_count,
        }
    }

    /// 对时间参数求值并规整
    pub(crate) fn resolve_timing(&mut self) {
        let ctx = self.context(0.0);
        self.delay = non_negative(self.timing.delay.resolve(&ctx));
        self.duration = normalize_duration(self.timing.duration.resolve(&ctx));
        self.hold = non_negative(self.timing.hold.resolve(&ctx));
        self.repeat = self.timing.repeat.resolve(&ctx);
        self.repeat_delay = non_negative(self.timing.repeat_delay.resolve(&ctx));
    }

    /// 计算 t1、t2 与总时长
    pub(crate) fn calc_duration(&mut self) {
        self.t1 = self.duration + self.hold;
        if self.yoyo {
            self.t1 += self.duration;
        }
        self.t2 = self.t1 + self.repeat_delay;

        self.total_duration = self.delay + self.t1;
        if self.repeat == -1 {
            self.total_duration = f64::INFINITY;
        } else if self.repeat > 0 {
            self.total_duration += self.t2 * f64::from(self.repeat);
        }
    }

    /// 回到播放前的状态
    ///
    /// `from_loop` 为 true 时（整体循环重启）直接重新生成起止值并进入正向播放，
    /// 否则进入 `PendingRender`，在下一步渲染起始值。
    pub(crate) fn reset(&mut self, from_loop: bool) {
        self.progress = 0.0;
        self.elapsed = 0.0;
        self.repeat_counter = counter_from(self.repeat);

        if from_loop {
            self.start = self.generate_start(self.start);
            self.end = self.generate_end(self.start);
            self.current = self.start;
            self.state = TweenDataState::PlayingForward;
        } else {
            self.state = TweenDataState::PendingRender;
        }

        if self.delay > 0.0 {
            self.elapsed = self.delay;
            self.state = TweenDataState::Delay;
        }

        if let Some(get_active) = self.get_active.clone() {
            let value = get_active(&self.context(self.start));
            self.apply(value);
        }
    }

    /// seek 使用的重置：直接回到起始值并写入目标，跳过 `PendingRender`
    pub(crate) fn rewind(&mut self) {
        self.progress = 0.0;
        self.elapsed = 0.0;
        self.repeat_counter = counter_from(self.repeat);
        self.current = self.start;
        self.previous = self.start;
        self.state = TweenDataState::PlayingForward;
        self.apply(self.current);

        if self.delay > 0.0 {
            self.elapsed = self.delay;
            self.state = TweenDataState::Delay;
        }

        if let Some(get_active) = self.get_active.clone() {
            let value = get_active(&self.context(self.start));
            self.apply(value);
        }
    }

    /// 计算起始值，`value` 为生成器的输入
    pub(crate) fn generate_start(&self, value: f64) -> f64 {
        match &self.get_start {
            Some(f) => f(&self.context(value)),
            None => self.from,
        }
    }

    /// 计算结束值，`start` 为刚生成的起始值
    pub(crate) fn generate_end(&self, start: f64) -> f64 {
        match &self.get_end {
            Some(f) => f(&self.context(start)),
            None => self.to,
        }
    }

    /// 把值写入目标；空目标不调用 action
    pub(crate) fn apply(&self, value: f64) {
        if !self.target.is_null() {
            (self.action)(self.target, value);
        }
    }

    /// 在 yoyo / repeat 边界切换翻转
    pub(crate) fn toggle_flips(&self) {
        let Some(flip) = &self.flip else {
            return;
        };
        if self.target.is_null() {
            return;
        }
        if self.flip_x {
            flip(self.target, FlipAxis::X);
        }
        if self.flip_y {
            flip(self.target, FlipAxis::Y);
        }
    }

    pub(crate) fn entry_event(&self) -> EntryEvent {
        EntryEvent {
            target: self.target,
            index: self.index,
            current: self.current,
            previous: self.previous,
        }
    }
}

impl std::fmt::Debug for TweenData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TweenData")
            .field("target", &self.target)
            .field("index", &self.index)
            .field("state", &self.state)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("current", &self.current)
            .field("elapsed", &self.elapsed)
            .field("progress", &self.progress)
            .field("repeat_counter", &self.repeat_counter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn data_for(entry: &TweenEntry) -> TweenData {
        TweenData::new(TargetHandle::new(0, 0), 0, 0, 1, 0, entry)
    }

    #[test]
    fn test_sub_saturating() {
        assert_eq!(sub_saturating(10.0, 25.0), 0.0);
        assert_eq!(sub_saturating(10.0, 10.0), 0.0);
        assert_eq!(sub_saturating(25.0, 10.0), 15.0);
    }

    #[test]
    fn test_timing_normalization() {
        let entry = TweenEntry::counter(0.0, 1.0)
            .with_duration(0.0)
            .with_delay(-50.0)
            .with_hold(f64::NAN)
            .with_repeat_delay(-1.0);
        let data = data_for(&entry);

        assert_eq!(data.duration(), 1.0);
        assert_eq!(data.delay(), 0.0);
        assert_eq!(data.hold(), 0.0);
        assert_eq!(data.repeat_delay(), 0.0);

        let data = data_for(&TweenEntry::counter(0.0, 1.0).with_duration(f64::INFINITY));
        assert_eq!(data.duration(), 1.0);
    }

    #[test]
    fn test_calc_duration() {
        // t1 = 1000 + 200 + 1000 (yoyo)，t2 = t1 + 100
        let entry = TweenEntry::counter(0.0, 1.0)
            .with_delay(50.0)
            .with_hold(200.0)
            .with_yoyo(true)
            .with_repeat(2)
            .with_repeat_delay(100.0);
        let data = data_for(&entry);

        assert_eq!(data.t1, 2200.0);
        assert_eq!(data.t2, 2300.0);
        assert_eq!(data.total_duration(), 50.0 + 2200.0 + 2300.0 * 2.0);

        let forever = data_for(&TweenEntry::counter(0.0, 1.0).with_repeat(-1));
        assert!(forever.total_duration().is_infinite());
    }

    #[test]
    fn test_repeat_counter() {
        assert_eq!(counter_from(-1), REPEAT_FOREVER);
        assert_eq!(counter_from(-5), 0);
        assert_eq!(counter_from(3), 3);

        let mut c = REPEAT_FOREVER;
        step_down(&mut c);
        assert_eq!(c, REPEAT_FOREVER);

        let mut c = 1;
        step_down(&mut c);
        step_down(&mut c);
        assert_eq!(c, 0);
    }

    #[test]
    fn test_reset_states() {
        let mut data = data_for(&TweenEntry::counter(0.0, 1.0));
        data.reset(false);
        assert_eq!(data.state(), TweenDataState::PendingRender);

        let mut delayed = data_for(&TweenEntry::counter(0.0, 1.0).with_delay(300.0));
        delayed.reset(false);
        assert_eq!(delayed.state(), TweenDataState::Delay);
        assert_eq!(delayed.elapsed(), 300.0);

        data.reset(true);
        assert_eq!(data.state(), TweenDataState::PlayingForward);
        assert_eq!(data.current(), 0.0);
    }

    #[test]
    fn test_get_active_applies_value() {
        let written = Rc::new(RefCell::new(Vec::new()));
        let sink = written.clone();
        let entry = TweenEntry::new(5.0, 10.0, move |_, v| sink.borrow_mut().push(v))
            .with_get_active(|ctx| ctx.value * 2.0);
        let mut data = data_for(&entry);
        data.reset(false);

        assert_eq!(*written.borrow(), vec![10.0]);
    }

    #[test]
    fn test_null_target_skips_action() {
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        let entry = TweenEntry::new(0.0, 1.0, move |_, _| *counter.borrow_mut() += 1);
        let data = TweenData::new(TargetHandle::NULL, 0, 0, 1, 0, &entry);

        data.apply(0.5);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_generators_receive_context() {
        let entry = TweenEntry::counter(0.0, 100.0)
            .with_get_start(|ctx| ctx.value + ctx.target_index as f64)
            .with_get_end(|ctx| ctx.value + 10.0);
        let data = TweenData::new(TargetHandle::new(1, 0), 3, 2, 4, 1, &entry);

        let start = data.generate_start(7.0);
        assert_eq!(start, 9.0);
        assert_eq!(data.generate_end(start), 19.0);
    }
}
