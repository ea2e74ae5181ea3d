//! # Tween 模块
//!
//! 聚合补间：持有一组 [`TweenData`]，维护整体状态机，并向监听器派发事件。
//!
//! ## 状态机
//!
//! ```text
//! PendingAdd ──init──► Init ──play──► Active ──► LoopDelay ──► Active ...
//!     ▲                                  │
//!     │ make_active                      ├──► CompleteDelay ──► PendingRemove ──► Removed
//!     │                                  └────────────────────► PendingRemove
//!  (paused)
//! ```
//!
//! `Paused` 与以上状态正交：`pause()` 记住当前状态，`resume()` 恢复。
//!
//! 与管理器的交互只通过父级钩子（[`ParentRequest`]）：补间自身不持有管理器，
//! 这样回调中拿到 `&mut Tween` 时也能安全地请求重新入队或移除。

mod step;


use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{TweenCallbacks, TweenConfig};
use crate::data::{REPEAT_FOREVER, TweenData, counter_from, non_negative};
use crate::error::{TweenError, TweenResult};
use crate::event::{EventEmitter, ListenerId, TweenEvent, TweenEventKind};
use crate::target::TargetHandle;

/// `seek` / `stop` 使用的默认步长（约 60 FPS 的一帧）
pub const DEFAULT_SEEK_STEP: f64 = 16.6;

/// 补间 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TweenId(pub u64);

impl TweenId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TweenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 补间状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TweenState {
    /// 等待管理器在下一次 pre_update 中初始化
    #[default]
    PendingAdd,
    /// 已初始化，等待 play
    Init,
    /// 正在播放
    Active,
    /// 整体循环之间的等待
    LoopDelay,
    /// 完成前的等待
    CompleteDelay,
    /// 等待管理器移除
    PendingRemove,
    /// 已被管理器移除
    Removed,
    /// 已暂停
    Paused,
}

impl TweenState {
    /// 是否已结束（等待移除或已移除）
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::PendingRemove | Self::Removed)
    }
}

/// 补间向所属管理器发出的请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParentRequest {
    /// 重新放入 to_add
    MakeActive,
    /// 放入 to_remove，在下一次 pre_update 中移除
    StageRemove,
    /// 立即从所有队列中摘除
    Remove,
}

pub(crate) type ParentHook = Rc<dyn Fn(ParentRequest)>;

/// 补间
pub struct Tween {
    id: TweenId,
    pub(crate) data: Vec<TweenData>,
    targets: Vec<TargetHandle>,

    pub(crate) state: TweenState,
    paused_state: TweenState,
    paused: bool,
    has_started: bool,
    pub(crate) is_seeking: bool,
    /// stop 之后不再派发任何事件，直到重新初始化
    silenced: bool,

    duration: f64,
    total_duration: f64,
    start_delay: f64,
    complete_delay: f64,
    loop_count: i32,
    loop_delay: f64,
    loop_counter: u32,
    countdown: f64,

    elapsed: f64,
    progress: f64,
    total_elapsed: f64,
    total_progress: f64,
    time_scale: f64,

    events: EventEmitter,
    callbacks: TweenCallbacks,
    parent: Option<ParentHook>,
}

fn sanitize_time_scale(time_scale: f64) -> f64 {
    if time_scale.is_nan() {
        warn!("时间缩放为 NaN，按 1 处理");
        1.0
    } else {
        time_scale.clamp(0.0, 1.0)
    }
}

impl Tween {
    /// 从配置构造补间
    ///
    /// 目标去重（保留首次出现的顺序），TweenData 按"目标优先、条目其次"展开。
    pub fn new(id: TweenId, config: TweenConfig) -> Self {
        let mut targets: Vec<TargetHandle> = Vec::with_capacity(config.targets.len());
        for target in config.targets {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        if targets.is_empty() || config.entries.is_empty() {
            warn!(tween = %id, "补间没有目标或条目，将在激活后立即完成");
        }

        let mut data = Vec::with_capacity(targets.len() * config.entries.len());
        for (target_index, target) in targets.iter().enumerate() {
            for (entry_index, entry) in config.entries.iter().enumerate() {
                data.push(TweenData::new(
                    *target,
                    data.len(),
                    target_index,
                    targets.len(),
                    entry_index,
                    entry,
                ));
            }
        }

        let mut tween = Self {
            id,
            data,
            targets,
            state: TweenState::PendingAdd,
            paused_state: TweenState::Init,
            paused: config.paused,
            has_started: false,
            is_seeking: false,
            silenced: false,
            duration: 0.0,
            total_duration: 0.0,
            start_delay: 0.0,
            complete_delay: non_negative(config.complete_delay),
            loop_count: config.loop_count,
            loop_delay: non_negative(config.loop_delay),
            loop_counter: 0,
            countdown: 0.0,
            elapsed: 0.0,
            progress: 0.0,
            total_elapsed: 0.0,
            total_progress: 0.0,
            time_scale: sanitize_time_scale(config.time_scale),
            events: EventEmitter::new(),
            callbacks: config.callbacks,
            parent: None,
        };
        tween.calc_duration();
        tween
    }

    // ============ 只读访问 ============

    pub fn id(&self) -> TweenId {
        self.id
    }

    pub fn state(&self) -> TweenState {
        self.state
    }

    /// 暂停前的状态
    pub fn paused_state(&self) -> TweenState {
        self.paused_state
    }

    pub fn targets(&self) -> &[TargetHandle] {
        &self.targets
    }

    pub fn data(&self) -> &[TweenData] {
        &self.data
    }

    /// 最慢成员的总时长（单次播放）
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// 包含循环与完成延迟的总时长
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn total_elapsed(&self) -> f64 {
        self.total_elapsed
    }

    pub fn total_progress(&self) -> f64 {
        self.total_progress
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// 剩余循环次数（无限循环时为 `u32::MAX`）
    pub fn loop_counter(&self) -> u32 {
        self.loop_counter
    }

    pub fn has_started(&self) -> bool {
        self.has_started
    }

    pub fn is_seeking(&self) -> bool {
        self.is_seeking
    }

    pub fn has_target(&self, target: TargetHandle) -> bool {
        self.targets.contains(&target)
    }

    pub fn is_playing(&self) -> bool {
        self.state == TweenState::Active
    }

    pub fn is_paused(&self) -> bool {
        self.state == TweenState::Paused
    }

    /// 第 `index` 个 TweenData 的当前值
    pub fn get_value(&self, index: usize) -> Option<f64> {
        self.data.get(index).map(|d| d.current)
    }

    /// 计数器补间的当前值
    pub fn counter_value(&self) -> f64 {
        self.get_value(0).unwrap_or(0.0)
    }

    /// 设置时间缩放，钳制到 [0, 1]
    pub fn set_time_scale(&mut self, time_scale: f64) {
        self.time_scale = sanitize_time_scale(time_scale);
    }

    // ============ 监听器 ============

    pub fn on(
        &mut self,
        kind: TweenEventKind,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> ListenerId {
        self.events.on(kind, Rc::new(f))
    }

    pub fn once(
        &mut self,
        kind: TweenEventKind,
        f: impl Fn(&mut Tween, &TweenEvent) + 'static,
    ) -> ListenerId {
        self.events.once(kind, Rc::new(f))
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// 移除监听器；`kind` 为 `None` 时移除全部
    pub fn remove_all_listeners(&mut self, kind: Option<TweenEventKind>) {
        self.events.remove_all(kind);
    }

    pub fn listener_count(&self, kind: TweenEventKind) -> usize {
        self.events.listener_count(kind)
    }

    // ============ 生命周期 ============

    /// 初始化：对成员的时间参数求值并计算总时长
    ///
    /// 以暂停状态创建的补间保持 `PendingAdd` 并返回 false。
    pub fn init(&mut self) -> bool {
        if self.paused {
            self.state = TweenState::PendingAdd;
            self.paused_state = TweenState::Init;
            return false;
        }

        for data in &mut self.data {
            data.resolve_timing();
        }
        self.calc_duration();

        self.elapsed = 0.0;
        self.progress = 0.0;
        self.total_elapsed = 0.0;
        self.total_progress = 0.0;
        self.silenced = false;
        self.state = TweenState::Init;
        true
    }

    /// 开始播放
    pub fn play(&mut self) {
        match self.state {
            TweenState::Active | TweenState::PendingRemove | TweenState::Removed => {}
            TweenState::Paused => self.resume(),
            TweenState::PendingAdd => {
                self.paused = false;
                self.request(ParentRequest::MakeActive);
            }
            TweenState::Init => {
                self.reset_tween_data(false);
                self.state = TweenState::Active;
                self.dispatch(TweenEvent::Active);
            }
            TweenState::LoopDelay | TweenState::CompleteDelay => {}
        }
    }

    /// 暂停；重复调用不改变记录的暂停前状态
    pub fn pause(&mut self) {
        if self.state == TweenState::Paused {
            return;
        }
        self.paused = true;
        self.paused_state = self.state;
        self.state = TweenState::Paused;
    }

    /// 恢复；未暂停时等同于 `play()`
    pub fn resume(&mut self) {
        if self.state == TweenState::Paused {
            self.paused = false;
            self.state = self.paused_state;
            if self.state == TweenState::PendingAdd {
                self.request(ParentRequest::MakeActive);
            }
        } else {
            self.play();
        }
    }

    /// 推进一帧，返回是否应被管理器移除
    pub fn update(&mut self, _time: f64, delta: f64) -> bool {
        if matches!(self.state, TweenState::Paused | TweenState::Removed) {
            return false;
        }

        let delta = delta * self.time_scale;

        self.elapsed += delta;
        self.progress = ratio(self.elapsed, self.duration);
        self.total_elapsed += delta;
        self.total_progress = ratio(self.total_elapsed, self.total_duration);

        match self.state {
            TweenState::Active => {
                // seek 期间同样消耗起始延迟，start 留到下一次正常推进再派发
                if !self.has_started {
                    self.start_delay -= delta;
                    if self.start_delay <= 0.0 && !self.is_seeking {
                        self.has_started = true;
                        self.dispatch(TweenEvent::Start);
                    }
                }

                let mut still_running = false;
                for i in 0..self.data.len() {
                    // 回调可能暂停或停止了补间
                    if self.state != TweenState::Active {
                        break;
                    }
                    if self.update_tween_data(i, delta) {
                        still_running = true;
                    }
                }

                if self.state == TweenState::Active && !still_running {
                    self.next_state();
                }
            }
            TweenState::LoopDelay => {
                self.countdown -= delta;
                if self.countdown <= 0.0 {
                    self.restart_loop();
                }
            }
            TweenState::CompleteDelay => {
                self.countdown -= delta;
                if self.countdown <= 0.0 {
                    self.state = TweenState::PendingRemove;
                    self.dispatch(TweenEvent::Complete);
                }
            }
            _ => {}
        }

        self.state == TweenState::PendingRemove
    }

    /// 跳转到整体进度 `to_position`（钳制到 [0, 1]）
    ///
    /// 所有成员回到播放前状态，然后以 `delta` 为步长静默推进，
    /// 期间不派发任何事件，但 action 照常写入。暂停中的补间跳转后保持暂停。
    pub fn seek(&mut self, to_position: f64, delta: f64) -> TweenResult<()> {
        let effective = if self.state == TweenState::Paused {
            self.paused_state
        } else {
            self.state
        };
        if matches!(
            effective,
            TweenState::PendingAdd
                | TweenState::Init
                | TweenState::PendingRemove
                | TweenState::Removed
        ) {
            return Err(TweenError::InvalidState { state: self.state });
        }
        self.seek_unchecked(to_position, delta)
    }

    fn seek_unchecked(&mut self, to_position: f64, delta: f64) -> TweenResult<()> {
        if !(delta.is_finite() && delta > 0.0) {
            return Err(TweenError::InvalidSeekStep { delta });
        }
        if self.time_scale <= 0.0 {
            return Err(TweenError::SeekUnreachable {
                position: to_position,
                reason: "时间缩放为 0，补间不会前进".to_string(),
            });
        }
        let to_position = if to_position.is_nan() {
            0.0
        } else {
            to_position.clamp(0.0, 1.0)
        };

        for data in &mut self.data {
            data.resolve_timing();
        }
        self.calc_duration();

        if to_position > 0.0 && !self.total_duration.is_finite() {
            return Err(TweenError::SeekUnreachable {
                position: to_position,
                reason: "总时长为无限".to_string(),
            });
        }

        self.elapsed = 0.0;
        self.progress = 0.0;
        self.total_elapsed = 0.0;
        self.total_progress = 0.0;

        for data in &mut self.data {
            data.rewind();
        }

        let was_paused = self.state == TweenState::Paused;
        self.state = TweenState::Active;
        self.is_seeking = true;

        let step = delta * self.time_scale;
        let expected = (to_position * self.total_duration / step).ceil() as u64;
        let cap = expected.saturating_add(2);
        let mut steps = 0u64;

        while self.total_progress < to_position
            && self.state != TweenState::PendingRemove
            && steps < cap
        {
            self.update(0.0, delta);
            steps += 1;
        }

        self.is_seeking = false;
        debug!(tween = %self.id, position = to_position, steps, "seek 完成");

        if was_paused {
            self.paused_state = self.state;
            self.state = TweenState::Paused;
        }
        Ok(())
    }

    /// 停止补间
    ///
    /// 处于 `Active` 且给出 `reset_to` 时先跳转到该位置。
    /// 派发 stop 后清空所有监听器，状态变为 `PendingRemove`，
    /// 此后包括配置回调在内的所有事件都不再派发。
    pub fn stop(&mut self, reset_to: Option<f64>) {
        if self.state == TweenState::Removed {
            return;
        }

        if self.state == TweenState::Active {
            if let Some(position) = reset_to.filter(|p| *p >= 0.0) {
                if let Err(e) = self.seek(position, DEFAULT_SEEK_STEP) {
                    warn!(tween = %self.id, error = %e, "停止前跳转失败，已忽略");
                }
            }
        }

        let outside_active = matches!(self.state, TweenState::Paused | TweenState::PendingAdd);

        self.dispatch(TweenEvent::Stop);
        self.events.remove_all(None);
        self.silenced = true;
        self.state = TweenState::PendingRemove;

        if outside_active {
            self.request(ParentRequest::StageRemove);
        }
    }

    /// 从头重新播放
    pub fn restart(&mut self) {
        match self.state {
            TweenState::Active => {
                if let Err(e) = self.seek(0.0, DEFAULT_SEEK_STEP) {
                    warn!(tween = %self.id, error = %e, "重启跳转失败");
                }
            }
            TweenState::PendingRemove | TweenState::Removed => {
                self.state = TweenState::Active;
                if let Err(e) = self.seek_unchecked(0.0, DEFAULT_SEEK_STEP) {
                    warn!(tween = %self.id, error = %e, "重启跳转失败");
                }
                self.paused = false;
                self.has_started = false;
                self.silenced = false;
                self.state = TweenState::PendingAdd;
                self.request(ParentRequest::MakeActive);
            }
            TweenState::PendingAdd => {}
            _ => self.play(),
        }
    }

    /// 立即从管理器中移除
    pub fn remove(&mut self) {
        if self.state == TweenState::Removed {
            return;
        }
        self.dispatch(TweenEvent::Remove);
        self.state = TweenState::Removed;
        self.request(ParentRequest::Remove);
    }

    /// 跳过剩余播放与循环，直接完成
    ///
    /// `delay > 0` 时先进入 `CompleteDelay`。暂停或尚未激活的补间忽略延迟，
    /// 立即完成并交给管理器移除。
    pub fn complete(&mut self, delay: f64) {
        match self.state {
            TweenState::PendingRemove | TweenState::Removed => {}
            TweenState::Paused | TweenState::PendingAdd => {
                self.state = TweenState::PendingRemove;
                self.dispatch(TweenEvent::Complete);
                self.request(ParentRequest::StageRemove);
            }
            _ => {
                if delay > 0.0 {
                    self.elapsed = 0.0;
                    self.countdown = delay;
                    self.state = TweenState::CompleteDelay;
                } else {
                    self.state = TweenState::PendingRemove;
                    self.dispatch(TweenEvent::Complete);
                }
            }
        }
    }

    /// 修改正在播放的条目的结束值
    ///
    /// 只影响处于播放中的成员；`start_to_current` 为 true 时起始值改为当前值。
    pub fn update_to(&mut self, entry_index: usize, value: f64, start_to_current: bool) {
        for data in &mut self.data {
            if data.entry_index == entry_index && data.state.is_playing() {
                data.end = value;
                if start_to_current {
                    data.start = data.current;
                }
            }
        }
    }

    // ============ 内部 ============

    pub(crate) fn set_parent(&mut self, hook: ParentHook) {
        self.parent = Some(hook);
    }

    pub(crate) fn mark_removed(&mut self) {
        self.state = TweenState::Removed;
    }

    pub(crate) fn mark_pending_add(&mut self) {
        self.state = TweenState::PendingAdd;
    }

    fn request(&self, request: ParentRequest) {
        match &self.parent {
            Some(hook) => hook(request),
            None => debug!(tween = %self.id, ?request, "补间不属于任何管理器，忽略请求"),
        }
    }

    /// 派发事件：先监听器（快照 + 存活检查），后配置回调；seek 期间与 stop 之后静默
    pub(crate) fn dispatch(&mut self, event: TweenEvent) {
        if self.is_seeking || self.silenced {
            return;
        }
        let kind = event.kind();
        for (id, callback, once) in self.events.snapshot(kind) {
            if !self.events.contains(id) {
                continue;
            }
            if once {
                self.events.off(id);
            }
            callback(self, &event);
        }
        if let Some(callback) = self.callbacks.get(kind).cloned() {
            callback(self, &event);
        }
    }

    /// 所有成员都已完成后的状态转移
    pub(crate) fn next_state(&mut self) {
        if self.loop_counter > 0 {
            if self.loop_counter != REPEAT_FOREVER {
                self.loop_counter -= 1;
            }
            self.elapsed = 0.0;
            self.progress = 0.0;
            self.state = TweenState::LoopDelay;
            self.countdown = self.loop_delay;
            if self.countdown <= 0.0 {
                self.restart_loop();
            }
        } else if self.complete_delay > 0.0 {
            self.state = TweenState::CompleteDelay;
            self.countdown = self.complete_delay;
        } else {
            self.state = TweenState::PendingRemove;
            self.dispatch(TweenEvent::Complete);
        }
    }

    pub(crate) fn restart_loop(&mut self) {
        self.reset_tween_data(true);
        self.state = TweenState::Active;
        self.dispatch(TweenEvent::Loop);
    }

    /// 计算整体时长、起始延迟与循环计数
    pub(crate) fn calc_duration(&mut self) {
        let mut max_duration: f64 = 0.0;
        let mut min_delay = f64::INFINITY;

        for data in &mut self.data {
            data.calc_duration();
            max_duration = max_duration.max(data.total_duration);
            min_delay = min_delay.min(data.delay);
        }

        self.duration = max_duration;
        self.start_delay = if min_delay.is_finite() { min_delay } else { 0.0 };
        self.loop_counter = counter_from(self.loop_count);

        self.total_duration = if self.loop_counter == REPEAT_FOREVER {
            f64::INFINITY
        } else if self.loop_counter > 0 {
            self.duration
                + self.complete_delay
                + (self.duration + self.loop_delay) * f64::from(self.loop_counter)
        } else {
            self.duration + self.complete_delay
        };
    }

    pub(crate) fn reset_tween_data(&mut self, from_loop: bool) {
        for data in &mut self.data {
            data.reset(from_loop);
        }
    }
}

/// 进度比例，钳制到 1；分母为 0 时视为已完成
fn ratio(elapsed: f64, total: f64) -> f64 {
    if total > 0.0 {
        (elapsed / total).min(1.0)
    } else {
        1.0
    }
}

impl fmt::Debug for Tween {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tween")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("paused_state", &self.paused_state)
            .field("targets", &self.targets)
            .field("data", &self.data.len())
            .field("duration", &self.duration)
            .field("total_progress", &self.total_progress)
            .field("callbacks", &self.callbacks)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
