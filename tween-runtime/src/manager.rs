//! # Manager 模块
//!
//! 补间调度器。
//!
//! ## 两阶段更新
//!
//! 每帧先调用 [`TweenManager::pre_update`] 处理上一帧积累的增删请求，
//! 再调用 [`TweenManager::update`] 推进所有活动补间：
//!
//! ```text
//!            add / make_active             pre_update
//!  config ─────────────────────► to_add ──────────────► active ──► update
//!                                   │   (paused)           │
//!                                   └──────────► pending   │ 返回 true / stop
//!                                                          ▼
//!                                   Removed ◄─ pre_update ─ to_remove
//! ```
//!
//! `update` 遍历的是 `active` 的快照，回调中的增删只会修改队列或登记意图，
//! 不会打乱正在进行的遍历。
//!
//! 回调执行时其所属补间处于可变借用中。此时对该补间的批量操作
//! （`kill_all`、`pause_all` 等）会记录在句柄上，待它本帧推进结束后再执行。

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::config::TweenConfig;
use crate::target::TargetHandle;
use crate::tween::{ParentHook, ParentRequest, Tween, TweenId, TweenState};

/// 补间忙碌时登记的延后请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    Kill,
    Remove,
    Pause,
    Resume,
}

struct TweenSlot {
    id: TweenId,
    targets: Vec<TargetHandle>,
    tween: RefCell<Tween>,
    deferred: RefCell<Vec<Deferred>>,
}

/// 补间句柄
///
/// 管理器与调用方共享同一个补间。句柄相等表示指向同一个补间。
#[derive(Clone)]
pub struct TweenHandle(Rc<TweenSlot>);

impl TweenHandle {
    pub fn id(&self) -> TweenId {
        self.0.id
    }

    /// 去重后的目标列表（构造后不再变化，读取无需借用补间）
    pub fn targets(&self) -> &[TargetHandle] {
        &self.0.targets
    }

    pub fn has_target(&self, target: TargetHandle) -> bool {
        self.0.targets.contains(&target)
    }

    /// 借用补间
    ///
    /// 在该补间自己的回调中调用会 panic：回调已经通过参数拿到了 `&mut Tween`。
    pub fn borrow(&self) -> Ref<'_, Tween> {
        self.0.tween.borrow()
    }

    /// 可变借用补间，限制同 [`TweenHandle::borrow`]
    pub fn borrow_mut(&self) -> RefMut<'_, Tween> {
        self.0.tween.borrow_mut()
    }

    /// 尝试借用；补间正在执行回调时返回 `None`
    pub fn try_borrow(&self) -> Option<Ref<'_, Tween>> {
        self.0.tween.try_borrow().ok()
    }

    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, Tween>> {
        self.0.tween.try_borrow_mut().ok()
    }

    /// 当前状态；补间忙碌时返回 `None`
    pub fn state(&self) -> Option<TweenState> {
        self.try_borrow().map(|t| t.state())
    }

    pub fn ptr_eq(&self, other: &TweenHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn defer(&self, request: Deferred) {
        let mut deferred = self.0.deferred.borrow_mut();
        if !deferred.contains(&request) {
            deferred.push(request);
        }
    }
}

impl PartialEq for TweenHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TweenHandle {}

impl fmt::Debug for TweenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TweenHandle")
            .field("id", &self.0.id)
            .field("state", &self.state())
            .finish()
    }
}

fn contains(list: &[TweenHandle], handle: &TweenHandle) -> bool {
    list.iter().any(|h| h.ptr_eq(handle))
}

fn unlink(list: &mut Vec<TweenHandle>, handle: &TweenHandle) -> bool {
    match list.iter().position(|h| h.ptr_eq(handle)) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

#[derive(Default)]
struct Queues {
    to_add: Vec<TweenHandle>,
    pending: Vec<TweenHandle>,
    active: Vec<TweenHandle>,
    to_remove: Vec<TweenHandle>,
    /// 非 0 表示下一次 pre_update 需要处理
    to_process: usize,
}

impl Queues {
    fn stage_add(&mut self, handle: TweenHandle) {
        if !contains(&self.to_add, &handle) {
            self.to_add.push(handle);
        }
        self.to_process += 1;
    }

    fn stage_remove(&mut self, handle: TweenHandle) {
        if !contains(&self.to_remove, &handle) {
            self.to_remove.push(handle);
        }
        self.to_process += 1;
    }

    fn unlink_all(&mut self, handle: &TweenHandle) {
        unlink(&mut self.to_add, handle);
        unlink(&mut self.pending, handle);
        unlink(&mut self.active, handle);
        unlink(&mut self.to_remove, handle);
    }

    fn is_queued(&self, handle: &TweenHandle) -> bool {
        contains(&self.to_add, handle)
            || contains(&self.pending, handle)
            || contains(&self.active, handle)
    }

    /// 已在 to_add 或 active 中时不做任何事
    fn make_active(&mut self, handle: &TweenHandle) -> bool {
        if contains(&self.to_add, handle) || contains(&self.active, handle) {
            return false;
        }
        unlink(&mut self.pending, handle);
        unlink(&mut self.to_remove, handle);
        self.stage_add(handle.clone());
        true
    }

    /// 补间自身请求重新入队：它此时必为 PendingAdd，留在其他队列里的都是过期记录
    fn restage(&mut self, handle: &TweenHandle) {
        unlink(&mut self.pending, handle);
        unlink(&mut self.active, handle);
        unlink(&mut self.to_remove, handle);
        self.stage_add(handle.clone());
    }

    fn all(&self) -> Vec<TweenHandle> {
        self.active
            .iter()
            .chain(&self.pending)
            .chain(&self.to_add)
            .cloned()
            .collect()
    }
}

struct ManagerInner {
    queues: RefCell<Queues>,
    time_scale: Cell<f64>,
    next_id: Cell<u64>,
}

/// 补间管理器
///
/// 克隆得到的是同一个管理器的另一个引用。补间回调若需要访问管理器，
/// 应捕获 [`TweenManager::downgrade`] 得到的弱引用，避免引用环。
#[derive(Clone)]
pub struct TweenManager {
    inner: Rc<ManagerInner>,
}

/// 管理器弱引用
#[derive(Clone)]
pub struct WeakTweenManager(Weak<ManagerInner>);

impl WeakTweenManager {
    pub fn upgrade(&self) -> Option<TweenManager> {
        self.0.upgrade().map(|inner| TweenManager { inner })
    }
}

impl Default for TweenManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TweenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queues = self.inner.queues.borrow();
        f.debug_struct("TweenManager")
            .field("to_add", &queues.to_add.len())
            .field("pending", &queues.pending.len())
            .field("active", &queues.active.len())
            .field("to_remove", &queues.to_remove.len())
            .field("time_scale", &self.inner.time_scale.get())
            .finish()
    }
}

impl TweenManager {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ManagerInner {
                queues: RefCell::new(Queues::default()),
                time_scale: Cell::new(1.0),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakTweenManager {
        WeakTweenManager(Rc::downgrade(&self.inner))
    }

    fn parent_hook(&self, slot: &Rc<TweenSlot>) -> ParentHook {
        let manager = Rc::downgrade(&self.inner);
        let slot = Rc::downgrade(slot);
        Rc::new(move |request| {
            let (Some(inner), Some(slot)) = (manager.upgrade(), slot.upgrade()) else {
                return;
            };
            let handle = TweenHandle(slot);
            let Ok(mut queues) = inner.queues.try_borrow_mut() else {
                warn!(tween = %handle.id(), ?request, "队列忙碌，请求被丢弃");
                return;
            };
            match request {
                ParentRequest::MakeActive => {
                    queues.restage(&handle);
                    debug!(tween = %handle.id(), "补间重新入队");
                }
                ParentRequest::StageRemove => queues.stage_remove(handle),
                ParentRequest::Remove => queues.unlink_all(&handle),
            }
        })
    }

    // ============ 添加 ============

    /// 构造补间但不入队，之后用 [`TweenManager::existing`] 加入
    pub fn create(&self, config: TweenConfig) -> TweenHandle {
        let id = TweenId::new(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        let tween = Tween::new(id, config);
        let slot = Rc::new(TweenSlot {
            id,
            targets: tween.targets().to_vec(),
            tween: RefCell::new(tween),
            deferred: RefCell::new(Vec::new()),
        });
        let hook = self.parent_hook(&slot);
        slot.tween.borrow_mut().set_parent(hook);

        debug!(tween = %id, targets = slot.targets.len(), "创建补间");
        TweenHandle(slot)
    }

    /// 构造补间并放入 to_add，下一次 `pre_update` 时激活
    pub fn add(&self, config: TweenConfig) -> TweenHandle {
        let handle = self.create(config);
        self.existing(&handle);
        handle
    }

    pub fn add_multiple(&self, configs: impl IntoIterator<Item = TweenConfig>) -> Vec<TweenHandle> {
        configs.into_iter().map(|c| self.add(c)).collect()
    }

    /// 添加计数器补间：目标被替换为独立目标，值通过 `counter_value()` 读取
    pub fn add_counter(&self, mut config: TweenConfig) -> TweenHandle {
        config.targets = vec![TargetHandle::DETACHED];
        self.add(config)
    }

    /// 把已创建（或已移除）的补间放入 to_add
    pub fn existing(&self, handle: &TweenHandle) {
        if let Some(mut tween) = handle.try_borrow_mut() {
            if tween.state() == TweenState::Removed {
                tween.mark_pending_add();
            }
        }
        let mut queues = self.inner.queues.borrow_mut();
        if queues.is_queued(handle) {
            return;
        }
        queues.stage_add(handle.clone());
    }

    // ============ 每帧驱动 ============

    /// 处理上一帧积累的增删请求
    pub fn pre_update(&self, _time: f64, _delta: f64) {
        let (to_remove, to_add) = {
            let mut queues = self.inner.queues.borrow_mut();
            if queues.to_process == 0 {
                return;
            }
            queues.to_process = 0;
            (mem::take(&mut queues.to_remove), mem::take(&mut queues.to_add))
        };

        for handle in to_remove {
            {
                let mut queues = self.inner.queues.borrow_mut();
                if !unlink(&mut queues.active, &handle) {
                    unlink(&mut queues.pending, &handle);
                }
            }
            match handle.try_borrow_mut() {
                Some(mut tween) => tween.mark_removed(),
                None => handle.defer(Deferred::Remove),
            }
            debug!(tween = %handle.id(), "补间已移除");
        }

        for handle in to_add {
            let Some(mut tween) = handle.try_borrow_mut() else {
                self.inner.queues.borrow_mut().stage_add(handle);
                continue;
            };

            match tween.state() {
                TweenState::PendingAdd => {
                    if tween.init() {
                        tween.play();
                        drop(tween);
                        self.inner.queues.borrow_mut().active.push(handle.clone());
                        debug!(tween = %handle.id(), "补间进入活动队列");
                    } else {
                        drop(tween);
                        self.inner.queues.borrow_mut().pending.push(handle.clone());
                        debug!(tween = %handle.id(), "补间以暂停状态等待");
                    }
                }
                TweenState::Paused => {
                    drop(tween);
                    self.inner.queues.borrow_mut().pending.push(handle.clone());
                }
                state => {
                    drop(tween);
                    debug!(tween = %handle.id(), ?state, "丢弃非待添加状态的补间");
                }
            }
            self.apply_deferred(&handle);
        }
    }

    /// 推进所有活动补间
    pub fn update(&self, time: f64, delta: f64) {
        let delta = delta * self.inner.time_scale.get();
        let snapshot = self.inner.queues.borrow().active.clone();

        for handle in snapshot {
            let finished = {
                let Some(mut tween) = handle.try_borrow_mut() else {
                    continue;
                };
                if tween.state() == TweenState::Removed {
                    continue;
                }
                tween.update(time, delta)
            };

            self.apply_deferred(&handle);

            if finished || handle.state() == Some(TweenState::PendingRemove) {
                self.inner.queues.borrow_mut().stage_remove(handle);
            }
        }
    }

    fn apply_deferred(&self, handle: &TweenHandle) {
        let requests = mem::take(&mut *handle.0.deferred.borrow_mut());
        for request in requests {
            let Some(mut tween) = handle.try_borrow_mut() else {
                handle.defer(request);
                continue;
            };
            match request {
                Deferred::Kill => {
                    tween.stop(None);
                    drop(tween);
                    self.inner.queues.borrow_mut().stage_remove(handle.clone());
                }
                Deferred::Remove => {
                    tween.mark_removed();
                    drop(tween);
                    self.inner.queues.borrow_mut().unlink_all(handle);
                }
                Deferred::Pause => tween.pause(),
                Deferred::Resume => tween.resume(),
            }
        }
    }

    // ============ 移除与批量操作 ============

    /// 立即从所有队列中摘除并标记为 `Removed`（可重复调用）
    pub fn remove(&self, handle: &TweenHandle) {
        self.inner.queues.borrow_mut().unlink_all(handle);
        match handle.try_borrow_mut() {
            Some(mut tween) => tween.mark_removed(),
            None => handle.defer(Deferred::Remove),
        }
    }

    /// 重新放入 to_add；已在 to_add 或 active 中时不做任何事
    pub fn make_active(&self, handle: &TweenHandle) {
        let staged = self.inner.queues.borrow_mut().make_active(handle);
        if staged {
            if let Some(mut tween) = handle.try_borrow_mut() {
                tween.mark_pending_add();
            }
        }
    }

    fn kill(&self, handle: &TweenHandle) {
        match handle.try_borrow_mut() {
            Some(mut tween) => {
                tween.stop(None);
                drop(tween);
                self.inner.queues.borrow_mut().stage_remove(handle.clone());
            }
            None => handle.defer(Deferred::Kill),
        }
    }

    /// 停止所有补间（包括尚未激活的）
    pub fn kill_all(&self) {
        let all = self.get_all_tweens();
        debug!(count = all.len(), "停止所有补间");
        for handle in &all {
            self.kill(handle);
        }
    }

    /// 停止所有以 `target` 为目标的补间
    pub fn kill_tweens_of(&self, target: TargetHandle) {
        for handle in self.get_tweens_of(target, true) {
            self.kill(&handle);
        }
    }

    /// 暂停所有活动补间
    pub fn pause_all(&self) {
        let active = self.inner.queues.borrow().active.clone();
        for handle in active {
            match handle.try_borrow_mut() {
                Some(mut tween) => tween.pause(),
                None => handle.defer(Deferred::Pause),
            }
        }
    }

    /// 恢复所有处于 `Paused` 状态的补间
    pub fn resume_all(&self) {
        let candidates: Vec<TweenHandle> = {
            let queues = self.inner.queues.borrow();
            queues.active.iter().chain(&queues.pending).cloned().collect()
        };
        for handle in candidates {
            match handle.try_borrow_mut() {
                Some(mut tween) => {
                    if tween.state() == TweenState::Paused {
                        tween.resume();
                    }
                }
                None => handle.defer(Deferred::Resume),
            }
        }
    }

    /// 清空管理器：停止并移除所有补间
    pub fn shutdown(&self) {
        let all: Vec<TweenHandle> = {
            let mut queues = self.inner.queues.borrow_mut();
            let mut all = queues.all();
            for handle in mem::take(&mut queues.to_remove) {
                if !contains(&all, &handle) {
                    all.push(handle);
                }
            }
            all
        };

        for handle in &all {
            match handle.try_borrow_mut() {
                Some(mut tween) => {
                    tween.stop(None);
                    tween.mark_removed();
                }
                None => handle.defer(Deferred::Remove),
            }
        }

        *self.inner.queues.borrow_mut() = Queues::default();
        debug!(count = all.len(), "管理器已清空");
    }

    // ============ 查询 ============

    /// 以 `target` 为目标的活动补间；`include_pending` 时包括暂停等待与待添加的
    pub fn get_tweens_of(&self, target: TargetHandle, include_pending: bool) -> Vec<TweenHandle> {
        let queues = self.inner.queues.borrow();
        let mut list: Vec<TweenHandle> = queues
            .active
            .iter()
            .filter(|h| h.has_target(target))
            .cloned()
            .collect();
        if include_pending {
            list.extend(
                queues
                    .pending
                    .iter()
                    .chain(&queues.to_add)
                    .filter(|h| h.has_target(target))
                    .cloned(),
            );
        }
        list
    }

    /// 是否有正在播放的补间以 `target` 为目标
    ///
    /// 正在执行回调的补间视为正在播放。
    pub fn is_tweening(&self, target: TargetHandle) -> bool {
        let queues = self.inner.queues.borrow();
        queues.active.iter().any(|h| {
            h.has_target(target) && h.try_borrow().is_none_or(|t| t.is_playing())
        })
    }

    /// 所有未移除的补间（active、pending、to_add）
    pub fn get_all_tweens(&self) -> Vec<TweenHandle> {
        self.inner.queues.borrow().all()
    }

    pub fn each(&self, mut f: impl FnMut(&TweenHandle)) {
        for handle in self.get_all_tweens() {
            f(&handle);
        }
    }

    /// 设置全局时间缩放，钳制到 [0, 1]
    pub fn set_global_time_scale(&self, time_scale: f64) {
        if time_scale.is_nan() {
            warn!("全局时间缩放为 NaN，已忽略");
            return;
        }
        self.inner.time_scale.set(time_scale.clamp(0.0, 1.0));
    }

    pub fn global_time_scale(&self) -> f64 {
        self.inner.time_scale.get()
    }

    pub fn active_count(&self) -> usize {
        self.inner.queues.borrow().active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.queues.borrow().pending.len()
    }

    /// to_add 中等待激活的数量
    pub fn queued_count(&self) -> usize {
        self.inner.queues.borrow().to_add.len()
    }

    /// to_remove 中等待移除的数量
    pub fn removing_count(&self) -> usize {
        self.inner.queues.borrow().to_remove.len()
    }

    /// 没有任何补间（包括待添加、待移除）
    pub fn is_idle(&self) -> bool {
        let queues = self.inner.queues.borrow();
        queues.to_add.is_empty()
            && queues.pending.is_empty()
            && queues.active.is_empty()
            && queues.to_remove.is_empty()
    }
}
