//! # 管理器生命周期集成测试
//!
//! 只通过公开 API 驱动 TweenManager，覆盖入队、激活、暂停、停止与移除的完整链路。

use std::cell::RefCell;
use std::rc::Rc;

use tween_runtime::{
    TargetHandle, TweenConfig, TweenEntry, TweenEventKind, TweenManager, TweenState,
};

/// 执行一帧
fn frame(manager: &TweenManager, time: f64, delta: f64) {
    manager.pre_update(time, delta);
    manager.update(time, delta);
}

fn assert_fully_removed(manager: &TweenManager) {
    assert_eq!(manager.queued_count(), 0);
    assert_eq!(manager.pending_count(), 0);
    assert_eq!(manager.active_count(), 0);
    assert_eq!(manager.removing_count(), 0);
    assert!(manager.is_idle());
}

fn counting_entry(calls: &Rc<RefCell<usize>>, duration: f64) -> TweenEntry {
    let calls = calls.clone();
    TweenEntry::new(0.0, 100.0, move |_, _| *calls.borrow_mut() += 1).with_duration(duration)
}

/// 同一帧内 add 后立即 kill_all
#[test]
fn test_add_then_kill_all_before_pre_update() {
    let manager = TweenManager::new();
    let calls = Rc::new(RefCell::new(0));
    let stops = Rc::new(RefCell::new(0));
    let s = stops.clone();
    let handle = manager.add(
        TweenConfig::single(TargetHandle::new(0, 0), counting_entry(&calls, 1000.0))
            .on_stop(move |_, _| *s.borrow_mut() += 1),
    );

    manager.kill_all();
    frame(&manager, 0.0, 16.0);

    assert_fully_removed(&manager);
    assert_eq!(handle.state(), Some(TweenState::Removed));
    assert_eq!(*stops.borrow(), 1);
    assert_eq!(*calls.borrow(), 0);
}

/// 以暂停状态创建的补间停留在 pending，play 之后才会写入
#[test]
fn test_paused_tween_waits_in_pending() {
    let manager = TweenManager::new();
    let calls = Rc::new(RefCell::new(0));
    let handle = manager.add(
        TweenConfig::single(TargetHandle::new(0, 0), counting_entry(&calls, 1000.0))
            .with_paused(true),
    );

    for i in 0..10 {
        frame(&manager, i as f64 * 16.0, 16.0);
    }
    assert_eq!(manager.pending_count(), 1);
    assert_eq!(manager.active_count(), 0);
    assert_eq!(*calls.borrow(), 0);

    handle.borrow_mut().play();
    assert_eq!(manager.queued_count(), 1);
    assert_eq!(manager.pending_count(), 0);

    frame(&manager, 160.0, 16.0);
    assert_eq!(manager.active_count(), 1);
    assert_eq!(handle.state(), Some(TweenState::Active));
    assert!(*calls.borrow() > 0);
}

#[test]
fn test_paused_tween_resume() {
    let manager = TweenManager::new();
    let calls = Rc::new(RefCell::new(0));
    let handle = manager.add(
        TweenConfig::single(TargetHandle::new(0, 0), counting_entry(&calls, 1000.0))
            .with_paused(true),
    );
    frame(&manager, 0.0, 16.0);
    assert_eq!(*calls.borrow(), 0);

    handle.borrow_mut().resume();
    frame(&manager, 16.0, 16.0);
    assert_eq!(handle.state(), Some(TweenState::Active));
    assert!(*calls.borrow() > 0);
}

/// 在尚未激活时暂停，之后恢复
#[test]
fn test_pause_before_activation() {
    let manager = TweenManager::new();
    let handle = manager.add(TweenConfig::counter(TweenEntry::counter(0.0, 1.0)));
    handle.borrow_mut().pause();

    frame(&manager, 0.0, 16.0);
    assert_eq!(manager.pending_count(), 1);
    assert_eq!(handle.state(), Some(TweenState::Paused));

    handle.borrow_mut().resume();
    frame(&manager, 16.0, 16.0);
    assert_eq!(manager.active_count(), 1);
    assert_eq!(handle.state(), Some(TweenState::Active));
}

#[test]
fn test_callback_adds_tween_mid_frame() {
    let manager = TweenManager::new();
    let weak = manager.downgrade();
    let added = Rc::new(RefCell::new(None));
    let slot = added.clone();

    let first = manager.add(
        TweenConfig::counter(TweenEntry::counter(0.0, 1.0).with_duration(100.0)).on_complete(
            move |_, _| {
                if let Some(manager) = weak.upgrade() {
                    let next = manager.add(TweenConfig::counter(
                        TweenEntry::counter(0.0, 1.0).with_duration(100.0),
                    ));
                    *slot.borrow_mut() = Some(next);
                }
            },
        ),
    );

    frame(&manager, 0.0, 100.0);
    assert_eq!(first.state(), Some(TweenState::PendingRemove));
    // 新补间在本帧只会进入 to_add
    assert_eq!(manager.queued_count(), 1);
    assert_eq!(manager.active_count(), 1);

    frame(&manager, 100.0, 16.0);
    assert_eq!(first.state(), Some(TweenState::Removed));
    let second = added.borrow().clone().unwrap();
    assert_eq!(second.state(), Some(TweenState::Active));
    assert_eq!(manager.active_count(), 1);
}

#[test]
fn test_kill_all_from_callback() {
    let manager = TweenManager::new();
    let weak = manager.downgrade();

    let a = manager.add(
        TweenConfig::counter(TweenEntry::counter(0.0, 1.0)).on_update(move |_, _| {
            if let Some(manager) = weak.upgrade() {
                manager.kill_all();
            }
        }),
    );
    let b = manager.add(TweenConfig::counter(TweenEntry::counter(0.0, 1.0)));

    frame(&manager, 0.0, 16.0);
    // a 忙碌时的停止请求在它推进结束后执行
    assert_eq!(a.state(), Some(TweenState::PendingRemove));
    assert_eq!(b.state(), Some(TweenState::PendingRemove));

    frame(&manager, 16.0, 16.0);
    assert_eq!(a.state(), Some(TweenState::Removed));
    assert_eq!(b.state(), Some(TweenState::Removed));
    assert_fully_removed(&manager);
}

#[test]
fn test_tween_removes_itself() {
    let manager = TweenManager::new();
    let handle = manager.add(
        TweenConfig::counter(TweenEntry::counter(0.0, 1.0)).on_update(|tween, _| tween.remove()),
    );

    frame(&manager, 0.0, 16.0);
    assert_eq!(handle.state(), Some(TweenState::Removed));
    assert_fully_removed(&manager);
}

#[test]
fn test_restart_after_removal() {
    let manager = TweenManager::new();
    let handle = manager.add(TweenConfig::counter(
        TweenEntry::counter(0.0, 10.0).with_duration(100.0),
    ));

    frame(&manager, 0.0, 100.0);
    frame(&manager, 100.0, 16.0);
    assert_eq!(handle.state(), Some(TweenState::Removed));

    handle.borrow_mut().restart();
    assert_eq!(manager.queued_count(), 1);

    frame(&manager, 116.0, 50.0);
    assert_eq!(handle.state(), Some(TweenState::Active));
    assert_eq!(handle.borrow().counter_value(), 5.0);
}

#[test]
fn test_restart_from_complete_callback() {
    let manager = TweenManager::new();
    let restarts = Rc::new(RefCell::new(0));
    let r = restarts.clone();
    let handle = manager.add(
        TweenConfig::counter(TweenEntry::counter(0.0, 1.0).with_duration(100.0)).on_complete(
            move |tween, _| {
                if *r.borrow() < 2 {
                    *r.borrow_mut() += 1;
                    tween.restart();
                }
            },
        ),
    );

    for i in 0..10 {
        frame(&manager, i as f64 * 100.0, 100.0);
    }
    assert_eq!(*restarts.borrow(), 2);
    assert_eq!(handle.state(), Some(TweenState::Removed));
    assert!(manager.is_idle());
}

#[test]
fn test_global_time_scale() {
    let manager = TweenManager::new();
    manager.set_global_time_scale(0.5);
    let handle = manager.add(TweenConfig::counter(TweenEntry::counter(0.0, 100.0)));

    frame(&manager, 0.0, 500.0);
    assert_eq!(handle.borrow().counter_value(), 25.0);
}

#[test]
fn test_target_queries() {
    let manager = TweenManager::new();
    let t1 = TargetHandle::new(0, 0);
    let t2 = TargetHandle::new(1, 0);
    manager.add(TweenConfig::single(t1, TweenEntry::counter(0.0, 1.0)));
    manager.add(TweenConfig::single(t2, TweenEntry::counter(0.0, 1.0)));

    // 尚未激活时只有 include_pending 能查到
    assert!(manager.get_tweens_of(t1, false).is_empty());
    assert_eq!(manager.get_tweens_of(t1, true).len(), 1);

    frame(&manager, 0.0, 16.0);
    assert!(manager.is_tweening(t1));
    assert!(manager.is_tweening(t2));
    assert_eq!(manager.get_all_tweens().len(), 2);

    manager.kill_tweens_of(t1);
    frame(&manager, 16.0, 16.0);
    assert!(!manager.is_tweening(t1));
    assert!(manager.is_tweening(t2));
    assert_eq!(manager.active_count(), 1);
}

#[test]
fn test_stale_handle_is_distinct_target() {
    let manager = TweenManager::new();
    let live = TargetHandle::new(4, 2);
    manager.add(TweenConfig::single(live, TweenEntry::counter(0.0, 1.0)));
    frame(&manager, 0.0, 16.0);

    assert!(manager.is_tweening(live));
    assert!(!manager.is_tweening(TargetHandle::new(4, 1)));
}

#[test]
fn test_pause_all_resume_all() {
    let manager = TweenManager::new();
    let a = manager.add(TweenConfig::counter(TweenEntry::counter(0.0, 100.0)));
    let b = manager.add(TweenConfig::counter(TweenEntry::counter(0.0, 100.0)));
    frame(&manager, 0.0, 100.0);

    manager.pause_all();
    frame(&manager, 100.0, 100.0);
    assert_eq!(a.state(), Some(TweenState::Paused));
    assert_eq!(a.borrow().counter_value(), 10.0);

    manager.resume_all();
    frame(&manager, 200.0, 100.0);
    assert_eq!(a.state(), Some(TweenState::Active));
    assert_eq!(b.borrow().counter_value(), 20.0);
}

#[test]
fn test_shutdown() {
    let manager = TweenManager::new();
    let a = manager.add(TweenConfig::counter(TweenEntry::counter(0.0, 1.0)));
    frame(&manager, 0.0, 16.0);
    let b = manager.add(TweenConfig::counter(TweenEntry::counter(0.0, 1.0)).with_paused(true));

    manager.shutdown();
    assert_fully_removed(&manager);
    assert_eq!(a.state(), Some(TweenState::Removed));
    assert_eq!(b.state(), Some(TweenState::Removed));

    // 清空后的管理器仍可继续使用
    manager.add(TweenConfig::counter(TweenEntry::counter(0.0, 1.0)));
    frame(&manager, 16.0, 16.0);
    assert_eq!(manager.active_count(), 1);
}

#[test]
fn test_counter_tween() {
    let manager = TweenManager::new();
    let handle = manager.add_counter(
        TweenConfig::new().entry(TweenEntry::counter(0.0, 10.0).with_duration(100.0)),
    );
    assert_eq!(handle.targets(), &[TargetHandle::DETACHED]);

    frame(&manager, 0.0, 50.0);
    assert_eq!(handle.borrow().counter_value(), 5.0);
    frame(&manager, 50.0, 50.0);
    assert_eq!(handle.borrow().counter_value(), 10.0);
}

#[test]
fn test_event_order_over_lifetime() {
    let manager = TweenManager::new();
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut config = TweenConfig::counter(
        TweenEntry::counter(0.0, 1.0)
            .with_duration(100.0)
            .with_yoyo(true)
            .with_repeat(1),
    )
    .with_loop(1);
    for kind in TweenEventKind::ALL {
        let sink = log.clone();
        config = config.with_callback(kind, move |_, event| {
            if event.kind() != TweenEventKind::Update {
                sink.borrow_mut().push(event.kind());
            }
        });
    }
    manager.add(config);

    for i in 0..20 {
        frame(&manager, i as f64 * 50.0, 50.0);
    }

    use TweenEventKind::*;
    assert_eq!(
        *log.borrow(),
        vec![Active, Start, Yoyo, Repeat, Yoyo, Loop, Yoyo, Repeat, Yoyo, Complete]
    );
    assert!(manager.is_idle());
}

#[test]
fn test_add_multiple_and_each() {
    let manager = TweenManager::new();
    let handles = manager.add_multiple(
        (0..3).map(|i| TweenConfig::single(TargetHandle::new(i, 0), TweenEntry::counter(0.0, 1.0))),
    );
    assert_eq!(handles.len(), 3);

    let mut seen = Vec::new();
    manager.each(|h| seen.push(h.id()));
    assert_eq!(seen, handles.iter().map(|h| h.id()).collect::<Vec<_>>());
}
