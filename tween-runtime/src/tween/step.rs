//! 单个 TweenData 的逐帧推进。
//!
//! 各种等待状态（延迟、停留、重复延迟）到期时，剩余的 delta 会继续用于
//! 下一个状态，因此推进结果与帧的切分方式基本无关。

use crate::data::{TweenDataState, step_down, sub_saturating};
use crate::event::TweenEvent;

use super::{Tween, TweenState};

/// 播放一步后的结果
enum Boundary {
    /// 仍在两端之间
    Between,
    /// 到达结束值并进入停留
    Hold,
    /// 到达结束值，携带溢出量
    End(f64),
    /// 反向播放回到起始值，携带溢出量
    Start(f64),
}

/// 倒计时；到期时返回剩余的 delta
fn count_down(elapsed: &mut f64, delta: f64) -> Option<f64> {
    let leftover = sub_saturating(delta, *elapsed);
    *elapsed = sub_saturating(*elapsed, delta);
    if *elapsed <= 0.0 { Some(leftover) } else { None }
}

impl Tween {
    /// 推进第 `i` 个成员，返回它是否仍在运行
    pub(crate) fn update_tween_data(&mut self, i: usize, delta: f64) -> bool {
        match self.data[i].state {
            TweenDataState::PlayingForward | TweenDataState::PlayingBackward => {
                self.step_playing(i, delta);
            }
            TweenDataState::Delay => {
                if let Some(leftover) = count_down(&mut self.data[i].elapsed, delta) {
                    self.data[i].state = TweenDataState::PendingRender;
                    self.render(i, leftover);
                }
            }
            TweenDataState::PendingRender => self.render(i, delta),
            TweenDataState::HoldDelay => {
                if let Some(leftover) = count_down(&mut self.data[i].elapsed, delta) {
                    self.state_from_end(i, leftover);
                }
            }
            TweenDataState::RepeatDelay => {
                if let Some(leftover) = count_down(&mut self.data[i].elapsed, delta) {
                    self.data[i].state = TweenDataState::PlayingForward;
                    let event = self.data[i].entry_event();
                    self.dispatch(TweenEvent::Repeat(event));
                    if self.state == TweenState::Active && self.data[i].state.is_playing() {
                        self.step_playing(i, leftover);
                    }
                }
            }
            TweenDataState::Created | TweenDataState::Complete => {}
        }
        self.data[i].state.is_running()
    }

    /// 渲染起始值并进入正向播放，同一步的 delta 随即用于播放
    fn render(&mut self, i: usize, delta: f64) {
        let data = &mut self.data[i];
        if data.target.is_null() {
            data.state = TweenDataState::Complete;
            return;
        }

        let start = data.generate_start(data.current);
        data.start = start;
        data.end = data.generate_end(start);
        data.current = start;
        data.previous = start;
        data.apply(start);
        data.state = TweenDataState::PlayingForward;

        self.step_playing(i, delta);
    }

    fn step_playing(&mut self, i: usize, delta: f64) {
        let data = &mut self.data[i];
        if data.target.is_null() {
            data.state = TweenDataState::Complete;
            return;
        }

        let mut elapsed = data.elapsed + delta;
        let mut diff = 0.0;
        if elapsed > data.duration {
            diff = elapsed - data.duration;
            elapsed = data.duration;
        }

        let forward = data.state == TweenDataState::PlayingForward;
        let progress = elapsed / data.duration;

        data.elapsed = elapsed;
        data.progress = progress;
        data.previous = data.current;

        let boundary = if progress >= 1.0 {
            if forward {
                data.current = data.end;
                data.apply(data.end);
                if data.hold > 0.0 {
                    data.elapsed = sub_saturating(data.hold, diff);
                    data.state = TweenDataState::HoldDelay;
                    Boundary::Hold
                } else {
                    Boundary::End(diff)
                }
            } else {
                data.current = data.start;
                data.apply(data.start);
                Boundary::Start(diff)
            }
        } else {
            let v = data.ease.apply(if forward { progress } else { 1.0 - progress });
            data.current = data.start + (data.end - data.start) * v;
            data.apply(data.current);
            Boundary::Between
        };

        // 到达端点的一步不派发 update
        match boundary {
            Boundary::Between => {
                let event = self.data[i].entry_event();
                self.dispatch(TweenEvent::Update(event));
            }
            Boundary::Hold => {}
            Boundary::End(diff) => self.state_from_end(i, diff),
            Boundary::Start(diff) => self.state_from_start(i, diff),
        }
    }

    /// 到达结束值后：yoyo 则反向，否则尝试重复
    fn state_from_end(&mut self, i: usize, diff: f64) {
        if !self.data[i].yoyo {
            self.state_from_start(i, diff);
            return;
        }

        let data = &mut self.data[i];
        data.elapsed = diff;
        data.progress = diff / data.duration;
        data.toggle_flips();
        let event = data.entry_event();

        self.dispatch(TweenEvent::Yoyo(event));

        let data = &mut self.data[i];
        data.start = data.generate_start(data.start);
        data.state = TweenDataState::PlayingBackward;
    }

    /// 回到起始值后：还有重复次数则重播，否则完成
    fn state_from_start(&mut self, i: usize, diff: f64) {
        let data = &mut self.data[i];
        if data.repeat_counter == 0 {
            data.state = TweenDataState::Complete;
            return;
        }

        step_down(&mut data.repeat_counter);
        data.elapsed = diff;
        data.progress = diff / data.duration;
        data.toggle_flips();
        data.start = data.generate_start(data.start);
        data.end = data.generate_end(data.start);

        if data.repeat_delay > 0.0 {
            data.elapsed = sub_saturating(data.repeat_delay, diff);
            data.current = data.start;
            data.apply(data.start);
            data.state = TweenDataState::RepeatDelay;
        } else {
            data.state = TweenDataState::PlayingForward;
            let event = data.entry_event();
            self.dispatch(TweenEvent::Repeat(event));
        }
    }
}
