//! Camera transitions: the tween seam, the single-flight orchestrator and
//! the `Transfer` future callers await.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use fnv::FnvHashMap;
use glam::Vec3;
use instant::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    QuadraticOut,
    CubicOut,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::QuadraticOut => t * (2.0 - t),
            Self::CubicOut => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweenSpec {
    pub duration: Duration,
    pub easing: Easing,
    /// Rise over the first half, fall back over the second.
    pub yoyo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TweenId(pub u64);

/// Eased progress of one tween. Yoyo tweens finish at 0, others at 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenStep {
    Running(f32),
    Finished(f32),
}

/// Opaque eased-interpolation source.
pub trait TweenEngine {
    fn start(&mut self, spec: TweenSpec, now: Instant) -> TweenId;
    /// Sample `id` at `now`. Unknown or finished ids report `Finished`.
    fn sample(&mut self, id: TweenId, now: Instant) -> TweenStep;
}

/// Wall-clock tweens keyed by id.
#[derive(Debug, Default)]
pub struct ClockTweens {
    running: FnvHashMap<TweenId, (TweenSpec, Instant)>,
    next_id: u64,
}

impl ClockTweens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.running.len()
    }
}

impl TweenEngine for ClockTweens {
    fn start(&mut self, spec: TweenSpec, now: Instant) -> TweenId {
        let id = TweenId(self.next_id);
        self.next_id += 1;
        self.running.insert(id, (spec, now));
        id
    }

    fn sample(&mut self, id: TweenId, now: Instant) -> TweenStep {
        let Some((spec, started)) = self.running.get(&id).copied() else {
            return TweenStep::Finished(1.0);
        };
        let end = if spec.yoyo { 0.0 } else { 1.0 };
        let total = spec.duration.as_secs_f32();
        let t = if total <= 0.0 {
            1.0
        } else if now > started {
            (now - started).as_secs_f32() / total
        } else {
            0.0
        };
        if t >= 1.0 {
            self.running.remove(&id);
            return TweenStep::Finished(end);
        }
        let value = if !spec.yoyo {
            spec.easing.apply(t)
        } else if t < 0.5 {
            spec.easing.apply(t * 2.0)
        } else {
            1.0 - spec.easing.apply((t - 0.5) * 2.0)
        };
        TweenStep::Running(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    /// Another transition was in flight; nothing happened.
    Busy,
    /// No camera placement exists for the request.
    Degenerate,
}

#[derive(Default)]
struct Slot {
    outcome: Option<TransferOutcome>,
    waker: Option<Waker>,
}

/// Resolves when a transition settles. Driven by [`crate::Engine::frame`].
#[must_use = "a Transfer does nothing unless awaited or polled"]
pub struct Transfer {
    slot: Rc<RefCell<Slot>>,
}

impl Transfer {
    pub fn ready(outcome: TransferOutcome) -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                outcome: Some(outcome),
                waker: None,
            })),
        }
    }

    pub fn pending() -> (Self, Completion) {
        let slot = Rc::new(RefCell::new(Slot::default()));
        (Self { slot: slot.clone() }, Completion { slot })
    }

    /// Outcome if already settled.
    pub fn peek(&self) -> Option<TransferOutcome> {
        self.slot.borrow().outcome
    }
}

impl Future for Transfer {
    type Output = TransferOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match slot.outcome {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Write half of a [`Transfer`].
pub struct Completion {
    slot: Rc<RefCell<Slot>>,
}

impl Completion {
    pub fn resolve(self, outcome: TransferOutcome) {
        let waker = {
            let mut slot = self.slot.borrow_mut();
            slot.outcome = Some(outcome);
            slot.waker.take()
        };
        if let Some(w) = waker {
            w.wake();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionKind {
    /// Switch to `scene_id`; `previous` was current when the call began.
    Scene {
        scene_id: String,
        previous: Option<String>,
    },
    Mark {
        mark_id: String,
    },
}

/// Start and end camera pose of a transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPath {
    pub from_eye: Vec3,
    pub to_eye: Vec3,
    pub from_target: Vec3,
    pub to_target: Vec3,
}

impl CameraPath {
    pub fn at(&self, t: f32) -> (Vec3, Vec3) {
        (
            self.from_eye.lerp(self.to_eye, t),
            self.from_target.lerp(self.to_target, t),
        )
    }
}

struct Leg {
    tween: TweenId,
    done: bool,
}

struct Active {
    kind: TransitionKind,
    path: CameraPath,
    camera: Leg,
    mask: Option<Leg>,
    completion: Completion,
}

/// What one frame of the active transition produced.
#[derive(Default)]
pub struct TransitionFrame {
    pub camera: Option<(Vec3, Vec3)>,
    /// Mask strength in `[0, 1]`.
    pub mask: Option<f32>,
    pub finished: Option<Finished>,
}

/// A transition whose legs have all settled. The engine runs the
/// post-transition steps and then resolves it.
pub struct Finished {
    pub kind: TransitionKind,
    completion: Completion,
}

impl Finished {
    pub fn resolve(self, outcome: TransferOutcome) {
        self.completion.resolve(outcome);
    }
}

/// Single-flight guard around camera transitions.
#[derive(Default)]
pub struct Orchestrator {
    active: Option<Active>,
}

impl Orchestrator {
    pub fn is_transferring(&self) -> bool {
        self.active.is_some()
    }

    /// Start a transition: the camera leg runs over `camera_spec`, the
    /// optional mask leg over `mask_spec`. Returns `None` if one is already
    /// in flight, without touching the tween engine.
    pub fn begin(
        &mut self,
        tweens: &mut dyn TweenEngine,
        now: Instant,
        kind: TransitionKind,
        path: CameraPath,
        camera_spec: TweenSpec,
        mask_spec: Option<TweenSpec>,
    ) -> Option<Transfer> {
        if self.active.is_some() {
            return None;
        }
        let camera = Leg {
            tween: tweens.start(camera_spec, now),
            done: false,
        };
        let mask = mask_spec.map(|spec| Leg {
            tween: tweens.start(spec, now),
            done: false,
        });
        let (transfer, completion) = Transfer::pending();
        self.active = Some(Active {
            kind,
            path,
            camera,
            mask,
            completion,
        });
        Some(transfer)
    }

    pub fn step(&mut self, tweens: &mut dyn TweenEngine, now: Instant) -> TransitionFrame {
        let mut frame = TransitionFrame::default();
        let Some(active) = self.active.as_mut() else {
            return frame;
        };

        if !active.camera.done {
            let t = match tweens.sample(active.camera.tween, now) {
                TweenStep::Running(v) => v,
                TweenStep::Finished(v) => {
                    active.camera.done = true;
                    v
                }
            };
            frame.camera = Some(active.path.at(t));
        }
        if let Some(mask) = active.mask.as_mut().filter(|m| !m.done) {
            let level = match tweens.sample(mask.tween, now) {
                TweenStep::Running(v) => v,
                TweenStep::Finished(v) => {
                    mask.done = true;
                    v
                }
            };
            frame.mask = Some(level.clamp(0.0, 1.0));
        }

        let settled = active.camera.done && active.mask.as_ref().map_or(true, |m| m.done);
        if settled {
            if let Some(active) = self.active.take() {
                frame.finished = Some(Finished {
                    kind: active.kind,
                    completion: active.completion,
                });
            }
        }
        frame
    }

    /// Settle any in-flight transition immediately, e.g. on teardown.
    pub fn abandon(&mut self) -> Option<Finished> {
        self.active.take().map(|a| Finished {
            kind: a.kind,
            completion: a.completion,
        })
    }
}
