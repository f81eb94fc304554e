//! # Animations
//!
//! An [`Animation`] drives node properties over time through a list of
//! [`Animator`]s. The producer builds it and hands it to
//! [`crate::SceneController::add_animation`]; the update thread advances
//! every playing animation once per updating frame.
//!
//! ## End Actions
//!
//! ```text
//! Bake       writes are permanent while playing; the last value stays
//! Discard    writes last one frame; the property reverts when stopped
//! BakeFinal  frame-only while playing; the final value is baked at the end
//! ```

mod easing;

pub use easing::Easing;

use stagecraft_core::{BufferIndex, PropertyKind, PropertyValue};

use crate::scene::{NodeId, NodeStore, PropertyIndex};

/// Identifier of an animation, assigned by the producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(pub u32);

/// What happens to animated values when an animation ends or is stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EndAction {
    /// Keep the values reached.
    #[default]
    Bake,
    /// Revert to the values before the animation.
    Discard,
    /// Jump to and keep the final values.
    BakeFinal,
}

/// Playback state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnimationState {
    /// Not playing; progress is at the start.
    #[default]
    Stopped,
    /// Advancing every frame.
    Playing,
    /// Holding the current progress.
    Paused,
    /// Removed from the scene.
    Destroyed,
}

/// Delay and duration of one animator within its animation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimePeriod {
    /// Seconds before the animator starts.
    pub delay: f32,
    /// Seconds the animator runs for.
    pub duration: f32,
}

impl TimePeriod {
    /// A period starting immediately.
    #[must_use]
    pub const fn new(duration: f32) -> Self {
        Self {
            delay: 0.0,
            duration,
        }
    }

    /// A period starting after `delay`.
    #[must_use]
    pub const fn delayed(delay: f32, duration: f32) -> Self {
        Self { delay, duration }
    }

    /// Progress through the period at `elapsed`, `None` before the delay.
    #[must_use]
    pub fn progress(&self, elapsed: f32) -> Option<f32> {
        if elapsed < self.delay {
            return None;
        }
        if self.duration <= 0.0 {
            return Some(1.0);
        }
        Some(((elapsed - self.delay) / self.duration).clamp(0.0, 1.0))
    }
}

/// Values at points of progress, interpolated linearly between points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyFrames {
    frames: Vec<(f32, PropertyValue)>,
}

impl KeyFrames {
    /// No frames.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` at `progress` (clamped to `[0, 1]`). Frames are kept in
    /// progress order; equal progress keeps insertion order.
    #[must_use]
    pub fn with(mut self, progress: f32, value: PropertyValue) -> Self {
        let progress = progress.clamp(0.0, 1.0);
        let at = self.frames.partition_point(|(p, _)| *p <= progress);
        self.frames.insert(at, (progress, value));
        self
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if there are no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Kind of every frame value, or the first offending kind.
    pub(crate) fn check_kind(&self, expected: PropertyKind) -> Result<(), PropertyKind> {
        match self.frames.iter().find(|(_, v)| v.kind() != expected) {
            Some((_, v)) => Err(v.kind()),
            None => Ok(()),
        }
    }

    /// Interpolated value at `alpha`.
    #[must_use]
    pub fn sample(&self, alpha: f32) -> Option<PropertyValue> {
        let (first, last) = (self.frames.first()?, self.frames.last()?);
        if alpha <= first.0 {
            return Some(first.1);
        }
        if alpha >= last.0 {
            return Some(last.1);
        }
        let next = self.frames.partition_point(|(p, _)| *p <= alpha);
        let (p0, v0) = self.frames[next - 1];
        let (p1, v1) = self.frames[next];
        let local = if p1 > p0 { (alpha - p0) / (p1 - p0) } else { 1.0 };
        Some(v0.blend(v1, local))
    }
}

/// Where an animator drives its property.
#[derive(Clone, Debug, PartialEq)]
pub enum AnimatorTarget {
    /// From the value at start to this value.
    To(PropertyValue),
    /// Through these key frames.
    Between(KeyFrames),
}

/// Drives one property of one node.
#[derive(Clone, Debug, PartialEq)]
pub struct Animator {
    /// Animated node.
    pub node: NodeId,
    /// Animated property.
    pub property: PropertyIndex,
    /// Target values.
    pub target: AnimatorTarget,
    /// Curve applied to the animator's progress.
    pub easing: Easing,
    /// Sub-range of the animation, the whole animation if `None`.
    pub period: Option<TimePeriod>,
}

impl Animator {
    /// Value at `elapsed` seconds into an animation of `duration` seconds.
    fn value_at(&self, start: PropertyValue, elapsed: f32, duration: f32) -> Option<PropertyValue> {
        let period = self.period.unwrap_or(TimePeriod::new(duration));
        let alpha = self.easing.apply(period.progress(elapsed)?);
        match &self.target {
            AnimatorTarget::To(target) => Some(start.blend(*target, alpha)),
            AnimatorTarget::Between(frames) => frames.sample(alpha),
        }
    }
}

/// Description of an animation, built by the producer.
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    duration: f32,
    loop_count: u32,
    end_action: EndAction,
    animators: Vec<Animator>,
}

impl Animation {
    /// An animation of `duration` seconds that plays once and bakes.
    #[must_use]
    pub fn new(duration: f32) -> Self {
        Self {
            duration: duration.max(0.0),
            loop_count: 1,
            end_action: EndAction::Bake,
            animators: Vec::new(),
        }
    }

    /// Plays `count` times; `0` loops until stopped.
    #[must_use]
    pub fn with_loop_count(mut self, count: u32) -> Self {
        self.loop_count = count;
        self
    }

    /// Sets the end action.
    #[must_use]
    pub fn with_end_action(mut self, end_action: EndAction) -> Self {
        self.end_action = end_action;
        self
    }

    /// Animates `property` from its current value to `target`.
    #[must_use]
    pub fn animate_to(
        self,
        node: NodeId,
        property: PropertyIndex,
        target: PropertyValue,
        easing: Easing,
    ) -> Self {
        self.with_animator(Animator {
            node,
            property,
            target: AnimatorTarget::To(target),
            easing,
            period: None,
        })
    }

    /// Animates `property` to `target` within `period`.
    #[must_use]
    pub fn animate_to_during(
        self,
        node: NodeId,
        property: PropertyIndex,
        target: PropertyValue,
        easing: Easing,
        period: TimePeriod,
    ) -> Self {
        self.with_animator(Animator {
            node,
            property,
            target: AnimatorTarget::To(target),
            easing,
            period: Some(period),
        })
    }

    /// Animates `property` through `frames`.
    #[must_use]
    pub fn animate_between(
        self,
        node: NodeId,
        property: PropertyIndex,
        frames: KeyFrames,
        easing: Easing,
    ) -> Self {
        self.with_animator(Animator {
            node,
            property,
            target: AnimatorTarget::Between(frames),
            easing,
            period: None,
        })
    }

    /// Adds a prepared animator.
    #[must_use]
    pub fn with_animator(mut self, animator: Animator) -> Self {
        self.animators.push(animator);
        self
    }

    /// Duration of one loop in seconds.
    #[must_use]
    pub const fn duration(&self) -> f32 {
        self.duration
    }

    /// Loop count; `0` loops forever.
    #[must_use]
    pub const fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// End action.
    #[must_use]
    pub const fn end_action(&self) -> EndAction {
        self.end_action
    }

    /// Animators in insertion order.
    #[must_use]
    pub fn animators(&self) -> &[Animator] {
        &self.animators
    }
}

/// A live animation on the update thread.
#[derive(Debug)]
pub(crate) struct AnimationInstance {
    id: AnimationId,
    animation: Animation,
    state: AnimationState,
    elapsed: f32,
    loops_done: u32,
    start_values: Vec<Option<PropertyValue>>,
}

impl AnimationInstance {
    pub(crate) fn new(id: AnimationId, animation: Animation) -> Self {
        let start_values = vec![None; animation.animators.len()];
        Self {
            id,
            animation,
            state: AnimationState::Stopped,
            elapsed: 0.0,
            loops_done: 0,
            start_values,
        }
    }

    pub(crate) const fn id(&self) -> AnimationId {
        self.id
    }

    pub(crate) const fn state(&self) -> AnimationState {
        self.state
    }

    pub(crate) fn play(&mut self) {
        if self.state != AnimationState::Destroyed {
            self.state = AnimationState::Playing;
        }
    }

    pub(crate) fn pause(&mut self) {
        if self.state == AnimationState::Playing {
            self.state = AnimationState::Paused;
        }
    }

    /// Stops and rewinds. Returns `true` if the animation was running.
    pub(crate) fn stop(&mut self, nodes: &mut NodeStore, buffer: BufferIndex) -> bool {
        let was_running = matches!(
            self.state,
            AnimationState::Playing | AnimationState::Paused
        );
        if was_running && self.animation.end_action == EndAction::BakeFinal {
            self.apply(nodes, buffer, self.animation.duration, true);
        }
        self.rewind();
        was_running
    }

    pub(crate) fn destroy(&mut self) {
        self.state = AnimationState::Destroyed;
    }

    fn rewind(&mut self) {
        self.state = AnimationState::Stopped;
        self.elapsed = 0.0;
        self.loops_done = 0;
        self.start_values.fill(None);
    }

    /// Advances a playing animation by `elapsed_seconds`.
    ///
    /// Returns `true` when the last loop completed this frame.
    pub(crate) fn update(
        &mut self,
        nodes: &mut NodeStore,
        buffer: BufferIndex,
        elapsed_seconds: f32,
    ) -> bool {
        let bake = self.animation.end_action == EndAction::Bake;
        match self.state {
            AnimationState::Playing => {}
            AnimationState::Paused => {
                if !bake {
                    self.apply(nodes, buffer, self.elapsed, false);
                }
                return false;
            }
            AnimationState::Stopped | AnimationState::Destroyed => return false,
        }

        let duration = self.animation.duration;
        self.elapsed += elapsed_seconds;
        let mut finished = false;
        if self.elapsed >= duration {
            self.loops_done += 1;
            if self.animation.loop_count != 0 && self.loops_done >= self.animation.loop_count {
                finished = true;
                self.elapsed = duration;
            } else if duration > 0.0 {
                self.elapsed %= duration;
            } else {
                self.elapsed = 0.0;
            }
        }

        self.apply(nodes, buffer, self.elapsed, bake);
        if finished {
            if self.animation.end_action == EndAction::BakeFinal {
                self.apply(nodes, buffer, duration, true);
            }
            self.rewind();
        }
        finished
    }

    fn apply(&mut self, nodes: &mut NodeStore, buffer: BufferIndex, elapsed: f32, bake: bool) {
        let duration = self.animation.duration;
        for (animator, start) in self
            .animation
            .animators
            .iter()
            .zip(self.start_values.iter_mut())
        {
            let Some(node) = nodes.get_mut(animator.node) else {
                continue;
            };
            let Some(property) = node.property_mut(animator.property) else {
                continue;
            };
            let start_value = *start.get_or_insert_with(|| property.value(buffer));
            let Some(value) = animator.value_at(start_value, elapsed, duration) else {
                continue;
            };
            let written = if bake {
                property.bake_value(buffer, value)
            } else {
                property.set_value(buffer, value)
            };
            if let Err(error) = written {
                tracing::warn!(animation = self.id.0, %error, "animator skipped");
            }
        }
    }
}
