//! # Constraints
//!
//! A constraint recomputes one property of its owner node every updating
//! frame from a list of input properties.
//!
//! ## Lifecycle
//!
//! ```text
//! Inactive ──apply──▶ Applying ──weight reaches 1──▶ Active
//!                        │                             │
//!                        └──────────remove─────────────┤
//!                                                      ▼
//!                     Removed ◀──weight reaches 0── Removing
//! ```
//!
//! Without a remove duration, or when the owner is destroyed, removal is
//! immediate. While the weight is below one the output is blended from the
//! current value towards the computed one.

mod tag;

pub use tag::{ConstraintTag, InternalTagNamespace};

use stagecraft_core::{
    BufferIndex, DoubleBuffered, PropertyKind, PropertyType, PropertyValue,
};

use crate::animation::Easing;
use crate::error::ConstraintError;
use crate::scene::{NodeId, NodeStore, PropertyIndex};

/// Identifier of a constraint, assigned by the producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub u32);

/// Where a constraint input is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// A property of the owner.
    Local(PropertyIndex),
    /// A property of the owner's parent.
    Parent(PropertyIndex),
    /// A property of another node.
    Node(NodeId, PropertyIndex),
}

/// Input values handed to a constraint function, in source order.
#[derive(Clone, Copy, Debug)]
pub struct PropertyInputs<'a> {
    values: &'a [PropertyValue],
}

impl<'a> PropertyInputs<'a> {
    /// Wraps input values.
    #[must_use]
    pub const fn new(values: &'a [PropertyValue]) -> Self {
        Self { values }
    }

    /// Number of inputs.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no inputs.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Input `index` as a dynamic value.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<PropertyValue> {
        self.values.get(index).copied()
    }

    /// Input `index` as `T`, `None` if absent or of another type.
    #[must_use]
    pub fn get<T: PropertyType>(&self, index: usize) -> Option<T> {
        self.value(index)?.get()
    }
}

/// What happens to the constrained property when the constraint goes away.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RemoveAction {
    /// The property returns to its base value.
    #[default]
    Discard,
    /// The last output becomes the base value.
    Bake,
}

/// Lifecycle state of a constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintState {
    /// Created, not yet applied.
    Inactive,
    /// Weight rising towards one.
    Applying,
    /// Fully applied.
    Active,
    /// Weight falling towards zero.
    Removing,
    /// Gone.
    Removed,
}

/// Boxed constraint function for properties of type `T`.
pub type ConstraintFunction<T> = Box<dyn FnMut(&mut T, &PropertyInputs<'_>) + Send>;

/// A constraint description, built by the producer.
pub struct Constraint<T> {
    target: PropertyIndex,
    sources: Vec<Source>,
    function: ConstraintFunction<T>,
    tag: ConstraintTag,
    apply_duration: f32,
    remove_duration: f32,
    easing: Easing,
    remove_action: RemoveAction,
}

impl<T: PropertyType> Constraint<T> {
    /// Constrains `target` with `function`, which receives the current
    /// value and overwrites it.
    pub fn new(
        target: PropertyIndex,
        function: impl FnMut(&mut T, &PropertyInputs<'_>) + Send + 'static,
    ) -> Self {
        Self {
            target,
            sources: Vec::new(),
            function: Box::new(function),
            tag: ConstraintTag::DEFAULT,
            apply_duration: 0.0,
            remove_duration: 0.0,
            easing: Easing::Linear,
            remove_action: RemoveAction::Discard,
        }
    }

    /// Appends an input.
    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    /// Seconds over which the weight rises to one.
    #[must_use]
    pub fn with_apply_duration(mut self, seconds: f32) -> Self {
        self.apply_duration = seconds.max(0.0);
        self
    }

    /// Seconds over which the weight falls to zero on explicit removal.
    #[must_use]
    pub fn with_remove_duration(mut self, seconds: f32) -> Self {
        self.remove_duration = seconds.max(0.0);
        self
    }

    /// Curve of the weight transitions.
    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// What removal leaves behind.
    #[must_use]
    pub fn with_remove_action(mut self, remove_action: RemoveAction) -> Self {
        self.remove_action = remove_action;
        self
    }

    /// Sets an application tag.
    ///
    /// # Errors
    ///
    /// See [`ConstraintTag::replace_custom`].
    pub fn set_tag(&mut self, tag: u32) -> Result<(), ConstraintError> {
        self.tag = ConstraintTag::replace_custom(self.tag, tag)?;
        Ok(())
    }

    /// Sets an internal tag.
    ///
    /// # Errors
    ///
    /// See [`ConstraintTag::replace_internal`].
    pub fn set_internal_tag(&mut self, tag: u32) -> Result<(), ConstraintError> {
        self.tag = ConstraintTag::replace_internal(self.tag, tag)?;
        Ok(())
    }

    /// Current tag.
    #[must_use]
    pub const fn tag(&self) -> ConstraintTag {
        self.tag
    }

    /// Constrained property.
    #[must_use]
    pub const fn target(&self) -> PropertyIndex {
        self.target
    }

    /// Inputs in order.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub(crate) fn into_instance(self, id: ConstraintId, owner: NodeId) -> ConstraintInstance {
        let evaluator: Box<dyn Evaluate> = Box::new(TypedFunction {
            function: self.function,
        });
        ConstraintInstance {
            id,
            owner,
            target: self.target,
            kind: T::KIND,
            sources: self.sources,
            evaluator,
            tag: self.tag,
            state: ConstraintState::Inactive,
            weight: DoubleBuffered::new(0.0),
            apply_duration: self.apply_duration,
            remove_duration: self.remove_duration,
            easing: self.easing,
            remove_action: self.remove_action,
            elapsed: 0.0,
            removal_start_weight: 0.0,
            last_output: None,
        }
    }
}

trait Evaluate: Send {
    fn evaluate(&mut self, current: PropertyValue, inputs: &PropertyInputs<'_>) -> PropertyValue;
}

struct TypedFunction<T> {
    function: ConstraintFunction<T>,
}

impl<T: PropertyType> Evaluate for TypedFunction<T> {
    fn evaluate(&mut self, current: PropertyValue, inputs: &PropertyInputs<'_>) -> PropertyValue {
        let Some(mut value) = current.get::<T>() else {
            return current;
        };
        (self.function)(&mut value, inputs);
        value.into_value()
    }
}

/// A live constraint on the update thread.
pub(crate) struct ConstraintInstance {
    id: ConstraintId,
    owner: NodeId,
    target: PropertyIndex,
    kind: PropertyKind,
    sources: Vec<Source>,
    evaluator: Box<dyn Evaluate>,
    tag: ConstraintTag,
    state: ConstraintState,
    weight: DoubleBuffered<f32>,
    apply_duration: f32,
    remove_duration: f32,
    easing: Easing,
    remove_action: RemoveAction,
    elapsed: f32,
    removal_start_weight: f32,
    last_output: Option<PropertyValue>,
}

impl ConstraintInstance {
    pub(crate) const fn id(&self) -> ConstraintId {
        self.id
    }

    pub(crate) const fn owner(&self) -> NodeId {
        self.owner
    }

    pub(crate) const fn tag(&self) -> ConstraintTag {
        self.tag
    }

    pub(crate) const fn state(&self) -> ConstraintState {
        self.state
    }

    pub(crate) fn weight(&self, buffer: BufferIndex) -> f32 {
        *self.weight.get(buffer)
    }

    /// Weight is animating.
    pub(crate) const fn is_transitioning(&self) -> bool {
        matches!(
            self.state,
            ConstraintState::Applying | ConstraintState::Removing
        )
    }

    /// Starts applying. A zero apply duration is fully applied at once.
    pub(crate) fn activate(&mut self, buffer: BufferIndex) {
        if self.state != ConstraintState::Inactive {
            return;
        }
        self.elapsed = 0.0;
        if self.apply_duration > 0.0 {
            self.state = ConstraintState::Applying;
            self.weight.bake(buffer, 0.0);
        } else {
            self.state = ConstraintState::Active;
            self.weight.bake(buffer, 1.0);
        }
        tracing::debug!(constraint = self.id.0, state = ?self.state, "constraint applied");
    }

    /// Requests removal. Returns `true` if the constraint must be finished
    /// now, `false` if removal was deferred.
    pub(crate) fn begin_removal(&mut self, buffer: BufferIndex, immediate: bool) -> bool {
        match self.state {
            ConstraintState::Removed => false,
            ConstraintState::Removing => immediate,
            ConstraintState::Applying | ConstraintState::Active
                if !immediate && self.remove_duration > 0.0 =>
            {
                self.state = ConstraintState::Removing;
                self.elapsed = 0.0;
                self.removal_start_weight = self.weight(buffer);
                tracing::debug!(constraint = self.id.0, "constraint removing");
                false
            }
            _ => true,
        }
    }

    /// Advances the weight animation. Returns `true` when a deferred
    /// removal has completed.
    pub(crate) fn animate_weight(&mut self, buffer: BufferIndex, elapsed_seconds: f32) -> bool {
        match self.state {
            ConstraintState::Applying => {
                self.elapsed += elapsed_seconds;
                let progress = (self.elapsed / self.apply_duration).min(1.0);
                if progress >= 1.0 {
                    self.state = ConstraintState::Active;
                    self.weight.bake(buffer, 1.0);
                    tracing::debug!(constraint = self.id.0, "constraint active");
                } else {
                    self.weight.bake(buffer, self.easing.apply(progress));
                }
                false
            }
            ConstraintState::Removing => {
                self.elapsed += elapsed_seconds;
                let progress = (self.elapsed / self.remove_duration).min(1.0);
                let weight = self.removal_start_weight * (1.0 - self.easing.apply(progress));
                self.weight.bake(buffer, weight);
                progress >= 1.0
            }
            ConstraintState::Inactive | ConstraintState::Active | ConstraintState::Removed => false,
        }
    }

    /// Evaluates the constraint into its target property.
    ///
    /// `scratch` is reused across constraints to collect inputs. Returns
    /// `false` if the constraint was skipped.
    pub(crate) fn apply(
        &mut self,
        nodes: &mut NodeStore,
        buffer: BufferIndex,
        scratch: &mut Vec<PropertyValue>,
    ) -> bool {
        if !matches!(
            self.state,
            ConstraintState::Applying | ConstraintState::Active | ConstraintState::Removing
        ) {
            return false;
        }
        let Some(owner) = nodes.get(self.owner) else {
            return false;
        };
        let parent = owner.parent();

        scratch.clear();
        for source in &self.sources {
            let (node, index) = match *source {
                Source::Local(index) => (Some(self.owner), index),
                Source::Parent(index) => (parent, index),
                Source::Node(node, index) => (Some(node), index),
            };
            let value = node
                .and_then(|id| nodes.get(id))
                .and_then(|n| n.input_value(index, buffer));
            let Some(value) = value else {
                tracing::warn!(
                    constraint = self.id.0,
                    source = ?source,
                    "constraint input unavailable, skipped this frame"
                );
                return false;
            };
            scratch.push(value);
        }

        let Some(property) = nodes
            .get_mut(self.owner)
            .and_then(|n| n.property_mut(self.target))
        else {
            return false;
        };
        let current = property.value(buffer);
        let computed = self
            .evaluator
            .evaluate(current, &PropertyInputs::new(scratch.as_slice()));
        let weight = self.weight(buffer);
        let output = if weight >= 1.0 {
            computed
        } else {
            current.blend(computed, weight)
        };
        if let Err(error) = property.set_value(buffer, output) {
            tracing::warn!(constraint = self.id.0, %error, "constraint output rejected");
            return false;
        }
        self.last_output = Some(output);
        true
    }

    /// Applies the remove action and marks the constraint removed.
    pub(crate) fn finish(&mut self, nodes: &mut NodeStore, buffer: BufferIndex) {
        if self.remove_action == RemoveAction::Bake {
            if let (Some(output), Some(property)) = (
                self.last_output,
                nodes
                    .get_mut(self.owner)
                    .and_then(|n| n.property_mut(self.target)),
            ) {
                debug_assert_eq!(output.kind(), self.kind);
                if let Err(error) = property.bake_value(buffer, output) {
                    tracing::warn!(constraint = self.id.0, %error, "constraint bake rejected");
                }
            }
        }
        self.state = ConstraintState::Removed;
        tracing::debug!(constraint = self.id.0, "constraint removed");
    }

    pub(crate) fn on_swap(&mut self, new_write_index: BufferIndex) {
        self.weight.on_swap(new_write_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Node, NodeDesc};
    use stagecraft_core::PoolConfig;
    use stagecraft_shared::math::Vec3;

    const UPDATE: BufferIndex = BufferIndex::ZERO;

    fn nodes() -> NodeStore {
        let mut nodes = NodeStore::new(PoolConfig::default());
        nodes.insert(Node::new(
            NodeId(1),
            NodeDesc::new().with_custom(PropertyValue::Float(1.0)),
        ));
        nodes.insert(Node::new(
            NodeId(2),
            NodeDesc::new().with_position(Vec3::new(4.0, 0.0, 0.0)),
        ));
        nodes
    }

    fn custom(nodes: &NodeStore) -> f32 {
        nodes
            .get(NodeId(1))
            .and_then(|n| n.value(PropertyIndex::custom(0), UPDATE))
            .and_then(PropertyValue::get)
            .unwrap()
    }

    fn follow_x() -> Constraint<f32> {
        Constraint::new(PropertyIndex::custom(0), |value: &mut f32, inputs: &PropertyInputs<'_>| {
            if let Some(position) = inputs.get::<Vec3>(0) {
                *value = position.x;
            }
        })
        .with_source(Source::Node(NodeId(2), PropertyIndex::POSITION))
    }

    #[test]
    fn test_zero_apply_duration_is_active_at_once() {
        let mut nodes = nodes();
        let mut instance = follow_x().into_instance(ConstraintId(1), NodeId(1));
        assert_eq!(instance.state(), ConstraintState::Inactive);
        assert!(!instance.apply(&mut nodes, UPDATE, &mut Vec::new()));

        instance.activate(UPDATE);
        assert_eq!(instance.state(), ConstraintState::Active);
        assert!(instance.apply(&mut nodes, UPDATE, &mut Vec::new()));
        assert_eq!(custom(&nodes), 4.0);
    }

    #[test]
    fn test_applying_blends_by_weight() {
        let mut nodes = nodes();
        let mut instance = follow_x()
            .with_apply_duration(1.0)
            .into_instance(ConstraintId(1), NodeId(1));
        instance.activate(UPDATE);
        assert!(instance.is_transitioning());
        instance.animate_weight(UPDATE, 0.5);
        assert_eq!(instance.weight(UPDATE), 0.5);
        instance.apply(&mut nodes, UPDATE, &mut Vec::new());
        assert_eq!(custom(&nodes), 2.5);

        instance.animate_weight(UPDATE, 0.5);
        assert_eq!(instance.state(), ConstraintState::Active);
        assert_eq!(instance.weight(UPDATE), 1.0);
    }

    #[test]
    fn test_deferred_removal() {
        let mut instance = follow_x()
            .with_remove_duration(1.0)
            .into_instance(ConstraintId(1), NodeId(1));
        instance.activate(UPDATE);
        assert!(!instance.begin_removal(UPDATE, false));
        assert_eq!(instance.state(), ConstraintState::Removing);
        assert!(!instance.animate_weight(UPDATE, 0.5));
        assert_eq!(instance.weight(UPDATE), 0.5);
        assert!(instance.animate_weight(UPDATE, 0.5));
        assert_eq!(instance.weight(UPDATE), 0.0);
    }

    #[test]
    fn test_owner_destruction_is_immediate() {
        let mut instance = follow_x()
            .with_remove_duration(1.0)
            .into_instance(ConstraintId(1), NodeId(1));
        instance.activate(UPDATE);
        assert!(instance.begin_removal(UPDATE, true));
    }

    #[test]
    fn test_missing_input_skips() {
        let mut nodes = nodes();
        nodes.remove(NodeId(2));
        let mut instance = follow_x().into_instance(ConstraintId(1), NodeId(1));
        instance.activate(UPDATE);
        assert!(!instance.apply(&mut nodes, UPDATE, &mut Vec::new()));
        assert_eq!(custom(&nodes), 1.0);
    }

    #[test]
    fn test_bake_remove_action_keeps_output() {
        let mut nodes = nodes();
        let mut instance = follow_x()
            .with_remove_action(RemoveAction::Bake)
            .into_instance(ConstraintId(1), NodeId(1));
        instance.activate(UPDATE);
        instance.apply(&mut nodes, UPDATE, &mut Vec::new());
        instance.finish(&mut nodes, UPDATE);
        assert_eq!(instance.state(), ConstraintState::Removed);
        let base = nodes
            .get(NodeId(1))
            .and_then(|n| n.property(PropertyIndex::custom(0)))
            .map(stagecraft_core::DynamicProperty::base_value);
        assert_eq!(base, Some(PropertyValue::Float(4.0)));
    }

    #[test]
    fn test_tags_on_builder() {
        let mut constraint = follow_x();
        constraint.set_tag(42).unwrap();
        assert_eq!(constraint.tag().raw(), 42);
        assert!(constraint.set_internal_tag(1_000_001).is_err());
        assert!(constraint.set_tag(1_000_001).is_err());
    }
}
