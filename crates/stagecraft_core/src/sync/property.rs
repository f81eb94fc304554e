//! # Scene Properties
//!
//! Typed, double-buffered property storage.
//!
//! ## Dirty Counter
//!
//! ```text
//! set()   -> SET (2)    reset: slot = base, flags >>= 1 -> BAKED
//! bake()  -> BAKED (1)  reset: slot = base, flags >>= 1 -> CLEAN
//! CLEAN (0)             reset: nothing to do
//! ```
//!
//! Every frame that updates the scene resets each property to its base value
//! first. A value that was only `set` (by a constraint, or a non-baking
//! animation) therefore survives for exactly the frame that wrote it, in
//! each of the two buffers.

use stagecraft_shared::math::{Quaternion, Vec2, Vec3, Vec4};

use super::buffer_index::BufferIndex;
use super::double_buffer::DoubleBuffered;
use crate::error::{CoreError, CoreResult};

const CLEAN_FLAG: u8 = 0x00;
const BAKED_FLAG: u8 = 0x01;
const SET_FLAG: u8 = 0x02;

/// The closed set of property value types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// `bool`
    Boolean,
    /// `f32`
    Float,
    /// [`Vec2`]
    Vector2,
    /// [`Vec3`]
    Vector3,
    /// [`Vec4`]
    Vector4,
    /// [`Quaternion`]
    Rotation,
}

/// A property value of any supported type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    /// Flag value.
    Boolean(bool),
    /// Scalar value.
    Float(f32),
    /// 2D vector value.
    Vector2(Vec2),
    /// 3D vector value.
    Vector3(Vec3),
    /// 4D vector or colour value.
    Vector4(Vec4),
    /// Rotation value.
    Rotation(Quaternion),
}

impl PropertyValue {
    /// Type of the contained value.
    #[must_use]
    pub const fn kind(&self) -> PropertyKind {
        match self {
            Self::Boolean(_) => PropertyKind::Boolean,
            Self::Float(_) => PropertyKind::Float,
            Self::Vector2(_) => PropertyKind::Vector2,
            Self::Vector3(_) => PropertyKind::Vector3,
            Self::Vector4(_) => PropertyKind::Vector4,
            Self::Rotation(_) => PropertyKind::Rotation,
        }
    }

    /// Extracts a typed value.
    #[inline]
    #[must_use]
    pub fn get<T: PropertyType>(self) -> Option<T> {
        T::from_value(self)
    }

    /// Blends two values of the same kind. Mismatched kinds yield `to`.
    #[must_use]
    pub fn blend(self, to: Self, alpha: f32) -> Self {
        match (self, to) {
            (Self::Boolean(a), Self::Boolean(b)) => bool::blend(a, b, alpha).into_value(),
            (Self::Float(a), Self::Float(b)) => f32::blend(a, b, alpha).into_value(),
            (Self::Vector2(a), Self::Vector2(b)) => Vec2::blend(a, b, alpha).into_value(),
            (Self::Vector3(a), Self::Vector3(b)) => Vec3::blend(a, b, alpha).into_value(),
            (Self::Vector4(a), Self::Vector4(b)) => Vec4::blend(a, b, alpha).into_value(),
            (Self::Rotation(a), Self::Rotation(b)) => Quaternion::blend(a, b, alpha).into_value(),
            _ => to,
        }
    }
}

/// Rust types that can live in a property.
pub trait PropertyType: Copy + PartialEq + Send + 'static {
    /// Matching [`PropertyKind`].
    const KIND: PropertyKind;

    /// Wraps the value.
    fn into_value(self) -> PropertyValue;

    /// Unwraps a value of the same kind.
    fn from_value(value: PropertyValue) -> Option<Self>;

    /// Interpolates from `from` to `to`; `alpha` is in `[0, 1]`.
    fn blend(from: Self, to: Self, alpha: f32) -> Self;

    /// Typed view of a [`DynamicProperty`].
    fn downcast(property: &DynamicProperty) -> Option<&AnimatableProperty<Self>>;

    /// Typed mutable view of a [`DynamicProperty`].
    fn downcast_mut(property: &mut DynamicProperty) -> Option<&mut AnimatableProperty<Self>>;
}

macro_rules! impl_property_type {
    ($ty:ty, $kind:ident, |$from:ident, $to:ident, $alpha:ident| $blend:expr) => {
        impl PropertyType for $ty {
            const KIND: PropertyKind = PropertyKind::$kind;

            #[inline]
            fn into_value(self) -> PropertyValue {
                PropertyValue::$kind(self)
            }

            #[inline]
            fn from_value(value: PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$kind(inner) => Some(inner),
                    _ => None,
                }
            }

            #[inline]
            fn blend($from: Self, $to: Self, $alpha: f32) -> Self {
                $blend
            }

            fn downcast(property: &DynamicProperty) -> Option<&AnimatableProperty<Self>> {
                match property {
                    DynamicProperty::$kind(inner) => Some(inner),
                    _ => None,
                }
            }

            fn downcast_mut(
                property: &mut DynamicProperty,
            ) -> Option<&mut AnimatableProperty<Self>> {
                match property {
                    DynamicProperty::$kind(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_property_type!(bool, Boolean, |from, to, alpha| if alpha >= 1.0 { to } else { from });
impl_property_type!(f32, Float, |from, to, alpha| from + (to - from) * alpha);
impl_property_type!(Vec2, Vector2, |from, to, alpha| from.lerp(to, alpha));
impl_property_type!(Vec3, Vector3, |from, to, alpha| from.lerp(to, alpha));
impl_property_type!(Vec4, Vector4, |from, to, alpha| from.lerp(to, alpha));
impl_property_type!(Quaternion, Rotation, |from, to, alpha| from.slerp(to, alpha));

/// A double-buffered property with a base value.
///
/// The base value is what the property reverts to at the start of each
/// updating frame. Only [`AnimatableProperty::bake`] changes it.
#[derive(Clone, Debug)]
pub struct AnimatableProperty<T> {
    value: DoubleBuffered<T>,
    base: T,
    dirty_flags: u8,
}

impl<T: PropertyType> AnimatableProperty<T> {
    /// Creates a property whose base and both slots are `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            value: DoubleBuffered::new(initial),
            base: initial,
            dirty_flags: BAKED_FLAG,
        }
    }

    /// Value in slot `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: BufferIndex) -> T {
        *self.value.get(index)
    }

    /// The value the property resets to.
    #[inline]
    #[must_use]
    pub fn base_value(&self) -> T {
        self.base
    }

    /// Sets slot `index` for this frame only.
    pub fn set(&mut self, index: BufferIndex, value: T) {
        if *self.value.get(index) != value {
            self.value.set(index, value);
            self.dirty_flags = SET_FLAG;
        }
    }

    /// Sets slot `index` and the base value permanently.
    pub fn bake(&mut self, index: BufferIndex, value: T) {
        if self.base != value || *self.value.get(index) != value {
            self.base = value;
            self.value.bake(index, value);
            self.dirty_flags = BAKED_FLAG;
        }
    }

    /// Marks the property for reset without changing any value.
    #[inline]
    pub fn mark_as_dirty(&mut self) {
        self.dirty_flags = SET_FLAG;
    }

    /// Writes the base value into slot `index` if the property is dirty.
    pub fn reset_to_base_value(&mut self, index: BufferIndex) {
        if self.dirty_flags != CLEAN_FLAG {
            self.value.set(index, self.base);
            self.dirty_flags >>= 1;
        }
    }

    /// Applies a pending bake to the new write slot.
    #[inline]
    pub fn on_swap(&mut self, new_write_index: BufferIndex) -> bool {
        self.value.on_swap(new_write_index)
    }

    /// No resets are pending.
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dirty_flags == CLEAN_FLAG
    }
}

/// A world-space value derived by the update thread each frame.
///
/// Producers cannot write it; the last computed slot is readable as an
/// input for constraints.
#[derive(Clone, Debug)]
pub struct InheritedProperty<T> {
    value: DoubleBuffered<T>,
    latest: BufferIndex,
}

impl<T: PropertyType> InheritedProperty<T> {
    /// Both slots start as `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            value: DoubleBuffered::new(initial),
            latest: BufferIndex::ZERO,
        }
    }

    /// Value in slot `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: BufferIndex) -> T {
        *self.value.get(index)
    }

    /// The most recently computed value, whichever slot holds it.
    #[inline]
    #[must_use]
    pub fn latest(&self) -> T {
        *self.value.get(self.latest)
    }

    /// Stores a freshly computed value in slot `index`.
    #[inline]
    pub fn set(&mut self, index: BufferIndex, value: T) {
        self.value.set(index, value);
        self.latest = index;
    }

    /// Copies the latest value into slot `index`. Used when a frame skips
    /// recomputation.
    pub fn copy_previous(&mut self, index: BufferIndex) {
        if self.latest != index {
            let latest = self.latest();
            self.set(index, latest);
        }
    }
}

/// An [`AnimatableProperty`] of any [`PropertyKind`].
#[derive(Clone, Debug)]
pub enum DynamicProperty {
    /// `bool` property.
    Boolean(AnimatableProperty<bool>),
    /// `f32` property.
    Float(AnimatableProperty<f32>),
    /// [`Vec2`] property.
    Vector2(AnimatableProperty<Vec2>),
    /// [`Vec3`] property.
    Vector3(AnimatableProperty<Vec3>),
    /// [`Vec4`] property.
    Vector4(AnimatableProperty<Vec4>),
    /// [`Quaternion`] property.
    Rotation(AnimatableProperty<Quaternion>),
}

macro_rules! for_each_property {
    ($property:expr, $inner:ident => $body:expr) => {
        match $property {
            DynamicProperty::Boolean($inner) => $body,
            DynamicProperty::Float($inner) => $body,
            DynamicProperty::Vector2($inner) => $body,
            DynamicProperty::Vector3($inner) => $body,
            DynamicProperty::Vector4($inner) => $body,
            DynamicProperty::Rotation($inner) => $body,
        }
    };
}

impl DynamicProperty {
    /// Creates a property holding `initial` in both slots.
    #[must_use]
    pub fn new(initial: PropertyValue) -> Self {
        match initial {
            PropertyValue::Boolean(v) => Self::Boolean(AnimatableProperty::new(v)),
            PropertyValue::Float(v) => Self::Float(AnimatableProperty::new(v)),
            PropertyValue::Vector2(v) => Self::Vector2(AnimatableProperty::new(v)),
            PropertyValue::Vector3(v) => Self::Vector3(AnimatableProperty::new(v)),
            PropertyValue::Vector4(v) => Self::Vector4(AnimatableProperty::new(v)),
            PropertyValue::Rotation(v) => Self::Rotation(AnimatableProperty::new(v)),
        }
    }

    /// Type of the stored value.
    #[must_use]
    pub const fn kind(&self) -> PropertyKind {
        match self {
            Self::Boolean(_) => PropertyKind::Boolean,
            Self::Float(_) => PropertyKind::Float,
            Self::Vector2(_) => PropertyKind::Vector2,
            Self::Vector3(_) => PropertyKind::Vector3,
            Self::Vector4(_) => PropertyKind::Vector4,
            Self::Rotation(_) => PropertyKind::Rotation,
        }
    }

    /// Value in slot `index`.
    #[must_use]
    pub fn value(&self, index: BufferIndex) -> PropertyValue {
        for_each_property!(self, inner => inner.get(index).into_value())
    }

    /// Base value.
    #[must_use]
    pub fn base_value(&self) -> PropertyValue {
        for_each_property!(self, inner => inner.base_value().into_value())
    }

    /// Sets slot `index` for this frame.
    ///
    /// # Errors
    ///
    /// [`CoreError::PropertyTypeMismatch`] if `value` has another kind.
    pub fn set_value(&mut self, index: BufferIndex, value: PropertyValue) -> CoreResult<()> {
        let mismatch = CoreError::PropertyTypeMismatch {
            expected: self.kind(),
            found: value.kind(),
        };
        for_each_property!(self, inner => {
            inner.set(index, PropertyType::from_value(value).ok_or(mismatch)?);
        });
        Ok(())
    }

    /// Bakes `value` into slot `index` and the base value.
    ///
    /// # Errors
    ///
    /// [`CoreError::PropertyTypeMismatch`] if `value` has another kind.
    pub fn bake_value(&mut self, index: BufferIndex, value: PropertyValue) -> CoreResult<()> {
        let mismatch = CoreError::PropertyTypeMismatch {
            expected: self.kind(),
            found: value.kind(),
        };
        for_each_property!(self, inner => {
            inner.bake(index, PropertyType::from_value(value).ok_or(mismatch)?);
        });
        Ok(())
    }

    /// See [`AnimatableProperty::reset_to_base_value`].
    pub fn reset_to_base_value(&mut self, index: BufferIndex) {
        for_each_property!(self, inner => inner.reset_to_base_value(index));
    }

    /// See [`AnimatableProperty::on_swap`].
    pub fn on_swap(&mut self, new_write_index: BufferIndex) -> bool {
        for_each_property!(self, inner => inner.on_swap(new_write_index))
    }

    /// See [`AnimatableProperty::is_clean`].
    #[must_use]
    pub fn is_clean(&self) -> bool {
        for_each_property!(self, inner => inner.is_clean())
    }

    /// Typed view.
    #[inline]
    #[must_use]
    pub fn typed<T: PropertyType>(&self) -> Option<&AnimatableProperty<T>> {
        T::downcast(self)
    }

    /// Typed mutable view.
    #[inline]
    pub fn typed_mut<T: PropertyType>(&mut self) -> Option<&mut AnimatableProperty<T>> {
        T::downcast_mut(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPDATE: BufferIndex = BufferIndex::ZERO;

    #[test]
    fn test_set_reverts_after_two_resets() {
        let mut property = AnimatableProperty::new(1.0_f32);
        property.reset_to_base_value(UPDATE);
        property.reset_to_base_value(UPDATE.other());
        assert!(property.is_clean());

        property.set(UPDATE, 4.0);
        assert_eq!(property.get(UPDATE), 4.0);
        assert!(!property.is_clean());

        property.reset_to_base_value(UPDATE);
        assert_eq!(property.get(UPDATE), 1.0);
        property.reset_to_base_value(UPDATE.other());
        assert!(property.is_clean());
    }

    #[test]
    fn test_boolean_blend_switches_only_at_full_weight() {
        assert!(!bool::blend(false, true, 0.5));
        assert!(!bool::blend(false, true, 0.99));
        assert!(bool::blend(false, true, 1.0));
        assert!(bool::blend(true, false, 0.5));
    }

    #[test]
    fn test_bake_survives_reset() {
        let mut property = AnimatableProperty::new(Vec3::ZERO);
        property.bake(UPDATE, Vec3::ONE);
        property.on_swap(UPDATE.other());
        assert_eq!(property.get(UPDATE.other()), Vec3::ONE);

        property.reset_to_base_value(UPDATE.other());
        assert_eq!(property.get(UPDATE.other()), Vec3::ONE);
        assert_eq!(property.base_value(), Vec3::ONE);
    }

    #[test]
    fn test_dynamic_property_rejects_wrong_kind() {
        let mut property = DynamicProperty::new(PropertyValue::Float(0.0));
        let result = property.set_value(UPDATE, PropertyValue::Boolean(true));
        assert_eq!(
            result,
            Err(CoreError::PropertyTypeMismatch {
                expected: PropertyKind::Float,
                found: PropertyKind::Boolean,
            })
        );
        property
            .bake_value(UPDATE, PropertyValue::Float(2.5))
            .expect("same kind");
        assert_eq!(property.base_value(), PropertyValue::Float(2.5));
        assert_eq!(property.typed::<f32>().map(|p| p.get(UPDATE)), Some(2.5));
    }

    #[test]
    fn test_blend_kinds() {
        assert_eq!(f32::blend(0.0, 10.0, 0.25), 2.5);
        assert!(!bool::blend(false, true, 0.99));
        assert!(bool::blend(false, true, 1.0));
        let mixed = PropertyValue::Float(1.0).blend(PropertyValue::Boolean(true), 0.5);
        assert_eq!(mixed, PropertyValue::Boolean(true));
    }

    #[test]
    fn test_inherited_copy_previous() {
        let mut world = InheritedProperty::new(0.0_f32);
        world.set(BufferIndex::ONE, 3.0);
        world.copy_previous(BufferIndex::ZERO);
        assert_eq!(world.get(BufferIndex::ZERO), 3.0);
        assert_eq!(world.latest(), 3.0);
    }
}
