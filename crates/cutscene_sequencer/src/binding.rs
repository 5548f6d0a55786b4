// SPDX-License-Identifier: MIT OR Apache-2.0
//! Binding of tracks to the objects they animate.
//!
//! Members are resolved through explicit accessor tables registered when a
//! sequence is authored, not through runtime reflection. A target is held by
//! the sequencer through a weak handle; once the host drops the object,
//! tracks bound to it skip their work silently.

use crate::error::{Result, SequencerError};
use crate::value::{PropertyValue, ValueKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Path of an animatable member: a component name plus a member name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberPath {
    /// Component type name (may be empty for plain targets)
    pub component: String,
    /// Field or property name within the component
    pub member: String,
}

impl MemberPath {
    /// Create a path from its parts
    pub fn new(component: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            member: member.into(),
        }
    }

    /// Parse `component.member`; a path without a dot has an empty component
    pub fn parse(path: &str) -> Self {
        match path.split_once('.') {
            Some((component, member)) => Self::new(component, member),
            None => Self::new("", path),
        }
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.component.is_empty() {
            write!(f, "{}", self.member)
        } else {
            write!(f, "{}.{}", self.component, self.member)
        }
    }
}

/// An object whose members can be read and written by tracks
pub trait AnimationTarget {
    /// Display name, used in logs and for container lookup
    fn name(&self) -> &str;

    /// Read a member
    fn get(&self, path: &MemberPath) -> Option<PropertyValue>;

    /// Write a member
    fn set(&mut self, path: &MemberPath, value: PropertyValue) -> Result<()>;

    /// Kind of a member, if it exists
    fn kind_of(&self, path: &MemberPath) -> Option<ValueKind> {
        self.get(path).map(|v| v.kind())
    }
}

/// Strong shared handle to a target, owned by the host
pub type SharedTarget = Rc<RefCell<dyn AnimationTarget>>;

/// Wrap a target into a shared handle
pub fn shared<T: AnimationTarget + 'static>(target: T) -> SharedTarget {
    Rc::new(RefCell::new(target))
}

/// Weak handle to a target, held by containers and tracks
#[derive(Clone)]
pub struct TargetRef {
    inner: Weak<RefCell<dyn AnimationTarget>>,
}

impl TargetRef {
    /// Create a weak reference to a shared target
    pub fn new(target: &SharedTarget) -> Self {
        Self {
            inner: Rc::downgrade(target),
        }
    }

    /// Upgrade to a strong handle if the target is still alive
    pub fn upgrade(&self) -> Option<SharedTarget> {
        self.inner.upgrade()
    }

    /// Whether the target still exists
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Whether this handle points at `target`
    pub fn points_to(&self, target: &SharedTarget) -> bool {
        Weak::ptr_eq(&self.inner, &Rc::downgrade(target))
    }

    /// Name of the target, if alive
    pub fn name(&self) -> Option<String> {
        let target = self.upgrade()?;
        let name = target.borrow().name().to_string();
        Some(name)
    }

    /// Read a member, `None` if the target is gone or the member unknown
    pub fn get(&self, path: &MemberPath) -> Option<PropertyValue> {
        let target = self.upgrade()?;
        let value = target.borrow().get(path);
        value
    }

    /// Write a member. A dropped target is not an error; it returns `Ok(false)`.
    pub fn set(&self, path: &MemberPath, value: PropertyValue) -> Result<bool> {
        match self.upgrade() {
            Some(target) => {
                target.borrow_mut().set(path, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "TargetRef({name})"),
            None => write!(f, "TargetRef(<dropped>)"),
        }
    }
}

/// Typed accessor for one member of `T`
pub struct Accessor<T> {
    /// Kind the member holds
    pub kind: ValueKind,
    /// Getter
    pub get: fn(&T) -> PropertyValue,
    /// Setter, called only with values of `kind`
    pub set: fn(&mut T, PropertyValue),
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Accessor<T> {}

/// Accessor table for a host type, built once at authoring time
pub struct BindingTable<T> {
    accessors: IndexMap<MemberPath, Accessor<T>>,
}

impl<T> BindingTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            accessors: IndexMap::new(),
        }
    }

    /// Register a member accessor
    pub fn register(
        &mut self,
        path: MemberPath,
        kind: ValueKind,
        get: fn(&T) -> PropertyValue,
        set: fn(&mut T, PropertyValue),
    ) -> Result<()> {
        if self.accessors.contains_key(&path) {
            return Err(SequencerError::DuplicateProperty(path));
        }
        self.accessors.insert(path, Accessor { kind, get, set });
        Ok(())
    }

    /// Builder-style registration
    pub fn with(
        mut self,
        path: MemberPath,
        kind: ValueKind,
        get: fn(&T) -> PropertyValue,
        set: fn(&mut T, PropertyValue),
    ) -> Result<Self> {
        self.register(path, kind, get, set)?;
        Ok(self)
    }

    /// Look up an accessor
    pub fn accessor(&self, path: &MemberPath) -> Option<&Accessor<T>> {
        self.accessors.get(path)
    }

    /// Kind of a registered member
    pub fn kind_of(&self, path: &MemberPath) -> Option<ValueKind> {
        self.accessors.get(path).map(|a| a.kind)
    }

    /// All registered members, in registration order
    pub fn members(&self) -> impl Iterator<Item = &MemberPath> {
        self.accessors.keys()
    }
}

impl<T> Default for BindingTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A host value paired with its accessor table
pub struct Bound<T> {
    name: String,
    /// The bound value
    pub value: T,
    table: Rc<BindingTable<T>>,
}

impl<T> Bound<T> {
    /// Bind `value` through `table`
    pub fn new(name: impl Into<String>, value: T, table: Rc<BindingTable<T>>) -> Self {
        Self {
            name: name.into(),
            value,
            table,
        }
    }
}

impl<T> AnimationTarget for Bound<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, path: &MemberPath) -> Option<PropertyValue> {
        self.table.accessor(path).map(|a| (a.get)(&self.value))
    }

    fn set(&mut self, path: &MemberPath, value: PropertyValue) -> Result<()> {
        let accessor = *self
            .table
            .accessor(path)
            .ok_or_else(|| SequencerError::UnknownMember(path.clone()))?;
        if accessor.kind != value.kind() {
            return Err(SequencerError::ValueKindMismatch {
                path: path.clone(),
                expected: accessor.kind,
                got: value.kind(),
            });
        }
        (accessor.set)(&mut self.value, value);
        Ok(())
    }

    fn kind_of(&self, path: &MemberPath) -> Option<ValueKind> {
        self.table.kind_of(path)
    }
}

/// Data-driven target: an ordered set of named members
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyBag {
    /// Target name
    pub name: String,
    members: IndexMap<MemberPath, PropertyValue>,
}

impl PropertyBag {
    /// Create an empty bag
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: IndexMap::new(),
        }
    }

    /// Declare a member with its initial value
    pub fn insert(&mut self, path: MemberPath, value: PropertyValue) {
        self.members.insert(path, value);
    }

    /// Builder-style declaration
    pub fn with(mut self, path: MemberPath, value: PropertyValue) -> Self {
        self.insert(path, value);
        self
    }

    /// Iterate over members
    pub fn members(&self) -> impl Iterator<Item = (&MemberPath, &PropertyValue)> {
        self.members.iter()
    }
}

impl AnimationTarget for PropertyBag {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, path: &MemberPath) -> Option<PropertyValue> {
        self.members.get(path).copied()
    }

    fn set(&mut self, path: &MemberPath, value: PropertyValue) -> Result<()> {
        let slot = self
            .members
            .get_mut(path)
            .ok_or_else(|| SequencerError::UnknownMember(path.clone()))?;
        if slot.kind() != value.kind() {
            return Err(SequencerError::ValueKindMismatch {
                path: path.clone(),
                expected: slot.kind(),
                got: value.kind(),
            });
        }
        *slot = value;
        Ok(())
    }
}
