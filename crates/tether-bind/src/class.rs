//! Wrapper class registration.
//!
//! Every wrapper type registered here gets a default coercion: an external
//! value converts to the class iff it already is a wrapper of that type.
//! Types only override the behaviour when they need something else.

use std::any::{Any, TypeId};
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::BindError;
use crate::native::NativeStruct;

/// Converts an external value into a wrapper of some class.
pub type Coerce = fn(Rc<dyn Any>) -> Option<Rc<dyn Any>>;

fn coerce_default<T: NativeStruct>(value: Rc<dyn Any>) -> Option<Rc<dyn Any>> {
    if (*value).is::<T>() {
        Some(value)
    } else {
        None
    }
}

/// A registered wrapper class.
#[derive(Clone, Debug)]
pub struct NativeStructClass {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    coerce: Coerce,
}

impl NativeStructClass {
    /// Class name used for lookups.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The Rust type backing the class.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Coerce an external value into this class.
    pub fn coerce(&self, value: Rc<dyn Any>) -> Option<Rc<dyn Any>> {
        (self.coerce)(value)
    }
}

/// Name-indexed registry of wrapper classes.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: IndexMap<String, NativeStructClass>,
}

impl ClassRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name` with the default coercion.
    pub fn register<T: NativeStruct>(&mut self, name: &str) -> Result<&NativeStructClass, BindError> {
        self.register_with::<T>(name, coerce_default::<T>)
    }

    /// Register `T` under `name` with a custom coercion.
    pub fn register_with<T: NativeStruct>(
        &mut self,
        name: &str,
        coerce: Coerce,
    ) -> Result<&NativeStructClass, BindError> {
        if self.classes.contains_key(name) {
            return Err(BindError::DuplicateClass {
                name: name.to_string(),
            });
        }
        let class = NativeStructClass {
            name: name.to_string(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            coerce,
        };
        debug!(class = name, rust_type = class.type_name, "wrapper class registered");
        let (index, _) = self.classes.insert_full(name.to_string(), class);
        Ok(&self.classes[index])
    }

    /// The class registered under `name`.
    pub fn get(&self, name: &str) -> Option<&NativeStructClass> {
        self.classes.get(name)
    }

    /// The class backed by `T`, if any.
    pub fn class_of<T: NativeStruct>(&self) -> Option<&NativeStructClass> {
        let id = TypeId::of::<T>();
        self.classes.values().find(|class| class.type_id == id)
    }

    /// Coerce `value` into the class registered under `name`.
    pub fn coerce(&self, name: &str, value: Rc<dyn Any>) -> Option<Rc<dyn Any>> {
        self.get(name)?.coerce(value)
    }

    /// Coerce `value` into `T` through `T`'s registered class.
    pub fn coerce_into<T: NativeStruct>(&self, value: Rc<dyn Any>) -> Option<Rc<T>> {
        self.class_of::<T>()?.coerce(value)?.downcast::<T>().ok()
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class is registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
