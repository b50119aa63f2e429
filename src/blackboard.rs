//! The blackboard, a scoped key/value store shared by the nodes of a tree.
//!
//! Values are a closed set of types ([`Value`]). The first write to a key
//! fixes its type in that blackboard; writing a different type later is a
//! [`BlackboardError::TypeMismatch`].
//!
//! A blackboard created with [`Blackboard::create_child`] keeps a weak link to
//! its parent. Reads fall through to the parent chain when a key is absent
//! locally, writes always stay local, so a subtree can shadow a key of the
//! enclosing tree without touching it.

use crate::{error::BlackboardError, Symbol};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::rc::{Rc, Weak};

/// Shared handle to a blackboard. Ticking is single threaded, so plain
/// `Rc<RefCell<_>>` is enough; sharing one blackboard across threads is the
/// host's business.
pub type BlackboardRef = Rc<RefCell<Blackboard>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Double,
    String,
}

impl ValueType {
    /// Name used in tree definitions, e.g. `in count: Int`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Bool" | "bool" => Self::Bool,
            "Int" | "int" => Self::Int,
            "Double" | "double" | "Float" | "float" => Self::Double,
            "String" | "string" | "Str" => Self::String,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
        }
    }

    /// Parse a literal from a tree definition into a value of type `ty`.
    pub fn parse_as(literal: &str, ty: ValueType) -> Option<Value> {
        Some(match ty {
            ValueType::Bool => Self::Bool(literal.trim().parse().ok()?),
            ValueType::Int => Self::Int(literal.trim().parse().ok()?),
            ValueType::Double => Self::Double(literal.trim().parse().ok()?),
            ValueType::String => Self::String(literal.to_owned()),
        })
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Bool(v) => v.fmt(f),
            Self::Int(v) => v.fmt(f),
            Self::Double(v) => v.fmt(f),
            Self::String(v) => v.fmt(f),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

impl_from_for_value!(
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Double,
    f32 => Double,
    String => String,
    &str => String,
);

/// Conversion out of a [`Value`].
///
/// String values are parsed on demand, because literals in a tree definition
/// are always strings until someone reads them as something else.
pub trait FromValue: Sized {
    const TYPE_NAME: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "Value";

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "String";

    fn from_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

macro_rules! impl_from_value_int {
    ($($ty:ty),*) => {
        $(impl FromValue for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Int(v) => <$ty>::try_from(*v).ok(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }
            }
        })*
    };
}

impl_from_value_int!(i64, i32, u32, u64, usize);

macro_rules! impl_from_value_float {
    ($($ty:ty),*) => {
        $(impl FromValue for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Double(v) => Some(*v as $ty),
                    Value::Int(v) => Some(*v as $ty),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }
            }
        })*
    };
}

impl_from_value_float!(f64, f32);

#[derive(Debug, Default)]
pub struct Blackboard {
    entries: HashMap<Symbol, Value>,
    parent: Option<Weak<RefCell<Blackboard>>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_ref() -> BlackboardRef {
        Rc::new(RefCell::new(Self::new()))
    }

    /// A new scope whose reads fall back to `parent`. The child only holds a
    /// weak link; whoever owns the parent has to keep it alive.
    pub fn create_child(parent: &BlackboardRef) -> BlackboardRef {
        Rc::new(RefCell::new(Self {
            entries: HashMap::new(),
            parent: Some(Rc::downgrade(parent)),
        }))
    }

    pub fn parent(&self) -> Option<BlackboardRef> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Write `value` to the local scope.
    pub fn set(
        &mut self,
        key: impl Into<Symbol>,
        value: impl Into<Value>,
    ) -> Result<(), BlackboardError> {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.entries.get(&key) {
            if existing.value_type() != value.value_type() {
                return Err(BlackboardError::TypeMismatch {
                    key,
                    expected: existing.value_type(),
                    found: value.value_type(),
                });
            }
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Look `key` up locally, then through the parent chain.
    pub fn get(&self, key: impl Into<Symbol>) -> Result<Value, BlackboardError> {
        let key = key.into();
        self.lookup(key).ok_or(BlackboardError::NotFound { key })
    }

    /// [`Self::get`] followed by a conversion to `T`.
    pub fn get_as<T: FromValue>(&self, key: impl Into<Symbol>) -> Result<T, BlackboardError> {
        let key = key.into();
        let value = self.get(key)?;
        T::from_value(&value).ok_or(BlackboardError::Conversion {
            key,
            found: value.value_type(),
            wanted: T::TYPE_NAME,
        })
    }

    pub fn get_or<T: FromValue>(&self, key: impl Into<Symbol>, default: T) -> T {
        self.get_as(key).unwrap_or(default)
    }

    pub fn has(&self, key: impl Into<Symbol>) -> bool {
        self.lookup(key.into()).is_some()
    }

    pub fn has_local(&self, key: impl Into<Symbol>) -> bool {
        self.entries.contains_key(&key.into())
    }

    fn lookup(&self, key: Symbol) -> Option<Value> {
        if let Some(value) = self.entries.get(&key) {
            return Some(value.clone());
        }
        let parent = self.parent()?;
        let parent = parent.borrow();
        parent.lookup(key)
    }
}
