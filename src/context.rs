use crate::{
    error::BlackboardError, BBMap, Blackboard, BlackboardRef, BlackboardValue, FromValue,
    Symbol, Value,
};
use std::rc::Rc;

/// What a node sees of the blackboard while it is being ticked.
///
/// Nodes address data by port name. The port map of the node currently being
/// ticked is swapped into `blackboard_map` by its container, so the same
/// node type can be wired to different blackboard keys at different places
/// in the tree. A port without a mapping reads and writes the blackboard key
/// of the same name.
#[derive(Debug)]
pub struct Context {
    pub(crate) blackboard: BlackboardRef,
    pub(crate) blackboard_map: BBMap,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Blackboard::new_ref())
    }
}

impl Context {
    pub fn new(blackboard: BlackboardRef) -> Self {
        Self {
            blackboard,
            blackboard_map: BBMap::new(),
        }
    }

    pub fn blackboard(&self) -> &BlackboardRef {
        &self.blackboard
    }

    /// Read the value behind `port`, converted to `T`.
    pub fn get<T: FromValue>(&self, port: impl Into<Symbol>) -> Result<T, BlackboardError> {
        let port = port.into();
        let value = self.get_value(port)?;
        T::from_value(&value).ok_or(BlackboardError::Conversion {
            key: port,
            found: value.value_type(),
            wanted: T::TYPE_NAME,
        })
    }

    pub fn get_value(&self, port: impl Into<Symbol>) -> Result<Value, BlackboardError> {
        let port = port.into();
        let key = match self.blackboard_map.get(&port) {
            None => port,
            Some(BlackboardValue::Ref(key, ty)) => {
                if !ty.can_read() {
                    return Err(BlackboardError::WrongDirection {
                        port,
                        direction: *ty,
                    });
                }
                *key
            }
            Some(BlackboardValue::Literal(literal)) => {
                return Ok(Value::String(literal.clone()));
            }
        };
        self.blackboard.borrow().get(key)
    }

    /// Like [`Self::get`], but `None` when nothing is set. Other errors
    /// still propagate.
    pub fn get_opt<T: FromValue>(
        &self,
        port: impl Into<Symbol>,
    ) -> Result<Option<T>, BlackboardError> {
        match self.get(port) {
            Ok(value) => Ok(Some(value)),
            Err(BlackboardError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write through `port`. Writing to a literal binding or an input port is
    /// an error, as is changing the type of an existing key.
    pub fn set(
        &mut self,
        port: impl Into<Symbol>,
        value: impl Into<Value>,
    ) -> Result<(), BlackboardError> {
        let port = port.into();
        let key = match self.blackboard_map.get(&port) {
            None => port,
            Some(BlackboardValue::Ref(key, ty)) => {
                if !ty.can_write() {
                    return Err(BlackboardError::WrongDirection {
                        port,
                        direction: *ty,
                    });
                }
                *key
            }
            Some(BlackboardValue::Literal(_)) => {
                return Err(BlackboardError::WriteToLiteral { port })
            }
        };
        self.blackboard.borrow_mut().set(key, value)
    }

    pub fn has(&self, port: impl Into<Symbol>) -> bool {
        let port = port.into();
        match self.blackboard_map.get(&port) {
            None => self.blackboard.borrow().has(port),
            Some(BlackboardValue::Ref(key, _)) => self.blackboard.borrow().has(*key),
            Some(BlackboardValue::Literal(_)) => true,
        }
    }

    /// Run `f` with `blackboard` as the current scope, restoring the previous
    /// one afterwards. Used by subtrees.
    pub(crate) fn with_scope<R>(
        &mut self,
        blackboard: &BlackboardRef,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let outer = std::mem::replace(&mut self.blackboard, Rc::clone(blackboard));
        let outer_map = std::mem::take(&mut self.blackboard_map);
        let res = f(self);
        self.blackboard_map = outer_map;
        self.blackboard = outer;
        res
    }
}
