use crate::{Symbol, ValueType};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PortType {
    Input,
    Output,
    InOut,
}

impl PortType {
    pub fn can_read(self) -> bool {
        matches!(self, Self::Input | Self::InOut)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Self::Output | Self::InOut)
    }
}

/// One entry of a node type's port manifest.
///
/// `value_type` is optional; an untyped port accepts whatever the blackboard
/// holds. `default` is a literal used when the tree definition leaves an
/// input port unbound.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PortSpec {
    pub ty: PortType,
    pub key: Symbol,
    pub value_type: Option<ValueType>,
    pub default: Option<String>,
}

impl PortSpec {
    fn new(ty: PortType, key: impl Into<Symbol>) -> Self {
        Self {
            ty,
            key: key.into(),
            value_type: None,
            default: None,
        }
    }

    pub fn new_in(key: impl Into<Symbol>) -> Self {
        Self::new(PortType::Input, key)
    }

    pub fn new_out(key: impl Into<Symbol>) -> Self {
        Self::new(PortType::Output, key)
    }

    pub fn new_inout(key: impl Into<Symbol>) -> Self {
        Self::new(PortType::InOut, key)
    }

    pub fn typed(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn with_default(mut self, default: impl ToString) -> Self {
        self.default = Some(default.to_string());
        self
    }
}
