use crate::{PortType, Symbol, ValueType};
use thiserror::Error;

/// Errors raised by blackboard reads and writes, either directly or through
/// the port mapping of a [`crate::Context`].
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum BlackboardError {
    #[error("blackboard key {key:?} is not set")]
    NotFound { key: Symbol },
    #[error("blackboard key {key:?} holds {expected:?}, refusing to write {found:?}")]
    TypeMismatch {
        key: Symbol,
        expected: ValueType,
        found: ValueType,
    },
    #[error("value of {key:?} ({found:?}) cannot be read as {wanted}")]
    Conversion {
        key: Symbol,
        found: ValueType,
        wanted: &'static str,
    },
    #[error("port {port:?} is bound to a literal and cannot be written")]
    WriteToLiteral { port: Symbol },
    #[error("port {port:?} is bound as {direction:?} and cannot be used that way")]
    WrongDirection { port: Symbol, direction: PortType },
}

/// Runtime errors that abort a tick. Expected outcomes such as a failed
/// retry or an expired timeout are statuses, not errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TickError {
    #[error(transparent)]
    Blackboard(#[from] BlackboardError),
    #[error("condition node returned Running")]
    ConditionRunning,
    #[error("node returned Idle from tick")]
    IdleReturned,
    #[error("invalid value for port {port:?}: {reason}")]
    InvalidPort { port: Symbol, reason: String },
    #[error("{0}")]
    Node(String),
    #[error("{path}: {source}")]
    At {
        path: String,
        #[source]
        source: Box<TickError>,
    },
}

impl TickError {
    /// Prefix the node path with `segment`, called by every container the
    /// error unwinds through.
    pub(crate) fn within(self, segment: &str) -> Self {
        match self {
            Self::At { path, source } => Self::At {
                path: format!("{}/{}", segment, path),
                source,
            },
            other => Self::At {
                path: segment.to_owned(),
                source: Box::new(other),
            },
        }
    }

    /// Path of the node that raised the error, root first.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::At { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The error without its path decoration.
    pub fn root_cause(&self) -> &TickError {
        match self {
            Self::At { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AddChildError {
    #[error("Attempted to add too many nodes")]
    TooManyNodes,
}

pub type AddChildResult = Result<(), AddChildError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("node type {type_name:?} is already registered")]
    DuplicateRegistration { type_name: String },
}

/// Why a port binding in a tree definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PortBindingError {
    #[error("the node type does not declare this port")]
    UnknownPort,
    #[error("declared as {declared:?} but bound as {bound:?}")]
    Direction { declared: PortType, bound: PortType },
    #[error("literal {literal:?} is not a valid {expected:?}")]
    LiteralType { expected: ValueType, literal: String },
    #[error("a literal can only be bound to an input port")]
    LiteralOutput,
    #[error("blackboard key {key:?} is used as {first:?} and as {second:?}")]
    KeyType {
        key: String,
        first: ValueType,
        second: ValueType,
    },
}

/// Errors while instantiating a tree from its definition. The tree is not
/// usable after any of these.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("The main tree does not exist")]
    MissingTree,
    #[error("Node type or subtree name not found {node:?} at {path}")]
    UnknownNodeType { node: String, path: String },
    #[error("port {port:?} of {node:?} at {path}: {source}")]
    PortBinding {
        node: String,
        port: String,
        path: String,
        #[source]
        source: PortBindingError,
    },
    #[error("{source} to {node} at {path}")]
    AddChild {
        node: String,
        path: String,
        #[source]
        source: AddChildError,
    },
    #[error("{node} at {path} needs at least {required} children, found {found}")]
    TooFewChildren {
        node: String,
        path: String,
        required: usize,
        found: usize,
    },
    #[error("Subtree {node:?} refers to itself")]
    InfiniteRecursion { node: String },
    #[error("Unknown port type {ty:?}")]
    UnknownPortType { ty: String },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadYamlError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("malformed port definition {def:?}")]
    PortDef { def: String },
    #[error("port {port:?} of {node:?} is not a scalar")]
    InvalidValue { node: String, port: String },
    #[error("port {port:?} of {node:?} must refer to a blackboard key")]
    LiteralOutput { node: String, port: String },
}
