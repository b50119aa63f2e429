//! # beech-tree
//!
//! A behavior tree execution engine: nodes, a scoped blackboard, a registry of
//! node types and a loader that builds trees from a small text format (or
//! YAML).
//!
//!
//! ## Overview
//!
//! A behavior tree is an extension to finite state machines that makes describing transitional behavior easier.
//! See [BehaviorTreeCPP's documentation](https://www.behaviortree.dev/) for the thorough introduction to the idea.
//!
//! A tree is evaluated by *ticking* its root. Every node returns one of the
//! [`NodeStatus`] values:
//!
//! * `Success` / `Failure` - the node finished.
//! * `Running` - the node has not finished yet and wants to be ticked again.
//! * `Skipped` - the node chose not to execute (e.g. an `if` whose condition
//!   failed and that has no `else` branch). Composites ignore skipped
//!   children.
//! * `Idle` - the node has not been ticked since it was created or halted. A
//!   node never returns it from `tick`.
//!
//! A node that returned `Running` and is no longer needed (a sibling failed, a
//! reactive condition flipped, the tree was halted) is *halted* exactly once.
//!
//!
//! ## How it looks like
//!
//! ```rust
//! use beech_tree::*;
//!
//! let source = r#"
//! tree main = Sequence {
//!     SetBool (value <- "true", output -> door_open)
//!     Print (message <- "walking through")
//! }
//! "#;
//!
//! let registry = Registry::default();
//! let mut tree = load_str(source, &registry, true).unwrap();
//! assert_eq!(tree.tick_root().unwrap(), NodeStatus::Success);
//! assert_eq!(tree.blackboard().borrow().get_as::<bool>("door_open"), Ok(true));
//! ```
//!
//! The callback argument of [`Tree::tick_root_with`] lets the nodes talk to
//! the environment without going through the blackboard.
//! The closure, aliased as `BehaviorCallback`, takes a `&dyn std::any::Any` and returns a `Box<dyn std::any::Any>`,
//! which allows the user to pass or return any type, but in exchange, the user needs to
//! check the type with `downcast_ref` in order to use it.
//! This design was adopted because there is no other good ways to communicate between behavior nodes and the environment _whose lifetime is not 'static_.
//!
//!
//! ## How to define your own node
//!
//! The core of the library is the [`BehaviorNode`] trait.
//!
//! ```rust
//! use beech_tree::*;
//!
//! static BATTERY: Lazy<Symbol> = Lazy::new(|| "battery".into());
//!
//! struct BatteryOk;
//!
//! impl BehaviorNode for BatteryOk {
//!     fn provided_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::new_in(*BATTERY).typed(ValueType::Double)]
//!     }
//!
//!     fn kind(&self) -> NodeKind {
//!         NodeKind::Condition
//!     }
//!
//!     fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
//!         Ok(if ctx.get::<f64>(*BATTERY)? > 0.2 {
//!             NodeStatus::Success
//!         } else {
//!             NodeStatus::Failure
//!         })
//!     }
//! }
//!
//! let mut registry = Registry::default();
//! registry.register("BatteryOk", boxify(|| BatteryOk)).unwrap();
//! ```
//!
//! Nodes address data by port name. The tree definition decides which
//! blackboard key (or literal) a port is bound to, so the same node type can
//! be wired differently at different places. Ports are cheap to compare when
//! cached as a `Lazy<Symbol>`; `Lazy` is re-exported from `once_cell`.
//!
//! Long-running actions that are started once and then polled are easier to
//! write with [`StatefulAction`].
//!
//!
//! ## The tree definition format
//!
//! ```raw
//! # Line comments start with a hash.
//! tree main = Sequence {
//!     var ready = false
//!     Print "greeting" (message <- "hello")
//!     RetryUntilSuccessful (num_attempts <- "3") {
//!         OpenDoor (door -> door_state)
//!     }
//!     if (ready && !Busy) {
//!         Charge
//!     } else {
//!         ready = true
//!     }
//!     Fetch (item <- "cup", result -> cup)
//! }
//!
//! tree Fetch(in item: String, out result) = Sequence {
//!     Locate (target <- item, found -> result)
//! }
//! ```
//!
//! * A node is a type name, an optional quoted instance label, an optional
//!   port list in parentheses and an optional child list in braces.
//! * `a <- b` binds an input port, `a -> b` an output port and `a <-> b` an
//!   inout port. The right hand side is a blackboard key, or a quoted literal
//!   for input ports only.
//! * `&&`, `||` and `!` are shorthands for `Sequence`, `Fallback` and
//!   `Inverter`; parentheses group them.
//! * `if (cond) { .. } else { .. }` becomes the built-in `if` node.
//! * `var flag = true` declares a boolean variable; a declared variable used
//!   as a node name reads as `IsTrue (input <- flag)`. Assigning `flag = false`
//!   becomes a `SetBool` node.
//! * Any other `tree` is a subtree and can be used like a node type. It gets
//!   its own blackboard scope; its parameters are copied in before each tick
//!   and copied back out after it.
//!
//! Here is a pseudo-EBNF notation of the syntax.
//!
//! ```raw
//! tree = "tree" tree-name [ "(" tree-port-list ")" ] "=" ( if-syntax | conditional )
//!
//! tree-port-list = port-def | tree-port-list "," port-def
//!
//! port-def = ( "in" | "out" | "inout" ) tree-port-name [ ":" type-name ]
//!
//! node = if-syntax | conditional | var-def-syntax | var-assign
//!
//! if-syntax = "if" "(" conditional ")" "{" node* "}" [ "else" "{" node* "}" ]
//!
//! conditional-factor = "!" conditional-factor | "(" conditional ")" | node-syntax
//!
//! conditional-and =  conditional-factor | conditional-and "&&" conditional-factor
//!
//! conditional =  conditional-and | conditional "||" conditional-and
//!
//! node-syntax = node-name [ label ] [ "(" port-list ")" ] [ "{" node* "}" ]
//!
//! port = node-port-name ("<-" | "->" | "<->") ( blackboard-key | literal )
//!
//! var-def-syntax = "var" identifier [ "=" initializer ]
//!
//! var-assign = identifier "=" initializer
//!
//! initializer = "true" | "false"
//! ```

mod actions;
mod blackboard;
mod container;
mod context;
pub mod error;
mod nodes;
pub mod parser;
mod port;
mod registry;
mod symbol;
mod tree;

use std::any::Any;
use std::collections::HashMap;

pub use crate::actions::{
    AlwaysFailureNode, AlwaysSuccessNode, IsTrueNode, PrintNode, SleepAction, StatefulAction,
    StatefulActionNode,
};
pub use crate::blackboard::{Blackboard, BlackboardRef, FromValue, Value, ValueType};
pub use crate::container::BehaviorNodeContainer;
pub use crate::context::Context;
pub use crate::nodes::{
    FallbackNode, ForceFailureNode, ForceSuccessNode, IfNode, InverterNode, ParallelNode,
    ReactiveFallbackNode, ReactiveSequenceNode, RepeatNode, RetryNode, SequenceNode, SubtreeNode,
    TimeoutNode,
};
pub use crate::symbol::Symbol;
pub use crate::tree::Tree;
pub use crate::{
    parser::{load, load_str, load_yaml, parse_file},
    port::{PortSpec, PortType},
    registry::{boxify, Constructor, Registry},
};
pub use ::once_cell::sync::Lazy;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NodeStatus {
    /// Not ticked since creation or the last halt.
    Idle,
    /// The node should keep running in the next tick
    Running,
    Success,
    Failure,
    /// The node decided not to execute.
    Skipped,
}

impl NodeStatus {
    /// Swap `Success` and `Failure`, leaving the other statuses alone.
    pub fn invert(self) -> Self {
        match self {
            Self::Success => Self::Failure,
            Self::Failure => Self::Success,
            other => other,
        }
    }

    pub fn is_completed(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NodeKind {
    Action,
    /// Must not return `Running`.
    Condition,
    Control,
    Decorator,
}

/// What a port of a node is bound to in the tree definition.
#[derive(Debug, Clone, PartialEq)]
pub enum BlackboardValue {
    Ref(Symbol, PortType),
    Literal(String),
}

impl From<&str> for BlackboardValue {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_owned())
    }
}

pub type BBMap = HashMap<Symbol, BlackboardValue>;
pub type BehaviorCallback<'a> = &'a mut dyn FnMut(&dyn Any) -> Option<Box<dyn Any>>;
pub type TickResult = Result<NodeStatus, error::TickError>;

pub trait BehaviorNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![]
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Action
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult;

    /// Cancel whatever the node has in flight and forget its progress. Only
    /// called on a node whose last tick returned `Running`.
    fn halt(&mut self) {}

    fn add_child(&mut self, _child: BehaviorNodeContainer) -> error::AddChildResult {
        Err(error::AddChildError::TooManyNodes)
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        &[]
    }

    /// Fewest children a tree definition has to give this node.
    fn min_children(&self) -> usize {
        0
    }
}

#[macro_export]
macro_rules! hash_map {
    () => {
        std::collections::HashMap::default()
    };
    ($($name: literal => $val: expr),+ $(,)?) => {{
        let mut ret = std::collections::HashMap::default();
        $(ret.insert($name.into(), $val.into());)+
        ret
    }};
}
