use crate::{
    actions::{
        AlwaysFailureNode, AlwaysSuccessNode, IsTrueNode, PrintNode, SetBoolNode, SleepAction,
        StatefulActionNode,
    },
    error::RegistryError,
    nodes::{
        FallbackNode, ForceFailureNode, ForceSuccessNode, IfNode, InverterNode, ParallelNode,
        ReactiveFallbackNode, ReactiveSequenceNode, RepeatNode, RetryNode, SequenceNode,
        TimeoutNode,
    },
    BehaviorNode, NodeKind, PortSpec,
};
use std::collections::HashMap;

pub type Constructor = Box<dyn Fn() -> Box<dyn BehaviorNode>>;

pub fn boxify<T>(cons: impl (Fn() -> T) + 'static) -> Constructor
where
    T: BehaviorNode + 'static,
{
    Box::new(move || Box::new(cons()))
}

struct RegistryEntry {
    constructor: Constructor,
    ports: Vec<PortSpec>,
    kind: NodeKind,
}

/// Maps node type names used in tree definitions to constructors.
///
/// The port manifest of a type is taken from one instance built at
/// registration time, so constructors should be cheap and free of side
/// effects; acquire resources on the first tick instead.
pub struct Registry {
    node_types: HashMap<String, RegistryEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut ret = Self::empty();
        let builtins: Vec<(&str, Constructor)> = vec![
            ("Sequence", boxify(SequenceNode::default)),
            ("ReactiveSequence", boxify(ReactiveSequenceNode::default)),
            ("Fallback", boxify(FallbackNode::default)),
            ("ReactiveFallback", boxify(ReactiveFallbackNode::default)),
            ("Parallel", boxify(ParallelNode::default)),
            ("ForceSuccess", boxify(ForceSuccessNode::default)),
            ("ForceFailure", boxify(ForceFailureNode::default)),
            ("Inverter", boxify(InverterNode::default)),
            ("Repeat", boxify(RepeatNode::default)),
            ("RetryUntilSuccessful", boxify(RetryNode::default)),
            ("Timeout", boxify(TimeoutNode::default)),
            ("if", boxify(IfNode::default)),
            ("AlwaysSuccess", boxify(|| AlwaysSuccessNode)),
            ("AlwaysFailure", boxify(|| AlwaysFailureNode)),
            ("IsTrue", boxify(|| IsTrueNode)),
            ("SetBool", boxify(|| SetBoolNode)),
            ("Print", boxify(|| PrintNode)),
            (
                "Sleep",
                boxify(|| StatefulActionNode::new(SleepAction::default())),
            ),
        ];
        for (name, constructor) in builtins {
            ret.insert(name, constructor);
        }
        ret
    }
}

impl Registry {
    /// A registry without the built-in node types.
    pub fn empty() -> Self {
        Self {
            node_types: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        type_name: impl ToString,
        constructor: Constructor,
    ) -> Result<(), RegistryError> {
        let type_name = type_name.to_string();
        if self.node_types.contains_key(&type_name) {
            return Err(RegistryError::DuplicateRegistration { type_name });
        }
        self.insert(&type_name, constructor);
        Ok(())
    }

    fn insert(&mut self, type_name: &str, constructor: Constructor) {
        let probe = constructor();
        self.node_types.insert(
            type_name.to_owned(),
            RegistryEntry {
                ports: probe.provided_ports(),
                kind: probe.kind(),
                constructor,
            },
        );
    }

    pub fn build(&self, type_name: &str) -> Option<Box<dyn BehaviorNode>> {
        self.node_types
            .get(type_name)
            .map(|entry| (entry.constructor)())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.node_types.contains_key(type_name)
    }

    /// Port manifest declared by `type_name`.
    pub fn ports(&self, type_name: &str) -> Option<&[PortSpec]> {
        self.node_types
            .get(type_name)
            .map(|entry| entry.ports.as_slice())
    }

    pub fn kind(&self, type_name: &str) -> Option<NodeKind> {
        self.node_types.get(type_name).map(|entry| entry.kind)
    }
}
