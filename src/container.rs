use tracing::{debug, trace, trace_span};

use crate::{
    error::{AddChildResult, TickError},
    BBMap, BehaviorCallback, BehaviorNode, BlackboardValue, Context, NodeKind, NodeStatus,
    TickResult,
};

/// Owns one node of a tree together with everything the tree needs to know
/// about it: its type name, optional instance label, port bindings and the
/// status it returned last.
///
/// Composite nodes hold their children as containers, so status bookkeeping,
/// port map swapping, tracing and halting happen here in one place instead of
/// in every node implementation.
pub struct BehaviorNodeContainer {
    /// Name of the type of the node
    pub(crate) name: String,
    pub(crate) label: Option<String>,
    pub(crate) node: Box<dyn BehaviorNode>,
    pub(crate) blackboard_map: BBMap,
    pub(crate) status: NodeStatus,
}

impl BehaviorNodeContainer {
    pub fn new(node: Box<dyn BehaviorNode>, blackboard_map: BBMap) -> Self {
        Self {
            name: String::new(),
            label: None,
            node,
            blackboard_map,
            status: NodeStatus::Idle,
        }
    }

    pub fn new_node(node: impl BehaviorNode + 'static) -> Self {
        Self::new(Box::new(node), BBMap::new())
    }

    pub(crate) fn new_with_name(
        node: Box<dyn BehaviorNode>,
        name: String,
        label: Option<String>,
        blackboard_map: BBMap,
    ) -> Self {
        Self {
            name,
            label,
            node,
            blackboard_map,
            status: NodeStatus::Idle,
        }
    }

    /// Set the name shown in traces and error paths.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let span = trace_span!("tick", node = %self.instance_name());
        let _enter = span.enter();

        std::mem::swap(&mut self.blackboard_map, &mut ctx.blackboard_map);
        let res = self.node.tick(arg, ctx);
        std::mem::swap(&mut self.blackboard_map, &mut ctx.blackboard_map);

        let res = res.and_then(|status| match status {
            NodeStatus::Idle => Err(TickError::IdleReturned),
            NodeStatus::Running if self.node.kind() == NodeKind::Condition => {
                Err(TickError::ConditionRunning)
            }
            status => Ok(status),
        });

        match res {
            Ok(status) => {
                trace!(?status, "returned");
                self.status = status;
                Ok(status)
            }
            Err(e) => {
                // Whatever this node had in flight is abandoned with the error.
                self.node.halt();
                self.status = NodeStatus::Idle;
                Err(e.within(&self.instance_name()))
            }
        }
    }

    /// Cancel the node if it is running and reset it to `Idle`. Calling it
    /// again, or on a node that is not running, only resets the status.
    pub fn halt(&mut self) {
        if self.status == NodeStatus::Running {
            debug!(node = %self.instance_name(), "halted");
            self.node.halt();
        }
        self.status = NodeStatus::Idle;
    }

    pub fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        self.node.add_child(child)
    }

    pub fn children(&self) -> &[BehaviorNodeContainer] {
        self.node.children()
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The label if there is one, otherwise the type name.
    pub fn instance_name(&self) -> String {
        match (&self.label, self.name.is_empty()) {
            (Some(label), _) => format!("{}({})", self.name, label),
            (None, false) => self.name.clone(),
            (None, true) => "<anonymous>".to_owned(),
        }
    }

    pub fn blackboard_map(&self) -> &BBMap {
        &self.blackboard_map
    }

    /// Write an indented outline of this subtree: one line per node with its
    /// type, label and port bindings sorted by port name.
    pub fn write_outline(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.name);
        if let Some(label) = &self.label {
            out.push_str(&format!(" {:?}", label));
        }
        let mut ports: Vec<_> = self.blackboard_map.iter().collect();
        ports.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        if !ports.is_empty() {
            let ports: Vec<_> = ports
                .into_iter()
                .map(|(port, value)| match value {
                    BlackboardValue::Ref(key, ty) => format!("{} {:?} {}", port, ty, key),
                    BlackboardValue::Literal(lit) => format!("{} = {:?}", port, lit),
                })
                .collect();
            out.push_str(&format!(" ({})", ports.join(", ")));
        }
        out.push('\n');
        for child in self.children() {
            child.write_outline(out, depth + 1);
        }
    }
}

impl std::fmt::Debug for BehaviorNodeContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorNodeContainer")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("status", &self.status)
            .field("children", &self.children())
            .finish()
    }
}
