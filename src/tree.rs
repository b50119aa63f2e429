use std::rc::Rc;
use std::time::Duration;

use tracing::{error, info};

use crate::{
    BehaviorCallback, BehaviorNodeContainer, Blackboard, BlackboardRef, Context, NodeStatus,
    TickResult,
};

/// A built behavior tree: the root node and the blackboard it runs against.
///
/// Ticking takes `&mut self`, so a tree cannot be ticked again while a tick
/// is in progress. Dropping a tree halts whatever is still running.
pub struct Tree {
    root: BehaviorNodeContainer,
    blackboard: BlackboardRef,
}

impl Tree {
    pub fn new(root: BehaviorNodeContainer, blackboard: BlackboardRef) -> Self {
        Self { root, blackboard }
    }

    /// A tree with a fresh root blackboard.
    pub fn from_root(root: BehaviorNodeContainer) -> Self {
        Self::new(root, Blackboard::new_ref())
    }

    pub fn tick_root(&mut self) -> TickResult {
        self.tick_root_with(&mut |_| None)
    }

    /// Tick the root once, passing `arg` down to every node that is ticked.
    ///
    /// An error aborts the tick, halts the whole tree and is returned with the
    /// path of the node that raised it.
    pub fn tick_root_with(&mut self, arg: BehaviorCallback) -> TickResult {
        let mut ctx = Context::new(Rc::clone(&self.blackboard));
        match self.root.tick(arg, &mut ctx) {
            Ok(status) => Ok(status),
            Err(e) => {
                error!(
                    path = e.path().unwrap_or_default(),
                    error = %e.root_cause(),
                    "tick failed, halting tree"
                );
                self.halt_tree();
                Err(e)
            }
        }
    }

    /// Halt every running node. Harmless on a tree that is not running.
    pub fn halt_tree(&mut self) {
        self.root.halt();
    }

    /// Tick until the root returns something other than `Running`, sleeping
    /// `interval` between ticks.
    pub fn tick_while_running(
        &mut self,
        arg: BehaviorCallback,
        interval: Duration,
    ) -> TickResult {
        info!(tree = %self.root.instance_name(), "start");
        let status = loop {
            let status = self.tick_root_with(arg)?;
            if status != NodeStatus::Running {
                break status;
            }
            std::thread::sleep(interval);
        };
        info!(?status, "end");
        Ok(status)
    }

    /// Status the root returned last, `Idle` before the first tick and after
    /// a halt.
    pub fn status(&self) -> NodeStatus {
        self.root.status()
    }

    pub fn blackboard(&self) -> &BlackboardRef {
        &self.blackboard
    }

    pub fn root(&self) -> &BehaviorNodeContainer {
        &self.root
    }

    /// One line per node, children indented below their parent.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.root.write_outline(&mut out, 0);
        out
    }
}

impl std::fmt::Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.outline())
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        self.halt_tree();
    }
}
