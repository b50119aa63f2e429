//! Built-in leaf nodes and the [`StatefulAction`] helper for long-running
//! actions.

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::{
    nodes::MSEC, BehaviorCallback, BehaviorNode, Context, NodeKind, NodeStatus, PortSpec, Symbol,
    TickResult, ValueType,
};

/// An action that is started once and then polled until it completes.
///
/// `on_start` runs on the first tick after the node was idle. If it returns
/// `Running`, later ticks call `on_running` until a terminal status comes
/// back. `on_halted` is called when the action is abandoned while running.
/// None of these may block: start the work elsewhere and check on it.
pub trait StatefulAction {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![]
    }

    fn on_start(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult;

    fn on_running(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult;

    fn on_halted(&mut self) {}
}

/// Adapts a [`StatefulAction`] to [`BehaviorNode`].
pub struct StatefulActionNode<T> {
    action: T,
    running: bool,
}

impl<T: StatefulAction> StatefulActionNode<T> {
    pub fn new(action: T) -> Self {
        Self {
            action,
            running: false,
        }
    }
}

impl<T: StatefulAction> BehaviorNode for StatefulActionNode<T> {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.action.provided_ports()
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let status = if self.running {
            self.action.on_running(arg, ctx)
        } else {
            self.action.on_start(arg, ctx)
        };
        self.running = matches!(status, Ok(NodeStatus::Running));
        status
    }

    fn halt(&mut self) {
        if self.running {
            self.running = false;
            self.action.on_halted();
        }
    }
}

pub struct AlwaysSuccessNode;

impl BehaviorNode for AlwaysSuccessNode {
    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        Ok(NodeStatus::Success)
    }
}

pub struct AlwaysFailureNode;

impl BehaviorNode for AlwaysFailureNode {
    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        Ok(NodeStatus::Failure)
    }
}

pub(crate) static VALUE: Lazy<Symbol> = Lazy::new(|| "value".into());
pub(crate) static OUTPUT: Lazy<Symbol> = Lazy::new(|| "output".into());

/// Writes the boolean `value` to `output`. Declaring `var flag = true` in a
/// tree definition becomes one of these.
pub(crate) struct SetBoolNode;

impl BehaviorNode for SetBoolNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in(*VALUE).typed(ValueType::Bool),
            PortSpec::new_out(*OUTPUT).typed(ValueType::Bool),
        ]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let value = ctx.get::<bool>(*VALUE)?;
        ctx.set(*OUTPUT, value)?;
        Ok(NodeStatus::Success)
    }
}

pub(crate) static INPUT: Lazy<Symbol> = Lazy::new(|| "input".into());

/// Succeeds if `input` is true. A missing or non-boolean input is a plain
/// failure, so a variable that was never set reads as false.
pub struct IsTrueNode;

impl BehaviorNode for IsTrueNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*INPUT).typed(ValueType::Bool)]
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Condition
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        match ctx.get::<bool>(*INPUT) {
            Ok(true) => Ok(NodeStatus::Success),
            Ok(false) => Ok(NodeStatus::Failure),
            Err(e) => {
                warn!("IsTrue: {}", e);
                Ok(NodeStatus::Failure)
            }
        }
    }
}

pub(crate) static MESSAGE: Lazy<Symbol> = Lazy::new(|| "message".into());

/// Logs `message` and hands it to the environment callback as a `String`.
/// A missing message is an error, not a failure.
pub struct PrintNode;

impl BehaviorNode for PrintNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*MESSAGE).typed(ValueType::String)]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let message = ctx.get::<String>(*MESSAGE)?;
        info!(target: "beech_tree::print", "{}", message);
        arg(&message);
        Ok(NodeStatus::Success)
    }
}

/// Returns `Running` until `msec` milliseconds have passed since it started.
#[derive(Default)]
pub struct SleepAction {
    deadline: Option<Instant>,
}

impl StatefulAction for SleepAction {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*MSEC).typed(ValueType::Int)]
    }

    fn on_start(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let msec = ctx.get::<u64>(*MSEC)?;
        if msec == 0 {
            return Ok(NodeStatus::Success);
        }
        self.deadline = Some(Instant::now() + Duration::from_millis(msec));
        Ok(NodeStatus::Running)
    }

    fn on_running(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        match self.deadline {
            Some(deadline) if Instant::now() < deadline => Ok(NodeStatus::Running),
            _ => {
                self.deadline = None;
                Ok(NodeStatus::Success)
            }
        }
    }

    fn on_halted(&mut self) {
        self.deadline = None;
    }
}
