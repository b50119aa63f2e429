use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::{
    error::{AddChildError, AddChildResult, TickError},
    BehaviorCallback, BehaviorNode, BehaviorNodeContainer, BlackboardRef, Context, NodeKind,
    NodeStatus, PortSpec, Symbol, TickResult, Value, ValueType,
};

fn halt_all(children: &mut [BehaviorNodeContainer]) {
    for child in children {
        child.halt();
    }
}

fn push_single(
    slot: &mut Option<BehaviorNodeContainer>,
    child: BehaviorNodeContainer,
) -> AddChildResult {
    if slot.is_some() {
        return Err(AddChildError::TooManyNodes);
    }
    *slot = Some(child);
    Ok(())
}

fn single_slice(slot: &Option<BehaviorNodeContainer>) -> &[BehaviorNodeContainer] {
    slot.as_ref().map(std::slice::from_ref).unwrap_or(&[])
}

/// SubtreeNode is a container for a subtree, introducing a local namescope of blackboard variables.
///
/// The subtree's blackboard is a child of the enclosing one, so reads fall
/// through to the enclosing tree. Parameters declared `in` or `inout` are
/// copied into the subtree scope before every tick; `out` and `inout`
/// parameters are copied back out afterwards.
pub struct SubtreeNode {
    child: Option<BehaviorNodeContainer>,
    blackboard: BlackboardRef,
    params: Vec<PortSpec>,
}

impl SubtreeNode {
    pub fn new(blackboard: BlackboardRef, params: Vec<PortSpec>) -> Self {
        Self {
            child: None,
            blackboard,
            params,
        }
    }

    pub fn blackboard(&self) -> &BlackboardRef {
        &self.blackboard
    }
}

impl BehaviorNode for SubtreeNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.params.clone()
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let child = match self.child.as_mut() {
            Some(child) => child,
            None => return Ok(NodeStatus::Failure),
        };

        for param in self.params.iter().filter(|param| param.ty.can_read()) {
            let Some(value) = ctx.get_opt::<Value>(param.key)? else {
                continue;
            };
            // Literals arrive as strings; typed parameters store them typed.
            let value = match (param.value_type, value) {
                (Some(ty), Value::String(s)) if ty != ValueType::String => Value::parse_as(&s, ty)
                    .ok_or_else(|| TickError::InvalidPort {
                        port: param.key,
                        reason: format!("{:?} is not a valid {:?}", s, ty),
                    })?,
                (_, value) => value,
            };
            self.blackboard.borrow_mut().set(param.key, value)?;
        }

        let res = ctx.with_scope(&self.blackboard, |ctx| child.tick(arg, ctx))?;

        // Outputs are copied back whatever the result, Running and Failure
        // included.
        for param in self.params.iter().filter(|param| param.ty.can_write()) {
            let value = self.blackboard.borrow().get(param.key).ok();
            if let Some(value) = value {
                ctx.set(param.key, value)?;
            }
        }

        Ok(res)
    }

    fn halt(&mut self) {
        if let Some(child) = self.child.as_mut() {
            child.halt();
        }
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        push_single(&mut self.child, child)
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        single_slice(&self.child)
    }

    fn min_children(&self) -> usize {
        1
    }
}

/// Ticks children in order, resuming at the child that returned `Running`.
#[derive(Default)]
pub struct SequenceNode {
    children: Vec<BehaviorNodeContainer>,
    current_child: Option<usize>,
    skipped: usize,
}

impl BehaviorNode for SequenceNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let from = self.current_child.unwrap_or(0);
        if from == 0 {
            self.skipped = 0;
        }
        for i in from..self.children.len() {
            match self.children[i].tick(arg, ctx)? {
                NodeStatus::Failure => {
                    self.halt();
                    return Ok(NodeStatus::Failure);
                }
                NodeStatus::Running => {
                    self.current_child = Some(i);
                    return Ok(NodeStatus::Running);
                }
                NodeStatus::Skipped => self.skipped += 1,
                _ => (),
            }
        }
        let all_skipped = !self.children.is_empty() && self.skipped == self.children.len();
        self.halt();
        Ok(if all_skipped {
            NodeStatus::Skipped
        } else {
            NodeStatus::Success
        })
    }

    fn halt(&mut self) {
        halt_all(&mut self.children);
        self.current_child = None;
        self.skipped = 0;
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        self.children.push(child);
        Ok(())
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        &self.children
    }
}

/// Like [`SequenceNode`], but every tick starts over from the first child so
/// that earlier conditions are checked again.
#[derive(Default)]
pub struct ReactiveSequenceNode {
    children: Vec<BehaviorNodeContainer>,
}

impl BehaviorNode for ReactiveSequenceNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let mut skipped = 0;
        for i in 0..self.children.len() {
            match self.children[i].tick(arg, ctx)? {
                NodeStatus::Failure => {
                    self.halt();
                    return Ok(NodeStatus::Failure);
                }
                NodeStatus::Running => {
                    // A child further right may still be running from an
                    // earlier tick; it is abandoned now.
                    halt_all(&mut self.children[i + 1..]);
                    return Ok(NodeStatus::Running);
                }
                NodeStatus::Skipped => skipped += 1,
                _ => (),
            }
        }
        self.halt();
        Ok(
            if !self.children.is_empty() && skipped == self.children.len() {
                NodeStatus::Skipped
            } else {
                NodeStatus::Success
            },
        )
    }

    fn halt(&mut self) {
        halt_all(&mut self.children);
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        self.children.push(child);
        Ok(())
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        &self.children
    }
}

/// Ticks children in order until one succeeds, resuming at the child that
/// returned `Running`.
#[derive(Default)]
pub struct FallbackNode {
    children: Vec<BehaviorNodeContainer>,
    current_child: Option<usize>,
    skipped: usize,
}

impl BehaviorNode for FallbackNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let from = self.current_child.unwrap_or(0);
        if from == 0 {
            self.skipped = 0;
        }
        for i in from..self.children.len() {
            match self.children[i].tick(arg, ctx)? {
                NodeStatus::Success => {
                    self.halt();
                    return Ok(NodeStatus::Success);
                }
                NodeStatus::Running => {
                    self.current_child = Some(i);
                    return Ok(NodeStatus::Running);
                }
                NodeStatus::Skipped => self.skipped += 1,
                _ => (),
            }
        }
        let all_skipped = !self.children.is_empty() && self.skipped == self.children.len();
        self.halt();
        Ok(if all_skipped {
            NodeStatus::Skipped
        } else {
            NodeStatus::Failure
        })
    }

    fn halt(&mut self) {
        halt_all(&mut self.children);
        self.current_child = None;
        self.skipped = 0;
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        self.children.push(child);
        Ok(())
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        &self.children
    }
}

#[derive(Default)]
pub struct ReactiveFallbackNode {
    children: Vec<BehaviorNodeContainer>,
}

impl BehaviorNode for ReactiveFallbackNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let mut skipped = 0;
        for i in 0..self.children.len() {
            match self.children[i].tick(arg, ctx)? {
                NodeStatus::Success => {
                    self.halt();
                    return Ok(NodeStatus::Success);
                }
                NodeStatus::Running => {
                    halt_all(&mut self.children[i + 1..]);
                    return Ok(NodeStatus::Running);
                }
                NodeStatus::Skipped => skipped += 1,
                _ => (),
            }
        }
        self.halt();
        Ok(
            if !self.children.is_empty() && skipped == self.children.len() {
                NodeStatus::Skipped
            } else {
                NodeStatus::Failure
            },
        )
    }

    fn halt(&mut self) {
        halt_all(&mut self.children);
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        self.children.push(child);
        Ok(())
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        &self.children
    }
}

pub(crate) static SUCCESS_COUNT: Lazy<Symbol> = Lazy::new(|| "success_count".into());

/// Ticks every child that has not finished yet, once per tick.
///
/// Succeeds as soon as `success_count` children have succeeded (a negative
/// count means every child that was not skipped) and fails as soon as enough
/// children have failed that the count can no longer be reached. Children
/// still running at that point are halted.
#[derive(Default)]
pub struct ParallelNode {
    children: Vec<BehaviorNodeContainer>,
    /// Children that finished during the current run, by index.
    finished: Vec<Option<NodeStatus>>,
}

impl ParallelNode {
    fn reset(&mut self) {
        halt_all(&mut self.children);
        self.finished.clear();
    }
}

impl BehaviorNode for ParallelNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*SUCCESS_COUNT)
            .typed(ValueType::Int)
            .with_default(-1)]
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let n = self.children.len();
        // `None` means every child that is not skipped.
        let wanted = match ctx.get_opt::<i64>(*SUCCESS_COUNT)? {
            Some(count) if count >= 0 => Some(count as usize),
            _ => None,
        };
        if let Some(wanted) = wanted.filter(|wanted| *wanted > n) {
            return Err(TickError::InvalidPort {
                port: *SUCCESS_COUNT,
                reason: format!("{} successes required from {} children", wanted, n),
            });
        }

        self.finished.resize(n, None);
        for i in 0..n {
            if self.finished[i].is_some() {
                continue;
            }
            match self.children[i].tick(arg, ctx)? {
                NodeStatus::Running => (),
                status => self.finished[i] = Some(status),
            }
        }

        let count = |status| {
            self.finished
                .iter()
                .filter(|finished| **finished == Some(status))
                .count()
        };
        let successes = count(NodeStatus::Success);
        let failures = count(NodeStatus::Failure);
        let skipped = count(NodeStatus::Skipped);
        let active = n - skipped;
        let running = active - successes - failures;
        let required = wanted.unwrap_or(active);

        let status = if n > 0 && skipped == n {
            NodeStatus::Skipped
        } else if successes >= required {
            NodeStatus::Success
        } else if failures > active.saturating_sub(required) || successes + running < required {
            NodeStatus::Failure
        } else {
            return Ok(NodeStatus::Running);
        };
        self.reset();
        Ok(status)
    }

    fn halt(&mut self) {
        self.reset();
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        self.children.push(child);
        Ok(())
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        &self.children
    }
}

#[derive(Default)]
pub struct ForceSuccessNode(Option<BehaviorNodeContainer>);

impl BehaviorNode for ForceSuccessNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let Some(child) = self.0.as_mut() else {
            return Ok(NodeStatus::Failure);
        };
        Ok(match child.tick(arg, ctx)? {
            NodeStatus::Success | NodeStatus::Failure => NodeStatus::Success,
            status => status,
        })
    }

    fn halt(&mut self) {
        if let Some(child) = self.0.as_mut() {
            child.halt();
        }
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        push_single(&mut self.0, child)
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        single_slice(&self.0)
    }

    fn min_children(&self) -> usize {
        1
    }
}

#[derive(Default)]
pub struct ForceFailureNode(Option<BehaviorNodeContainer>);

impl BehaviorNode for ForceFailureNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let Some(child) = self.0.as_mut() else {
            return Ok(NodeStatus::Failure);
        };
        Ok(match child.tick(arg, ctx)? {
            NodeStatus::Success | NodeStatus::Failure => NodeStatus::Failure,
            status => status,
        })
    }

    fn halt(&mut self) {
        if let Some(child) = self.0.as_mut() {
            child.halt();
        }
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        push_single(&mut self.0, child)
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        single_slice(&self.0)
    }

    fn min_children(&self) -> usize {
        1
    }
}

#[derive(Default)]
pub struct InverterNode(Option<BehaviorNodeContainer>);

impl BehaviorNode for InverterNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let Some(child) = self.0.as_mut() else {
            return Ok(NodeStatus::Failure);
        };
        Ok(child.tick(arg, ctx)?.invert())
    }

    fn halt(&mut self) {
        if let Some(child) = self.0.as_mut() {
            child.halt();
        }
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        push_single(&mut self.0, child)
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        single_slice(&self.0)
    }

    fn min_children(&self) -> usize {
        1
    }
}

pub(crate) static NUM_CYCLES: Lazy<Symbol> = Lazy::new(|| "num_cycles".into());

/// Ticks the child until it has succeeded `num_cycles` times in a row.
///
/// Successive cycles run within the same tick; a `Running` child suspends
/// the loop and the count carries over to the next tick.
#[derive(Default)]
pub struct RepeatNode {
    completed: usize,
    child: Option<BehaviorNodeContainer>,
}

impl BehaviorNode for RepeatNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*NUM_CYCLES).typed(ValueType::Int)]
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let cycles = ctx.get::<usize>(*NUM_CYCLES)?;
        let Some(child) = self.child.as_mut() else {
            return Ok(NodeStatus::Failure);
        };
        while self.completed < cycles {
            match child.tick(arg, ctx)? {
                NodeStatus::Success => {
                    self.completed += 1;
                    child.halt();
                }
                NodeStatus::Running => return Ok(NodeStatus::Running),
                status => {
                    self.completed = 0;
                    child.halt();
                    return Ok(status);
                }
            }
        }
        self.completed = 0;
        Ok(NodeStatus::Success)
    }

    fn halt(&mut self) {
        self.completed = 0;
        if let Some(child) = self.child.as_mut() {
            child.halt();
        }
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        push_single(&mut self.child, child)
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        single_slice(&self.child)
    }

    fn min_children(&self) -> usize {
        1
    }
}

pub(crate) static NUM_ATTEMPTS: Lazy<Symbol> = Lazy::new(|| "num_attempts".into());

/// Re-ticks a failing child up to `num_attempts` times before giving up.
///
/// Failed attempts are retried within the same tick and never reach the
/// parent; only the final outcome does.
#[derive(Default)]
pub struct RetryNode {
    failed: usize,
    child: Option<BehaviorNodeContainer>,
}

impl BehaviorNode for RetryNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*NUM_ATTEMPTS).typed(ValueType::Int)]
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let attempts = ctx.get::<usize>(*NUM_ATTEMPTS)?;
        let Some(child) = self.child.as_mut() else {
            return Ok(NodeStatus::Failure);
        };
        while self.failed < attempts {
            match child.tick(arg, ctx)? {
                NodeStatus::Failure => {
                    self.failed += 1;
                    debug!(attempt = self.failed, of = attempts, "child failed");
                    child.halt();
                }
                NodeStatus::Running => return Ok(NodeStatus::Running),
                status => {
                    self.failed = 0;
                    child.halt();
                    return Ok(status);
                }
            }
        }
        self.failed = 0;
        Ok(NodeStatus::Failure)
    }

    fn halt(&mut self) {
        self.failed = 0;
        if let Some(child) = self.child.as_mut() {
            child.halt();
        }
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        push_single(&mut self.child, child)
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        single_slice(&self.child)
    }

    fn min_children(&self) -> usize {
        1
    }
}

pub(crate) static MSEC: Lazy<Symbol> = Lazy::new(|| "msec".into());

/// Fails and halts the child if it is still running `msec` milliseconds
/// after it was first ticked.
///
/// The deadline is only checked when this node is ticked; nothing runs in
/// the background.
#[derive(Default)]
pub struct TimeoutNode {
    deadline: Option<Instant>,
    child: Option<BehaviorNodeContainer>,
}

impl BehaviorNode for TimeoutNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in(*MSEC).typed(ValueType::Int)]
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Decorator
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let Some(child) = self.child.as_mut() else {
            return Ok(NodeStatus::Failure);
        };
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                warn!("timed out, halting child");
                child.halt();
                self.deadline = None;
                return Ok(NodeStatus::Failure);
            }
            Some(_) => (),
            None => {
                let msec = ctx.get::<u64>(*MSEC)?;
                self.deadline = Some(Instant::now() + Duration::from_millis(msec));
            }
        }
        let status = child.tick(arg, ctx)?;
        if status != NodeStatus::Running {
            self.deadline = None;
        }
        Ok(status)
    }

    fn halt(&mut self) {
        self.deadline = None;
        if let Some(child) = self.child.as_mut() {
            child.halt();
        }
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        push_single(&mut self.child, child)
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        single_slice(&self.child)
    }

    fn min_children(&self) -> usize {
        1
    }
}

/// `if` node: the first child is the condition, the second the `then` branch
/// and the optional third the `else` branch.
///
/// When the condition fails and there is no `else` branch, the node reports
/// `Skipped`.
#[derive(Default)]
pub struct IfNode {
    children: Vec<BehaviorNodeContainer>,
    condition_result: Option<NodeStatus>,
}

impl BehaviorNode for IfNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Control
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let condition_result = match self.condition_result {
            Some(result) => result,
            None => match self.children.first_mut() {
                Some(condition) => condition.tick(arg, ctx)?,
                None => NodeStatus::Failure,
            },
        };

        let branch_result = match condition_result {
            NodeStatus::Success => match self.children.get_mut(1) {
                Some(then) => then.tick(arg, ctx)?,
                None => NodeStatus::Failure,
            },
            NodeStatus::Failure => match self.children.get_mut(2) {
                Some(otherwise) => otherwise.tick(arg, ctx)?,
                None => NodeStatus::Skipped,
            },
            status => status,
        };

        if branch_result == NodeStatus::Running {
            // Remember which branch is running, unless it is the condition itself
            if condition_result != NodeStatus::Running {
                self.condition_result = Some(condition_result);
            }
        } else {
            self.halt();
        }

        Ok(branch_result)
    }

    fn halt(&mut self) {
        halt_all(&mut self.children);
        self.condition_result = None;
    }

    fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        if self.children.len() < 3 {
            self.children.push(child);
            Ok(())
        } else {
            Err(AddChildError::TooManyNodes)
        }
    }

    fn children(&self) -> &[BehaviorNodeContainer] {
        &self.children
    }

    fn min_children(&self) -> usize {
        2
    }
}
