use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use beech_tree::{
    boxify,
    error::{BlackboardError, RegistryError, TickError},
    hash_map, load_str, load_yaml, BehaviorCallback, BehaviorNode, BehaviorNodeContainer,
    Blackboard, BlackboardValue, Context, NodeStatus, PortSpec, PortType, ReactiveSequenceNode,
    Registry, SequenceNode, TickResult, Tree, Value, ValueType,
};

struct Running {
    halts: Rc<Cell<usize>>,
}

impl BehaviorNode for Running {
    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        Ok(NodeStatus::Running)
    }

    fn halt(&mut self) {
        self.halts.set(self.halts.get() + 1);
    }
}

/// Succeeds once, then fails with an error.
struct Boom {
    armed: bool,
}

impl BehaviorNode for Boom {
    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        if self.armed {
            return Err(TickError::Node("boom".to_owned()));
        }
        self.armed = true;
        Ok(NodeStatus::Success)
    }
}

#[test]
fn test_error_halts_tree() {
    let halts = Rc::new(Cell::new(0));
    let mut root =
        BehaviorNodeContainer::new_node(ReactiveSequenceNode::default()).with_name("root");
    root.add_child(BehaviorNodeContainer::new_node(Boom { armed: false }).with_name("Boom"))
        .unwrap();
    root.add_child(BehaviorNodeContainer::new_node(Running {
        halts: halts.clone(),
    }))
    .unwrap();
    let mut tree = Tree::from_root(root);

    assert_eq!(tree.tick_root().unwrap(), NodeStatus::Running);
    let err = tree.tick_root().unwrap_err();
    assert_eq!(err.path(), Some("root/Boom"));
    assert!(matches!(err.root_cause(), TickError::Node(message) if message == "boom"));
    assert_eq!(halts.get(), 1);
    assert_eq!(tree.status(), NodeStatus::Idle);

    tree.halt_tree();
    assert_eq!(halts.get(), 1);
}

#[test]
fn test_drop_halts_tree() {
    let halts = Rc::new(Cell::new(0));
    let mut root = BehaviorNodeContainer::new_node(SequenceNode::default());
    root.add_child(BehaviorNodeContainer::new_node(Running {
        halts: halts.clone(),
    }))
    .unwrap();
    let mut tree = Tree::from_root(root);
    assert_eq!(tree.tick_root().unwrap(), NodeStatus::Running);
    drop(tree);
    assert_eq!(halts.get(), 1);
}

struct Add;

impl BehaviorNode for Add {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::new_in("a").typed(ValueType::Int),
            PortSpec::new_in("b").typed(ValueType::Int),
            PortSpec::new_out("sum").typed(ValueType::Int),
        ]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let sum = ctx.get::<i64>("a")? + ctx.get::<i64>("b")?;
        ctx.set("sum", sum)?;
        Ok(NodeStatus::Success)
    }
}

#[test]
fn test_blackboard_round_trip() {
    let mut registry = Registry::default();
    registry.register("Add", boxify(|| Add)).unwrap();
    let mut tree = load_str(
        r#"
tree main = Sequence {
    Add (a <- "2", b <- "3", sum -> x)
    Add (a <- x, b <- x, sum -> y)
}
"#,
        &registry,
        true,
    )
    .unwrap();
    assert_eq!(tree.tick_root().unwrap(), NodeStatus::Success);
    let bb = tree.blackboard().borrow();
    assert_eq!(bb.get("x"), Ok(Value::Int(5)));
    assert_eq!(bb.get_as::<i64>("y"), Ok(10));
}

#[test]
fn test_blackboard_types() {
    let parent = Blackboard::new_ref();
    parent.borrow_mut().set("speed", 1.5f64).unwrap();
    assert_eq!(
        parent.borrow_mut().set("speed", "fast"),
        Err(BlackboardError::TypeMismatch {
            key: "speed".into(),
            expected: ValueType::Double,
            found: ValueType::String,
        })
    );

    // A child scope reads through to its parent and may shadow it.
    let child = Blackboard::create_child(&parent);
    assert_eq!(child.borrow().get_as::<f64>("speed"), Ok(1.5));
    child.borrow_mut().set("speed", "fast").unwrap();
    assert_eq!(child.borrow().get_as::<String>("speed"), Ok("fast".to_owned()));
    assert_eq!(parent.borrow().get("speed"), Ok(Value::Double(1.5)));
}

struct CopyNode;

impl BehaviorNode for CopyNode {
    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let value = ctx.get_value("from")?;
        ctx.set("to", value)?;
        Ok(NodeStatus::Success)
    }
}

#[test]
fn test_context_ports() {
    let mut ctx = Context::default();
    ctx.blackboard().borrow_mut().set("target", "kitchen").unwrap();

    let mut node = BehaviorNodeContainer::new(
        Box::new(CopyNode),
        hash_map!(
            "from" => BlackboardValue::Ref("target".into(), PortType::Input),
            "to" => BlackboardValue::Ref("destination".into(), PortType::Output),
        ),
    );
    assert_eq!(
        node.tick(&mut |_| None, &mut ctx).unwrap(),
        NodeStatus::Success
    );
    assert_eq!(
        ctx.blackboard().borrow().get_as::<String>("destination"),
        Ok("kitchen".to_owned())
    );

    // A literal cannot be written.
    let mut node = BehaviorNodeContainer::new(
        Box::new(CopyNode),
        hash_map!("from" => "kitchen", "to" => "nowhere"),
    );
    let err = node.tick(&mut |_| None, &mut ctx).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        TickError::Blackboard(BlackboardError::WriteToLiteral { .. })
    ));
}

#[test]
fn test_registry() {
    let mut registry = Registry::default();
    registry.register("Add", boxify(|| Add)).unwrap();
    assert!(matches!(
        registry.register("Add", boxify(|| Add)),
        Err(RegistryError::DuplicateRegistration { .. })
    ));
    assert_eq!(registry.ports("Add").map(|ports| ports.len()), Some(3));
}

#[test]
fn test_same_tree_from_both_formats() {
    let registry = Registry::default();
    let source = r#"
tree main = Sequence {
    SetBool (value <- "true", output -> flag)
    RetryUntilSuccessful "again" (num_attempts <- "2") {
        IsTrue (input <- flag)
    }
}
"#;
    let yaml = r#"
behavior_tree:
  main:
    type: Sequence
    children:
    - type: SetBool
      inputs:
        value: "true"
      outputs:
        output: flag
    - type: RetryUntilSuccessful
      name: again
      inputs:
        num_attempts: 2
      children:
      - type: IsTrue
        inputs:
          input: "{flag}"
"#;
    let first = load_str(source, &registry, true).unwrap();
    let second = load_str(source, &registry, true).unwrap();
    let from_yaml = load_yaml(yaml, &registry, true).unwrap();

    assert_eq!(first.outline(), second.outline());
    assert_eq!(first.outline(), from_yaml.outline());
    assert_eq!(
        first.outline(),
        r#"Sequence
  SetBool (output Output flag, value = "true")
  RetryUntilSuccessful "again" (num_attempts = "2")
    IsTrue (input Input flag)
"#
    );
}

#[test]
fn test_tick_while_running() {
    let source = r#"
tree main = Sequence {
    Sleep (msec <- "5")
    Print (message <- "done")
}
"#;
    let mut tree = load_str(source, &Registry::default(), true).unwrap();
    let mut printed = vec![];
    let status = tree
        .tick_while_running(
            &mut |v| {
                if let Some(s) = v.downcast_ref::<String>() {
                    printed.push(s.clone());
                }
                None
            },
            Duration::from_millis(1),
        )
        .unwrap();
    assert_eq!(status, NodeStatus::Success);
    assert_eq!(printed, vec!["done".to_owned()]);
}
