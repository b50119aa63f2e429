use super::*;
use crate::{
    boxify, error::LoadError, load_str, BehaviorCallback, Context, NodeStatus, Symbol, TickResult,
};

struct PrintNode;

impl BehaviorNode for PrintNode {
    fn tick(&mut self, arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        arg(&42);
        Ok(NodeStatus::Success)
    }
}

fn registry() -> Registry {
    let mut registry = Registry::default();
    registry
        .register("PrintNode", boxify(|| PrintNode))
        .unwrap();
    registry.register("SendToArg", boxify(|| SendToArg)).unwrap();
    registry.register("Double", boxify(|| DoubleNode)).unwrap();
    registry.register("Counter", boxify(|| Counter)).unwrap();
    registry
}

fn tick_collect(tree: &mut Tree) -> (TickResult, Vec<i32>) {
    let mut values = vec![];
    let result = tree.tick_root_with(&mut |val| {
        if let Some(val) = val.downcast_ref::<i32>() {
            values.push(*val);
        }
        None
    });
    (result, values)
}

#[test]
fn test_subtree() {
    let tree = r#"
tree main = Sequence {
    sub
}

tree sub = Fallback {
    PrintNode
}
    "#;

    let (_, tree_source) = crate::parse_file(tree).unwrap();
    let mut tree = load(&tree_source, &registry(), true).unwrap();

    let (result, values) = tick_collect(&mut tree);
    assert_eq!(result.unwrap(), NodeStatus::Success);
    assert_eq!(values, vec![42]);
}

struct SendToArg;

impl BehaviorNode for SendToArg {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("input")]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let input = ctx.get::<i32>("input")?;
        arg(&input);
        Ok(NodeStatus::Success)
    }
}

#[test]
fn test_subtree_map() {
    let tree = r#"
tree main = Sequence {
sub(input <- "96")
}

tree sub(in input, out output) = Fallback {
SendToArg (input <- input)
}
"#;
    let mut tree = load_str(tree, &registry(), true).unwrap();

    let (result, values) = tick_collect(&mut tree);
    assert_eq!(result.unwrap(), NodeStatus::Success);
    assert_eq!(values, vec![96]);
}

struct DoubleNode;

impl BehaviorNode for DoubleNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("input"), PortSpec::new_out("output")]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let input = ctx.get::<i32>("input")?;
        ctx.set("output", input * 2)?;
        Ok(NodeStatus::Success)
    }
}

#[test]
fn test_subtree_output() {
    let tree = r#"
tree main = Sequence {
sub(input <- "42", output -> doubled)
SendToArg (input <- doubled)
}

tree sub(in input: Int, out output) = Fallback {
Double (input <- input, output -> output)
}
"#;
    let mut tree = load_str(tree, &registry(), true).unwrap();

    let (result, values) = tick_collect(&mut tree);
    assert_eq!(result.unwrap(), NodeStatus::Success);
    assert_eq!(values, vec![84]);
    assert_eq!(
        tree.blackboard().borrow().get("doubled"),
        Ok(crate::Value::Int(84))
    );
}

#[test]
fn test_subtree_scope() {
    let tree = r#"
tree main = Sequence {
    SetBool (value <- "true", output -> outer)
    sub
    IsTrue (input <- inner)
}

tree sub = Sequence {
    IsTrue (input <- outer)
    SetBool (value <- "true", output -> inner)
}
"#;
    let mut tree = load_str(tree, &registry(), true).unwrap();

    // The subtree reads `outer` from the enclosing scope, but its own `inner`
    // stays local.
    assert_eq!(tree.tick_root().unwrap(), NodeStatus::Failure);
    assert!(!tree.blackboard().borrow().has("inner"));
}

#[test]
fn test_unknown_node_path() {
    let tree = r#"
tree main = Sequence {
    AlwaysSuccess
    Foo
}
"#;
    match load_str(tree, &registry(), true) {
        Err(LoadError::UnknownNodeType { node, path }) => {
            assert_eq!(node, "Foo");
            assert_eq!(path, "main/Sequence[0]/Foo[1]");
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unknown_node_in_subtree_path() {
    let tree = r#"
tree main = Sequence {
    sub
}

tree sub = Fallback {
    Foo
}
"#;
    match load_str(tree, &registry(), true) {
        Err(LoadError::UnknownNodeType { path, .. }) => {
            assert_eq!(path, "main/Sequence[0]/sub[0]/Fallback[0]/Foo[0]");
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_main() {
    let tree = "tree other = AlwaysSuccess";
    assert!(matches!(
        load_str(tree, &registry(), true),
        Err(LoadError::MissingTree)
    ));
}

#[test]
fn test_recursion() {
    let tree = r#"
tree main = Sequence {
    sub
}

tree sub = Fallback {
    sub
}
"#;
    match load_str(tree, &registry(), true) {
        Err(LoadError::InfiniteRecursion { node }) => assert_eq!(node, "sub"),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_unknown_port() {
    let tree = "tree main = AlwaysSuccess (foo <- bar)";
    assert!(matches!(
        load_str(tree, &registry(), true),
        Err(LoadError::PortBinding {
            source: PortBindingError::UnknownPort,
            ..
        })
    ));
    // Without checking, an undeclared port is just an extra binding.
    assert!(load_str(tree, &registry(), false).is_ok());
}

#[test]
fn test_port_direction() {
    let tree = "tree main = SetBool (value -> x, output -> y)";
    match load_str(tree, &registry(), true) {
        Err(LoadError::PortBinding { port, source, .. }) => {
            assert_eq!(port, "value");
            assert_eq!(
                source,
                PortBindingError::Direction {
                    declared: PortType::Input,
                    bound: PortType::Output,
                }
            );
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_literal_type() {
    let tree = r#"tree main = Timeout (msec <- "soon") { AlwaysSuccess }"#;
    assert!(matches!(
        load_str(tree, &registry(), true),
        Err(LoadError::PortBinding {
            source: PortBindingError::LiteralType {
                expected: ValueType::Int,
                ..
            },
            ..
        })
    ));
}

struct Counter;

impl BehaviorNode for Counter {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_out("count").typed(ValueType::Int)]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        ctx.set("count", 1)?;
        Ok(NodeStatus::Success)
    }
}

#[test]
fn test_key_type_conflict() {
    let tree = r#"
tree main = Sequence {
    Counter (count -> n)
    IsTrue (input <- n)
}
"#;
    match load_str(tree, &registry(), true) {
        Err(LoadError::PortBinding { source, path, .. }) => {
            assert_eq!(path, "main/Sequence[0]/IsTrue[1]");
            assert_eq!(
                source,
                PortBindingError::KeyType {
                    key: "n".to_owned(),
                    first: ValueType::Int,
                    second: ValueType::Bool,
                }
            );
        }
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_key_types_are_per_scope() {
    // `n` inside the subtree is a different key from `n` outside.
    let tree = r#"
tree main = Sequence {
    Counter (count -> n)
    sub
}

tree sub = IsTrue (input <- n)
"#;
    assert!(load_str(tree, &registry(), true).is_ok());
}

#[test]
fn test_unknown_port_type() {
    let tree = r#"
tree main = sub

tree sub(in x: Quaternion) = AlwaysSuccess
"#;
    match load_str(tree, &registry(), true) {
        Err(LoadError::UnknownPortType { ty }) => assert_eq!(ty, "Quaternion"),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_port_default() {
    let tree = load_str("tree main = Parallel { AlwaysSuccess }", &registry(), true).unwrap();
    assert_eq!(
        tree.root().blackboard_map().get(&Symbol::from("success_count")),
        Some(&BlackboardValue::Literal("-1".to_owned()))
    );
}

#[test]
fn test_child_count() {
    assert!(matches!(
        load_str("tree main = Inverter", &registry(), true),
        Err(LoadError::TooFewChildren {
            required: 1,
            found: 0,
            ..
        })
    ));
    assert!(matches!(
        load_str(
            "tree main = Inverter { AlwaysSuccess AlwaysFailure }",
            &registry(),
            true
        ),
        Err(LoadError::AddChild { .. })
    ));
}

#[test]
fn test_var() {
    let tree = r#"
tree main = Sequence {
    var flag = true
    if (flag) {
        PrintNode
        flag = false
    }
    if (flag) {
        PrintNode
    }
}
"#;
    let mut tree = load_str(tree, &registry(), true).unwrap();
    let (result, values) = tick_collect(&mut tree);
    assert_eq!(result.unwrap(), NodeStatus::Success);
    assert_eq!(values, vec![42]);
    assert_eq!(tree.blackboard().borrow().get_as::<bool>("flag"), Ok(false));
}

#[test]
fn test_undeclared_var() {
    let tree = r#"
tree main = Sequence {
    SetBool (value <- "true", output -> flag)
    if (flag) {
        PrintNode
    }
}
"#;
    assert!(matches!(
        load_str(tree, &registry(), true),
        Err(LoadError::UnknownNodeType { .. })
    ));
}

#[test]
fn test_label() {
    let tree = load_str(r#"tree main = PrintNode "hello""#, &registry(), true).unwrap();
    assert_eq!(tree.root().label(), Some("hello"));
    assert_eq!(tree.root().instance_name(), "PrintNode(hello)");
}
