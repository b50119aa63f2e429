//! Tree definitions in YAML.
//!
//! ```yaml
//! behavior_tree:
//!   main:
//!     type: Sequence
//!     children:
//!     - type: Print
//!       name: greeting
//!       inputs:
//!         message: hello
//!     - type: Fetch
//!       inputs:
//!         item: "{wanted}"
//!       outputs:
//!         result: cup
//!   Fetch:
//!     ports: ["in item: String", "out result"]
//!     type: Locate
//!     inputs:
//!       target: "{item}"
//!     outputs:
//!       found: result
//! ```
//!
//! An input written as `"{key}"` refers to a blackboard key, anything else is
//! a literal. Outputs and inouts always refer to keys; the braces are
//! optional there.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::Value;

use super::{
    loader::load,
    nom_parser::{port_def, BlackboardValue, PortMap, TreeDef, TreeRootDef, TreeSource},
};
use crate::{error::LoadYamlError, PortType, Registry, Tree};

#[derive(Debug, Deserialize)]
struct YamlFile {
    behavior_tree: BTreeMap<String, YamlTree>,
}

#[derive(Debug, Deserialize)]
struct YamlTree {
    #[serde(default)]
    ports: Vec<String>,
    #[serde(flatten)]
    root: YamlNode,
}

#[derive(Debug, Deserialize)]
struct YamlNode {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    inputs: BTreeMap<String, Value>,
    #[serde(default)]
    outputs: BTreeMap<String, Value>,
    #[serde(default)]
    inouts: BTreeMap<String, Value>,
    #[serde(default)]
    children: Vec<YamlNode>,
}

fn strip_braces(s: &str) -> Option<&str> {
    s.strip_prefix('{')?.strip_suffix('}').map(str::trim)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl YamlNode {
    fn to_tree_def(&self) -> Result<TreeDef, LoadYamlError> {
        let mut port_maps = vec![];

        for (port, value) in &self.inputs {
            let blackboard_value = match value {
                Value::String(s) => match strip_braces(s) {
                    Some(key) => BlackboardValue::Ref(key),
                    None => BlackboardValue::Literal(s.clone()),
                },
                other => BlackboardValue::Literal(scalar(other).ok_or_else(|| {
                    LoadYamlError::InvalidValue {
                        node: self.ty.clone(),
                        port: port.clone(),
                    }
                })?),
            };
            port_maps.push(PortMap {
                ty: PortType::Input,
                node_port: port,
                blackboard_value,
            });
        }

        for (ports, ty) in [(&self.outputs, PortType::Output), (&self.inouts, PortType::InOut)] {
            for (port, value) in ports {
                let Value::String(key) = value else {
                    return Err(LoadYamlError::LiteralOutput {
                        node: self.ty.clone(),
                        port: port.clone(),
                    });
                };
                port_maps.push(PortMap {
                    ty,
                    node_port: port,
                    blackboard_value: BlackboardValue::Ref(strip_braces(key).unwrap_or(key)),
                });
            }
        }

        let children = self
            .children
            .iter()
            .map(YamlNode::to_tree_def)
            .collect::<Result<_, _>>()?;

        Ok(TreeDef {
            label: self.name.clone(),
            port_maps,
            children,
            ..TreeDef::new(&self.ty)
        })
    }
}

impl YamlFile {
    fn to_tree_source(&self) -> Result<TreeSource, LoadYamlError> {
        let tree_defs = self
            .behavior_tree
            .iter()
            .map(|(name, tree)| -> Result<TreeRootDef, LoadYamlError> {
                let ports = tree
                    .ports
                    .iter()
                    .map(|def| match port_def(def) {
                        Ok(("", port)) => Ok(port),
                        _ => Err(LoadYamlError::PortDef { def: def.clone() }),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(TreeRootDef {
                    name,
                    root: tree.root.to_tree_def()?,
                    ports,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(TreeSource { tree_defs })
    }
}

/// Build the `main` tree of a YAML definition. Port checking works the same
/// as in [`load`].
pub fn load_yaml(
    yaml: &str,
    registry: &Registry,
    check_ports: bool,
) -> Result<Tree, LoadYamlError> {
    let file: YamlFile = serde_yaml::from_str(yaml)?;
    let tree_source = file.to_tree_source()?;
    Ok(load(&tree_source, registry, check_ports)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::LoadError, NodeStatus};

    #[test]
    fn yaml_tree() {
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
    - type: Copy
      inputs:
        value: "{flag}"
      outputs:
        output: "{copied}"
  Copy:
    ports: ["in value: Bool", "out output: Bool"]
    type: SetBool
    name: inner
    inputs:
      value: "{value}"
    outputs:
      output: output
"#;
        let mut tree = load_yaml(yaml, &Registry::default(), true).unwrap();
        assert_eq!(tree.tick_root().unwrap(), NodeStatus::Success);
        assert_eq!(
            tree.blackboard().borrow().get_as::<bool>("copied"),
            Ok(true)
        );
        assert_eq!(tree.root().children()[1].children()[0].label(), Some("inner"));
    }

    #[test]
    fn numbers_are_literals() {
        let yaml = r#"
behavior_tree:
  main:
    type: RetryUntilSuccessful
    inputs:
      num_attempts: 3
    children:
    - type: AlwaysSuccess
"#;
        let mut tree = load_yaml(yaml, &Registry::default(), true).unwrap();
        assert_eq!(tree.tick_root().unwrap(), NodeStatus::Success);
    }

    #[test]
    fn output_to_literal() {
        let yaml = r#"
behavior_tree:
  main:
    type: SetBool
    inputs:
      value: "true"
    outputs:
      output: 42
"#;
        assert!(matches!(
            load_yaml(yaml, &Registry::default(), true),
            Err(LoadYamlError::LiteralOutput { .. })
        ));
    }

    #[test]
    fn unknown_type() {
        let yaml = r#"
behavior_tree:
  main:
    type: Sequence
    children:
    - type: Foo
"#;
        match load_yaml(yaml, &Registry::default(), true) {
            Err(LoadYamlError::Load(LoadError::UnknownNodeType { node, path })) => {
                assert_eq!(node, "Foo");
                assert_eq!(path, "main/Sequence[0]/Foo[0]");
            }
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn malformed_port_def() {
        let yaml = r#"
behavior_tree:
  main:
    ports: ["sideways x"]
    type: AlwaysSuccess
"#;
        assert!(matches!(
            load_yaml(yaml, &Registry::default(), true),
            Err(LoadYamlError::PortDef { .. })
        ));
    }
}
