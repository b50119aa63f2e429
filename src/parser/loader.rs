use std::collections::HashMap;

use tracing::debug;

use super::nom_parser::{BlackboardValue as SourceValue, PortDef, TreeDef, TreeSource, VarDef};
use crate::{
    actions::{IsTrueNode, INPUT},
    error::{LoadError, PortBindingError},
    BBMap, BehaviorNode, BehaviorNodeContainer, Blackboard, BlackboardRef, BlackboardValue,
    PortSpec, PortType, Registry, SubtreeNode, Tree, Value, ValueType,
};

/// Instantiate a behavior tree from a AST of a tree.
///
/// `check_ports` enables static checking of the port bindings against the
/// manifests declared in [`crate::BehaviorNode::provided_ports`]: unknown
/// ports, wrong arrow directions, literals that do not parse as the declared
/// type and blackboard keys bound to ports of different types are errors.
/// Unbound ports with a declared default get the default as a literal
/// either way.
pub fn load(
    tree_source: &TreeSource,
    registry: &Registry,
    check_ports: bool,
) -> Result<Tree, LoadError> {
    let main = tree_source
        .tree_defs
        .iter()
        .find(|tree| tree.name == "main")
        .ok_or(LoadError::MissingTree)?;

    let top = TreeStack {
        name: "main",
        parent: None,
    };
    let blackboard = Blackboard::new_ref();
    let scope = Scope {
        blackboard: &blackboard,
        tree: &top,
        vars: None,
    };
    let loader = Loader {
        registry,
        tree_source,
        check_ports,
    };

    let root = loader.load_node(&main.root, &scope, &mut KeyTypes::new(), "main", 0)?;
    debug!(trees = tree_source.tree_defs.len(), "loaded main tree");
    Ok(Tree::new(root, blackboard))
}

/// A mechanism to detect infinite recursion. It is a linked list in call stack.
/// You can traverse the link back to enumerate all the subtree names (which is effectively function names)
/// and check if a subtree name to be inserted is already there.
///
/// Recursive subtrees would need to be loaded lazily on first tick, keeping the
/// registry and the source around for the lifetime of the tree, so they are
/// an error instead.
struct TreeStack<'a, 'src> {
    name: &'src str,
    parent: Option<&'a TreeStack<'a, 'src>>,
}

impl<'a, 'src> TreeStack<'a, 'src> {
    fn find(&self, name: &str) -> bool {
        if self.name == name {
            true
        } else if let Some(parent) = self.parent {
            parent.find(name)
        } else {
            false
        }
    }
}

/// Variables declared by the enclosing nodes, innermost first.
struct VarScope<'a, 'src> {
    vars: &'a [VarDef<'src>],
    parent: Option<&'a VarScope<'a, 'src>>,
}

impl<'a, 'src> VarScope<'a, 'src> {
    fn find(&self, name: &str) -> bool {
        self.vars.iter().any(|var| var.name == name)
            || self.parent.map_or(false, |parent| parent.find(name))
    }
}

#[derive(Clone, Copy)]
struct Scope<'a, 'src> {
    blackboard: &'a BlackboardRef,
    tree: &'a TreeStack<'a, 'src>,
    vars: Option<&'a VarScope<'a, 'src>>,
}

/// Declared value type of each blackboard key bound so far in one
/// blackboard scope.
type KeyTypes = HashMap<String, ValueType>;

struct Loader<'a, 'src> {
    registry: &'a Registry,
    tree_source: &'a TreeSource<'src>,
    check_ports: bool,
}

impl<'a, 'src> Loader<'a, 'src> {
    fn load_node(
        &self,
        def: &TreeDef<'src>,
        scope: &Scope<'_, 'src>,
        key_types: &mut KeyTypes,
        parent_path: &str,
        index: usize,
    ) -> Result<BehaviorNodeContainer, LoadError> {
        let path = format!("{}/{}[{}]", parent_path, def.ty, index);

        let (name, node, implicit) = self.instantiate(def, scope, &path)?;
        let manifest = node.provided_ports();
        let min_children = node.min_children();
        let blackboard_map = self.bind_ports(def, &manifest, implicit, key_types, &path)?;

        let mut container =
            BehaviorNodeContainer::new_with_name(node, name, def.label.clone(), blackboard_map);

        let vars = VarScope {
            vars: &def.vars,
            parent: scope.vars,
        };
        let child_scope = Scope {
            vars: Some(&vars),
            ..*scope
        };
        for (i, child) in def.children.iter().enumerate() {
            let child = self.load_node(child, &child_scope, key_types, &path, i)?;
            container
                .add_child(child)
                .map_err(|source| LoadError::AddChild {
                    node: def.ty.to_owned(),
                    path: path.clone(),
                    source,
                })?;
        }

        let found = container.children().len();
        if found < min_children {
            return Err(LoadError::TooFewChildren {
                node: def.ty.to_owned(),
                path,
                required: min_children,
                found,
            });
        }

        Ok(container)
    }

    /// Resolve the type name of `def`: a declared variable, a registered node
    /// type or a subtree, in that order. Returns the name to show for the
    /// node, the node and the port bindings it gets implicitly.
    fn instantiate(
        &self,
        def: &TreeDef<'src>,
        scope: &Scope<'_, 'src>,
        path: &str,
    ) -> Result<(String, Box<dyn BehaviorNode>, BBMap), LoadError> {
        if scope.vars.map_or(false, |vars| vars.find(def.ty)) {
            let mut implicit = BBMap::new();
            implicit.insert(
                *INPUT,
                BlackboardValue::Ref(def.ty.into(), PortType::Input),
            );
            return Ok(("IsTrue".to_owned(), Box::new(IsTrueNode), implicit));
        }

        if let Some(node) = self.registry.build(def.ty) {
            return Ok((def.ty.to_owned(), node, BBMap::new()));
        }

        let tree = self
            .tree_source
            .tree_defs
            .iter()
            .find(|tree| tree.name == def.ty)
            .ok_or_else(|| LoadError::UnknownNodeType {
                node: def.ty.to_owned(),
                path: path.to_owned(),
            })?;

        // Prevent infinite recursion
        if scope.tree.find(def.ty) {
            return Err(LoadError::InfiniteRecursion {
                node: def.ty.to_owned(),
            });
        }
        let tree_stack = TreeStack {
            name: def.ty,
            parent: Some(scope.tree),
        };

        let params = tree
            .ports
            .iter()
            .map(param_spec)
            .collect::<Result<Vec<_>, _>>()?;

        let blackboard = Blackboard::create_child(scope.blackboard);
        let subtree_scope = Scope {
            blackboard: &blackboard,
            tree: &tree_stack,
            vars: None,
        };
        let mut key_types: KeyTypes = params
            .iter()
            .filter_map(|param| Some((param.key.to_string(), param.value_type?)))
            .collect();
        let body = self.load_node(&tree.root, &subtree_scope, &mut key_types, path, 0)?;

        let mut node = SubtreeNode::new(blackboard, params);
        node.add_child(body)
            .map_err(|source| LoadError::AddChild {
                node: def.ty.to_owned(),
                path: path.to_owned(),
                source,
            })?;
        Ok((def.ty.to_owned(), Box::new(node), BBMap::new()))
    }

    fn bind_ports(
        &self,
        def: &TreeDef<'src>,
        manifest: &[PortSpec],
        mut blackboard_map: BBMap,
        key_types: &mut KeyTypes,
        path: &str,
    ) -> Result<BBMap, LoadError> {
        for entry in &def.port_maps {
            let err = |source| LoadError::PortBinding {
                node: def.ty.to_owned(),
                port: entry.node_port.to_owned(),
                path: path.to_owned(),
                source,
            };
            let spec = manifest.iter().find(|spec| spec.key == entry.node_port);

            if self.check_ports {
                let Some(spec) = spec else {
                    return Err(err(PortBindingError::UnknownPort));
                };
                if spec.ty != entry.ty {
                    return Err(err(PortBindingError::Direction {
                        declared: spec.ty,
                        bound: entry.ty,
                    }));
                }
            }
            let value_type = spec
                .and_then(|spec| spec.value_type)
                .filter(|_| self.check_ports);

            let value = match &entry.blackboard_value {
                SourceValue::Literal(literal) => {
                    if entry.ty != PortType::Input {
                        return Err(err(PortBindingError::LiteralOutput));
                    }
                    if let Some(expected) = value_type {
                        if Value::parse_as(literal, expected).is_none() {
                            return Err(err(PortBindingError::LiteralType {
                                expected,
                                literal: literal.clone(),
                            }));
                        }
                    }
                    BlackboardValue::Literal(literal.clone())
                }
                SourceValue::Ref(key) => {
                    if let Some(second) = value_type {
                        match key_types.get(*key) {
                            Some(&first) if first != second => {
                                return Err(err(PortBindingError::KeyType {
                                    key: (*key).to_owned(),
                                    first,
                                    second,
                                }));
                            }
                            Some(_) => (),
                            None => {
                                key_types.insert((*key).to_owned(), second);
                            }
                        }
                    }
                    BlackboardValue::Ref((*key).into(), entry.ty)
                }
            };
            blackboard_map.insert(entry.node_port.into(), value);
        }

        for spec in manifest {
            if let Some(default) = &spec.default {
                blackboard_map
                    .entry(spec.key)
                    .or_insert_with(|| BlackboardValue::Literal(default.clone()));
            }
        }

        Ok(blackboard_map)
    }
}

fn param_spec(port: &PortDef) -> Result<PortSpec, LoadError> {
    let spec = PortSpec {
        ty: port.direction,
        key: port.name.into(),
        value_type: None,
        default: None,
    };
    match port.ty {
        None => Ok(spec),
        Some(ty) => ValueType::from_name(ty)
            .map(|value_type| spec.typed(value_type))
            .ok_or_else(|| LoadError::UnknownPortType { ty: ty.to_owned() }),
    }
}

#[cfg(test)]
mod test;
