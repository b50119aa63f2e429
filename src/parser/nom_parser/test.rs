use super::*;

impl<'src> TreeRootDef<'src> {
    fn new(name: &'src str, root: TreeDef<'src>) -> Self {
        Self {
            name,
            root,
            ports: vec![],
        }
    }
}

fn input<'src>(node_port: &'src str, key: &'src str) -> PortMap<'src> {
    PortMap {
        ty: PortType::Input,
        node_port,
        blackboard_value: BlackboardValue::Ref(key),
    }
}

#[test]
fn test_port_def() {
    assert_eq!(
        port_def("in count: Int"),
        Ok((
            "",
            PortDef {
                direction: PortType::Input,
                name: "count",
                ty: Some("Int"),
            }
        ))
    );
    assert_eq!(
        port_def("inout input"),
        Ok((
            "",
            PortDef {
                direction: PortType::InOut,
                name: "input",
                ty: None,
            }
        ))
    );
    assert!(port_def("internal x").is_err());
}

#[test]
fn test_trees() {
    assert_eq!(
        parse_tree(
            "tree main = Sequence {
        }"
        ),
        Ok(("", TreeRootDef::new("main", TreeDef::new("Sequence"))))
    );

    assert_eq!(
        parse_tree(
            "tree main = Sequence {
                    PrintBodyNode
        }"
        ),
        Ok((
            "",
            TreeRootDef::new(
                "main",
                TreeDef::new_with_child("Sequence", TreeDef::new("PrintBodyNode"))
            )
        ))
    );
}

#[test]
fn test_tree_ports() {
    assert_eq!(
        parse_tree(
            "tree main = Sequence {
                PrintBodyNode(in_socket <- in_val, out_socket -> out_val, inout_socket <-> inout_val)
    }"
        ),
        Ok((
            "",
            TreeRootDef::new(
                "main",
                TreeDef::new_with_child(
                    "Sequence",
                    TreeDef::new_with_ports(
                        "PrintBodyNode",
                        vec![
                            input("in_socket", "in_val"),
                            PortMap {
                                ty: PortType::Output,
                                node_port: "out_socket",
                                blackboard_value: BlackboardValue::Ref("out_val"),
                            },
                            PortMap {
                                ty: PortType::InOut,
                                node_port: "inout_socket",
                                blackboard_value: BlackboardValue::Ref("inout_val"),
                            }
                        ]
                    )
                )
            )
        ))
    );
}

#[test]
fn test_port_literal() {
    assert_eq!(
        parse_tree(
            r#"tree main = Sequence {
                PrintBodyNode(in_socket <- "in_val", out_socket -> out_val)
    }"#
        ),
        Ok((
            "",
            TreeRootDef::new(
                "main",
                TreeDef::new_with_child(
                    "Sequence",
                    TreeDef::new_with_ports(
                        "PrintBodyNode",
                        vec![
                            PortMap {
                                ty: PortType::Input,
                                node_port: "in_socket",
                                blackboard_value: BlackboardValue::Literal("in_val".to_string()),
                            },
                            PortMap {
                                ty: PortType::Output,
                                node_port: "out_socket",
                                blackboard_value: BlackboardValue::Ref("out_val"),
                            }
                        ]
                    )
                )
            )
        ))
    );
}

#[test]
fn test_literal_output_is_error() {
    assert!(parse_file(
        r#"tree main = Sequence {
            PrintBodyNode(out_socket -> "out_val")
        }"#
    )
    .is_err());
}

#[test]
fn test_label() {
    assert_eq!(
        parse_tree(r#"tree main = Print "greeting" (message <- "hi")"#),
        Ok((
            "",
            TreeRootDef::new(
                "main",
                TreeDef {
                    label: Some("greeting".to_owned()),
                    ..TreeDef::new_with_ports(
                        "Print",
                        vec![PortMap {
                            ty: PortType::Input,
                            node_port: "message",
                            blackboard_value: BlackboardValue::Literal("hi".to_owned()),
                        }]
                    )
                }
            )
        ))
    );
}

#[test]
fn test_subtree() {
    assert_eq!(
        parse_file(
            "
tree main = Sequence {
    sub(port <- input)
}

tree sub(in port: Int, out result) = Sequence {
    PrintBodyNode(in_socket <- in_val)
}
"
        ),
        Ok((
            "",
            TreeSource {
                tree_defs: vec![
                    TreeRootDef::new(
                        "main",
                        TreeDef::new_with_child(
                            "Sequence",
                            TreeDef::new_with_ports("sub", vec![input("port", "input")])
                        )
                    ),
                    TreeRootDef {
                        name: "sub",
                        ports: vec![
                            PortDef {
                                direction: PortType::Input,
                                name: "port",
                                ty: Some("Int"),
                            },
                            PortDef {
                                direction: PortType::Output,
                                name: "result",
                                ty: None,
                            }
                        ],
                        root: TreeDef::new_with_child(
                            "Sequence",
                            TreeDef::new_with_ports(
                                "PrintBodyNode",
                                vec![input("in_socket", "in_val")]
                            )
                        )
                    }
                ],
            }
        ))
    );
}

#[test]
fn test_comments() {
    assert_eq!(
        parse_file(
            "# This is a comment at the top level.

tree main = Sequence { # after opening brace
    # a whole line
    Yes    # after a node
}          # after a closing brace
# the last line"
        ),
        Ok((
            "",
            TreeSource {
                tree_defs: vec![TreeRootDef::new(
                    "main",
                    TreeDef::new_with_child("Sequence", TreeDef::new("Yes"))
                )]
            }
        ))
    );
}

#[test]
fn test_condition() {
    assert_eq!(
        parse_file(
            "
tree main = Sequence {
    if (ConditionNode) {
        Yes
    }
}
"
        ),
        Ok((
            "",
            TreeSource {
                tree_defs: vec![TreeRootDef::new(
                    "main",
                    TreeDef::new_with_child(
                        "Sequence",
                        TreeDef::new_with_children(
                            "if",
                            vec![
                                TreeDef::new("ConditionNode"),
                                TreeDef::new_with_child("Sequence", TreeDef::new("Yes")),
                            ],
                        )
                    )
                )]
            }
        ))
    );
}

#[test]
fn test_condition_else() {
    assert_eq!(
        parse_file(
            "
tree main = if (ConditionNode (input <- here)) {
    Yes
} else {
    No
}
"
        ),
        Ok((
            "",
            TreeSource {
                tree_defs: vec![TreeRootDef::new(
                    "main",
                    TreeDef::new_with_children(
                        "if",
                        vec![
                            TreeDef::new_with_ports("ConditionNode", vec![input("input", "here")]),
                            TreeDef::new_with_child("Sequence", TreeDef::new("Yes")),
                            TreeDef::new_with_child("Sequence", TreeDef::new("No")),
                        ],
                    )
                )]
            }
        ))
    );
}

#[test]
fn test_condition_with_blocks() {
    assert_eq!(
        parse_file(
            "
tree main = Sequence {
    if (ConditionNode {
        No
    }) {
        Yes
    }
}
"
        ),
        Ok((
            "",
            TreeSource {
                tree_defs: vec![TreeRootDef::new(
                    "main",
                    TreeDef::new_with_child(
                        "Sequence",
                        TreeDef::new_with_children(
                            "if",
                            vec![
                                TreeDef::new_with_child("ConditionNode", TreeDef::new("No")),
                                TreeDef::new_with_child("Sequence", TreeDef::new("Yes")),
                            ],
                        )
                    )
                )]
            }
        ))
    );
}

#[test]
fn test_logical_operators() {
    assert_eq!(
        parse_file(
            "
tree main = Sequence {
    !a || b && c
    (a || b) && c
}
"
        ),
        Ok((
            "",
            TreeSource {
                tree_defs: vec![TreeRootDef::new(
                    "main",
                    TreeDef::new_with_children(
                        "Sequence",
                        vec![
                            TreeDef::new_with_children(
                                "Fallback",
                                vec![
                                    TreeDef::new_with_child("Inverter", TreeDef::new("a")),
                                    TreeDef::new_with_children(
                                        "Sequence",
                                        vec![TreeDef::new("b"), TreeDef::new("c")]
                                    ),
                                ]
                            ),
                            TreeDef::new_with_children(
                                "Sequence",
                                vec![
                                    TreeDef::new_with_children(
                                        "Fallback",
                                        vec![TreeDef::new("a"), TreeDef::new("b")]
                                    ),
                                    TreeDef::new("c"),
                                ]
                            ),
                        ]
                    )
                )]
            }
        ))
    );
}

#[test]
fn test_var() {
    assert_eq!(
        parse_file(
            "
tree main = Sequence {
    var flag = true
    var other
    variable_node
    flag = false
}
"
        ),
        Ok((
            "",
            TreeSource {
                tree_defs: vec![TreeRootDef::new(
                    "main",
                    TreeDef {
                        vars: vec![
                            VarDef {
                                name: "flag",
                                init: Some("true"),
                            },
                            VarDef {
                                name: "other",
                                init: None,
                            },
                        ],
                        ..TreeDef::new_with_children(
                            "Sequence",
                            vec![
                                set_bool("flag", "true"),
                                TreeDef::new("variable_node"),
                                set_bool("flag", "false"),
                            ]
                        )
                    }
                )]
            }
        ))
    );
}
