use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{
        alpha1, alphanumeric1, char, multispace0, newline, none_of, one_of, space0, space1,
    },
    combinator::{opt, recognize, value},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::PortType;

/// A port parameter of a tree, e.g. `in input: Int`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PortDef<'src> {
    pub direction: PortType,
    pub name: &'src str,
    pub ty: Option<&'src str>,
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn newlines(i: &str) -> IResult<&str, ()> {
    delimited(space0, many1(one_of("\r\n")), space0)(i).map(|(rest, _)| (rest, ()))
}

pub(crate) fn port_def<'src>(i: &'src str) -> IResult<&'src str, PortDef<'src>> {
    let (i, inout) = delimited(
        multispace0,
        terminated(alt((tag("inout"), tag("in"), tag("out"))), space1),
        space0,
    )(i)?;
    let (i, name) = identifier(i)?;
    let (i, ty) = opt(preceded(delimited(space0, char(':'), space0), identifier))(i)?;
    let (i, _) = multispace0(i)?;
    let direction = match inout {
        "in" => PortType::Input,
        "out" => PortType::Output,
        "inout" => PortType::InOut,
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Verify,
            )))
        }
    };
    Ok((
        i,
        PortDef {
            direction,
            name,
            ty,
        },
    ))
}

fn open_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('('), space0))(i)
}

fn close_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char(')'), space0))(i)
}

fn open_brace(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('{'), space0))(i)
}

fn close_brace(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('}'), space0))(i)
}

/// One node of a tree definition, before it is resolved against a registry.
#[derive(Debug, PartialEq, Eq)]
pub struct TreeDef<'src> {
    pub(crate) ty: &'src str,
    pub(crate) label: Option<String>,
    pub(crate) port_maps: Vec<PortMap<'src>>,
    pub(crate) children: Vec<TreeDef<'src>>,
    pub(crate) vars: Vec<VarDef<'src>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct VarDef<'src> {
    pub(crate) name: &'src str,
    pub(crate) init: Option<&'src str>,
}

impl<'src> TreeDef<'src> {
    pub(crate) fn new(ty: &'src str) -> Self {
        Self {
            ty,
            label: None,
            port_maps: vec![],
            children: vec![],
            vars: vec![],
        }
    }

    fn new_with_child(ty: &'src str, child: TreeDef<'src>) -> Self {
        Self::new_with_children(ty, vec![child])
    }

    pub(crate) fn new_with_children(ty: &'src str, children: Vec<TreeDef<'src>>) -> Self {
        Self {
            children,
            ..Self::new(ty)
        }
    }

    fn new_with_tree_elems(ty: &'src str, children: Vec<TreeElem<'src>>) -> Self {
        Self::new_with_ports_and_tree_elems(ty, vec![], children)
    }

    #[cfg(test)]
    fn new_with_ports(ty: &'src str, port_maps: Vec<PortMap<'src>>) -> Self {
        Self {
            port_maps,
            ..Self::new(ty)
        }
    }

    fn new_with_ports_and_tree_elems(
        ty: &'src str,
        port_maps: Vec<PortMap<'src>>,
        children: Vec<TreeElem<'src>>,
    ) -> Self {
        let (children, vars) = children.into_iter().fold((vec![], vec![]), |mut acc, cur| {
            match cur {
                TreeElem::Node(node) => acc.0.push(node),
                TreeElem::Var(var) => {
                    if let Some(init) = var.init {
                        acc.0.push(set_bool(var.name, init));
                    }
                    acc.1.push(var);
                }
            }
            acc
        });

        Self {
            ty,
            label: None,
            port_maps,
            children,
            vars,
        }
    }

    pub fn ty(&self) -> &'src str {
        self.ty
    }

    pub fn children(&self) -> &[TreeDef<'src>] {
        &self.children
    }
}

/// `SetBool (value <- "init", output -> name)`, what variable initializers
/// and assignments turn into.
fn set_bool<'src>(name: &'src str, init: &'src str) -> TreeDef<'src> {
    TreeDef {
        port_maps: vec![
            PortMap {
                node_port: "value",
                blackboard_value: BlackboardValue::Literal(init.to_owned()),
                ty: PortType::Input,
            },
            PortMap {
                node_port: "output",
                blackboard_value: BlackboardValue::Ref(name),
                ty: PortType::Output,
            },
        ],
        ..TreeDef::new("SetBool")
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BlackboardValue<'src> {
    /// Literal value could have been decoded, so it is an owned string.
    Literal(String),
    Ref(&'src str),
}

#[derive(Debug, PartialEq, Eq)]
pub struct PortMap<'src> {
    pub(crate) ty: PortType,
    pub(crate) node_port: &'src str,
    pub(crate) blackboard_value: BlackboardValue<'src>,
}

fn subtree_ports_def<'src>(i: &'src str) -> IResult<&'src str, Vec<PortDef<'src>>> {
    let (i, ports) = delimited(
        open_paren,
        many0(delimited(space0, port_def, opt(char(',')))),
        close_paren,
    )(i)?;
    Ok((i, ports))
}

#[derive(Debug, PartialEq)]
pub struct TreeRootDef<'src> {
    pub(crate) name: &'src str,
    pub(crate) root: TreeDef<'src>,
    pub(crate) ports: Vec<PortDef<'src>>,
}

impl<'src> TreeRootDef<'src> {
    pub fn name(&self) -> &'src str {
        self.name
    }

    pub fn root(&self) -> &TreeDef<'src> {
        &self.root
    }
}

fn parse_tree(i: &str) -> IResult<&str, TreeRootDef> {
    let (i, _) = delimited(multispace0, terminated(tag("tree"), space1), space0)(i)?;

    let (i, name) = delimited(space0, identifier, space0)(i)?;

    let (i, ports) = opt(subtree_ports_def)(i)?;

    let (i, _) = delimited(space0, tag("="), space0)(i)?;

    let (i, root) = alt((parse_if, parse_conditional_expr))(i)?;

    Ok((
        i,
        TreeRootDef {
            name,
            root,
            ports: ports.unwrap_or_default(),
        },
    ))
}

fn line_comment<T>(i: &str) -> IResult<&str, Option<T>> {
    let (i, _) = tuple((space0, char('#'), opt(is_not("\n\r"))))(i)?;

    Ok((i, None))
}

fn line_comment_tree_elem(i: &str) -> IResult<&str, Option<TreeElem>> {
    line_comment::<TreeElem>(i)
}

fn some<I, R>(f: impl Fn(I) -> IResult<I, R>) -> impl Fn(I) -> IResult<I, Option<R>> {
    move |i| {
        let (i, res) = f(i)?;
        Ok((i, Some(res)))
    }
}

#[derive(Debug)]
enum TreeElem<'src> {
    Node(TreeDef<'src>),
    Var(VarDef<'src>),
}

fn tree_children(i: &str) -> IResult<&str, Vec<TreeElem>> {
    let (i, _) = many0(newlines)(i)?;

    let (i, v) = many0(delimited(
        space0,
        alt((
            line_comment,
            some(var_decl),
            some(parse_condition_node),
            some(var_assign),
            some(parse_conditional_elem),
        )),
        many0(newlines),
    ))(i)?;

    let (i, _) = many0(newlines)(i)?;

    Ok((i, v.into_iter().flatten().collect()))
}

fn quoted(i: &str) -> IResult<&str, String> {
    let (i, val) = delimited(char('"'), many0(none_of("\"")), char('"'))(i)?;
    Ok((
        i,
        val.iter()
            .collect::<String>()
            .replace("\\\\", "\\")
            .replace("\\n", "\n"),
    ))
}

fn parse_tree_node(i: &str) -> IResult<&str, TreeDef> {
    let (i, ty) = delimited(space0, identifier, space0)(i)?;

    let (i, label) = opt(terminated(quoted, space0))(i)?;

    let (i, input_ports) = opt(delimited(open_paren, port_maps, close_paren))(i)?;

    let (i, children) = opt(delimited(open_brace, tree_children, close_brace))(i)?;

    let (i, _) = opt(line_comment_tree_elem)(i)?;

    let mut def = TreeDef::new_with_ports_and_tree_elems(
        ty,
        input_ports.unwrap_or_default(),
        children.unwrap_or_default(),
    );
    def.label = label;
    Ok((i, def))
}

/// Flatten `a && b && c` into one composite with three children.
fn chain<'src>(ty: &'src str, first: TreeDef<'src>, rest: Vec<TreeDef<'src>>) -> TreeDef<'src> {
    if rest.is_empty() {
        first
    } else {
        let mut children = vec![first];
        children.extend(rest);
        TreeDef::new_with_children(ty, children)
    }
}

fn parse_conditional_factor(i: &str) -> IResult<&str, TreeDef> {
    let (i, excl) = opt(delimited(space0, char('!'), space0))(i)?;

    if excl.is_some() {
        let (i, res) = parse_conditional_factor(i)?;

        Ok((i, TreeDef::new_with_child("Inverter", res)))
    } else {
        alt((
            delimited(open_paren, parse_conditional_expr, close_paren),
            parse_tree_node,
        ))(i)
    }
}

fn parse_conditional_and(i: &str) -> IResult<&str, TreeDef> {
    let (i, first) = parse_conditional_factor(i)?;
    let (i, rest) = many0(preceded(
        delimited(space0, tag("&&"), space0),
        parse_conditional_factor,
    ))(i)?;
    Ok((i, chain("Sequence", first, rest)))
}

/// `||` binds weaker than `&&`; `!` binds tightest.
fn parse_conditional_expr(i: &str) -> IResult<&str, TreeDef> {
    let (i, first) = parse_conditional_and(i)?;
    let (i, rest) = many0(preceded(
        delimited(space0, tag("||"), space0),
        parse_conditional_and,
    ))(i)?;
    Ok((i, chain("Fallback", first, rest)))
}

fn parse_conditional_elem(i: &str) -> IResult<&str, TreeElem> {
    let (i, elem) = parse_conditional_expr(i)?;
    Ok((i, TreeElem::Node(elem)))
}

fn parse_condition_node(i: &str) -> IResult<&str, TreeElem> {
    let (i, node) = parse_if(i)?;
    Ok((i, TreeElem::Node(node)))
}

fn parse_if(i: &str) -> IResult<&str, TreeDef> {
    let (i, _ty) = delimited(space0, tag("if"), space0)(i)?;

    let (i, condition) = delimited(open_paren, parse_conditional_expr, close_paren)(i)?;

    let (i, then_children) = delimited(open_brace, tree_children, close_brace)(i)?;

    let (i, else_children) = opt(delimited(
        pair(delimited(space0, tag("else"), space0), open_brace),
        tree_children,
        close_brace,
    ))(i)?;

    let mut children = vec![
        condition,
        TreeDef::new_with_tree_elems("Sequence", then_children),
    ];

    if let Some(else_children) = else_children {
        children.push(TreeDef::new_with_tree_elems("Sequence", else_children));
    }

    Ok((i, TreeDef::new_with_children("if", children)))
}

fn bool_initializer(i: &str) -> IResult<&str, &str> {
    preceded(
        delimited(space0, char('='), space0),
        alt((tag("true"), tag("false"))),
    )(i)
}

fn var_decl(i: &str) -> IResult<&str, TreeElem> {
    let (i, _var) = delimited(space0, terminated(tag("var"), space1), space0)(i)?;

    let (i, name) = delimited(space0, identifier, space0)(i)?;

    let (i, init) = opt(terminated(bool_initializer, space0))(i)?;

    let (i, _) = opt(line_comment_tree_elem)(i)?;

    Ok((i, TreeElem::Var(VarDef { name, init })))
}

fn var_assign(i: &str) -> IResult<&str, TreeElem> {
    let (i, name) = delimited(space0, identifier, space0)(i)?;

    let (i, init) = terminated(bool_initializer, space0)(i)?;

    let (i, _) = opt(line_comment_tree_elem)(i)?;

    Ok((i, TreeElem::Node(set_bool(name, init))))
}

fn port_maps(i: &str) -> IResult<&str, Vec<PortMap>> {
    many0(delimited(
        multispace0,
        port_map,
        many0(pair(multispace0, char(','))),
    ))(i)
}

fn port_map(i: &str) -> IResult<&str, PortMap> {
    let (i, node_port) = delimited(space0, identifier, space0)(i)?;

    let (i, inout) = delimited(space0, alt((tag("<->"), tag("<-"), tag("->"))), space0)(i)?;

    let (i, blackboard_name) = delimited(space0, alt((bb_ref, str_literal)), space0)(i)?;

    let ty = match inout {
        "<-" => PortType::Input,
        "->" => PortType::Output,
        "<->" => PortType::InOut,
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Alt,
            )))
        }
    };

    // You cannot output to a literal! It is a parse error rather than runtime error.
    if let BlackboardValue::Literal(_) = blackboard_name {
        if !matches!(ty, PortType::Input) {
            return Err(nom::Err::Failure(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Verify,
            )));
        }
    }

    Ok((
        i,
        PortMap {
            ty,
            node_port,
            blackboard_value: blackboard_name,
        },
    ))
}

fn bb_ref(i: &str) -> IResult<&str, BlackboardValue> {
    let (i, s) = identifier(i)?;
    Ok((i, BlackboardValue::Ref(s)))
}

fn str_literal(input: &str) -> IResult<&str, BlackboardValue> {
    let (r, val) = delimited(multispace0, quoted, multispace0)(input)?;
    Ok((r, BlackboardValue::Literal(val)))
}

pub fn parse_file(i: &str) -> IResult<&str, TreeSource> {
    let (i, stmts) = many0(alt((
        delimited(multispace0, line_comment, opt(newline)),
        some(parse_tree),
    )))(i)?;

    // Eat up trailing newlines to indicate that the input was thoroughly consumed
    let (i, _) = multispace0(i)?;

    Ok((
        i,
        TreeSource {
            tree_defs: stmts.into_iter().flatten().collect(),
        },
    ))
}

/// All trees of a definition file. The tree named `main` is the entry point,
/// the others can be referenced from it as subtrees.
#[derive(Debug, PartialEq)]
pub struct TreeSource<'src> {
    pub tree_defs: Vec<TreeRootDef<'src>>,
}

#[cfg(test)]
mod test;
