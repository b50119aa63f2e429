mod loader;
mod nom_parser;
mod yaml_parser;

use crate::{error::LoadError, Registry, Tree};

pub use self::{
    loader::load,
    nom_parser::{
        parse_file, BlackboardValue, PortDef, PortMap, TreeDef, TreeRootDef, TreeSource, VarDef,
    },
    yaml_parser::load_yaml,
};

/// Parse a whole tree definition, reporting where it stopped making sense.
pub fn parse_source(source: &str) -> Result<TreeSource, LoadError> {
    match parse_file(source) {
        Ok(("", tree_source)) => Ok(tree_source),
        Ok((rest, _)) => Err(parse_error(source, rest, "unexpected input")),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(parse_error(source, e.input, e.code.description()))
        }
        Err(nom::Err::Incomplete(_)) => Err(parse_error(source, "", "unexpected end of input")),
    }
}

/// Parse `source` and build its `main` tree.
pub fn load_str(source: &str, registry: &Registry, check_ports: bool) -> Result<Tree, LoadError> {
    let tree_source = parse_source(source)?;
    load(&tree_source, registry, check_ports)
}

fn parse_error(source: &str, rest: &str, message: &str) -> LoadError {
    let offset = source.len() - rest.len();
    let consumed = &source[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = match consumed.rfind('\n') {
        Some(newline) => offset - newline,
        None => offset + 1,
    };
    LoadError::Parse {
        line,
        column,
        message: message.to_owned(),
    }
}
