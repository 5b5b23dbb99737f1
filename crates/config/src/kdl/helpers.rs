//! Small accessors over KDL nodes.
//!
//! Settings are written as child nodes with positional arguments:
//! `storage "/var/lib/certkeep"` or `client "php" "/path/bin/acme"`.

use kdl::{KdlNode, KdlValue};

/// Find the first child node with the given name
pub fn child<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|n| n.name().value() == name)
}

/// Positional (unnamed) argument values of a node
pub fn args(node: &KdlNode) -> impl Iterator<Item = &KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
}

/// First positional argument as a string
pub fn get_first_arg_string(node: &KdlNode) -> Option<String> {
    args(node).next()?.as_string().map(str::to_string)
}

/// First argument of child `name` as a string
pub fn get_string_entry(node: &KdlNode, name: &str) -> Option<String> {
    child(node, name).and_then(get_first_arg_string)
}

/// All string arguments of child `name`
pub fn get_string_args(node: &KdlNode, name: &str) -> Option<Vec<String>> {
    let child = child(node, name)?;
    Some(
        args(child)
            .filter_map(|v| v.as_string().map(str::to_string))
            .collect(),
    )
}

/// String arguments of every child named `name`, flattened
pub fn get_repeated_strings(node: &KdlNode, name: &str) -> Vec<String> {
    let Some(children) = node.children() else {
        return Vec::new();
    };
    children
        .nodes()
        .iter()
        .filter(|n| n.name().value() == name)
        .flat_map(|n| {
            args(n)
                .filter_map(|v| v.as_string().map(str::to_string))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// First argument of child `name` as a bool.
///
/// Accepts KDL booleans as well as the strings "true"/"false"/"yes"/"no".
pub fn get_bool_entry(node: &KdlNode, name: &str) -> Option<bool> {
    let value = args(child(node, name)?).next()?;
    if let Some(b) = value.as_bool() {
        return Some(b);
    }
    match value.as_string()?.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// First argument of child `name` as an integer
pub fn get_int_entry(node: &KdlNode, name: &str) -> Option<i128> {
    let value = args(child(node, name)?).next()?;
    value
        .as_integer()
        .or_else(|| value.as_string().and_then(|s| s.trim().parse().ok()))
}
