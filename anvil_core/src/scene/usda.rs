//! ASCII scene format reader/writer
//!
//! Covers the subset the converters produce: the `#usda 1.0` header, layer
//! metadata, nested `def` blocks with prim metadata (`apiSchemas`, `comment`,
//! `customData`), single-line attributes and translate/orient transform ops.

use super::{format_number, format_tuple, parse_tuple, quote, unescape};
use super::{Attribute, NodeKind, SceneDocument, SceneNode, Transform};
use crate::error::{AnvilError, AnvilResult};
use std::fmt::Write;

/// Marker that opens every document
pub const FORMAT_MARKER: &str = "#usda";

/// Marker that opens every transform prim
pub const NODE_MARKER: &str = "def Xform";

const INDENT: &str = "    ";
const TRANSLATE_OP: &str = "xformOp:translate";
const ORIENT_OP: &str = "xformOp:orient";
const OP_ORDER: &str = "xformOpOrder";

/// Serialize a document; output depends only on the document contents
pub fn write_document(doc: &SceneDocument) -> String {
    let mut out = String::new();
    out.push_str("#usda 1.0\n(\n");
    if let Some(default_prim) = &doc.default_prim {
        let _ = writeln!(out, "{}defaultPrim = {}", INDENT, quote(default_prim));
    }
    if let Some(text) = &doc.doc {
        let _ = writeln!(out, "{}doc = {}", INDENT, quote(text));
    }
    let _ = writeln!(
        out,
        "{}metersPerUnit = {}",
        INDENT,
        format_number(doc.meters_per_unit)
    );
    let _ = writeln!(out, "{}upAxis = {}", INDENT, quote(&doc.up_axis));
    out.push_str(")\n");

    for root in &doc.roots {
        out.push('\n');
        write_node(&mut out, root, 0);
    }
    out
}

fn write_node(out: &mut String, node: &SceneNode, depth: usize) {
    let pad = INDENT.repeat(depth);
    let inner = INDENT.repeat(depth + 1);

    let has_metadata =
        !node.api_schemas.is_empty() || node.comment.is_some() || !node.custom_data.is_empty();

    if has_metadata {
        let _ = writeln!(out, "{}def {} {} (", pad, node.type_name, quote(&node.name));
        if !node.api_schemas.is_empty() {
            let schemas: Vec<String> = node.api_schemas.iter().map(|s| quote(s)).collect();
            let _ = writeln!(
                out,
                "{}prepend apiSchemas = [{}]",
                inner,
                schemas.join(", ")
            );
        }
        if let Some(comment) = &node.comment {
            let _ = writeln!(out, "{}comment = {}", inner, quote(comment));
        }
        if !node.custom_data.is_empty() {
            let _ = writeln!(out, "{}customData = {{", inner);
            for (key, value) in &node.custom_data {
                let _ = writeln!(out, "{}{}string {} = {}", inner, INDENT, key, quote(value));
            }
            let _ = writeln!(out, "{}}}", inner);
        }
        let _ = writeln!(out, "{})", pad);
    } else {
        let _ = writeln!(out, "{}def {} {}", pad, node.type_name, quote(&node.name));
    }
    let _ = writeln!(out, "{}{{", pad);

    for (name, attribute) in &node.attributes {
        let _ = writeln!(out, "{}{} {} = {}", inner, attribute.type_name, name, attribute.value);
    }

    if let Some(transform) = &node.transform {
        let _ = writeln!(
            out,
            "{}double3 {} = {}",
            inner,
            TRANSLATE_OP,
            format_tuple(&transform.translation)
        );
        let mut ops = vec![quote(TRANSLATE_OP)];
        if transform.has_rotation() {
            let _ = writeln!(
                out,
                "{}quatd {} = {}",
                inner,
                ORIENT_OP,
                format_tuple(&transform.orientation)
            );
            ops.push(quote(ORIENT_OP));
        }
        let _ = writeln!(out, "{}uniform token[] {} = [{}]", inner, OP_ORDER, ops.join(", "));
    }

    for (i, child) in node.children.iter().enumerate() {
        if i > 0 || !node.attributes.is_empty() || node.transform.is_some() {
            out.push('\n');
        }
        write_node(out, child, depth + 1);
    }

    let _ = writeln!(out, "{}}}", pad);
}

/// Line cursor skipping blank lines and `#` comments
struct Lines<'a> {
    lines: Vec<(usize, &'a str)>,
    pos: usize,
}

impl<'a> Lines<'a> {
    fn new(content: &'a str) -> Self {
        let lines = content
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty())
            .collect();
        Self { lines, pos: 0 }
    }

    fn peek(&self) -> Option<(usize, &'a str)> {
        self.lines.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<(usize, &'a str)> {
        let line = self.peek()?;
        self.pos += 1;
        Some(line)
    }

    fn last_line(&self) -> usize {
        self.lines.last().map(|(n, _)| *n).unwrap_or(0)
    }

    /// Next line that is not a comment
    fn next_significant(&mut self) -> Option<(usize, &'a str)> {
        while let Some((n, line)) = self.next() {
            if !line.starts_with('#') {
                return Some((n, line));
            }
        }
        None
    }

    fn peek_significant(&mut self) -> Option<(usize, &'a str)> {
        while let Some((_, line)) = self.peek() {
            if line.starts_with('#') {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.peek()
    }
}

/// Parse a document produced by [`write_document`] (or hand-written in the same subset)
pub fn parse_document(content: &str) -> AnvilResult<SceneDocument> {
    let mut lines = Lines::new(content);

    match lines.next() {
        Some((_, header)) if header.starts_with(FORMAT_MARKER) => {}
        Some((n, _)) => return Err(AnvilError::parse(n, "missing #usda header")),
        None => return Err(AnvilError::parse(0, "empty document")),
    }

    let mut doc = SceneDocument::empty();

    if matches!(lines.peek_significant(), Some((_, "("))) {
        lines.next();
        loop {
            let (n, line) = lines.next_significant().ok_or_else(|| {
                AnvilError::parse(lines.last_line(), "unterminated layer metadata")
            })?;
            if line == ")" {
                break;
            }
            let (key, value) = split_assignment(line).ok_or_else(|| {
                AnvilError::parse(n, format!("malformed layer metadata '{}'", line))
            })?;
            match key {
                "defaultPrim" => doc.default_prim = Some(unquote(value)),
                "doc" => doc.doc = Some(unquote(value)),
                "upAxis" => doc.up_axis = unquote(value),
                "metersPerUnit" => {
                    doc.meters_per_unit = value
                        .parse()
                        .map_err(|_| AnvilError::parse(n, "metersPerUnit is not a number"))?
                }
                _ => {}
            }
        }
    }

    while let Some((n, line)) = lines.next_significant() {
        if let Some(header) = line.strip_prefix("def ") {
            let node = parse_prim(&mut lines, n, header)?;
            doc.roots.push(node);
        } else {
            return Err(AnvilError::parse(n, format!("unexpected '{}' at top level", line)));
        }
    }

    Ok(doc)
}

fn parse_prim(lines: &mut Lines<'_>, line_no: usize, header: &str) -> AnvilResult<SceneNode> {
    let header = header.trim();
    let (type_name, rest) = header
        .split_once(char::is_whitespace)
        .ok_or_else(|| AnvilError::parse(line_no, "prim definition without a name"))?;
    let rest = rest.trim();

    let name_body = rest
        .strip_prefix('"')
        .ok_or_else(|| AnvilError::parse(line_no, "prim name must be quoted"))?;
    let end = name_body
        .find('"')
        .ok_or_else(|| AnvilError::parse(line_no, "unterminated prim name"))?;
    let name = &name_body[..end];
    let trailer = name_body[end + 1..].trim();

    let mut node = SceneNode {
        name: name.to_string(),
        type_name: type_name.to_string(),
        kind: NodeKind::Xform,
        api_schemas: Vec::new(),
        transform: None,
        attributes: Default::default(),
        comment: None,
        custom_data: Default::default(),
        children: Vec::new(),
    };

    let opens_metadata = match trailer {
        "(" => true,
        "" => {
            if matches!(lines.peek_significant(), Some((_, "("))) {
                lines.next();
                true
            } else {
                false
            }
        }
        other => {
            return Err(AnvilError::parse(
                line_no,
                format!("unexpected '{}' after prim name", other),
            ))
        }
    };

    if opens_metadata {
        parse_prim_metadata(lines, &mut node)?;
    }

    match lines.next_significant() {
        Some((_, "{")) => {}
        Some((n, other)) => {
            return Err(AnvilError::parse(
                n,
                format!("expected '{{' to open prim '{}', found '{}'", node.name, other),
            ))
        }
        None => {
            return Err(AnvilError::parse(
                lines.last_line(),
                format!("prim '{}' has no body", node.name),
            ))
        }
    }

    let mut translation = None;
    let mut orientation = None;

    loop {
        let (n, line) = lines.next_significant().ok_or_else(|| {
            AnvilError::parse(lines.last_line(), format!("unterminated prim '{}'", node.name))
        })?;

        if line == "}" {
            break;
        }

        if let Some(child_header) = line.strip_prefix("def ") {
            let child = parse_prim(lines, n, child_header)?;
            node.children.push(child);
            continue;
        }

        let Some((decl, value)) = split_assignment(line) else {
            // declaration without a value
            continue;
        };
        let Some((attr_type, attr_name)) = decl.rsplit_once(char::is_whitespace) else {
            return Err(AnvilError::parse(n, format!("malformed attribute '{}'", line)));
        };

        match attr_name {
            TRANSLATE_OP => {
                let v = parse_tuple(value)
                    .filter(|v| v.len() == 3)
                    .ok_or_else(|| AnvilError::parse(n, "translate must be a 3-tuple"))?;
                translation = Some([v[0], v[1], v[2]]);
            }
            ORIENT_OP => {
                let v = parse_tuple(value)
                    .filter(|v| v.len() == 4)
                    .ok_or_else(|| AnvilError::parse(n, "orient must be a 4-tuple"))?;
                orientation = Some([v[0], v[1], v[2], v[3]]);
            }
            OP_ORDER => {}
            _ => {
                node.attributes.insert(
                    attr_name.to_string(),
                    Attribute::new(attr_type.trim(), value),
                );
            }
        }
    }

    if translation.is_some() || orientation.is_some() {
        let identity = Transform::identity();
        node.transform = Some(Transform {
            translation: translation.unwrap_or(identity.translation),
            orientation: orientation.unwrap_or(identity.orientation),
        });
    }

    node.kind = NodeKind::classify(&node.type_name, &node.api_schemas);
    Ok(node)
}

fn parse_prim_metadata(lines: &mut Lines<'_>, node: &mut SceneNode) -> AnvilResult<()> {
    loop {
        let (n, line) = lines.next_significant().ok_or_else(|| {
            AnvilError::parse(
                lines.last_line(),
                format!("unterminated metadata for prim '{}'", node.name),
            )
        })?;

        if line == ")" {
            return Ok(());
        }

        let Some((key, value)) = split_assignment(line) else {
            return Err(AnvilError::parse(n, format!("malformed prim metadata '{}'", line)));
        };

        match key.rsplit(char::is_whitespace).next().unwrap_or(key) {
            "apiSchemas" => node.api_schemas = parse_string_list(value),
            "comment" => node.comment = Some(unquote(value)),
            "customData" => {
                if value != "{" {
                    return Err(AnvilError::parse(n, "customData must open a block"));
                }
                loop {
                    let (n, entry) = lines.next_significant().ok_or_else(|| {
                        AnvilError::parse(lines.last_line(), "unterminated customData")
                    })?;
                    if entry == "}" {
                        break;
                    }
                    let (decl, value) = split_assignment(entry)
                        .ok_or_else(|| AnvilError::parse(n, "malformed customData entry"))?;
                    let key = decl.rsplit(char::is_whitespace).next().unwrap_or(decl);
                    node.custom_data.insert(key.to_string(), unquote(value));
                }
            }
            _ => {}
        }
    }
}

fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let (lhs, rhs) = line.split_once(" = ")?;
    Some((lhs.trim(), rhs.trim()))
}

fn unquote(value: &str) -> String {
    let v = value.trim();
    if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        unescape(&v[1..v.len() - 1])
    } else {
        v.to_string()
    }
}

fn parse_string_list(value: &str) -> Vec<String> {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|s| unquote(s.trim()))
        .filter(|s| !s.is_empty())
        .collect()
}
