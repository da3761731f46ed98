//! Reading and writing the EX text format.
//!
//! Only the subset produced by [`write_document`] is understood by
//! [`read_document`]: node-only nodesets with real-valued fields and groups
//! made of node groups.

use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::{Document, FieldDefinition, Node};
use crate::error::{ConvertError, Result};

const EX_VERSION: &str = "EX Version: 3";
const NODE_TEMPLATE: &str = "node1";

/// Writes `doc` to `path`, truncating any existing file. Parent directories
/// are not created.
pub fn write_ex_file(doc: &Document, path: &Path) -> Result<()> {
    let output_error = |source| ConvertError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(output_error)?;
    let mut writer = BufWriter::new(file);
    write_document(doc, &mut writer).map_err(output_error)?;
    writer.flush().map_err(output_error)
}

pub fn write_document<W: Write>(doc: &Document, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "{}", EX_VERSION)?;
    writeln!(writer, "Region: /")?;

    for nodeset in doc.nodesets().iter().filter(|n| !n.is_empty()) {
        writeln!(writer, "!#nodeset {}", nodeset.name)?;
        write_node_template(doc.fields(), writer)?;

        for node in nodeset.nodes() {
            writeln!(writer, "Node: {}", node.id)?;
            for field in doc.fields() {
                // create_node guarantees a value for every defined field
                let value = node.value(&field.name).copied().unwrap_or_else(Vector3::zeros);
                let line: Vec<String> = value
                    .iter()
                    .take(field.components.len())
                    .map(|v| format!("{:e}", v))
                    .collect();
                writeln!(writer, " {}", line.join(" "))?;
            }
        }
    }

    for group in doc.groups() {
        writeln!(writer, "Group name: {}", group.name)?;
        for node_group in group.node_groups().filter(|g| !g.is_empty()) {
            writeln!(writer, "!#nodeset {}", node_group.nodeset)?;
            writeln!(writer, "Node group:")?;
            writeln!(writer, "{}", format_ranges(node_group.identifiers()))?;
        }
    }

    Ok(())
}

fn write_node_template<W: Write>(fields: &[FieldDefinition], writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "Define node template: {}", NODE_TEMPLATE)?;
    writeln!(writer, "Shape. Dimension=0")?;
    writeln!(writer, "#Fields={}", fields.len())?;
    for (index, field) in fields.iter().enumerate() {
        writeln!(
            writer,
            "{}) {}, coordinate, rectangular cartesian, real, #Components={}",
            index + 1,
            field.name,
            field.components.len()
        )?;
        for component in &field.components {
            writeln!(writer, " {}. #Values=1 (value)", component)?;
        }
    }
    writeln!(writer, "Node template: {}", NODE_TEMPLATE)?;
    Ok(())
}

/// Collapses sorted identifiers into `1..3,7` form.
pub fn format_ranges<I: IntoIterator<Item = u32>>(ids: I) -> String {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for id in ids {
        match runs.last_mut() {
            Some((_, end)) if id == *end + 1 => *end = id,
            _ => runs.push((id, id)),
        }
    }
    runs.iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{}..{}", start, end)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_ranges(text: &str) -> Option<Vec<u32>> {
    let mut ids = Vec::new();
    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once("..") {
            Some((start, end)) => {
                let start: u32 = start.trim().parse().ok()?;
                let end: u32 = end.trim().parse().ok()?;
                ids.extend(start..=end);
            }
            None => ids.push(part.parse().ok()?),
        }
    }
    Some(ids)
}

pub fn read_ex_file(path: &Path) -> Result<Document> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    read_document(&name, BufReader::new(file))
}

#[derive(Clone, Copy)]
enum Expect {
    Any,
    NodeValues { id: u32, field: usize },
    NodeGroup,
}

/// Parses an EX document previously produced by [`write_document`].
pub fn read_document<R: BufRead>(name: &str, reader: R) -> Result<Document> {
    let mut doc = Document::new(name);
    let mut nodeset = String::new();
    let mut group: Option<String> = None;
    let mut template: Vec<FieldDefinition> = Vec::new();
    let mut values: BTreeMap<String, Vector3<f64>> = BTreeMap::new();
    let mut expect = Expect::Any;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let parse_error = |message: String| ConvertError::ExParse {
            line: line_no,
            message,
        };
        let line = line.map_err(|e| parse_error(e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match expect {
            Expect::NodeValues { id, field } => {
                let parsed: Vec<f64> = trimmed
                    .split_whitespace()
                    .map(str::parse)
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| parse_error(format!("bad node value: {}", e)))?;
                if parsed.len() != 3 {
                    return Err(parse_error(format!(
                        "expected 3 components, found {}",
                        parsed.len()
                    )));
                }
                values.insert(
                    template[field].name.clone(),
                    Vector3::new(parsed[0], parsed[1], parsed[2]),
                );
                if field + 1 < template.len() {
                    expect = Expect::NodeValues { id, field: field + 1 };
                } else {
                    let node = Node {
                        id,
                        values: std::mem::take(&mut values),
                    };
                    doc.insert_node(&nodeset, node)?;
                    expect = Expect::Any;
                }
                continue;
            }
            Expect::NodeGroup => {
                let ids = parse_ranges(trimmed)
                    .ok_or_else(|| parse_error(format!("bad node range {:?}", trimmed)))?;
                let group_name = group
                    .clone()
                    .ok_or_else(|| parse_error("node group outside a group".into()))?;
                let node_group = doc
                    .find_or_create_group(&group_name)
                    .find_or_create_node_group(&nodeset);
                for id in ids {
                    node_group.add_node(id);
                }
                expect = Expect::Any;
                continue;
            }
            Expect::Any => {}
        }

        if let Some(version) = trimmed.strip_prefix("EX Version:") {
            if version.trim() != "3" {
                return Err(parse_error(format!("unsupported version {}", version.trim())));
            }
        } else if let Some(name) = trimmed.strip_prefix("!#nodeset") {
            nodeset = name.trim().to_string();
            if doc.find_nodeset_by_name(&nodeset).is_none() {
                return Err(parse_error(format!("unknown nodeset {}", nodeset)));
            }
        } else if trimmed.starts_with("Define node template:") {
            template.clear();
        } else if trimmed.starts_with("Node template:") {
            for field in &template {
                doc.find_or_create_field(field.clone());
            }
        } else if let Some(id) = trimmed.strip_prefix("Node:") {
            let id = id
                .trim()
                .parse()
                .map_err(|_| parse_error(format!("bad node identifier {:?}", id.trim())))?;
            if template.is_empty() {
                return Err(parse_error("node before field definitions".into()));
            }
            expect = Expect::NodeValues { id, field: 0 };
        } else if let Some(name) = trimmed.strip_prefix("Group name:") {
            group = Some(name.trim().to_string());
            doc.find_or_create_group(name.trim());
        } else if trimmed == "Node group:" {
            expect = Expect::NodeGroup;
        } else if let Some(field) = parse_field_header(trimmed) {
            template.push(field);
        } else if let Some((component, _)) = trimmed.split_once(". #Values") {
            let field = template
                .last_mut()
                .ok_or_else(|| parse_error("component outside a field".into()))?;
            field.components.push(component.to_string());
        }
        // Region, Shape, #Fields and Node template lines carry nothing we keep.
    }

    Ok(doc)
}

/// Parses `1) coordinates, coordinate, ...`; components follow on later lines.
fn parse_field_header(line: &str) -> Option<FieldDefinition> {
    let (number, rest) = line.split_once(") ")?;
    number.parse::<usize>().ok()?;
    let name = rest.split(',').next()?.trim();
    Some(FieldDefinition {
        name: name.to_string(),
        components: Vec::new(),
    })
}
