use log::info;
use nalgebra::Vector3;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::io::input::PointRecord;
use crate::mesh::exformat::write_ex_file;
use crate::mesh::{Document, FieldDefinition, SubelementHandling, COORDINATES, DATAPOINTS};

const DOCUMENT_NAME: &str = "BiV Heart Data";

/// A value that can be stored on a node: it names its fields and hands out
/// the value of each one.
pub trait NodeData {
    fn field_names(&self) -> &'static [&'static str];
    fn field_value(&self, name: &str) -> Option<Vector3<f64>>;
}

impl NodeData for PointRecord {
    fn field_names(&self) -> &'static [&'static str] {
        &[COORDINATES]
    }

    fn field_value(&self, name: &str) -> Option<Vector3<f64>> {
        (name == COORDINATES).then(|| Vector3::new(self.x, self.y, self.z))
    }
}

/// Point collections the emitter accepts, nested to any depth. Points are
/// visited depth first in stored order.
pub trait NodeSource {
    fn collect_points(&self, out: &mut Vec<PointRecord>);
}

impl NodeSource for PointRecord {
    fn collect_points(&self, out: &mut Vec<PointRecord>) {
        out.push(*self);
    }
}

impl<T: NodeSource> NodeSource for [T] {
    fn collect_points(&self, out: &mut Vec<PointRecord>) {
        for item in self {
            item.collect_points(out);
        }
    }
}

impl<T: NodeSource> NodeSource for Vec<T> {
    fn collect_points(&self, out: &mut Vec<PointRecord>) {
        self.as_slice().collect_points(out);
    }
}

/// Irregularly nested point lists.
#[derive(Debug, Clone, PartialEq)]
pub enum PointTree {
    Point(PointRecord),
    List(Vec<PointTree>),
}

impl NodeSource for PointTree {
    fn collect_points(&self, out: &mut Vec<PointRecord>) {
        match self {
            PointTree::Point(point) => out.push(*point),
            PointTree::List(items) => items.collect_points(out),
        }
    }
}

/// What one written EX file holds.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSummary {
    pub path: PathBuf,
    pub node_count: usize,
    /// Node count per group name.
    pub groups: BTreeMap<String, usize>,
}

/// Builds a fresh document from `surfaces` and writes it to `output_path`,
/// replacing any file already there.
pub fn write_ex<S: NodeSource>(
    output_path: &Path,
    surfaces: &BTreeMap<String, S>,
) -> Result<DocumentSummary> {
    let mut doc = Document::new(DOCUMENT_NAME);
    load(&mut doc, surfaces)?;
    write_ex_file(&doc, output_path)?;

    let summary = summarize(&doc, output_path);
    info!(
        "Wrote {} nodes in {} groups to {}",
        summary.node_count,
        summary.groups.len(),
        output_path.display()
    );
    Ok(summary)
}

pub fn load<S: NodeSource>(doc: &mut Document, surfaces: &BTreeMap<String, S>) -> Result<()> {
    doc.find_or_create_field(FieldDefinition::coordinates());

    for (surface, points) in surfaces {
        let node_identifiers = create_nodes(doc, points, DATAPOINTS)?;
        create_group_nodes(doc, surface, &node_identifiers, DATAPOINTS)?;
    }
    Ok(())
}

pub fn create_nodes<S: NodeSource + ?Sized>(
    doc: &mut Document,
    source: &S,
    nodeset: &str,
) -> Result<Vec<u32>> {
    let mut points = Vec::new();
    source.collect_points(&mut points);
    points
        .iter()
        .map(|point| create_node(doc, point, nodeset))
        .collect()
}

pub fn create_node<D: NodeData + ?Sized>(doc: &mut Document, data: &D, nodeset: &str) -> Result<u32> {
    let mut values = BTreeMap::new();
    for name in data.field_names() {
        let value = data
            .field_value(name)
            .ok_or_else(|| ConvertError::UndefinedField(name.to_string()))?;
        values.insert(name.to_string(), value);
    }
    doc.create_node(nodeset, values)
}

/// Adds `node_ids` to the node group of `group_name` for `nodeset`, inside a
/// single change block.
pub fn create_group_nodes(
    doc: &mut Document,
    group_name: &str,
    node_ids: &[u32],
    nodeset: &str,
) -> Result<()> {
    let mut change = doc.begin_change();

    let existing: Vec<u32> = {
        let nodes = change
            .find_nodeset_by_name(nodeset)
            .ok_or_else(|| ConvertError::MissingNodeset(nodeset.to_string()))?;
        node_ids
            .iter()
            .copied()
            .filter(|id| nodes.find_node_by_identifier(*id).is_some())
            .collect()
    };

    let group = change.find_or_create_group(group_name);
    group.subelement_handling = SubelementHandling::Full;
    let node_group = group.find_or_create_node_group(nodeset);
    for id in existing {
        node_group.add_node(id);
    }
    Ok(())
}

fn summarize(doc: &Document, path: &Path) -> DocumentSummary {
    let node_count = doc
        .find_nodeset_by_name(DATAPOINTS)
        .map_or(0, |nodes| nodes.len());
    let groups = doc
        .groups()
        .iter()
        .map(|g| {
            let count = g.node_group(DATAPOINTS).map_or(0, |ng| ng.len());
            (g.name.clone(), count)
        })
        .collect();
    DocumentSummary {
        path: path.to_path_buf(),
        node_count,
        groups,
    }
}
