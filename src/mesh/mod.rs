//! In-memory node/group document written out as an EX file.
//!
//! A [`Document`] plays the role of a region in the visualization toolkit:
//! it owns field definitions, nodesets with sequentially numbered nodes, and
//! named groups that reference nodes by identifier. Changes made inside a
//! [`ChangeGuard`] are reported as a single change event when the guard is
//! dropped.

pub mod exformat;

use nalgebra::Vector3;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use crate::error::{ConvertError, Result};

/// Nodeset holding the converted surface points.
pub const DATAPOINTS: &str = "datapoints";
/// Nodeset for mesh nodes; always present, unused by the converter.
pub const NODES: &str = "nodes";
/// Name of the coordinate field carried by every data point.
pub const COORDINATES: &str = "coordinates";

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub components: Vec<String>,
}

impl FieldDefinition {
    /// Rectangular cartesian coordinate field with x, y, z components.
    pub fn coordinates() -> Self {
        Self {
            name: COORDINATES.to_string(),
            components: vec!["x".into(), "y".into(), "z".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u32,
    pub values: BTreeMap<String, Vector3<f64>>,
}

impl Node {
    pub fn value(&self, field: &str) -> Option<&Vector3<f64>> {
        self.values.get(field)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Nodeset {
    pub name: String,
    nodes: BTreeMap<u32, Node>,
    next_id: u32,
}

impl Nodeset {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn next_free_identifier(&mut self) -> u32 {
        while self.nodes.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        self.next_id
    }

    pub fn find_node_by_identifier(&self, id: u32) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// How a group treats the faces, lines and nodes of elements added to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubelementHandling {
    #[default]
    None,
    Full,
}

/// Subset of one nodeset belonging to a group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodesetGroup {
    pub nodeset: String,
    members: BTreeSet<u32>,
}

impl NodesetGroup {
    pub fn add_node(&mut self, id: u32) -> bool {
        self.members.insert(id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.members.contains(&id)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = u32> + '_ {
        self.members.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub name: String,
    pub subelement_handling: SubelementHandling,
    node_groups: BTreeMap<String, NodesetGroup>,
}

impl Group {
    pub fn node_group(&self, nodeset: &str) -> Option<&NodesetGroup> {
        self.node_groups.get(nodeset)
    }

    pub fn find_or_create_node_group(&mut self, nodeset: &str) -> &mut NodesetGroup {
        self.node_groups
            .entry(nodeset.to_string())
            .or_insert_with(|| NodesetGroup {
                nodeset: nodeset.to_string(),
                members: BTreeSet::new(),
            })
    }

    pub fn node_groups(&self) -> impl Iterator<Item = &NodesetGroup> {
        self.node_groups.values()
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    fields: Vec<FieldDefinition>,
    nodesets: Vec<Nodeset>,
    groups: Vec<Group>,
    change_depth: u32,
    change_pending: bool,
    change_events: usize,
}

impl Document {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            nodesets: vec![Nodeset::new(NODES), Nodeset::new(DATAPOINTS)],
            groups: Vec::new(),
            change_depth: 0,
            change_pending: false,
            change_events: 0,
        }
    }

    /// Starts a change block; one change event is emitted when the outermost
    /// guard is dropped, however many edits were made through it.
    pub fn begin_change(&mut self) -> ChangeGuard<'_> {
        self.change_depth += 1;
        ChangeGuard { document: self }
    }

    /// Number of change events emitted so far.
    pub fn change_events(&self) -> usize {
        self.change_events
    }

    fn mark_changed(&mut self) {
        if self.change_depth == 0 {
            self.change_events += 1;
        } else {
            self.change_pending = true;
        }
    }

    /// Defines `field`, or returns the existing definition with the same name.
    pub fn find_or_create_field(&mut self, field: FieldDefinition) -> &FieldDefinition {
        match self.fields.iter().position(|f| f.name == field.name) {
            Some(index) => &self.fields[index],
            None => {
                self.mark_changed();
                self.fields.push(field);
                &self.fields[self.fields.len() - 1]
            }
        }
    }

    pub fn find_field_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn find_nodeset_by_name(&self, name: &str) -> Option<&Nodeset> {
        self.nodesets.iter().find(|n| n.name == name)
    }

    pub fn nodesets(&self) -> &[Nodeset] {
        &self.nodesets
    }

    /// Creates a node in `nodeset` with the first unused identifier.
    ///
    /// Every field defined on the document must receive a value and every
    /// value must belong to a defined field.
    pub fn create_node(
        &mut self,
        nodeset: &str,
        values: BTreeMap<String, Vector3<f64>>,
    ) -> Result<u32> {
        self.check_node_values(&values)?;
        let id = self
            .nodesets
            .iter_mut()
            .find(|n| n.name == nodeset)
            .ok_or_else(|| ConvertError::MissingNodeset(nodeset.to_string()))?
            .next_free_identifier();
        self.insert_node(nodeset, Node { id, values })?;
        Ok(id)
    }

    /// Inserts a node with a caller-chosen identifier, replacing any node
    /// already stored under it.
    pub(crate) fn insert_node(&mut self, nodeset: &str, node: Node) -> Result<()> {
        self.check_node_values(&node.values)?;
        let target = self
            .nodesets
            .iter_mut()
            .find(|n| n.name == nodeset)
            .ok_or_else(|| ConvertError::MissingNodeset(nodeset.to_string()))?;
        target.nodes.insert(node.id, node);
        self.mark_changed();
        Ok(())
    }

    fn check_node_values(&self, values: &BTreeMap<String, Vector3<f64>>) -> Result<()> {
        if let Some(unknown) = values.keys().find(|k| self.find_field_by_name(k).is_none()) {
            return Err(ConvertError::UndefinedField(unknown.clone()));
        }
        if let Some(missing) = self.fields.iter().find(|f| !values.contains_key(&f.name)) {
            return Err(ConvertError::UndefinedField(missing.name.clone()));
        }
        Ok(())
    }

    pub fn find_group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn find_or_create_group(&mut self, name: &str) -> &mut Group {
        self.mark_changed();
        match self.groups.iter().position(|g| g.name == name) {
            Some(index) => &mut self.groups[index],
            None => {
                self.groups.push(Group {
                    name: name.to_string(),
                    ..Group::default()
                });
                let last = self.groups.len() - 1;
                &mut self.groups[last]
            }
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

/// Open change block on a [`Document`]; see [`Document::begin_change`].
pub struct ChangeGuard<'a> {
    document: &'a mut Document,
}

impl Deref for ChangeGuard<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.document
    }
}

impl DerefMut for ChangeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        self.document
    }
}

impl Drop for ChangeGuard<'_> {
    fn drop(&mut self) {
        self.document.change_depth -= 1;
        if self.document.change_depth == 0 && self.document.change_pending {
            self.document.change_pending = false;
            self.document.change_events += 1;
        }
    }
}
