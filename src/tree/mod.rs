//! Category/shape tree kept in sync with an image's flat shape list.
//!
//! The editor displays the shapes of one image as a tree whose levels
//! strictly alternate between category groups and shapes:
//!
//! ```text
//! root
//! ├── car            (category group)
//! │   ├── car 1      (shape)
//! │   │   └── wheel  (category group)
//! │   │       ├── wheel 1
//! │   │       └── wheel 2
//! │   └── car 2
//! └── person
//!     └── person 1
//! ```
//!
//! A category group exists under a parent exactly as long as at least one
//! shape of that category is attached there. Shapes within a group carry a
//! 1-based positional id with no gaps.
//!
//! Nodes live in a slot arena addressed by [`NodeId`]. Each id carries a
//! generation, so an id kept across a removal is rejected instead of
//! silently resolving to whatever reused the slot.

use std::fmt;

use thiserror::Error;

use crate::model::{BoundingShapeData, CategoryId, ImageAnnotation, Shape};

/// Handle to a node of an [`AnnotationTree`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

/// Errors from tree operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} does not exist (removed or from another tree)")]
    StaleNode(NodeId),

    #[error("shapes can only be inserted under the root or a shape, not under a {kind} node")]
    InvalidParent { node: NodeId, kind: &'static str },

    #[error("node {0} is not a shape node")]
    NotAShape(NodeId),
}

/// A shape as stored in the tree, without its parts (those are child nodes).
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeNode {
    pub category: CategoryId,
    pub shape: Shape,
    /// 1-based position among the shapes of the same category group.
    pub sibling_id: usize,
    sequence: u64,
}

impl ShapeNode {
    /// Insertion order of this shape within the tree.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// What a node represents.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Root,
    CategoryGroup { category: CategoryId },
    Shape(ShapeNode),
}

impl NodeKind {
    fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::CategoryGroup { .. } => "category group",
            NodeKind::Shape(_) => "shape",
        }
    }
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Alternating category-group/shape tree for one image.
#[derive(Clone, Debug)]
pub struct AnnotationTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    shape_count: usize,
    next_sequence: u64,
}

impl Default for AnnotationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationTree {
    /// Creates a tree holding only the root node.
    pub fn new() -> Self {
        let root = Node {
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            shape_count: 0,
            next_sequence: 0,
        }
    }

    /// Builds the tree for a list of top-level shapes.
    pub fn build(shapes: &[BoundingShapeData]) -> Self {
        let mut tree = Self::new();
        let root = tree.root;
        for shape in shapes {
            // Inserting under the root of a fresh tree cannot fail.
            let _ = tree.insert(shape, root);
        }
        tree
    }

    /// Builds the tree for an image annotation.
    pub fn from_annotation(annotation: &ImageAnnotation) -> Self {
        Self::build(&annotation.shapes)
    }

    /// Drops every node except the root.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of shape nodes, nested parts included.
    pub fn shape_count(&self) -> usize {
        self.shape_count
    }

    /// Number of live nodes, including the root and category groups.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).ok().map(|node| &node.kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|node| node.parent)
    }

    /// Children in display order; empty for a stale id.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn shape(&self, id: NodeId) -> Option<&ShapeNode> {
        match self.kind(id) {
            Some(NodeKind::Shape(shape)) => Some(shape),
            _ => None,
        }
    }

    /// 1-based position of a shape among its category siblings.
    pub fn sibling_id(&self, id: NodeId) -> Option<usize> {
        self.shape(id).map(|shape| shape.sibling_id)
    }

    /// The category group for `category` directly under `parent`, if any.
    pub fn category_group(&self, parent: NodeId, category: CategoryId) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|child| {
            matches!(
                self.kind(*child),
                Some(NodeKind::CategoryGroup { category: c }) if *c == category
            )
        })
    }

    /// Category groups directly under `parent`, in display order.
    pub fn category_groups(&self, parent: NodeId) -> Vec<(CategoryId, NodeId)> {
        self.children(parent)
            .iter()
            .filter_map(|child| match self.kind(*child) {
                Some(NodeKind::CategoryGroup { category }) => Some((*category, *child)),
                _ => None,
            })
            .collect()
    }

    /// Depth-first, pre-order traversal starting at the root.
    pub fn iter(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Shape nodes in depth-first order.
    pub fn shape_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter().filter(|id| self.shape(*id).is_some())
    }

    /// Inserts a shape (and, recursively, its parts) under `parent`.
    ///
    /// `parent` must be the root or a shape node. The shape lands in the
    /// category group of `parent` matching its category, which is created on
    /// demand. Parts are inserted under the new shape node the same way.
    /// Returns the id of the new shape node.
    pub fn insert(&mut self, shape: &BoundingShapeData, parent: NodeId) -> Result<NodeId, TreeError> {
        let parent_kind = &self.node(parent)?.kind;
        if let NodeKind::CategoryGroup { .. } = parent_kind {
            return Err(TreeError::InvalidParent {
                node: parent,
                kind: parent_kind.name(),
            });
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let id = self.alloc(Node {
            kind: NodeKind::Shape(ShapeNode {
                category: shape.category,
                shape: shape.shape.clone(),
                sibling_id: 0,
                sequence,
            }),
            parent: None,
            children: Vec::new(),
        });
        self.shape_count += 1;
        self.attach(id, parent, shape.category)?;

        for part in &shape.parts {
            self.insert(part, id)?;
        }
        Ok(id)
    }

    /// Removes a shape node together with all of its parts.
    ///
    /// Later siblings in the same category group move up by one. If the
    /// shape was the group's last member the group is removed as well; the
    /// collapse never goes further up the tree. Returns the removed shape
    /// with its parts.
    pub fn remove(&mut self, id: NodeId) -> Result<BoundingShapeData, TreeError> {
        let data = self.shape_data(id)?;
        self.detach(id)?;
        self.free_subtree(id);
        Ok(data)
    }

    /// Moves a shape (with its parts) into the category group for `category`
    /// under the same parent.
    ///
    /// The old group collapses if it empties; the target group is created if
    /// needed. The shape goes to the end of its new group.
    pub fn reassign_category(&mut self, id: NodeId, category: CategoryId) -> Result<(), TreeError> {
        let current = self.shape(id).ok_or(TreeError::NotAShape(id))?.category;
        if current == category {
            return Ok(());
        }
        let group = self.parent(id).ok_or(TreeError::NotAShape(id))?;
        let owner = self.parent(group).ok_or(TreeError::NotAShape(id))?;

        self.detach(id)?;
        if let NodeKind::Shape(shape) = &mut self.node_mut(id)?.kind {
            shape.category = category;
        }
        self.attach(id, owner, category)
    }

    /// Rebuilds the shapes attached under `id` (the root or a shape node).
    ///
    /// Shapes come back in the order they were inserted, each with its
    /// nested parts, so `extract` after `build` yields the original list.
    pub fn extract(&self, id: NodeId) -> Result<Vec<BoundingShapeData>, TreeError> {
        let node = self.node(id)?;
        if let NodeKind::CategoryGroup { .. } = node.kind {
            return Err(TreeError::InvalidParent {
                node: id,
                kind: node.kind.name(),
            });
        }

        let mut shapes: Vec<(u64, NodeId)> = Vec::new();
        for group in &node.children {
            for child in &self.node(*group)?.children {
                let sequence = self.shape(*child).ok_or(TreeError::NotAShape(*child))?.sequence;
                shapes.push((sequence, *child));
            }
        }
        shapes.sort_by_key(|(sequence, _)| *sequence);

        shapes
            .into_iter()
            .map(|(_, child)| self.shape_data(child))
            .collect()
    }

    /// All top-level shapes of the image, with nested parts.
    pub fn extract_all(&self) -> Vec<BoundingShapeData> {
        // The root is always live and never a category group.
        self.extract(self.root).unwrap_or_default()
    }

    /// A single shape node converted back to data, parts included.
    pub fn shape_data(&self, id: NodeId) -> Result<BoundingShapeData, TreeError> {
        let shape = self.shape(id).ok_or_else(|| {
            if self.contains(id) {
                TreeError::NotAShape(id)
            } else {
                TreeError::StaleNode(id)
            }
        })?;
        Ok(BoundingShapeData::new(shape.category, shape.shape.clone()).with_parts(self.extract(id)?))
    }

    /// Checks the structural invariants of the tree.
    ///
    /// Returns a description of the first violation found. Used by tests;
    /// every public operation maintains these invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut shapes_seen = 0;
        for id in self.iter() {
            let node = self.node(id).map_err(|e| e.to_string())?;
            for child in &node.children {
                if self.parent(*child) != Some(id) {
                    return Err(format!("node {child} does not point back to parent {id}"));
                }
            }
            match &node.kind {
                NodeKind::Root | NodeKind::Shape(_) => {
                    if let NodeKind::Shape(_) = node.kind {
                        shapes_seen += 1;
                    }
                    let mut categories = Vec::new();
                    for child in &node.children {
                        match self.kind(*child) {
                            Some(NodeKind::CategoryGroup { category }) => {
                                if categories.contains(category) {
                                    return Err(format!("duplicate group for category {category} under {id}"));
                                }
                                categories.push(*category);
                            }
                            _ => return Err(format!("node {child} under {id} is not a category group")),
                        }
                    }
                }
                NodeKind::CategoryGroup { category } => {
                    if node.children.is_empty() {
                        return Err(format!("category group {id} is empty"));
                    }
                    for (position, child) in node.children.iter().enumerate() {
                        let shape = self
                            .shape(*child)
                            .ok_or_else(|| format!("node {child} under group {id} is not a shape"))?;
                        if shape.category != *category {
                            return Err(format!("shape {child} sits in the group of another category"));
                        }
                        if shape.sibling_id != position + 1 {
                            return Err(format!(
                                "shape {child} has sibling id {} at position {}",
                                shape.sibling_id,
                                position + 1
                            ));
                        }
                    }
                }
            }
        }
        if shapes_seen != self.shape_count {
            return Err(format!(
                "shape count {} does not match {} reachable shapes",
                self.shape_count, shapes_seen
            ));
        }
        Ok(())
    }

    // Puts an unattached shape node at the end of the matching group of `owner`.
    fn attach(&mut self, id: NodeId, owner: NodeId, category: CategoryId) -> Result<(), TreeError> {
        let group = match self.category_group(owner, category) {
            Some(group) => group,
            None => {
                let group = self.alloc(Node {
                    kind: NodeKind::CategoryGroup { category },
                    parent: Some(owner),
                    children: Vec::new(),
                });
                self.node_mut(owner)?.children.push(group);
                group
            }
        };

        let group_node = self.node_mut(group)?;
        group_node.children.push(id);
        let sibling_id = group_node.children.len();

        let node = self.node_mut(id)?;
        node.parent = Some(group);
        if let NodeKind::Shape(shape) = &mut node.kind {
            shape.sibling_id = sibling_id;
        }
        Ok(())
    }

    // Unlinks a shape node from its group, renumbering later siblings and
    // dropping the group if it became empty. The node's own subtree stays intact.
    fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        if self.shape(id).is_none() {
            return Err(if self.contains(id) {
                TreeError::NotAShape(id)
            } else {
                TreeError::StaleNode(id)
            });
        }
        let group = self.parent(id).ok_or(TreeError::NotAShape(id))?;

        let group_node = self.node_mut(group)?;
        let position = group_node
            .children
            .iter()
            .position(|child| *child == id)
            .ok_or(TreeError::StaleNode(id))?;
        group_node.children.remove(position);
        let later: Vec<NodeId> = group_node.children[position..].to_vec();
        let group_empty = group_node.children.is_empty();
        let owner = group_node.parent;

        for sibling in later {
            if let NodeKind::Shape(shape) = &mut self.node_mut(sibling)?.kind {
                shape.sibling_id -= 1;
            }
        }

        if group_empty {
            if let Some(owner) = owner {
                self.node_mut(owner)?.children.retain(|child| *child != group);
            }
            self.release(group);
        }

        self.node_mut(id)?.parent = None;
        Ok(())
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let is_shape = match self.node(current) {
                Ok(node) => {
                    stack.extend(node.children.iter().copied());
                    matches!(node.kind, NodeKind::Shape(_))
                }
                Err(_) => false,
            };
            if is_shape {
                self.shape_count -= 1;
            }
            self.release(current);
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(TreeError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(TreeError::StaleNode(id))
    }
}

/// Fuzz-only entrypoint: replays `ops` as an edit session and checks the
/// tree after every step.
///
/// Each op is three bytes: action, node pick, category.
#[cfg(feature = "fuzzing")]
pub fn fuzz_edit_session(ops: &[u8]) -> Result<(), String> {
    use crate::model::BoundingBox;

    let mut tree = AnnotationTree::new();
    for op in ops.chunks_exact(3) {
        let shapes: Vec<NodeId> = tree.shape_nodes().collect();
        let pick = |byte: u8| shapes.get(byte as usize % shapes.len().max(1)).copied();
        let category = CategoryId(u64::from(op[2] % 4) + 1);
        match op[0] % 3 {
            0 => {
                let parent = if op[1] % 2 == 0 { tree.root() } else { pick(op[1]).unwrap_or(tree.root()) };
                let shape = BoundingShapeData::new_box(category, BoundingBox::from_xyxy(0.0, 0.0, 1.0, 1.0));
                tree.insert(&shape, parent).map_err(|e| e.to_string())?;
            }
            1 => {
                if let Some(id) = pick(op[1]) {
                    tree.remove(id).map_err(|e| e.to_string())?;
                }
            }
            _ => {
                if let Some(id) = pick(op[1]) {
                    tree.reassign_category(id, category).map_err(|e| e.to_string())?;
                }
            }
        }
        tree.check_invariants()?;
    }
    let rebuilt = AnnotationTree::build(&tree.extract_all());
    if rebuilt.extract_all() != tree.extract_all() {
        return Err("rebuilding from extracted shapes changed the tree".to_string());
    }
    Ok(())
}

/// Depth-first, pre-order iterator over node ids.
pub struct DepthFirst<'a> {
    tree: &'a AnnotationTree,
    stack: Vec<NodeId>,
}

impl Iterator for DepthFirst<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let next = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(next).iter().rev().copied());
        Some(next)
    }
}
