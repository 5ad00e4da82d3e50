//! Hierarchical meshes of triangles and quadrilaterals with hanging nodes.
//!
//! Elements live in an arena and are never removed: refining an element deactivates it and
//! appends its sons, so the refinement history is available as a tree of element indices.
//! Vertex and edge nodes are shared between elements. Midpoint vertices are identified by the
//! pair of vertices they bisect and edge nodes by their endpoints, which makes it possible to
//! look up the node "between" two vertices without any geometric search.
use crate::error::MeshError;
use log::debug;
use nalgebra::Point2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub mod procedural;
mod refinement;

pub use refinement::Refinement;

pub type NodeId = usize;
pub type ElementId = usize;
pub type Marker = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementMode {
    Triangle,
    Quad,
}

impl ElementMode {
    pub fn num_vertices(&self) -> usize {
        match self {
            ElementMode::Triangle => 3,
            ElementMode::Quad => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Vertex {
        position: Point2<f64>,
        /// The two vertices this vertex bisects, `None` for vertices of the base mesh.
        parents: Option<(NodeId, NodeId)>,
    },
    Edge {
        endpoints: (NodeId, NodeId),
        /// Active elements adjacent to the edge.
        elements: [Option<ElementId>; 2],
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Number of active elements using the node.
    pub ref_count: usize,
    /// Whether the node lies on the domain boundary.
    pub bnd: bool,
    /// Boundary marker of boundary edge nodes, zero for all other nodes.
    pub marker: Marker,
}

impl Node {
    pub fn is_vertex(&self) -> bool {
        matches!(self.kind, NodeKind::Vertex { .. })
    }

    pub fn is_edge(&self) -> bool {
        matches!(self.kind, NodeKind::Edge { .. })
    }

    pub fn position(&self) -> Option<&Point2<f64>> {
        match &self.kind {
            NodeKind::Vertex { position, .. } => Some(position),
            NodeKind::Edge { .. } => None,
        }
    }

    pub fn endpoints(&self) -> Option<(NodeId, NodeId)> {
        match self.kind {
            NodeKind::Edge { endpoints, .. } => Some(endpoints),
            NodeKind::Vertex { .. } => None,
        }
    }

    /// Active elements adjacent to an edge node. Empty for vertex nodes.
    pub fn adjacent_elements(&self) -> impl '_ + Iterator<Item = ElementId> {
        let elements: &[Option<ElementId>] = match &self.kind {
            NodeKind::Edge { elements, .. } => elements.as_slice(),
            NodeKind::Vertex { .. } => &[],
        };
        elements.iter().flatten().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub mode: ElementMode,
    /// Area marker, inherited by sons.
    pub marker: Marker,
    pub active: bool,
    /// Depth in the refinement tree, zero for base elements.
    pub level: usize,
    pub parent: Option<ElementId>,
    /// Sons after refinement. Triangles and fully split quads use all four slots,
    /// horizontally split quads use `0..2` and vertically split quads `2..4`.
    pub sons: [Option<ElementId>; 4],
    on_parent_edge: [bool; 4],
    boundary: [Option<Marker>; 4],
    vn: [NodeId; 4],
    en: [NodeId; 4],
}

impl Element {
    pub fn nvert(&self) -> usize {
        self.mode.num_vertices()
    }

    pub fn is_triangle(&self) -> bool {
        self.mode == ElementMode::Triangle
    }

    pub fn vertex_nodes(&self) -> &[NodeId] {
        &self.vn[..self.nvert()]
    }

    /// Edge nodes, where edge `i` connects vertex `i` with vertex `i + 1`.
    pub fn edge_nodes(&self) -> &[NodeId] {
        &self.en[..self.nvert()]
    }

    pub fn vn(&self, i: usize) -> NodeId {
        self.vertex_nodes()[i]
    }

    pub fn en(&self, i: usize) -> NodeId {
        self.edge_nodes()[i]
    }

    pub fn next_vert(&self, i: usize) -> usize {
        (i + 1) % self.nvert()
    }

    pub fn prev_vert(&self, i: usize) -> usize {
        (i + self.nvert() - 1) % self.nvert()
    }

    pub fn has_sons(&self) -> bool {
        self.sons.iter().any(Option::is_some)
    }

    pub fn sons(&self) -> impl '_ + Iterator<Item = ElementId> {
        self.sons.iter().flatten().copied()
    }

    /// Whether edge `i` of this element is part of edge `i` of its parent.
    pub fn lies_on_parent_edge(&self, i: usize) -> bool {
        self.parent.is_some() && self.on_parent_edge[i]
    }

    /// Boundary marker of edge `i`, or `None` for interior edges.
    ///
    /// Unlike the marker of the edge node, this survives refinement of the element.
    pub fn boundary_marker(&self, i: usize) -> Option<Marker> {
        self.boundary[i]
    }
}

/// Index-based hierarchical mesh.
#[derive(Debug, Clone)]
pub struct HierarchicalMesh {
    nodes: Vec<Option<Node>>,
    elements: Vec<Element>,
    vertex_lookup: FxHashMap<(NodeId, NodeId), NodeId>,
    edge_lookup: FxHashMap<(NodeId, NodeId), NodeId>,
    num_base_elements: usize,
    seq: u64,
}

fn sorted_pair(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl HierarchicalMesh {
    fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            elements: Vec::new(),
            vertex_lookup: FxHashMap::default(),
            edge_lookup: FxHashMap::default(),
            num_base_elements: 0,
            seq: 0,
        }
    }

    /// Sequence number, incremented on every change of the topology.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Exclusive upper bound on node ids, including ids of removed nodes.
    pub fn max_node_id(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn num_active_elements(&self) -> usize {
        self.active_elements().count()
    }

    pub fn num_base_elements(&self) -> usize {
        self.num_base_elements
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    /// # Panics
    ///
    /// Panics if the node does not exist (anymore).
    pub fn node(&self, id: NodeId) -> &Node {
        self.get_node(id)
            .unwrap_or_else(|| panic!("node {id} does not exist in the mesh"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id]
            .as_mut()
            .unwrap_or_else(|| panic!("node {id} does not exist in the mesh"))
    }

    pub fn nodes(&self) -> impl '_ + Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn get_element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id]
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Elements of the original (unrefined) mesh, the roots of the refinement trees.
    pub fn base_elements(&self) -> impl '_ + Iterator<Item = &Element> {
        self.elements[..self.num_base_elements].iter()
    }

    pub fn active_elements(&self) -> impl '_ + Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.active)
    }

    pub fn vertex_position(&self, id: NodeId) -> &Point2<f64> {
        self.node(id)
            .position()
            .unwrap_or_else(|| panic!("node {id} is not a vertex node"))
    }

    /// The vertex node bisecting the two given vertices, if it exists.
    pub fn peek_vertex_node(&self, a: NodeId, b: NodeId) -> Option<&Node> {
        self.vertex_lookup
            .get(&sorted_pair(a, b))
            .and_then(|&id| self.get_node(id))
    }

    /// The edge node connecting the two given vertices, if it exists.
    pub fn peek_edge_node(&self, a: NodeId, b: NodeId) -> Option<&Node> {
        self.edge_lookup
            .get(&sorted_pair(a, b))
            .and_then(|&id| self.get_node(id))
    }

    /// Whether the vertex node is a hanging node, i.e. it lies inside an edge of an active
    /// element that does not use it as a vertex.
    ///
    /// Interior midpoints are shared by at least four active elements once both sides of the
    /// bisected edge are refined, while a midpoint with one coarse side is referenced by at
    /// most three (the sons of a triangle, or of a quadrilateral, that touch it).
    pub fn is_constrained_vertex(&self, id: NodeId) -> bool {
        let node = self.node(id);
        match node.kind {
            NodeKind::Vertex { parents, .. } => parents.is_some() && !node.bnd && node.ref_count <= 3,
            NodeKind::Edge { .. } => false,
        }
    }

    /// Boundary markers of all active boundary edges, sorted and without duplicates.
    pub fn boundary_markers(&self) -> Vec<Marker> {
        let mut markers: Vec<_> = self
            .nodes()
            .filter(|node| node.is_edge() && node.bnd)
            .map(|node| node.marker)
            .collect();
        markers.sort_unstable();
        markers.dedup();
        markers
    }

    /// Active elements on the other side of edge `edge` of the active element `element`.
    ///
    /// Across a conforming edge this is the single neighbor sharing the edge. The coarse side
    /// of a hanging node sees all active elements on the refined side, and the refined side
    /// sees the coarse element owning the constraining edge. Boundary edges have no neighbors.
    pub fn neighbors_across_edge(&self, element: ElementId, edge: usize) -> Vec<ElementId> {
        let e = self.element(element);
        let en = self.node(e.en(edge));
        let same_level: Vec<_> = en.adjacent_elements().filter(|&id| id != element).collect();
        if !same_level.is_empty() || en.bnd {
            return same_level;
        }

        let (a, b) = (e.vn(edge), e.vn(e.next_vert(edge)));
        if self.peek_vertex_node(a, b).is_some() {
            let mut finer = Vec::new();
            self.collect_finer_neighbors(a, b, element, &mut finer);
            return finer;
        }

        // Walk up the refinement tree until an ancestor edge that still exists is found
        let mut current = e;
        while current.lies_on_parent_edge(edge) {
            let parent = self.element(current.parent.expect("checked by lies_on_parent_edge"));
            let (pa, pb) = (parent.vn(edge), parent.vn(parent.next_vert(edge)));
            if let Some(coarse) = self.peek_edge_node(pa, pb) {
                return coarse.adjacent_elements().collect();
            }
            current = parent;
        }
        Vec::new()
    }

    fn collect_finer_neighbors(&self, a: NodeId, b: NodeId, exclude: ElementId, output: &mut Vec<ElementId>) {
        let mid = match self.peek_vertex_node(a, b) {
            Some(mid) => mid.id,
            None => return,
        };
        for (p, q) in [(a, mid), (mid, b)] {
            match self.peek_edge_node(p, q) {
                Some(half) => output.extend(half.adjacent_elements().filter(|&id| id != exclude)),
                None => self.collect_finer_neighbors(p, q, exclude, output),
            }
        }
    }

    fn get_vertex_node(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let key = sorted_pair(a, b);
        if let Some(&id) = self.vertex_lookup.get(&key) {
            return id;
        }
        let position = Point2::from((self.vertex_position(a).coords + self.vertex_position(b).coords) * 0.5);
        let id = self.push_node(NodeKind::Vertex {
            position,
            parents: Some(key),
        });
        self.vertex_lookup.insert(key, id);
        id
    }

    fn get_edge_node(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let key = sorted_pair(a, b);
        if let Some(&id) = self.edge_lookup.get(&key) {
            self.node_mut(id).ref_count += 1;
            return id;
        }
        let id = self.push_node(NodeKind::Edge {
            endpoints: key,
            elements: [None, None],
        });
        self.node_mut(id).ref_count = 1;
        self.edge_lookup.insert(key, id);
        id
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(Node {
            id,
            kind,
            ref_count: 0,
            bnd: false,
            marker: 0,
        }));
        id
    }

    /// Creates a new active element and references its nodes.
    ///
    /// Returns the id of an edge that ended up with more than two adjacent elements, if any.
    fn create_element(
        &mut self,
        mode: ElementMode,
        vertices: &[NodeId],
        marker: Marker,
        parent: Option<(ElementId, [bool; 4])>,
    ) -> Result<ElementId, (NodeId, NodeId)> {
        let id = self.elements.len();
        let n = vertices.len();
        debug_assert_eq!(n, mode.num_vertices());

        let mut vn = [0; 4];
        let mut en = [0; 4];
        for (i, &v) in vertices.iter().enumerate() {
            vn[i] = v;
            self.node_mut(v).ref_count += 1;
        }

        let mut overfull = None;
        for i in 0..n {
            let (a, b) = (vn[i], vn[(i + 1) % n]);
            en[i] = self.get_edge_node(a, b);
            if let NodeKind::Edge { elements, .. } = &mut self.node_mut(en[i]).kind {
                match elements.iter_mut().find(|slot| slot.is_none()) {
                    Some(slot) => *slot = Some(id),
                    None => overfull = Some((a, b)),
                }
            }
        }

        let level = parent.map(|(p, _)| self.elements[p].level + 1).unwrap_or(0);
        self.elements.push(Element {
            id,
            mode,
            marker,
            active: true,
            level,
            parent: parent.map(|(p, _)| p),
            sons: [None; 4],
            on_parent_edge: parent.map(|(_, flags)| flags).unwrap_or([false; 4]),
            boundary: [None; 4],
            vn,
            en,
        });

        match overfull {
            Some(edge) => Err(edge),
            None => Ok(id),
        }
    }

    /// Releases the node references of an element that is being deactivated.
    ///
    /// Edge nodes that are no longer used by any active element are removed.
    /// Removes an element from the adjacency slots of its edges without touching reference counts.
    fn release_edge_slots(&mut self, id: ElementId) {
        let (en, n) = {
            let e = &self.elements[id];
            (e.en, e.nvert())
        };
        for &edge in &en[..n] {
            if let NodeKind::Edge { elements, .. } = &mut self.node_mut(edge).kind {
                for slot in elements.iter_mut().filter(|slot| **slot == Some(id)) {
                    *slot = None;
                }
            }
        }
    }

    fn unref_element(&mut self, id: ElementId) {
        let (vn, en, n) = {
            let e = &self.elements[id];
            (e.vn, e.en, e.nvert())
        };
        for &v in &vn[..n] {
            self.node_mut(v).ref_count -= 1;
        }
        for &edge in &en[..n] {
            let node = self.node_mut(edge);
            if let NodeKind::Edge { elements, .. } = &mut node.kind {
                for slot in elements.iter_mut() {
                    if *slot == Some(id) {
                        *slot = None;
                    }
                }
            }
            node.ref_count -= 1;
            if node.ref_count == 0 {
                let key = node.endpoints().expect("edge nodes have endpoints");
                self.edge_lookup.remove(&key);
                self.nodes[edge] = None;
            }
        }
        self.elements[id].active = false;
    }
}

/// Builder for the base level of a [`HierarchicalMesh`].
///
/// Every edge used by exactly one element is a boundary edge and must be given a marker with
/// [`add_boundary_edge`](Self::add_boundary_edge).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshBuilder {
    vertices: Vec<Point2<f64>>,
    elements: Vec<(Vec<usize>, Marker)>,
    boundary_markers: Vec<(usize, usize, Marker)>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertices(mut self, vertices: Vec<Point2<f64>>) -> Self {
        self.vertices = vertices;
        self
    }

    pub fn add_vertex(&mut self, position: Point2<f64>) -> usize {
        self.vertices.push(position);
        self.vertices.len() - 1
    }

    /// Adds an element given by its counterclockwise vertex indices (3 or 4 of them).
    pub fn add_element(&mut self, vertices: &[usize], marker: Marker) -> &mut Self {
        self.elements.push((vertices.to_vec(), marker));
        self
    }

    pub fn add_boundary_edge(&mut self, a: usize, b: usize, marker: Marker) -> &mut Self {
        self.boundary_markers.push((a, b, marker));
        self
    }

    pub fn build(self) -> Result<HierarchicalMesh, MeshError> {
        let mut mesh = HierarchicalMesh::empty();
        for position in &self.vertices {
            mesh.push_node(NodeKind::Vertex {
                position: *position,
                parents: None,
            });
        }

        let num_vertices = self.vertices.len();
        for (index, (vertices, marker)) in self.elements.iter().enumerate() {
            let mode = match vertices.len() {
                3 => ElementMode::Triangle,
                4 => ElementMode::Quad,
                count => return Err(MeshError::InvalidVertexCount { element: index, count }),
            };
            if let Some(&vertex) = vertices.iter().find(|&&v| v >= num_vertices) {
                return Err(MeshError::VertexOutOfBounds {
                    element: index,
                    vertex,
                    num_vertices,
                });
            }
            mesh.create_element(mode, vertices, *marker, None)
                .map_err(|(a, b)| MeshError::NonManifoldEdge(a, b))?;
        }
        mesh.num_base_elements = mesh.elements.len();

        let markers: FxHashMap<_, _> = self
            .boundary_markers
            .iter()
            .map(|&(a, b, marker)| (sorted_pair(a, b), marker))
            .collect();
        let boundary_edges: Vec<_> = mesh
            .nodes()
            .filter(|node| node.is_edge() && node.ref_count == 1)
            .map(|node| (node.id, node.endpoints().expect("edge nodes have endpoints")))
            .collect();
        for (id, (a, b)) in boundary_edges {
            let marker = *markers
                .get(&(a, b))
                .ok_or(MeshError::MissingBoundaryMarker(a, b))?;
            let edge = mesh.node_mut(id);
            edge.bnd = true;
            edge.marker = marker;
            mesh.node_mut(a).bnd = true;
            mesh.node_mut(b).bnd = true;
        }
        for element in &mut mesh.elements {
            for i in 0..element.nvert() {
                let edge = mesh.nodes[element.en[i]]
                    .as_ref()
                    .expect("edges of base elements exist");
                if edge.bnd {
                    element.boundary[i] = Some(edge.marker);
                }
            }
        }

        debug!(
            "Built mesh with {} vertices, {} elements and {} boundary markers",
            num_vertices,
            mesh.num_base_elements,
            mesh.boundary_markers().len()
        );
        Ok(mesh)
    }
}
