// src/navigation/grid.rs
// Derives the waypoint graph from arena geometry. Corner waypoints sit on a
// square lattice and every full cell gets a centre waypoint, giving each cell
// the "X" of diagonal flight lines the vehicle is allowed to use.

use log::{debug, info};
use nalgebra::{Point2, distance};
use std::collections::BTreeMap;

use crate::error::NavError;

/// Stable integer identifier of a waypoint.
pub type NodeId = usize;

const LATTICE_EPSILON: f64 = 1e-9;

/// Rectangular flight arena with its origin at one corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    width: f64,
    height: f64,
}

impl Arena {
    /// Validates and creates an arena. Both dimensions must be positive and finite.
    pub fn new(width: f64, height: f64) -> Result<Self, NavError> {
        if !(width.is_finite() && width > 0.0) || !(height.is_finite() && height > 0.0) {
            return Err(NavError::config(format!(
                "arena dimensions must be positive, got {width} x {height}"
            )));
        }
        Ok(Arena { width, height })
    }

    /// Arena width in arena units.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Arena height in arena units.
    pub fn height(&self) -> f64 {
        self.height
    }
}

/// Where a waypoint sits in its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Lattice point at `(i * spacing, j * spacing)`.
    Corner,
    /// Midpoint of a 2x2 block of corners.
    CellCenter,
}

/// A navigable waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique id, assigned in construction order.
    pub id: NodeId,
    /// Position in arena units.
    pub position: Point2<f64>,
    /// Whether this is the mission destination.
    pub is_destination: bool,
    /// Corner or cell centre.
    pub kind: NodeKind,
}

/// Undirected connection between two waypoints, reported with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Lower endpoint id.
    pub a: NodeId,
    /// Higher endpoint id.
    pub b: NodeId,
    /// Euclidean distance between the endpoints.
    pub weight: f64,
}

/// Waypoints and flight lines for one arena configuration.
///
/// Node and neighbour maps are ordered so every traversal is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    spacing: f64,
    nodes: BTreeMap<NodeId, Node>,
    adjacency: BTreeMap<NodeId, BTreeMap<NodeId, f64>>,
    next_id: NodeId,
    destination: Option<NodeId>,
}

impl Graph {
    /// Creates an empty graph whose snapping tolerance is half of `spacing`.
    pub fn empty(spacing: f64) -> Self {
        Graph {
            spacing,
            nodes: BTreeMap::new(),
            adjacency: BTreeMap::new(),
            next_id: 0,
            destination: None,
        }
    }

    /// Adds a waypoint and returns its id.
    pub fn insert_node(&mut self, position: Point2<f64>, kind: NodeKind) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                position,
                is_destination: false,
                kind,
            },
        );
        self.adjacency.insert(id, BTreeMap::new());
        id
    }

    /// Connects two waypoints with an edge weighted by their Euclidean distance.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<f64, NavError> {
        if a == b {
            return Err(NavError::config(format!("refusing self-loop on node {a}")));
        }
        let pa = self.node(a)?.position;
        let pb = self.node(b)?.position;
        let weight = distance(&pa, &pb);
        self.adjacency.entry(a).or_default().insert(b, weight);
        self.adjacency.entry(b).or_default().insert(a, weight);
        Ok(weight)
    }

    /// Marks `id` as the single destination, clearing any previous one.
    pub fn set_destination(&mut self, id: NodeId) -> Result<(), NavError> {
        self.node(id)?;
        if let Some(previous) = self.destination.take() {
            if let Some(node) = self.nodes.get_mut(&previous) {
                node.is_destination = false;
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.is_destination = true;
        }
        self.destination = Some(id);
        Ok(())
    }

    /// Destination node id, if one was designated.
    pub fn destination(&self) -> Option<NodeId> {
        self.destination
    }

    /// Lattice spacing this graph was built with.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Looks up a node.
    pub fn node(&self, id: NodeId) -> Result<&Node, NavError> {
        self.nodes.get(&id).ok_or(NavError::UnknownNode(id))
    }

    /// True if the node is still part of the graph.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Neighbours of `id` with edge weights, in ascending id order.
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|links| links.iter().map(|(&n, &w)| (n, w)))
    }

    /// Weight of the edge between `a` and `b`, if it exists.
    pub fn edge_weight(&self, a: NodeId, b: NodeId) -> Option<f64> {
        self.adjacency.get(&a).and_then(|links| links.get(&b)).copied()
    }

    /// True if `a` and `b` are directly connected.
    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edge_weight(a, b).is_some()
    }

    /// Every edge once, ordered by `(a, b)`.
    pub fn edges(&self) -> Vec<Edge> {
        self.adjacency
            .iter()
            .flat_map(|(&a, links)| {
                links
                    .iter()
                    .filter(move |(b, _)| a < **b)
                    .map(move |(&b, &weight)| Edge { a, b, weight })
            })
            .collect()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum::<usize>() / 2
    }

    /// Number of edges still attached to `id`.
    pub fn degree(&self, id: NodeId) -> usize {
        self.adjacency.get(&id).map_or(0, BTreeMap::len)
    }

    /// Removes the edge between `a` and `b`. Returns false if there was none.
    pub fn remove_edge(&mut self, a: NodeId, b: NodeId) -> bool {
        let forward = self
            .adjacency
            .get_mut(&a)
            .is_some_and(|links| links.remove(&b).is_some());
        let backward = self
            .adjacency
            .get_mut(&b)
            .is_some_and(|links| links.remove(&a).is_some());
        forward && backward
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        if let Some(links) = self.adjacency.remove(&id) {
            for neighbor in links.keys() {
                if let Some(back) = self.adjacency.get_mut(neighbor) {
                    back.remove(&id);
                }
            }
        }
        if self.destination == Some(id) {
            self.destination = None;
        }
        Some(node)
    }

    /// Closest node to `point`; equal distances resolve to the smaller id.
    pub fn nearest_node(&self, point: &Point2<f64>) -> Option<NodeId> {
        self.nodes
            .values()
            .map(|node| (node.id, distance(&node.position, point)))
            .min_by(|(ia, da), (ib, db)| da.total_cmp(db).then(ia.cmp(ib)))
            .map(|(id, _)| id)
    }

    /// Snaps `point` to the nearest node no farther than half a spacing away.
    pub fn locate(&self, point: &Point2<f64>) -> Result<NodeId, NavError> {
        let tolerance = self.spacing / 2.0;
        self.nearest_node(point)
            .filter(|id| distance(&self.nodes[id].position, point) <= tolerance + LATTICE_EPSILON)
            .ok_or(NavError::NodeNotFound {
                x: point.x,
                y: point.y,
                tolerance,
            })
    }
}

/// Builds the waypoint graph for an arena.
///
/// Fails with [`NavError::Configuration`] for non-positive spacing or spacing
/// larger than either arena side, and with [`NavError::NodeNotFound`] when no
/// waypoint lies within half a spacing of `destination`.
pub fn build(arena: &Arena, spacing: f64, destination: Point2<f64>) -> Result<Graph, NavError> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(NavError::config(format!("spacing must be positive, got {spacing}")));
    }
    if spacing > arena.width() + LATTICE_EPSILON || spacing > arena.height() + LATTICE_EPSILON {
        return Err(NavError::config(format!(
            "spacing {spacing} exceeds arena {} x {}",
            arena.width(),
            arena.height()
        )));
    }

    let cols = (arena.width() / spacing + LATTICE_EPSILON).floor() as usize;
    let rows = (arena.height() / spacing + LATTICE_EPSILON).floor() as usize;
    let mut graph = Graph::empty(spacing);

    // Corners first (by column, then row), then cell centres in the same order.
    let mut corners = vec![vec![0; rows + 1]; cols + 1];
    for (i, column) in corners.iter_mut().enumerate() {
        for (j, slot) in column.iter_mut().enumerate() {
            let position = Point2::new(i as f64 * spacing, j as f64 * spacing);
            *slot = graph.insert_node(position, NodeKind::Corner);
        }
    }
    let mut centers = vec![vec![0; rows]; cols];
    for (i, column) in centers.iter_mut().enumerate() {
        for (j, slot) in column.iter_mut().enumerate() {
            let position = Point2::new((i as f64 + 0.5) * spacing, (j as f64 + 0.5) * spacing);
            *slot = graph.insert_node(position, NodeKind::CellCenter);
        }
    }

    // Straight lines between lattice corners.
    for i in 0..=cols {
        for j in 0..=rows {
            if i < cols {
                graph.connect(corners[i][j], corners[i + 1][j])?;
            }
            if j < rows {
                graph.connect(corners[i][j], corners[i][j + 1])?;
            }
        }
    }
    // The "X" of every cell, plus straight lines between neighbouring centres.
    for i in 0..cols {
        for j in 0..rows {
            let center = centers[i][j];
            for (ci, cj) in [(i, j), (i + 1, j), (i + 1, j + 1), (i, j + 1)] {
                graph.connect(center, corners[ci][cj])?;
            }
            if i + 1 < cols {
                graph.connect(center, centers[i + 1][j])?;
            }
            if j + 1 < rows {
                graph.connect(center, centers[i][j + 1])?;
            }
        }
    }

    let target = graph.locate(&destination)?;
    graph.set_destination(target)?;

    info!(
        "Built waypoint grid: {} nodes, {} edges, destination node {} at ({:.2}, {:.2})",
        graph.node_count(),
        graph.edge_count(),
        target,
        graph.nodes[&target].position.x,
        graph.nodes[&target].position.y
    );
    debug!("Grid lattice: {} columns x {} rows at spacing {}", cols, rows, spacing);
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn grid(width: f64, height: f64, spacing: f64, dest: (f64, f64)) -> Graph {
        let arena = Arena::new(width, height).unwrap();
        build(&arena, spacing, Point2::new(dest.0, dest.1)).unwrap()
    }

    #[test]
    fn two_by_one_grid_layout() {
        let g = grid(2.0, 1.0, 1.0, (2.0, 0.0));
        // 3x2 corners + 2 centres
        assert_eq!(g.node_count(), 8);
        assert_eq!(g.node(0).unwrap().position, Point2::new(0.0, 0.0));
        assert_eq!(g.node(1).unwrap().position, Point2::new(0.0, 1.0));
        assert_eq!(g.node(6).unwrap().kind, NodeKind::CellCenter);
        assert_eq!(g.node(6).unwrap().position, Point2::new(0.5, 0.5));
        assert_eq!(g.destination(), Some(4));
        assert!(g.node(4).unwrap().is_destination);
        assert_eq!(g.nodes().filter(|n| n.is_destination).count(), 1);
    }

    #[test]
    fn edges_carry_true_distances_and_no_self_loops() {
        let g = grid(3.0, 2.0, 1.0, (0.0, 0.0));
        for edge in g.edges() {
            assert_ne!(edge.a, edge.b);
            let pa = g.node(edge.a).unwrap().position;
            let pb = g.node(edge.b).unwrap().position;
            assert!((distance(&pa, &pb) - edge.weight).abs() < 1e-12);
            assert_eq!(g.edge_weight(edge.b, edge.a), Some(edge.weight));
        }
    }

    #[test]
    fn neighbor_count_is_at_most_eight() {
        let g = grid(4.0, 4.0, 1.0, (2.0, 2.0));
        assert!(g.nodes().all(|n| g.degree(n.id) <= 8));
        // interior corner: 4 straight + 4 centres
        let interior = g.locate(&Point2::new(2.0, 2.0)).unwrap();
        assert_eq!(g.degree(interior), 8);
        // corner of the arena: 2 straight + 1 centre
        assert_eq!(g.degree(0), 3);
    }

    #[rstest]
    #[case(0.0, 1.0, 1.0)]
    #[case(2.0, -1.0, 1.0)]
    #[case(2.0, 1.0, 0.0)]
    #[case(2.0, 1.0, 1.5)]
    #[case(2.0, 1.0, f64::NAN)]
    fn rejects_bad_geometry(#[case] width: f64, #[case] height: f64, #[case] spacing: f64) {
        let result = Arena::new(width, height)
            .and_then(|arena| build(&arena, spacing, Point2::new(0.0, 0.0)));
        assert!(matches!(result, Err(NavError::Configuration(_))));
    }

    #[test]
    fn destination_too_far_from_any_node() {
        let arena = Arena::new(2.0, 1.0).unwrap();
        let result = build(&arena, 1.0, Point2::new(5.0, 5.0));
        assert!(matches!(result, Err(NavError::NodeNotFound { .. })));
    }

    #[test]
    fn destination_snaps_within_half_spacing() {
        let g = grid(2.0, 1.0, 1.0, (1.9, 0.1));
        let dest = g.destination().unwrap();
        assert_eq!(g.node(dest).unwrap().position, Point2::new(2.0, 0.0));
    }

    #[test]
    fn builds_are_identical() {
        assert_eq!(grid(3.5, 2.0, 0.5, (1.0, 1.0)), grid(3.5, 2.0, 0.5, (1.0, 1.0)));
    }

    #[test]
    fn removing_a_node_drops_its_edges() {
        let mut g = grid(2.0, 1.0, 1.0, (2.0, 0.0));
        let before = g.edge_count();
        let degree = g.degree(2);
        assert!(g.remove_node(2).is_some());
        assert_eq!(g.edge_count(), before - degree);
        assert!(g.neighbors(0).all(|(n, _)| n != 2));
        assert!(!g.remove_edge(0, 2));
    }
}
