// src/navigation/planner.rs
// Shortest waypoint paths over the grid graph.
//
// Dijkstra runs backwards from the goal so every node knows its exact
// remaining cost; the path is then walked forward from the start, always
// stepping to the smallest-id neighbour that stays on an optimal route. That
// walk yields the lexicographically smallest of all shortest paths.

use log::debug;
use nalgebra::Point2;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use super::grid::{Graph, NodeId};
use crate::error::NavError;

/// Relative slack when comparing path costs that were summed in different orders.
const COST_TOLERANCE: f64 = 1e-9;

/// Ordered waypoint ids from a start node to a goal node.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    nodes: Vec<NodeId>,
    cost: f64,
}

impl Path {
    /// Node ids, start first.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// First node.
    pub fn start(&self) -> NodeId {
        self.nodes[0]
    }

    /// Last node.
    pub fn goal(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    /// Number of legs (edges) along the path.
    pub fn legs(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Sum of edge weights.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// True if the path flies the edge `a`-`b` in either direction.
    pub fn uses_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.nodes
            .windows(2)
            .any(|leg| (leg[0] == a && leg[1] == b) || (leg[0] == b && leg[1] == a))
    }

    /// Waypoint coordinates along the path.
    pub fn waypoints(&self, graph: &Graph) -> Result<Vec<Point2<f64>>, NavError> {
        self.nodes
            .iter()
            .map(|&id| graph.node(id).map(|node| node.position))
            .collect()
    }
}

/// Min-heap entry; equal costs pop the smaller node id first.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    node: NodeId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for BinaryHeap (max-heap)
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Exact remaining cost from every reachable node to `goal`.
fn costs_to(graph: &Graph, goal: NodeId) -> BTreeMap<NodeId, f64> {
    let mut settled: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut best: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut heap = BinaryHeap::new();

    best.insert(goal, 0.0);
    heap.push(Frontier { cost: 0.0, node: goal });

    while let Some(Frontier { cost, node }) = heap.pop() {
        if settled.contains_key(&node) {
            continue;
        }
        settled.insert(node, cost);

        for (neighbor, weight) in graph.neighbors(node) {
            if settled.contains_key(&neighbor) {
                continue;
            }
            let candidate = cost + weight;
            let improves = best.get(&neighbor).is_none_or(|&known| candidate < known);
            if improves {
                best.insert(neighbor, candidate);
                heap.push(Frontier {
                    cost: candidate,
                    node: neighbor,
                });
            }
        }
    }

    settled
}

/// Computes the optimal path from `start` to `goal`.
///
/// Among equal-cost paths the one whose id sequence is lexicographically
/// smallest is returned, so repeated calls on identical graphs agree. Fails
/// with [`NavError::UnknownNode`] if `start` is not in the graph and with
/// [`NavError::Unreachable`] if `goal` is missing or disconnected from `start`.
pub fn shortest_path(graph: &Graph, start: NodeId, goal: NodeId) -> Result<Path, NavError> {
    graph.node(start)?;
    if !graph.contains(goal) {
        return Err(NavError::Unreachable { start, goal });
    }

    let remaining = costs_to(graph, goal);
    let total = *remaining
        .get(&start)
        .ok_or(NavError::Unreachable { start, goal })?;

    let mut nodes = vec![start];
    let mut current = start;
    while current != goal {
        let here = *remaining
            .get(&current)
            .ok_or(NavError::Unreachable { start, goal })?;
        let slack = COST_TOLERANCE * here.max(1.0);
        let next = graph
            .neighbors(current)
            .find(|(neighbor, weight)| {
                remaining
                    .get(neighbor)
                    .is_some_and(|&rest| (weight + rest - here).abs() <= slack && rest < here)
            })
            .map(|(neighbor, _)| neighbor)
            .ok_or(NavError::Unreachable { start, goal })?;
        nodes.push(next);
        current = next;
    }

    debug!(
        "Planned {} -> {}: {} legs, cost {:.3}, nodes {:?}",
        start,
        goal,
        nodes.len() - 1,
        total,
        nodes
    );
    Ok(Path { nodes, cost: total })
}

/// Total weight of a node sequence, or `None` if two consecutive nodes are not connected.
pub fn path_cost(graph: &Graph, nodes: &[NodeId]) -> Option<f64> {
    nodes
        .windows(2)
        .map(|leg| graph.edge_weight(leg[0], leg[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::grid::{Arena, NodeKind, build};
    use std::f64::consts::SQRT_2;

    fn two_by_one() -> Graph {
        build(&Arena::new(2.0, 1.0).unwrap(), 1.0, Point2::new(2.0, 0.0)).unwrap()
    }

    #[test]
    fn straight_run_along_the_bottom_edge() {
        let g = two_by_one();
        let path = shortest_path(&g, 0, 4).unwrap();
        assert_eq!(path.nodes(), &[0, 2, 4]);
        assert_eq!(path.legs(), 2);
        assert!((path.cost() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn start_equals_goal() {
        let g = two_by_one();
        let path = shortest_path(&g, 3, 3).unwrap();
        assert_eq!(path.nodes(), &[3]);
        assert_eq!(path.legs(), 0);
        assert_eq!(path.cost(), 0.0);
    }

    #[test]
    fn ties_prefer_smallest_id_sequence() {
        // Square with two equal routes 0-1-3 and 0-2-3.
        let mut g = Graph::empty(1.0);
        for (x, y) in [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)] {
            g.insert_node(Point2::new(x, y), NodeKind::Corner);
        }
        g.connect(0, 2).unwrap();
        g.connect(2, 3).unwrap();
        g.connect(0, 1).unwrap();
        g.connect(1, 3).unwrap();
        assert_eq!(shortest_path(&g, 0, 3).unwrap().nodes(), &[0, 1, 3]);
        assert_eq!(shortest_path(&g, 3, 0).unwrap().nodes(), &[3, 1, 0]);
    }

    #[test]
    fn replans_around_a_removed_edge() {
        let mut g = two_by_one();
        assert!(g.remove_edge(0, 2));
        let path = shortest_path(&g, 0, 4).unwrap();
        assert!(!path.uses_edge(0, 2));
        assert_eq!(path.nodes(), &[0, 6, 2, 4]);
        assert!((path.cost() - (SQRT_2 + 1.0)).abs() < 1e-9);
        let summed = path_cost(&g, path.nodes()).unwrap();
        assert!((summed - path.cost()).abs() < 1e-9);
    }

    #[test]
    fn disconnected_goal_is_unreachable() {
        let mut g = two_by_one();
        let dest = g.destination().unwrap();
        let links: Vec<NodeId> = g.neighbors(dest).map(|(n, _)| n).collect();
        for n in links {
            g.remove_edge(dest, n);
        }
        assert!(matches!(
            shortest_path(&g, 0, dest),
            Err(NavError::Unreachable { start: 0, goal: 4 })
        ));
    }

    #[test]
    fn removed_goal_is_unreachable_and_removed_start_is_unknown() {
        let mut g = two_by_one();
        g.remove_node(4);
        assert!(matches!(shortest_path(&g, 0, 4), Err(NavError::Unreachable { .. })));
        assert!(matches!(shortest_path(&g, 4, 0), Err(NavError::UnknownNode(4))));
    }

    #[test]
    fn path_cost_rejects_unconnected_hops() {
        let g = two_by_one();
        assert_eq!(path_cost(&g, &[0, 4]), None);
        assert_eq!(path_cost(&g, &[0]), Some(0.0));
    }
}
