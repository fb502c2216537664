//! Orthogonal edge routing on the 10-unit sub-grid.
//!
//! Best-of-k search rather than full path-finding: the candidate family is
//! the straight line, both one-bend L shapes, and two-bend Z shapes through
//! the mid-channel with small offsets. Candidates are scored by (obstacle
//! crossings, bends, Manhattan length, point count); the winner's endpoints
//! are clipped to the node boundary so stubs leave perpendicular to the
//! chosen side. When no candidate is crossing-free the best one is returned
//! with `fallback` set; that is a rendering hint, never an error.

use serde::Serialize;
use std::collections::HashMap;

use super::layout::{GraphLayout, PlacedNode};
use super::EntityGraph;

pub const EDGE_ROUTING_GRID_UNIT: i64 = 10;
pub const NODE_WIDTH: i64 = 40;
pub const NODE_HEIGHT: i64 = 20;
pub const OBSTACLE_PADDING: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    fn new(x: i64, y: i64) -> Point {
        Point { x, y }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeRoute {
    pub from: String,
    pub to: String,
    pub points: Vec<Point>,
    pub fallback: bool,
}

fn snap(value: i64) -> i64 {
    let unit = EDGE_ROUTING_GRID_UNIT;
    ((value + unit / 2).div_euclid(unit)) * unit
}

#[derive(Clone, Copy)]
struct Rect {
    min_x: i64,
    max_x: i64,
    min_y: i64,
    max_y: i64,
}

impl Rect {
    fn around(node: &PlacedNode, padding: i64) -> Rect {
        Rect {
            min_x: node.x - NODE_WIDTH / 2 - padding,
            max_x: node.x + NODE_WIDTH / 2 + padding,
            min_y: node.y - NODE_HEIGHT / 2 - padding,
            max_y: node.y + NODE_HEIGHT / 2 + padding,
        }
    }

    /// Does the axis-aligned segment a→b pass through this rect?
    fn crossed_by(&self, a: Point, b: Point) -> bool {
        let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
        let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
        min_x <= self.max_x && max_x >= self.min_x && min_y <= self.max_y && max_y >= self.min_y
    }
}

/// Route every edge of the graph over the given layout.
pub fn route(graph: &EntityGraph, layout: &GraphLayout) -> Vec<EdgeRoute> {
    let placed: HashMap<&str, &PlacedNode> =
        layout.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    graph
        .edges
        .iter()
        .filter_map(|edge| {
            let from = placed.get(edge.from.as_str())?;
            let to = placed.get(edge.to.as_str())?;
            Some(if edge.from == edge.to {
                self_loop(edge.from.clone(), from)
            } else {
                route_one(edge.from.clone(), edge.to.clone(), from, to, &layout.nodes)
            })
        })
        .collect()
}

/// Four-segment detour above and to the right of the node.
fn self_loop(id: String, node: &PlacedNode) -> EdgeRoute {
    let (cx, cy) = (node.x, node.y);
    let top = cy - NODE_HEIGHT / 2;
    let right = cx + NODE_WIDTH / 2;
    let rise = 2 * EDGE_ROUTING_GRID_UNIT;
    let reach = NODE_WIDTH / 2 + 2 * EDGE_ROUTING_GRID_UNIT;
    EdgeRoute {
        from: id.clone(),
        to: id,
        points: vec![
            Point::new(cx, top),
            Point::new(cx, top - rise),
            Point::new(cx + reach, top - rise),
            Point::new(cx + reach, cy),
            Point::new(right, cy),
        ],
        fallback: false,
    }
}

fn route_one(
    from_id: String,
    to_id: String,
    from: &PlacedNode,
    to: &PlacedNode,
    all: &[PlacedNode],
) -> EdgeRoute {
    let a = Point::new(from.x, from.y);
    let b = Point::new(to.x, to.y);

    let obstacles: Vec<Rect> = all
        .iter()
        .filter(|n| n.id != from.id && n.id != to.id)
        .map(|n| Rect::around(n, OBSTACLE_PADDING))
        .collect();

    let mut best: Option<(Vec<Point>, (usize, usize, i64, usize))> = None;
    for candidate in candidates(a, b) {
        let clipped = clip_ends(candidate, from, to);
        let score = score(&clipped, &obstacles);
        match &best {
            Some((_, best_score)) if *best_score <= score => {}
            _ => best = Some((clipped, score)),
        }
    }

    let (points, (crossings, _, _, _)) =
        best.unwrap_or_else(|| (vec![a, b], (0, 0, 0, 2)));
    EdgeRoute {
        from: from_id,
        to: to_id,
        points,
        fallback: crossings > 0,
    }
}

/// Candidate polylines between the two centres, on the sub-grid.
fn candidates(a: Point, b: Point) -> Vec<Vec<Point>> {
    let mut paths = Vec::new();

    if a.x == b.x || a.y == b.y {
        paths.push(vec![a, b]);
    }

    // One bend, both corners.
    paths.push(vec![a, Point::new(a.x, b.y), b]);
    paths.push(vec![a, Point::new(b.x, a.y), b]);

    // Two bends through the mid-channel, with small offsets.
    let offsets = [
        0,
        -EDGE_ROUTING_GRID_UNIT,
        EDGE_ROUTING_GRID_UNIT,
        -2 * EDGE_ROUTING_GRID_UNIT,
        2 * EDGE_ROUTING_GRID_UNIT,
    ];
    for offset in offsets {
        let my = snap((a.y + b.y) / 2) + offset;
        paths.push(vec![
            a,
            Point::new(a.x, my),
            Point::new(b.x, my),
            b,
        ]);
        let mx = snap((a.x + b.x) / 2) + offset;
        paths.push(vec![
            a,
            Point::new(mx, a.y),
            Point::new(mx, b.y),
            b,
        ]);
    }

    for path in &mut paths {
        path.dedup();
    }
    paths.retain(|p| p.len() >= 2);
    paths
}

/// Move the first and last point from the node centre to the node boundary,
/// along the direction of the adjoining segment. The stub is therefore
/// perpendicular to the side it leaves.
fn clip_ends(mut points: Vec<Point>, from: &PlacedNode, to: &PlacedNode) -> Vec<Point> {
    if points.len() < 2 {
        return points;
    }

    let first_dir = (points[1].x - points[0].x, points[1].y - points[0].y);
    points[0] = port(from, first_dir);

    let last = points.len() - 1;
    let last_dir = (
        points[last - 1].x - points[last].x,
        points[last - 1].y - points[last].y,
    );
    points[last] = port(to, last_dir);

    points.dedup();
    points
}

/// The boundary point on the side the segment leaves through.
fn port(node: &PlacedNode, dir: (i64, i64)) -> Point {
    let (dx, dy) = dir;
    if dx.abs() >= dy.abs() {
        if dx >= 0 {
            Point::new(node.x + NODE_WIDTH / 2, node.y)
        } else {
            Point::new(node.x - NODE_WIDTH / 2, node.y)
        }
    } else if dy >= 0 {
        Point::new(node.x, node.y + NODE_HEIGHT / 2)
    } else {
        Point::new(node.x, node.y - NODE_HEIGHT / 2)
    }
}

/// (crossings, bends, manhattan length, point count): lower wins, in order.
fn score(points: &[Point], obstacles: &[Rect]) -> (usize, usize, i64, usize) {
    let mut crossings = 0;
    let mut length = 0;
    for pair in points.windows(2) {
        length += (pair[1].x - pair[0].x).abs() + (pair[1].y - pair[0].y).abs();
        for rect in obstacles {
            if rect.crossed_by(pair[0], pair[1]) {
                crossings += 1;
            }
        }
    }

    let mut bends = 0;
    for triple in points.windows(3) {
        let d1 = (triple[1].x - triple[0].x != 0, triple[1].y - triple[0].y != 0);
        let d2 = (triple[2].x - triple[1].x != 0, triple[2].y - triple[1].y != 0);
        if d1 != d2 {
            bends += 1;
        }
    }

    (crossings, bends, length, points.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::layout::{layout, LAYER_SPACING};
    use crate::graph::{EdgeRelation, GraphEdge, GraphNode};
    use crate::model::{EntityStatus, Kind};

    fn node(id: &str, kind: Kind, depth: usize) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            kind,
            title: id.to_string(),
            status: EntityStatus::Draft,
            structural_depth: depth,
        }
    }

    fn edge(from: &str, to: &str, relation: EdgeRelation) -> GraphEdge {
        GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            relation,
            layer: relation.layer(),
        }
    }

    fn orthogonal(route: &EdgeRoute) {
        for pair in route.points.windows(2) {
            assert!(
                pair[0].x == pair[1].x || pair[0].y == pair[1].y,
                "diagonal segment in {route:?}"
            );
        }
    }

    #[test]
    fn straight_edge_between_aligned_nodes() {
        let graph = EntityGraph {
            nodes: vec![
                node("obj-00000001", Kind::Objective, 0),
                node("uc-00000001", Kind::UseCase, 1),
            ],
            edges: vec![edge("uc-00000001", "obj-00000001", EdgeRelation::Contributes)],
        };
        let routes = route(&graph, &layout(&graph));
        assert_eq!(routes.len(), 1);
        orthogonal(&routes[0]);
        assert!(!routes[0].fallback);
        assert_eq!(routes[0].points.len(), 2);
        // Stub leaves the node boundary, not the centre.
        assert_eq!(
            (routes[0].points[0].y - routes[0].points[1].y).abs(),
            LAYER_SPACING - NODE_HEIGHT
        );
    }

    #[test]
    fn offset_edge_is_orthogonal_and_crossing_free() {
        let graph = EntityGraph {
            nodes: vec![
                node("obj-00000001", Kind::Objective, 0),
                node("uc-00000001", Kind::UseCase, 1),
                node("uc-00000002", Kind::UseCase, 1),
                node("uc-00000003", Kind::UseCase, 1),
            ],
            edges: vec![
                edge("uc-00000001", "obj-00000001", EdgeRelation::Contributes),
                edge("uc-00000002", "obj-00000001", EdgeRelation::Contributes),
                edge("uc-00000003", "obj-00000001", EdgeRelation::Contributes),
            ],
        };
        let routes = route(&graph, &layout(&graph));
        assert_eq!(routes.len(), 3);
        for r in &routes {
            orthogonal(r);
            assert!(!r.fallback, "{r:?}");
        }
    }

    #[test]
    fn points_sit_on_the_sub_grid() {
        let graph = EntityGraph {
            nodes: vec![
                node("obj-00000001", Kind::Objective, 0),
                node("uc-00000001", Kind::UseCase, 1),
                node("uc-00000002", Kind::UseCase, 1),
            ],
            edges: vec![
                edge("uc-00000001", "obj-00000001", EdgeRelation::Contributes),
                edge("uc-00000002", "obj-00000001", EdgeRelation::Contributes),
            ],
        };
        for r in route(&graph, &layout(&graph)) {
            for p in &r.points {
                assert_eq!(p.x % EDGE_ROUTING_GRID_UNIT, 0);
                assert_eq!(p.y % EDGE_ROUTING_GRID_UNIT, 0);
            }
        }
    }

    #[test]
    fn self_loop_detours_above_and_right() {
        let graph = EntityGraph {
            nodes: vec![node("act-00000001", Kind::Activity, 0)],
            edges: vec![edge("act-00000001", "act-00000001", EdgeRelation::DependsOn)],
        };
        let routes = route(&graph, &layout(&graph));
        assert_eq!(routes.len(), 1);
        let r = &routes[0];
        orthogonal(r);
        assert_eq!(r.points.len(), 5);
        let centre = layout(&graph).placed("act-00000001").unwrap().clone();
        assert!(r.points.iter().any(|p| p.y < centre.y));
        assert!(r.points.iter().any(|p| p.x > centre.x));
    }

    #[test]
    fn hundred_node_lattice_at_two_links_per_node_routes_cleanly() {
        // Five full layers of twenty nodes and two hundred inter-layer
        // links, most of them spanning many columns. Every route has to
        // clear every padded obstacle without falling back.
        let id = |layer: usize, col: usize| format!("act-{layer}{col:02}00000");
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for layer in 0..5 {
            for col in 0..20 {
                nodes.push(node(&id(layer, col), Kind::Activity, layer));
            }
        }
        for layer in 1..5 {
            for col in 0..20 {
                // Alternating fan-out of three and two: 50 links per layer
                // gap, 200 in total over 100 nodes.
                let fan = if col % 2 == 0 { 3 } else { 2 };
                for hop in 0..fan {
                    edges.push(edge(
                        &id(layer, col),
                        &id(layer - 1, (col + 7 * hop) % 20),
                        EdgeRelation::DependsOn,
                    ));
                }
            }
        }
        let graph = EntityGraph { nodes, edges };

        let routes = route(&graph, &layout(&graph));
        assert_eq!(routes.len(), 200);
        for r in &routes {
            orthogonal(r);
            assert!(!r.fallback, "{} -> {} crossed an obstacle", r.from, r.to);
        }
    }

    #[test]
    fn moderate_layered_graph_routes_without_fallback() {
        // A three-high tower of ten columns, edges only between adjacent
        // layers: density well under two edges per node.
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for col in 0..10 {
            nodes.push(node(&format!("obj-000000{col:02}"), Kind::Objective, 0));
            nodes.push(node(&format!("uc-000000{col:02}"), Kind::UseCase, 1));
            nodes.push(node(&format!("act-000000{col:02}"), Kind::Activity, 2));
            edges.push(edge(
                &format!("uc-000000{col:02}"),
                &format!("obj-000000{col:02}"),
                EdgeRelation::Contributes,
            ));
            edges.push(edge(
                &format!("act-000000{col:02}"),
                &format!("uc-000000{col:02}"),
                EdgeRelation::Implements,
            ));
        }
        let graph = EntityGraph { nodes, edges };
        let routes = route(&graph, &layout(&graph));
        assert_eq!(routes.len(), 20);
        for r in &routes {
            orthogonal(r);
            assert!(!r.fallback, "{} -> {} fell back", r.from, r.to);
        }
    }
}
