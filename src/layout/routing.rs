use std::collections::HashMap;

use crate::config::LayoutConfig;

use super::{EdgeRoute, NodePlacement};

pub(super) struct RouteContext<'a> {
    pub nodes: &'a [NodePlacement],
    pub config: &'a LayoutConfig,
}

impl RouteContext<'_> {
    fn horizontal(&self) -> bool {
        self.config.direction.is_horizontal()
    }

    fn point(&self, cross: f32, main: f32) -> (f32, f32) {
        if self.horizontal() { (main, cross) } else { (cross, main) }
    }

    fn cross_span(&self, node: &NodePlacement) -> (f32, f32) {
        if self.horizontal() {
            (node.y, node.y + node.height)
        } else {
            (node.x, node.x + node.width)
        }
    }

    fn main_span(&self, node: &NodePlacement) -> (f32, f32) {
        if self.horizontal() {
            (node.x, node.x + node.width)
        } else {
            (node.y, node.y + node.height)
        }
    }

    fn cross_center(&self, node: &NodePlacement) -> f32 {
        let (lo, hi) = self.cross_span(node);
        (lo + hi) / 2.0
    }

    fn main_center(&self, node: &NodePlacement) -> f32 {
        let (lo, hi) = self.main_span(node);
        (lo + hi) / 2.0
    }

    /// Route from a node to one on a later rank, leaving through the far
    /// side and entering through the near side.
    fn downstream(&self, upper: &NodePlacement, lower: &NodePlacement, offset: f32) -> Vec<(f32, f32)> {
        let start_cross = self.cross_center(upper) + offset;
        let end_cross = self.cross_center(lower) + offset;
        let start_main = self.main_span(upper).1;
        let end_main = self.main_span(lower).0;

        if lower.rank == upper.rank + 1 {
            let mid = (start_main + end_main) / 2.0;
            return vec![
                self.point(start_cross, start_main),
                self.point(start_cross, mid),
                self.point(end_cross, mid),
                self.point(end_cross, end_main),
            ];
        }

        let gap = self.config.rank_spacing / 2.0;
        let first = start_main + gap;
        let last = end_main - gap;
        let desired = (self.cross_center(upper) + self.cross_center(lower)) / 2.0;
        let lane = self.free_lane(upper.rank, lower.rank, desired) + offset;
        vec![
            self.point(start_cross, start_main),
            self.point(start_cross, first),
            self.point(lane, first),
            self.point(lane, last),
            self.point(end_cross, last),
            self.point(end_cross, end_main),
        ]
    }

    /// Cross coordinate closest to `desired` that clears every node ranked
    /// strictly between `upper_rank` and `lower_rank`.
    fn free_lane(&self, upper_rank: usize, lower_rank: usize, desired: f32) -> f32 {
        let pad = self.config.edge_spacing;
        let blocked: Vec<(f32, f32)> = self
            .nodes
            .iter()
            .filter(|node| node.rank > upper_rank && node.rank < lower_rank)
            .map(|node| {
                let (lo, hi) = self.cross_span(node);
                (lo - pad, hi + pad)
            })
            .collect();
        let is_free = |c: f32| blocked.iter().all(|&(lo, hi)| c <= lo || c >= hi);

        let mut candidates = vec![desired];
        for &(lo, hi) in &blocked {
            candidates.push(lo);
            candidates.push(hi);
        }
        candidates
            .into_iter()
            .filter(|&c| is_free(c))
            .min_by(|a, b| (a - desired).abs().total_cmp(&(b - desired).abs()))
            .unwrap_or(desired)
    }

    /// Two nodes on one rank: straight across between the facing sides.
    fn sideways(&self, source: &NodePlacement, target: &NodePlacement, offset: f32) -> Vec<(f32, f32)> {
        let (source_lo, source_hi) = self.cross_span(source);
        let (target_lo, target_hi) = self.cross_span(target);
        let main = self.main_center(source) + offset;
        if self.cross_center(source) <= self.cross_center(target) {
            vec![self.point(source_hi, main), self.point(target_lo, main)]
        } else {
            vec![self.point(source_lo, main), self.point(target_hi, main)]
        }
    }
}

fn edge_pair_key(from: usize, to: usize) -> (usize, usize) {
    if from <= to { (from, to) } else { (to, from) }
}

fn build_edge_pair_counts(edges: &[Option<(usize, usize)>]) -> HashMap<(usize, usize), usize> {
    let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
    for &(s, t) in edges.iter().flatten() {
        if s != t {
            *counts.entry(edge_pair_key(s, t)).or_insert(0) += 1;
        }
    }
    counts
}

fn compress_path(points: &[(f32, f32)]) -> Vec<(f32, f32)> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut out: Vec<(f32, f32)> = Vec::with_capacity(points.len());
    out.push(points[0]);
    for idx in 1..points.len() - 1 {
        let prev = out[out.len() - 1];
        let curr = points[idx];
        let next = points[idx + 1];
        if (curr.0 - prev.0).abs() <= 1e-4 && (curr.1 - prev.1).abs() <= 1e-4 {
            continue;
        }
        let dx1 = curr.0 - prev.0;
        let dy1 = curr.1 - prev.1;
        let dx2 = next.0 - curr.0;
        let dy2 = next.1 - curr.1;
        if (dx1.abs() <= 1e-4 && dx2.abs() <= 1e-4) || (dy1.abs() <= 1e-4 && dy2.abs() <= 1e-4) {
            continue;
        }
        out.push(curr);
    }
    let last = points[points.len() - 1];
    if (last.0 - out[out.len() - 1].0).abs() > 1e-4 || (last.1 - out[out.len() - 1].1).abs() > 1e-4
    {
        out.push(last);
    }
    out
}

/// One polyline per input edge, aligned with `edges`. An edge whose target
/// sits on an earlier rank than its source is flagged `reversed`; its points
/// still run from source to target.
pub(super) fn route_edges(edges: &[Option<(usize, usize)>], ctx: &RouteContext<'_>) -> Vec<EdgeRoute> {
    let pair_counts = build_edge_pair_counts(edges);
    let mut pair_seen: HashMap<(usize, usize), usize> = HashMap::new();
    let mut loops_seen: HashMap<usize, usize> = HashMap::new();

    edges
        .iter()
        .map(|edge| {
            let Some((s, t)) = *edge else {
                return EdgeRoute::default();
            };
            if s == t {
                let seen = loops_seen.entry(s).or_insert(0);
                let idx = *seen;
                *seen += 1;
                return EdgeRoute {
                    points: self_loop(&ctx.nodes[s], idx, ctx),
                    reversed: false,
                };
            }

            let key = edge_pair_key(s, t);
            let total = *pair_counts.get(&key).unwrap_or(&1) as f32;
            let seen = pair_seen.entry(key).or_insert(0usize);
            let idx_in_pair = *seen as f32;
            *seen += 1;
            let offset = if total > 1.0 {
                (idx_in_pair - (total - 1.0) / 2.0) * ctx.config.edge_spacing
            } else {
                0.0
            };

            let source = &ctx.nodes[s];
            let target = &ctx.nodes[t];
            if source.rank == target.rank {
                return EdgeRoute {
                    points: ctx.sideways(source, target, offset),
                    reversed: false,
                };
            }
            let reversed = source.rank > target.rank;
            let mut points = if reversed {
                ctx.downstream(target, source, offset)
            } else {
                ctx.downstream(source, target, offset)
            };
            if reversed {
                points.reverse();
            }
            EdgeRoute {
                points: compress_path(&points),
                reversed,
            }
        })
        .collect()
}

/// A rectangular loop off the node's side (right side top-to-bottom, bottom
/// side left-to-right). Repeated loops on one node nest outward.
fn self_loop(node: &NodePlacement, idx: usize, ctx: &RouteContext<'_>) -> Vec<(f32, f32)> {
    let reach = ctx.config.self_loop_size * (idx as f32 + 1.0);
    if ctx.horizontal() {
        let q = node.width / 4.0;
        let cx = node.x + node.width / 2.0;
        let bottom = node.y + node.height;
        vec![
            (cx - q, bottom),
            (cx - q, bottom + reach),
            (cx + q, bottom + reach),
            (cx + q, bottom),
        ]
    } else {
        let q = node.height / 4.0;
        let cy = node.y + node.height / 2.0;
        let right = node.x + node.width;
        vec![
            (right, cy - q),
            (right + reach, cy - q),
            (right + reach, cy + q),
            (right, cy + q),
        ]
    }
}
