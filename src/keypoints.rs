// Stroboscope: traffic-mirroring query compiler and scheduler
// Copyright (C) 2026 The Stroboscope Authors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Component C: key-point sampling (KPS) — compressing a concrete path into
//! the minimal set of `(router, gap)` pairs a downstream mirroring rule
//! generator needs to reconstruct it unambiguously.

use std::collections::HashSet;

use crate::error::GraphError;
use crate::graph::{check_graph_supports_path, NetGraph, Router, Spt};

/// One of the two KPS algorithms, in the order callers index them by
/// (`0` = fast/approximate, `1` = exhaustive/optimal), mirroring the
/// reference implementation's `KPS_OPT` dispatch list.
pub type KpsFn = fn(&NetGraph, &[Router]) -> Result<Vec<(Router, usize)>, GraphError>;

/// `KPS_LEVELS[0]` is the fast segment-SPT heuristic, `KPS_LEVELS[1]` is the
/// exhaustive search that is guaranteed minimal.
pub const KPS_LEVELS: [KpsFn; 2] = [find_key_points_segment_spt, find_key_points];

/// Greedily extend each segment for as long as the hop-count shortest path
/// between its endpoints is both unique and equal to the segment itself.
/// Linear in path length; not guaranteed to find the minimal keypoint set.
pub fn find_key_points_segment_spt(graph: &NetGraph, path: &[Router]) -> Result<Vec<(Router, usize)>, GraphError> {
    let length = path.len();
    if length <= 2 {
        return Ok(path.iter().map(|h| (h.clone(), 1)).collect());
    }
    check_graph_supports_path(graph, path)?;

    let mut start = 0;
    let mut keypoints = Vec::new();
    while start < length {
        let end = segment_path(path, start, &graph.edge_spt, length);
        let segment_end = end - 1;
        keypoints.push((path[start].clone(), segment_end - start));
        start = segment_end;
    }
    Ok(keypoints)
}

fn segment_path(p: &[Router], start: usize, spt: &Spt, max_len: usize) -> usize {
    let mut end = start + 2;
    while end < max_len {
        let candidates = &spt[&p[start]][&p[end]];
        if candidates.len() > 1 || candidates[0] != p[start..=end] {
            return end;
        }
        end += 1;
    }
    end
}

/// Search every decomposition of `path` into overlapping segments, shortest
/// segment count first, accepting the first one where every segment
/// endpoint pair is connected by a *unique* path of that exact length (so
/// the keypoints unambiguously reconstruct the original path). Guaranteed
/// minimal; exponential in path length, fine for the short paths a single
/// query spans.
pub fn find_key_points(graph: &NetGraph, path: &[Router]) -> Result<Vec<(Router, usize)>, GraphError> {
    let length = path.len();
    if length <= 2 {
        return Ok(path.iter().map(|h| (h.clone(), 1)).collect());
    }
    check_graph_supports_path(graph, path)?;

    let mut candidates = all_kp_possible(path);
    candidates.sort_by_key(|decomposition| decomposition.len());

    let mut memo: HashSet<(Router, Router)> = HashSet::new();
    let mut reject: HashSet<(Router, Router)> = HashSet::new();

    'candidates: for decomposition in &candidates {
        for segment in decomposition {
            let seg_len = segment.len();
            let endpoints = (segment[0].clone(), segment[seg_len - 1].clone());
            if seg_len <= 2 || memo.contains(&endpoints) {
                continue;
            }
            if reject.contains(&endpoints) {
                continue 'candidates;
            }
            if paths_for_len(graph, &endpoints.0, &endpoints.1, seg_len - 1) {
                memo.insert(endpoints);
            } else {
                reject.insert(endpoints);
                continue 'candidates;
            }
        }
        return Ok(extract_keypoints(decomposition, path));
    }
    // `path` is a genuine walk in `graph` (checked above), so the trivial
    // decomposition into single-hop segments always satisfies the
    // uniqueness test and this point is unreachable.
    unreachable!("no keypoint decomposition accepted for a path known to exist")
}

/// All ways to decompose `path` into a sequence of segments, each sharing
/// its first node with the previous segment's last node.
fn all_kp_possible(path: &[Router]) -> Vec<Vec<Vec<Router>>> {
    if path.len() < 2 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for i in 2..=path.len() {
        for rest in all_kp_possible(&path[i - 1..]) {
            let mut decomposition = vec![path[..i].to_vec()];
            decomposition.extend(rest);
            out.push(decomposition);
        }
    }
    out
}

/// Whether there are fewer than two simple paths of exactly `len` hops from
/// `src` to `dst` in `graph`, i.e. `len`-hop connectivity between the two
/// is unambiguous.
fn paths_for_len(graph: &NetGraph, src: &str, dst: &str, len: usize) -> bool {
    let mut count = 0usize;
    let mut visited = vec![src.to_string()];
    let mut stack: Vec<std::vec::IntoIter<Router>> =
        vec![graph.successors(src).cloned().collect::<Vec<_>>().into_iter()];

    while !stack.is_empty() && count < 2 {
        let remaining = (len as i64) - (visited.len() as i64 - 1);
        let Some(child) = stack.last_mut().unwrap().next() else {
            stack.pop();
            visited.pop();
            continue;
        };
        if remaining > 1 {
            if child != dst && !visited.contains(&child) {
                visited.push(child.clone());
                stack.push(graph.successors(&child).cloned().collect::<Vec<_>>().into_iter());
            }
        } else if child == dst {
            count += 1;
        }
    }
    count < 2
}

fn extract_keypoints(decomposition: &[Vec<Router>], original_path: &[Router]) -> Vec<(Router, usize)> {
    let index_of = |r: &Router| original_path.iter().position(|x| x == r).unwrap();
    let mut keypoints: Vec<(Router, usize)> = decomposition
        .iter()
        .map(|segment| {
            let start = &segment[0];
            let end = &segment[segment.len() - 1];
            (start.clone(), index_of(end) - index_of(start))
        })
        .collect();
    keypoints.push((original_path.last().unwrap().clone(), 0));
    keypoints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abilene() -> NetGraph {
        let mut g = NetGraph::new();
        for (u, v) in [
            ("SEAT", "LOSA"), ("SEAT", "SALT"), ("LOSA", "SALT"), ("LOSA", "HOUS"),
            ("SALT", "KANS"), ("KANS", "HOUS"), ("KANS", "CHIC"), ("HOUS", "ATLA"),
            ("CHIC", "ATLA"), ("CHIC", "WASH"), ("CHIC", "NEWY"), ("ATLA", "WASH"),
            ("WASH", "NEWY"),
        ] {
            g.register_link(u, v);
        }
        g.build_spt().unwrap();
        g
    }

    fn path(names: &[&str]) -> Vec<Router> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn segment_spt_matches_the_known_scenario() {
        let g = abilene();
        let p = path(&["SEAT", "SALT", "KANS", "CHIC", "NEWY"]);
        let kp = find_key_points_segment_spt(&g, &p).unwrap();
        assert_eq!(kp, vec![("SEAT".to_string(), 4), ("NEWY".to_string(), 1)]);
    }

    #[test]
    fn exhaustive_matches_the_known_scenario() {
        let g = abilene();
        let p = path(&["SEAT", "SALT", "KANS", "CHIC", "NEWY"]);
        let kp = find_key_points(&g, &p).unwrap();
        assert_eq!(kp, vec![("SEAT".to_string(), 4), ("NEWY".to_string(), 0)]);
    }

    #[test]
    fn short_paths_return_every_hop() {
        let g = abilene();
        let p = path(&["SEAT", "SALT"]);
        let kp = find_key_points(&g, &p).unwrap();
        assert_eq!(kp, vec![("SEAT".to_string(), 1), ("SALT".to_string(), 1)]);
    }

    fn paper_graph() -> NetGraph {
        let mut g = NetGraph::new();
        for (u, v) in [
            ("A", "B"), ("A", "L"), ("A", "F"), ("I", "E2"),
            ("B", "K"), ("B", "J"), ("B", "H"), ("B", "C"), ("B", "L"),
            ("C", "H"), ("C", "D"), ("C", "U"), ("C", "F"), ("C", "L"),
            ("L", "F"), ("F", "U"), ("F", "E3"), ("K", "P"), ("J", "P"),
            ("J", "H"), ("H", "I"), ("P", "E1"), ("P", "E2"), ("E2", "I"),
        ] {
            g.register_link(u, v);
        }
        for e in ["E1", "E2", "E3"] {
            g.register_egress(e);
        }
        g.build_spt().unwrap();
        g
    }

    #[test]
    fn segment_spt_matches_the_paper_graph_scenario() {
        let g = paper_graph();
        let p = path(&["A", "B", "C", "D"]);
        let kp = find_key_points_segment_spt(&g, &p).unwrap();
        assert_eq!(kp, vec![("A".to_string(), 1), ("B".to_string(), 1), ("C".to_string(), 1), ("D".to_string(), 1)]);
    }

    #[test]
    fn exhaustive_matches_the_paper_graph_scenario() {
        let g = paper_graph();
        let p = path(&["A", "B", "C", "D"]);
        let kp = find_key_points(&g, &p).unwrap();
        assert_eq!(kp, vec![("A".to_string(), 1), ("B".to_string(), 2), ("D".to_string(), 0)]);
    }
}
