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

//! Component A: the network graph, its shortest-path trees, and the
//! path-search/min-cut primitives the rest of the crate builds on.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use ipnet::IpNet;
use log::debug;

use crate::error::{CutTooBig, GraphError};

/// A router name. Cloned fairly liberally through the crate; the graphs in
/// play (collector topologies, not full Internet-scale tables) are small
/// enough that this is not a hot path.
pub type Router = String;

/// Attributes carried by a directed edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeWeight {
    /// Routing cost/metric used to build the cost-weighted SPT.
    pub cost: f64,
    /// Egress interface name on the source router.
    pub if_name: String,
    /// Address assigned to the egress interface.
    pub address: IpNet,
}

impl Default for EdgeWeight {
    fn default() -> Self {
        EdgeWeight {
            cost: 1.0,
            if_name: "unknown".to_string(),
            address: "0.0.0.0/0".parse().unwrap(),
        }
    }
}

/// All equal-cost shortest paths between every pair of reachable nodes,
/// keyed `source -> destination -> paths`.
pub type Spt = HashMap<Router, HashMap<Router, Vec<Vec<Router>>>>;

/// The network topology: routers, links, and the egress set used by region
/// resolution and confinement.
#[derive(Debug, Clone, Default)]
pub struct NetGraph {
    routers: HashSet<Router>,
    /// Routers at which traffic can leave the monitored network.
    pub egresses: HashSet<Router>,
    succ: HashMap<Router, HashMap<Router, EdgeWeight>>,
    pred: HashMap<Router, HashMap<Router, EdgeWeight>>,
    /// Cost-weighted shortest-path trees, one per source router.
    pub spt: Spt,
    /// Unit-weighted (hop-count) shortest-path trees, one per source router.
    pub edge_spt: Spt,
}

impl NetGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a router with no particular role.
    pub fn register_router(&mut self, r: impl Into<Router>) {
        let r = r.into();
        self.succ.entry(r.clone()).or_default();
        self.pred.entry(r.clone()).or_default();
        self.routers.insert(r);
    }

    /// Register a router and mark it as an egress.
    pub fn register_egress(&mut self, r: impl Into<Router>) {
        let r = r.into();
        self.register_router(r.clone());
        self.egresses.insert(r);
    }

    /// Register a bidirectional unit-cost link between `u` and `v`.
    pub fn register_link(&mut self, u: impl Into<Router>, v: impl Into<Router>) {
        let u = u.into();
        let v = v.into();
        self.register_router(u.clone());
        self.register_router(v.clone());
        self.add_directed(u.clone(), v.clone(), EdgeWeight::default());
        self.add_directed(v, u, EdgeWeight::default());
    }

    /// Register a bidirectional link with an explicit routing cost.
    pub fn register_weighted_link(&mut self, u: impl Into<Router>, v: impl Into<Router>, cost: f64) {
        let u = u.into();
        let v = v.into();
        self.register_router(u.clone());
        self.register_router(v.clone());
        let w = EdgeWeight { cost, ..Default::default() };
        self.add_directed(u.clone(), v.clone(), w.clone());
        self.add_directed(v, u, w);
    }

    /// Register a single directed link, e.g. to model asymmetric routing.
    pub fn register_unidirectional_link(&mut self, u: impl Into<Router>, v: impl Into<Router>, weight: EdgeWeight) {
        let u = u.into();
        let v = v.into();
        self.register_router(u.clone());
        self.register_router(v.clone());
        self.add_directed(u, v, weight);
    }

    fn add_directed(&mut self, u: Router, v: Router, w: EdgeWeight) {
        self.succ.entry(u.clone()).or_default().insert(v.clone(), w.clone());
        self.pred.entry(v).or_default().insert(u, w);
    }

    /// Whether the directed edge `u -> v` exists.
    pub fn has_edge(&self, u: &str, v: &str) -> bool {
        self.succ.get(u).map(|m| m.contains_key(v)).unwrap_or(false)
    }

    /// Out-neighbors of `u`.
    pub fn successors(&self, u: &str) -> impl Iterator<Item = &Router> {
        self.succ.get(u).into_iter().flat_map(|m| m.keys())
    }

    /// In-neighbors of `v`.
    pub fn predecessors(&self, v: &str) -> impl Iterator<Item = &Router> {
        self.pred.get(v).into_iter().flat_map(|m| m.keys())
    }

    /// All routers known to the graph.
    pub fn routers(&self) -> impl Iterator<Item = &Router> {
        self.routers.iter()
    }

    /// All directed edges, as owned tuples.
    pub fn all_edges(&self) -> impl Iterator<Item = (Router, Router)> + '_ {
        self.succ.iter().flat_map(|(u, vs)| vs.keys().map(move |v| (u.clone(), v.clone())))
    }

    /// The egress interface name of the link `u -> v`, if it exists.
    pub fn if_name(&self, u: &str, v: &str) -> Option<&str> {
        self.succ.get(u).and_then(|m| m.get(v)).map(|w| w.if_name.as_str())
    }

    /// The address assigned to router `u`'s link towards `v`, if it exists.
    pub fn if_address(&self, u: &str, v: &str) -> Option<IpNet> {
        self.succ.get(u).and_then(|m| m.get(v)).map(|w| w.address)
    }

    /// Build [`Self::spt`] and [`Self::edge_spt`] from the current edge set.
    /// Must be called after all routers/links are registered and before
    /// region resolution or keypoint sampling run.
    pub fn build_spt(&mut self) -> Result<(), GraphError> {
        let mut spt = HashMap::new();
        let mut edge_spt = HashMap::new();
        for r in &self.routers {
            let (paths, _) = spt_from_src(&self.succ, r, |e| e.cost)?;
            spt.insert(r.clone(), paths);
            let (epaths, _) = spt_from_src(&self.succ, r, |_| 1.0)?;
            edge_spt.insert(r.clone(), epaths);
        }
        self.spt = spt;
        self.edge_spt = edge_spt;
        Ok(())
    }
}

/// Dijkstra with ECMP accumulation: every path tying for shortest is kept.
/// `cost_of` lets callers build either the cost-weighted or the hop-count
/// (unit-weight) tree from the same edge set.
fn spt_from_src(
    succ: &HashMap<Router, HashMap<Router, EdgeWeight>>,
    source: &Router,
    cost_of: impl Fn(&EdgeWeight) -> f64,
) -> Result<(HashMap<Router, Vec<Vec<Router>>>, HashMap<Router, f64>), GraphError> {
    let mut dist: HashMap<Router, f64> = HashMap::new();
    let mut seen: HashMap<Router, f64> = HashMap::new();
    let mut paths: HashMap<Router, Vec<Vec<Router>>> = HashMap::new();
    paths.insert(source.clone(), vec![vec![source.clone()]]);
    seen.insert(source.clone(), 0.0);

    let mut heap = BinaryHeap::new();
    let mut counter: u64 = 0;
    heap.push(HeapItem { dist: 0.0, seq: counter, node: source.clone() });

    while let Some(HeapItem { dist: d, node: v, .. }) = heap.pop() {
        if dist.contains_key(&v) {
            continue;
        }
        dist.insert(v.clone(), d);
        let Some(neighbors) = succ.get(&v) else { continue };
        for (w, edge) in neighbors {
            let c = cost_of(edge);
            if c < 0.0 {
                return Err(GraphError::InvalidGraph);
            }
            let vw_dist = d + c;
            if let Some(existing) = dist.get(w) {
                if vw_dist < *existing {
                    return Err(GraphError::InvalidGraph);
                }
                continue;
            }
            match seen.get(w) {
                None => {
                    seen.insert(w.clone(), vw_dist);
                    counter += 1;
                    heap.push(HeapItem { dist: vw_dist, seq: counter, node: w.clone() });
                    paths.insert(w.clone(), extend_paths(&paths[&v], w));
                }
                Some(&existing) if vw_dist < existing => {
                    seen.insert(w.clone(), vw_dist);
                    counter += 1;
                    heap.push(HeapItem { dist: vw_dist, seq: counter, node: w.clone() });
                    paths.insert(w.clone(), extend_paths(&paths[&v], w));
                }
                Some(&existing) if (vw_dist - existing).abs() < f64::EPSILON => {
                    let mut extra = extend_paths(&paths[&v], w);
                    paths.get_mut(w).unwrap().append(&mut extra);
                }
                _ => {}
            }
        }
    }
    Ok((paths, dist))
}

fn extend_paths(paths: &[Vec<Router>], n: &Router) -> Vec<Vec<Router>> {
    paths.iter().map(|p| {
        let mut p = p.clone();
        p.push(n.clone());
        p
    }).collect()
}

struct HeapItem {
    dist: f64,
    seq: u64,
    node: Router,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.seq == other.seq
    }
}
impl Eq for HeapItem {}
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the smallest distance (and,
        // on ties, the earliest-inserted node) is popped first.
        other.dist.total_cmp(&self.dist).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Check that every hop of `path` is backed by a real edge in `graph`.
pub fn check_graph_supports_path(graph: &NetGraph, path: &[Router]) -> Result<(), GraphError> {
    for w in path.windows(2) {
        if !graph.has_edge(&w[0], &w[1]) {
            return Err(GraphError::MissingEdge { u: w[0].clone(), v: Some(w[1].clone()) });
        }
    }
    Ok(())
}

/// Bidirectional path search: expands whichever frontier (forward from `s`,
/// backward from `t`) is smaller, so the search cost is bounded by the
/// branching factor of the *shorter* side. `succ_of`/`pred_of` should
/// already apply whatever admissibility predicate the caller needs (e.g.
/// "this edge still has spare flow capacity").
pub fn find_path(
    succ_of: impl Fn(&str) -> Vec<Router>,
    pred_of: impl Fn(&str) -> Vec<Router>,
    s: &str,
    t: &str,
) -> Vec<Router> {
    if s == t {
        return vec![s.to_string()];
    }
    let mut came_from_fwd: HashMap<Router, Option<Router>> = HashMap::new();
    came_from_fwd.insert(s.to_string(), None);
    let mut came_from_bwd: HashMap<Router, Option<Router>> = HashMap::new();
    came_from_bwd.insert(t.to_string(), None);
    let mut frontier_fwd = vec![s.to_string()];
    let mut frontier_bwd = vec![t.to_string()];

    loop {
        if frontier_fwd.is_empty() || frontier_bwd.is_empty() {
            return Vec::new();
        }
        if frontier_fwd.len() <= frontier_bwd.len() {
            let mut next = Vec::new();
            let mut meet = None;
            'search: for u in &frontier_fwd {
                for v in succ_of(u) {
                    if !came_from_fwd.contains_key(&v) {
                        came_from_fwd.insert(v.clone(), Some(u.clone()));
                        if came_from_bwd.contains_key(&v) {
                            meet = Some(v);
                            break 'search;
                        }
                        next.push(v);
                    }
                }
            }
            if let Some(m) = meet {
                return reconstruct(m, s, t, &came_from_fwd, &came_from_bwd);
            }
            frontier_fwd = next;
        } else {
            let mut next = Vec::new();
            let mut meet = None;
            'search2: for u in &frontier_bwd {
                for v in pred_of(u) {
                    if !came_from_bwd.contains_key(&v) {
                        came_from_bwd.insert(v.clone(), Some(u.clone()));
                        if came_from_fwd.contains_key(&v) {
                            meet = Some(v);
                            break 'search2;
                        }
                        next.push(v);
                    }
                }
            }
            if let Some(m) = meet {
                return reconstruct(m, s, t, &came_from_fwd, &came_from_bwd);
            }
            frontier_bwd = next;
        }
    }
}

fn reconstruct(
    meet: Router,
    s: &str,
    t: &str,
    came_from_fwd: &HashMap<Router, Option<Router>>,
    came_from_bwd: &HashMap<Router, Option<Router>>,
) -> Vec<Router> {
    let mut path = vec![meet.clone()];
    let mut u = meet.clone();
    while u != s {
        u = came_from_fwd[&u].clone().unwrap();
        path.push(u.clone());
    }
    path.reverse();
    let mut u = meet;
    while u != t {
        u = came_from_bwd[&u].clone().unwrap();
        path.push(u);
    }
    path
}

/// A throwaway adjacency copy used for node contraction during bounded
/// minimum vertex cut and the parameterized node multiway cut search
/// ("copy-on-write graph snapshots" per the Design Notes).
#[derive(Debug, Clone, Default)]
pub(crate) struct SimpleGraph {
    pub(crate) succ: HashMap<Router, HashSet<Router>>,
}

impl SimpleGraph {
    pub(crate) fn from_edges(edges: impl IntoIterator<Item = (Router, Router)>) -> Self {
        let mut g = SimpleGraph::default();
        for (u, v) in edges {
            g.succ.entry(u).or_default().insert(v.clone());
            g.succ.entry(v).or_default();
        }
        g
    }

    pub(crate) fn add_node(&mut self, n: Router) {
        self.succ.entry(n).or_default();
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &Router> {
        self.succ.keys()
    }

    pub(crate) fn neighbors(&self, n: &str) -> impl Iterator<Item = &Router> {
        self.succ.get(n).into_iter().flatten()
    }

    pub(crate) fn predecessors(&self, n: &str) -> Vec<Router> {
        self.succ.iter().filter(|(_, vs)| vs.contains(n)).map(|(u, _)| u.clone()).collect()
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = (&Router, &Router)> + '_ {
        self.succ.iter().flat_map(|(u, vs)| vs.iter().map(move |v| (u, v)))
    }

    pub(crate) fn remove_node(&mut self, n: &str) {
        self.succ.remove(n);
        for vs in self.succ.values_mut() {
            vs.remove(n);
        }
    }
}

/// Contract every node in `nodes` into a single supernode named after their
/// sorted join, redirecting in/out edges and dropping internal self-loops.
pub(crate) fn merge_nodes(g: &mut SimpleGraph, nodes: &HashSet<Router>) -> Router {
    if nodes.len() <= 1 {
        return nodes.iter().next().cloned().unwrap();
    }
    let mut sorted: Vec<&Router> = nodes.iter().collect();
    sorted.sort();
    let into: Router = sorted.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("+");
    g.add_node(into.clone());
    for n in nodes {
        for u in g.predecessors(n) {
            if !nodes.contains(&u) {
                g.succ.get_mut(&u).unwrap().insert(into.clone());
            }
        }
        let outs: Vec<Router> = g.succ.get(n).cloned().unwrap_or_default().into_iter().collect();
        for v in outs {
            if !nodes.contains(&v) {
                g.succ.get_mut(&into).unwrap().insert(v);
            }
        }
    }
    for n in nodes {
        g.remove_node(n);
    }
    into
}

/// Decide whether the minimum node-cut separating `src` from `dst` is at
/// most `k`: contract each side to a single node, add a unit reverse
/// capacity for every forward edge, and augment with [`find_path`] until no
/// augmenting path remains or more than `k` have been found.
pub(crate) fn bounded_minimal_vertex_cut(
    base: &SimpleGraph,
    src: &HashSet<Router>,
    dst: &HashSet<Router>,
    k: i64,
) -> Result<i64, CutTooBig> {
    let mut g = base.clone();
    let s = merge_nodes(&mut g, src);
    let t = merge_nodes(&mut g, dst);

    let mut flow: HashMap<Router, HashMap<Router, i32>> = HashMap::new();
    for (u, v) in g.edges() {
        flow.entry(u.clone()).or_default().insert(v.clone(), 0);
    }
    let forward: Vec<(Router, Router)> = flow
        .iter()
        .flat_map(|(u, vs)| vs.keys().map(move |v| (u.clone(), v.clone())))
        .collect();
    for (u, v) in forward {
        flow.entry(v).or_default().entry(u).or_insert(1);
    }

    let mut flow_value: i64 = 0;
    while flow_value <= k {
        let succ_of = |u: &str| -> Vec<Router> {
            flow.get(u)
                .map(|m| m.iter().filter(|(_, uf)| **uf < 1).map(|(v, _)| v.clone()).collect())
                .unwrap_or_default()
        };
        let pred_of = |u: &str| -> Vec<Router> {
            flow.iter()
                .filter(|(_, vs)| vs.get(u).map(|uf| *uf < 1).unwrap_or(false))
                .map(|(w, _)| w.clone())
                .collect()
        };
        let path = find_path(succ_of, pred_of, &s, &t);
        if path.is_empty() {
            break;
        }
        for w in path.windows(2) {
            let (u, v) = (&w[0], &w[1]);
            *flow.get_mut(u).unwrap().get_mut(v).unwrap() += 1;
            *flow.get_mut(v).unwrap().get_mut(u).unwrap() -= 1;
        }
        flow_value += 1;
        debug!("augmenting path #{flow_value} found between contracted terminals");
    }
    if flow_value > k {
        Err(CutTooBig)
    } else {
        Ok(flow_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph() -> NetGraph {
        let mut g = NetGraph::new();
        g.register_link("A", "B");
        g.register_link("B", "C");
        g.register_egress("C");
        g.build_spt().unwrap();
        g
    }

    #[test]
    fn spt_reaches_every_node() {
        let g = line_graph();
        let paths = &g.spt["A"]["C"];
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0], vec!["A", "B", "C"]);
    }

    #[test]
    fn ecmp_paths_are_all_kept() {
        let mut g = NetGraph::new();
        g.register_link("A", "B");
        g.register_link("A", "C");
        g.register_link("B", "D");
        g.register_link("C", "D");
        g.build_spt().unwrap();
        let mut paths = g.spt["A"]["D"].clone();
        paths.sort();
        assert_eq!(paths, vec![vec!["A", "B", "D"], vec!["A", "C", "D"]]);
    }

    #[test]
    fn find_path_reaches_the_other_side() {
        let g = line_graph();
        let path = find_path(
            |u| g.successors(u).cloned().collect(),
            |u| g.predecessors(u).cloned().collect(),
            "A",
            "C",
        );
        assert_eq!(path, vec!["A", "B", "C"]);
    }

    #[test]
    fn bounded_cut_detects_a_single_cut_vertex() {
        let g = SimpleGraph::from_edges([
            ("A".to_string(), "B".to_string()),
            ("B".to_string(), "C".to_string()),
        ]);
        let src = HashSet::from(["A".to_string()]);
        let dst = HashSet::from(["C".to_string()]);
        let cut = bounded_minimal_vertex_cut(&g, &src, &dst, 1).unwrap();
        assert_eq!(cut, 1);
    }
}
