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

//! Component B: region resolution — expanding a token sequence containing
//! `->` wildcards into the concrete shortest paths it denotes.

use itertools::Itertools;

use crate::graph::{NetGraph, Router};

/// Token used in a region specification to mean "shortest path to the next
/// concrete hop" (or to any egress, at the start/end of the sequence).
pub const ARROW: &str = "->";

/// Expand `region` into the concrete paths it denotes, cross-producing over
/// ECMP alternatives at every `->` wildcard. A region with no wildcard is
/// returned unchanged (as its own single-element path list), which is what
/// makes resolution idempotent: `resolve_region(g, &resolve_region(g,
/// r)[0]) == resolve_region(g, r)`.
///
/// Pure function: no caching, no mutation of `graph`. Call sites that want
/// to skip recomputation when the input hasn't changed do so themselves
/// (the reference implementation's "returns `None` if unchanged" behavior
/// is a caller-side optimization, not part of this function's contract).
pub fn resolve_region(graph: &NetGraph, region: &[Router]) -> Vec<Vec<Router>> {
    if region.is_empty() {
        return Vec::new();
    }

    let mut paths: Vec<Vec<Router>>;
    let mut idx = 0;
    if region[0] == ARROW {
        paths = graph.egresses.iter().map(|e| vec![e.clone()]).collect();
    } else {
        paths = vec![vec![region[0].clone()]];
        idx = 1;
    }

    while idx < region.len() {
        if region[idx] != ARROW {
            for p in paths.iter_mut() {
                p.push(region[idx].clone());
            }
            idx += 1;
            continue;
        }
        // Consume the (normally single) arrow token and find the terminal
        // it points at: the next concrete hop, or every egress if the
        // sequence ends on a wildcard.
        idx += 1;
        let terminals: Vec<Router> = if idx < region.len() {
            let t = region[idx].clone();
            idx += 1;
            vec![t]
        } else {
            graph.egresses.iter().cloned().collect()
        };

        let mut spawned = Vec::new();
        for p in paths.iter_mut() {
            let from = p.last().unwrap().clone();
            let extensions: Vec<Vec<Router>> = terminals
                .iter()
                .filter_map(|terminal| graph.spt.get(&from).and_then(|m| m.get(terminal)))
                .flatten()
                .map(|sub| sub[1..].to_vec())
                .collect_vec();
            if extensions.is_empty() {
                continue;
            }
            let mut rest = extensions.into_iter();
            let first = rest.next().unwrap();
            for extra in rest {
                let mut np = p.clone();
                np.extend(extra);
                spawned.push(np);
            }
            p.extend(first);
        }
        paths.extend(spawned);
    }

    paths
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

    #[test]
    fn concrete_region_is_unchanged() {
        let g = abilene();
        let region = vec!["SEAT".to_string(), "SALT".to_string(), "KANS".to_string()];
        let resolved = resolve_region(&g, &region);
        assert_eq!(resolved, vec![region]);
    }

    #[test]
    fn wildcard_expands_to_the_shortest_path() {
        let g = abilene();
        let region = vec!["SEAT".to_string(), ARROW.to_string(), "NEWY".to_string()];
        let resolved = resolve_region(&g, &region);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].first().unwrap(), "SEAT");
        assert_eq!(resolved[0].last().unwrap(), "NEWY");
    }

    #[test]
    fn resolution_is_idempotent() {
        let g = abilene();
        let region = vec!["SEAT".to_string(), ARROW.to_string(), "NEWY".to_string()];
        let once = resolve_region(&g, &region);
        let twice = resolve_region(&g, &once[0]);
        assert_eq!(once, twice);
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

    fn routers(names: &[&str]) -> Vec<Router> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn wildcard_between_two_hops_cross_products_every_ecmp_alternative() {
        let g = paper_graph();
        let region = vec!["A".to_string(), ARROW.to_string(), "C".to_string()];
        let mut resolved = resolve_region(&g, &region);
        resolved.sort();
        let mut expected = vec![
            routers(&["A", "B", "C"]),
            routers(&["A", "L", "C"]),
            routers(&["A", "F", "C"]),
        ];
        expected.sort();
        assert_eq!(resolved, expected);
    }

    #[test]
    fn leading_wildcard_fans_out_from_every_egress() {
        let g = paper_graph();
        let region = vec![ARROW.to_string(), "D".to_string()];
        let resolved = resolve_region(&g, &region);
        assert_eq!(resolved.len(), 5);
        for path in &resolved {
            assert_eq!(path.last().unwrap(), "D");
            assert!(g.egresses.contains(path.first().unwrap()));
        }
        let mut starts: Vec<&Router> = resolved.iter().map(|p| &p[0]).collect();
        starts.sort();
        assert_eq!(starts, vec!["E1", "E1", "E1", "E2", "E3"]);
    }
}
