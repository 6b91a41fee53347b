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

//! Component E: the query model — `Mirror`/`Confine` requests, their
//! resolution into one instance per concrete path, and the mirroring rules
//! they compile down to.

use std::collections::HashSet;

use ipnet::IpNet;

use crate::confine::{Location, CONFINE_LEVELS};
use crate::error::StroboscopeError;
use crate::graph::{NetGraph, Router};
use crate::keypoints::KPS_LEVELS;
use crate::region::resolve_region;
use crate::requirements::NetworkFacts;
use crate::scheduler::Schedulable;

/// A mirror-everywhere-on-this-path query: capture traffic matching
/// `prefix` as it crosses `region`.
#[derive(Debug, Clone)]
pub struct Mirror {
    /// Destination prefix this query matches traffic against.
    pub prefix: IpNet,
    /// The token sequence (pre-`resolve`) or concrete path (post-`resolve`)
    /// this query covers.
    pub region: Vec<Router>,
    /// Keypoints sampled from `region`, empty until `compute_locations`
    /// runs.
    pub locations: Vec<(Router, usize)>,
    /// Predicted per-location bandwidth demand.
    pub prediction: f64,
    /// Scheduling weight: how much this query wants a slot when capacity is
    /// contended.
    pub weight: f64,
    /// Operator-facing name.
    pub name: String,
    /// Administratively disabled queries are kept around (e.g. for
    /// auditing) but never resolved or scheduled.
    pub disabled: bool,
}

impl Mirror {
    /// `len(locations) * prediction`: every keypoint needs its own mirrored
    /// capacity share.
    pub fn cost(&self) -> f64 {
        self.locations.len() as f64 * self.prediction
    }

    fn generate_rules(&self) -> Vec<MirroringRule> {
        self.locations
            .iter()
            .map(|(loc, _)| MirroringRule::new(RuleKind::Mirror, self.prefix, Location::Router(loc.clone())))
            .collect()
    }
}

/// A confine-to-this-region query: ensure traffic matching `prefix` never
/// leaves `region` except at its recognized egress points.
#[derive(Debug, Clone)]
pub struct Confine {
    /// Destination prefix this query constrains.
    pub prefix: IpNet,
    /// The token sequence (pre-`resolve`) or the union of concrete region
    /// nodes (post-`resolve`).
    pub region: Vec<Router>,
    /// Boundary locations, empty until `compute_locations` runs.
    pub locations: HashSet<Location>,
    /// Predicted bandwidth demand (confine rules install as ACL-style
    /// drops/redirects, not mirrors, but still consume a measurement slot
    /// while their own confirmation traffic is sampled).
    pub prediction: f64,
    /// Scheduling weight.
    pub weight: f64,
    /// Operator-facing name.
    pub name: String,
    /// See [`Mirror::disabled`].
    pub disabled: bool,
}

impl Confine {
    /// Confine rules are free: they are installed unconditionally and carry
    /// no dedicated measurement slot cost.
    pub fn cost(&self) -> f64 {
        0.0
    }

    fn compute_locations(&mut self, graph: &NetGraph, facts: &dyn NetworkFacts) -> Result<(), StroboscopeError> {
        let level = if facts.has_interfering_traffic(self.prefix, &self.region) {
            0
        } else if !facts.has_no_forwarding_anomalies() {
            1
        } else {
            2
        };
        self.locations = CONFINE_LEVELS[level](graph, &self.region)?;
        Ok(())
    }

    fn generate_rules(&self) -> Vec<MirroringRule> {
        self.locations
            .iter()
            .map(|loc| MirroringRule::new(RuleKind::Confine, self.prefix, loc.clone()))
            .collect()
    }
}

/// Either kind of query a caller submits to [`crate::requirements::Requirements`].
#[derive(Debug, Clone)]
pub enum Query {
    /// See [`Mirror`].
    Mirror(Mirror),
    /// See [`Confine`].
    Confine(Confine),
}

impl Query {
    /// The query's destination prefix.
    pub fn prefix(&self) -> IpNet {
        match self {
            Query::Mirror(m) => m.prefix,
            Query::Confine(c) => c.prefix,
        }
    }

    /// The region token sequence or resolved path/node set.
    pub fn region(&self) -> &[Router] {
        match self {
            Query::Mirror(m) => &m.region,
            Query::Confine(c) => &c.region,
        }
    }

    /// Operator-facing name.
    pub fn name(&self) -> &str {
        match self {
            Query::Mirror(m) => &m.name,
            Query::Confine(c) => &c.name,
        }
    }

    /// Scheduling weight.
    pub fn weight(&self) -> f64 {
        match self {
            Query::Mirror(m) => m.weight,
            Query::Confine(c) => c.weight,
        }
    }

    /// Whether this query is administratively disabled.
    pub fn disabled(&self) -> bool {
        match self {
            Query::Mirror(m) => m.disabled,
            Query::Confine(c) => c.disabled,
        }
    }

    /// Cost in scheduling units. See [`Mirror::cost`]/[`Confine::cost`].
    pub fn cost(&self) -> f64 {
        match self {
            Query::Mirror(m) => m.cost(),
            Query::Confine(c) => c.cost(),
        }
    }

    /// Expand a possibly-wildcarded region into one query instance per
    /// concrete path (`Mirror`) or a single instance over the union of
    /// concrete nodes (`Confine`).
    pub fn resolve(&self, graph: &NetGraph) -> Vec<Query> {
        match self {
            Query::Mirror(m) => resolve_region(graph, &m.region)
                .into_iter()
                .map(|path| {
                    Query::Mirror(Mirror {
                        prefix: m.prefix,
                        region: path,
                        locations: Vec::new(),
                        prediction: m.prediction,
                        weight: m.weight,
                        name: m.name.clone(),
                        disabled: m.disabled,
                    })
                })
                .collect(),
            Query::Confine(c) => {
                let union: HashSet<Router> = resolve_region(graph, &c.region).into_iter().flatten().collect();
                let mut region: Vec<Router> = union.into_iter().collect();
                region.sort();
                vec![Query::Confine(Confine {
                    prefix: c.prefix,
                    region,
                    locations: HashSet::new(),
                    prediction: c.prediction,
                    weight: c.weight,
                    name: c.name.clone(),
                    disabled: c.disabled,
                })]
            }
        }
    }

    /// Overwrite the predicted bandwidth demand used by [`Mirror::cost`]
    /// (`Confine::cost` ignores it, its cost is always zero).
    pub fn set_prediction(&mut self, prediction: f64) {
        match self {
            Query::Mirror(m) => m.prediction = prediction,
            Query::Confine(c) => c.prediction = prediction,
        }
    }

    /// Populate [`Mirror::locations`]/[`Confine::locations`] for an already
    /// `resolve`d instance. `mirror_level` selects between the two KPS
    /// algorithms; confinement picks its own level from `facts`.
    pub fn compute_locations(
        &mut self,
        graph: &NetGraph,
        facts: &dyn NetworkFacts,
        mirror_level: usize,
    ) -> Result<(), StroboscopeError> {
        match self {
            Query::Mirror(m) => {
                m.locations = KPS_LEVELS[mirror_level](graph, &m.region)?;
                Ok(())
            }
            Query::Confine(c) => c.compute_locations(graph, facts),
        }
    }

    /// The mirroring rules this resolved, located instance installs.
    pub fn generate_rules(&self) -> Vec<MirroringRule> {
        match self {
            Query::Mirror(m) => m.generate_rules(),
            Query::Confine(c) => c.generate_rules(),
        }
    }
}

impl Schedulable for Query {
    fn cost(&self) -> f64 {
        Query::cost(self)
    }
    fn weight(&self) -> f64 {
        Query::weight(self)
    }
}

/// Which query kind produced a rule, used (together with the prefix and
/// location) as the rule's identity for merging/deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Produced by a [`Mirror`] query.
    Mirror,
    /// Produced by a [`Confine`] query.
    Confine,
}

/// A single installable rule: "mirror/confine traffic matching `prefix` at
/// `location`". Two rules with the same `(kind, prefix, location)` are the
/// same rule and should be merged rather than installed twice; `queries`
/// tracks every query (by index into the compiler's resolved query list)
/// that depends on this rule, so removing one query doesn't tear down a
/// rule another query still needs.
#[derive(Debug, Clone)]
pub struct MirroringRule {
    kind: RuleKind,
    prefix: IpNet,
    location: Router,
    interface: Option<Router>,
    /// Indices into the resolved query list of every query this rule
    /// serves.
    pub queries: Vec<usize>,
}

impl MirroringRule {
    fn new(kind: RuleKind, prefix: IpNet, location: Location) -> Self {
        let (location, interface) = match location {
            Location::Router(r) => (r, None),
            Location::Interface(r, iface) => (r, Some(iface)),
        };
        MirroringRule { kind, prefix, location, interface, queries: Vec::new() }
    }

    /// The router this rule is installed on.
    pub fn location(&self) -> &Router {
        &self.location
    }

    /// The specific interface this rule is scoped to, if any.
    pub fn interface(&self) -> Option<&Router> {
        self.interface.as_ref()
    }

    /// The prefix this rule matches.
    pub fn prefix(&self) -> IpNet {
        self.prefix
    }

    /// Absorb `other`'s owning queries into `self`. Caller is responsible
    /// for checking `self == other` first.
    pub fn merge(&mut self, other: MirroringRule) {
        self.queries.extend(other.queries);
    }
}

impl PartialEq for MirroringRule {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.prefix == other.prefix && self.location == other.location
    }
}
impl Eq for MirroringRule {}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix() -> IpNet {
        "10.0.0.0/24".parse().unwrap()
    }

    #[test]
    fn mirror_cost_scales_with_keypoint_count() {
        let m = Mirror {
            prefix: prefix(),
            region: vec!["A".into(), "B".into(), "C".into()],
            locations: vec![("A".into(), 2), ("C".into(), 0)],
            prediction: 5.0,
            weight: 1.0,
            name: "m1".into(),
            disabled: false,
        };
        assert_eq!(m.cost(), 10.0);
    }

    #[test]
    fn confine_cost_is_always_zero() {
        let c = Confine {
            prefix: prefix(),
            region: vec!["A".into()],
            locations: HashSet::new(),
            prediction: 100.0,
            weight: 1.0,
            name: "c1".into(),
            disabled: false,
        };
        assert_eq!(c.cost(), 0.0);
    }

    #[test]
    fn identical_rules_merge_their_owning_queries() {
        let mut a = MirroringRule::new(RuleKind::Mirror, prefix(), Location::Router("A".into()));
        a.queries.push(0);
        let mut b = MirroringRule::new(RuleKind::Mirror, prefix(), Location::Router("A".into()));
        b.queries.push(1);
        assert_eq!(a, b);
        a.merge(b);
        assert_eq!(a.queries, vec![0, 1]);
    }
}
