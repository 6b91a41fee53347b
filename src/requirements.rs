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

//! Component G plus the top-level `compile`/`balance_and_schedule` entry
//! points: deriving the slot budget from a campaign window, resolving and
//! locating every query, and handing the result to the scheduler.
//!
//! Also carries the ambient network-facts glue (`NetDb`) the reference
//! implementation ships alongside the compiler: a small bandwidth-history
//! store the compiler consults when estimating a query's demand.

use std::collections::HashMap;

use ipnet::IpNet;

use crate::error::{SchedulerError, StroboscopeError};
use crate::graph::{NetGraph, Router};
use crate::query::{MirroringRule, Query};
use crate::scheduler::{self, Budget, Pipeline, Schedule};

/// Network facts the compiler needs but does not own: usage estimates and
/// the operational signals that decide which confinement level is safe.
/// Implemented by [`NetDb`], or by a caller's own telemetry adapter.
pub trait NetworkFacts {
    /// Estimated peak demand for `prefix`, in the same units as
    /// [`Budget::using`].
    fn usage_prediction(&self, prefix: IpNet) -> f64;
    /// Whether traffic unrelated to `prefix` is known to already share
    /// capacity within `region`, forcing confinement down to the exact
    /// (level 0) boundary.
    fn has_interfering_traffic(&self, prefix: IpNet, region: &[Router]) -> bool;
    /// Whether the network is currently free of the kind of forwarding
    /// anomaly that would make the relaxed (level 2) confinement unsafe.
    fn has_no_forwarding_anomalies(&self) -> bool;
    /// Floor under the derived slot duration.
    fn min_slot_duration(&self) -> f64;
    /// Worst-case end-to-end path delay, used to size a slot.
    fn max_path_delay(&self) -> f64;
    /// Worst-case delay from any router to the collector, added between
    /// slots so in-flight mirrored traffic from one slot never arrives
    /// during the next.
    fn max_router_to_collector_delay(&self) -> f64;
}

/// A minimal bandwidth-history store: the reference implementation's
/// `NetDB`, scoped to the fields the compiler actually reads.
#[derive(Debug, Clone)]
pub struct NetDb {
    /// Hard ceiling on any single usage estimate.
    pub max_bw: f64,
    /// How many past campaigns' measurements to keep per prefix.
    pub past_campaigns_considered: i64,
    past_measurements: HashMap<IpNet, Vec<(i64, f64)>>,
    /// Whether the network is currently believed free of forwarding
    /// anomalies; flipped by the runtime orchestrator, not by this crate.
    pub has_no_forwarding_anomalies: bool,
}

impl NetDb {
    /// A fresh store with the reference implementation's defaults.
    pub fn new() -> Self {
        NetDb {
            max_bw: 50.0,
            past_campaigns_considered: 10,
            past_measurements: HashMap::new(),
            has_no_forwarding_anomalies: true,
        }
    }

    /// Record that `prefix` measured `rate` during campaign
    /// `campaign_number`, evicting entries too old to still count as
    /// "recent" against `past_campaigns_considered`.
    pub fn record_bandwidth_usage(&mut self, prefix: IpNet, rate: f64, campaign_number: i64) {
        let retention = self.past_campaigns_considered;
        let mut history = self.past_measurements.remove(&prefix).unwrap_or_default();
        history.retain(|&(idx, _)| idx + retention >= campaign_number);
        history.push((campaign_number, rate));
        self.past_measurements.insert(prefix, history);
    }

    fn netflow_estimation(&self, _prefix: IpNet) -> Result<f64, StroboscopeError> {
        Err(StroboscopeError::NoNetFlowRecords)
    }
}

impl Default for NetDb {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkFacts for NetDb {
    fn usage_prediction(&self, prefix: IpNet) -> f64 {
        let mut estimate = self
            .past_measurements
            .get(&prefix)
            .and_then(|history| history.iter().map(|&(_, bw)| bw).fold(None, |acc, x| Some(acc.map_or(x, |a: f64| a.max(x)))))
            .unwrap_or_else(|| self.netflow_estimation(prefix).unwrap_or(self.max_bw));
        if estimate > self.max_bw {
            log::warn!("{prefix} estimated demand {estimate} exceeds max bandwidth {}", self.max_bw);
            estimate = self.max_bw;
        }
        estimate
    }

    fn has_interfering_traffic(&self, _prefix: IpNet, _region: &[Router]) -> bool {
        false
    }

    fn has_no_forwarding_anomalies(&self) -> bool {
        self.has_no_forwarding_anomalies
    }

    fn min_slot_duration(&self) -> f64 {
        25.0
    }

    fn max_path_delay(&self) -> f64 {
        50.0
    }

    fn max_router_to_collector_delay(&self) -> f64 {
        25.0
    }
}

/// The output of a full compile: the schedule (indices into
/// `resolved_queries`), the resolved/located query instances themselves,
/// and the mirroring rules each one generates.
pub struct CompileOutput {
    /// One slot's worth of query indices per measurement interval.
    pub schedule: Schedule,
    /// Every resolved, located query instance, in the order the schedule
    /// indexes them.
    pub resolved_queries: Vec<Query>,
    /// The mirroring rules generated by each resolved query, same indexing.
    pub rules_by_query: Vec<Vec<MirroringRule>>,
}

/// A campaign's query set plus its budget: `what` resolves and locates
/// every query, `when` schedules them, `compile` does both.
#[derive(Debug, Clone)]
pub struct Requirements {
    /// The as-submitted (possibly wildcarded, unlocated) queries.
    pub queries: Vec<Query>,
    /// Bandwidth available per slot.
    pub using: f64,
    /// Total campaign duration, in seconds.
    pub during: f64,
    /// Repetition interval, in seconds.
    pub every: f64,
    min_slot_duration: f64,
    slot_count: usize,
}

impl Requirements {
    /// A requirements set with no queries yet and the reference
    /// implementation's minimum slot duration.
    pub fn new(queries: Vec<Query>, using: f64, during: f64, every: f64) -> Self {
        Requirements { queries, using, during, every, min_slot_duration: 25.0, slot_count: 0 }
    }

    /// Derive how many measurement slots the campaign window admits. Fails
    /// with `NoSchedule` if the window is too short to fit even one.
    pub fn derive_slot_count(&mut self, facts: &dyn NetworkFacts) -> Result<(), StroboscopeError> {
        let slot_duration = facts.max_path_delay().max(self.min_slot_duration.max(facts.min_slot_duration()));
        let inter_slot_delay = facts.max_router_to_collector_delay();
        let slot_count = ((self.during * 1000.0) / (slot_duration + inter_slot_delay)).floor();
        if slot_count < 1.0 {
            return Err(SchedulerError::NoSchedule("budget admits no slots".into()).into());
        }
        self.slot_count = slot_count as usize;
        Ok(())
    }

    fn budget(&self) -> Budget {
        Budget::new(self.using, self.during, self.every, self.slot_count)
    }

    /// Resolve every submitted query into concrete, located instances.
    /// Disabled queries are dropped. Must run after `derive_slot_count`.
    pub fn what(&self, graph: &NetGraph, facts: &dyn NetworkFacts, mirror_level: usize) -> Result<Vec<Query>, StroboscopeError> {
        let mut resolved = Vec::new();
        for q in self.queries.iter().filter(|q| !q.disabled()) {
            for mut instance in q.resolve(graph) {
                instance.set_prediction(facts.usage_prediction(instance.prefix()));
                instance.compute_locations(graph, facts, mirror_level)?;
                resolved.push(instance);
            }
        }
        Ok(resolved)
    }

    /// Schedule already-resolved `queries` under this campaign's budget.
    pub fn when(&self, queries: &[Query], pipeline: Pipeline) -> Result<Schedule, StroboscopeError> {
        Ok(scheduler::balance_and_schedule(queries, &self.budget(), pipeline)?)
    }

    /// Resolve, locate, and schedule every query, then generate the
    /// mirroring rules each resolved instance needs installed.
    pub fn compile(&mut self, graph: &NetGraph, facts: &dyn NetworkFacts, mirror_level: usize, pipeline: Pipeline) -> Result<CompileOutput, StroboscopeError> {
        self.derive_slot_count(facts)?;
        let resolved_queries = self.what(graph, facts, mirror_level)?;
        let schedule = self.when(&resolved_queries, pipeline)?;
        let rules_by_query = resolved_queries.iter().map(|q| q.generate_rules()).collect();
        Ok(CompileOutput { schedule, resolved_queries, rules_by_query })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netdb_falls_back_to_max_bw_without_measurements() {
        let db = NetDb::new();
        let prefix: IpNet = "10.0.0.0/24".parse().unwrap();
        assert_eq!(db.usage_prediction(prefix), db.max_bw);
    }

    #[test]
    fn netdb_uses_the_largest_recent_measurement() {
        let mut db = NetDb::new();
        let prefix: IpNet = "10.0.0.0/24".parse().unwrap();
        db.record_bandwidth_usage(prefix, 5.0, 1);
        db.record_bandwidth_usage(prefix, 12.0, 2);
        assert_eq!(db.usage_prediction(prefix), 12.0);
    }

    #[test]
    fn netdb_evicts_old_measurements() {
        let mut db = NetDb::new();
        db.past_campaigns_considered = 1;
        let prefix: IpNet = "10.0.0.0/24".parse().unwrap();
        db.record_bandwidth_usage(prefix, 40.0, 1);
        db.record_bandwidth_usage(prefix, 5.0, 10);
        // campaign 1 is older than campaign 10 by more than the 1-campaign
        // retention window, so only the second measurement should survive.
        assert_eq!(db.usage_prediction(prefix), 5.0);
    }

    #[test]
    fn zero_slot_budget_fails_with_no_schedule() {
        let mut reqs = Requirements::new(Vec::new(), 5.0, 0.0, 1.0);
        let facts = NetDb::new();
        let err = reqs.derive_slot_count(&facts).unwrap_err();
        assert!(matches!(err, StroboscopeError::Scheduler(SchedulerError::NoSchedule(_))));
    }
}
