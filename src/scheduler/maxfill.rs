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

//! Max-filling: given a replicated schedule with leftover per-slot
//! capacity, pack in as much additional (weighted) coverage as possible
//! without touching queries already placed, subject to a max-min fairness
//! term over how many extra slots each query gets.

use std::collections::{HashMap, HashSet};

use good_lp::{constraint, solvers::coin_cbc::coin_cbc, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};

use crate::error::SchedulerError;

use super::{Budget, Schedulable, Schedule};

/// Remaps a schedule's real slot indices down to just the slots that have
/// spare capacity for at least the cheapest remaining query, so the ILP
/// below only has variables where they could possibly be used.
struct SlotMapper {
    schedule: Vec<HashSet<usize>>,
    /// `(leftover capacity, real slot index)`, one entry per slot worth
    /// considering.
    usable: Vec<(f64, usize)>,
}

impl SlotMapper {
    fn new<T: Schedulable>(schedule: &Schedule, items: &[T], budget: &Budget) -> Self {
        let schedule: Vec<HashSet<usize>> = schedule.iter().map(|s| s.iter().copied().collect()).collect();
        let min_using = items
            .iter()
            .map(|i| i.cost())
            .filter(|&c| c > 0.0)
            .fold(budget.using, f64::min);

        let mut usable = Vec::new();
        for (idx, slot) in schedule.iter().enumerate() {
            let used: f64 = slot.iter().map(|&q| items[q].cost()).sum();
            let left = budget.using - used;
            if left - min_using > 0.0 {
                usable.push((left, idx));
            }
        }
        SlotMapper { schedule, usable }
    }

    fn real_index(&self, s: usize) -> usize {
        self.usable[s].1
    }

    fn left(&self, s: usize) -> f64 {
        self.usable[s].0
    }

    fn already_scheduled(&self, q: usize, s: usize) -> bool {
        self.schedule[self.real_index(s)].contains(&q)
    }
}

pub(crate) fn solve<T: Schedulable>(schedule: Schedule, items: &[T], budget: &Budget) -> Result<Schedule, SchedulerError> {
    let mapper = SlotMapper::new(&schedule, items, budget);
    if mapper.usable.is_empty() {
        return Err(SchedulerError::NoSchedule("no slot has leftover capacity to max-fill".into()));
    }

    let mut vars = ProblemVariables::new();
    let mut r: HashMap<(usize, usize), Variable> = HashMap::new();
    for q in 0..items.len() {
        for s in 0..mapper.usable.len() {
            if !mapper.already_scheduled(q, s) && items[q].cost() <= mapper.left(s) {
                r.insert((q, s), vars.add(variable().binary()));
            }
        }
    }
    let alloc_min = vars.add(variable().min(0.0));

    let objective: Expression = r.iter().map(|(&(q, _), &v)| items[q].weight() * v).sum::<Expression>() + budget.sigma * alloc_min;
    let mut problem = coin_cbc(vars.maximise(objective));
    #[cfg(any(test, feature = "hide-cbc-output"))]
    problem.set_parameter("logLevel", "0");
    problem.set_parameter("seconds", &budget.max_ilp_run.as_secs().to_string());
    problem.set_parameter("ratioGap", &budget.mip_gap.to_string());

    for s in 0..mapper.usable.len() {
        let keys: Vec<(usize, usize)> = r.keys().filter(|&&(_, ss)| ss == s).copied().collect();
        if keys.is_empty() {
            continue;
        }
        let expr: Expression = keys.iter().map(|&(q, ss)| items[q].cost() * r[&(q, ss)]).sum();
        problem.add_constraint(constraint!(expr <= mapper.left(s)));
    }
    for q in 0..items.len() {
        let keys: Vec<(usize, usize)> = r.keys().filter(|&&(qq, _)| qq == q).copied().collect();
        if keys.is_empty() {
            // No feasible slot for this query: force alloc_min to 0 rather
            // than dropping it from the equity term entirely.
            problem.add_constraint(constraint!(0.0 >= alloc_min));
            continue;
        }
        let expr: Expression = keys.iter().map(|&(qq, ss)| 1.0 * r[&(qq, ss)]).sum();
        problem.add_constraint(constraint!(expr >= alloc_min));
    }

    let solution = problem
        .solve()
        .map_err(|e| SchedulerError::NoSchedule(format!("max-filling ILP infeasible: {e}")))?;

    let mut result = mapper.schedule.clone();
    for (&(q, s), &var) in &r {
        if solution.value(var) > 0.5 {
            result[mapper.real_index(s)].insert(q);
        }
    }
    Ok(result.into_iter().map(|set| set.into_iter().collect()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cost(f64);
    impl Schedulable for Cost {
        fn cost(&self) -> f64 {
            self.0
        }
        fn weight(&self) -> f64 {
            1.0
        }
    }

    #[test]
    fn fills_spare_capacity_without_touching_existing_placements() {
        let items = [Cost(2.0), Cost(2.0)];
        let schedule = vec![vec![0], vec![]];
        let budget = Budget::new(5.0, 100.0, 10.0, 2);
        let filled = solve(schedule, &items, &budget).unwrap();
        assert!(filled[0].contains(&0));
        for slot in &filled {
            let used: f64 = slot.iter().map(|&i| items[i].cost()).sum();
            assert!(used <= budget.using + 1e-9);
        }
    }

    #[test]
    fn fails_when_no_slot_has_spare_capacity() {
        let items = [Cost(5.0)];
        let schedule = vec![vec![0]];
        let budget = Budget::new(5.0, 100.0, 10.0, 1);
        assert!(solve(schedule, &items, &budget).is_err());
    }
}
