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

//! Exact bin-packing via ILP: minimal slot count, upper-bounded by the FFD
//! estimate to keep the model small.

use std::collections::HashMap;

use good_lp::{constraint, solvers::coin_cbc::coin_cbc, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};

use crate::error::SchedulerError;

use super::{ffd, Budget, Schedulable, Schedule};

pub(crate) fn solve<T: Schedulable>(items: &[T], budget: &Budget) -> Result<Schedule, SchedulerError> {
    let upper_bound = ffd::find_first_fit_estimation(items, budget)?;
    let max_slots = upper_bound.len();
    if max_slots == 0 {
        return Ok(Vec::new());
    }

    let mut vars = ProblemVariables::new();
    let mut r: HashMap<(usize, usize), Variable> = HashMap::new();
    for q in 0..items.len() {
        for s in 0..max_slots {
            r.insert((q, s), vars.add(variable().binary()));
        }
    }
    let y: Vec<Variable> = (0..max_slots).map(|_| vars.add(variable().binary())).collect();

    let objective: Expression = y.iter().map(|&v| 1.0 * v).sum();
    let mut problem = coin_cbc(vars.minimise(objective));
    #[cfg(any(test, feature = "hide-cbc-output"))]
    problem.set_parameter("logLevel", "0");
    problem.set_parameter("seconds", &budget.max_ilp_run.as_secs().to_string());
    problem.set_parameter("ratioGap", &budget.mip_gap.to_string());

    // C1: every query is scheduled exactly once.
    for q in 0..items.len() {
        let expr: Expression = (0..max_slots).map(|s| 1.0 * r[&(q, s)]).sum();
        problem.add_constraint(constraint!(expr == 1));
    }
    // C2: a used slot's scheduled queries cannot exceed the budget.
    for s in 0..max_slots {
        let expr: Expression = (0..items.len()).map(|q| items[q].cost() * r[&(q, s)]).sum();
        problem.add_constraint(constraint!(expr <= budget.using * y[s]));
    }
    // C3: a slot counts as used as soon as anything is scheduled into it.
    for s in 0..max_slots {
        for q in 0..items.len() {
            problem.add_constraint(constraint!(y[s] >= r[&(q, s)]));
        }
    }
    // Tie-break: fill slots in order, so the solver can't leave gaps.
    for s in 1..max_slots {
        problem.add_constraint(constraint!(y[s - 1] >= y[s]));
    }

    let solution = problem
        .solve()
        .map_err(|e| SchedulerError::NoSchedule(format!("bin-packing ILP infeasible: {e}")))?;

    let mut result = vec![Vec::new(); max_slots];
    for q in 0..items.len() {
        for s in 0..max_slots {
            if solution.value(r[&(q, s)]) > 0.5 {
                result[s].push(q);
            }
        }
    }
    let result: Schedule = result.into_iter().filter(|s: &Vec<usize>| !s.is_empty()).collect();
    log::info!("bin-packing solution uses {} slot(s)", result.len());
    Ok(result)
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
    fn never_uses_more_slots_than_ffd() {
        let items = [Cost(4.0), Cost(3.0), Cost(2.0), Cost(2.0), Cost(1.0)];
        let budget = Budget::new(5.0, 100.0, 10.0, 10);
        let ffd_schedule = ffd::find_first_fit_estimation(&items, &budget).unwrap();
        let binp_schedule = solve(&items, &budget).unwrap();
        assert!(binp_schedule.len() <= ffd_schedule.len());
        for slot in &binp_schedule {
            let used: f64 = slot.iter().map(|&i| items[i].cost()).sum();
            assert!(used <= budget.using + 1e-9);
        }
    }
}
