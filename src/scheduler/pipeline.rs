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

//! The five named scheduling pipelines: each composes the four primitives,
//! catching a `NoSchedule` from any stage after the first and falling back
//! to the previous stage's result rather than failing the whole compile.

use crate::error::SchedulerError;

use super::{binp, ffd, maxfill, repl, Budget, Schedulable, Schedule};

/// Which pipeline to run, trading solve time for schedule quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// FFD alone: fast, no solver involved.
    FirstFitDecreasing,
    /// Exact bin-packing, no replication/fill.
    BinPacking,
    /// FFD, then replicate to fill the budget window.
    Approximation,
    /// FFD, replicate, then max-fill the leftover capacity.
    HalfApproximation,
    /// Exact bin-packing, replicate, then max-fill.
    Optimized,
}

/// Schedule `items` under `budget` using `pipeline`. A stage failing with
/// `NoSchedule` after the first is logged and the pipeline stops there,
/// returning whatever the last successful stage produced; only a failure in
/// the very first stage is propagated.
pub fn balance_and_schedule<T: Schedulable>(
    items: &[T],
    budget: &Budget,
    pipeline: Pipeline,
) -> Result<Schedule, SchedulerError> {
    log::info!("scheduling {} quer{} with the {pipeline:?} pipeline", items.len(), if items.len() == 1 { "y" } else { "ies" });

    let schedule = match pipeline {
        Pipeline::FirstFitDecreasing | Pipeline::Approximation | Pipeline::HalfApproximation => {
            ffd::find_first_fit_estimation(items, budget)?
        }
        Pipeline::BinPacking | Pipeline::Optimized => binp::solve(items, budget)?,
    };

    if matches!(pipeline, Pipeline::FirstFitDecreasing | Pipeline::BinPacking) {
        return Ok(schedule);
    }

    let replicated = repl::replicate(schedule, budget);
    if matches!(pipeline, Pipeline::Approximation) {
        return Ok(replicated);
    }

    match maxfill::solve(replicated.clone(), items, budget) {
        Ok(filled) => Ok(filled),
        Err(SchedulerError::NoSchedule(msg)) => {
            log::warn!("cannot max-fill the schedule, keeping the replicated one: {msg}");
            Ok(replicated)
        }
    }
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
    fn first_fit_decreasing_pipeline_does_not_replicate() {
        let items = [Cost(4.0), Cost(3.0)];
        let budget = Budget::new(5.0, 100.0, 10.0, 10);
        let schedule = balance_and_schedule(&items, &budget, Pipeline::FirstFitDecreasing).unwrap();
        assert_eq!(schedule.len(), 2);
    }

    #[test]
    fn approximation_pipeline_fills_the_budget_window() {
        let items = [Cost(4.0), Cost(3.0)];
        let budget = Budget::new(5.0, 100.0, 10.0, 6);
        let schedule = balance_and_schedule(&items, &budget, Pipeline::Approximation).unwrap();
        assert_eq!(schedule.len(), 6);
    }
}
