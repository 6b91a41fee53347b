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

//! First-fit-decreasing: a fast greedy bin-packing approximation, also used
//! as the slot-count upper bound for the exact ILP formulation.

use crate::error::SchedulerError;

use super::{Budget, Schedulable, Schedule};

/// Pack `items` into as few slots as possible, largest cost first, placing
/// each into the first slot it fits; fail if more than `budget.max_slots`
/// slots are needed.
pub(crate) fn find_first_fit_estimation<T: Schedulable>(items: &[T], budget: &Budget) -> Result<Schedule, SchedulerError> {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| items[a].cost().partial_cmp(&items[b].cost()).unwrap());

    let mut slots: Vec<(Vec<usize>, f64)> = Vec::new();
    while let Some(idx) = order.pop() {
        let cost = items[idx].cost();
        if let Some(slot) = slots.iter_mut().find(|(_, used)| *used + cost <= budget.using) {
            slot.0.push(idx);
            slot.1 += cost;
            continue;
        }
        if slots.len() >= budget.max_slots {
            return Err(SchedulerError::NoSchedule(format!(
                "first-fit-decreasing needs more than the {} available slots",
                budget.max_slots
            )));
        }
        slots.push((vec![idx], cost));
    }
    log::info!("first-fit-decreasing solution uses {} slot(s)", slots.len());
    Ok(slots.into_iter().map(|(q, _)| q).collect())
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
    fn packs_the_known_scenario() {
        let items = [Cost(4.0), Cost(3.0), Cost(2.0), Cost(2.0), Cost(1.0)];
        let budget = Budget::new(5.0, 100.0, 10.0, 10);
        let schedule = find_first_fit_estimation(&items, &budget).unwrap();
        let mut costs: Vec<Vec<i64>> = schedule
            .iter()
            .map(|slot| {
                let mut c: Vec<i64> = slot.iter().map(|&i| items[i].cost() as i64).collect();
                c.sort();
                c
            })
            .collect();
        costs.sort();
        assert_eq!(costs, vec![vec![2], vec![2, 3], vec![1, 4]]);
    }

    #[test]
    fn fails_when_more_slots_are_needed_than_available() {
        let items = [Cost(5.0), Cost(5.0), Cost(5.0)];
        let budget = Budget::new(5.0, 100.0, 10.0, 2);
        assert!(find_first_fit_estimation(&items, &budget).is_err());
    }
}
