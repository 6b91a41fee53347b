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

//! Schedule replication: stretch a minimal schedule to fill the whole
//! budget window by repeating it, padding any remainder with empty slots.

use super::{Budget, Schedule};

pub(crate) fn replicate(schedule: Schedule, budget: &Budget) -> Schedule {
    let schedule: Schedule = schedule.into_iter().filter(|s| !s.is_empty()).collect();
    log::info!("minimal sub-schedule uses {} slot(s)", schedule.len());
    if schedule.is_empty() {
        return Vec::new();
    }

    let widen = std::cmp::max(1, budget.max_slots / schedule.len());
    log::info!("replicating the schedule {widen} time(s)");
    let mut out = Vec::with_capacity(budget.max_slots);
    for _ in 0..widen {
        out.extend(schedule.iter().cloned());
    }
    let leftover = budget.max_slots.saturating_sub(out.len());
    if leftover > 0 {
        log::info!("padding with {leftover} unused slot(s)");
        out.extend(std::iter::repeat(Vec::new()).take(leftover));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replicates_and_pads_to_fill_the_budget() {
        let schedule = vec![vec![0], vec![1]];
        let budget = Budget::new(5.0, 100.0, 10.0, 5);
        let replicated = replicate(schedule, &budget);
        assert_eq!(replicated, vec![vec![0], vec![1], vec![0], vec![1], vec![]]);
    }

    #[test]
    fn empty_schedule_stays_empty() {
        let budget = Budget::new(5.0, 100.0, 10.0, 5);
        assert_eq!(replicate(Vec::new(), &budget), Vec::<Vec<usize>>::new());
    }
}
