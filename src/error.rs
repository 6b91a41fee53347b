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

//! Error taxonomy for the compiler and scheduler.
//!
//! Mirrors the teacher crate's layering: narrow, internal error types drive
//! backtracking inside a single algorithm, while a small set of public
//! variants (wrapped into [`StroboscopeError`]) are the only ones a caller
//! ever has to handle.

use thiserror::Error;

use crate::graph::Router;

/// Errors raised while building or querying the graph primitives.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphError {
    /// A resolved region, path, or confinement set referenced an edge the
    /// graph does not have.
    #[error("missing edge starting from {u}{}", v.as_ref().map(|v| format!(" to {v}")).unwrap_or_default())]
    MissingEdge {
        /// The node missing the edge.
        u: Router,
        /// The expected other endpoint, if known.
        v: Option<Router>,
    },
    /// A negative or contradictory edge weight was found while building a
    /// shortest-path tree.
    #[error("invalid graph: negative or contradictory edge weight")]
    InvalidGraph,
}

/// Internal signal used by the bounded minimum vertex cut search; never
/// escapes the `confine` module.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CutTooBig;

/// Internal signal raised when the parameterized node multiway cut cannot
/// reduce the keypoint set further; caught by the caller and used to fall
/// back to the unreduced set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NoReduction;

/// Errors raised by the scheduling pipelines.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchedulerError {
    /// No pipeline stage could fit the queries into the available slots.
    #[error("no schedule: {0}")]
    NoSchedule(String),
}

/// The public error type returned by [`crate::requirements::Requirements`].
#[derive(Debug, Error)]
pub enum StroboscopeError {
    /// A graph primitive or region/confinement computation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// Scheduling failed: no pipeline stage could fit the queries into the
    /// available slots, including an ILP solver failure (infeasible model,
    /// solver error), which `scheduler` wraps as `SchedulerError::NoSchedule`
    /// before it ever reaches this type.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// The query-language grammar rejected the input. Raised by an external
    /// front-end; kept here because it is part of the contract callers
    /// observe from the system as a whole (see `SPEC_FULL.md` §6).
    #[error("cannot parse requirements: {0}")]
    CannotParse(String),
    /// No NetFlow-derived bandwidth estimate is available for a prefix.
    #[error("no NetFlow records available for this prefix")]
    NoNetFlowRecords,
}
