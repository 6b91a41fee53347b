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

//! Stroboscope: compiles a set of traffic-mirroring and traffic-confinement
//! queries, plus a shared bandwidth budget, into a measurement schedule and
//! the mirroring rules each slot installs.
//!
//! - [`graph`] — the network topology, shortest-path trees, and the
//!   path/min-cut primitives.
//! - [`region`] — wildcard region expansion.
//! - [`keypoints`] — key-point sampling, to place as few mirrors as possible
//!   while still observing every packet crossing a region.
//! - [`confine`] — boundary rule placement for confinement queries.
//! - [`query`] — the `Mirror`/`Confine` query model and the rules they
//!   compile down to.
//! - [`scheduler`] — packing queries into measurement slots under budget.
//! - [`requirements`] — the top-level entry point tying the above together.
//! - [`error`] — the crate's error taxonomy.

pub mod confine;
pub mod error;
pub mod graph;
pub mod keypoints;
pub mod query;
pub mod region;
pub mod requirements;
pub mod scheduler;

pub use error::StroboscopeError;
pub use graph::{NetGraph, Router};
pub use query::{Confine, Mirror, MirroringRule, Query};
pub use requirements::{CompileOutput, NetDb, NetworkFacts, Requirements};
pub use scheduler::{Budget, Pipeline, Schedulable, Schedule, Slot};
