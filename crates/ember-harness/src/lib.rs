// Copyright 2025 the emberbench authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Ember Harness
//!
//! Benchmark-run plumbing around the render core: the JSON test
//! configuration ([`TestDescriptor`]) and the timing/draw-call statistics
//! collected over a run ([`RenderStatistics`], reported as a
//! serializable [`BenchmarkResult`]).
//!
//! Window-system glue and the runner binary live with the embedding
//! application, not here.

#![warn(missing_docs)]

pub mod descriptor;
pub mod statistics;

pub use descriptor::{parse_frame_list, ScreenMode, TestDescriptor};
pub use statistics::{BenchmarkResult, RenderStatistics};
