// Copyright 2025 PRAGMA
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

//! Everything around the distribution engine that touches the outside world: logs and traces,
//! crash reports, process signals, and the adapters behind the engine's collaborators.

pub mod exit;
pub mod observability;
pub mod panic;
pub mod providers;
pub mod submitter;

/// Where campaign state lives unless told otherwise.
pub const DEFAULT_DB_DIR: &str = "./sprinkle.db";

/// Number of records served per page by file-backed providers.
pub const DEFAULT_PAGE_SIZE: usize = 100;
