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

//! Progress reporting for long-running operations, decoupled from any particular rendering.

mod no_progress_bar;
pub use no_progress_bar::{no_progress_bar, NoProgressBar};

#[cfg(feature = "terminal")]
mod terminal_progress_bar;
#[cfg(feature = "terminal")]
pub use terminal_progress_bar::{new_terminal_progress_bar, TerminalProgressBar};

/// A progress indicator over a known number of items.
pub trait ProgressBar: Send + Sync {
    /// Advance by `size` items.
    fn tick(&self, size: usize);

    /// Replace the status line shown next to the bar.
    fn set_message(&self, message: String);

    fn clear(&self);
}

/// Builds a progress bar from a total number of items and a display template.
pub type ProgressBarFactory<'a> = &'a dyn Fn(usize, &str) -> Box<dyn ProgressBar>;
