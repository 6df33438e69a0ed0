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

use std::{
    env::VarError,
    error::Error,
    io::{self, IsTerminal},
    str::FromStr,
};
use tracing::{info, warn};
use tracing_subscriber::{
    filter::Filtered,
    fmt::{
        format::{FmtSpan, Format, Json, JsonFields},
        Layer,
    },
    layer::{Layered, SubscriberExt},
    prelude::*,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

const SPRINKLE_LOG_VAR: &str = "SPRINKLE_LOG";

const DEFAULT_SPRINKLE_LOG_FILTER: &str = "error,sprinkle=debug";

const SPRINKLE_TRACE_VAR: &str = "SPRINKLE_TRACE";

const DEFAULT_SPRINKLE_TRACE_FILTER: &str = "sprinkle=trace";

// -----------------------------------------------------------------------------
// TracingSubscriber
// -----------------------------------------------------------------------------

type JsonLayer<S> = Layered<JsonFilter<S>, S>;

type JsonFilter<S> = Filtered<Layer<S, JsonFields, Format<Json>>, EnvFilter, S>;

type DelayedWarning = Option<Box<dyn FnOnce()>>;

#[derive(Default)]
pub enum TracingSubscriber {
    #[default]
    Empty,
    Registry(Registry),
    WithJson(JsonLayer<Registry>),
}

impl TracingSubscriber {
    pub fn new() -> Self {
        Self::Registry(tracing_subscriber::registry())
    }

    #[expect(clippy::panic)]
    pub fn with_json<F>(&mut self, layer_json: F) -> DelayedWarning
    where
        F: FnOnce() -> (JsonFilter<Registry>, DelayedWarning),
    {
        match std::mem::take(self) {
            Self::Registry(registry) => {
                let (layer, warning) = layer_json();
                *self = TracingSubscriber::WithJson(registry.with(layer));
                warning
            }
            Self::Empty | Self::WithJson(..) => panic!("'with_json' called twice"),
        }
    }

    /// Install the subscriber globally. Human-readable logs go to stderr, unless JSON traces
    /// were requested in which case they replace them.
    pub fn init(self, color: bool) {
        let (default_filter, warning) =
            new_default_filter(SPRINKLE_LOG_VAR, DEFAULT_SPRINKLE_LOG_FILTER);

        match self {
            TracingSubscriber::Empty => {}
            TracingSubscriber::Registry(registry) => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr as fn() -> io::Stderr)
                        .event_format(tracing_subscriber::fmt::format().with_ansi(color).compact())
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(default_filter),
                )
                .init(),
            TracingSubscriber::WithJson(layered) => layered.init(),
        };

        if let Some(notify) = warning {
            notify();
        }
    }
}

// -----------------------------------------------------------------------------
// JSON TRACES
// -----------------------------------------------------------------------------

pub fn setup_json_traces(subscriber: &mut TracingSubscriber) -> DelayedWarning {
    subscriber.with_json(|| {
        let (default_filter, warning) =
            new_default_filter(SPRINKLE_TRACE_VAR, DEFAULT_SPRINKLE_TRACE_FILTER);
        (
            tracing_subscriber::fmt::layer()
                .event_format(
                    tracing_subscriber::fmt::format()
                        .json()
                        .with_span_list(false),
                )
                .fmt_fields(JsonFields::new())
                .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
                .with_filter(default_filter),
            warning,
        )
    })
}

// -----------------------------------------------------------------------------
// ENV FILTER
// -----------------------------------------------------------------------------

fn new_default_filter(var: &str, default: &str) -> (EnvFilter, DelayedWarning) {
    match EnvFilter::try_from_env(var) {
        Ok(filter) => (filter, None),
        Err(e) => {
            // Notice stashed for when the tracing system is up.
            let fallback = default.to_string();
            let var = var.to_string();
            let warning = match e.source().and_then(|e| e.downcast_ref::<VarError>()) {
                Some(VarError::NotPresent) => {
                    Box::new(move || info!(var, fallback, "unspecified ENV variable"))
                        as Box<dyn FnOnce()>
                }
                _ => Box::new(move || warn!(var, fallback, reason = %e, "invalid ENV variable"))
                    as Box<dyn FnOnce()>,
            };

            #[expect(clippy::expect_used)]
            let filter = EnvFilter::try_new(default).expect("invalid default filter");
            (filter, Some(warning))
        }
    }
}

pub fn setup_observability(with_json_traces: bool, color: bool) {
    let mut subscriber = TracingSubscriber::new();

    let warning_json = if with_json_traces {
        setup_json_traces(&mut subscriber)
    } else {
        None
    };

    subscriber.init(color);

    if let Some(notify) = warning_json {
        notify();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Never,
    Always,
    Auto,
}

impl FromStr for Color {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(Color::Never),
            "always" => Ok(Color::Always),
            "auto" => Ok(Color::Auto),
            _ => Err("valid color settings are 'never', 'always' or 'auto'"),
        }
    }
}

impl Color {
    pub fn is_enabled(this: Option<Self>) -> bool {
        match this {
            Some(Color::Never) => false,
            Some(Color::Always) => true,
            Some(Color::Auto) => io::stderr().is_terminal(),
            None => {
                if std::env::var("NO_COLOR").iter().any(|s| !s.is_empty()) {
                    false
                } else {
                    io::stderr().is_terminal()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("never", Some(Color::Never))]
    #[test_case("always", Some(Color::Always))]
    #[test_case("auto", Some(Color::Auto))]
    #[test_case("sometimes", None)]
    fn parse_color(s: &str, expected: Option<Color>) {
        assert_eq!(s.parse::<Color>().ok(), expected);
    }

    #[test]
    fn explicit_color_settings_win() {
        assert!(Color::is_enabled(Some(Color::Always)));
        assert!(!Color::is_enabled(Some(Color::Never)));
    }

    #[test]
    fn default_filters_are_valid() {
        assert!(EnvFilter::try_new(DEFAULT_SPRINKLE_LOG_FILTER).is_ok());
        assert!(EnvFilter::try_new(DEFAULT_SPRINKLE_TRACE_FILTER).is_ok());
    }
}
