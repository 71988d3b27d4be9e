// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Trace sampling configuration consumed by [`crate::logging::init_global_logging`]
//! when OTLP export is enabled.

use opentelemetry_sdk::trace::Sampler;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Sampling ratio for OTLP trace export, `[0.0, 1.0]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, SmartDefault)]
pub struct TracingSampleOptions {
    #[default = 1.0]
    pub ratio: f64,
}

pub(crate) fn create_sampler(opts: &TracingSampleOptions) -> Sampler {
    Sampler::TraceIdRatioBased(opts.ratio.clamp(0.0, 1.0))
}
