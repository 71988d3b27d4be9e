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

//! Build/version metadata, generated at build time by `shadow-rs`.

shadow_rs::shadow!(build);

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

const fn is_official_release() -> bool { option_env!("RSKETCH_RELEASE").is_some() }

const DIRTY_SUFFIX: &str = if build::GIT_CLEAN { "" } else { "-dirty" };

/// Full version string with a development suffix unless built as an
/// official release (`RSKETCH_RELEASE` set).
#[allow(clippy::const_is_empty)]
pub const FULL_VERSION: &str = {
    if is_official_release() {
        build::PKG_VERSION
    } else if build::SHORT_COMMIT.is_empty() {
        const_format::concatcp!(build::PKG_VERSION, "-unofficial")
    } else {
        const_format::concatcp!(build::PKG_VERSION, "-unofficial+", build::SHORT_COMMIT, DIRTY_SUFFIX)
    }
};
