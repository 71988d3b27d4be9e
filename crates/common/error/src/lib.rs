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

use std::{any::Any, error::Error as StdError, sync::Arc};

use serde::Serialize;
use snafu::Snafu;

/// Coarse classification of a host error, matching the error taxonomy the
/// service host is specified against. `Severity` never maps to an RPC status
/// code; there is no RPC surface on this host.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Malformed interval list, bad key: surfaced at startup, process exits
    /// non-zero.
    Configuration,
    /// Anything raised by `Work`: logged, worker continues.
    WorkerFault,
    /// Memory/thread/uptime exceeded: triggers a restart, not surfaced as an
    /// error to any caller.
    SupervisorThreshold,
    /// External stop requested: clean exit.
    Cancellation,
    /// SCM / shell invocation failed.
    ScmFailure,
    /// A timer callback returned an error; the timer remains scheduled.
    TimerFault,
    Unknown,
}

pub trait StackError: StdError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>);

    fn next(&self) -> Option<&dyn StackError>;

    fn last(&self) -> &dyn StackError
    where
        Self: Sized,
    {
        let Some(mut result) = self.next() else {
            return self;
        };
        while let Some(err) = result.next() {
            result = err;
        }
        result
    }

    fn transparent(&self) -> bool { false }
}

pub trait ErrorExt: StackError {
    fn severity(&self) -> Severity { Severity::Unknown }

    fn as_any(&self) -> &dyn Any;

    fn output_msg(&self) -> String
    where
        Self: Sized,
    {
        match self.severity() {
            Severity::Unknown => format!("internal error: {self}"),
            _ => {
                let error = self.last();
                if let Some(external_error) = error.source() {
                    let mut root = external_error;
                    while let Some(source) = root.source() {
                        root = source;
                    }
                    if error.transparent() {
                        format!("{root}")
                    } else {
                        format!("{error}: {root}")
                    }
                } else {
                    format!("{error}")
                }
            }
        }
    }

    fn root_cause(&self) -> Option<&dyn StdError>
    where
        Self: Sized,
    {
        let error = self.last();
        let mut source = error.source()?;
        while let Some(next) = source.source() {
            source = next;
        }
        Some(source)
    }
}

impl<T: ?Sized + StackError> StackError for Arc<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

impl<T: StackError> StackError for Box<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the service host. Each variant corresponds to
/// one row of the error taxonomy; `Cancellation` and weak-target collection
/// are deliberately absent here because they are not-an-error outcomes
/// handled inline where they occur rather than propagated.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("invalid configuration: {message}"))]
    Configuration {
        message: String,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("worker {worker} faulted"))]
    WorkerFault {
        worker: String,
        #[snafu(source)]
        source: Box<dyn StdError + Send + Sync>,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("service control call failed: {action}"))]
    ScmFailure {
        action: String,
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("timer {timer} callback faulted"))]
    TimerFault {
        timer:  String,
        #[snafu(source)]
        source: Box<dyn StdError + Send + Sync>,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

impl StackError for Error {
    fn debug_fmt(&self, _layer: usize, buf: &mut Vec<String>) { buf.push(format!("{self}")); }

    fn next(&self) -> Option<&dyn StackError> { None }
}

impl ErrorExt for Error {
    fn severity(&self) -> Severity {
        match self {
            Error::Configuration { .. } => Severity::Configuration,
            Error::WorkerFault { .. } => Severity::WorkerFault,
            Error::ScmFailure { .. } => Severity::ScmFailure,
            Error::TimerFault { .. } => Severity::TimerFault,
        }
    }

    fn as_any(&self) -> &dyn Any { self }
}
