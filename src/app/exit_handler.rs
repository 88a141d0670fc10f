//! Exit code logic for the catalog-sync process.
//!
//! Single responsibility: map a run summary to the process exit outcome.

use std::process::ExitCode;

use catalog_sync_core::RunSummary;

/// Process exit outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every pending item finished or was skipped.
    Success,
    /// Fatal error before or during the run.
    Failure,
    /// The run finished but some items remain partial or failed.
    Partial,
    /// Cancellation ended the run.
    Interrupted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
            Self::Interrupted => 130,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Determines the process exit outcome from a finished run.
pub(crate) fn determine_exit_outcome(summary: &RunSummary) -> ProcessExit {
    if summary.interrupted {
        ProcessExit::Interrupted
    } else if summary.has_unfinished() {
        ProcessExit::Partial
    } else {
        ProcessExit::Success
    }
}
