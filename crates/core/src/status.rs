//! Dossier status and the guard for its transitions.
//!
//! The completion route is terminal: once a route is locked in, only an explicit reset can clear
//! it. A recomputation producing a different route (or an incomplete series) while a route is
//! locked is rejected rather than silently coerced.

use crate::completion::{CompletionKind, CompletionOutcome, CompletionRoute};
use crate::error::{EngineError, EngineResult};
use crate::protection::Protection;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    #[default]
    New,
    /// Checked by staff.
    Controlled,
    DoseAdministered,
    Immunized,
    BoosterEligible,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DossierStatus {
    progress: ProgressState,
    completion: Option<CompletionRoute>,
}

impl DossierStatus {
    pub fn progress(&self) -> ProgressState {
        self.progress
    }

    /// The locked-in completion route, if any.
    pub fn completion(&self) -> Option<CompletionRoute> {
        self.completion
    }

    pub(crate) fn from_parts(progress: ProgressState, completion: Option<CompletionRoute>) -> Self {
        Self {
            progress,
            completion,
        }
    }
}

/// Status transition operations.
///
/// This is a zero-sized type used for namespacing transition rules.
pub struct StatusGuard;

impl StatusGuard {
    /// Next status after a recomputation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalStatusTransition`] when a completion route is locked and the
    /// outcome reports a different route or an incomplete series.
    pub fn transition(
        current: &DossierStatus,
        outcome: &CompletionOutcome,
        protection: &Protection,
        today: NaiveDate,
    ) -> EngineResult<DossierStatus> {
        if let Some(locked) = current.completion {
            if outcome.kind != CompletionKind::Complete(locked) {
                return Err(EngineError::IllegalStatusTransition {
                    locked,
                    attempted: outcome.kind,
                });
            }
        }

        let progress = match outcome.kind {
            CompletionKind::Complete(_) if protection.is_publicly_eligible_on(today) => {
                ProgressState::BoosterEligible
            }
            CompletionKind::Complete(_) => ProgressState::Immunized,
            CompletionKind::Incomplete if outcome.local_doses > 0 => {
                ProgressState::DoseAdministered
            }
            CompletionKind::Incomplete => current.progress,
        };

        Ok(DossierStatus {
            progress,
            completion: outcome.kind.route(),
        })
    }

    /// Clears the locked completion route. Progress that depended on it falls back to
    /// `DoseAdministered`.
    pub fn reset(current: &DossierStatus) -> DossierStatus {
        let progress = match current.progress {
            ProgressState::Immunized | ProgressState::BoosterEligible => {
                ProgressState::DoseAdministered
            }
            other => other,
        };
        DossierStatus {
            progress,
            completion: None,
        }
    }

    /// Moves a new dossier to `Controlled`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalProgressTransition`] from any state other than `New` or
    /// `Controlled`.
    pub fn mark_controlled(current: &DossierStatus) -> EngineResult<DossierStatus> {
        match current.progress {
            ProgressState::New | ProgressState::Controlled => Ok(DossierStatus {
                progress: ProgressState::Controlled,
                completion: current.completion,
            }),
            from => Err(EngineError::IllegalProgressTransition {
                from,
                to: ProgressState::Controlled,
            }),
        }
    }
}
