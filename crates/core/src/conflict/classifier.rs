//! Conflict relation classification over base/local/remote triples.
//!
//! The classification table is exhaustive over presence and absence of the
//! three versions. When a caller cannot supply a base, an external
//! [`HistoryResolver`] is consulted; if no base can be produced the
//! classifier degrades to the two-way (base-absent) rules rather than
//! failing.

use tracing::{debug, warn};

use crate::conflict::differ::RecordDiffer;
use crate::errors::HistoryError;
use crate::models::{ConflictRelation, Record, VersionTriple};

// ---------------------------------------------------------------------------
// History resolver interface
// ---------------------------------------------------------------------------

/// External source able to recover a record as it existed at a revision.
///
/// Implemented by the host's git/storage layer; this crate only consumes
/// it. A `None` return means the record did not exist at that revision.
pub trait HistoryResolver {
    fn record_at_revision(
        &self,
        path: &str,
        revision: &str,
    ) -> Result<Option<Record>, HistoryError>;
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Stateless relation classifier.
pub struct ConflictClassifier;

impl ConflictClassifier {
    /// Classify a triple with an explicit (possibly absent) base.
    pub fn classify(
        base: Option<&Record>,
        local: Option<&Record>,
        remote: Option<&Record>,
    ) -> ConflictRelation {
        match (base, local, remote) {
            // All three present: a genuine conflict needs both sides to have
            // changed, to different results.
            (Some(base), Some(local), Some(remote)) => {
                let local_changed = !RecordDiffer::equal(base, local);
                let remote_changed = !RecordDiffer::equal(base, remote);
                if local_changed && remote_changed && !RecordDiffer::equal(local, remote) {
                    ConflictRelation::ModifyModify
                } else {
                    ConflictRelation::None
                }
            }

            // Independent creation on both sides.
            (None, Some(local), Some(remote)) => {
                if RecordDiffer::equal(local, remote) {
                    ConflictRelation::None
                } else {
                    ConflictRelation::AddAdd
                }
            }

            // Presence versus absence is itself the conflict, regardless of
            // whether the surviving side still matches the base.
            (Some(_), Some(_), None) => ConflictRelation::ModifyDelete,
            (Some(_), None, Some(_)) => ConflictRelation::DeleteModify,

            // One-sided add, both-sided delete, or nothing at all: nothing
            // to reconcile.
            (Some(_), None, None)
            | (None, Some(_), None)
            | (None, None, Some(_))
            | (None, None, None) => ConflictRelation::None,
        }
    }

    /// Classify a triple, consulting `history` for a base when none was
    /// supplied.
    ///
    /// History failures degrade to the base-absent rules; classification
    /// never fails.
    pub fn classify_with_history(
        triple: &VersionTriple,
        history: &dyn HistoryResolver,
        base_revision: &str,
    ) -> ConflictRelation {
        let recovered;
        let base = match &triple.base {
            Some(base) => Some(base),
            None => match history.record_at_revision(&triple.path, base_revision) {
                Ok(found) => {
                    debug!(
                        path = %triple.path,
                        revision = base_revision,
                        found = found.is_some(),
                        "recovered base from history"
                    );
                    recovered = found;
                    recovered.as_ref()
                }
                Err(e) => {
                    warn!(
                        path = %triple.path,
                        error = %e,
                        "history resolver unavailable, degrading to two-way rules"
                    );
                    None
                }
            },
        };
        Self::classify(base, triple.local.as_ref(), triple.remote.as_ref())
    }
}
