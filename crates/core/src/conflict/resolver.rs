//! Automatic per-triple resolution.
//!
//! For each version triple the resolver classifies the relation, applies
//! whatever can be settled without a user (one-sided changes, identical
//! edits, clean field and content merges), and emits a
//! [`ConflictDescriptor`] for everything that genuinely needs a decision.
//! Descriptors are what a [`ConflictResolutionSession`] is started with.
//!
//! [`ConflictResolutionSession`]: crate::conflict::session::ConflictResolutionSession

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::MergeConfig;
use crate::conflict::classifier::{ConflictClassifier, HistoryResolver};
use crate::conflict::differ::{FieldMergePolicy, RecordDiffer};
use crate::conflict::merger::TextMergeEngine;
use crate::models::{
    ConflictDescriptor, ConflictRelation, DecisionKind, DecisionLogEntry, MergeOutcome, Record,
    VersionTriple,
};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of the automatic pass for one triple.
#[derive(Debug, Clone)]
pub enum AutoOutcome {
    /// Settled without user involvement. `record` of `None` means the
    /// resolved state of this path is "deleted".
    Resolved {
        record: Option<Record>,
        decision: DecisionLogEntry,
    },
    /// A genuine conflict remains; hand the descriptor to a session.
    Manual(Box<ConflictDescriptor>),
}

/// Aggregate result of resolving a batch of triples.
#[derive(Debug, Default)]
pub struct ResolutionBatch {
    /// Paths settled automatically (`None` value = deletion).
    pub resolved: HashMap<String, Option<Record>>,
    /// Descriptors that need a resolution session.
    pub descriptors: Vec<ConflictDescriptor>,
    /// Decision log entries for the automatically settled paths.
    pub decisions: Vec<DecisionLogEntry>,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Stateless automatic resolution pass.
///
/// Pure over its inputs; safe to run concurrently across distinct paths.
pub struct AutoResolver {
    engine: TextMergeEngine,
    policy: FieldMergePolicy,
}

impl Default for AutoResolver {
    fn default() -> Self {
        Self {
            engine: TextMergeEngine::default(),
            policy: FieldMergePolicy::default(),
        }
    }
}

impl AutoResolver {
    pub fn new(engine: TextMergeEngine, policy: FieldMergePolicy) -> Self {
        Self { engine, policy }
    }

    pub fn from_config(config: &MergeConfig) -> Self {
        Self::new(
            TextMergeEngine::new(config.merge.conflict_hunk_limit),
            config.merge.field_policy,
        )
    }

    /// The field-merge tie-break this resolver applies.
    pub fn policy(&self) -> FieldMergePolicy {
        self.policy
    }

    /// Resolve one triple, consulting `history` for a missing base first.
    pub fn resolve_with_history(
        &self,
        triple: &VersionTriple,
        history: &dyn HistoryResolver,
        base_revision: &str,
    ) -> AutoOutcome {
        if triple.base.is_some() {
            return self.resolve(triple);
        }
        let base = history
            .record_at_revision(&triple.path, base_revision)
            .unwrap_or_else(|e| {
                tracing::warn!(path = %triple.path, error = %e, "base recovery failed");
                None
            });
        let filled = VersionTriple {
            path: triple.path.clone(),
            base,
            local: triple.local.clone(),
            remote: triple.remote.clone(),
        };
        self.resolve(&filled)
    }

    /// Resolve one triple.
    pub fn resolve(&self, triple: &VersionTriple) -> AutoOutcome {
        let base = triple.base.as_ref();
        let local = triple.local.as_ref();
        let remote = triple.remote.as_ref();
        let relation = ConflictClassifier::classify(base, local, remote);
        debug!(path = %triple.path, relation = %relation, "triple classified");

        match relation {
            ConflictRelation::None => self.adopt_one_sided(triple, base, local, remote),
            ConflictRelation::ModifyModify | ConflictRelation::AddAdd => {
                self.merge_both_sides(triple, relation, base, local, remote)
            }
            // Presence versus absence cannot be merged; a user decides.
            ConflictRelation::ModifyDelete | ConflictRelation::DeleteModify => {
                AutoOutcome::Manual(Box::new(ConflictDescriptor {
                    path: triple.path.clone(),
                    relation,
                    base: triple.base.clone(),
                    local: triple.local.clone(),
                    remote: triple.remote.clone(),
                    field_conflicts: Vec::new(),
                    content_outcome: None,
                }))
            }
        }
    }

    /// Resolve a batch of triples, splitting into auto-settled paths and
    /// descriptors for a session.
    pub fn resolve_all(&self, triples: &[VersionTriple]) -> ResolutionBatch {
        let mut batch = ResolutionBatch::default();
        for triple in triples {
            match self.resolve(triple) {
                AutoOutcome::Resolved { record, decision } => {
                    batch.resolved.insert(triple.path.clone(), record);
                    batch.decisions.push(decision);
                }
                AutoOutcome::Manual(descriptor) => batch.descriptors.push(*descriptor),
            }
        }
        info!(
            auto_resolved = batch.resolved.len(),
            manual = batch.descriptors.len(),
            "automatic resolution pass complete"
        );
        batch
    }

    /// No genuine conflict: adopt whichever side represents the change.
    fn adopt_one_sided(
        &self,
        triple: &VersionTriple,
        base: Option<&Record>,
        local: Option<&Record>,
        remote: Option<&Record>,
    ) -> AutoOutcome {
        let (record, rationale) = match (base, local, remote) {
            (Some(base), Some(local), Some(remote)) => {
                if RecordDiffer::equal(local, remote) {
                    (Some(local.clone()), "identical on both sides")
                } else if RecordDiffer::equal(base, local) {
                    (Some(remote.clone()), "remote-only change adopted")
                } else {
                    (Some(local.clone()), "local-only change adopted")
                }
            }
            (None, Some(local), Some(_)) => (Some(local.clone()), "identical add on both sides"),
            (None, Some(local), None) => (Some(local.clone()), "local-only add kept"),
            (None, None, Some(remote)) => (Some(remote.clone()), "remote-only add kept"),
            (Some(_), None, None) => (None, "deleted on both sides"),
            (None, None, None) => (None, "record absent everywhere"),
            // Covered by ModifyDelete/DeleteModify in the caller.
            (Some(_), Some(_), None) | (Some(_), None, Some(_)) => unreachable!(),
        };
        AutoOutcome::Resolved {
            record,
            decision: DecisionLogEntry::now(&triple.path, DecisionKind::AutoAdopted, rationale),
        }
    }

    /// Both sides present and divergent: try field plus content merging.
    fn merge_both_sides(
        &self,
        triple: &VersionTriple,
        relation: ConflictRelation,
        base: Option<&Record>,
        local: Option<&Record>,
        remote: Option<&Record>,
    ) -> AutoOutcome {
        // Relation guarantees both sides present.
        let (Some(local), Some(remote)) = (local, remote) else {
            unreachable!();
        };

        let field_conflicts = RecordDiffer::field_diff(base, local, remote);

        let label = format!("{} {}", local.kind(), triple.path);
        let engine = self.engine.clone().with_labels(&label, &label);
        let content_outcome = match (local.code(), remote.code()) {
            (Some(local_code), Some(remote_code)) => {
                Some(match base.and_then(Record::code) {
                    Some(base_code) => engine.three_way_merge(local_code, remote_code, base_code),
                    None => engine.two_way_merge(local_code, remote_code),
                })
            }
            _ => None,
        };

        let content_clean = content_outcome.as_ref().is_none_or(MergeOutcome::is_clean);
        if field_conflicts.is_empty() && content_clean {
            let mut record = RecordDiffer::merge_fields(base, local, remote, self.policy);
            if let Some(outcome) = &content_outcome {
                record = record.with_code(outcome.merged_text.clone());
            }
            debug!(path = %triple.path, "merged automatically");
            return AutoOutcome::Resolved {
                record: Some(record),
                decision: DecisionLogEntry::now(
                    &triple.path,
                    DecisionKind::AutoMerged,
                    "fields and content merged cleanly",
                ),
            };
        }

        AutoOutcome::Manual(Box::new(ConflictDescriptor {
            path: triple.path.clone(),
            relation,
            base: triple.base.clone(),
            local: triple.local.clone(),
            remote: triple.remote.clone(),
            field_conflicts,
            content_outcome,
        }))
    }
}
