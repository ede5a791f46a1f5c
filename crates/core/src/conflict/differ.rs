//! Structural record comparison and field-level merging.
//!
//! The differ answers two questions the classifier and resolver build on:
//! are two records semantically equal, and which fields do two divergent
//! records genuinely disagree on. The snippet `code` field is deliberately
//! excluded here -- content is a separate channel merged line-by-line by the
//! text merge engine, not replaced wholesale like a scalar field.

use serde::{Deserialize, Serialize};

use crate::models::{Directory, FieldConflict, Record, Snippet};

// ---------------------------------------------------------------------------
// Field merge policy
// ---------------------------------------------------------------------------

/// Tie-break applied when both sides hold populated, unequal values for the
/// same field.
///
/// This is a replaceable policy parameter, not a product guarantee; the
/// default mirrors the historical "remote wins" behavior.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldMergePolicy {
    #[default]
    PreferRemote,
    PreferLocal,
}

// ---------------------------------------------------------------------------
// Differ
// ---------------------------------------------------------------------------

/// Stateless record comparison operations.
pub struct RecordDiffer;

impl RecordDiffer {
    /// True iff all semantic fields (identity and path included) are equal.
    pub fn equal(a: &Record, b: &Record) -> bool {
        a == b
    }

    /// Field-level conflicts between two present records.
    ///
    /// With a base, a field conflicts only if both sides changed it *and*
    /// disagree with each other. Without a base there is nothing to
    /// attribute changes to, so any disagreement is a conflict.
    ///
    /// The snippet content channel is not a field here; see the text merge
    /// engine.
    pub fn field_diff(base: Option<&Record>, local: &Record, remote: &Record) -> Vec<FieldConflict> {
        if std::mem::discriminant(local) != std::mem::discriminant(remote) {
            return vec![FieldConflict {
                field: "kind".into(),
                local_value: local.kind().into(),
                remote_value: remote.kind().into(),
            }];
        }

        let base_fields = base
            .filter(|b| std::mem::discriminant(*b) == std::mem::discriminant(local))
            .map(scalar_fields);
        let local_fields = scalar_fields(local);
        let remote_fields = scalar_fields(remote);

        let mut conflicts = Vec::new();
        for (i, (name, local_value)) in local_fields.iter().enumerate() {
            let remote_value = &remote_fields[i].1;
            let base_value = base_fields.as_ref().map(|f| &f[i].1);

            let conflicting = match base_value {
                Some(b) => local_value != b && remote_value != b && local_value != remote_value,
                None => local_value != remote_value,
            };
            if conflicting {
                conflicts.push(FieldConflict {
                    field: (*name).into(),
                    local_value: local_value.clone(),
                    remote_value: remote_value.clone(),
                });
            }
        }
        conflicts
    }

    /// Merge the scalar fields of two same-path records into one.
    ///
    /// Identity (path) and the record kind are always taken from `local`.
    /// With a base, a field changed on exactly one side adopts that side;
    /// otherwise the tie-break is: keep equal values, prefer the populated
    /// value when one side is empty, and fall back to `policy` when both
    /// are populated and unequal. The content channel is carried over from
    /// `local` untouched -- callers merge it separately.
    pub fn merge_fields(
        base: Option<&Record>,
        local: &Record,
        remote: &Record,
        policy: FieldMergePolicy,
    ) -> Record {
        match (local, remote) {
            (Record::Snippet(l), Record::Snippet(r)) => {
                let b = match base {
                    Some(Record::Snippet(b)) => Some(b),
                    _ => None,
                };
                Record::Snippet(Snippet {
                    path: l.path.clone(),
                    name: pick_str(b.map(|b| b.name.as_str()), &l.name, &r.name, policy),
                    code: l.code.clone(),
                    language: pick_str(
                        b.map(|b| b.language.as_str()),
                        &l.language,
                        &r.language,
                        policy,
                    ),
                    file_name: pick_str(
                        b.map(|b| b.file_name.as_str()),
                        &l.file_name,
                        &r.file_name,
                        policy,
                    ),
                    file_path: pick_str(
                        b.map(|b| b.file_path.as_str()),
                        &l.file_path,
                        &r.file_path,
                        policy,
                    ),
                    category: pick_str(
                        b.map(|b| b.category.as_str()),
                        &l.category,
                        &r.category,
                        policy,
                    ),
                    order: pick_value(b.map(|b| b.order), l.order, r.order, policy),
                    create_time: pick_value(
                        b.map(|b| b.create_time),
                        l.create_time,
                        r.create_time,
                        policy,
                    ),
                })
            }
            (Record::Directory(l), Record::Directory(r)) => {
                let b = match base {
                    Some(Record::Directory(b)) => Some(b),
                    _ => None,
                };
                Record::Directory(Directory {
                    path: l.path.clone(),
                    name: pick_str(b.map(|b| b.name.as_str()), &l.name, &r.name, policy),
                    order: pick_value(b.map(|b| b.order), l.order, r.order, policy),
                })
            }
            // Kind mismatch: local identity wins outright.
            _ => local.clone(),
        }
    }
}

/// The comparable scalar fields of a record, name/value rendered.
///
/// Both variants produce a fixed ordering so two same-kind records can be
/// zipped positionally.
fn scalar_fields(record: &Record) -> Vec<(&'static str, String)> {
    match record {
        Record::Snippet(s) => vec![
            ("name", s.name.clone()),
            ("language", s.language.clone()),
            ("file_name", s.file_name.clone()),
            ("file_path", s.file_path.clone()),
            ("category", s.category.clone()),
            ("order", s.order.to_string()),
            ("create_time", s.create_time.to_rfc3339()),
        ],
        Record::Directory(d) => vec![
            ("name", d.name.clone()),
            ("order", d.order.to_string()),
        ],
    }
}

fn pick_str(base: Option<&str>, local: &str, remote: &str, policy: FieldMergePolicy) -> String {
    if let Some(base) = base {
        if local == base {
            return remote.to_string();
        }
        if remote == base {
            return local.to_string();
        }
    }
    if local == remote {
        return local.to_string();
    }
    if local.is_empty() {
        return remote.to_string();
    }
    if remote.is_empty() {
        return local.to_string();
    }
    match policy {
        FieldMergePolicy::PreferRemote => remote.to_string(),
        FieldMergePolicy::PreferLocal => local.to_string(),
    }
}

fn pick_value<T: PartialEq + Copy>(
    base: Option<T>,
    local: T,
    remote: T,
    policy: FieldMergePolicy,
) -> T {
    if let Some(base) = base {
        if local == base {
            return remote;
        }
        if remote == base {
            return local;
        }
    }
    match policy {
        FieldMergePolicy::PreferRemote => remote,
        FieldMergePolicy::PreferLocal => local,
    }
}
