//! Two-way and three-way line-based text merging.
//!
//! The engine produces a [`MergeOutcome`] in every case. Two-way merges
//! union one-sided hunks and wrap overlapping hunks in conflict markers, up
//! to a configurable hunk limit beyond which partial markup is abandoned.
//! Three-way merges run a diff3 strategy (common prefix/suffix trim, then a
//! chunk walk over per-side diffs against the base); if that strategy hits
//! an internal inconsistency, a positional per-line comparison guarantees a
//! result. No failure propagates to the caller.
//!
//! Output is deterministic: identical inputs produce byte-identical text,
//! and conflict-region ids are sequential tokens (`c1`, `c2`, ...) that
//! carry no meaning beyond marker-balance validation.

use similar::{capture_diff_slices, Algorithm, DiffOp};
use tracing::{debug, warn};

use crate::conflict::markers;
use crate::errors::MergeError;
use crate::models::{ConflictRegion, MergeOutcome};

/// Default number of conflicting hunks a two-way merge will mark up.
pub const DEFAULT_CONFLICT_HUNK_LIMIT: usize = 3;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless line-based merge engine.
///
/// Safe to share and call concurrently; all configuration is fixed at
/// construction.
#[derive(Debug, Clone)]
pub struct TextMergeEngine {
    local_label: String,
    remote_label: String,
    conflict_hunk_limit: usize,
}

impl Default for TextMergeEngine {
    fn default() -> Self {
        Self {
            local_label: "local".to_string(),
            remote_label: "remote".to_string(),
            conflict_hunk_limit: DEFAULT_CONFLICT_HUNK_LIMIT,
        }
    }
}

impl TextMergeEngine {
    pub fn new(conflict_hunk_limit: usize) -> Self {
        Self {
            conflict_hunk_limit,
            ..Self::default()
        }
    }

    /// Use custom side descriptions in marker lines (e.g. a record path).
    pub fn with_labels(mut self, local: impl Into<String>, remote: impl Into<String>) -> Self {
        self.local_label = local.into();
        self.remote_label = remote.into();
        self
    }

    /// Merge two versions with no common ancestor.
    ///
    /// Hunks present on exactly one side are kept (without a base, a
    /// one-sided hunk cannot be told apart from a deletion on the other
    /// side, and content is never silently dropped). Hunks where both sides
    /// changed the same region are wrapped in markers; above the configured
    /// hunk limit the merge fails outright instead of producing markup.
    pub fn two_way_merge(&self, local: &str, remote: &str) -> MergeOutcome {
        if local == remote {
            return MergeOutcome::merged(local);
        }

        let local_lines: Vec<&str> = local.lines().collect();
        let remote_lines: Vec<&str> = remote.lines().collect();
        let ops = capture_diff_slices(Algorithm::Myers, &local_lines, &remote_lines);

        let conflicting = ops
            .iter()
            .filter(|op| matches!(op, DiffOp::Replace { .. }))
            .count();
        if conflicting > self.conflict_hunk_limit {
            debug!(
                conflicting,
                limit = self.conflict_hunk_limit,
                "two-way merge exceeds hunk limit, failing"
            );
            return MergeOutcome::failed();
        }

        let mut out: Vec<String> = Vec::new();
        let mut regions = Vec::new();
        let mut counter = 0usize;

        for op in &ops {
            match *op {
                DiffOp::Equal { old_index, len, .. } => {
                    extend_lines(&mut out, &local_lines[old_index..old_index + len]);
                }
                // Lines only present in local.
                DiffOp::Delete {
                    old_index, old_len, ..
                } => {
                    extend_lines(&mut out, &local_lines[old_index..old_index + old_len]);
                }
                // Lines only present in remote.
                DiffOp::Insert {
                    new_index, new_len, ..
                } => {
                    extend_lines(&mut out, &remote_lines[new_index..new_index + new_len]);
                }
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => {
                    self.push_region(
                        &mut out,
                        &mut regions,
                        &mut counter,
                        &local_lines[old_index..old_index + old_len],
                        &remote_lines[new_index..new_index + new_len],
                    );
                }
            }
        }

        let text = join_lines(out, local.ends_with('\n') || remote.ends_with('\n'));
        if regions.is_empty() {
            MergeOutcome::merged(text)
        } else {
            MergeOutcome::marked(text, regions)
        }
    }

    /// Merge two versions against their common ancestor.
    ///
    /// The primary diff3 strategy never surfaces its internal errors: on
    /// failure the positional per-line fallback produces a result instead.
    pub fn three_way_merge(&self, local: &str, remote: &str, base: &str) -> MergeOutcome {
        match self.diff3(local, remote, base) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "diff3 strategy failed, using positional fallback");
                self.positional_fallback(local, remote, base)
            }
        }
    }

    // -- primary diff3 strategy ---------------------------------------------

    fn diff3(&self, local: &str, remote: &str, base: &str) -> Result<MergeOutcome, MergeError> {
        // Fast paths: one side unchanged, or both made the same change.
        if local == remote {
            return Ok(MergeOutcome::merged(local));
        }
        if local == base {
            return Ok(MergeOutcome::merged(remote));
        }
        if remote == base {
            return Ok(MergeOutcome::merged(local));
        }

        let base_lines: Vec<&str> = base.lines().collect();
        let local_lines: Vec<&str> = local.lines().collect();
        let remote_lines: Vec<&str> = remote.lines().collect();

        // Trim the maximal common prefix and suffix shared by all three;
        // only the interior span participates in the diff.
        let min_len = base_lines
            .len()
            .min(local_lines.len())
            .min(remote_lines.len());
        let mut prefix = 0;
        while prefix < min_len
            && base_lines[prefix] == local_lines[prefix]
            && base_lines[prefix] == remote_lines[prefix]
        {
            prefix += 1;
        }
        let mut suffix = 0;
        while suffix < min_len - prefix
            && base_lines[base_lines.len() - 1 - suffix] == local_lines[local_lines.len() - 1 - suffix]
            && base_lines[base_lines.len() - 1 - suffix]
                == remote_lines[remote_lines.len() - 1 - suffix]
        {
            suffix += 1;
        }

        let base_mid = &base_lines[prefix..base_lines.len() - suffix];
        let local_mid = &local_lines[prefix..local_lines.len() - suffix];
        let remote_mid = &remote_lines[prefix..remote_lines.len() - suffix];

        let local_chunks = change_chunks(&capture_diff_slices(
            Algorithm::Myers,
            base_mid,
            local_mid,
        ));
        let remote_chunks = change_chunks(&capture_diff_slices(
            Algorithm::Myers,
            base_mid,
            remote_mid,
        ));

        let mut out: Vec<String> = buffer_from(&base_lines[..prefix]);
        let mut regions = Vec::new();
        let mut counter = 0usize;

        self.walk_chunks(
            base_mid,
            local_mid,
            remote_mid,
            &local_chunks,
            &remote_chunks,
            &mut out,
            &mut regions,
            &mut counter,
        )?;

        extend_lines(&mut out, &base_lines[base_lines.len() - suffix..]);

        let text = join_lines(
            out,
            local.ends_with('\n') || remote.ends_with('\n') || base.ends_with('\n'),
        );
        if regions.is_empty() {
            Ok(MergeOutcome::merged(text))
        } else {
            Ok(MergeOutcome::marked(text, regions))
        }
    }

    /// Walk both sides' change chunks over the shared base interior,
    /// clustering overlapping chunks and resolving each cluster.
    #[allow(clippy::too_many_arguments)]
    fn walk_chunks(
        &self,
        base: &[&str],
        local: &[&str],
        remote: &[&str],
        local_chunks: &[Chunk],
        remote_chunks: &[Chunk],
        out: &mut Vec<String>,
        regions: &mut Vec<ConflictRegion>,
        counter: &mut usize,
    ) -> Result<(), MergeError> {
        let mut base_cursor = 0usize;
        let mut li = 0usize;
        let mut ri = 0usize;
        // Cumulative (side length - base length) of consumed chunks, used to
        // map base indices into each side.
        let mut local_offset = 0isize;
        let mut remote_offset = 0isize;

        loop {
            let next_local = local_chunks.get(li);
            let next_remote = remote_chunks.get(ri);

            // Seed the next cluster with the chunk that starts first;
            // shorter base spans first, local before remote on a full tie.
            let seed_from_local = match (next_local, next_remote) {
                (None, None) => {
                    let tail = base
                        .get(base_cursor..)
                        .ok_or_else(|| invariant("base cursor past end"))?;
                    extend_lines(out, tail);
                    return Ok(());
                }
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(l), Some(r)) => {
                    (l.base_start, l.base_end) <= (r.base_start, r.base_end)
                }
            };

            let seed = if seed_from_local {
                li += 1;
                local_chunks[li - 1]
            } else {
                ri += 1;
                remote_chunks[ri - 1]
            };

            if seed.base_start < base_cursor {
                return Err(invariant("chunk starts before cursor"));
            }
            let unchanged = base
                .get(base_cursor..seed.base_start)
                .ok_or_else(|| invariant("unchanged span out of bounds"))?;
            extend_lines(out, unchanged);

            // Grow the cluster while either side's next chunk overlaps it.
            let mut cluster_start = seed.base_start;
            let mut cluster_end = seed.base_end;
            let mut local_in: Vec<Chunk> = Vec::new();
            let mut remote_in: Vec<Chunk> = Vec::new();
            if seed_from_local {
                local_in.push(seed);
            } else {
                remote_in.push(seed);
            }
            loop {
                if let Some(c) = local_chunks.get(li) {
                    if ranges_overlap((cluster_start, cluster_end), (c.base_start, c.base_end)) {
                        cluster_start = cluster_start.min(c.base_start);
                        cluster_end = cluster_end.max(c.base_end);
                        local_in.push(*c);
                        li += 1;
                        continue;
                    }
                }
                if let Some(c) = remote_chunks.get(ri) {
                    if ranges_overlap((cluster_start, cluster_end), (c.base_start, c.base_end)) {
                        cluster_start = cluster_start.min(c.base_start);
                        cluster_end = cluster_end.max(c.base_end);
                        remote_in.push(*c);
                        ri += 1;
                        continue;
                    }
                }
                break;
            }

            let local_delta: isize = local_in.iter().map(Chunk::delta).sum();
            let remote_delta: isize = remote_in.iter().map(Chunk::delta).sum();

            let base_slice = base
                .get(cluster_start..cluster_end)
                .ok_or_else(|| invariant("cluster base span out of bounds"))?;
            let local_slice = side_slice(local, cluster_start, cluster_end, local_offset, local_delta)?;
            let remote_slice =
                side_slice(remote, cluster_start, cluster_end, remote_offset, remote_delta)?;

            let local_changed = local_slice != base_slice;
            let remote_changed = remote_slice != base_slice;
            if !local_changed {
                extend_lines(out, remote_slice);
            } else if !remote_changed || local_slice == remote_slice {
                extend_lines(out, local_slice);
            } else {
                self.push_region(out, regions, counter, local_slice, remote_slice);
            }

            local_offset += local_delta;
            remote_offset += remote_delta;
            base_cursor = cluster_end;
        }
    }

    // -- positional fallback ------------------------------------------------

    /// Per-line three-way comparison that always yields a result.
    ///
    /// Less precise than diff3 (no alignment across insertions), but total:
    /// every index either resolves to one side or lands in a marker region.
    fn positional_fallback(&self, local: &str, remote: &str, base: &str) -> MergeOutcome {
        let base_lines: Vec<&str> = base.lines().collect();
        let local_lines: Vec<&str> = local.lines().collect();
        let remote_lines: Vec<&str> = remote.lines().collect();
        let max_len = base_lines.len().max(local_lines.len()).max(remote_lines.len());

        let mut out: Vec<String> = Vec::new();
        let mut regions = Vec::new();
        let mut counter = 0usize;

        let mut i = 0;
        while i < max_len {
            let b = base_lines.get(i).copied();
            let l = local_lines.get(i).copied();
            let r = remote_lines.get(i).copied();

            match (l, r) {
                (Some(l), Some(r)) if l == r => {
                    out.push(l.to_string());
                    i += 1;
                }
                (Some(l), Some(r)) if Some(l) == b => {
                    // Local unchanged at this position, remote's line wins.
                    out.push(r.to_string());
                    i += 1;
                }
                (Some(l), Some(r)) if Some(r) == b => {
                    out.push(l.to_string());
                    i += 1;
                }
                (Some(_), Some(_)) => {
                    // Both changed this position: collect the contiguous
                    // disputed run on each side.
                    let mut local_block = Vec::new();
                    let mut remote_block = Vec::new();
                    let mut j = i;
                    while j < max_len {
                        let bj = base_lines.get(j).copied();
                        let lj = local_lines.get(j).copied();
                        let rj = remote_lines.get(j).copied();
                        let disputed = match (lj, rj) {
                            (Some(lj), Some(rj)) => lj != rj && Some(lj) != bj && Some(rj) != bj,
                            _ => false,
                        };
                        if !disputed {
                            break;
                        }
                        if let Some(lj) = lj {
                            local_block.push(lj);
                        }
                        if let Some(rj) = rj {
                            remote_block.push(rj);
                        }
                        j += 1;
                    }
                    self.push_region(&mut out, &mut regions, &mut counter, &local_block, &remote_block);
                    i = j;
                }
                (Some(l), None) => {
                    // Remote has no line here; keep local's unless it is an
                    // unchanged base line the remote side deleted.
                    if Some(l) != b {
                        out.push(l.to_string());
                    }
                    i += 1;
                }
                (None, Some(r)) => {
                    if Some(r) != b {
                        out.push(r.to_string());
                    }
                    i += 1;
                }
                (None, None) => {
                    i += 1;
                }
            }
        }

        let text = join_lines(
            out,
            local.ends_with('\n') || remote.ends_with('\n') || base.ends_with('\n'),
        );
        if regions.is_empty() {
            MergeOutcome::merged(text)
        } else {
            MergeOutcome::marked(text, regions)
        }
    }

    // -- shared rendering ---------------------------------------------------

    fn push_region(
        &self,
        out: &mut Vec<String>,
        regions: &mut Vec<ConflictRegion>,
        counter: &mut usize,
        local_block: &[&str],
        remote_block: &[&str],
    ) {
        *counter += 1;
        let id = format!("c{counter}");
        let start_line = out.len() + 1;
        out.push(markers::start_marker(&self.local_label, &id));
        extend_lines(out, local_block);
        out.push(markers::SEPARATOR.to_string());
        extend_lines(out, remote_block);
        out.push(markers::end_marker(&self.remote_label, &id));
        regions.push(ConflictRegion {
            id,
            start_line,
            end_line: out.len(),
        });
    }
}

// ---------------------------------------------------------------------------
// Chunk plumbing
// ---------------------------------------------------------------------------

/// A changed region of one side relative to the base: base lines
/// `[base_start, base_end)` were replaced by that side's lines
/// `[side_start, side_end)`. Pure insertions have an empty base range.
#[derive(Debug, Clone, Copy)]
struct Chunk {
    base_start: usize,
    base_end: usize,
    side_start: usize,
    side_end: usize,
}

impl Chunk {
    fn delta(&self) -> isize {
        (self.side_end - self.side_start) as isize - (self.base_end - self.base_start) as isize
    }
}

fn change_chunks(ops: &[DiffOp]) -> Vec<Chunk> {
    ops.iter()
        .filter_map(|op| match *op {
            DiffOp::Equal { .. } => None,
            DiffOp::Delete {
                old_index,
                old_len,
                new_index,
            } => Some(Chunk {
                base_start: old_index,
                base_end: old_index + old_len,
                side_start: new_index,
                side_end: new_index,
            }),
            DiffOp::Insert {
                old_index,
                new_index,
                new_len,
            } => Some(Chunk {
                base_start: old_index,
                base_end: old_index,
                side_start: new_index,
                side_end: new_index + new_len,
            }),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => Some(Chunk {
                base_start: old_index,
                base_end: old_index + old_len,
                side_start: new_index,
                side_end: new_index + new_len,
            }),
        })
        .collect()
}

/// Whether two base-coordinate ranges dispute the same region.
///
/// Empty ranges are insertion points: two insertions at the same point
/// dispute it, and an insertion strictly inside another range disputes it,
/// but an insertion at a range's boundary does not.
fn ranges_overlap(a: (usize, usize), b: (usize, usize)) -> bool {
    let (a_start, a_end) = a;
    let (b_start, b_end) = b;
    if a_start == a_end && b_start == b_end {
        return a_start == b_start;
    }
    if a_start == a_end {
        return b_start < a_start && a_start < b_end;
    }
    if b_start == b_end {
        return a_start < b_start && b_start < a_end;
    }
    a_start < b_end && b_start < a_end
}

fn side_slice<'a>(
    side: &'a [&'a str],
    cluster_start: usize,
    cluster_end: usize,
    offset: isize,
    delta: isize,
) -> Result<&'a [&'a str], MergeError> {
    let start = cluster_start as isize + offset;
    let end = cluster_end as isize + offset + delta;
    if start < 0 || end < start {
        return Err(invariant("negative side span"));
    }
    side.get(start as usize..end as usize)
        .ok_or_else(|| invariant("side span out of bounds"))
}

fn invariant(detail: &str) -> MergeError {
    MergeError::PrimaryStrategyFailed(detail.to_string())
}

fn extend_lines(out: &mut Vec<String>, lines: &[&str]) {
    out.extend(lines.iter().map(|l| (*l).to_string()));
}

fn buffer_from(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| (*l).to_string()).collect()
}

fn join_lines(lines: Vec<String>, trailing_newline: bool) -> String {
    let mut text = lines.join("\n");
    if trailing_newline && !text.is_empty() {
        text.push('\n');
    }
    text
}
