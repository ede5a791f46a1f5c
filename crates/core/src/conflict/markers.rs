//! Conflict marker format, validation, and side extraction.
//!
//! The marker text format is bit-exact and must round-trip through external
//! editors:
//!
//! ```text
//! <<<<<<< LOCAL (description) [conflict-id]
//! <local lines>
//! =======
//! <remote lines>
//! >>>>>>> REMOTE (description) [conflict-id]
//! ```
//!
//! The conflict-id is an opaque correlation token unique per region within
//! one artifact. It exists only so validation can check that start and end
//! markers pair up; it never affects the semantic merged text.

/// Separator between the local and remote block of a region.
pub const SEPARATOR: &str = "=======";

const START_PREFIX: &str = "<<<<<<< LOCAL (";
const END_PREFIX: &str = ">>>>>>> REMOTE (";

/// Render the opening marker line for a region.
pub fn start_marker(description: &str, id: &str) -> String {
    format!("<<<<<<< LOCAL ({description}) [{id}]")
}

/// Render the closing marker line for a region.
pub fn end_marker(description: &str, id: &str) -> String {
    format!(">>>>>>> REMOTE ({description}) [{id}]")
}

/// Whether a line opens a conflict region.
pub fn is_start(line: &str) -> bool {
    line.starts_with(START_PREFIX)
}

/// Whether a line closes a conflict region.
pub fn is_end(line: &str) -> bool {
    line.starts_with(END_PREFIX)
}

/// The correlation token carried by a start or end marker line.
pub fn marker_id(line: &str) -> Option<&str> {
    let open = line.rfind('[')?;
    let close = line.rfind(']')?;
    if close > open {
        Some(&line[open + 1..close])
    } else {
        None
    }
}

/// Validate a finalized artifact.
///
/// Returns one message per problem; an empty list means the content is
/// marker-free and structurally sound. Leftover markers are themselves
/// errors (the user has not finished resolving), and structural damage
/// (separator outside a region, mismatched ids, missing end marker) is
/// reported specifically so the artifact can be re-presented with guidance.
///
/// A bare `=======` line outside any open region is ignored: it is legal
/// file content (a setext underline, for instance), and only becomes
/// structural inside a region.
pub fn validate_resolved(content: &str) -> Vec<String> {
    let mut errors = Vec::new();
    // (line number, id) of the currently open region.
    let mut open: Option<(usize, String)> = None;
    let mut seen_separator = false;

    for (idx, line) in content.lines().enumerate() {
        let lineno = idx + 1;
        if is_start(line) {
            errors.push(format!("line {lineno}: unresolved conflict start marker"));
            if let Some((open_line, _)) = open {
                errors.push(format!(
                    "line {lineno}: nested start marker inside region opened at line {open_line}"
                ));
            }
            open = Some((lineno, marker_id(line).unwrap_or("").to_string()));
            seen_separator = false;
        } else if line == SEPARATOR {
            if open.is_some() {
                if seen_separator {
                    errors.push(format!("line {lineno}: duplicate separator in conflict region"));
                } else {
                    errors.push(format!("line {lineno}: unresolved conflict separator"));
                    seen_separator = true;
                }
            }
        } else if is_end(line) {
            errors.push(format!("line {lineno}: unresolved conflict end marker"));
            match open.take() {
                None => {
                    errors.push(format!(
                        "line {lineno}: end marker without a preceding start marker"
                    ));
                }
                Some((open_line, open_id)) => {
                    if !seen_separator {
                        errors.push(format!(
                            "line {lineno}: end marker before the region separator"
                        ));
                    }
                    let end_id = marker_id(line).unwrap_or("");
                    if end_id != open_id {
                        errors.push(format!(
                            "line {lineno}: end marker id '{end_id}' does not match start marker \
                             id '{open_id}' from line {open_line}"
                        ));
                    }
                }
            }
            seen_separator = false;
        }
    }

    if let Some((open_line, _)) = open {
        errors.push(format!(
            "conflict region opened at line {open_line} is never closed"
        ));
    }

    errors
}

/// Which side of a conflict region to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

/// Resolve every conflict region in `content` by keeping one side.
///
/// Lines outside regions pass through untouched. Used to honor whole-sided
/// abandon decisions and by callers that want a quick "take mine/theirs"
/// rendering of a marked artifact.
pub fn take_side(content: &str, side: Side) -> String {
    #[derive(PartialEq)]
    enum Zone {
        Outside,
        LocalBlock,
        RemoteBlock,
    }

    let mut zone = Zone::Outside;
    let mut out: Vec<&str> = Vec::new();

    for line in content.lines() {
        match zone {
            Zone::Outside => {
                if is_start(line) {
                    zone = Zone::LocalBlock;
                } else {
                    out.push(line);
                }
            }
            Zone::LocalBlock => {
                if line == SEPARATOR {
                    zone = Zone::RemoteBlock;
                } else if side == Side::Local {
                    out.push(line);
                }
            }
            Zone::RemoteBlock => {
                if is_end(line) {
                    zone = Zone::Outside;
                } else if side == Side::Remote {
                    out.push(line);
                }
            }
        }
    }

    let mut text = out.join("\n");
    if content.ends_with('\n') && !text.is_empty() {
        text.push('\n');
    }
    text
}
