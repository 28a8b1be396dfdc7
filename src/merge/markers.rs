//! Inline conflict marker rendering for manual resolution.
//!
//! When a conflict is left for the user, the file on disk is replaced by a
//! framed document holding both sides:
//!
//! ```text
//! <<<<<<< CURRENT (this workspace)
//! current content
//! =======
//! source content
//! >>>>>>> SOURCE (merging from)
//! ```
//!
//! The delimiters are the literal seven-character markers. A side that does
//! not exist (delete/modify conflicts) is represented by a synthesized
//! placeholder line. Content lacking a terminating newline receives one so
//! the markers always start at column zero.

/// Opening marker line for the current side.
pub const MARKER_CURRENT: &str = "<<<<<<< CURRENT (this workspace)\n";

/// Separator between the two sides.
pub const MARKER_SEPARATOR: &str = "=======\n";

/// Closing marker line for the source side.
pub const MARKER_SOURCE: &str = ">>>>>>> SOURCE (merging from)\n";

/// Render a conflict document from the two sides.
///
/// `None` marks a side where the file does not exist.
#[must_use]
pub fn render_conflict(current: Option<&[u8]>, source: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MARKER_CURRENT.as_bytes());
    push_side(&mut out, current, "(file does not exist in current)\n");
    out.extend_from_slice(MARKER_SEPARATOR.as_bytes());
    push_side(&mut out, source, "(file does not exist in source)\n");
    out.extend_from_slice(MARKER_SOURCE.as_bytes());
    out
}

fn push_side(out: &mut Vec<u8>, side: Option<&[u8]>, placeholder: &str) {
    match side {
        Some(bytes) => {
            out.extend_from_slice(bytes);
            if !bytes.ends_with(b"\n") {
                out.push(b'\n');
            }
        }
        None => out.extend_from_slice(placeholder.as_bytes()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_both_sides() {
        let doc = render_conflict(Some(b"current-version\n"), Some(b"source-version\n"));
        let text = String::from_utf8(doc).unwrap();
        assert_eq!(
            text,
            "<<<<<<< CURRENT (this workspace)\ncurrent-version\n=======\nsource-version\n>>>>>>> SOURCE (merging from)\n"
        );
    }

    #[test]
    fn markers_are_seven_characters() {
        assert!(MARKER_CURRENT.starts_with("<<<<<<< "));
        assert!(MARKER_SOURCE.starts_with(">>>>>>> "));
        assert_eq!(MARKER_SEPARATOR, "=======\n");
    }

    #[test]
    fn missing_newlines_are_added() {
        let doc = render_conflict(Some(b"no newline"), Some(b"also none"));
        let text = String::from_utf8(doc).unwrap();
        assert!(text.contains("no newline\n======="));
        assert!(text.contains("also none\n>>>>>>>"));
    }

    #[test]
    fn absent_current_gets_placeholder() {
        let doc = render_conflict(None, Some(b"added in source\n"));
        let text = String::from_utf8(doc).unwrap();
        assert!(text.contains("(file does not exist in current)\n"));
        assert!(text.contains("added in source"));
    }

    #[test]
    fn absent_source_gets_placeholder() {
        let doc = render_conflict(Some(b"kept here\n"), None);
        let text = String::from_utf8(doc).unwrap();
        assert!(text.contains("(file does not exist in source)\n"));
    }

    #[test]
    fn empty_sides_still_frame() {
        let doc = render_conflict(Some(b""), Some(b""));
        let text = String::from_utf8(doc).unwrap();
        // An empty side renders as an empty line so the frame stays intact.
        assert!(text.starts_with(MARKER_CURRENT));
        assert!(text.ends_with(MARKER_SOURCE));
    }
}
