//! Line-based three-way merge (diff3).
//!
//! # Algorithm
//!
//! 1. Split base, ours, and theirs into lines, keeping terminators.
//! 2. Compute an LCS diff of base→ours and base→theirs ([`similar`],
//!    [`Algorithm::Lcs`]) and record, for every base line, the line it
//!    matches on each side.
//! 3. Walk the three files in lockstep. Base lines matched on both sides at
//!    the expected positions form *stable* runs and are copied through. The
//!    stretch between two stable runs is an *unstable* chunk:
//!    - unchanged on one side: take the other side;
//!    - changed identically on both sides: take either;
//!    - otherwise: conflict.
//! 4. Lines shared at the start and end of both sides of a conflict are
//!    moved outside the markers, so each conflict covers only the lines that
//!    actually disagree.
//!
//! Adjacent edits with no stable line between them conflict.

use std::ops::Range;

use similar::{Algorithm, DiffTag, capture_diff_slices};

use crate::config::{ConflictStyle, Labels};

/// Bytes inspected when sniffing for binary content.
const BINARY_SNIFF_LEN: usize = 8000;

/// `true` if the content looks binary (a NUL byte near the start).
#[must_use]
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

/// Split into lines, each keeping its `\n` (the last may lack one).
#[must_use]
pub fn split_lines(text: &[u8]) -> Vec<&[u8]> {
    text.split_inclusive(|&b| b == b'\n').collect()
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// Conflict marker presentation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Markers {
    pub style: ConflictStyle,
    pub size: usize,
    pub labels: Labels,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            style: ConflictStyle::Merge,
            size: 7,
            labels: Labels::default(),
        }
    }
}

impl Markers {
    /// Append a conflict block for one hunk to `out`.
    ///
    /// Each section is newline-terminated even if its last line was not, so
    /// the markers always start a line.
    pub fn render(&self, out: &mut Vec<u8>, ours: &[u8], base: &[u8], theirs: &[u8]) {
        self.marker_line(out, b'<', Some(&self.labels.ours));
        push_section(out, ours);
        if self.style == ConflictStyle::Diff3 {
            self.marker_line(out, b'|', Some(&self.labels.base));
            push_section(out, base);
        }
        self.marker_line(out, b'=', None);
        push_section(out, theirs);
        self.marker_line(out, b'>', Some(&self.labels.theirs));
    }

    fn marker_line(&self, out: &mut Vec<u8>, ch: u8, label: Option<&str>) {
        out.extend(std::iter::repeat_n(ch, self.size));
        if let Some(label) = label {
            out.push(b' ');
            out.extend_from_slice(label.as_bytes());
        }
        out.push(b'\n');
    }
}

fn push_section(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    if !bytes.is_empty() && !bytes.ends_with(b"\n") {
        out.push(b'\n');
    }
}

// ---------------------------------------------------------------------------
// Merge output
// ---------------------------------------------------------------------------

/// One conflicting region of a text merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictHunk {
    /// Base line range (0-based, end exclusive).
    pub base_lines: Range<usize>,
    pub base: Vec<u8>,
    pub ours: Vec<u8>,
    pub theirs: Vec<u8>,
}

/// Result of [`merge_text`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMerge {
    /// Merged content, with conflict blocks rendered in place.
    pub merged: Vec<u8>,
    /// Conflicting hunks in file order.
    pub conflicts: Vec<ConflictHunk>,
}

impl TextMerge {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

enum Chunk {
    Stable(Range<usize>),
    Unstable {
        base: Range<usize>,
        ours: Range<usize>,
        theirs: Range<usize>,
    },
}

/// Three-way merge of text content.
#[must_use]
pub fn merge_text(base: &[u8], ours: &[u8], theirs: &[u8], markers: &Markers) -> TextMerge {
    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);

    let to_ours = line_matches(&base_lines, &ours_lines);
    let to_theirs = line_matches(&base_lines, &theirs_lines);
    let chunks = chunk(
        (base_lines.len(), ours_lines.len(), theirs_lines.len()),
        &to_ours,
        &to_theirs,
    );

    let mut merged = Vec::with_capacity(ours.len().max(theirs.len()));
    let mut conflicts = Vec::new();
    for c in chunks {
        match c {
            Chunk::Stable(range) => extend_lines(&mut merged, &base_lines[range]),
            Chunk::Unstable {
                base: b_range,
                ours: o_range,
                theirs: t_range,
            } => {
                let b = &base_lines[b_range.clone()];
                let o = &ours_lines[o_range];
                let t = &theirs_lines[t_range];
                if o == b || o == t {
                    extend_lines(&mut merged, t);
                } else if t == b {
                    extend_lines(&mut merged, o);
                } else {
                    let prefix = o.iter().zip(t).take_while(|(x, y)| x == y).count();
                    let suffix = o[prefix..]
                        .iter()
                        .rev()
                        .zip(t[prefix..].iter().rev())
                        .take_while(|(x, y)| x == y)
                        .count();
                    let o_mid = &o[prefix..o.len() - suffix];
                    let t_mid = &t[prefix..t.len() - suffix];

                    extend_lines(&mut merged, &o[..prefix]);
                    let hunk = ConflictHunk {
                        base_lines: b_range,
                        base: b.concat(),
                        ours: o_mid.concat(),
                        theirs: t_mid.concat(),
                    };
                    markers.render(&mut merged, &hunk.ours, &hunk.base, &hunk.theirs);
                    conflicts.push(hunk);
                    extend_lines(&mut merged, &o[o.len() - suffix..]);
                }
            }
        }
    }
    TextMerge { merged, conflicts }
}

/// For each base line, the index of the line it matches in `side`, if any.
fn line_matches(base: &[&[u8]], side: &[&[u8]]) -> Vec<Option<usize>> {
    let mut map = vec![None; base.len()];
    for op in capture_diff_slices(Algorithm::Lcs, base, side) {
        let (tag, old, new) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            for (o, n) in old.zip(new) {
                map[o] = Some(n);
            }
        }
    }
    map
}

/// Split the merge into stable and unstable chunks.
fn chunk(
    (base_len, ours_len, theirs_len): (usize, usize, usize),
    to_ours: &[Option<usize>],
    to_theirs: &[Option<usize>],
) -> Vec<Chunk> {
    let (mut b, mut o, mut t) = (0, 0, 0);
    let mut out = Vec::new();
    loop {
        let mut run = 0;
        while b + run < base_len
            && to_ours[b + run] == Some(o + run)
            && to_theirs[b + run] == Some(t + run)
        {
            run += 1;
        }
        if run > 0 {
            out.push(Chunk::Stable(b..b + run));
            b += run;
            o += run;
            t += run;
        }
        if b >= base_len && o >= ours_len && t >= theirs_len {
            break;
        }

        let (nb, no, nt) = (b..base_len)
            .find_map(|k| Some((k, to_ours[k]?, to_theirs[k]?)))
            .unwrap_or((base_len, ours_len, theirs_len));
        out.push(Chunk::Unstable {
            base: b..nb,
            ours: o..no,
            theirs: t..nt,
        });
        b = nb;
        o = no;
        t = nt;
    }
    out
}

fn extend_lines(out: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        out.extend_from_slice(line);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
