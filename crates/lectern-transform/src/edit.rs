//! Text edits over a module and the offset mapping they leave behind.
//!
//! Transforms never reprint a module: they replace byte ranges of the
//! source. Every splice records anchors so a position in the output can be
//! traced back to the source it came from.

use std::ops::Range;

/// Replace `range` of the source with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub text: String,
}

impl Edit {
    pub fn new(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::new(at..at, text)
    }

    pub fn remove(range: Range<usize>) -> Self {
        Self::new(range, String::new())
    }
}

/// Start of a stretch of output.
///
/// Copied stretches map byte for byte; generated ones map as a whole to the
/// start of the range they replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub generated: usize,
    pub original: usize,
    pub copied: bool,
}

/// Output to source offsets, as a sorted list of anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapping {
    anchors: Vec<Anchor>,
}

impl Default for SourceMapping {
    fn default() -> Self {
        Self::identity()
    }
}

impl SourceMapping {
    /// Output equal to the source.
    pub fn identity() -> Self {
        Self {
            anchors: vec![Anchor {
                generated: 0,
                original: 0,
                copied: true,
            }],
        }
    }

    /// Output written from scratch; every offset maps to the start.
    pub fn generated() -> Self {
        Self {
            anchors: vec![Anchor {
                generated: 0,
                original: 0,
                copied: false,
            }],
        }
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Source offset of an output offset.
    pub fn original(&self, generated: usize) -> usize {
        let index = self.anchors.partition_point(|a| a.generated <= generated);
        match index.checked_sub(1).map(|i| self.anchors[i]) {
            Some(anchor) if anchor.copied => anchor.original + (generated - anchor.generated),
            Some(anchor) => anchor.original,
            None => 0,
        }
    }

    /// Account for `len` bytes of generated text put in front of the output.
    pub fn prepend(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        for anchor in &mut self.anchors {
            anchor.generated += len;
        }
        self.anchors.insert(
            0,
            Anchor {
                generated: 0,
                original: 0,
                copied: false,
            },
        );
    }

    /// Map through `inner` as well: `self` maps into the output `inner`
    /// was built from.
    pub fn then(&self, inner: &SourceMapping) -> SourceMapping {
        let mut composed = SourceMapping {
            anchors: Vec::with_capacity(self.anchors.len() + inner.anchors.len()),
        };

        for (i, anchor) in self.anchors.iter().enumerate() {
            if !anchor.copied {
                composed.push(Anchor {
                    generated: anchor.generated,
                    original: inner.original(anchor.original),
                    copied: false,
                });
                continue;
            }

            let start = anchor.original;
            let end = self
                .anchors
                .get(i + 1)
                .map(|next| start + (next.generated - anchor.generated));
            composed.push(inner.anchor_at(anchor.generated, start));
            for nested in &inner.anchors {
                let inside = nested.generated > start && end.is_none_or(|end| nested.generated < end);
                if inside {
                    composed.push(Anchor {
                        generated: anchor.generated + (nested.generated - start),
                        ..*nested
                    });
                }
            }
        }
        composed
    }

    /// Anchor at `generated` continuing the stretch that covers `offset`.
    fn anchor_at(&self, generated: usize, offset: usize) -> Anchor {
        let index = self.anchors.partition_point(|a| a.generated <= offset);
        match index.checked_sub(1).map(|i| self.anchors[i]) {
            Some(a) if a.copied => Anchor {
                generated,
                original: a.original + (offset - a.generated),
                copied: true,
            },
            Some(a) => Anchor {
                generated,
                original: a.original,
                copied: false,
            },
            None => Anchor {
                generated,
                original: 0,
                copied: false,
            },
        }
    }

    fn push(&mut self, anchor: Anchor) {
        match self.anchors.last_mut() {
            Some(last) if last.generated == anchor.generated => *last = anchor,
            _ => self.anchors.push(anchor),
        }
    }
}

/// Apply `edits` to `source`. Edits overlapping an earlier one are skipped.
pub fn splice(source: &str, edits: Vec<Edit>) -> (String, SourceMapping) {
    splice_range(source, 0..source.len(), edits)
}

/// Apply `edits` to `source[range]`; edit ranges are offsets into `source`
/// and the mapping is relative to `range.start`.
pub fn splice_range(source: &str, range: Range<usize>, mut edits: Vec<Edit>) -> (String, SourceMapping) {
    edits.sort_by_key(|e| (e.range.start, e.range.end));

    let base = range.start;
    let mut out = String::with_capacity(range.len());
    let mut mapping = SourceMapping {
        anchors: Vec::with_capacity(edits.len() * 2 + 1),
    };
    let mut pos = range.start;

    for edit in edits {
        if edit.range.start < pos || edit.range.end > range.end {
            continue;
        }
        if edit.range.start > pos {
            mapping.push(Anchor {
                generated: out.len(),
                original: pos - base,
                copied: true,
            });
            out.push_str(&source[pos..edit.range.start]);
        }
        if !edit.text.is_empty() {
            mapping.push(Anchor {
                generated: out.len(),
                original: edit.range.start - base,
                copied: false,
            });
            out.push_str(&edit.text);
        }
        pos = edit.range.end;
    }

    mapping.push(Anchor {
        generated: out.len(),
        original: pos - base,
        copied: true,
    });
    out.push_str(&source[pos..range.end]);

    (out, mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn applies_edits_in_order() {
        let src = "import a from 'a';\nexport const b = a;\n";
        let (out, _) = splice(
            src,
            vec![
                Edit::remove(19..26),
                Edit::remove(0..18),
                Edit::new(36..37, "m.a"),
            ],
        );
        assert_eq!(out, "\nconst b = m.a;\n");
    }

    #[test]
    fn maps_output_back_to_source() {
        let src = "let x = A;\nlog(x);\n";
        let (out, mapping) = splice(src, vec![Edit::new(8..9, "\"long value\"")]);
        assert_eq!(out, "let x = \"long value\";\nlog(x);\n");

        assert_eq!(mapping.original(4), 4);
        assert_eq!(mapping.original(12), 8);
        assert_eq!(out.find("log"), Some(22));
        assert_eq!(mapping.original(22), 11);
    }

    #[test]
    fn skips_overlapping_edits() {
        let (out, _) = splice("abcdef", vec![Edit::new(1..4, "X"), Edit::new(2..3, "Y")]);
        assert_eq!(out, "aXef");
    }

    #[test]
    fn composes_mappings() {
        let src = "a = B;\nc();\n";
        let (first, inner) = splice(src, vec![Edit::new(4..5, "1000")]);
        let (mut second, mut outer) = splice(&first, vec![]);
        second.insert_str(0, "header;\n");
        outer.prepend(8);

        let mapping = outer.then(&inner);
        assert_eq!(second, "header;\na = 1000;\nc();\n");
        assert_eq!(mapping.original(0), 0);
        assert_eq!(mapping.original(8 + 4), 4);
        assert_eq!(mapping.original(second.find("c()").unwrap()), 7);
    }
}
