// SPDX-License-Identifier: MIT

//! Final filename shaping
//!
//! Candidates arrive from any tier as free-form strings. This module makes
//! them safe for every common filesystem and applies the configured style
//! rules before the engine touches the disk.

use crate::config::RuleConfig;

/// Characters rejected by at least one mainstream filesystem.
const ILLEGAL_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Name used when sanitization leaves nothing.
const FALLBACK_STEM: &str = "unnamed";

/// Replace illegal characters with `-`, collapse whitespace runs to a single
/// space, trim, and collapse dash runs. Applying it twice changes nothing.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if ILLEGAL_CHARS.contains(&c) || c.is_control() {
            out.push('-');
        } else {
            out.push(c);
        }
    }

    let spaced = out.split_whitespace().collect::<Vec<_>>().join(" ");

    // Collapse dash runs; a dash absorbs its surrounding spaces.
    let mut collapsed = String::with_capacity(spaced.len());
    let mut pending_space = false;
    for c in spaced.chars() {
        match c {
            ' ' => pending_space = true,
            '-' => {
                if !collapsed.ends_with('-') {
                    collapsed.push('-');
                }
                pending_space = false;
            }
            _ => {
                if pending_space && !collapsed.is_empty() && !collapsed.ends_with('-') {
                    collapsed.push(' ');
                }
                pending_space = false;
                collapsed.push(c);
            }
        }
    }

    collapsed.trim_matches('-').to_string()
}

/// Truncate to at most `max` characters (not bytes), so multibyte text is
/// never split inside a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Turns an accepted candidate into the final on-disk filename.
pub struct NameSynthesizer {
    rules: RuleConfig,
}

impl NameSynthesizer {
    pub fn new(rules: RuleConfig) -> Self {
        Self { rules }
    }

    /// Shape `candidate` into `stem.ext`. Style rules (lowercasing, space to
    /// underscore) apply only to heuristic-derived names; model-produced
    /// names keep their casing.
    pub fn finalize(&self, candidate: &str, extension: Option<&str>, heuristic: bool) -> String {
        let ext = extension.map(|e| e.to_lowercase());

        let mut stem = candidate.trim().to_string();
        // Models sometimes echo the extension back.
        if let Some(ref ext) = ext {
            let suffix = format!(".{}", ext);
            let lowered = stem.to_lowercase();
            if lowered.ends_with(&suffix) {
                stem.truncate(stem.len() - suffix.len());
            }
        }

        let mut stem = sanitize(&stem);
        stem = truncate_chars(&stem, self.rules.max_stem_length);

        if heuristic {
            if self.rules.lowercase {
                stem = stem.to_lowercase();
            }
            if self.rules.space_to_underscore {
                stem = stem.replace(' ', "_");
            }
        }

        if stem.is_empty() {
            stem = FALLBACK_STEM.to_string();
        }

        match ext {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesizer() -> NameSynthesizer {
        NameSynthesizer::new(RuleConfig::default())
    }

    #[test]
    fn illegal_characters_become_dashes() {
        assert_eq!(sanitize("a/b\\c:d*e?f\"g<h>i|j"), "a-b-c-d-e-f-g-h-i-j");
    }

    #[test]
    fn whitespace_and_dash_runs_collapse() {
        assert_eq!(sanitize("基金  合同   2025"), "基金 合同 2025");
        assert_eq!(sanitize("基金--合同---2025"), "基金-合同-2025");
        assert_eq!(sanitize("基金 - 合同"), "基金-合同");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "a/b\\c:d",
            "基金  合同 -- 2025",
            "  -- leading and trailing -- ",
            "正常名称-无需修改",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not a fixpoint for {:?}", input);
        }
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let s = "展弘稳进1号7期私募基金";
        assert_eq!(truncate_chars(s, 4), "展弘稳进");
        assert_eq!(truncate_chars(s, 100), s);
    }

    #[test]
    fn model_candidates_keep_casing() {
        let name = synthesizer().finalize("展弘稳进1号-合同-20250822", Some("pdf"), false);
        assert_eq!(name, "展弘稳进1号-合同-20250822.pdf");

        let name = synthesizer().finalize("ACME Fund-合同-20250822", Some("PDF"), false);
        assert_eq!(name, "ACME Fund-合同-20250822.pdf");
    }

    #[test]
    fn heuristic_candidates_get_style_rules() {
        let name = synthesizer().finalize("ACME Fund 合同", Some("pdf"), true);
        assert_eq!(name, "acme_fund_合同.pdf");
    }

    #[test]
    fn duplicated_extension_is_stripped() {
        let name = synthesizer().finalize("合同-20250822.pdf", Some("pdf"), false);
        assert_eq!(name, "合同-20250822.pdf");

        let name = synthesizer().finalize("合同-20250822.PDF", Some("pdf"), false);
        assert_eq!(name, "合同-20250822.pdf");
    }

    #[test]
    fn empty_candidate_falls_back() {
        assert_eq!(synthesizer().finalize("///", Some("jpg"), false), "unnamed.jpg");
        assert_eq!(synthesizer().finalize("  ", None, false), "unnamed");
    }

    #[test]
    fn long_stems_are_truncated() {
        let long = "很".repeat(200);
        let name = synthesizer().finalize(&long, Some("txt"), false);
        let stem = name.strip_suffix(".txt").unwrap();
        assert_eq!(stem.chars().count(), 60);
    }
}
