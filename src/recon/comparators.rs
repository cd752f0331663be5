//! The ordered field comparators shared by content and elimination matching.
//!
//! Each comparator is a pure function over one (stored comment, sheet row)
//! pair. The order of [COMPARATORS] is significant: elimination matching
//! applies them front to back and rotates the list when a pass empties the
//! candidate pool, so a single edited field cannot block a row for good.

use lazy_static::lazy_static;
use regex::Regex;

use crate::recon::sheet::{cell, SheetRow};
use crate::recon::CommentRecord;

pub(crate) type Comparator = fn(&CommentRecord, &SheetRow) -> bool;

pub(crate) const COMPARATORS: [(&str, Comparator); 6] = [
    ("category", category_matches),
    ("clause", clause_matches),
    ("page", page_matches),
    ("line", line_matches),
    ("comment", comment_matches),
    ("proposed-change", proposed_change_matches),
];

fn category_matches(c: &CommentRecord, r: &SheetRow) -> bool {
    c.category.trim().eq_ignore_ascii_case(cell(&r.category).trim())
}

fn clause_matches(c: &CommentRecord, r: &SheetRow) -> bool {
    let a = clause_key(&c.clause);
    let b = clause_key(cell(&r.clause));
    // Legacy exports truncated the clause column, so a shared prefix is
    // accepted in either direction.
    a == b || (!a.is_empty() && !b.is_empty() && (a.starts_with(&b) || b.starts_with(&a)))
}

fn page_matches(c: &CommentRecord, r: &SheetRow) -> bool {
    numeric_text_eq(&c.page, cell(&r.page))
}

fn line_matches(c: &CommentRecord, r: &SheetRow) -> bool {
    numeric_text_eq(&c.line, cell(&r.line))
}

fn comment_matches(c: &CommentRecord, r: &SheetRow) -> bool {
    canon_text(&c.comment) == canon_text(cell(&r.comment))
}

fn proposed_change_matches(c: &CommentRecord, r: &SheetRow) -> bool {
    canon_text(&c.proposed_change) == canon_text(cell(&r.proposed_change))
}

/// Normalizes a clause number: trailing dot dropped, zero-padding removed
/// segment by segment, so "05.2." compares equal to "5.2".
pub(crate) fn clause_key(raw: &str) -> String {
    raw.trim()
        .trim_end_matches('.')
        .split('.')
        .map(|segment| {
            let stripped = segment.trim().trim_start_matches('0');
            if stripped.is_empty() && !segment.trim().is_empty() {
                "0"
            } else {
                stripped
            }
        })
        .collect::<Vec<&str>>()
        .join(".")
}

/// Page/line tolerance: "10", "10.0" and " 10 " all agree, while values
/// that never were numbers ("n/a", legacy artifacts) fall back to exact
/// text equality.
pub(crate) fn numeric_text_eq(a: &str, b: &str) -> bool {
    let (ta, tb) = (a.trim(), b.trim());
    if ta == tb {
        return true;
    }
    match (ta.parse::<f64>(), tb.parse::<f64>()) {
        (Ok(x), Ok(y)) => (x - y).abs() < 1e-6,
        _ => false,
    }
}

// Artifacts observed on rows that went through the legacy upload path:
// windows-1252 text re-decoded as UTF-8, plus HTML entities left in cells.
// The table is a best-effort heuristic, not a guaranteed decode.
const SUBSTITUTIONS: [(&str, &str); 15] = [
    ("&amp;", "&"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&nbsp;", " "),
    ("\u{e2}\u{20ac}\u{2122}", "'"),  // â€™
    ("\u{e2}\u{20ac}\u{2dc}", "'"),   // â€˜
    ("\u{e2}\u{20ac}\u{153}", "\""),  // â€œ
    ("\u{e2}\u{20ac}\u{9d}", "\""),   // â€ + 0x9d
    ("\u{e2}\u{20ac}\u{201c}", "-"),  // â€“
    ("\u{e2}\u{20ac}\u{201d}", "-"),  // â€”
    ("\u{e2}\u{20ac}\u{a6}", "..."), // â€¦
    ("\u{c2}\u{a0}", " "),            // Â + nbsp
];

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new("[^A-Za-z0-9]+").unwrap();
}

/// Canonical form for free-text comparison: known mangling artifacts are
/// substituted, then everything outside ASCII alphanumerics is stripped,
/// spaces included.
pub(crate) fn canon_text(raw: &str) -> String {
    let mut s = raw.to_string();
    for (from, to) in SUBSTITUTIONS {
        if s.contains(from) {
            s = s.replace(from, to);
        }
    }
    NON_ALNUM.replace_all(&s, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::testing::{comment, row_for};

    #[test]
    fn clause_keys_drop_padding_and_trailing_dots() {
        assert_eq!(clause_key("05.2."), "5.2");
        assert_eq!(clause_key("5.2"), "5.2");
        assert_eq!(clause_key("10.04.0"), "10.4.0");
        assert_eq!(clause_key(""), "");
    }

    #[test]
    fn truncated_clauses_still_match() {
        let c = comment(1, "T", "11.4.3.8", "10", "3");
        let mut r = row_for(&c);
        r.clause = Some("11.4.3".to_string());
        assert!(clause_matches(&c, &r));
        r.clause = Some("12".to_string());
        assert!(!clause_matches(&c, &r));
    }

    #[test]
    fn pages_tolerate_float_rendering() {
        assert!(numeric_text_eq("10", "10.0"));
        assert!(numeric_text_eq(" 10 ", "10"));
        assert!(numeric_text_eq("n/a", "n/a"));
        assert!(!numeric_text_eq("10", "11"));
        assert!(!numeric_text_eq("n/a", "10"));
    }

    #[test]
    fn canon_text_survives_mangling_and_noise() {
        // The right single quote as windows-1252 mojibake.
        let mangled = "don\u{e2}\u{20ac}\u{2122}t panic";
        assert_eq!(canon_text(mangled), canon_text("don't panic"));
        // Whitespace and punctuation never decide a match.
        assert_eq!(canon_text("Fix, the typo!"), canon_text("Fix the typo"));
        assert_eq!(canon_text("&quot;quoted&quot;"), canon_text("\"quoted\""));
        assert_ne!(canon_text("Fix the typo"), canon_text("Fix the typos"));
    }

    #[test]
    fn category_is_case_insensitive_exactness() {
        let c = comment(1, "T", "5.2", "10", "3");
        let mut r = row_for(&c);
        r.category = Some(" t ".to_string());
        assert!(category_matches(&c, &r));
        r.category = Some("G".to_string());
        assert!(!category_matches(&c, &r));
    }
}
