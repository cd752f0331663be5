//! The untrusted row shape parsed out of an uploaded spreadsheet.
//!
//! Decoding the file itself (xlsx/csv cell handling) happens upstream; this
//! module only deals with the semantic row. Nothing here is trusted: the
//! CID may be missing, a float, or free text, and none of the fields carry
//! a reliable link to stored identifiers.

/// One uploaded comment row. Absent columns are `None`; present-but-empty
/// cells are `Some("")` and count as a value when diffing.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SheetRow {
    pub cid: Option<String>,
    pub commenter: Option<String>,
    pub category: Option<String>,
    pub clause: Option<String>,
    pub page: Option<String>,
    pub line: Option<String>,
    pub comment: Option<String>,
    pub proposed_change: Option<String>,
    pub ad_hoc: Option<String>,
    pub comment_group: Option<String>,
    pub notes: Option<String>,
    pub assignee: Option<String>,
    pub submission: Option<String>,
    pub resn_status: Option<String>,
    pub resolution: Option<String>,
    pub ready_for_motion: Option<String>,
    pub approved_by_motion: Option<String>,
    pub edit_status: Option<String>,
    pub edit_notes: Option<String>,
    pub edit_in_draft: Option<String>,
}

impl SheetRow {
    /// Parses the CID column as a sequence number. Excel frequently turns
    /// integer columns into floats ("105.0"), so an integral float text is
    /// accepted too.
    pub fn parse_cid(&self) -> Option<u32> {
        let raw = self.cid.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(n) = raw.parse::<u32>() {
            return Some(n);
        }
        match raw.parse::<f64>() {
            Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => Some(f as u32),
            _ => None,
        }
    }

    /// Whether any of the six fields the comparators look at is present.
    pub fn has_matchable_content(&self) -> bool {
        [
            &self.category,
            &self.clause,
            &self.page,
            &self.line,
            &self.comment,
            &self.proposed_change,
        ]
        .iter()
        .any(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Stable label for reports: the CID text when the row has one, the
    /// zero-based row position otherwise.
    pub fn label(&self, index: usize) -> String {
        match self.cid.as_deref().map(str::trim) {
            Some(cid) if !cid.is_empty() => format!("CID {cid}"),
            _ => format!("row {index}"),
        }
    }
}

/// The empty string for an absent cell; comparator shorthand.
pub(crate) fn cell(opt: &Option<String>) -> &str {
    opt.as_deref().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cid_parses_integers_and_integral_floats() {
        let mut row = SheetRow::default();
        for (raw, expected) in [
            ("105", Some(105)),
            (" 105 ", Some(105)),
            ("105.0", Some(105)),
            ("105.5", None),
            ("-3", None),
            ("CID", None),
            ("", None),
        ] {
            row.cid = Some(raw.to_string());
            assert_eq!(row.parse_cid(), expected, "raw {raw:?}");
        }
        row.cid = None;
        assert_eq!(row.parse_cid(), None);
    }

    #[test]
    fn labels_fall_back_to_row_position() {
        let mut row = SheetRow::default();
        assert_eq!(row.label(4), "row 4");
        row.cid = Some("17".to_string());
        assert_eq!(row.label(4), "CID 17");
    }
}
