use crate::models::{ExtractedRecord, FleetEntry, UNKNOWN_OWNER};
use crate::normalize::normalize;

/// Identifiers this short or shorter are too ambiguous to match on.
const MIN_IDENTIFIER_LEN: usize = 4;

pub struct ReconcileSummary {
    pub total: usize,
    pub verified: usize,
    pub unverified: usize,
}

impl ReconcileSummary {
    pub fn of(records: &[ExtractedRecord]) -> Self {
        let verified = records.iter().filter(|r| r.is_verified).count();
        Self {
            total: records.len(),
            verified,
            unverified: records.len() - verified,
        }
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|v| !v.is_empty())
}

/// First roster entry matching `record`, tag before plate.
///
/// Tags match when either normalized form contains the other; plates must be
/// equal after normalization. Ties resolve to roster order.
pub fn find_match<'a>(record: &ExtractedRecord, fleet: &'a [FleetEntry]) -> Option<&'a FleetEntry> {
    let record_tag = normalize(record.tag.as_deref());
    if record_tag.chars().count() > MIN_IDENTIFIER_LEN {
        let hit = fleet.iter().find(|entry| {
            let fleet_tag = normalize(entry.tag.as_deref());
            !fleet_tag.is_empty()
                && (record_tag.contains(&fleet_tag) || fleet_tag.contains(&record_tag))
        });
        if hit.is_some() {
            return hit;
        }
    }

    let record_plate = normalize(Some(&record.plate));
    if record_plate.chars().count() > MIN_IDENTIFIER_LEN {
        return fleet
            .iter()
            .find(|entry| normalize(Some(&entry.plate)) == record_plate);
    }
    None
}

/// Annotate one record against the roster, starting from the extracted
/// identifiers rather than whatever an earlier pass copied in.
pub fn reconcile_record(record: &ExtractedRecord, fleet: &[FleetEntry]) -> ExtractedRecord {
    let original = record.extracted_identity();
    let base = ExtractedRecord {
        plate: original.plate.clone(),
        owner: original.owner.clone(),
        tag: original.tag.clone(),
        unit_code: String::new(),
        registered_owner: None,
        is_verified: false,
        extracted: Some(original),
        ..record.clone()
    };

    let Some(entry) = find_match(&base, fleet) else {
        return base;
    };

    let plate = if entry.plate.is_empty() {
        base.plate.clone()
    } else {
        entry.plate.clone()
    };
    let owner = if entry.owner.is_empty() || entry.owner == UNKNOWN_OWNER {
        base.owner.clone()
    } else {
        entry.owner.clone()
    };
    let tag = match non_empty(&entry.tag) {
        Some(t) => Some(t.to_string()),
        None => base.tag.clone(),
    };

    ExtractedRecord {
        plate,
        owner,
        tag,
        unit_code: entry.unit_code.clone().unwrap_or_default(),
        registered_owner: Some(entry.owner.clone()),
        is_verified: true,
        ..base
    }
}

/// Annotate every record against the roster. Recomputes from scratch, so
/// records verified against an older roster are re-evaluated too.
pub fn reconcile(records: &[ExtractedRecord], fleet: &[FleetEntry]) -> Vec<ExtractedRecord> {
    records.iter().map(|r| reconcile_record(r, fleet)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(plate: &str, tag: Option<&str>, owner: &str) -> ExtractedRecord {
        ExtractedRecord {
            id: "r1".to_string(),
            plate: plate.to_string(),
            owner: owner.to_string(),
            amount: 100.0,
            concept: "Peaje".to_string(),
            date: Some("2024-05-01".to_string()),
            tag: tag.map(String::from),
            source_file_id: Some("f1".to_string()),
            source_file_name: Some("scan.pdf".to_string()),
            unit_code: String::new(),
            registered_owner: None,
            is_verified: false,
            extracted: None,
        }
    }

    fn entry(plate: &str, owner: &str, tag: Option<&str>, unit: Option<&str>) -> FleetEntry {
        FleetEntry {
            plate: plate.to_string(),
            owner: owner.to_string(),
            tag: tag.map(String::from),
            unit_code: unit.map(String::from),
        }
    }

    #[test]
    fn test_plate_match_end_to_end() {
        let rec = record("AB123CD", Some(""), "?");
        let fleet = vec![entry("AB123CD", "ACME", None, Some("U1"))];
        let out = reconcile(&[rec], &fleet);
        assert!(out[0].is_verified);
        assert_eq!(out[0].owner, "ACME");
        assert_eq!(out[0].unit_code, "U1");
        assert_eq!(out[0].registered_owner.as_deref(), Some("ACME"));
    }

    #[test]
    fn test_plate_match_ignores_formatting() {
        let rec = record("ab-123 cd", None, "?");
        let fleet = vec![entry("AB 123 CD", "ACME", None, None)];
        let out = reconcile_record(&rec, &fleet);
        assert!(out.is_verified);
        assert_eq!(out.plate, "AB 123 CD");
        assert_eq!(out.unit_code, "");
    }

    #[test]
    fn test_plate_requires_exact_equality() {
        let rec = record("AB123C", None, "?");
        let fleet = vec![entry("AB123CD", "ACME", None, None)];
        assert!(!reconcile_record(&rec, &fleet).is_verified);
    }

    #[test]
    fn test_tag_wins_over_plate() {
        let rec = record("AB123CD", Some("TAG99887"), "?");
        let fleet = vec![
            entry("AB123CD", "Plate Owner", None, Some("U1")),
            entry("ZZ999ZZ", "Tag Owner", Some("TAG99887"), Some("U2")),
        ];
        let out = reconcile_record(&rec, &fleet);
        assert_eq!(out.registered_owner.as_deref(), Some("Tag Owner"));
        assert_eq!(out.unit_code, "U2");
        assert_eq!(out.plate, "ZZ999ZZ");
    }

    #[test]
    fn test_tag_substring_is_bidirectional() {
        let fleet = vec![entry("", "Short Tag", Some("AB12"), None)];
        let out = reconcile_record(&record("", Some("AB1234"), "?"), &fleet);
        assert!(out.is_verified);

        let fleet = vec![entry("", "Long Tag", Some("AB1234XY"), None)];
        let out = reconcile_record(&record("", Some("AB-12 34"), "?"), &fleet);
        assert!(out.is_verified);
        assert_eq!(out.registered_owner.as_deref(), Some("Long Tag"));
    }

    #[test]
    fn test_short_record_tag_fed_to_fleet_tag() {
        // Record tag "AB12" is too short to attempt a tag match at all.
        let fleet = vec![entry("", "Long Tag", Some("AB1234XY"), None)];
        assert!(!reconcile_record(&record("", Some("AB12"), "?"), &fleet).is_verified);
    }

    #[test]
    fn test_short_identifiers_never_match() {
        let fleet = vec![entry("AB12", "ACME", Some("T123"), None)];
        assert!(!reconcile_record(&record("AB12", None, "?"), &fleet).is_verified);
        assert!(!reconcile_record(&record("", Some("T123"), "?"), &fleet).is_verified);
        assert!(!reconcile_record(&record("A-B 1 2", None, "?"), &fleet).is_verified);
    }

    #[test]
    fn test_first_match_in_roster_order_wins() {
        let fleet = vec![
            entry("", "First", Some("XX12345"), Some("U1")),
            entry("", "Second", Some("12345YY"), Some("U2")),
        ];
        let out = reconcile_record(&record("", Some("12345"), "?"), &fleet);
        assert_eq!(out.registered_owner.as_deref(), Some("First"));
    }

    #[test]
    fn test_empty_fleet_tag_is_skipped() {
        let fleet = vec![
            entry("", "Blank", Some(""), None),
            entry("", "Real", Some("TAG12345"), None),
        ];
        let out = reconcile_record(&record("", Some("TAG12345"), "?"), &fleet);
        assert_eq!(out.registered_owner.as_deref(), Some("Real"));
    }

    #[test]
    fn test_unknown_owner_sentinel_kept_out_of_owner() {
        let rec = record("AB123CD", None, "Juan Perez");
        let fleet = vec![entry("AB123CD", "Desconocido", None, None)];
        let out = reconcile_record(&rec, &fleet);
        assert_eq!(out.owner, "Juan Perez");
        assert_eq!(out.registered_owner.as_deref(), Some("Desconocido"));
    }

    #[test]
    fn test_fleet_tag_replaces_record_tag_only_when_present() {
        let fleet = vec![entry("AB123CD", "ACME", None, None)];
        let out = reconcile_record(&record("AB123CD", Some("OLD1"), "?"), &fleet);
        assert_eq!(out.tag.as_deref(), Some("OLD1"));

        let fleet = vec![entry("AB123CD", "ACME", Some("NEWTAG"), None)];
        let out = reconcile_record(&record("AB123CD", Some("OLD1"), "?"), &fleet);
        assert_eq!(out.tag.as_deref(), Some("NEWTAG"));
    }

    #[test]
    fn test_no_match_clears_stale_annotation() {
        let mut rec = record("AB123CD", None, "?");
        rec.is_verified = true;
        rec.unit_code = "U9".to_string();
        rec.registered_owner = Some("Old".to_string());
        let out = reconcile_record(&rec, &[]);
        assert!(!out.is_verified);
        assert_eq!(out.unit_code, "");
        assert!(out.registered_owner.is_none());
        assert_eq!(out.plate, rec.plate);
        assert_eq!(out.amount, rec.amount);
        assert_eq!(out.source_file_id, rec.source_file_id);
    }

    #[test]
    fn test_reconcile_is_pure() {
        let records = vec![record("AB123CD", Some("TAG12345"), "?"), record("ZZ", None, "x")];
        let fleet = vec![entry("AB123CD", "ACME", None, Some("U1"))];
        assert_eq!(reconcile(&records, &fleet), reconcile(&records, &fleet));
        let again = reconcile(&reconcile(&records, &fleet), &fleet);
        assert_eq!(again, reconcile(&records, &fleet));
    }

    #[test]
    fn test_short_fleet_tag_survives_second_pass() {
        let fleet = vec![entry("", "ACME", Some("AB12"), Some("U1"))];
        let once = reconcile(&[record("", Some("AB1234"), "?")], &fleet);
        assert!(once[0].is_verified);
        assert_eq!(once[0].tag.as_deref(), Some("AB12"));

        let twice = reconcile(&once, &fleet);
        assert_eq!(twice, once);
        assert!(twice[0].is_verified);
    }

    #[test]
    fn test_lost_match_restores_extracted_identifiers() {
        let fleet = vec![entry("AB123CD", "ACME", Some("TAG55555"), Some("U1"))];
        let matched = reconcile_record(&record("AB-123-CD", None, "Juan"), &fleet);
        assert_eq!(matched.owner, "ACME");
        assert_eq!(matched.plate, "AB123CD");

        let out = reconcile_record(&matched, &[]);
        assert!(!out.is_verified);
        assert_eq!(out.owner, "Juan");
        assert_eq!(out.plate, "AB-123-CD");
        assert_eq!(out.tag, None);
        assert!(out.registered_owner.is_none());
    }

    #[test]
    fn test_roster_swap_matches_on_extracted_plate() {
        let first = vec![entry("ZZ999ZZ", "Tag Owner", Some("TAG12345"), Some("U2"))];
        let matched = reconcile_record(&record("AB123CD", Some("TAG12345"), "?"), &first);
        assert_eq!(matched.plate, "ZZ999ZZ");

        let second = vec![entry("AB123CD", "Plate Owner", None, Some("U1"))];
        let out = reconcile_record(&matched, &second);
        assert_eq!(out.registered_owner.as_deref(), Some("Plate Owner"));
        assert_eq!(out.tag.as_deref(), Some("TAG12345"));
    }

    #[test]
    fn test_summary_counts() {
        let fleet = vec![entry("AB123CD", "ACME", None, None)];
        let out = reconcile(&[record("AB123CD", None, "?"), record("QQ999QQ", None, "?")], &fleet);
        let summary = ReconcileSummary::of(&out);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.unverified, 1);
    }
}
