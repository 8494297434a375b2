//! Raw-to-canonical column projection.
//!
//! Slices the raw frame down to the schema's required positions, in schema
//! order, and renames the slice to the canonical names. Two collision rules
//! apply, in this order:
//!
//! 1. Column-group expansion: a raw header matching a configured repeating
//!    pattern (e.g. a per-channel "base rate" block) renames the following
//!    `span` sibling columns with a suffix taken from the pattern's capture,
//!    so semantically distinct groups never collide.
//! 2. Pandas-style suffixing: any canonical names still duplicated become
//!    `name`, `name.1`, `name.2`, … in order of duplication.

use anyhow::{Result, anyhow};

use crate::{
    schema::{Schema, disambiguate},
    workbook::Frame,
};

pub fn project(frame: &Frame, schema: &Schema) -> Result<Frame> {
    let positions = schema.required_positions();
    if let Some(max) = positions.iter().max() {
        if *max >= frame.column_count() {
            return Err(anyhow!(
                "schema requires column position {} but the sheet only has {} column(s)",
                max + 1,
                frame.column_count()
            ));
        }
    }

    let canonical = expand_groups(frame, schema)?;
    let headers = disambiguate(&canonical);

    let rows = frame
        .rows
        .iter()
        .map(|row| {
            positions
                .iter()
                .map(|&pos| row.get(pos).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(Frame { headers, rows })
}

/// Computes the canonical name of every required column, applying the
/// configured group expansion rules against the raw header labels.
fn expand_groups(frame: &Frame, schema: &Schema) -> Result<Vec<String>> {
    // Suffix per full-schema position, keyed off the raw labels actually
    // present in the sheet (the captured variable lives there, not in the
    // schema's static source labels).
    let mut suffixes: Vec<Option<String>> = vec![None; frame.column_count()];
    for rule in &schema.group_expansions {
        let regex = rule.compile()?;
        for (idx, header) in frame.headers.iter().enumerate() {
            if let Some(captures) = regex.captures(header) {
                let variable = captures
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| {
                        anyhow!("group pattern '{}' captured nothing on '{header}'", rule.pattern)
                    })?;
                for offset in 1..=rule.span {
                    if let Some(slot) = suffixes.get_mut(idx + offset) {
                        *slot = Some(variable.clone());
                    }
                }
            }
        }
    }

    Ok(schema
        .required_specs()
        .iter()
        .zip(schema.required_positions())
        .map(|(spec, pos)| match suffixes.get(pos).and_then(|s| s.as_ref()) {
            Some(suffix) => format!("{}_{}", spec.rename, suffix.to_lowercase()),
            None => spec.rename.clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnKind, ColumnSpec, GroupRule};

    fn spec(source: &str, rename: &str, required: bool) -> ColumnSpec {
        ColumnSpec {
            source: source.to_string(),
            column: None,
            rename: rename.to_string(),
            datatype: ColumnKind::String,
            required,
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn projection_keeps_required_positions_in_schema_order() {
        let schema = Schema {
            columns: vec![
                spec("skip", "skip", false),
                spec("ID", "apartment_id", true),
                spec("noise", "noise", false),
                spec("Revenue", "rental_revenue", true),
            ],
            group_expansions: Vec::new(),
            schema_version: None,
        };
        let frame = Frame {
            headers: strings(&["skip", "ID", "noise", "Revenue"]),
            rows: vec![strings(&["x", "A1", "y", "100"])],
        };

        let projected = project(&frame, &schema).unwrap();
        assert_eq!(projected.headers, strings(&["apartment_id", "rental_revenue"]));
        assert_eq!(projected.rows, vec![strings(&["A1", "100"])]);
    }

    #[test]
    fn duplicate_canonical_names_get_deterministic_suffixes() {
        let schema = Schema {
            columns: vec![
                spec("Rate", "rate", true),
                spec("Rate", "rate", true),
                spec("Rate", "rate", true),
            ],
            group_expansions: Vec::new(),
            schema_version: None,
        };
        let frame = Frame {
            headers: strings(&["Rate", "Rate", "Rate"]),
            rows: Vec::new(),
        };

        let projected = project(&frame, &schema).unwrap();
        assert_eq!(projected.headers, strings(&["rate", "rate.1", "rate.2"]));
    }

    #[test]
    fn group_expansion_suffixes_following_siblings_from_the_capture() {
        let schema = Schema {
            columns: vec![
                spec("Base rate (Direct)", "channel_marker", false),
                spec("Rate", "base_rate", true),
                spec("Fee", "base_fee", true),
                spec("Base rate (Booking)", "channel_marker", false),
                spec("Rate", "base_rate", true),
                spec("Fee", "base_fee", true),
            ],
            group_expansions: vec![GroupRule {
                pattern: r"^Base rate \((\w+)\)$".to_string(),
                span: 2,
            }],
            schema_version: None,
        };
        let frame = Frame {
            headers: strings(&[
                "Base rate (Direct)",
                "Rate",
                "Fee",
                "Base rate (Booking)",
                "Rate",
                "Fee",
            ]),
            rows: vec![strings(&["", "10", "1", "", "12", "2"])],
        };

        let projected = project(&frame, &schema).unwrap();
        assert_eq!(
            projected.headers,
            strings(&[
                "base_rate_direct",
                "base_fee_direct",
                "base_rate_booking",
                "base_fee_booking"
            ])
        );
        assert_eq!(projected.rows[0], strings(&["10", "1", "12", "2"]));
    }

    #[test]
    fn projection_rejects_positions_beyond_the_sheet() {
        let schema = Schema {
            columns: vec![spec("A", "a", true), spec("B", "b", true)],
            group_expansions: Vec::new(),
            schema_version: None,
        };
        let frame = Frame {
            headers: strings(&["A"]),
            rows: Vec::new(),
        };
        assert!(project(&frame, &schema).is_err());
    }
}
