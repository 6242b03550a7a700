//! Pattern proposals from an external generator
//!
//! A proposal is JSON of the form `{"pattern": [[true, false, ...], ...]}`.
//! Anything with that outer shape is repaired to fit the grid; anything
//! without it is rejected.
use serde_json::Value;

use super::track::Track;
use super::Pattern;

#[derive(Debug, thiserror::Error)]
pub enum ProposalError {
    #[error("proposal is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("proposal is not a JSON object")]
    NotAnObject,

    #[error("proposal has no `pattern` array")]
    MissingPattern,
}

pub fn parse_proposal(json: &str, steps: usize) -> Result<Pattern, ProposalError> {
    let value: Value = serde_json::from_str(json)?;
    let object = value.as_object().ok_or(ProposalError::NotAnObject)?;
    let rows = object
        .get("pattern")
        .and_then(Value::as_array)
        .ok_or(ProposalError::MissingPattern)?;
    Ok(normalize(rows, steps))
}

/// Fit a JSON matrix to `Track::COUNT` x `steps`
fn normalize(rows: &[Value], steps: usize) -> Pattern {
    let rows: Vec<Vec<bool>> = rows
        .iter()
        .take(Track::COUNT)
        .map(|row| match row.as_array() {
            Some(cells) => cells.iter().take(steps).map(is_hit).collect(),
            None => Vec::new(),
        })
        .collect();
    Pattern::from_rows(&rows, steps)
}

fn is_hit(cell: &Value) -> bool {
    match cell {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_proposal() {
        let json = r#"{"pattern": [
            [true, false, false, false],
            [], [], [], [], [],
            [true, false, true, false]
        ]}"#;
        let pattern = parse_proposal(json, 4).unwrap();
        assert_eq!(pattern.row(Track::Metronome), &[true, false, false, false]);
        assert_eq!(pattern.row(Track::Kick), &[true, false, true, false]);
    }

    #[test]
    fn test_ragged_rows_are_repaired() {
        let json = r#"{"pattern": [
            [true, true, true, true, true, true],
            [true],
            "not a row"
        ]}"#;
        let pattern = parse_proposal(json, 4).unwrap();
        assert_eq!(pattern.steps(), 4);
        assert_eq!(pattern.row(Track::Metronome), &[true; 4]);
        assert_eq!(pattern.row(Track::HihatOpen), &[true, false, false, false]);
        assert_eq!(pattern.row(Track::HihatClosed), &[false; 4]);
        assert_eq!(pattern.row(Track::Kick), &[false; 4]);
    }

    #[test]
    fn test_rows_beyond_track_count_are_ignored() {
        let mut rows = vec!["[false]"; Track::COUNT];
        rows.push("[true, true]");
        let json = format!(r#"{{"pattern": [{}]}}"#, rows.join(","));
        let pattern = parse_proposal(&json, 2).unwrap();
        assert!(pattern.is_empty());
    }

    #[test]
    fn test_non_boolean_cells_are_coerced() {
        let json = r#"{"pattern": [[1, 0, "x", "", null, {}, 0.5]]}"#;
        let pattern = parse_proposal(json, 7).unwrap();
        assert_eq!(
            pattern.row(Track::Metronome),
            &[true, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_invalid_shapes_are_rejected() {
        assert!(matches!(parse_proposal("not json", 4), Err(ProposalError::Json(_))));
        assert!(matches!(parse_proposal("[[true]]", 4), Err(ProposalError::NotAnObject)));
        assert!(matches!(
            parse_proposal(r#"{"grid": [[true]]}"#, 4),
            Err(ProposalError::MissingPattern)
        ));
        assert!(matches!(
            parse_proposal(r#"{"pattern": true}"#, 4),
            Err(ProposalError::MissingPattern)
        ));
    }
}
