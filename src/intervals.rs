use crate::types::{CutError, Defect, UsableInterval};

/// Computes the ordered defect-free spans of a stock item.
///
/// Defects are walked in start order with a cursor; the cursor only ever moves
/// forward to the farthest defect end seen, so overlapping or touching defects
/// collapse into a single excluded region. A stock item with no defects yields
/// one interval covering its whole length; one fully consumed by defects
/// yields none.
pub fn usable_intervals(length: u32, defects: &[Defect]) -> Result<Vec<UsableInterval>, CutError> {
    let mut sorted: Vec<Defect> = Vec::with_capacity(defects.len());
    for &defect in defects {
        match defect.end() {
            Some(end) if end <= length => {
                if defect.length > 0 {
                    sorted.push(defect);
                }
            }
            _ => {
                return Err(CutError::InvalidDefect {
                    defect,
                    stock_length: length,
                });
            }
        }
    }
    sorted.sort_by_key(|d| d.start);

    let mut intervals = Vec::new();
    let mut cursor = 0u32;
    for defect in &sorted {
        if cursor < defect.start {
            intervals.push(UsableInterval::new(cursor, defect.start));
        }
        // end() checked above
        cursor = cursor.max(defect.end().unwrap_or(u32::MAX));
    }
    if cursor < length {
        intervals.push(UsableInterval::new(cursor, length));
    }
    Ok(intervals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defect(start: u32, length: u32) -> Defect {
        Defect { start, length }
    }

    #[test]
    fn test_no_defects_single_interval() {
        let ivs = usable_intervals(5500, &[]).unwrap();
        assert_eq!(ivs, vec![UsableInterval::new(0, 5500)]);
    }

    #[test]
    fn test_single_defect_splits() {
        // stock 5500 with one defect at [1000, +30)
        let ivs = usable_intervals(5500, &[defect(1000, 30)]).unwrap();
        assert_eq!(
            ivs,
            vec![
                UsableInterval::new(0, 1000),
                UsableInterval::new(1030, 5500)
            ]
        );
    }

    #[test]
    fn test_two_defects_three_intervals() {
        let ivs = usable_intervals(5500, &[defect(1000, 30), defect(2500, 40)]).unwrap();
        assert_eq!(
            ivs,
            vec![
                UsableInterval::new(0, 1000),
                UsableInterval::new(1030, 2500),
                UsableInterval::new(2540, 5500)
            ]
        );
    }

    #[test]
    fn test_unsorted_input() {
        let ivs = usable_intervals(5500, &[defect(2500, 40), defect(1000, 30)]).unwrap();
        assert_eq!(ivs.len(), 3);
        assert_eq!(ivs[0], UsableInterval::new(0, 1000));
    }

    #[test]
    fn test_defect_at_start_and_end() {
        let ivs = usable_intervals(100, &[defect(0, 10), defect(90, 10)]).unwrap();
        assert_eq!(ivs, vec![UsableInterval::new(10, 90)]);
    }

    #[test]
    fn test_overlapping_defects_merge() {
        // [10, 50) and [30, 60) must behave as one excluded region [10, 60)
        let ivs = usable_intervals(100, &[defect(10, 40), defect(30, 30)]).unwrap();
        assert_eq!(
            ivs,
            vec![UsableInterval::new(0, 10), UsableInterval::new(60, 100)]
        );
    }

    #[test]
    fn test_contained_defect_does_not_rewind_cursor() {
        // [10, 80) fully contains [20, 30); the cursor must stay at 80
        let ivs = usable_intervals(100, &[defect(10, 70), defect(20, 10)]).unwrap();
        assert_eq!(
            ivs,
            vec![UsableInterval::new(0, 10), UsableInterval::new(80, 100)]
        );
    }

    #[test]
    fn test_touching_defects() {
        let ivs = usable_intervals(100, &[defect(10, 20), defect(30, 20)]).unwrap();
        assert_eq!(
            ivs,
            vec![UsableInterval::new(0, 10), UsableInterval::new(50, 100)]
        );
    }

    #[test]
    fn test_fully_defective_stock() {
        let ivs = usable_intervals(100, &[defect(0, 100)]).unwrap();
        assert!(ivs.is_empty());
    }

    #[test]
    fn test_defect_past_end_rejected() {
        let err = usable_intervals(100, &[defect(90, 20)]).unwrap_err();
        assert!(matches!(err, CutError::InvalidDefect { .. }));
    }

    #[test]
    fn test_defect_overflow_rejected() {
        assert!(usable_intervals(100, &[defect(u32::MAX, 1)]).is_err());
    }

    #[test]
    fn test_zero_length_defect_is_noop() {
        let ivs = usable_intervals(100, &[defect(50, 0)]).unwrap();
        assert_eq!(ivs, vec![UsableInterval::new(0, 100)]);
    }
}
