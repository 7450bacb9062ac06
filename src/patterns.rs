use crate::intervals::usable_intervals;
use crate::types::{CutError, CuttingPattern, SegmentType, StockItem, UsableInterval};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Enumerates every feasible cutting pattern for one stock item.
///
/// Depth-first search over (segment type, interval) placements, run on an
/// explicit stack: `path` holds the placements made so far and `cursor` the
/// next candidate to try, so backtracking is an undo on one shared capacity
/// vector instead of a copy per frame. Segment indices are non-decreasing
/// along a path, which kills permutation duplicates; the same multiset can
/// still be reached through different interval assignments, so count vectors
/// are deduplicated (the first assignment found becomes the pattern's layout).
/// The empty pattern is never emitted.
///
/// Returns `None` if the cancel flag is raised mid-search; no partial pattern
/// set escapes.
pub fn enumerate_patterns(
    stock_index: usize,
    stock: &StockItem,
    intervals: &[UsableInterval],
    segments: &[SegmentType],
    kerf: u32,
    cancel: &AtomicBool,
) -> Option<Vec<CuttingPattern>> {
    let mut remaining: Vec<u32> = intervals.iter().map(|iv| iv.len()).collect();
    let mut counts = vec![0u32; segments.len()];
    let mut layout: Vec<Vec<usize>> = vec![Vec::new(); intervals.len()];
    let mut used = 0u32;
    let mut kerf_used = 0u32;

    let mut seen: HashSet<Vec<u32>> = HashSet::new();
    let mut patterns: Vec<CuttingPattern> = Vec::new();

    // (segment, interval) of each placement on the current path
    let mut path: Vec<(usize, usize)> = Vec::new();
    let mut cursor = (0usize, 0usize);

    loop {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        match next_fit(&remaining, segments, kerf, cursor) {
            Some((seg, iv)) => {
                let need = segments[seg].length + kerf;
                remaining[iv] -= need;
                counts[seg] += 1;
                layout[iv].push(seg);
                used += segments[seg].length;
                kerf_used += kerf;
                path.push((seg, iv));
                if seen.insert(counts.clone()) {
                    patterns.push(CuttingPattern::new(
                        stock_index,
                        stock,
                        counts.clone(),
                        layout.clone(),
                        used,
                        kerf_used,
                    ));
                }
                // the child search may place the same segment type again
                cursor = (seg, 0);
            }
            None => match path.pop() {
                Some((seg, iv)) => {
                    let need = segments[seg].length + kerf;
                    remaining[iv] += need;
                    counts[seg] -= 1;
                    layout[iv].pop();
                    used -= segments[seg].length;
                    kerf_used -= kerf;
                    cursor = if iv + 1 < remaining.len() {
                        (seg, iv + 1)
                    } else {
                        (seg + 1, 0)
                    };
                }
                None => break,
            },
        }
    }

    Some(patterns)
}

/// First feasible (segment, interval) candidate at or after `cursor`, scanning
/// segments in catalog order and intervals left to right.
fn next_fit(
    remaining: &[u32],
    segments: &[SegmentType],
    kerf: u32,
    cursor: (usize, usize),
) -> Option<(usize, usize)> {
    let (seg0, iv0) = cursor;
    for seg in seg0..segments.len() {
        // a zero-length segment would consume nothing and never terminate
        if segments[seg].length == 0 {
            continue;
        }
        let Some(need) = segments[seg].length.checked_add(kerf) else {
            continue;
        };
        let start = if seg == seg0 { iv0 } else { 0 };
        for iv in start..remaining.len() {
            if remaining[iv] >= need {
                return Some((seg, iv));
            }
        }
    }
    None
}

/// Builds the full pattern catalog: validates defects, derives usable
/// intervals, and enumerates per stock item in parallel. The segment catalog
/// and kerf are shared read-only across workers. `Ok(None)` means cancelled.
pub fn generate_catalog(
    stocks: &[StockItem],
    segments: &[SegmentType],
    kerf: u32,
    cancel: &AtomicBool,
) -> Result<Option<Vec<CuttingPattern>>, CutError> {
    let intervals: Vec<Vec<UsableInterval>> = stocks
        .iter()
        .map(|s| usable_intervals(s.length, &s.defects))
        .collect::<Result<_, _>>()?;

    let per_stock: Option<Vec<Vec<CuttingPattern>>> = stocks
        .par_iter()
        .zip(intervals.par_iter())
        .enumerate()
        .map(|(i, (stock, ivs))| enumerate_patterns(i, stock, ivs, segments, kerf, cancel))
        .collect();

    let Some(per_stock) = per_stock else {
        return Ok(None);
    };

    for (i, patterns) in per_stock.iter().enumerate() {
        tracing::debug!(stock = i, patterns = patterns.len(), "enumerated stock item");
    }
    let catalog: Vec<CuttingPattern> = per_stock.into_iter().flatten().collect();
    tracing::info!(patterns = catalog.len(), stocks = stocks.len(), "pattern catalog built");
    Ok(Some(catalog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Defect;

    fn seg(name: &str, length: u32, demand: u32) -> SegmentType {
        SegmentType {
            name: name.into(),
            length,
            demand,
            price: None,
        }
    }

    fn stock(length: u32, cost: f64, defects: Vec<Defect>) -> StockItem {
        StockItem {
            length,
            cost,
            defects,
        }
    }

    fn enumerate(stock_item: &StockItem, segments: &[SegmentType], kerf: u32) -> Vec<CuttingPattern> {
        let ivs = usable_intervals(stock_item.length, &stock_item.defects).unwrap();
        enumerate_patterns(0, stock_item, &ivs, segments, kerf, &AtomicBool::new(false)).unwrap()
    }

    #[test]
    fn test_kerf_bounds_count() {
        // 3 * (1590 + 5) = 4785 <= 5500, 4 * 1595 = 6380 > 5500
        let s = stock(5500, 18.0, vec![]);
        let segments = vec![seg("order1_width", 1590, 1)];
        let patterns = enumerate(&s, &segments, 5);

        let mut counts: Vec<u32> = patterns.iter().map(|p| p.counts[0]).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_pattern_excluded() {
        let s = stock(100, 1.0, vec![]);
        let patterns = enumerate(&s, &[seg("a", 40, 1)], 0);
        assert!(patterns.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn test_segment_larger_than_stock_yields_nothing() {
        let s = stock(100, 1.0, vec![]);
        let patterns = enumerate(&s, &[seg("a", 200, 1)], 0);
        assert!(patterns.is_empty());
    }

    #[test]
    fn test_fully_defective_stock_yields_nothing() {
        let s = stock(100, 1.0, vec![Defect { start: 0, length: 100 }]);
        let patterns = enumerate(&s, &[seg("a", 40, 1)], 0);
        assert!(patterns.is_empty());
    }

    #[test]
    fn test_segments_split_across_intervals() {
        // defect at [1000, +30) leaves spans of 1000 and 4470; an 800 segment
        // fits once in the first and five times in the second
        let s = stock(5500, 18.0, vec![Defect { start: 1000, length: 30 }]);
        let patterns = enumerate(&s, &[seg("a", 800, 1)], 0);

        let max = patterns.iter().map(|p| p.counts[0]).max().unwrap();
        assert_eq!(max, 6);
    }

    #[test]
    fn test_duplicate_count_vectors_removed() {
        // two identical spans reach the same multisets through either one
        let s = stock(100, 1.0, vec![Defect { start: 40, length: 20 }]);
        let patterns = enumerate(&s, &[seg("a", 30, 1)], 0);

        let mut counts: Vec<u32> = patterns.iter().map(|p| p.counts[0]).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2]);
    }

    #[test]
    fn test_no_interval_overbooked() {
        let s = stock(5500, 18.0, vec![Defect { start: 1000, length: 30 }]);
        let segments = vec![seg("a", 790, 2), seg("b", 990, 1), seg("c", 450, 3)];
        let kerf = 5;
        let ivs = usable_intervals(s.length, &s.defects).unwrap();
        let patterns =
            enumerate_patterns(0, &s, &ivs, &segments, kerf, &AtomicBool::new(false)).unwrap();
        assert!(!patterns.is_empty());

        for p in &patterns {
            let mut per_interval = vec![0u64; ivs.len()];
            for (i, placed) in p.layout.iter().enumerate() {
                for &si in placed {
                    per_interval[i] += (segments[si].length + kerf) as u64;
                }
            }
            for (i, iv) in ivs.iter().enumerate() {
                assert!(
                    per_interval[i] <= iv.len() as u64,
                    "interval {i} overbooked: {} > {}",
                    per_interval[i],
                    iv.len()
                );
            }
            // layout and counts must describe the same multiset
            let mut from_layout = vec![0u32; segments.len()];
            for placed in &p.layout {
                for &si in placed {
                    from_layout[si] += 1;
                }
            }
            assert_eq!(from_layout, p.counts);
            let used: u32 = from_layout
                .iter()
                .enumerate()
                .map(|(si, &c)| segments[si].length * c)
                .sum();
            assert_eq!(used, p.used);
            assert_eq!(p.waste, s.length - p.used - p.kerf);
        }
    }

    #[test]
    fn test_no_defects_equals_full_interval() {
        let s = stock(5500, 18.0, vec![]);
        let ivs = usable_intervals(s.length, &s.defects).unwrap();
        assert_eq!(ivs, vec![UsableInterval::new(0, 5500)]);

        let segments = vec![seg("a", 1590, 1), seg("b", 2190, 1)];
        let from_defect_free = enumerate(&s, &segments, 5);
        let from_single_span = enumerate_patterns(
            0,
            &s,
            &[UsableInterval::new(0, 5500)],
            &segments,
            5,
            &AtomicBool::new(false),
        )
        .unwrap();

        let key = |ps: &[CuttingPattern]| {
            let mut v: Vec<Vec<u32>> = ps.iter().map(|p| p.counts.clone()).collect();
            v.sort();
            v
        };
        assert_eq!(key(&from_defect_free), key(&from_single_span));
    }

    #[test]
    fn test_deterministic_pattern_set() {
        let s = stock(6200, 22.0, vec![Defect { start: 500, length: 20 }]);
        let segments = vec![seg("a", 1590, 1), seg("b", 1790, 1), seg("c", 2190, 1)];

        let key = |ps: &[CuttingPattern]| {
            let mut v: Vec<Vec<u32>> = ps.iter().map(|p| p.counts.clone()).collect();
            v.sort();
            v
        };
        let first = key(&enumerate(&s, &segments, 5));
        let second = key(&enumerate(&s, &segments, 5));
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_catalog_spans_all_stock() {
        let stocks = vec![
            stock(5500, 18.0, vec![Defect { start: 1000, length: 30 }]),
            stock(7800, 28.0, vec![Defect { start: 3000, length: 30 }]),
        ];
        let segments = vec![seg("a", 1590, 10), seg("b", 2190, 10)];
        let catalog = generate_catalog(&stocks, &segments, 5, &AtomicBool::new(false))
            .unwrap()
            .unwrap();

        assert!(catalog.iter().any(|p| p.stock_index == 0));
        assert!(catalog.iter().any(|p| p.stock_index == 1));
        assert!(catalog.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn test_catalog_rejects_invalid_defect() {
        let stocks = vec![stock(100, 1.0, vec![Defect { start: 90, length: 20 }])];
        let err = generate_catalog(&stocks, &[seg("a", 40, 1)], 0, &AtomicBool::new(false))
            .unwrap_err();
        assert!(matches!(err, CutError::InvalidDefect { .. }));
    }

    #[test]
    fn test_cancelled_catalog_is_none() {
        let stocks = vec![stock(5500, 18.0, vec![])];
        let cancelled = AtomicBool::new(true);
        let result = generate_catalog(&stocks, &[seg("a", 100, 1)], 0, &cancelled).unwrap();
        assert!(result.is_none());
    }
}
