use crate::types::{CuttingPattern, SegmentType, StockItem, UsableInterval};

const MAX_WIDTH: f64 = 80.0;

/// ASCII layout of one cutting pattern on its stock item, scaled to a single
/// 80-column bar: segments as `|---|` spans labeled with their length, defects
/// as `x` fill, kerf and waste left as `.`.
pub fn render_pattern(
    stock: &StockItem,
    intervals: &[UsableInterval],
    pattern: &CuttingPattern,
    segments: &[SegmentType],
    kerf: u32,
) -> String {
    if stock.length == 0 {
        return String::new();
    }
    let scale = MAX_WIDTH / stock.length as f64;
    let width = (stock.length as f64 * scale).round() as usize;
    let mut bar = vec!['.'; width + 1];

    let pos = |x: u32| ((x as f64 * scale).round() as usize).min(width);

    for defect in &stock.defects {
        let x0 = pos(defect.start);
        let x1 = pos(defect.start.saturating_add(defect.length));
        // a defect always shows, however short
        bar[x0..=x1.max(x0)].fill('x');
    }

    for (i, placed) in pattern.layout.iter().enumerate() {
        let mut cursor = intervals[i].start;
        for &si in placed {
            let length = segments[si].length;
            let x0 = pos(cursor);
            let x1 = pos(cursor + length);
            bar[x0] = '|';
            bar[x1] = '|';
            if x1 > x0 + 1 {
                for cell in &mut bar[x0 + 1..x1] {
                    *cell = '-';
                }
            }

            let label = length.to_string();
            let span = x1.saturating_sub(x0);
            if span > label.len() + 1 {
                let start = x0 + 1 + (span - 1 - label.len()) / 2;
                for (j, ch) in label.chars().enumerate() {
                    bar[start + j] = ch;
                }
            }
            cursor += length + kerf;
        }
    }

    bar[0] = '|';
    bar[width] = '|';
    let mut result: String = bar.into_iter().collect();
    result.push('\n');
    result
}
