use serde::{Deserialize, Deserializer, Serialize, de};
use std::collections::BTreeMap;

/// All lengths are integers in the smallest meaningful unit (e.g. millimeters),
/// so capacity comparisons are exact. Costs stay `f64`: they only appear in the
/// objective and in reports, never in feasibility checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentType {
    pub name: String,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub length: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub demand: u32,
    /// Optional unit sale price, used for revenue/profit reporting only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defect {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub start: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub length: u32,
}

impl Defect {
    pub fn end(&self) -> Option<u32> {
        self.start.checked_add(self.length)
    }
}

impl std::fmt::Display for Defect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, +{}]", self.start, self.length)
    }
}

/// One purchasable raw-material type with unlimited supply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItem {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub length: u32,
    pub cost: f64,
    #[serde(default)]
    pub defects: Vec<Defect>,
}

/// Defect-free span of a stock item, half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsableInterval {
    pub start: u32,
    pub end: u32,
}

impl UsableInterval {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

impl std::fmt::Display for UsableInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One feasible way of cutting a single stick of one stock type.
///
/// `counts` is indexed by segment-type catalog order. `layout` records which
/// segments landed in which usable interval, so per-interval feasibility stays
/// checkable and the pattern is renderable. Immutable once generated.
#[derive(Debug, Clone, Serialize)]
pub struct CuttingPattern {
    pub stock_index: usize,
    pub stock_length: u32,
    pub stock_cost: f64,
    pub counts: Vec<u32>,
    #[serde(skip_serializing)]
    pub layout: Vec<Vec<usize>>,
    pub used: u32,
    pub kerf: u32,
    pub waste: u32,
}

impl CuttingPattern {
    pub fn new(
        stock_index: usize,
        stock: &StockItem,
        counts: Vec<u32>,
        layout: Vec<Vec<usize>>,
        used: u32,
        kerf: u32,
    ) -> Self {
        Self {
            stock_index,
            stock_length: stock.length,
            stock_cost: stock.cost,
            counts,
            layout,
            used,
            kerf,
            waste: stock.length - used - kerf,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Segment breakdown keyed by name, zero entries omitted.
    pub fn cuts(&self, segments: &[SegmentType]) -> BTreeMap<String, u32> {
        self.counts
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c > 0)
            .map(|(i, &c)| (segments[i].name.clone(), c))
            .collect()
    }

    pub fn describe(&self, segments: &[SegmentType]) -> String {
        self.cuts(segments)
            .iter()
            .map(|(name, c)| format!("{name}:{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CutError {
    #[error("invalid defect {defect} on stock of length {stock_length}")]
    InvalidDefect { defect: Defect, stock_length: u32 },

    #[error("solver failure: {0}")]
    Solver(String),
}

/// Accepts either an integer or a whole-valued float, for lenient JSON clients.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = f64::deserialize(deserializer)?;
    if n.fract() != 0.0 || n < 0.0 || n > u32::MAX as f64 {
        return Err(de::Error::custom(format!(
            "expected a non-negative integer, got {n}"
        )));
    }
    Ok(n as u32)
}
