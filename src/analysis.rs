use crate::types::{CuttingPattern, SegmentType};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DemandCheck {
    pub name: String,
    pub required: u32,
    pub actual: u64,
    pub satisfied: bool,
}

/// Aggregate metrics of an optimal solution. Only computed once the solver
/// has produced a usage assignment; never from a partial or infeasible state.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub total_cost: f64,
    pub total_material: u64,
    pub total_waste: u64,
    pub total_kerf: u64,
    /// (material - waste) / material, 0 when no material is consumed.
    pub utilization: f64,
    /// (waste + kerf) / material, 0 when no material is consumed.
    pub loss_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
    pub demand: Vec<DemandCheck>,
}

pub fn analyze(
    patterns: &[CuttingPattern],
    usage: &[u32],
    segments: &[SegmentType],
) -> PlanSummary {
    let mut total_cost = 0.0;
    let mut total_material = 0u64;
    let mut total_waste = 0u64;
    let mut total_kerf = 0u64;
    let mut supplied = vec![0u64; segments.len()];

    for (pattern, &count) in patterns.iter().zip(usage) {
        if count == 0 {
            continue;
        }
        let count64 = count as u64;
        total_cost += pattern.stock_cost * count as f64;
        total_material += pattern.stock_length as u64 * count64;
        total_waste += pattern.waste as u64 * count64;
        total_kerf += pattern.kerf as u64 * count64;
        for (si, &c) in pattern.counts.iter().enumerate() {
            supplied[si] += c as u64 * count64;
        }
    }

    let (utilization, loss_rate) = if total_material == 0 {
        (0.0, 0.0)
    } else {
        let material = total_material as f64;
        (
            (material - total_waste as f64) / material,
            (total_waste + total_kerf) as f64 / material,
        )
    };

    let demand: Vec<DemandCheck> = segments
        .iter()
        .zip(&supplied)
        .map(|(segment, &actual)| DemandCheck {
            name: segment.name.clone(),
            required: segment.demand,
            actual,
            satisfied: actual >= segment.demand as u64,
        })
        .collect();

    let revenue = if segments.iter().any(|s| s.price.is_some()) {
        Some(
            segments
                .iter()
                .filter_map(|s| s.price.map(|p| p * s.demand as f64))
                .sum(),
        )
    } else {
        None
    };
    let profit = revenue.map(|r| r - total_cost);

    PlanSummary {
        total_cost,
        total_material,
        total_waste,
        total_kerf,
        utilization,
        loss_rate,
        revenue,
        profit,
        demand,
    }
}
