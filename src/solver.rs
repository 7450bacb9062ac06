use crate::analysis::{self, PlanSummary};
use crate::patterns::generate_catalog;
use crate::types::{CutError, CuttingPattern, SegmentType, StockItem};
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver, variable,
};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Integer program over the pattern catalog: one usage variable per pattern,
/// cost objective, one `>=` demand row per segment type.
#[derive(Debug, Clone)]
pub struct CutModel {
    pub costs: Vec<f64>,
    pub demands: Vec<DemandRow>,
}

#[derive(Debug, Clone)]
pub struct DemandRow {
    /// (pattern index, segment count) for patterns that supply this segment
    pub coeffs: Vec<(usize, f64)>,
    pub required: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    /// Usage count per pattern, catalog order.
    Optimal(Vec<u32>),
    Infeasible,
    Timeout,
}

/// Narrow seam to the external integer-program solver: objective plus demand
/// rows in, status plus assignment out. Backends hold no problem state.
pub trait IlpBackend {
    fn solve(&self, model: &CutModel) -> Result<SolveStatus, CutError>;
}

/// Default backend: `good_lp` over the pure-Rust `microlp` branch-and-bound.
pub struct GoodLpBackend;

impl IlpBackend for GoodLpBackend {
    fn solve(&self, model: &CutModel) -> Result<SolveStatus, CutError> {
        let mut vars = ProblemVariables::new();
        let usage: Vec<Variable> = model
            .costs
            .iter()
            .map(|_| vars.add(variable().integer().min(0)))
            .collect();

        let objective: Expression = usage
            .iter()
            .zip(&model.costs)
            .map(|(&v, &c)| c * v)
            .sum();

        let mut problem = vars.minimise(objective).using(default_solver);
        for row in &model.demands {
            let supplied: Expression = row.coeffs.iter().map(|&(i, c)| c * usage[i]).sum();
            problem = problem.with(constraint!(supplied >= row.required));
        }

        match problem.solve() {
            Ok(solution) => Ok(SolveStatus::Optimal(
                usage
                    .iter()
                    .map(|&v| solution.value(v).round().max(0.0) as u32)
                    .collect(),
            )),
            Err(ResolutionError::Infeasible) => Ok(SolveStatus::Infeasible),
            Err(e) => Err(CutError::Solver(e.to_string())),
        }
    }
}

pub fn build_model(patterns: &[CuttingPattern], segments: &[SegmentType]) -> CutModel {
    let costs = patterns.iter().map(|p| p.stock_cost).collect();
    let demands = segments
        .iter()
        .enumerate()
        .filter(|(_, segment)| segment.demand > 0)
        .map(|(si, segment)| DemandRow {
            coeffs: patterns
                .iter()
                .enumerate()
                .filter(|(_, p)| p.counts[si] > 0)
                .map(|(pi, p)| (pi, p.counts[si] as f64))
                .collect(),
            required: segment.demand as f64,
        })
        .collect();
    CutModel { costs, demands }
}

/// Runs the backend on a worker thread and gives up after `timeout`. The
/// worker is abandoned on timeout; its result, if any, is discarded.
pub fn solve_with_deadline<B>(
    backend: B,
    model: CutModel,
    timeout: Duration,
) -> Result<SolveStatus, CutError>
where
    B: IlpBackend + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(backend.solve(&model));
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Ok(SolveStatus::Timeout),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(CutError::Solver(
            "solver thread exited without a result".into(),
        )),
    }
}

#[derive(Debug, Clone)]
pub enum PlanOutcome {
    Optimal(CutPlan),
    Infeasible,
    Timeout,
    Cancelled,
}

/// An optimal plan: the full catalog, the usage count chosen for each pattern,
/// and the derived metrics.
#[derive(Debug, Clone)]
pub struct CutPlan {
    pub patterns: Vec<CuttingPattern>,
    pub usage: Vec<u32>,
    pub summary: PlanSummary,
}

impl CutPlan {
    /// Patterns actually used, with their usage counts.
    pub fn active(&self) -> impl Iterator<Item = (&CuttingPattern, u32)> {
        self.patterns
            .iter()
            .zip(self.usage.iter().copied())
            .filter(|&(_, count)| count > 0)
    }
}

pub struct Optimizer {
    stocks: Vec<StockItem>,
    segments: Vec<SegmentType>,
    kerf: u32,
    timeout: Duration,
}

impl Optimizer {
    pub fn new(stocks: Vec<StockItem>, segments: Vec<SegmentType>, kerf: u32) -> Self {
        Self {
            stocks,
            segments,
            kerf,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stocks(&self) -> &[StockItem] {
        &self.stocks
    }

    pub fn segments(&self) -> &[SegmentType] {
        &self.segments
    }

    pub fn solve(&self) -> Result<PlanOutcome, CutError> {
        self.solve_with_cancel(&AtomicBool::new(false))
    }

    pub fn solve_with_cancel(&self, cancel: &AtomicBool) -> Result<PlanOutcome, CutError> {
        let Some(patterns) = generate_catalog(&self.stocks, &self.segments, self.kerf, cancel)?
        else {
            return Ok(PlanOutcome::Cancelled);
        };

        // a demanded segment that no pattern supplies can never be satisfied
        for (si, segment) in self.segments.iter().enumerate() {
            if segment.demand > 0 && !patterns.iter().any(|p| p.counts[si] > 0) {
                tracing::info!(segment = %segment.name, "no pattern supplies demanded segment");
                return Ok(PlanOutcome::Infeasible);
            }
        }

        let usage = if self.segments.iter().all(|s| s.demand == 0) {
            vec![0; patterns.len()]
        } else {
            let model = build_model(&patterns, &self.segments);
            tracing::info!(
                variables = model.costs.len(),
                constraints = model.demands.len(),
                "submitting integer program"
            );
            match solve_with_deadline(GoodLpBackend, model, self.timeout)? {
                SolveStatus::Optimal(usage) => usage,
                SolveStatus::Infeasible => return Ok(PlanOutcome::Infeasible),
                SolveStatus::Timeout => return Ok(PlanOutcome::Timeout),
            }
        };

        let summary = analysis::analyze(&patterns, &usage, &self.segments);
        Ok(PlanOutcome::Optimal(CutPlan {
            patterns,
            usage,
            summary,
        }))
    }
}
