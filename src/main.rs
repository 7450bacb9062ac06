use clap::Parser;
use cutplan::intervals::usable_intervals;
use cutplan::render;
use cutplan::solver::{Optimizer, PlanOutcome};
use cutplan::types::{Defect, SegmentType, StockItem};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cutplan", about = "1D cutting stock optimizer")]
struct Cli {
    /// Stock items as LEN@COST with optional defects (e.g. 5500@18 or
    /// 6200@22/500+20,1800+50)
    #[arg(long = "stock", num_args = 1..)]
    stock: Vec<String>,

    /// Required cuts as NAME=LEN:QTY with optional unit price
    /// (e.g. shelf=1590:240 or shelf=1590:240@480)
    #[arg(long = "cuts", num_args = 1..)]
    cuts: Vec<String>,

    /// Blade kerf width per cut (default: 0)
    #[arg(long, default_value_t = 0)]
    kerf: u32,

    /// Solver time limit in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Show ASCII layout of each active pattern
    #[arg(long)]
    layout: bool,
}

fn parse_defect(s: &str) -> Result<Defect, String> {
    let parts: Vec<&str> = s.split('+').collect();
    if parts.len() != 2 {
        return Err(format!("invalid defect '{}', expected START+LEN", s));
    }
    let start = parts[0]
        .parse::<u32>()
        .map_err(|_| format!("invalid defect start in '{}'", s))?;
    let length = parts[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid defect length in '{}'", s))?;
    Ok(Defect { start, length })
}

fn parse_stock(s: &str) -> Result<StockItem, String> {
    let (dims, defects) = match s.split_once('/') {
        Some((dims, defect_list)) => {
            let defects = defect_list
                .split(',')
                .map(parse_defect)
                .collect::<Result<Vec<_>, _>>()?;
            (dims, defects)
        }
        None => (s, Vec::new()),
    };
    let Some((length, cost)) = dims.split_once('@') else {
        return Err(format!(
            "invalid stock '{}', expected LEN@COST[/START+LEN,...]",
            s
        ));
    };
    let length = length
        .parse::<u32>()
        .map_err(|_| format!("invalid length in '{}'", s))?;
    let cost = cost
        .parse::<f64>()
        .map_err(|_| format!("invalid cost in '{}'", s))?;
    if length == 0 {
        return Err(format!("stock length must be non-zero in '{}'", s));
    }
    Ok(StockItem {
        length,
        cost,
        defects,
    })
}

fn parse_cut(s: &str) -> Result<SegmentType, String> {
    let Some((name, rest)) = s.split_once('=') else {
        return Err(format!("invalid cut '{}', expected NAME=LEN:QTY[@PRICE]", s));
    };
    let Some((length, rest)) = rest.split_once(':') else {
        return Err(format!("invalid cut '{}', expected NAME=LEN:QTY[@PRICE]", s));
    };
    let (qty, price) = match rest.split_once('@') {
        Some((qty, price)) => {
            let price = price
                .parse::<f64>()
                .map_err(|_| format!("invalid price in '{}'", s))?;
            (qty, Some(price))
        }
        None => (rest, None),
    };
    let length = length
        .parse::<u32>()
        .map_err(|_| format!("invalid length in '{}'", s))?;
    let demand = qty
        .parse::<u32>()
        .map_err(|_| format!("invalid quantity in '{}'", s))?;
    if length == 0 {
        return Err(format!("cut length must be non-zero in '{}'", s));
    }
    if demand == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    Ok(SegmentType {
        name: name.to_string(),
        length,
        demand,
        price,
    })
}

fn main() {
    let cli = Cli::parse();

    let stocks: Vec<StockItem> = cli
        .stock
        .iter()
        .map(|s| parse_stock(s))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    let segments: Vec<SegmentType> = cli
        .cuts
        .iter()
        .map(|c| parse_cut(c))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });

    if stocks.is_empty() || segments.is_empty() {
        eprintln!("Error: at least one --stock and one --cuts entry is required");
        std::process::exit(1);
    }

    let optimizer = Optimizer::new(stocks, segments, cli.kerf)
        .with_timeout(Duration::from_secs(cli.timeout_secs));

    let outcome = optimizer.solve().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    match outcome {
        PlanOutcome::Optimal(plan) => {
            for (i, (pattern, count)) in plan.active().enumerate() {
                println!(
                    "Pattern {}: stock {} @ {:.2}, used {} times, cuts [{}], waste {}",
                    i + 1,
                    pattern.stock_length,
                    pattern.stock_cost,
                    count,
                    pattern.describe(optimizer.segments()),
                    pattern.waste,
                );
                if cli.layout {
                    let stock = &optimizer.stocks()[pattern.stock_index];
                    let intervals = usable_intervals(stock.length, &stock.defects)
                        .expect("defects validated during catalog generation");
                    print!(
                        "{}",
                        render::render_pattern(
                            stock,
                            &intervals,
                            pattern,
                            optimizer.segments(),
                            cli.kerf
                        )
                    );
                }
            }

            println!();
            for check in &plan.summary.demand {
                println!(
                    "{}: required {}, supplied {}{}",
                    check.name,
                    check.required,
                    check.actual,
                    if check.satisfied { "" } else { " [SHORT]" },
                );
            }

            println!(
                "\nSummary: total cost {:.2}, utilization {:.2}%, loss {:.2}%",
                plan.summary.total_cost,
                plan.summary.utilization * 100.0,
                plan.summary.loss_rate * 100.0,
            );
            if let (Some(revenue), Some(profit)) = (plan.summary.revenue, plan.summary.profit) {
                println!("Revenue: {:.2}, profit: {:.2}", revenue, profit);
            }
        }
        PlanOutcome::Infeasible => {
            println!("No feasible cutting plan: demand cannot be met with the given stock.");
        }
        PlanOutcome::Timeout => {
            eprintln!("Solver timed out after {}s", cli.timeout_secs);
            std::process::exit(1);
        }
        PlanOutcome::Cancelled => {
            eprintln!("Cancelled");
            std::process::exit(1);
        }
    }
}
