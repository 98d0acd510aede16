//! Terminal rendering of allocations and analysis results

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use portfolio_client::{
    AnalysisResult, NamedCurve, RawInput, Section, SummaryMetrics, WeightAllocation,
    WeightBalance,
};

/// Fraction as a percentage with two decimals
pub fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(|h| Cell::new(*h)));
    table
}

pub fn allocation_table(allocation: &WeightAllocation) -> Table {
    let mut table = table(&["Ticker", "Weight"]);
    for row in allocation.rows() {
        table.add_row(vec![row.ticker.clone(), format!("{:.1}%", row.percent)]);
    }
    table.add_row(vec!["Total".to_string(), allocation.total_label()]);
    table
}

pub fn print_allocation(allocation: &WeightAllocation) {
    if allocation.is_empty() {
        return;
    }
    println!("{}", allocation_table(allocation));
    match allocation.balance() {
        WeightBalance::Balanced => {}
        balance => println!("Note: weights are {balance} 100% and will be sent as entered."),
    }
}

pub fn summary_table(summary: &SummaryMetrics) -> Table {
    let mut table = table(&["Metric", "Value"]);
    let rows = [
        ("Price Return", pct(summary.price_return)),
        ("Total Return", pct(summary.total_return)),
        ("CAGR", pct(summary.cagr)),
        ("Volatility", pct(summary.volatility)),
        ("Sharpe Ratio", format!("{:.2}", summary.sharpe_ratio)),
        ("Max Drawdown", pct(summary.max_drawdown)),
        ("Value at Risk (95%)", pct(summary.value_at_risk)),
        ("Beta", format!("{:.2}", summary.beta)),
    ];
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }
    table
}

pub fn per_ticker_table(result: &AnalysisResult) -> Table {
    let mut table = table(&[
        "Ticker",
        "Price Return",
        "Total Return",
        "CAGR",
        "Volatility",
        "Max Drawdown",
        "Sharpe",
        "Beta",
    ]);
    for row in &result.per_ticker {
        let m = &row.metrics;
        table.add_row(vec![
            row.ticker.clone(),
            pct(m.price_return),
            pct(m.total_return),
            pct(m.cagr),
            pct(m.volatility),
            pct(m.max_drawdown),
            format!("{:.2}", m.sharpe_ratio),
            format!("{:.2}", m.beta),
        ]);
    }
    table
}

pub fn comparison_table(result: &AnalysisResult) -> Table {
    let mut table = table(&["Ticker", "Price Return", "Total Return"]);
    for row in &result.comparison {
        table.add_row(vec![
            row.ticker.clone(),
            pct(row.price_return),
            pct(row.total_return),
        ]);
    }
    table
}

fn last_value(curve: &NamedCurve) -> Option<(String, f64)> {
    curve
        .points
        .iter()
        .rev()
        .find_map(|point| point.value.map(|value| (point.date.clone(), value)))
}

pub fn series_table(curves: &[NamedCurve], format: impl Fn(f64) -> String) -> Table {
    let mut table = table(&["Series", "Points", "Last Date", "Last Value"]);
    for curve in curves {
        let (date, value) = last_value(curve)
            .map_or_else(|| (String::new(), "-".to_string()), |(d, v)| (d, format(v)));
        table.add_row(vec![curve.name.clone(), curve.points.len().to_string(), date, value]);
    }
    table
}

pub fn print_result(result: &AnalysisResult) {
    let start = result.period.start_date.as_deref().unwrap_or("?");
    let end = result.period.end_date.as_deref().unwrap_or("?");
    println!("\nAnalysis {} ({start} to {end})", result.run);

    println!("\nPortfolio summary");
    println!("{}", summary_table(&result.summary));

    if !result.per_ticker.is_empty() {
        println!("\nPer-ticker metrics");
        println!("{}", per_ticker_table(result));
    }

    if !result.comparison.is_empty() {
        println!("\nReturn comparison");
        println!("{}", comparison_table(result));
    }

    if !result.portfolio_series.is_empty() {
        println!("\nCumulative returns");
        println!("{}", series_table(&result.portfolio_series, pct));
    }

    if result.shows(Section::Amount) {
        if let Some(curves) = &result.amount_series {
            println!("\nInvestment value");
            println!("{}", series_table(curves, |v| format!("{v:.2}")));
        }
    }

    if result.shows(Section::Drawdown) {
        if let Some(drawdown) = &result.drawdown {
            let worst = drawdown
                .points
                .iter()
                .filter_map(|p| p.value)
                .fold(0.0_f64, f64::max);
            println!(
                "\nDrawdown: {} points, worst {}",
                drawdown.points.len(),
                pct(worst)
            );
        }
    }

    if let Some(degradation) = &result.degradation {
        let failed: Vec<String> = degradation.failed.iter().map(ToString::to_string).collect();
        println!(
            "\nSome chart data could not be loaded ({}); showing what the primary analysis provided.",
            failed.join(", ")
        );
    }

    for warning in &result.warnings {
        println!("warning: {warning}");
    }
}

/// The `analyze` command line that repeats a run with the same flags
pub fn resubmit_command(
    input: &RawInput,
    weights: &[f64],
    equalize: bool,
    normalize: bool,
) -> String {
    let mut command = format!(
        "portfolio analyze {} --start {} --end {}",
        input.ticker_list().join(","),
        input.start_date,
        input.end_date
    );
    if !weights.is_empty() {
        let weights: Vec<String> = weights.iter().map(ToString::to_string).collect();
        command.push_str(&format!(" --weights {}", weights.join(",")));
    }
    if equalize {
        command.push_str(" --equalize");
    } else if normalize {
        command.push_str(" --normalize");
    }
    if input.include_dividends {
        command.push_str(" --dividends");
    }
    if !input.initial_amount.trim().is_empty() {
        command.push_str(&format!(" --amount {}", input.initial_amount.trim()));
    }
    command
}

/// Print the service's suggested start date and the command that uses it
pub fn print_date_suggestion(start_date: &str, command: &str) {
    eprintln!("The tickers do not share a common history before {start_date}.");
    eprintln!("Resubmit with:\n  {command}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct() {
        assert_eq!(pct(0.1234), "12.34%");
        assert_eq!(pct(-0.05), "-5.00%");
        assert_eq!(pct(0.0), "0.00%");
    }

    #[test]
    fn test_allocation_table_shows_total() {
        let allocation = WeightAllocation::rebuild(&["AAPL".to_string(), "MSFT".to_string()]);
        let text = allocation_table(&allocation).to_string();
        assert!(text.contains("AAPL"));
        assert!(text.contains("50.0%"));
        assert!(text.contains("100.0%"));
    }

    #[test]
    fn test_resubmit_command_keeps_weight_flags() {
        let input = RawInput::new("AAPL, MSFT")
            .with_dates("2023-01", "2023-12-31")
            .with_dividends(true)
            .with_initial_amount("1000")
            .with_start_date("2023-03-01");

        let command = resubmit_command(&input, &[30.0, 30.0], false, true);
        assert_eq!(
            command,
            "portfolio analyze AAPL,MSFT --start 2023-03-01 --end 2023-12-31 \
             --weights 30,30 --normalize --dividends --amount 1000"
        );

        let command = resubmit_command(&input, &[], true, false);
        assert!(command.contains(" --equalize"));
        assert!(!command.contains("--weights"));
    }

    #[test]
    fn test_summary_table_formats_metrics() {
        let text = summary_table(&SummaryMetrics::default()).to_string();
        assert!(text.contains("Beta"));
        assert!(text.contains("1.00"));
        assert!(text.contains("0.00%"));
    }
}
