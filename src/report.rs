use chrono::NaiveDateTime;
use prettytable::{format, row, Table};
use serde::Serialize;

use crate::order::{OrderRow, ParsedOrders, Side};

/// Aggregate sell-side price per GPU-hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SellStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl SellStats {
    /// `None` when there are no sell orders.
    pub fn compute(rows: &[OrderRow]) -> Option<Self> {
        let mut prices: Vec<f64> = rows
            .iter()
            .filter(|r| r.side == Side::Sell)
            .map(|r| r.price_per_hour)
            .collect();
        if prices.is_empty() {
            return None;
        }
        prices.sort_by(f64::total_cmp);

        let n = prices.len();
        let mean = prices.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            prices[n / 2]
        } else {
            (prices[n / 2 - 1] + prices[n / 2]) / 2.0
        };
        Some(Self {
            count: n,
            mean,
            median,
            min: prices[0],
            max: prices[n - 1],
        })
    }
}

pub fn format_statistics(stats: Option<&SellStats>) -> String {
    match stats {
        Some(s) => format!(
            "Average price per H100 hour (sell orders): {:.2}\n\
             Median price per H100 hour (sell orders): {:.2}\n\
             Min price per H100 hour (sell orders): {:.2}\n\
             Max price per H100 hour (sell orders): {:.2}\n",
            s.mean, s.median, s.min, s.max
        ),
        None => "No open sell orders; no price statistics.\n".to_string(),
    }
}

/// Rows sorted by start time, dropping those starting past `max_future` hours.
pub fn visible_rows<'a>(
    rows: &'a [OrderRow],
    now: NaiveDateTime,
    max_future: Option<f64>,
) -> Vec<&'a OrderRow> {
    let mut visible: Vec<&OrderRow> = rows
        .iter()
        .filter(|r| match max_future {
            Some(h) => r.start_offset_hours(now) <= h,
            None => true,
        })
        .collect();
    visible.sort_by_key(|r| r.start);
    visible
}

pub fn orders_table(rows: &[OrderRow], now: NaiveDateTime, max_future: Option<f64>) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row![
        "Start in Future (hrs)",
        "Side",
        "Price per Hour ($)",
        "Quantity",
        "Duration (h)"
    ]);
    for o in visible_rows(rows, now, max_future) {
        table.add_row(row![
            format!("{:.2}", o.start_offset_hours(now)),
            o.side.as_str(),
            format!("{:.2}", o.price_per_hour),
            o.quantity,
            format!("{:.2}", o.duration_hours)
        ]);
    }
    table
}

/// Machine-readable run result for `--json`.
#[derive(Debug, Serialize)]
pub struct Overview<'a> {
    pub generated_at: String,
    pub source: &'a str,
    pub max_future_hours: Option<f64>,
    pub orders: &'a [OrderRow],
    pub stats: Option<SellStats>,
    pub skipped: usize,
    pub warnings: &'a [String],
}

impl<'a> Overview<'a> {
    pub fn new(source: &'a str, parsed: &'a ParsedOrders, max_future_hours: Option<f64>) -> Self {
        Self {
            generated_at: crate::logging::ts_now(),
            source,
            max_future_hours,
            orders: &parsed.orders,
            stats: SellStats::compute(&parsed.orders),
            skipped: parsed.skipped,
            warnings: &parsed.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Status;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 4).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    /// Order whose price per GPU-hour equals `pph` (1 node, 1 hour).
    fn order(side: Side, start_h: i64, pph: f64) -> OrderRow {
        OrderRow::new(
            side,
            Status::Open,
            pph * 8.0,
            1,
            1.0,
            now() + chrono::Duration::hours(start_h),
            8,
        )
        .unwrap()
    }

    #[test]
    fn stats_over_sell_side_only() {
        let rows = vec![
            order(Side::Sell, 0, 3.0),
            order(Side::Buy, 0, 100.0),
            order(Side::Sell, 1, 1.0),
            order(Side::Sell, 2, 2.0),
        ];
        let s = SellStats::compute(&rows).unwrap();
        assert_eq!(s.count, 3);
        assert!((s.mean - 2.0).abs() < 1e-9);
        assert!((s.median - 2.0).abs() < 1e-9);
        assert!((s.min - 1.0).abs() < 1e-9);
        assert!((s.max - 3.0).abs() < 1e-9);
    }

    #[test]
    fn even_count_median_averages_middle() {
        let rows = vec![
            order(Side::Sell, 0, 4.0),
            order(Side::Sell, 0, 1.0),
            order(Side::Sell, 0, 2.0),
            order(Side::Sell, 0, 3.0),
        ];
        let s = SellStats::compute(&rows).unwrap();
        assert!((s.median - 2.5).abs() < 1e-9);
    }

    #[test]
    fn no_sell_orders() {
        assert!(SellStats::compute(&[order(Side::Buy, 0, 1.0)]).is_none());
        assert!(format_statistics(None).contains("No open sell orders"));
    }

    #[test]
    fn statistics_lines() {
        let s = SellStats::compute(&[order(Side::Sell, 0, 1.234)]).unwrap();
        let text = format_statistics(Some(&s));
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("Average price per H100 hour (sell orders): 1.23"));
        assert!(text.contains("Max price per H100 hour (sell orders): 1.23"));
    }

    #[test]
    fn table_sorted_and_limited() {
        let rows = vec![
            order(Side::Sell, 5, 1.0),
            order(Side::Sell, 1, 2.0),
            order(Side::Buy, 50, 3.0),
        ];
        let visible = visible_rows(&rows, now(), Some(10.0));
        assert_eq!(visible.len(), 2);
        assert!(visible[0].start < visible[1].start);

        let text = orders_table(&rows, now(), Some(10.0)).to_string();
        assert!(text.contains("Price per Hour ($)"));
        assert!(text.contains("1.00"));
        assert!(!text.contains("50.00"));
    }
}
