use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::logging::{log_parse_summary, log_skipped_row, obj, v_num, v_str, warn, Domain};
use crate::table::{Listing, TableRow};
use crate::units::{hours_to_duration, parse_duration, parse_price, parse_start};

/// GPUs per node; the divisor that turns node-hours into GPU-hours.
pub const DEFAULT_UNITS_PER_NODE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("unknown side {:?}", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Open,
    Other(String),
}

impl Status {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "open" => Status::Open,
            other => Status::Other(other.to_string()),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Status::Open)
    }
}

/// One open market order with its normalized price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRow {
    pub side: Side,
    pub status: Status,
    /// Total order price in dollars.
    pub price: f64,
    /// Node count.
    pub quantity: u32,
    pub duration_hours: f64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Dollars per GPU per hour; zero when the denominator is zero.
    pub price_per_hour: f64,
}

/// `price / (hours * quantity * units_per_node)`, or `None` on a zero denominator.
pub fn price_per_unit_hour(price: f64, hours: f64, quantity: u32, units_per_node: u32) -> Option<f64> {
    let denom = hours * quantity as f64 * units_per_node as f64;
    if denom == 0.0 {
        None
    } else {
        Some(price / denom)
    }
}

impl OrderRow {
    pub fn new(
        side: Side,
        status: Status,
        price: f64,
        quantity: u32,
        duration_hours: f64,
        start: NaiveDateTime,
        units_per_node: u32,
    ) -> Result<Self, String> {
        let end = hours_to_duration(duration_hours)
            .and_then(|d| start.checked_add_signed(d))
            .ok_or_else(|| format!("duration of {} hours is out of range", duration_hours))?;
        let price_per_hour = price_per_unit_hour(price, duration_hours, quantity, units_per_node)
            .unwrap_or_else(|| {
                warn(
                    Domain::Parse,
                    "zero_denominator",
                    obj(&[
                        ("msg", v_str("price per hour set to 0")),
                        ("price", v_num(price)),
                        ("duration_hours", v_num(duration_hours)),
                        ("quantity", v_num(quantity as f64)),
                    ]),
                );
                0.0
            });
        Ok(Self {
            side,
            status,
            price,
            quantity,
            duration_hours,
            start,
            end,
            price_per_hour,
        })
    }

    pub fn from_cells(row: &TableRow, units_per_node: u32) -> Result<Self, String> {
        let side = Side::parse(row.get("Side")?)?;
        let status = Status::parse(row.get("Status")?);
        let price = parse_price(row.get("Price")?)?;
        let quantity_cell = row.get("Quantity")?;
        let quantity = quantity_cell
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("bad quantity {:?}: {}", quantity_cell, e))?;
        let duration_hours = parse_duration(row.get("Duration")?)?;
        let start = parse_start(row.get("Start")?)?;
        Self::new(side, status, price, quantity, duration_hours, start, units_per_node)
    }

    /// Build from an HTTP API order. Prices there are in cents and the window
    /// is given explicitly, so the duration is derived from it.
    pub fn from_api(order: &ApiOrder, units_per_node: u32) -> Result<Self, String> {
        let start = parse_rfc3339_local(&order.start_at)?;
        let end = parse_rfc3339_local(&order.end_at)?;
        let duration_hours = (end - start).num_seconds() as f64 / 3600.0;
        if duration_hours < 0.0 {
            return Err(format!("order {} ends before it starts", order.id));
        }
        Self::new(
            Side::parse(&order.side)?,
            Status::parse(&order.status),
            order.price as f64 / 100.0,
            order.quantity,
            duration_hours,
            start,
            units_per_node,
        )
    }

    /// Hours from `now` to the start of the order (negative if already running).
    pub fn start_offset_hours(&self, now: NaiveDateTime) -> f64 {
        (self.start - now).num_seconds() as f64 / 3600.0
    }

    pub fn end_offset_hours(&self, now: NaiveDateTime) -> f64 {
        (self.end - now).num_seconds() as f64 / 3600.0
    }
}

fn parse_rfc3339_local(s: &str) -> Result<NaiveDateTime, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Local).naive_local())
        .map_err(|e| format!("bad timestamp {:?}: {}", s, e))
}

/// Order as returned by `GET /v0/orders`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiOrder {
    #[serde(default)]
    pub id: String,
    pub side: String,
    pub status: String,
    /// Cents.
    pub price: i64,
    pub quantity: u32,
    pub start_at: String,
    pub end_at: String,
    #[serde(default)]
    pub instance_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedOrders {
    pub orders: Vec<OrderRow>,
    /// Rows dropped because their status is not open.
    pub not_open: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

impl ParsedOrders {
    fn push(&mut self, parsed: Result<OrderRow, String>, raw: &str) {
        match parsed {
            Ok(order) if order.status.is_open() => self.orders.push(order),
            Ok(_) => self.not_open += 1,
            Err(reason) => {
                log_skipped_row(&reason, raw);
                self.skipped += 1;
                self.warnings.push(format!("bad_row: {}", reason));
            }
        }
    }
}

/// Convert listing rows into open orders, collecting bad rows as warnings.
pub fn parse_orders(listing: &Listing, units_per_node: u32) -> ParsedOrders {
    let mut parsed = ParsedOrders::default();
    if listing.mismatched > 0 {
        parsed
            .warnings
            .push(format!("mismatched_rows: {}", listing.mismatched));
    }
    for row in &listing.rows {
        // Non-open rows are dropped before their other cells are validated.
        if let Ok(status) = row.get("Status") {
            if !Status::parse(status).is_open() {
                parsed.not_open += 1;
                continue;
            }
        }
        parsed.push(OrderRow::from_cells(row, units_per_node), row.raw());
    }
    log_parse_summary(listing.lines, parsed.orders.len(), parsed.skipped);
    parsed
}

pub fn parse_api_orders(orders: &[ApiOrder], units_per_node: u32) -> ParsedOrders {
    let mut parsed = ParsedOrders::default();
    for order in orders {
        let raw = serde_json::to_string(order).unwrap_or_default();
        parsed.push(OrderRow::from_api(order, units_per_node), &raw);
    }
    log_parse_summary(orders.len(), parsed.orders.len(), parsed.skipped);
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::parse_listing;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 4).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    const LISTING: &str = "\
│ Side │ Status    │ Price     │ Quantity │ Duration │ Start                  │
│ sell │ open      │ $1,536.00 │ 2        │ 1d       │ 07/04/2024, 10:00:00 AM │
│ buy  │ open      │ $96.00    │ 1        │ 6h       │ 07/04/2024, 01:00:00 PM │
│ sell │ cancelled │ $10.00    │ 1        │ 1h       │ 07/04/2024, 01:00:00 PM │
│ sell │ open      │ $5.00     │ 0        │ 1h       │ 07/04/2024, 01:00:00 PM │
│ sell │ open      │ $oops     │ 1        │ 1h       │ 07/04/2024, 01:00:00 PM │
";

    #[test]
    fn derives_price_per_gpu_hour() {
        let row = OrderRow::new(Side::Sell, Status::Open, 1536.0, 2, 24.0, at(10), 8).unwrap();
        assert!((row.price_per_hour - 4.0).abs() < 1e-9);
        assert_eq!(row.end, at(10) + chrono::Duration::hours(24));
    }

    #[test]
    fn zero_denominator_guard() {
        assert_eq!(price_per_unit_hour(5.0, 0.0, 1, 8), None);
        assert_eq!(price_per_unit_hour(5.0, 1.0, 0, 8), None);
        let row = OrderRow::new(Side::Sell, Status::Open, 5.0, 0, 1.0, at(1), 8).unwrap();
        assert_eq!(row.price_per_hour, 0.0);
    }

    #[test]
    fn parses_open_rows_of_both_sides() {
        let parsed = parse_orders(&parse_listing(LISTING), DEFAULT_UNITS_PER_NODE);
        assert_eq!(parsed.orders.len(), 3);
        assert_eq!(parsed.not_open, 1);
        assert_eq!(parsed.skipped, 1);
        assert!(parsed.warnings[0].contains("bad price"));

        let buy = &parsed.orders[1];
        assert_eq!(buy.side, Side::Buy);
        assert!((buy.price_per_hour - 2.0).abs() < 1e-9);
        assert_eq!(buy.end, at(19));

        assert_eq!(parsed.orders[2].quantity, 0);
        assert_eq!(parsed.orders[2].price_per_hour, 0.0);
    }

    #[test]
    fn overflowing_duration_row_is_skipped() {
        let listing = parse_listing(
            "\
│ Side │ Status │ Price  │ Quantity │ Duration     │ Start                   │
│ sell │ open   │ $8.00  │ 1        │ 1h           │ 07/04/2024, 01:00:00 PM │
│ sell │ open   │ $8.00  │ 1        │ 99999999999w │ 07/04/2024, 01:00:00 PM │
",
        );
        let parsed = parse_orders(&listing, DEFAULT_UNITS_PER_NODE);
        assert_eq!(parsed.orders.len(), 1);
        assert_eq!(parsed.skipped, 1);
        assert!(parsed.warnings[0].contains("out of range"), "{:?}", parsed.warnings);
    }

    #[test]
    fn new_rejects_unrepresentable_end() {
        assert!(OrderRow::new(Side::Buy, Status::Open, 1.0, 1, 1e300, at(0), 8).is_err());
    }

    #[test]
    fn api_order_in_cents() {
        let order = ApiOrder {
            id: "ordr_1".to_string(),
            side: "sell".to_string(),
            status: "open".to_string(),
            price: 64_000,
            quantity: 1,
            start_at: "2024-07-04T10:00:00Z".to_string(),
            end_at: "2024-07-05T10:00:00Z".to_string(),
            instance_type: None,
        };
        let row = OrderRow::from_api(&order, 8).unwrap();
        assert!((row.price - 640.0).abs() < 1e-9);
        assert!((row.duration_hours - 24.0).abs() < 1e-9);
        assert!((row.price_per_hour - 640.0 / 192.0).abs() < 1e-9);
    }

    #[test]
    fn api_order_reversed_window_rejected() {
        let order = ApiOrder {
            id: "ordr_2".to_string(),
            side: "buy".to_string(),
            status: "open".to_string(),
            price: 100,
            quantity: 1,
            start_at: "2024-07-05T10:00:00Z".to_string(),
            end_at: "2024-07-04T10:00:00Z".to_string(),
            instance_type: None,
        };
        assert!(OrderRow::from_api(&order, 8).is_err());
        let parsed = parse_api_orders(&[order], 8);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn side_and_status_parsing() {
        assert_eq!(Side::parse(" Sell ").unwrap(), Side::Sell);
        assert!(Side::parse("hold").is_err());
        assert!(Status::parse("open").is_open());
        assert_eq!(Status::parse("filled"), Status::Other("filled".to_string()));
    }
}
