//! Terminal timeline of open orders: hours from now on the x axis, price per
//! GPU-hour on the y axis, one horizontal bar per order.

use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::order::{OrderRow, Side};

pub const TITLE: &str = "H100 Pricing: Price per Hour vs Time";
pub const X_LABEL: &str = "Hours in the Future";
pub const Y_LABEL: &str = "Price per H100 Hour ($)";

/// Fill glyph per `quantity % 8`.
const QUANTITY_GLYPHS: [char; 8] = ['█', '▓', '▒', '░', '#', '%', '@', '*'];
const BUY_GLYPH: char = '/';
const Y_LABEL_WIDTH: usize = 8;
const MIN_WIDTH: usize = 16;
const MIN_HEIGHT: usize = 4;

pub fn quantity_glyph(quantity: u32) -> char {
    QUANTITY_GLYPHS[(quantity % 8) as usize]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub side: Side,
    pub quantity: u32,
    pub price_per_hour: f64,
    /// Hours from now; negative when the order is already running.
    pub start: f64,
    /// Hours from now, clipped to the horizon when one is set.
    pub end: f64,
}

#[derive(Debug, Clone)]
pub struct Timeline {
    pub bars: Vec<Bar>,
    pub x_max: f64,
    pub y_max: f64,
    pub quantities: BTreeSet<u32>,
}

impl Timeline {
    pub fn build(rows: &[OrderRow], now: NaiveDateTime, max_future: Option<f64>) -> Self {
        let horizon = max_future.filter(|h| *h > 0.0);

        let bars: Vec<Bar> = rows
            .iter()
            .filter_map(|row| {
                let start = row.start_offset_hours(now);
                let end = row.end_offset_hours(now);
                let span = match horizon {
                    Some(h) if start > h => None,
                    Some(h) => Some((start, end.min(h))),
                    None => Some((start, end)),
                };
                span.map(|(start, end)| Bar {
                    side: row.side,
                    quantity: row.quantity,
                    price_per_hour: row.price_per_hour,
                    start,
                    end,
                })
            })
            .collect();

        let x_max = horizon.unwrap_or_else(|| {
            rows.iter()
                .map(|r| r.end_offset_hours(now))
                .fold(0.0_f64, f64::max)
                + 1.0
        });
        let y_max = rows.iter().map(|r| r.price_per_hour).fold(0.0_f64, f64::max) + 0.5;
        let quantities = rows.iter().map(|r| r.quantity).collect();

        Self {
            bars,
            x_max,
            y_max,
            quantities,
        }
    }

    fn col(&self, hours: f64, width: usize) -> usize {
        let c = (hours / self.x_max * width as f64).floor();
        c.clamp(0.0, (width - 1) as f64) as usize
    }

    fn row(&self, price: f64, height: usize) -> usize {
        let from_bottom = (price / self.y_max * height as f64).floor();
        let from_bottom = from_bottom.clamp(0.0, (height - 1) as f64) as usize;
        height - 1 - from_bottom
    }

    fn plot(&self, width: usize, height: usize) -> Vec<Vec<char>> {
        let mut grid = vec![vec![' '; width]; height];
        for bar in &self.bars {
            if bar.end <= 0.0 || bar.start >= self.x_max {
                continue;
            }
            let fill = quantity_glyph(bar.quantity);
            let row = self.row(bar.price_per_hour, height);
            let first = self.col(bar.start.max(0.0), width);
            let last = self.col(bar.end, width).max(first);
            for (c, cell) in grid[row].iter_mut().enumerate().take(last + 1).skip(first) {
                // Buy bars interleave the hatch with their quantity glyph.
                *cell = match bar.side {
                    Side::Buy if c % 2 == 1 => BUY_GLYPH,
                    _ => fill,
                };
            }
        }
        grid
    }

    fn x_ticks(&self, width: usize) -> String {
        let mut line = vec![' '; width + Y_LABEL_WIDTH];
        let mut next_free = 0;
        for frac in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let label = format!("{:.1}", self.x_max * frac);
            let anchor = Y_LABEL_WIDTH + (frac * (width - 1) as f64).round() as usize;
            if label.len() > line.len() {
                continue;
            }
            let start = anchor.saturating_sub(label.len() / 2).min(line.len() - label.len());
            if start < next_free {
                continue;
            }
            for (i, ch) in label.chars().enumerate() {
                line[start + i] = ch;
            }
            next_free = start + label.len() + 1;
        }
        line.into_iter().collect::<String>().trim_end().to_string()
    }

    pub fn render(&self, width: usize, height: usize) -> String {
        let width = width.max(MIN_WIDTH);
        let height = height.max(MIN_HEIGHT);
        let mut out = String::new();
        let _ = writeln!(out, "{}", TITLE);

        if self.bars.is_empty() {
            let _ = writeln!(out, "(no open orders to plot)");
            return out;
        }

        let _ = writeln!(out, "{}", Y_LABEL);
        let grid = self.plot(width, height);
        for (r, cells) in grid.iter().enumerate() {
            let labelled = r % 4 == 0 || r == height - 1;
            let prefix = if labelled {
                let lower = self.y_max * (height - 1 - r) as f64 / height as f64;
                format!("{:>6.2} ┤", lower)
            } else {
                format!("{:>6} │", "")
            };
            let body: String = cells.iter().collect();
            let _ = writeln!(out, "{}{}", prefix, body.trim_end());
        }
        let _ = writeln!(out, "{:>6} └{}", "", "─".repeat(width));
        let _ = writeln!(out, "{}", self.x_ticks(width));
        let _ = writeln!(out, "{:>w$}", X_LABEL, w = Y_LABEL_WIDTH + (width + X_LABEL.len()) / 2);

        let legend: Vec<String> = self
            .quantities
            .iter()
            .map(|q| format!("{} Quantity: {}", quantity_glyph(*q), q))
            .collect();
        let _ = writeln!(out, "Legend: {}", legend.join("  "));
        let _ = writeln!(
            out,
            "        solid = Sell Order  glyph{}glyph{} = Buy Order",
            BUY_GLYPH, BUY_GLYPH
        );
        out
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

    fn order(side: Side, start_h: i64, hours: f64, quantity: u32, price: f64) -> OrderRow {
        OrderRow::new(
            side,
            Status::Open,
            price,
            quantity,
            hours,
            now() + chrono::Duration::hours(start_h),
            8,
        )
        .unwrap()
    }

    #[test]
    fn ranges_without_horizon() {
        // 24h * 1 node * 8 = 192 unit-hours; $384 -> $2/h
        let rows = vec![order(Side::Sell, 2, 24.0, 1, 384.0), order(Side::Buy, 10, 4.0, 2, 64.0)];
        let tl = Timeline::build(&rows, now(), None);
        assert_eq!(tl.bars.len(), 2);
        assert!((tl.x_max - 27.0).abs() < 1e-9);
        assert!((tl.y_max - 2.5).abs() < 1e-9);
        assert_eq!(tl.quantities.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn horizon_filters_and_clips() {
        let rows = vec![order(Side::Sell, 2, 24.0, 1, 384.0), order(Side::Sell, 30, 4.0, 1, 32.0)];
        let tl = Timeline::build(&rows, now(), Some(12.0));
        assert_eq!(tl.bars.len(), 1);
        assert!((tl.bars[0].end - 12.0).abs() < 1e-9);
        assert!((tl.x_max - 12.0).abs() < 1e-9);
        // y range still covers every order
        assert!((tl.y_max - 2.5).abs() < 1e-9);
    }

    #[test]
    fn non_positive_horizon_ignored() {
        let rows = vec![order(Side::Sell, 2, 24.0, 1, 384.0)];
        let tl = Timeline::build(&rows, now(), Some(0.0));
        assert!((tl.x_max - 27.0).abs() < 1e-9);
    }

    #[test]
    fn render_draws_sides_with_distinct_glyphs() {
        let rows = vec![order(Side::Sell, 0, 12.0, 1, 192.0), order(Side::Buy, 0, 12.0, 3, 96.0)];
        let out = Timeline::build(&rows, now(), None).render(40, 10);
        assert!(out.starts_with(TITLE));
        assert!(out.contains(quantity_glyph(1)));
        let hatched: String = [quantity_glyph(3), BUY_GLYPH].iter().collect();
        assert!(out.contains(&hatched.repeat(2)), "{}", out);
        assert!(out.contains("= Buy Order"));
        assert!(out.contains("Quantity: 1"));
        assert!(out.contains("Quantity: 3"));
        assert!(out.contains(X_LABEL));
        assert!(out.contains("0.00 ┤"));
    }

    #[test]
    fn buy_bars_keep_their_quantity_glyph() {
        let rows = vec![order(Side::Buy, 0, 12.0, 2, 96.0)];
        let grid = Timeline::build(&rows, now(), None).plot(20, 5);
        let cells: Vec<char> = grid.iter().flatten().copied().filter(|c| *c != ' ').collect();
        assert!(cells.contains(&quantity_glyph(2)));
        assert!(cells.contains(&BUY_GLYPH));
        assert!(cells.iter().all(|c| *c == quantity_glyph(2) || *c == BUY_GLYPH));
    }

    #[test]
    fn huge_horizon_drops_ticks_that_do_not_fit() {
        let rows = vec![order(Side::Sell, 0, 12.0, 1, 192.0)];
        let tl = Timeline::build(&rows, now(), Some(1e100));
        let out = tl.render(72, 20);
        assert!(out.contains(X_LABEL));
        assert!(out.contains("0.0"));
        // narrowest chart too
        let out = tl.render(1, 1);
        assert!(out.starts_with(TITLE));
    }

    #[test]
    fn bars_before_now_are_not_drawn() {
        let rows = vec![order(Side::Sell, -10, 2.0, 1, 16.0)];
        let tl = Timeline::build(&rows, now(), None);
        let grid = tl.plot(20, 5);
        assert!(grid.iter().flatten().all(|c| *c == ' '));
    }

    #[test]
    fn render_empty() {
        let out = Timeline::build(&[], now(), Some(5.0)).render(40, 10);
        assert!(out.contains("no open orders"));
    }
}
