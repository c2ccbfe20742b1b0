//! The fetch → parse → render pipeline behind the `marketview` command.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};

use crate::chart::Timeline;
use crate::config::Config;
use crate::logging::{info, obj, v_num, v_str, Domain, ProfileScope};
use crate::order::ParsedOrders;
use crate::report::{format_statistics, orders_table, Overview, SellStats};

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub json: bool,
    pub chart: bool,
    pub table: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            json: false,
            chart: true,
            table: true,
        }
    }
}

/// Fetch from the configured source and parse into open orders.
pub async fn fetch_orders(cfg: &Config) -> Result<ParsedOrders> {
    let source = cfg.source.build(cfg)?;
    let output = {
        let _scope = ProfileScope::new("fetch");
        source
            .fetch()
            .await
            .with_context(|| format!("fetching orders from {} source", source.name()))?
    };
    let _scope = ProfileScope::new("parse");
    Ok(output.into_orders(cfg.units_per_node))
}

pub fn render_overview(
    parsed: &ParsedOrders,
    cfg: &Config,
    now: NaiveDateTime,
    opts: RenderOptions,
) -> Result<String> {
    let _scope = ProfileScope::new("render");
    if opts.json {
        let doc = Overview::new(cfg.source.as_str(), parsed, cfg.max_future_hours);
        let mut out = serde_json::to_string_pretty(&doc).context("serializing overview")?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    if opts.chart {
        let timeline = Timeline::build(&parsed.orders, now, cfg.max_future_hours);
        out.push_str(&timeline.render(cfg.chart_width, cfg.chart_height));
        out.push('\n');
    }
    if opts.table {
        out.push_str(&orders_table(&parsed.orders, now, cfg.max_future_hours).to_string());
        out.push('\n');
    }
    out.push_str(&format_statistics(SellStats::compute(&parsed.orders).as_ref()));
    Ok(out)
}

/// Run the whole pipeline against the local clock.
pub async fn run(cfg: &Config, opts: RenderOptions) -> Result<String> {
    info(
        Domain::System,
        "start",
        obj(&[
            ("source", v_str(cfg.source.as_str())),
            ("units_per_node", v_num(cfg.units_per_node as f64)),
        ]),
    );
    let parsed = fetch_orders(cfg).await?;
    let out = render_overview(&parsed, cfg, Local::now().naive_local(), opts)?;
    info(
        Domain::Render,
        "done",
        obj(&[
            ("orders", v_num(parsed.orders.len() as f64)),
            ("skipped", v_num(parsed.skipped as f64)),
        ]),
    );
    Ok(out)
}
