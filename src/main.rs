use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use marketview::config::Config;
use marketview::logging::{log, obj, v_str, Domain, Level};
use marketview::overview::{run, RenderOptions};
use marketview::source::SourceKind;

/// Plot open compute orders and print sell-side price statistics.
#[derive(Parser, Debug)]
#[command(name = "marketview", version, about)]
struct Cli {
    /// Maximum number of hours into the future to display
    #[arg(long, value_name = "HOURS", value_parser = parse_positive_hours)]
    max_future: Option<f64>,

    /// Where to read orders from (cli, file, api)
    #[arg(long, value_parser = SourceKind::parse)]
    source: Option<SourceKind>,

    /// Captured `sf orders ls` output; implies --source file
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// GPUs per node used to normalize prices
    #[arg(long, value_name = "N")]
    units_per_node: Option<u32>,

    /// Emit orders and statistics as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Skip the timeline chart
    #[arg(long)]
    no_chart: bool,

    /// Skip the order table
    #[arg(long)]
    no_table: bool,

    /// Chart width in columns
    #[arg(long, value_name = "COLS")]
    width: Option<usize>,

    /// Chart height in rows
    #[arg(long, value_name = "ROWS")]
    height: Option<usize>,
}

fn parse_positive_hours(s: &str) -> Result<f64, String> {
    let hours: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if hours.is_finite() && hours > 0.0 {
        Ok(hours)
    } else {
        Err("must be a positive number of hours".to_string())
    }
}

impl Cli {
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(h) = self.max_future {
            cfg.max_future_hours = Some(h);
        }
        if let Some(path) = &self.input {
            cfg.input_path = Some(path.clone());
            cfg.source = SourceKind::File;
        }
        if let Some(kind) = self.source {
            cfg.source = kind;
        }
        if let Some(n) = self.units_per_node {
            cfg.units_per_node = n;
        }
        if let Some(w) = self.width {
            cfg.chart_width = w;
        }
        if let Some(h) = self.height {
            cfg.chart_height = h;
        }
        cfg
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            json: self.json,
            chart: !self.no_chart,
            table: !self.no_table,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.apply(Config::from_env());

    match run(&cfg, cli.render_options()).await {
        Ok(out) => {
            print!("{}", out);
            Ok(())
        }
        Err(err) => {
            log(
                Level::Error,
                Domain::System,
                "failed",
                obj(&[("msg", v_str(&format!("{:#}", err)))]),
            );
            Err(err)
        }
    }
}
