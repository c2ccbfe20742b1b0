//! Box-drawn table cleanup and splitting.
//!
//! The `sf` listing is drawn with `│` column separators and may carry ANSI
//! color codes. Only lines containing a separator are considered; the first
//! such line is the header.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const COLUMN_SEPARATOR: char = '│';

fn ansi_pattern() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| {
        Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("static ANSI pattern")
    })
}

pub fn strip_ansi(line: &str) -> String {
    ansi_pattern().replace_all(line, "").into_owned()
}

/// Lines of `output` that belong to the table body, trimmed and uncolored.
pub fn table_lines(output: &str) -> Vec<String> {
    output
        .trim()
        .split('\n')
        .filter(|line| line.contains(COLUMN_SEPARATOR))
        .map(|line| strip_ansi(line.trim()))
        .collect()
}

/// Cells between the outer borders of a table line.
pub fn split_cells(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.split(COLUMN_SEPARATOR).collect();
    if parts.len() < 2 {
        return Vec::new();
    }
    parts[1..parts.len() - 1]
        .iter()
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// One data row keyed by header name.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    cells: HashMap<String, String>,
    raw: String,
}

impl TableRow {
    pub fn get(&self, column: &str) -> Result<&str, String> {
        self.cells
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| format!("missing column {:?}", column))
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
    /// Table lines seen, header included.
    pub lines: usize,
    /// Lines dropped because their cell count differs from the header's.
    pub mismatched: usize,
}

pub fn parse_listing(output: &str) -> Listing {
    let lines = table_lines(output);
    let Some(header_line) = lines.first() else {
        return Listing::default();
    };
    let headers = split_cells(header_line);

    let mut rows = Vec::new();
    let mut mismatched = 0;
    for line in &lines[1..] {
        let values = split_cells(line);
        if values.len() != headers.len() {
            mismatched += 1;
            continue;
        }
        rows.push(TableRow {
            cells: headers.iter().cloned().zip(values).collect(),
            raw: line.clone(),
        });
    }

    Listing {
        headers,
        rows,
        lines: lines.len(),
        mismatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_color_codes() {
        assert_eq!(strip_ansi("\x1b[32mopen\x1b[0m"), "open");
        assert_eq!(strip_ansi("\x1b[1;31m│ sell │\x1b[39m"), "│ sell │");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn splits_inner_cells() {
        assert_eq!(split_cells("│ a │  b │c│"), vec!["a", "b", "c"]);
        assert!(split_cells("no separators").is_empty());
    }

    #[test]
    fn header_and_rows_keyed() {
        let out = "\
┌──────┬────────┐
│ Side │ Status │
├──────┼────────┤
│ sell │ open   │
│ buy  │ filled │
└──────┴────────┘
";
        let listing = parse_listing(out);
        assert_eq!(listing.headers, vec!["Side", "Status"]);
        assert_eq!(listing.rows.len(), 2);
        assert_eq!(listing.rows[0].get("Side").unwrap(), "sell");
        assert_eq!(listing.rows[1].get("Status").unwrap(), "filled");
        assert!(listing.rows[0].get("Price").is_err());
        assert_eq!(listing.lines, 3);
        assert_eq!(listing.mismatched, 0);
    }

    #[test]
    fn mismatched_rows_skipped() {
        let out = "│ A │ B │\n│ 1 │ 2 │\n│ only │\n";
        let listing = parse_listing(out);
        assert_eq!(listing.rows.len(), 1);
        assert_eq!(listing.mismatched, 1);
    }

    #[test]
    fn empty_output() {
        let listing = parse_listing("No orders found.\n");
        assert!(listing.headers.is_empty());
        assert!(listing.rows.is_empty());
    }
}
