//! Plain-text tables for terminal listings.

use std::fmt::Write as _;

use itertools::Itertools;

use crate::config::{ConfigKey, ProcessingConfig};

const COLUMN_GAP: &str = "  ";

fn flatten(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}

fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    format!("{value}{}", " ".repeat(width.saturating_sub(len)))
}

fn format_line(values: &[String], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(value, width)| pad(value, *width))
        .join(COLUMN_GAP)
        .trim_end()
        .to_string()
}

/// Left-aligned columns separated by two spaces, with a dashed rule under the
/// header. Cells beyond the header width are dropped.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let headers = headers.iter().map(|h| flatten(h)).collect::<Vec<_>>();
    let rows = rows
        .iter()
        .map(|row| row.iter().take(headers.len()).map(|c| flatten(c)).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let widths = (0..headers.len())
        .map(|idx| {
            rows.iter()
                .filter_map(|row| row.get(idx))
                .chain(std::iter::once(&headers[idx]))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .max(3)
        })
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_line(&headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_line(&rule, &widths));
    for row in &rows {
        let _ = writeln!(output, "{}", format_line(row, &widths));
    }
    output
}

/// One line per registered configuration.
pub fn render_registry() -> String {
    let rows = ConfigKey::ALL
        .into_iter()
        .map(|key| {
            let config = ProcessingConfig::for_key(key);
            let sort = if config.sort_by.is_empty() {
                "-".to_string()
            } else {
                config.sort_by.iter().map(|s| s.describe()).join(", ")
            };
            vec![
                key.name().to_string(),
                config.required_columns.join(", "),
                sort,
                config.describe_strategy(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&["key", "required columns", "sort", "strategy"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_aligned_and_trailing_space_trimmed() {
        let rendered = render_table(
            &["a", "long header"],
            &[vec!["value".into(), "x".into()], vec!["b\tc".into(), String::new()]],
        );
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "a      long header");
        assert_eq!(lines[1], "-----  -----------");
        assert_eq!(lines[2], "value  x");
        assert_eq!(lines[3], "b c");
    }

    #[test]
    fn registry_lists_every_key() {
        let rendered = render_registry();
        for key in ConfigKey::ALL {
            assert!(rendered.contains(key.name()), "{rendered}");
        }
        assert!(rendered.contains("VIN:asc, PRICE:desc"), "{rendered}");
    }
}
