//! Output formatting utilities

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::OutputFormat;
use crate::structure::resolver::Component;

/// Determine the effective output format based on context
pub fn effective_format(format: OutputFormat, is_list: bool) -> OutputFormat {
    match format {
        OutputFormat::Auto => {
            if is_list {
                OutputFormat::Table
            } else {
                OutputFormat::Yaml
            }
        }
        other => other,
    }
}

/// Print list rows in the requested format
pub fn print_rows<R>(rows: &[R], format: OutputFormat) -> Result<()>
where
    R: Tabled + Serialize,
{
    match effective_format(format, true) {
        OutputFormat::Json => print_value(rows, OutputFormat::Json),
        OutputFormat::Yaml => print_value(rows, OutputFormat::Yaml),
        OutputFormat::Tsv => write_delimited(rows, b'\t'),
        OutputFormat::Csv => write_delimited(rows, b','),
        OutputFormat::Auto | OutputFormat::Table | OutputFormat::Tree => {
            if rows.is_empty() {
                return Ok(());
            }
            let mut table = Table::new(rows);
            table.with(Style::modern());
            println!("{}", table);
            Ok(())
        }
    }
}

fn write_delimited<R: Tabled>(rows: &[R], delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(io::stdout());
    writer
        .write_record(R::headers().iter().map(|h| h.as_bytes()))
        .into_diagnostic()?;
    for row in rows {
        writer
            .write_record(row.fields().iter().map(|f| f.as_bytes()))
            .into_diagnostic()?;
    }
    writer.flush().into_diagnostic()?;
    Ok(())
}

/// Print a single value as JSON or YAML; other formats fall back to YAML
pub fn print_value<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
        }
        _ => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
        }
    }
    Ok(())
}

/// Print a resolved structure; `Auto` renders the indented tree
pub fn print_tree(tree: &Component, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_value(tree, format),
        OutputFormat::Tsv | OutputFormat::Csv | OutputFormat::Table => {
            let rows = flatten_tree(tree);
            print_rows(&rows, format)
        }
        OutputFormat::Auto | OutputFormat::Tree => {
            print!("{}", tree.render());
            Ok(())
        }
    }
}

/// One tree node as a table row
#[derive(Debug, Tabled, Serialize)]
pub struct TreeRow {
    #[tabled(rename = "PATH")]
    pub path: String,
    #[tabled(rename = "DEPTH")]
    pub depth: usize,
    #[tabled(rename = "PART")]
    pub part: String,
    #[tabled(rename = "ITERATION")]
    pub iteration: String,
    #[tabled(rename = "LINK")]
    pub link: String,
    #[tabled(rename = "AMOUNT")]
    pub amount: String,
}

/// Pre-order rows of a tree; virtual nodes are skipped
pub fn flatten_tree(tree: &Component) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    collect_rows(tree, 0, &mut rows);
    rows
}

fn collect_rows(node: &Component, depth: usize, rows: &mut Vec<TreeRow>) {
    if let crate::structure::resolver::ComponentKind::Part {
        part,
        version,
        iteration,
        link,
        amount,
        unit,
        ..
    } = &node.kind
    {
        rows.push(TreeRow {
            path: node.path.to_string(),
            depth,
            part: part.to_string(),
            iteration: format!("{}.{}", version, iteration),
            link: link.map_or_else(|| "-".to_string(), |l| l.to_string()),
            amount: match unit {
                Some(unit) => format!("{} {}", amount, unit),
                None => amount.to_string(),
            },
        });
    }
    let child_depth = if node.is_virtual() { depth } else { depth + 1 };
    for child in &node.children {
        collect_rows(child, child_depth, rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_format() {
        assert_eq!(effective_format(OutputFormat::Auto, true), OutputFormat::Table);
        assert_eq!(effective_format(OutputFormat::Auto, false), OutputFormat::Yaml);
        assert_eq!(effective_format(OutputFormat::Csv, false), OutputFormat::Csv);
    }

    #[test]
    fn test_flatten_skips_virtual_root() {
        let tree = Component::virtual_root("wired_to", Vec::new());
        assert!(flatten_tree(&tree).is_empty());
    }
}
