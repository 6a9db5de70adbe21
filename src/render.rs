//! Renders the normalized records into the styled comparison workbook.
//!
//! Layout: row 0 holds the merged group headers, row 1 the column titles,
//! data starts at row 2. The first column is frozen together with both
//! header rows.

use crate::record::{CellValue, FundRecord};
use crate::schema::{ColumnSchema, ConditionalRule};
use anyhow::{Context, Result};
use regex::Regex;
use rust_xlsxwriter::{
    Color, ConditionalFormat3ColorScale, ConditionalFormatFormula, ConditionalFormatType, Format,
    FormatAlign, FormatBorder, FormatUnderline, Formula, Url, Workbook, XlsxError,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

const SHEET_NAME: &str = "Assets";
const TAB_COLOR: u32 = 0x1072BA;
const HEADER_FILL: u32 = 0x222222;
const DATA_FILL: u32 = 0x333333;
const LINK_COLOR: u32 = 0x4DA6FF;

const HEADER_ROW_HEIGHT: f64 = 30.0;
const LINE_HEIGHT: f64 = 16.0;
const MAX_LINES_PER_ROW: usize = 20;
const WIDTH_PADDING: f64 = 4.0;

struct Styles {
    group: Format,
    title: Format,
    marker: Format,
    text: Format,
    lines: Format,
    number: Format,
    percent: Format,
    link: Format,
}

impl Styles {
    fn new() -> Self {
        let header_base = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_background_color(Color::RGB(HEADER_FILL))
            .set_border(FormatBorder::Thick)
            .set_border_color(Color::White);

        let data_base = Format::new()
            .set_font_size(12)
            .set_font_color(Color::White)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_background_color(Color::RGB(DATA_FILL))
            .set_border(FormatBorder::Thin)
            .set_border_color(Color::White);

        Styles {
            group: header_base.clone().set_font_size(18),
            title: header_base.clone().set_font_size(10).set_text_wrap(),
            marker: header_base,
            text: data_base.clone().set_num_format("@"),
            lines: data_base
                .clone()
                .set_align(FormatAlign::Left)
                .set_text_wrap(),
            number: data_base.clone(),
            percent: data_base.clone().set_num_format("0.0 %"),
            link: data_base
                .set_underline(FormatUnderline::Single)
                .set_font_color(Color::RGB(LINK_COLOR)),
        }
    }
}

/// Writes the workbook to `path`.
pub fn write_workbook(path: &Path, schema: &ColumnSchema, records: &[FundRecord]) -> Result<()> {
    let mut workbook = build_workbook(schema, records)
        .context("Failed to assemble the comparison workbook")?;
    workbook
        .save(path)
        .with_context(|| format!("Failed to write workbook to {}", path.display()))?;
    debug!(rows = records.len(), path = %path.display(), "workbook written");
    Ok(())
}

fn build_workbook(schema: &ColumnSchema, records: &[FundRecord]) -> Result<Workbook, XlsxError> {
    let styles = Styles::new();
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;
    worksheet.set_tab_color(Color::RGB(TAB_COLOR));

    let last_col = (schema.column_count() - 1) as u16;

    // Merged group headers.
    let mut col: u16 = 0;
    for group in schema.groups {
        let span = group.columns.len() as u16;
        if span > 1 {
            worksheet.merge_range(0, col, 0, col + span - 1, group.title, &styles.group)?;
        } else {
            worksheet.write_string_with_format(0, col, group.title, &styles.group)?;
        }
        col += span;
    }

    // Column titles.
    for (idx, column) in schema.columns().enumerate() {
        worksheet.write_string_with_format(1, idx as u16, column.title, &styles.title)?;
    }

    worksheet.set_row_height(0, HEADER_ROW_HEIGHT)?;
    worksheet.set_row_height(1, HEADER_ROW_HEIGHT)?;
    worksheet.autofilter(1, 0, 1, last_col)?;
    worksheet.set_freeze_panes(2, 1)?;

    // Data rows.
    for (row_idx, record) in records.iter().enumerate() {
        let row = (row_idx + 2) as u32;
        let mut max_lines = 1;

        for (col_idx, column) in schema.columns().enumerate() {
            let col = col_idx as u16;
            let format = if col == 0 { &styles.marker } else { &styles.text };
            match record.field(column.key) {
                CellValue::Empty => {
                    worksheet.write_blank(row, col, format)?;
                }
                CellValue::Text(text) => {
                    let text = sanitize(&text);
                    match percent_to_number(&text) {
                        Some(fraction) if col != 0 => {
                            worksheet.write_number_with_format(
                                row,
                                col,
                                fraction,
                                &styles.percent,
                            )?;
                        }
                        _ => {
                            worksheet.write_string_with_format(row, col, &text, format)?;
                        }
                    }
                }
                CellValue::Number(value) => {
                    worksheet.write_number_with_format(row, col, value, &styles.number)?;
                }
                CellValue::Lines(lines) => {
                    max_lines = max_lines.max(lines.len());
                    let joined = sanitize(&lines.join("\n"));
                    worksheet.write_string_with_format(row, col, &joined, &styles.lines)?;
                }
                CellValue::Link { url, title } => {
                    let link = Url::new(url.clone()).set_text(title.unwrap_or(url));
                    worksheet.write_url_with_format(row, col, link, &styles.link)?;
                }
            }
        }

        worksheet.set_row_height(row, height_factor(max_lines) as f64 * LINE_HEIGHT)?;
    }

    // Column widths: fixed when the schema says so, measured otherwise.
    for (col_idx, column) in schema.columns().enumerate() {
        let width = column
            .width
            .unwrap_or_else(|| measured_width(column.title, column.key, records));
        worksheet.set_column_width(col_idx as u16, width)?;
    }

    // Conditional formatting covers one spare row past the data.
    let last_cond_row = (records.len() + 2) as u32;
    for (col_idx, column) in schema.columns().enumerate() {
        let Some(rule) = column.format else { continue };
        let col = col_idx as u16;
        match rule {
            ConditionalRule::FillMap(fills) => {
                let letter = column_letter(col_idx);
                for (literal, color) in fills {
                    let condition = ConditionalFormatFormula::new()
                        .set_rule(Formula::new(format!("=${letter}1=\"{literal}\"")))
                        .set_format(
                            Format::new()
                                .set_background_color(Color::RGB(*color))
                                .set_font_color(Color::White),
                        );
                    worksheet.add_conditional_format(0, col, last_cond_row, col, &condition)?;
                }
            }
            ConditionalRule::Percentile { start, mid, end } => {
                let scale = ConditionalFormat3ColorScale::new()
                    .set_minimum(ConditionalFormatType::Percentile, 0)
                    .set_midpoint(ConditionalFormatType::Percentile, 50)
                    .set_maximum(ConditionalFormatType::Percentile, 100)
                    .set_minimum_color(Color::RGB(start))
                    .set_midpoint_color(Color::RGB(mid))
                    .set_maximum_color(Color::RGB(end));
                worksheet.add_conditional_format(0, col, last_cond_row, col, &scale)?;
            }
        }
    }

    worksheet.set_selection(0, 0, 0, 0)?;
    Ok(workbook)
}

/// Row height multiplier: the longest list in the row, capped.
fn height_factor(max_lines: usize) -> usize {
    max_lines.clamp(1, MAX_LINES_PER_ROW)
}

/// Strips characters xlsx cannot store (control characters other than
/// tab, newline and carriage return).
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| *c >= '\u{20}' || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Parses a rendered percentage such as "3.4 %" into its fraction (0.034),
/// so percentage cells are stored as numbers and the color scales apply.
fn percent_to_number(text: &str) -> Option<f64> {
    static PERCENT: OnceLock<Regex> = OnceLock::new();
    let re = PERCENT.get_or_init(|| Regex::new(r"^(-?\d+(?:\.\d+)?)\s?%$").unwrap());
    let captures = re.captures(text)?;
    let value: f64 = captures[1].parse().ok()?;
    Some(value / 100.0)
}

/// Longest content line in the column, header included, plus padding.
fn measured_width(title: &str, key: &str, records: &[FundRecord]) -> f64 {
    let mut longest = title.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    for record in records {
        let cell_longest = match record.field(key) {
            CellValue::Empty => 0,
            CellValue::Text(text) => text.chars().count(),
            CellValue::Number(value) => format!("{value}").len(),
            CellValue::Lines(lines) => lines.iter().map(|l| l.chars().count()).max().unwrap_or(0),
            CellValue::Link { url, title } => title.unwrap_or(url).chars().count(),
        };
        longest = longest.max(cell_longest);
    }
    longest as f64 + WIDTH_PADDING
}

/// Spreadsheet column letter for a zero-based index: 0 -> "A", 26 -> "AA".
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    letters.into_iter().map(char::from).collect()
}
