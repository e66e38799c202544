//! Spreadsheet backend seam: typed A1 ranges, cell values, formatting
//! requests and the [`SpreadsheetBackend`] trait the scan and dashboard
//! are written against.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SheetsResult;
use crate::models::Column;

/// One end of an A1 range. A missing row means the whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub column: Column,
    pub row: Option<usize>,
}

/// A sheet-qualified A1 reference such as `'Form Responses 1'!H2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub sheet: String,
    pub start: CellRef,
    pub end: Option<CellRef>,
}

impl A1Range {
    pub fn cell(sheet: &str, column: Column, row: usize) -> Self {
        Self {
            sheet: sheet.to_string(),
            start: CellRef {
                column,
                row: Some(row),
            },
            end: None,
        }
    }

    /// A rectangle from `(from, top)` to `(to, bottom)` inclusive.
    pub fn rect(sheet: &str, from: Column, top: usize, to: Column, bottom: usize) -> Self {
        Self {
            sheet: sheet.to_string(),
            start: CellRef {
                column: from,
                row: Some(top),
            },
            end: Some(CellRef {
                column: to,
                row: Some(bottom),
            }),
        }
    }

    /// Whole columns, e.g. `A:M`.
    pub fn columns(sheet: &str, from: Column, to: Column) -> Self {
        Self {
            sheet: sheet.to_string(),
            start: CellRef {
                column: from,
                row: None,
            },
            end: Some(CellRef {
                column: to,
                row: None,
            }),
        }
    }

    /// One column from `row` down to the end of the sheet, e.g. `B2:B`.
    pub fn column_from(sheet: &str, column: Column, row: usize) -> Self {
        Self {
            sheet: sheet.to_string(),
            start: CellRef {
                column,
                row: Some(row),
            },
            end: Some(CellRef { column, row: None }),
        }
    }
}

/// Sheet names need quoting unless they are plain identifiers.
pub fn quote_sheet_name(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "{}{}", self.column, row),
            None => write!(f, "{}", self.column),
        }
    }
}

impl fmt::Display for A1Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", quote_sheet_name(&self.sheet), self.start)?;
        if let Some(end) = &self.end {
            write!(f, ":{end}")?;
        }
        Ok(())
    }
}

/// How written values are interpreted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Stored literally; a leading `=` is not evaluated.
    Raw,
    /// Parsed as if typed into the UI, so formulas are evaluated.
    UserEntered,
}

impl InputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InputMode::Raw => "RAW",
            InputMode::UserEntered => "USER_ENTERED",
        }
    }
}

/// A value to write into a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(i64),
    Text(String),
}

impl Cell {
    pub fn empty() -> Self {
        Cell::Text(String::new())
    }
}

/// Renders the cell as the backend echoes it back in formatted mode.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Color {
    pub const fn rgb(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }
}

/// Properties for a sheet to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSheet {
    pub title: String,
    pub row_count: u32,
    pub column_count: u32,
    pub tab_color: Color,
}

/// Zero-based, end-exclusive grid rectangle on one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: i64,
    pub start_row_index: usize,
    pub end_row_index: usize,
    pub start_column_index: usize,
    pub end_column_index: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_format: Option<TextFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_alignment: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    pub user_entered_format: CellFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepeatCell {
    pub range: GridRange,
    pub cell: CellData,
    /// Field mask naming which parts of `cell` to apply.
    pub fields: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Border {
    pub style: &'static str,
}

impl Border {
    pub const SOLID: Border = Border { style: "SOLID" };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateBorders {
    pub range: GridRange,
    pub top: Border,
    pub bottom: Border,
    pub left: Border,
    pub right: Border,
}

/// A formatting request as accepted by a batch update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatRequest {
    RepeatCell(RepeatCell),
    UpdateBorders(UpdateBorders),
}

/// Operations consumed from the spreadsheet backend.
#[async_trait]
pub trait SpreadsheetBackend: Send + Sync {
    /// Read a range as rows of formatted cell text. Trailing empty cells
    /// and rows may be omitted.
    async fn read_range(&self, range: &A1Range) -> SheetsResult<Vec<Vec<String>>>;

    async fn write_range(
        &self,
        range: &A1Range,
        rows: Vec<Vec<Cell>>,
        mode: InputMode,
    ) -> SheetsResult<()>;

    async fn clear_range(&self, range: &A1Range) -> SheetsResult<()>;

    async fn list_sheets(&self) -> SheetsResult<Vec<SheetProperties>>;

    async fn add_sheet(&self, sheet: &NewSheet) -> SheetsResult<SheetProperties>;

    async fn batch_format(&self, requests: Vec<FormatRequest>) -> SheetsResult<()>;
}
