//! Leaderboard sheet generation.
//!
//! The dashboard is rebuilt from scratch on every run: one row per team with
//! lookup formulas into the response sheet, a total, a rank, and a trailing
//! average row. Values stay live because everything is a formula.

use crate::error::SheetsResult;
use crate::models::{Column, Criterion, DASHBOARD_SHEET, RESPONSES_SHEET, TEAM_COLUMN};
use crate::sheets::{
    quote_sheet_name, A1Range, Border, Cell, CellData, CellFormat, Color, FormatRequest,
    GridRange, InputMode, NewSheet, RepeatCell, SpreadsheetBackend, TextFormat, UpdateBorders,
};

pub const DASHBOARD_ROWS: u32 = 50;
pub const DASHBOARD_COLUMNS: u32 = 12;
pub const TAB_COLOR: Color = Color::rgb(0.2, 0.7, 0.9);

const HEADER_BACKGROUND: Color = Color::rgb(0.2, 0.2, 0.2);
const HEADER_TEXT: Color = Color::rgb(1.0, 1.0, 1.0);
const AVERAGE_BACKGROUND: Color = Color::rgb(0.9, 0.9, 0.9);

/// Dashboard layout: A = team, B..F = rounds, G = total, H = rank.
const ROUND_COLUMNS: [Column; 5] = [Column::B, Column::C, Column::D, Column::E, Column::F];
const TOTAL_COLUMN: Column = Column::G;
const RANK_COLUMN: Column = Column::H;
const WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSummary {
    pub sheet_id: i64,
    pub teams: usize,
    pub created: bool,
}

/// Distinct non-empty team names in first-seen order. Names are kept
/// byte-for-byte, since the lookup formulas match the cell text exactly.
pub fn unique_teams<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut teams: Vec<String> = Vec::new();
    for team in values {
        if !team.is_empty() && !teams.iter().any(|t| t == team) {
            teams.push(team.to_string());
        }
    }
    teams
}

fn formula_string(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// `=IFERROR(VLOOKUP("team",'Form Responses 1'!B:H,7,FALSE),0)`
pub fn round_formula(team: &str, criterion: Criterion) -> String {
    let score_column = criterion.score_column();
    let offset = score_column.index() - TEAM_COLUMN.index() + 1;
    format!(
        "=IFERROR(VLOOKUP({},{}!{}:{},{},FALSE),0)",
        formula_string(team),
        quote_sheet_name(RESPONSES_SHEET),
        TEAM_COLUMN,
        score_column,
        offset
    )
}

pub fn header_row() -> Vec<Cell> {
    let mut header = vec![Cell::from("Team Name")];
    header.extend(Criterion::ALL.iter().map(|c| Cell::from(format!("Round {}", c.round()))));
    header.push(Cell::from("Total Score"));
    header.push(Cell::from("Rank"));
    header
}

/// Header, one row per team, and the average row.
pub fn build_table(teams: &[String]) -> Vec<Vec<Cell>> {
    let last_data_row = teams.len() + 1;
    let mut table = vec![header_row()];

    for (index, team) in teams.iter().enumerate() {
        let row = index + 2;
        let mut cells = vec![Cell::from(team.as_str())];
        cells.extend(
            Criterion::ALL
                .iter()
                .map(|&criterion| Cell::from(round_formula(team, criterion))),
        );
        cells.push(Cell::from(format!(
            "=SUM({first}{row}:{last}{row})",
            first = ROUND_COLUMNS[0],
            last = ROUND_COLUMNS[4],
        )));
        cells.push(Cell::from(format!(
            "=RANK({TOTAL_COLUMN}{row},${TOTAL_COLUMN}$2:${TOTAL_COLUMN}${last_data_row})"
        )));
        table.push(cells);
    }

    let mut average = vec![Cell::from("Average")];
    for column in ROUND_COLUMNS.iter().chain(std::iter::once(&TOTAL_COLUMN)) {
        if teams.is_empty() {
            average.push(Cell::empty());
        } else {
            average.push(Cell::from(format!(
                "=AVERAGE({column}2:{column}{last_data_row})"
            )));
        }
    }
    average.push(Cell::empty());
    table.push(average);

    table
}

fn grid(sheet_id: i64, rows: (usize, usize), columns: (usize, usize)) -> GridRange {
    GridRange {
        sheet_id,
        start_row_index: rows.0,
        end_row_index: rows.1,
        start_column_index: columns.0,
        end_column_index: columns.1,
    }
}

/// Header styling, centered numbers, the shaded average row and borders,
/// sized for `team_count` teams.
pub fn format_requests(sheet_id: i64, team_count: usize) -> Vec<FormatRequest> {
    let last_data_row = team_count + 1;
    let full_fields = "userEnteredFormat(backgroundColor,textFormat,horizontalAlignment)";

    vec![
        FormatRequest::RepeatCell(RepeatCell {
            range: grid(sheet_id, (0, 1), (0, WIDTH)),
            cell: CellData {
                user_entered_format: CellFormat {
                    background_color: Some(HEADER_BACKGROUND),
                    text_format: Some(TextFormat {
                        foreground_color: Some(HEADER_TEXT),
                        bold: Some(true),
                    }),
                    horizontal_alignment: Some("CENTER"),
                },
            },
            fields: full_fields.to_string(),
        }),
        FormatRequest::RepeatCell(RepeatCell {
            range: grid(sheet_id, (1, last_data_row), (1, WIDTH)),
            cell: CellData {
                user_entered_format: CellFormat {
                    horizontal_alignment: Some("CENTER"),
                    ..CellFormat::default()
                },
            },
            fields: "userEnteredFormat.horizontalAlignment".to_string(),
        }),
        FormatRequest::RepeatCell(RepeatCell {
            range: grid(sheet_id, (last_data_row, last_data_row + 1), (0, WIDTH)),
            cell: CellData {
                user_entered_format: CellFormat {
                    background_color: Some(AVERAGE_BACKGROUND),
                    text_format: Some(TextFormat {
                        bold: Some(true),
                        ..TextFormat::default()
                    }),
                    horizontal_alignment: Some("CENTER"),
                },
            },
            fields: full_fields.to_string(),
        }),
        FormatRequest::UpdateBorders(UpdateBorders {
            range: grid(sheet_id, (0, last_data_row + 1), (0, WIDTH)),
            top: Border::SOLID,
            bottom: Border::SOLID,
            left: Border::SOLID,
            right: Border::SOLID,
        }),
    ]
}

/// Find the dashboard sheet, creating it if needed. Returns its id and
/// whether it was created.
async fn ensure_dashboard_sheet(sheets: &dyn SpreadsheetBackend) -> SheetsResult<(i64, bool)> {
    let existing = sheets.list_sheets().await?;
    if let Some(sheet) = existing.iter().find(|s| s.title == DASHBOARD_SHEET) {
        tracing::info!(sheet_id = sheet.sheet_id, "Found existing Dashboard sheet");
        return Ok((sheet.sheet_id, false));
    }

    let created = sheets
        .add_sheet(&NewSheet {
            title: DASHBOARD_SHEET.to_string(),
            row_count: DASHBOARD_ROWS,
            column_count: DASHBOARD_COLUMNS,
            tab_color: TAB_COLOR,
        })
        .await?;
    tracing::info!(sheet_id = created.sheet_id, "Created Dashboard sheet");
    Ok((created.sheet_id, true))
}

pub async fn build_dashboard(sheets: &dyn SpreadsheetBackend) -> SheetsResult<DashboardSummary> {
    let (sheet_id, created) = ensure_dashboard_sheet(sheets).await?;

    let team_cells = sheets
        .read_range(&A1Range::column_from(RESPONSES_SHEET, TEAM_COLUMN, 2))
        .await?;
    let teams = unique_teams(
        team_cells
            .iter()
            .map(|row| row.first().map(String::as_str).unwrap_or("")),
    );

    let table = build_table(&teams);
    let range = A1Range::rect(DASHBOARD_SHEET, Column::A, 1, RANK_COLUMN, table.len());

    sheets.clear_range(&range).await?;
    sheets
        .write_range(&range, table, InputMode::UserEntered)
        .await?;
    sheets
        .batch_format(format_requests(sheet_id, teams.len()))
        .await?;

    tracing::info!(teams = teams.len(), range = %range, "Dashboard rebuilt");
    Ok(DashboardSummary {
        sheet_id,
        teams: teams.len(),
        created,
    })
}
