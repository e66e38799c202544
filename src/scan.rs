use crate::error::SheetsResult;
use crate::models::{self, Column, Criterion, ResponseRow, RESPONSES_SHEET};
use crate::scorer::RubricScorer;
use crate::sheets::{A1Range, Cell, InputMode, SpreadsheetBackend};

/// An answer that has text but no score yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCell<'a> {
    pub row_number: usize,
    pub criterion: Criterion,
    pub answer: &'a str,
}

impl PendingCell<'_> {
    pub fn target(&self) -> A1Range {
        A1Range::cell(
            RESPONSES_SHEET,
            self.criterion.score_column(),
            self.row_number,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub rows_seen: usize,
    pub scored: usize,
    pub failed_writes: usize,
}

pub fn responses_range() -> A1Range {
    A1Range::columns(RESPONSES_SHEET, Column::A, Column::M)
}

/// Every (row, criterion) whose answer is filled in and whose score cell
/// is empty, in row then criterion order.
pub fn plan_scan(rows: &[ResponseRow]) -> Vec<PendingCell<'_>> {
    rows.iter()
        .flat_map(|row| {
            Criterion::ALL.into_iter().filter_map(move |criterion| {
                let answer = row.answer(criterion)?;
                if row.is_scored(criterion) {
                    return None;
                }
                Some(PendingCell {
                    row_number: row.row_number,
                    criterion,
                    answer,
                })
            })
        })
        .collect()
}

/// One pass over the response sheet. A failed fetch aborts the pass; a
/// failed write is logged and the pass moves on.
pub async fn run_scan(
    sheets: &dyn SpreadsheetBackend,
    scorer: &RubricScorer,
) -> SheetsResult<ScanReport> {
    tracing::info!("Checking for new responses");
    let table = sheets.read_range(&responses_range()).await?;

    let mut report = ScanReport::default();
    if table.len() < 2 {
        return Ok(report);
    }

    let rows = models::data_rows(table);
    report.rows_seen = rows.len();

    for pending in plan_scan(&rows) {
        tracing::info!(
            row = pending.row_number,
            round = pending.criterion.round(),
            "Processing response"
        );
        let score = scorer.score(pending.answer).await;
        let target = pending.target();

        match sheets
            .write_range(
                &target,
                vec![vec![Cell::Number(i64::from(score.value()))]],
                InputMode::Raw,
            )
            .await
        {
            Ok(()) => {
                tracing::info!(cell = %target, %score, "Updated score");
                report.scored += 1;
            }
            Err(e) => {
                tracing::error!(cell = %target, error = %e, "Error updating score");
                report.failed_writes += 1;
            }
        }
    }

    Ok(report)
}
