//! In-memory fakes for the two backends.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::completion::CompletionBackend;
use crate::error::{CompletionError, SheetsError, SheetsResult};
use crate::models::RESPONSES_SHEET;
use crate::sheets::{
    A1Range, Cell, FormatRequest, InputMode, NewSheet, SheetProperties, SpreadsheetBackend,
};

/// An answer of just over 40 words, long enough to be sent to the model.
pub fn long_answer() -> String {
    "First we interview ten customers about onboarding friction and record every complaint. \
     Second we map each complaint to a process owner. Third we ship one fix per week and \
     measure activation, keeping a short log so the team can compare results each Friday."
        .to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub range: String,
    pub rows: Vec<Vec<Cell>>,
    pub mode: InputMode,
}

struct Sheet {
    id: i64,
    grid: Vec<Vec<String>>,
}

/// Spreadsheet fake backed by plain grids, with write logging and failure
/// injection.
#[derive(Default)]
pub struct MemorySheets {
    sheets: Mutex<HashMap<String, Sheet>>,
    writes: Mutex<Vec<RecordedWrite>>,
    clears: Mutex<Vec<String>>,
    formats: Mutex<Vec<Vec<FormatRequest>>>,
    added: Mutex<Vec<NewSheet>>,
    failing_ranges: Mutex<HashSet<String>>,
    fail_reads: AtomicBool,
    fail_all: AtomicBool,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// A spreadsheet whose response sheet holds `rows` (header first).
    pub fn with_responses(rows: Vec<Vec<&str>>) -> Self {
        let sheets = Self::new();
        sheets.insert_sheet(RESPONSES_SHEET, 0, rows);
        sheets
    }

    pub fn insert_sheet(&self, title: &str, id: i64, rows: Vec<Vec<&str>>) {
        let grid = rows
            .into_iter()
            .map(|row| row.into_iter().map(str::to_string).collect())
            .collect();
        self.sheets
            .lock()
            .unwrap()
            .insert(title.to_string(), Sheet { id, grid });
    }

    /// Make every read fail with a network error.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Make every call fail with a permission error.
    pub fn fail_everything(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Make writes to exactly this rendered range fail.
    pub fn fail_writes_to(&self, range: &str) {
        self.failing_ranges.lock().unwrap().insert(range.to_string());
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clears(&self) -> Vec<String> {
        self.clears.lock().unwrap().clone()
    }

    pub fn formats(&self) -> Vec<Vec<FormatRequest>> {
        self.formats.lock().unwrap().clone()
    }

    pub fn added_sheets(&self) -> Vec<NewSheet> {
        self.added.lock().unwrap().clone()
    }

    /// Current text of one cell, or empty.
    pub fn cell_text(&self, sheet: &str, column: usize, row: usize) -> String {
        self.sheets
            .lock()
            .unwrap()
            .get(sheet)
            .and_then(|s| s.grid.get(row - 1))
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or_default()
    }

    fn check_global_failure(&self) -> SheetsResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(SheetsError::Unauthorized {
                message: "permission denied".to_string(),
            });
        }
        Ok(())
    }
}

fn missing_sheet(name: &str) -> SheetsError {
    SheetsError::NotFound {
        message: format!("sheet {name:?} does not exist"),
    }
}

#[async_trait]
impl SpreadsheetBackend for MemorySheets {
    async fn read_range(&self, range: &A1Range) -> SheetsResult<Vec<Vec<String>>> {
        self.check_global_failure()?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SheetsError::Network {
                message: "connection reset".to_string(),
            });
        }

        let sheets = self.sheets.lock().unwrap();
        let sheet = sheets
            .get(&range.sheet)
            .ok_or_else(|| missing_sheet(&range.sheet))?;

        let end = range.end.unwrap_or(range.start);
        let top = range.start.row.unwrap_or(1);
        let bottom = end.row.unwrap_or(sheet.grid.len()).min(sheet.grid.len());
        let (left, right) = (range.start.column.index(), end.column.index());

        let mut rows: Vec<Vec<String>> = (top..=bottom)
            .filter_map(|row| sheet.grid.get(row - 1))
            .map(|cells| {
                let mut out: Vec<String> = (left..=right)
                    .map(|c| cells.get(c).cloned().unwrap_or_default())
                    .collect();
                while out.last().is_some_and(String::is_empty) {
                    out.pop();
                }
                out
            })
            .collect();
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        Ok(rows)
    }

    async fn write_range(
        &self,
        range: &A1Range,
        rows: Vec<Vec<Cell>>,
        mode: InputMode,
    ) -> SheetsResult<()> {
        self.check_global_failure()?;
        let rendered = range.to_string();
        if self.failing_ranges.lock().unwrap().contains(&rendered) {
            return Err(SheetsError::Api {
                status: 500,
                message: format!("write to {rendered} failed"),
            });
        }

        {
            let mut sheets = self.sheets.lock().unwrap();
            let sheet = sheets
                .get_mut(&range.sheet)
                .ok_or_else(|| missing_sheet(&range.sheet))?;
            let top = range.start.row.unwrap_or(1);
            let left = range.start.column.index();

            for (r, row) in rows.iter().enumerate() {
                let target_row = top - 1 + r;
                if sheet.grid.len() <= target_row {
                    sheet.grid.resize(target_row + 1, Vec::new());
                }
                let cells = &mut sheet.grid[target_row];
                for (c, cell) in row.iter().enumerate() {
                    let target_col = left + c;
                    if cells.len() <= target_col {
                        cells.resize(target_col + 1, String::new());
                    }
                    cells[target_col] = cell.to_string();
                }
            }
        }

        self.writes.lock().unwrap().push(RecordedWrite {
            range: rendered,
            rows,
            mode,
        });
        Ok(())
    }

    async fn clear_range(&self, range: &A1Range) -> SheetsResult<()> {
        self.check_global_failure()?;
        {
            let mut sheets = self.sheets.lock().unwrap();
            let sheet = sheets
                .get_mut(&range.sheet)
                .ok_or_else(|| missing_sheet(&range.sheet))?;
            let end = range.end.unwrap_or(range.start);
            let top = range.start.row.unwrap_or(1);
            let bottom = end.row.unwrap_or(sheet.grid.len());
            let (left, right) = (range.start.column.index(), end.column.index());

            for row in top..=bottom {
                if let Some(cells) = sheet.grid.get_mut(row - 1) {
                    for c in left..=right {
                        if let Some(cell) = cells.get_mut(c) {
                            cell.clear();
                        }
                    }
                }
            }
        }
        self.clears.lock().unwrap().push(range.to_string());
        Ok(())
    }

    async fn list_sheets(&self) -> SheetsResult<Vec<SheetProperties>> {
        self.check_global_failure()?;
        let mut sheets: Vec<SheetProperties> = self
            .sheets
            .lock()
            .unwrap()
            .iter()
            .map(|(title, sheet)| SheetProperties {
                sheet_id: sheet.id,
                title: title.clone(),
            })
            .collect();
        sheets.sort_by_key(|s| s.sheet_id);
        Ok(sheets)
    }

    async fn add_sheet(&self, sheet: &NewSheet) -> SheetsResult<SheetProperties> {
        self.check_global_failure()?;
        let mut sheets = self.sheets.lock().unwrap();
        let id = sheets.values().map(|s| s.id).max().unwrap_or(0) + 1000;
        sheets.insert(
            sheet.title.clone(),
            Sheet {
                id,
                grid: Vec::new(),
            },
        );
        self.added.lock().unwrap().push(sheet.clone());
        Ok(SheetProperties {
            sheet_id: id,
            title: sheet.title.clone(),
        })
    }

    async fn batch_format(&self, requests: Vec<FormatRequest>) -> SheetsResult<()> {
        self.check_global_failure()?;
        self.formats.lock().unwrap().push(requests);
        Ok(())
    }
}

/// Wraps [`MemorySheets`] so every read takes `delay`, tracking how many
/// reads overlap.
pub struct SlowSheets {
    inner: MemorySheets,
    delay: Duration,
    reads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowSheets {
    pub fn new(inner: MemorySheets, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            reads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpreadsheetBackend for SlowSheets {
    async fn read_range(&self, range: &A1Range) -> SheetsResult<Vec<Vec<String>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.read_range(range).await
    }

    async fn write_range(
        &self,
        range: &A1Range,
        rows: Vec<Vec<Cell>>,
        mode: InputMode,
    ) -> SheetsResult<()> {
        self.inner.write_range(range, rows, mode).await
    }

    async fn clear_range(&self, range: &A1Range) -> SheetsResult<()> {
        self.inner.clear_range(range).await
    }

    async fn list_sheets(&self) -> SheetsResult<Vec<SheetProperties>> {
        self.inner.list_sheets().await
    }

    async fn add_sheet(&self, sheet: &NewSheet) -> SheetsResult<SheetProperties> {
        self.inner.add_sheet(sheet).await
    }

    async fn batch_format(&self, requests: Vec<FormatRequest>) -> SheetsResult<()> {
        self.inner.batch_format(requests).await
    }
}

/// Completion fake that returns a fixed reply (or fails) and records prompts.
pub struct StubCompletion {
    reply: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl StubCompletion {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for StubCompletion {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        self.reply.clone().ok_or_else(|| CompletionError::Network {
            message: "stub backend unavailable".to_string(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "stub"
    }
}
