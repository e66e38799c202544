//! Startup checks and the periodic scan loop.
//!
//! Backend failures come back as [`SheetsError`] values and are classified
//! here: transient ones skip a cycle and back off, anything else stops the
//! loop.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{SheetsError, SheetsResult};
use crate::models::{Column, Criterion, RESPONSES_SHEET, TOTAL_SCORE_HEADER};
use crate::scan::{self, ScanReport};
use crate::scorer::RubricScorer;
use crate::sheets::{A1Range, Cell, InputMode, SpreadsheetBackend};

/// Upper bound on the delay after repeated transient failures.
pub const MAX_BACKOFF: Duration = Duration::from_secs(600);

/// What to do after a failed scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Skip this cycle and try again later.
    Retry,
    /// Stop the loop; operator action is needed.
    Terminate,
}

pub fn disposition(err: &SheetsError) -> Disposition {
    if err.is_retryable() {
        Disposition::Retry
    } else {
        Disposition::Terminate
    }
}

/// Extra delay before the next attempt after `failures` consecutive
/// transient failures: interval × 2^(failures-1), capped.
pub fn backoff_delay(interval: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let factor = 2u32.saturating_pow(failures.saturating_sub(1).min(16));
    interval.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Read the first two header cells to prove the spreadsheet is reachable.
pub async fn check_connection(sheets: &dyn SpreadsheetBackend) -> SheetsResult<Vec<String>> {
    let header = sheets
        .read_range(&A1Range::rect(RESPONSES_SHEET, Column::A, 1, Column::B, 1))
        .await?;
    let header = header.into_iter().next().unwrap_or_default();
    tracing::info!(header = ?header, "Successfully connected to the spreadsheet");
    Ok(header)
}

/// Score-column labels (H1:M1) and the first total formula (M2).
pub async fn ensure_headers(sheets: &dyn SpreadsheetBackend) -> SheetsResult<()> {
    let mut labels: Vec<Cell> = Criterion::ALL
        .iter()
        .map(|c| Cell::from(c.score_header()))
        .collect();
    labels.push(Cell::from(TOTAL_SCORE_HEADER));

    let first = Criterion::ALL[0].score_column();
    sheets
        .write_range(
            &A1Range::rect(RESPONSES_SHEET, first, 1, Column::M, 1),
            vec![labels],
            InputMode::Raw,
        )
        .await?;

    let last = Criterion::ALL[4].score_column();
    sheets
        .write_range(
            &A1Range::cell(RESPONSES_SHEET, Column::M, 2),
            vec![vec![Cell::from(format!("=SUM({first}2:{last}2)"))]],
            InputMode::UserEntered,
        )
        .await?;

    tracing::info!("Score headers in place");
    Ok(())
}

/// Tracks consecutive transient failures across scan cycles.
#[derive(Debug, Default)]
pub struct CycleState {
    pub consecutive_failures: u32,
}

impl CycleState {
    /// Fold one cycle's outcome in. Returns the extra delay before the next
    /// cycle, or the error if the loop must stop.
    pub fn record(
        &mut self,
        outcome: SheetsResult<ScanReport>,
        interval: Duration,
    ) -> SheetsResult<Duration> {
        match outcome {
            Ok(report) => {
                if report.scored > 0 || report.failed_writes > 0 {
                    tracing::info!(
                        rows = report.rows_seen,
                        scored = report.scored,
                        failed_writes = report.failed_writes,
                        "Scan complete"
                    );
                } else {
                    tracing::debug!(rows = report.rows_seen, "Scan found nothing to score");
                }
                self.consecutive_failures = 0;
                Ok(Duration::ZERO)
            }
            Err(e) => match disposition(&e) {
                Disposition::Retry => {
                    self.consecutive_failures += 1;
                    let delay = backoff_delay(interval, self.consecutive_failures);
                    tracing::warn!(
                        error = %e,
                        failures = self.consecutive_failures,
                        backoff_secs = delay.as_secs(),
                        "Scan failed, skipping cycle"
                    );
                    Ok(delay)
                }
                Disposition::Terminate => {
                    tracing::error!(error = %e, "Scan failed permanently, stopping");
                    Err(e)
                }
            },
        }
    }
}

/// Scan on a fixed interval until `cancel` fires or a permanent failure.
/// Each scan is awaited before the next tick is taken, and late ticks are
/// skipped, so scans never overlap. Cancellation also interrupts an
/// in-flight scan or a backoff sleep.
pub async fn run_loop(
    sheets: &dyn SpreadsheetBackend,
    scorer: &RubricScorer,
    interval: Duration,
    cancel: &CancellationToken,
) -> SheetsResult<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut state = CycleState::default();

    tracing::info!(interval_secs = interval.as_secs(), "Starting scan loop");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = scan::run_scan(sheets, scorer) => outcome,
        };

        let delay = state.record(outcome, interval)?;
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => ticker.reset(),
            }
        }
    }

    tracing::info!("Scan loop stopped");
    Ok(())
}
