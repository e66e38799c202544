use std::fmt;

pub const RESPONSES_SHEET: &str = "Form Responses 1";
pub const DASHBOARD_SHEET: &str = "Dashboard";
pub const TOTAL_SCORE_HEADER: &str = "Total Score";

/// Spreadsheet columns used by the response table and the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
}

impl Column {
    /// Zero-based position within a fetched row.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn letter(self) -> &'static str {
        match self {
            Column::A => "A",
            Column::B => "B",
            Column::C => "C",
            Column::D => "D",
            Column::E => "E",
            Column::F => "F",
            Column::G => "G",
            Column::H => "H",
            Column::I => "I",
            Column::J => "J",
            Column::K => "K",
            Column::L => "L",
            Column::M => "M",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

pub const TEAM_COLUMN: Column = Column::B;

/// One of the five rubric dimensions a response is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    CustomerCentricity,
    TimeToMarket,
    Culture,
    ProcessChanges,
    PartnerSelection,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::CustomerCentricity,
        Criterion::TimeToMarket,
        Criterion::Culture,
        Criterion::ProcessChanges,
        Criterion::PartnerSelection,
    ];

    pub fn answer_column(self) -> Column {
        match self {
            Criterion::CustomerCentricity => Column::C,
            Criterion::TimeToMarket => Column::D,
            Criterion::Culture => Column::E,
            Criterion::ProcessChanges => Column::F,
            Criterion::PartnerSelection => Column::G,
        }
    }

    pub fn score_column(self) -> Column {
        match self {
            Criterion::CustomerCentricity => Column::H,
            Criterion::TimeToMarket => Column::I,
            Criterion::Culture => Column::J,
            Criterion::ProcessChanges => Column::K,
            Criterion::PartnerSelection => Column::L,
        }
    }

    pub fn score_header(self) -> &'static str {
        match self {
            Criterion::CustomerCentricity => "Score - Customer Centricity",
            Criterion::TimeToMarket => "Score - Time to Market",
            Criterion::Culture => "Score - Culture",
            Criterion::ProcessChanges => "Score - Process Changes",
            Criterion::PartnerSelection => "Score - Partner Selection",
        }
    }

    /// Round number shown on the dashboard (1-based).
    pub fn round(self) -> usize {
        match self {
            Criterion::CustomerCentricity => 1,
            Criterion::TimeToMarket => 2,
            Criterion::Culture => 3,
            Criterion::ProcessChanges => 4,
            Criterion::PartnerSelection => 5,
        }
    }
}

/// A rubric score; only 0 through 3 are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 3;
    pub const ZERO: Score = Score(0);

    pub fn new(value: i64) -> Option<Score> {
        if (0..=Self::MAX as i64).contains(&value) {
            Some(Score(value as u8))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single data row of the response sheet, as fetched.
#[derive(Debug, Clone)]
pub struct ResponseRow {
    /// 1-based sheet row number (the header is row 1).
    pub row_number: usize,
    pub cells: Vec<String>,
}

impl ResponseRow {
    pub fn new(row_number: usize, cells: Vec<String>) -> Self {
        Self { row_number, cells }
    }

    /// Cell text, treating cells the backend omitted as empty.
    pub fn cell(&self, column: Column) -> &str {
        self.cells
            .get(column.index())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Team cell text exactly as entered.
    pub fn team(&self) -> &str {
        self.cell(TEAM_COLUMN)
    }

    pub fn answer(&self, criterion: Criterion) -> Option<&str> {
        let text = self.cell(criterion.answer_column());
        (!text.is_empty()).then_some(text)
    }

    /// Whether the score cell for `criterion` holds anything, including "0".
    pub fn is_scored(&self, criterion: Criterion) -> bool {
        !self.cell(criterion.score_column()).is_empty()
    }
}

/// Turns a fetched table (header first) into data rows.
pub fn data_rows(table: Vec<Vec<String>>) -> Vec<ResponseRow> {
    table
        .into_iter()
        .enumerate()
        .skip(1)
        .map(|(index, cells)| ResponseRow::new(index + 1, cells))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamStanding {
    pub team: String,
    pub rounds: [u32; 5],
    pub total: u32,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leaderboard {
    /// Standings in first-seen team order.
    pub standings: Vec<TeamStanding>,
    pub round_averages: [f64; 5],
    pub total_average: f64,
}
