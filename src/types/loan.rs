use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A borrowing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub book_id: i64,
    pub username: String,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine: i64,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

/// A borrowing joined with the book it refers to, as shown in history,
/// fines and user reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanView {
    pub id: i64,
    pub book_id: i64,
    pub username: String,
    pub title: String,
    pub author: String,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine: i64,
}

/// Outcome of a successful return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnReceipt {
    pub borrowing_id: i64,
    pub book_id: i64,
    pub returned_at: DateTime<Utc>,
    pub fine: i64,
}

/// Fines report: every borrowing carrying a fine, plus the total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinesReport {
    pub entries: Vec<LoanView>,
    pub total: i64,
}

impl FinesReport {
    pub fn from_entries(entries: Vec<LoanView>) -> Self {
        let total = entries.iter().map(|e| e.fine).sum();
        Self { entries, total }
    }
}

/// A recommended book with its predicted affinity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub book_id: i64,
    pub title: String,
    pub author: String,
    pub available: i64,
    pub score: f64,
    pub source: RecommendationSource,
}

/// How a recommendation was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    /// Low-rank reconstruction of the borrow matrix
    Collaborative,
    /// Global borrow counts
    Popularity,
}
