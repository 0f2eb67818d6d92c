use chrono::NaiveDate;
use thiserror::Error;

/// Failure talking to the CookOps REST backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend answered with a non-2xx status
    #[error("backend rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// Transport-level failure (DNS, refused connection, TLS...)
    #[error("connection error: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Body could not be decoded into the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure of a local menu edit or of a push to the backend.
#[derive(Debug, Error)]
pub enum MenuError {
    /// Edits and syncs need the server's entries for that date first
    #[error("menu for site {site_id} on {date} is not loaded; reload it first")]
    NotLoaded { site_id: String, date: NaiveDate },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Terminal failure of one checklist generation attempt.
#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("ingredient fetch failed for {date}: {detail}")]
    DayFetch { date: NaiveDate, detail: String },

    #[error("backend unreachable while fetching {date}: {detail}")]
    Connection { date: NaiveDate, detail: String },

    /// Local menu edits could not be pushed before reading server state
    #[error("menu for site {site_id} is not synchronized: {detail}")]
    StaleMenu { site_id: String, detail: String },

    /// A newer run for the same site started before this one completed
    #[error("checklist run {generation} was superseded by a newer request")]
    Superseded { generation: u64 },
}

impl ChecklistError {
    /// Map a backend failure on `date` into the checklist taxonomy.
    pub fn from_day_failure(date: NaiveDate, err: BackendError) -> Self {
        match err {
            BackendError::Rejected { status, detail } => ChecklistError::DayFetch {
                date,
                detail: format!("HTTP {}: {}", status, detail),
            },
            BackendError::InvalidResponse(detail) => ChecklistError::DayFetch { date, detail },
            BackendError::Connection(e) => ChecklistError::Connection {
                date,
                detail: e.to_string(),
            },
            BackendError::Timeout { secs } => ChecklistError::Connection {
                date,
                detail: format!("no response within {}s", secs),
            },
        }
    }
}
