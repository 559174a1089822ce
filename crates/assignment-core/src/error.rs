use thiserror::Error;

/// Assignment engine errors
///
/// Configuration gaps found during automatic matching are never errors; they
/// come back as [`crate::AssignmentOutcome`] values. Errors are reserved for
/// callers doing something wrong and for genuine system failures.
#[derive(Error, Debug)]
pub enum Error {
    /// A report or authority referenced by the caller does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Admin decisions must name the operator who made them
    #[error("An actor id is required for admin-triggered decisions")]
    MissingActor,

    /// Trigger text that does not name a known trigger
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// Outcome text that does not name a known outcome
    #[error("Invalid outcome: {0}")]
    InvalidOutcome(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Explicit reassignment to an authority serving another city
    #[error(
        "cross-city reassignment not allowed: authority {authority_id} serves city {authority_city_id}, report is in {}",
        describe_city(.report_city_id)
    )]
    CrossCityReassignment {
        authority_id: i64,
        authority_city_id: i64,
        report_city_id: Option<i64>,
    },

    /// Explicit reassignment to a disabled authority
    #[error("inactive authority: {0}")]
    InactiveAuthority(i64),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A stored row that cannot be decoded into the data model
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl Error {
    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new InvalidInput error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new CorruptRecord error
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        Self::CorruptRecord(msg.into())
    }

    /// HTTP status an adapter should answer with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotFound(_) => 404,
            Error::MissingActor
            | Error::InvalidTrigger(_)
            | Error::InvalidInput(_)
            | Error::CrossCityReassignment { .. }
            | Error::InactiveAuthority(_) => 400,
            Error::InvalidOutcome(_)
            | Error::Database(_)
            | Error::Config(_)
            | Error::CorruptRecord(_) => 500,
        }
    }

    /// Whether the caller, not the system, is at fault
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

fn describe_city(city_id: &Option<i64>) -> String {
    match city_id {
        Some(id) => format!("city {id}"),
        None => "no city".to_string(),
    }
}

/// Result type for assignment operations
pub type Result<T> = std::result::Result<T, Error>;
