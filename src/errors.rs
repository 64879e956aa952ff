use sea_orm::error::DbErr;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Unsupported unit: {0}")]
    UnsupportedUnit(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Quantity out of range: {0}")]
    QuantityOutOfRange(String),

    #[error("Material {0} not found")]
    MaterialNotFound(Uuid),

    #[error("No assignment of material {material_id} found for activity {activity_id}")]
    AssignmentNotFound { activity_id: Uuid, material_id: Uuid },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Machine-readable code for callers that translate errors for their own transport.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::UnsupportedUnit(_) => "unsupported_unit",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::QuantityOutOfRange(_) => "quantity_out_of_range",
            Self::MaterialNotFound(_) => "material_not_found",
            Self::AssignmentNotFound { .. } => "assignment_not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::InternalError(_) | Self::Other(_) => "internal_error",
        }
    }

    /// Business-rule failures are deterministic: retrying the same request
    /// against the same state fails the same way.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedUnit(_)
                | Self::InsufficientStock(_)
                | Self::QuantityOutOfRange(_)
                | Self::MaterialNotFound(_)
                | Self::AssignmentNotFound { .. }
                | Self::ValidationError(_)
                | Self::InvalidInput(_)
                | Self::Conflict(_)
        )
    }

    /// Message safe to hand to an end user. Infrastructure details stay in the logs.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal error".to_string(),
            _ => self.to_string(),
        }
    }
}
