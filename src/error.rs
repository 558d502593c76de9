use derive_more::{Display, From};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    Io(std::io::Error),

    #[from]
    #[display("Database error: {_0}")]
    Database(rusqlite::Error),

    #[display("Project not found: {name}")]
    ProjectNotFound { name: String },

    #[display("Configuration error: {msg}")]
    Config { msg: String },

    #[display("Background task failed: {msg}")]
    Task { msg: String },
}

impl std::error::Error for Error {}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task { msg: e.to_string() }
    }
}

// Implement axum IntoResponse for Error
impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            Error::ProjectNotFound { name } => {
                // Unknown projects answer 403 with no body, which is what
                // existing mirror clients expect from this server.
                tracing::debug!(project = %name, "Project not found");
                return axum::http::StatusCode::FORBIDDEN.into_response();
            }
            Error::Io(e) => {
                // Log full error internally for debugging
                tracing::error!("IO error: {}", e);
                // Return generic message - never expose file paths
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            Error::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to query package metadata".to_string(),
                )
            }
            Error::Config { msg } => {
                // Log full error internally for debugging
                tracing::error!("Configuration error: {}", msg);
                // Return generic message - don't expose config structure
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error".to_string(),
                )
            }
            Error::Task { msg } => {
                tracing::error!("Background task failed: {}", msg);
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = axum::Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
