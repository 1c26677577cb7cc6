use thiserror::Error;

/// Failures surfaced by the analysis service client, the workflow controller
/// and the view builders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    /// The request never reached the service or no response came back.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response without a usable detail message.
    #[error("Server error: HTTP {status}")]
    Server { status: u16 },

    /// Detail message reported by the service (bad date range, unknown ticker...).
    #[error("{0}")]
    Validation(String),

    /// Result body that is empty or does not have the expected shape.
    #[error("Malformed analysis data: {0}")]
    DataShape(String),

    /// Another workflow call is still in flight.
    #[error("Busy: {0} already in progress")]
    Busy(&'static str),
}

impl DashboardError {
    /// Message shown to the user: the service's detail when it sent one,
    /// otherwise the caller's generic fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            DashboardError::Validation(detail) => detail.clone(),
            _ => fallback.to_string(),
        }
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_detail() {
        let err = DashboardError::Validation("file not found".to_string());
        assert_eq!(err.user_message("Analysis failed"), "file not found");
    }

    #[test]
    fn test_user_message_falls_back() {
        assert_eq!(
            DashboardError::Server { status: 500 }.user_message("Analysis failed"),
            "Analysis failed"
        );
        assert_eq!(
            DashboardError::Network("connection refused".to_string()).user_message("Error fetching data"),
            "Error fetching data"
        );
        assert_eq!(
            DashboardError::DataShape("empty regime history".to_string()).user_message("Analysis failed"),
            "Analysis failed"
        );
    }

    #[test]
    fn test_busy_display() {
        let err = DashboardError::Busy("analyze");
        assert_eq!(err.to_string(), "Busy: analyze already in progress");
    }
}
