use thiserror::Error;

/// Typed failures raised by the ranking and planning core.
///
/// `InvalidSchedule` is the only variant that callers are expected to recover
/// from locally: the enricher turns it into an unknown open state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("invalid opening schedule: {0}")]
    InvalidSchedule(String),
    #[error("query has neither a spatial filter nor a semantic text")]
    EmptyQuery,
    #[error("a route needs at least 2 stops, got {0}")]
    InsufficientStops(usize),
    #[error("all requested sources are unavailable: {}", .0.join("; "))]
    AllSourcesUnavailable(Vec<String>),
    #[error("no feasible stops: {0}")]
    NoFeasibleStops(String),
}

impl CoreError {
    /// Stable machine-readable code, used by outer layers in error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCoordinate(_) => "invalid_coordinate",
            Self::InvalidSchedule(_) => "invalid_schedule",
            Self::EmptyQuery => "empty_query",
            Self::InsufficientStops(_) => "insufficient_stops",
            Self::AllSourcesUnavailable(_) => "all_sources_unavailable",
            Self::NoFeasibleStops(_) => "no_feasible_stops",
        }
    }
}

/// Failure of a single collaborator index call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("index call timed out after {0} ms")]
    Timeout(u64),
    #[error("index unavailable: {0}")]
    Unavailable(String),
    #[error("index query failed: {0}")]
    Query(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NarrativeError {
    #[error("narrative generation timed out after {0} ms")]
    Timeout(u64),
    #[error("narrative generator failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_sources_message_lists_causes() {
        let error = CoreError::AllSourcesUnavailable(vec![
            "spatial: index unavailable: refused".to_string(),
            "semantic: index call timed out after 800 ms".to_string(),
        ]);
        let message = error.to_string();
        assert!(message.contains("spatial"));
        assert!(message.contains("semantic"));
        assert_eq!(error.code(), "all_sources_unavailable");
    }
}
