/// Error taxonomy for spec resolution and cleaning.
///
/// Most failures degrade instead of surfacing: a broken filter empties its
/// table, an unresolvable column leaves its field unset. The variants here
/// cover the cases a caller can actually act on.
#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported aggregation: {0}")]
    UnsupportedAggregationError(String),

    #[error("Schema validation error: {0}")]
    SchemaValidationError(String),

    #[error("Resolution error: {0}")]
    ResolutionError(String),

    #[error("Data error: {0}")]
    DataError(String),
}

pub type Result<T> = std::result::Result<T, ChartError>;
