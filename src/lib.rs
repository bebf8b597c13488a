// Library exports for chartsmith

pub mod data;
pub mod dates;
pub mod error;
pub mod spec;

// Resolution pipeline
pub mod aggregate;
pub mod assemble;
pub mod figure;
pub mod filter;
pub mod pipeline;
pub mod resolve;
pub mod schema;

// Inverse direction
pub mod clean;

pub use aggregate::AggregatorRegistry;
pub use assemble::{resolve_figure, resolve_figure_with};
pub use clean::{clean_figure, clean_value};
pub use data::Table;
pub use error::{ChartError, Result};
pub use figure::{ResolvedFigure, ResolvedTrace};
pub use spec::{ChartSpec, TraceSpec};
