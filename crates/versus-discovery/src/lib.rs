//! # versus-discovery
//! Discovery surfaces: trending, featured, recently updated, most
//! documented, and the three "needs help" lists.

pub mod needs_help;
pub mod surfaces;

pub use needs_help::NeedsHelp;
pub use surfaces::{ComparisonMetrics, ComparisonSummary, Discovery, HomeFeed, SurfaceQuery};
