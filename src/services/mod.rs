pub mod cache;
pub mod enricher;
pub mod form;
pub mod normalize;
pub mod odds;
pub mod upstream;

pub use enricher::MatchEnricher;
pub use upstream::{Upstream, UpstreamClient, UpstreamFailure};
