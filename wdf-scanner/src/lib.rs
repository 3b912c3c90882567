pub mod crawler;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod probe;
pub mod result;
pub mod robots;
pub mod sitemap;

pub use crawler::SameOriginCrawler;
pub use error::ScanError;
pub use normalize::{NormalizedTarget, TargetError};
pub use probe::Prober;
pub use result::ProbeResult;
