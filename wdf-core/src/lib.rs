pub mod analyze;
pub mod config;
pub mod index;
pub mod model;
pub mod plan;
pub mod remediate;
pub mod report;
pub mod rules;
pub mod scan;

pub use config::{ConfigError, ScanConfig};
pub use index::{IndexChecker, StubIndexChecker};
pub use model::{Analysis, DiscoverySource, PathCandidate, RequestResult, Severity, TargetResult};
pub use report::Report;
pub use rules::RuleSet;
pub use scan::{Scanner, scan_targets};
