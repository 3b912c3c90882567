use crate::model::{Analysis, AnalysisFlags, DiscoverySource, PathCandidate, Severity};

/// Suggested fix for a classified result; empty when nothing applies.
/// The first matching rule wins.
pub fn recommended_fix(
    candidate: &PathCandidate,
    analysis: &Analysis,
    flags: &AnalysisFlags,
) -> &'static str {
    let lp = candidate.path.to_ascii_lowercase();

    if flags.directory_listing {
        return "Disable directory listings (autoindex) for this location and restrict access.";
    }
    if flags.confirmed_secret {
        return "Rotate and revoke exposed secrets immediately, remove them from public responses, and restrict access.";
    }
    if lp.starts_with("/.git") {
        return "Block access to VCS directories (e.g. /.git) at the web server and remove any exposed repository data.";
    }
    if lp.starts_with("/.env") {
        return "Remove environment files from the web root and restrict access; rotate any exposed credentials.";
    }
    if matches!(extension(&lp), Some("zip" | "tar" | "gz" | "sql")) {
        return "Remove backup/dump artifacts from public paths and restrict access to internal storage.";
    }
    if lp.contains("phpinfo") {
        return "Remove phpinfo endpoints from production or restrict access to administrators only.";
    }
    if lp.contains("actuator") {
        return "Restrict Spring Boot actuator endpoints to authenticated/internal access and disable sensitive endpoints.";
    }

    match candidate.source {
        DiscoverySource::Sitemap => {
            return "If this content should not be indexed, remove it from the sitemap and restrict access.";
        }
        DiscoverySource::Robots => {
            return "Robots directives do not protect content; restrict access if sensitive and avoid listing sensitive paths in robots.txt.";
        }
        DiscoverySource::Dictionary | DiscoverySource::Crawler => {}
    }

    if flags.no_index && analysis.severity != Severity::High {
        return "Noindex is present; also restrict access if this content is sensitive.";
    }
    if candidate.is_sensitive && analysis.severity != Severity::Low {
        return "Restrict access to this path (authentication/IP allowlist) and remove any sensitive content from public responses.";
    }
    ""
}

/// Text after the last `.` of the final path segment. Dot-only names such as
/// `/.sql` count as an extension.
fn extension(path: &str) -> Option<&str> {
    path.rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext)
}
