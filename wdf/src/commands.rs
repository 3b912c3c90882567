use crate::CLAP_STYLING;
use clap::{ArgGroup, arg};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("wdf")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("wdf")
        .about(
            "Web Dork Fuzzer: defensive exposure scanner for crawlable and search-indexed \
            sensitive web content.",
        )
        .styles(CLAP_STYLING)
        .arg(
            arg!(-u --"url" <URL>)
                .required(false)
                .help("Target URL to scan (e.g. https://example.com); scheme defaults to https"),
        )
        .arg(
            arg!(-l --"list" <PATH>)
                .required(false)
                .help("Path to a newline-delimited file of targets; '#' starts a comment line"),
        )
        .group(
            ArgGroup::new("targets")
                .args(["url", "list"])
                .required(true)
                .multiple(false),
        )
        .arg(
            arg!(--"concurrency" <NUM_WORKERS>)
                .required(false)
                .help("Maximum number of concurrent requests")
                .value_parser(clap::value_parser!(usize))
                .default_value("20"),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Per-request timeout in seconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("10"),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help("Write the report to this file (default: stdout)")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            arg!(-f --"format" <FORMAT>)
                .required(false)
                .help("Report format")
                .value_parser(["json", "pretty"])
                .default_value("json"),
        )
        .arg(
            arg!(--"enable-robots")
                .required(false)
                .help("Discover candidate paths from robots.txt")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"enable-sitemap")
                .required(false)
                .help("Discover candidate paths from sitemap.xml and robots.txt sitemaps")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"enable-crawl")
                .required(false)
                .help("Discover candidate paths with a small same-origin HTML crawl")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"crawl-depth" <DEPTH>)
                .required(false)
                .help("Crawler link depth (max 2)")
                .value_parser(clap::value_parser!(usize))
                .default_value("2"),
        )
        .arg(
            arg!(--"crawl-limit" <PAGES>)
                .required(false)
                .help("Maximum pages fetched per target while crawling")
                .value_parser(clap::value_parser!(usize))
                .default_value("20"),
        )
        .arg(arg!(-q --"quiet" "Suppress the progress spinner").required(false))
        .arg(arg!(-v --"verbose" "Enable debug logging on stderr").required(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_command_is_well_formed() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let m = command_argument_builder()
            .try_get_matches_from(["wdf", "-u", "example.com"])
            .unwrap();
        assert_eq!(m.get_one::<String>("url").map(String::as_str), Some("example.com"));
        assert_eq!(m.get_one::<usize>("concurrency"), Some(&20));
        assert_eq!(m.get_one::<u64>("timeout"), Some(&10));
        assert_eq!(m.get_one::<usize>("crawl-depth"), Some(&2));
        assert_eq!(m.get_one::<usize>("crawl-limit"), Some(&20));
        assert_eq!(m.get_one::<String>("format").map(String::as_str), Some("json"));
        assert!(!m.get_flag("enable-robots"));
        assert!(!m.get_flag("quiet"));
    }

    #[test]
    fn test_exactly_one_target_source() {
        let missing = command_argument_builder().try_get_matches_from(["wdf"]);
        assert_eq!(
            missing.unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );

        let both = command_argument_builder().try_get_matches_from([
            "wdf",
            "-u",
            "example.com",
            "-l",
            "targets.txt",
        ]);
        assert_eq!(both.unwrap_err().kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_rejects_bad_values() {
        let negative = command_argument_builder().try_get_matches_from([
            "wdf",
            "-u",
            "example.com",
            "--crawl-depth",
            "-1",
        ]);
        assert!(negative.is_err());

        let format = command_argument_builder().try_get_matches_from([
            "wdf",
            "-u",
            "example.com",
            "--format",
            "csv",
        ]);
        assert_eq!(format.unwrap_err().kind(), ErrorKind::InvalidValue);
    }
}
