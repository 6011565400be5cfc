use std::env;

use anyhow::{Context, Result, anyhow};
use seolens_core::types::Severity;
use seolens_core::{CheckKind, PageFetcher, assembler, validators};
use url::Url;

const APP_NAME: &str = "seolens";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    url: String,
    checks: Vec<CheckKind>,
    json: bool,
}

#[derive(Debug, PartialEq)]
enum CliCommand {
    Run(CliOptions),
    Help,
    Version,
}

fn parse_arguments(args: &[String]) -> Result<CliCommand> {
    if args.is_empty() {
        return Ok(CliCommand::Help);
    }

    let mut url: Option<String> = None;
    let mut checks: Option<Vec<CheckKind>> = None;
    let mut json = false;
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        if matches!(arg.as_str(), "-h" | "--help") {
            return Ok(CliCommand::Help);
        }

        if matches!(arg.as_str(), "-v" | "--version") {
            return Ok(CliCommand::Version);
        }

        if matches!(arg.as_str(), "-j" | "--json") {
            json = true;
            i += 1;
            continue;
        }

        if let Some(value) = arg.strip_prefix("--checks=") {
            if checks.is_some() {
                return Err(anyhow!("--checks specified multiple times"));
            }
            let parsed = value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| {
                    CheckKind::parse(name).ok_or_else(|| anyhow!("unknown check: {name}"))
                })
                .collect::<Result<Vec<_>>>()?;
            if parsed.is_empty() {
                return Err(anyhow!("--checks requires at least one check name"));
            }
            checks = Some(parsed);
            i += 1;
            continue;
        }

        if arg.starts_with('-') {
            return Err(anyhow!("unknown flag: {arg}"));
        }

        if url.is_none() {
            url = Some(arg.clone());
        } else {
            return Err(anyhow!("unexpected additional argument: {}", arg));
        }

        i += 1;
    }

    let url = url.ok_or_else(|| anyhow!("missing <url> argument"))?;

    Ok(CliCommand::Run(CliOptions {
        url,
        checks: checks.unwrap_or_else(|| CheckKind::ALL.to_vec()),
        json,
    }))
}

fn print_help() {
    println!("{APP_NAME} — validate a page against SEO checks");
    println!("Usage: {APP_NAME} [OPTIONS] <URL>\n");
    println!("Options:");
    println!("  --checks=a,b,c   Checks to run: structured_data, indexing, performance, mobile");
    println!("                   (default: all; performance needs PAGESPEED_API_KEY set)");
    println!("  -j, --json       Emit the assembled issues as JSON");
    println!("  -v, --version    Show version information");
    println!("  -h, --help       Show this help message");
}

fn print_version() {
    println!("{APP_NAME} {VERSION}");
}

fn print_report(url: &str, options: &CliOptions, assembled: &assembler::AssembledValidation) {
    let summary = &assembled.summary;
    let checks = options
        .checks
        .iter()
        .map(|check| check.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    println!("{APP_NAME} report for {url}");
    println!("checks: {checks}\n");
    println!(
        "{} issue(s): {} error(s), {} warning(s)",
        summary.total_issues, summary.by_severity.error, summary.by_severity.warning
    );
    println!(
        "by category: structured_data {}, indexing {}, performance {}, mobile {}\n",
        summary.by_category.structured_data,
        summary.by_category.indexing,
        summary.by_category.performance,
        summary.by_category.mobile
    );

    for issue in &assembled.issues {
        let severity = match issue.severity {
            Severity::Error => "error  ",
            Severity::Warning => "warning",
        };
        let type_name = serde_json::to_value(issue.issue_type)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default();
        println!("[{severity}] {}/{}", issue.category.as_str(), type_name);
        println!("          {}", issue.suggested_fix);
        println!("          at {}", issue.url);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let raw_args = env::args().skip(1).collect::<Vec<_>>();
    let options = match parse_arguments(&raw_args)? {
        CliCommand::Help => {
            print_help();
            return Ok(());
        }
        CliCommand::Version => {
            print_version();
            return Ok(());
        }
        CliCommand::Run(options) => options,
    };

    let parsed_url = Url::parse(&options.url).context("invalid URL")?;
    let fetcher = PageFetcher::new()?;
    let api_key = env::var("PAGESPEED_API_KEY").ok();

    let raw = validators::run_checks(
        &fetcher,
        parsed_url.as_str(),
        &options.checks,
        api_key.as_deref(),
    )
    .await;
    let assembled = assembler::assemble(raw);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&assembled.issues)?);
    } else {
        print_report(parsed_url.as_str(), &options, &assembled);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn bare_invocation_shows_help() {
        assert_eq!(parse_arguments(&[]).unwrap(), CliCommand::Help);
        assert_eq!(parse_arguments(&args(&["-h"])).unwrap(), CliCommand::Help);
        assert_eq!(
            parse_arguments(&args(&["--version"])).unwrap(),
            CliCommand::Version
        );
    }

    #[test]
    fn url_with_defaults_selects_all_checks() {
        let command = parse_arguments(&args(&["https://example.com"])).unwrap();
        let CliCommand::Run(options) = command else {
            panic!("expected run command");
        };
        assert_eq!(options.url, "https://example.com");
        assert_eq!(options.checks.len(), 4);
        assert!(!options.json);
    }

    #[test]
    fn checks_flag_narrows_the_selection() {
        let command =
            parse_arguments(&args(&["--checks=mobile,indexing", "https://example.com", "-j"]))
                .unwrap();
        let CliCommand::Run(options) = command else {
            panic!("expected run command");
        };
        assert_eq!(options.checks, vec![CheckKind::Mobile, CheckKind::Indexing]);
        assert!(options.json);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(parse_arguments(&args(&["--checks=speed", "https://e.com"])).is_err());
        assert!(parse_arguments(&args(&["--checks=", "https://e.com"])).is_err());
        assert!(parse_arguments(&args(&["--frobnicate"])).is_err());
        assert!(parse_arguments(&args(&["https://a.com", "https://b.com"])).is_err());
        assert!(parse_arguments(&args(&["--json"])).is_err());
    }
}
