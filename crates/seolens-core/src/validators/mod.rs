//! The per-category validators
//!
//! Each validator is an independent check: it fetches the target URL itself
//! and returns zero or more raw issues for its own category. A failed fetch
//! degrades to "no issue detected" for that check, never to an error for
//! the whole run.

pub mod indexing;
pub mod mobile;
pub mod performance;
pub mod structured_data;

use crate::fetch::Fetch;
use crate::types::{CheckKind, RawIssue};

/// Run the selected checks against one URL, in a fixed order. The
/// performance check only contributes when a PageSpeed API key is supplied.
pub async fn run_checks(
    fetcher: &dyn Fetch,
    url: &str,
    checks: &[CheckKind],
    pagespeed_api_key: Option<&str>,
) -> Vec<RawIssue> {
    let mut issues = Vec::new();
    for check in checks {
        match check {
            CheckKind::StructuredData => {
                issues.extend(structured_data::validate(fetcher, url).await)
            }
            CheckKind::Indexing => issues.extend(indexing::validate(fetcher, url).await),
            CheckKind::Performance => {
                issues.extend(performance::validate(pagespeed_api_key, url).await)
            }
            CheckKind::Mobile => issues.extend(mobile::validate(fetcher, url).await),
        }
    }
    issues
}
