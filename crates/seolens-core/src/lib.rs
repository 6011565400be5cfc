//! # seolens-core
//!
//! Core library for validating websites against SEO and indexing checks.
//!
//! This library provides:
//! - Fetch-backed validators for structured data, indexing, mobile
//!   usability and performance
//! - A mapper normalizing Search Console URL Inspection results into the
//!   same issue schema
//! - The assembler that turns raw findings into identified, summarized
//!   issues
//!
//! Validators are pure with respect to persistence: they take a [`Fetch`]
//! implementation and a URL and return raw issues. Identifier assignment,
//! status defaulting and summary counts happen only in [`assembler`].
//!
//! ## Example
//!
//! ```no_run
//! use seolens_core::{assembler, validators, CheckKind, PageFetcher};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = PageFetcher::new()?;
//! let raw = validators::run_checks(
//!     &fetcher,
//!     "https://example.com/",
//!     &[CheckKind::Mobile],
//!     None,
//! )
//! .await;
//! let assembled = assembler::assemble(raw);
//! println!("{} issues", assembled.summary.total_issues);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod discover;
pub mod fetch;
pub mod gsc;
pub mod types;
pub mod validators;

// Re-export commonly used types
pub use assembler::{AssembledValidation, assemble, summarize};
pub use fetch::{Fetch, FetchedPage, PageFetcher, StaticFetcher};
pub use types::{
    CheckKind, CheckSchedule, GoogleTokenRecord, Issue, IssueCategory, IssueDetails, IssueStatus,
    IssueType, RawIssue, Severity, Site, ValidationSummary, extract_site_id,
};
