//! Structured data (JSON-LD) validation
//!
//! Extracts every `application/ld+json` block from a page and validates the
//! contained schema.org objects against a fixed required/recommended field
//! table, plus date and URL format checks. HTTP-level failures yield zero
//! issues here; status problems are the indexing validator's territory.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value as JsonValue;

use crate::fetch::Fetch;
use crate::types::{IssueDetails, IssueType, RawIssue, Severity};

/// Fields validated for ISO-8601 format when present with a string value.
const DATE_FIELDS: &[&str] = &["datePublished", "dateModified", "uploadDate"];

/// Fields expected to hold absolute URLs.
const URL_FIELDS: &[&str] = &["url", "image", "thumbnailUrl", "contentUrl"];

/// `YYYY-MM-DD` optionally followed by `THH:MM:SS[.mmm](Z|±HH:MM)`.
static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}(T\d{2}:\d{2}:\d{2}(\.\d{1,3})?(Z|[+-]\d{2}:\d{2}))?$")
        .expect("invalid date regex")
});

struct FieldRules {
    required: &'static [&'static str],
    recommended: &'static [&'static str],
}

/// Required/recommended properties per schema.org type. Types not listed get
/// no field-presence checks; format checks still apply to whatever fields
/// the object carries.
static SCHEMA_RULES: Lazy<HashMap<&'static str, FieldRules>> = Lazy::new(|| {
    let mut rules = HashMap::new();
    rules.insert(
        "Article",
        FieldRules {
            required: &["headline", "image", "datePublished"],
            recommended: &["author", "dateModified", "publisher"],
        },
    );
    rules.insert(
        "NewsArticle",
        FieldRules {
            required: &["headline", "image", "datePublished"],
            recommended: &["author", "dateModified", "publisher"],
        },
    );
    rules.insert(
        "BlogPosting",
        FieldRules {
            required: &["headline", "datePublished"],
            recommended: &["author", "image", "dateModified"],
        },
    );
    rules.insert(
        "Product",
        FieldRules {
            required: &["name", "image"],
            recommended: &["description", "offers", "brand", "aggregateRating"],
        },
    );
    rules.insert(
        "VideoObject",
        FieldRules {
            required: &["name", "thumbnailUrl", "uploadDate"],
            recommended: &["description", "duration", "contentUrl"],
        },
    );
    rules.insert(
        "Recipe",
        FieldRules {
            required: &["name", "image"],
            recommended: &["author", "datePublished", "description", "prepTime", "cookTime"],
        },
    );
    rules.insert(
        "Event",
        FieldRules {
            required: &["name", "startDate", "location"],
            recommended: &["image", "description", "endDate", "offers"],
        },
    );
    rules.insert(
        "Organization",
        FieldRules {
            required: &["name"],
            recommended: &["url", "logo", "contactPoint"],
        },
    );
    rules.insert(
        "LocalBusiness",
        FieldRules {
            required: &["name", "address"],
            recommended: &["telephone", "openingHours", "geo"],
        },
    );
    rules.insert(
        "BreadcrumbList",
        FieldRules {
            required: &["itemListElement"],
            recommended: &[],
        },
    );
    rules.insert(
        "FAQPage",
        FieldRules {
            required: &["mainEntity"],
            recommended: &[],
        },
    );
    rules.insert(
        "JobPosting",
        FieldRules {
            required: &["title", "description", "datePosted", "hiringOrganization"],
            recommended: &["validThrough", "baseSalary", "jobLocation"],
        },
    );
    rules
});

/// Fetch a URL and run the structured data checks against its HTML.
pub async fn validate(fetcher: &dyn Fetch, url: &str) -> Vec<RawIssue> {
    let page = match fetcher.get(url).await {
        Ok(page) if page.is_success() => page,
        Ok(page) => {
            tracing::debug!(url, status = page.status, "skipping structured data checks");
            return Vec::new();
        }
        Err(err) => {
            tracing::debug!(url, error = %err, "structured data fetch failed");
            return Vec::new();
        }
    };
    check_html(url, &page.body)
}

/// Run all structured data checks against already-fetched HTML.
pub fn check_html(url: &str, html: &str) -> Vec<RawIssue> {
    let blocks = extract_json_ld_blocks(html);
    if blocks.is_empty() {
        return vec![RawIssue {
            url: url.to_string(),
            issue_type: IssueType::MissingSchema,
            severity: Severity::Error,
            auto_fixable: true,
            suggested_fix: "Add a JSON-LD script block describing this page's primary content"
                .to_string(),
            details: IssueDetails::default(),
        }];
    }

    let mut issues = Vec::new();
    for block in &blocks {
        match serde_json::from_str::<JsonValue>(block) {
            Ok(value) => {
                for object in flatten_objects(value) {
                    check_object(url, &object, &mut issues);
                }
            }
            Err(err) => issues.push(RawIssue {
                url: url.to_string(),
                issue_type: IssueType::SyntaxError,
                severity: Severity::Error,
                auto_fixable: true,
                suggested_fix: "Fix the JSON syntax of the ld+json script block".to_string(),
                details: IssueDetails {
                    actual: Some(err.to_string()),
                    ..Default::default()
                },
            }),
        }
    }
    issues
}

/// Extract JSON-LD script blocks from HTML. Matches `type` values like
/// `application/ld+json; charset=utf-8` and skips empty blocks.
pub fn extract_json_ld_blocks(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let script_selector = Selector::parse("script").expect("valid selector");

    document
        .select(&script_selector)
        .filter_map(|element| {
            let script_type = element
                .value()
                .attr("type")
                .map(|t| t.trim().to_ascii_lowercase())
                .unwrap_or_default();

            if script_type.contains("ld+json") {
                let text = element.text().collect::<String>().trim().to_string();
                if text.is_empty() { None } else { Some(text) }
            } else {
                None
            }
        })
        .collect()
}

/// Flatten a parsed block into the objects to validate: `@graph` members,
/// top-level array members, or the object itself. Non-object members are
/// skipped.
fn flatten_objects(value: JsonValue) -> Vec<JsonValue> {
    match value {
        JsonValue::Object(obj) => {
            if let Some(JsonValue::Array(graph)) = obj.get("@graph") {
                graph.iter().filter(|v| v.is_object()).cloned().collect()
            } else {
                vec![JsonValue::Object(obj)]
            }
        }
        JsonValue::Array(items) => items.into_iter().filter(|v| v.is_object()).collect(),
        _ => Vec::new(),
    }
}

fn check_object(url: &str, object: &JsonValue, issues: &mut Vec<RawIssue>) {
    let schema_type = resolve_type(object);

    if let Some(rules) = SCHEMA_RULES.get(schema_type.as_str()) {
        for field in rules.required {
            if !has_value(object, field) {
                issues.push(field_issue(
                    url,
                    IssueType::MissingRequiredField,
                    Severity::Error,
                    &schema_type,
                    field,
                    format!("Add the required '{field}' property to the {schema_type} object"),
                ));
            }
        }
        for field in rules.recommended {
            if !has_value(object, field) {
                issues.push(field_issue(
                    url,
                    IssueType::MissingRecommendedField,
                    Severity::Warning,
                    &schema_type,
                    field,
                    format!("Add the recommended '{field}' property to the {schema_type} object"),
                ));
            }
        }
    }

    for field in DATE_FIELDS {
        if let Some(JsonValue::String(value)) = object.get(*field)
            && !ISO_DATE.is_match(value)
        {
            issues.push(RawIssue {
                url: url.to_string(),
                issue_type: IssueType::InvalidFieldValue,
                severity: Severity::Error,
                auto_fixable: true,
                suggested_fix: format!(
                    "Use an ISO 8601 date (YYYY-MM-DD or full timestamp) for '{field}'"
                ),
                details: IssueDetails {
                    schema_type: Some(schema_type.clone()),
                    field: Some((*field).to_string()),
                    expected: Some("ISO 8601 date".to_string()),
                    actual: Some(value.clone()),
                    ..Default::default()
                },
            });
        }
    }

    for field in URL_FIELDS {
        if let Some(value) = object.get(*field)
            && let Some(resolved) = resolve_url_value(value)
            && resolved.starts_with('/')
        {
            issues.push(RawIssue {
                url: url.to_string(),
                issue_type: IssueType::InvalidFieldValue,
                severity: Severity::Error,
                auto_fixable: true,
                suggested_fix: format!("Use an absolute URL for '{field}'"),
                details: IssueDetails {
                    schema_type: Some(schema_type.clone()),
                    field: Some((*field).to_string()),
                    expected: Some("absolute URL".to_string()),
                    actual: Some(resolved.to_string()),
                    ..Default::default()
                },
            });
        }
    }
}

fn field_issue(
    url: &str,
    issue_type: IssueType,
    severity: Severity,
    schema_type: &str,
    field: &str,
    suggested_fix: String,
) -> RawIssue {
    RawIssue {
        url: url.to_string(),
        issue_type,
        severity,
        auto_fixable: true,
        suggested_fix,
        details: IssueDetails {
            schema_type: Some(schema_type.to_string()),
            field: Some(field.to_string()),
            ..Default::default()
        },
    }
}

fn resolve_type(object: &JsonValue) -> String {
    match object.get("@type") {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .find_map(|item| item.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        _ => "Unknown".to_string(),
    }
}

/// A field counts as present only when it exists, is not null and is not an
/// empty string.
fn has_value(object: &JsonValue, field: &str) -> bool {
    match object.get(field) {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Unwrap the URL-ish value of a field: array-first-element, an object's
/// `url` sub-field, or the string itself.
fn resolve_url_value(value: &JsonValue) -> Option<&str> {
    match value {
        JsonValue::String(s) => Some(s),
        JsonValue::Array(items) => items.first().and_then(resolve_url_value),
        JsonValue::Object(obj) => obj.get("url").and_then(|v| v.as_str()),
        _ => None,
    }
}
