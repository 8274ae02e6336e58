//! Failure taxonomy and response shaping.
//!
//! `Failure` is the only error that leaves the workflow. The shaping
//! functions are the single place where outcomes become protocol results.

use std::collections::BTreeMap;

use thiserror::Error;

use licensehub_core::StoreError;

use crate::license::{License, LicenseSummary};

/// File name offered to clients downloading a single license.
pub const LICENSE_FILE_NAME: &str = "license.lcpl";

/// Media type of a license document.
pub const LICENSE_CONTENT_TYPE: &str = "application/vnd.readium.lcp.license.v1.0+json";

pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_TYPE: &str = "Content-Type";

/// Classified workflow failure. Never retried inside the workflow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The purchase, license or filtered set does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Anything else from the store or the issuance engine.
    #[error("{0}")]
    Backend(String),
}

impl Failure {
    pub fn detail(&self) -> &str {
        match self {
            Self::NotFound(d) | Self::Backend(d) => d,
        }
    }
}

impl From<StoreError> for Failure {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(m) => Self::NotFound(m),
            StoreError::Backend(m) => Self::Backend(m),
        }
    }
}

/// Three-way protocol status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemStatus {
    Ok,
    NotFound,
    InternalError,
}

impl ProblemStatus {
    /// HTTP status code.
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::NotFound => 404,
            Self::InternalError => 500,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Ok
    }
}

/// Response headers, name to values. Built once per response and not
/// mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Later pairs with the same name append to that name's values.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in pairs {
            map.entry(k.into()).or_default().push(v.into());
        }
        Self(map)
    }

    /// First value for `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }
}

/// Status, detail and headers of one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub status: ProblemStatus,
    pub detail: Option<String>,
    pub headers: Headers,
}

impl Problem {
    pub fn ok(headers: Headers) -> Self {
        Self {
            status: ProblemStatus::Ok,
            detail: None,
            headers,
        }
    }

    pub fn from_failure(failure: &Failure) -> Self {
        let status = match failure {
            Failure::NotFound(_) => ProblemStatus::NotFound,
            Failure::Backend(_) => ProblemStatus::InternalError,
        };
        Self {
            status,
            detail: Some(failure.detail().to_string()),
            headers: Headers::empty(),
        }
    }
}

/// A shaped outcome: the problem envelope plus a body on success.
#[derive(Debug, Clone, PartialEq)]
pub struct Shaped<T> {
    pub problem: Problem,
    pub body: Option<T>,
}

impl<T> Shaped<T> {
    fn failed(failure: &Failure) -> Self {
        Self {
            problem: Problem::from_failure(failure),
            body: None,
        }
    }
}

/// Shape a single-license resolution. Success is delivered as a file
/// download named `LICENSE_FILE_NAME`.
pub fn shape_license(outcome: Result<License, Failure>) -> Shaped<License> {
    match outcome {
        Ok(license) => Shaped {
            problem: Problem::ok(Headers::from_pairs([
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{LICENSE_FILE_NAME}\""),
                ),
                (CONTENT_TYPE, LICENSE_CONTENT_TYPE.to_string()),
            ])),
            body: Some(license),
        },
        Err(failure) => Shaped::failed(&failure),
    }
}

/// Shape a filtered listing. Success carries the summaries and no headers.
pub fn shape_listing(outcome: Result<Vec<License>, Failure>) -> Shaped<Vec<LicenseSummary>> {
    match outcome {
        Ok(licenses) => Shaped {
            problem: Problem::ok(Headers::empty()),
            body: Some(licenses.iter().map(License::summary).collect()),
        },
        Err(failure) => Shaped::failed(&failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use licensehub_core::{LicenseId, PurchaseId, UserId};

    use crate::license::Rights;

    fn license() -> License {
        License {
            id: LicenseId::from("abc123"),
            purchase_id: PurchaseId::from("p1"),
            content_id: "c1".to_string(),
            user_id: UserId::from("u1"),
            provider: "https://provider.test".to_string(),
            issued: Utc::now(),
            updated: None,
            rights: Rights::default(),
            devices: vec![],
            document: serde_json::Value::Null,
        }
    }

    #[test]
    fn store_not_found_stays_not_found() {
        let failure = Failure::from(StoreError::not_found("record not found"));
        assert_eq!(failure, Failure::NotFound("record not found".to_string()));
        assert_eq!(Problem::from_failure(&failure).status, ProblemStatus::NotFound);
    }

    #[test]
    fn backend_failure_is_internal_error_with_detail() {
        let shaped = shape_license(Err(Failure::Backend("db down".to_string())));
        assert_eq!(shaped.problem.status, ProblemStatus::InternalError);
        assert_eq!(shaped.problem.status.code(), 500);
        assert_eq!(shaped.problem.detail.as_deref(), Some("db down"));
        assert!(shaped.body.is_none());
        assert!(shaped.problem.headers.is_empty());
    }

    #[test]
    fn license_success_is_an_attachment() {
        let shaped = shape_license(Ok(license()));
        assert_eq!(shaped.problem.status, ProblemStatus::Ok);
        assert_eq!(
            shaped.problem.headers.get("content-disposition"),
            Some("attachment; filename=\"license.lcpl\"")
        );
        assert_eq!(shaped.body.unwrap().id.as_str(), "abc123");
    }

    #[test]
    fn listing_success_has_no_attachment_header() {
        let shaped = shape_listing(Ok(vec![license()]));
        assert_eq!(shaped.problem.status, ProblemStatus::Ok);
        assert!(!shaped.problem.headers.contains(CONTENT_DISPOSITION));
        assert_eq!(shaped.body.unwrap().len(), 1);
    }

    #[test]
    fn listing_not_found_maps_to_404() {
        let shaped = shape_listing(Err(Failure::NotFound("no licenses".to_string())));
        assert_eq!(shaped.problem.status.code(), 404);
    }

    #[test]
    fn headers_keep_every_value() {
        let headers = Headers::from_pairs([("Link", "a"), ("Link", "b"), ("X-Id", "1")]);
        let all: Vec<_> = headers.iter().collect();
        assert_eq!(all, vec![("Link", "a"), ("Link", "b"), ("X-Id", "1")]);
        assert_eq!(headers.get("link"), Some("a"));
    }
}
