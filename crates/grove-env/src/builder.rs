//! HTTP client for the external builder service.
//!
//! Dispatch is a bounded-timeout synchronous call; a failure is reported
//! as a value and never rolls back the local commit that queued the
//! environment.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use time::format_description::well_known::Iso8601;
use time::OffsetDateTime;
use url::Url;

use crate::config::BuilderSettings;
use crate::manifest::Package;
use crate::response::EnvironmentError;

/// A build request for `path/name-N`.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Full environment path including the suffix.
    pub name: String,
    /// The allocated suffix, passed separately as the build version.
    pub version: String,
    pub description: String,
    pub packages: Vec<Package>,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    name: &'a str,
    version: &'a str,
    model: WireModel<'a>,
}

#[derive(Serialize)]
struct WireModel<'a> {
    description: &'a str,
    packages: Vec<WirePackage<'a>>,
}

#[derive(Serialize)]
struct WirePackage<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
}

/// One build known to the builder, from its status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStatus {
    pub name: String,
    pub requested: OffsetDateTime,
    pub build_start: Option<OffsetDateTime>,
    pub build_done: Option<OffsetDateTime>,
}

#[derive(serde::Deserialize)]
struct WireStatus {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Requested")]
    requested: String,
    #[serde(rename = "BuildStart")]
    build_start: Option<String>,
    #[serde(rename = "BuildDone")]
    build_done: Option<String>,
}

pub struct BuilderClient {
    base: Url,
    client: Client,
}

impl BuilderClient {
    pub fn new(settings: &BuilderSettings) -> Result<Self, EnvironmentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| EnvironmentError::Builder(err.to_string()))?;
        Ok(Self {
            base: settings.url.clone(),
            client,
        })
    }

    /// Ask the builder to build an environment.
    pub fn dispatch(&self, request: &BuildRequest) -> Result<(), EnvironmentError> {
        let url = self.endpoint("environments/build")?;
        let wire = WireRequest {
            name: &request.name,
            version: &request.version,
            model: WireModel {
                description: &request.description,
                packages: request
                    .packages
                    .iter()
                    .map(|p| WirePackage {
                        name: &p.name,
                        version: p.version.as_deref(),
                    })
                    .collect(),
            },
        };
        let response = self
            .client
            .post(url)
            .json(&wire)
            .send()
            .map_err(|err| EnvironmentError::Builder(err.to_string()))?;
        if !response.status().is_success() {
            return Err(EnvironmentError::Builder(format!(
                "build request for {} returned {}",
                request.name,
                response.status()
            )));
        }
        Ok(())
    }

    /// All builds the builder knows about.
    pub fn statuses(&self) -> Result<Vec<BuildStatus>, EnvironmentError> {
        let url = self.endpoint("environments/status")?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| EnvironmentError::Builder(err.to_string()))?;
        if !response.status().is_success() {
            return Err(EnvironmentError::Builder(format!(
                "status request returned {}",
                response.status()
            )));
        }
        let wire: Vec<WireStatus> = response
            .json()
            .map_err(|err| EnvironmentError::Builder(err.to_string()))?;
        wire.into_iter().map(decode_status).collect()
    }

    fn endpoint(&self, path: &str) -> Result<Url, EnvironmentError> {
        self.base
            .join(path)
            .map_err(|err| EnvironmentError::Builder(err.to_string()))
    }
}

fn decode_status(wire: WireStatus) -> Result<BuildStatus, EnvironmentError> {
    Ok(BuildStatus {
        name: wire.name,
        requested: parse_timestamp(&wire.requested)?,
        build_start: wire
            .build_start
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
        build_done: wire
            .build_done
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
    })
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, EnvironmentError> {
    OffsetDateTime::parse(raw, &Iso8601::DEFAULT)
        .map_err(|err| EnvironmentError::Builder(format!("bad timestamp '{raw}': {err}")))
}

/// Mean seconds from request to completion over finished builds.
#[must_use]
pub fn average_wait_seconds(statuses: &[BuildStatus]) -> Option<f64> {
    let waits: Vec<f64> = statuses
        .iter()
        .filter_map(|s| s.build_done.map(|done| (done - s.requested).as_seconds_f64()))
        .collect();
    if waits.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(waits.iter().sum::<f64>() / waits.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};

    fn client(server: &Server) -> BuilderClient {
        BuilderClient::new(&BuilderSettings {
            url: Url::parse(&server.url_str("/")).unwrap(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn request() -> BuildRequest {
        BuildRequest {
            name: "users/alice/tools-1".to_string(),
            version: "1".to_string(),
            description: "some tools".to_string(),
            packages: vec![Package::parse("python@3.11"), Package::parse("zlib")],
        }
    }

    #[test]
    fn dispatch_posts_the_build_payload() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/environments/build"),
                request::body(json_decoded(eq(serde_json::json!({
                    "name": "users/alice/tools-1",
                    "version": "1",
                    "model": {
                        "description": "some tools",
                        "packages": [
                            {"name": "python", "version": "3.11"},
                            {"name": "zlib"},
                        ],
                    },
                })))),
            ])
            .respond_with(status_code(200)),
        );
        client(&server).dispatch(&request()).unwrap();
    }

    #[test]
    fn non_success_status_is_a_builder_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/environments/build"))
                .respond_with(status_code(500)),
        );
        let err = client(&server).dispatch(&request()).unwrap_err();
        assert!(matches!(err, EnvironmentError::Builder(_)));
    }

    #[test]
    fn statuses_parse_nullable_timestamps() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/environments/status"))
                .respond_with(json_encoded(serde_json::json!([
                    {
                        "Name": "users/alice/tools-1",
                        "Requested": "2026-08-20T10:00:00Z",
                        "BuildStart": "2026-08-20T10:05:00Z",
                        "BuildDone": "2026-08-20T10:15:00Z",
                    },
                    {
                        "Name": "users/bob/stats-2",
                        "Requested": "2026-08-20T11:00:00Z",
                        "BuildStart": null,
                        "BuildDone": null,
                    },
                ]))),
        );
        let statuses = client(&server).statuses().unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].name, "users/alice/tools-1");
        assert!(statuses[0].build_done.is_some());
        assert_eq!(statuses[1].build_start, None);

        // only the finished build contributes to the average
        let avg = average_wait_seconds(&statuses).unwrap();
        assert!((avg - 900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn average_of_no_finished_builds_is_none() {
        assert_eq!(average_wait_seconds(&[]), None);
    }
}
