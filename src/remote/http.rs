use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::Duration;
use url::Url;

use super::{AttendanceEndpoint, AttendanceRecord, ResolvePayload};
use crate::error::CaptureError;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Roster service reached over HTTP GET with query parameters.
#[derive(Clone)]
pub struct HttpEndpoint {
    agent: ureq::Agent,
    base: Url,
}

impl HttpEndpoint {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).context("parse roster endpoint url")?;
        match base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported roster endpoint scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { agent, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Full request URL for the given query parameters.
    pub fn request_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().extend_pairs(params);
        url
    }

    fn get(&self, params: &[(&str, &str)]) -> Result<String> {
        let url = self.request_url(params);
        log::debug!(
            "roster request: action={}",
            params.first().map_or("", |(_, action)| *action)
        );
        let response = match self.agent.get(url.as_str()).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(anyhow!(CaptureError::TransportError(format!(
                    "HTTP status {}",
                    code
                ))))
            }
            Err(err) => {
                return Err(anyhow!(CaptureError::TransportError(err.to_string())));
            }
        };
        let mut body = String::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES as u64)
            .read_to_string(&mut body)
            .map_err(|e| anyhow!(CaptureError::TransportError(format!("read body: {}", e))))?;
        Ok(body)
    }
}

impl AttendanceEndpoint for HttpEndpoint {
    fn resolve(&self, raw_text: &str) -> Result<ResolvePayload> {
        let body = self.get(&[("action", "parse"), ("qrData", raw_text)])?;
        serde_json::from_str(&body).map_err(|e| {
            anyhow!(CaptureError::TransportError(format!(
                "invalid resolve payload: {}",
                e
            )))
        })
    }

    fn save(&self, record: &AttendanceRecord) -> Result<String> {
        self.get(&[
            ("action", "save"),
            ("selectedName", record.identity.as_str()),
            ("uniformCompliance", record.compliance.as_wire()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirmation::ComplianceState;

    #[test]
    fn encodes_query_parameters() {
        let endpoint =
            HttpEndpoint::new("https://roster.example/exec", Duration::from_secs(5)).unwrap();
        let url = endpoint.request_url(&[("action", "parse"), ("qrData", "ID:42&name=Ann Lee")]);
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("action".to_string(), "parse".to_string()),
                ("qrData".to_string(), "ID:42&name=Ann Lee".to_string()),
            ]
        );
        assert!(!url.as_str().contains("Ann Lee"));

        let record = AttendanceRecord {
            identity: "Bob".into(),
            compliance: ComplianceState::Partial,
        };
        let url = endpoint.request_url(&[
            ("action", "save"),
            ("selectedName", record.identity.as_str()),
            ("uniformCompliance", record.compliance.as_wire()),
        ]);
        assert!(url.as_str().starts_with("https://roster.example/exec?action=save"));
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(HttpEndpoint::new("ftp://roster.example", Duration::from_secs(5)).is_err());
        assert!(HttpEndpoint::new("not a url", Duration::from_secs(5)).is_err());
    }
}
