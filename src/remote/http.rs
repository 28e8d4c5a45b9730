//! HTTP detection service client.
//!
//! Submits media as `multipart/form-data` (single `file` field) and parses the
//! JSON response through the strict schema in the parent module. `ureq` has no
//! multipart builder, so the body framing is assembled here.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use url::Url;

use super::{parse_report, DetectionReport, DetectionService, TransportError};

/// Default request timeout for detection calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Form field the service expects the media under.
const UPLOAD_FIELD: &str = "file";

/// Blocking HTTP client for the remote detection API.
pub struct HttpDetectionService {
    endpoint: Url,
    agent: ureq::Agent,
}

impl HttpDetectionService {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("parse detection endpoint '{}'", endpoint))?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported endpoint scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { endpoint, agent })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl DetectionService for HttpDetectionService {
    fn name(&self) -> &'static str {
        "http"
    }

    fn detect(&self, file_name: &str, media: &[u8]) -> Result<DetectionReport, TransportError> {
        let boundary = multipart_boundary();
        let body = multipart_body(&boundary, file_name, media);
        let content_type = format!("multipart/form-data; boundary={}", boundary);

        log::debug!(
            "submitting {} bytes from '{}' to {}",
            media.len(),
            file_name,
            self.endpoint
        );

        let response = self
            .agent
            .post(self.endpoint.as_str())
            .set("Content-Type", &content_type)
            .send_bytes(&body)
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => TransportError::status(code),
                ureq::Error::Transport(transport) => TransportError::network(transport.to_string()),
            })?;

        let body = response
            .into_string()
            .map_err(|err| TransportError::network(format!("reading response body: {}", err)))?;
        parse_report(&body)
    }
}

fn multipart_boundary() -> String {
    format!("incident-watch-{:016x}", rand::random::<u64>())
}

fn multipart_body(boundary: &str, file_name: &str, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            UPLOAD_FIELD,
            sanitize_file_name(file_name)
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", media_content_type(file_name)).as_bytes());
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

/// Strip characters that would break the multipart header line.
fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .filter(|c| !matches!(c, '"' | '\r' | '\n'))
        .collect()
}

fn media_content_type(file_name: &str) -> &'static str {
    let ext = file_name.rsplit('.').next().unwrap_or_default().to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(HttpDetectionService::new("ftp://example/upload", DEFAULT_TIMEOUT).is_err());
        assert!(HttpDetectionService::new("not a url", DEFAULT_TIMEOUT).is_err());
        assert!(HttpDetectionService::new("http://127.0.0.1:8000/object-to-json", DEFAULT_TIMEOUT)
            .is_ok());
    }

    #[test]
    fn multipart_body_frames_the_payload() {
        let body = multipart_body("b0undary", "clip.jpg", b"JPEGDATA");
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with("--b0undary\r\n"));
        assert!(text.contains("Content-Disposition: form-data; name=\"file\"; filename=\"clip.jpg\""));
        assert!(text.contains("Content-Type: image/jpeg\r\n\r\nJPEGDATA"));
        assert!(text.ends_with("\r\n--b0undary--\r\n"));
    }

    #[test]
    fn file_names_are_sanitized_for_the_header() {
        let body = multipart_body("b", "we\"ird\r\n.png", b"x");
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("filename=\"weird.png\""));
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(media_content_type("a.jpeg"), "image/jpeg");
        assert_eq!(media_content_type("a.PNG"), "image/png");
        assert_eq!(media_content_type("clip.mp4"), "video/mp4");
        assert_eq!(media_content_type("mystery"), "application/octet-stream");
    }

    #[test]
    fn boundaries_do_not_collide_trivially() {
        let a = multipart_boundary();
        let b = multipart_boundary();
        assert!(a.starts_with("incident-watch-"));
        assert_ne!(a, b);
    }
}
