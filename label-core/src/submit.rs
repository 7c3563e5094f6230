//! Hand-off of a finished document plus customer details to a transport.
//!
//! The adapter only validates and packages; delivery (HTTP, mail relay, a
//! queue) is whatever `Transport` the caller passes in. Failures come back
//! unchanged and the artifact is only borrowed, so a retry needs no re-export.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{SubmissionError, TransportError};
use crate::export::ExportArtifact;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CustomerContact {
    pub fn validate(&self) -> Result<(), SubmissionError> {
        if self.name.trim().is_empty() {
            return Err(SubmissionError::MissingField("name"));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(SubmissionError::MissingField("email"));
        }
        let valid = match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace),
            None => false,
        };
        if !valid {
            return Err(SubmissionError::InvalidEmail(email.to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// Ordered form fields ready for a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionPackage {
    pub parts: Vec<FormPart>,
}

impl SubmissionPackage {
    pub fn new(artifact: &ExportArtifact, contact: &CustomerContact) -> Result<Self, SubmissionError> {
        contact.validate()?;
        let mut parts = Vec::new();
        let mut text = |name: &str, value: &str| {
            parts.push(FormPart::Text {
                name: name.to_string(),
                value: value.trim().to_string(),
            })
        };
        text("name", &contact.name);
        text("email", &contact.email);
        if let Some(phone) = contact.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            text("phone", phone);
        }
        if let Some(message) = contact.message.as_deref().filter(|m| !m.trim().is_empty()) {
            text("message", message);
        }
        text("pageCount", &artifact.page_count.to_string());
        parts.push(FormPart::File {
            name: "label".to_string(),
            file_name: artifact.file_name.clone(),
            content_type: ExportArtifact::MIME_TYPE.to_string(),
            bytes: artifact.bytes.clone(),
        });
        Ok(SubmissionPackage { parts })
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// `multipart/form-data` body and its content type.
    pub fn to_multipart(&self, boundary: &str) -> (String, Vec<u8>) {
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match part {
                FormPart::Text { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                FormPart::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }
}

/// Delivery capability injected by the caller. Retrying, if wanted, is the
/// transport's business.
pub trait Transport {
    fn send(&self, package: &SubmissionPackage) -> impl Future<Output = Result<(), TransportError>>;
}

/// Logs the package instead of sending it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTransport;

impl Transport for LogTransport {
    async fn send(&self, package: &SubmissionPackage) -> Result<(), TransportError> {
        for part in &package.parts {
            match part {
                FormPart::Text { name, value } => tracing::info!(field = %name, len = value.len(), "submission field"),
                FormPart::File {
                    name,
                    file_name,
                    bytes,
                    ..
                } => tracing::info!(field = %name, file = %file_name, bytes = bytes.len(), "submission file"),
            }
        }
        Ok(())
    }
}

/// Validate, package and send once.
pub async fn submit<T: Transport>(
    artifact: &ExportArtifact,
    contact: &CustomerContact,
    transport: &T,
) -> Result<(), SubmissionError> {
    let package = SubmissionPackage::new(artifact, contact)?;
    match transport.send(&package).await {
        Ok(()) => {
            tracing::info!(file = %artifact.file_name, "submission delivered");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, "submission transport failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::Cell;

    fn artifact() -> ExportArtifact {
        ExportArtifact {
            bytes: b"%PDF-1.7 fake".to_vec(),
            page_count: 2,
            page_size_mm: (74.0, 51.0),
            file_name: "service-label.pdf".into(),
        }
    }

    fn contact() -> CustomerContact {
        CustomerContact {
            name: "Sam Driver".into(),
            email: "sam@example.com".into(),
            phone: None,
            message: Some("two rolls please".into()),
        }
    }

    struct Flaky {
        calls: Cell<u32>,
    }

    impl Transport for Flaky {
        async fn send(&self, _: &SubmissionPackage) -> Result<(), TransportError> {
            self.calls.set(self.calls.get() + 1);
            Err(TransportError::new("connection refused"))
        }
    }

    #[test]
    fn contact_requires_name_and_plausible_email() {
        let mut c = contact();
        assert!(c.validate().is_ok());
        c.email = "nobody".into();
        assert_eq!(c.validate(), Err(SubmissionError::InvalidEmail("nobody".into())));
        c.email = " ".into();
        assert_eq!(c.validate(), Err(SubmissionError::MissingField("email")));
        c.name.clear();
        assert_eq!(c.validate(), Err(SubmissionError::MissingField("name")));
    }

    #[test]
    fn package_orders_fields_and_skips_empty_optionals() {
        let p = SubmissionPackage::new(&artifact(), &contact()).unwrap();
        let names: Vec<_> = p
            .parts
            .iter()
            .map(|part| match part {
                FormPart::Text { name, .. } | FormPart::File { name, .. } => name.as_str(),
            })
            .collect();
        assert_eq!(names, ["name", "email", "message", "pageCount", "label"]);
        assert_eq!(p.text("pageCount"), Some("2"));
    }

    #[test]
    fn multipart_body_frames_every_part() {
        let p = SubmissionPackage::new(&artifact(), &contact()).unwrap();
        let (ct, body) = p.to_multipart("XyZ");
        assert_eq!(ct, "multipart/form-data; boundary=XyZ");
        let text = String::from_utf8_lossy(&body);
        assert_eq!(text.matches("--XyZ\r\n").count(), 5);
        assert!(text.ends_with("--XyZ--\r\n"));
        assert!(text.contains("filename=\"service-label.pdf\"\r\nContent-Type: application/pdf"));
        assert!(text.contains("%PDF-1.7 fake"));
    }

    #[test]
    fn transport_failure_is_reported_once_and_artifact_survives() {
        let a = artifact();
        let t = Flaky { calls: Cell::new(0) };
        let err = block_on(submit(&a, &contact(), &t)).unwrap_err();
        assert_eq!(err, SubmissionError::Transport("connection refused".into()));
        assert_eq!(t.calls.get(), 1);
        assert_eq!(a.bytes, b"%PDF-1.7 fake");
        assert!(block_on(submit(&a, &contact(), &LogTransport)).is_ok());
    }

    #[test]
    fn invalid_contact_never_reaches_transport() {
        let t = Flaky { calls: Cell::new(0) };
        let mut c = contact();
        c.name = String::new();
        assert!(block_on(submit(&artifact(), &c, &t)).is_err());
        assert_eq!(t.calls.get(), 0);
    }
}
