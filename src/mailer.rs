use crate::errors::{AppError, AppResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const BASE64_LINE_WIDTH: usize = 76;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<MailAttachment>,
}

/// Delivery seam for report mail.
pub trait MailTransport: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> AppResult<()>;
}

/// Writes each message as a complete MIME document into an outbox directory,
/// where a relay or a human can pick it up.
#[derive(Debug, Clone)]
pub struct SpoolMailer {
    outbox_dir: PathBuf,
}

impl SpoolMailer {
    pub fn new(outbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            outbox_dir: outbox_dir.into(),
        }
    }

    pub fn outbox_dir(&self) -> &Path {
        &self.outbox_dir
    }
}

impl MailTransport for SpoolMailer {
    fn send(&self, mail: &OutgoingMail) -> AppResult<()> {
        if mail.to.trim().is_empty() {
            return Err(AppError::Mail("Recipient address is empty".to_string()));
        }

        fs::create_dir_all(&self.outbox_dir).map_err(|error| {
            AppError::Mail(format!("creating outbox {}: {}", self.outbox_dir.display(), error))
        })?;

        let message_id = Uuid::new_v4();
        let path = self.outbox_dir.join(format!("{}.eml", message_id));
        let rendered = render_mime(mail, &message_id.to_string());
        fs::write(&path, rendered)
            .map_err(|error| AppError::Mail(format!("writing {}: {}", path.display(), error)))?;

        tracing::info!(to = %mail.to, subject = %mail.subject, path = %path.display(), "spooled report mail");
        Ok(())
    }
}

/// Renders `mail` as a `multipart/mixed` message with base64 attachments.
pub fn render_mime(mail: &OutgoingMail, message_id: &str) -> String {
    let boundary = format!("report-{}", message_id);
    let mut out = String::new();

    out.push_str(&format!("From: {}\r\n", header_value(&mail.from)));
    out.push_str(&format!("To: {}\r\n", header_value(&mail.to)));
    out.push_str(&format!("Subject: {}\r\n", header_value(&mail.subject)));
    out.push_str(&format!("Date: {}\r\n", Utc::now().to_rfc2822()));
    out.push_str(&format!("Message-ID: <{}@custom-reports>\r\n", message_id));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str(&format!("Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n", boundary));

    out.push_str(&format!("--{}\r\n", boundary));
    out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    out.push_str("Content-Transfer-Encoding: 8bit\r\n\r\n");
    out.push_str(&mail.text);
    out.push_str("\r\n");

    for attachment in &mail.attachments {
        let file_name = quoted_parameter(&attachment.file_name);
        out.push_str(&format!("--{}\r\n", boundary));
        out.push_str(&format!(
            "Content-Type: {}; name=\"{}\"\r\n",
            header_value(&attachment.content_type),
            file_name
        ));
        out.push_str("Content-Transfer-Encoding: base64\r\n");
        out.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
            file_name
        ));
        let encoded = STANDARD.encode(&attachment.bytes);
        for chunk in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push_str("\r\n");
        }
    }

    out.push_str(&format!("--{}--\r\n", boundary));
    out
}

/// Header-safe form of `value`: control characters (CR and LF included)
/// become spaces, and non-ASCII text is RFC 2047 base64 encoded.
fn header_value(value: &str) -> String {
    let flattened: String = value
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect();
    if flattened.is_ascii() {
        flattened
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(flattened.as_bytes()))
    }
}

/// Value for a quoted MIME parameter such as `filename="..."`.
fn quoted_parameter(value: &str) -> String {
    header_value(value).replace('\\', "\\\\").replace('"', "\\\"")
}
