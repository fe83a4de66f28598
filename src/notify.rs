//! Delivery of finished payloads.
//!
//! [`SmtpNotifier`] submits over implicit TLS with the account credentials;
//! [`DryRunNotifier`] prints instead of sending. Delivery is best-effort:
//! errors come back as [`PipelineError::Delivery`] and the pipeline only
//! logs them. Nothing here retries.

use crate::config::EmailSettings;
use crate::error::PipelineError;
use crate::models::DeliveryPayload;
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment as MailAttachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

/// Anything that can deliver a [`DeliveryPayload`].
pub trait Notify {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), PipelineError>;
}

/// Authenticated SMTP submission.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &EmailSettings) -> Result<Self, PipelineError> {
        let from = parse_mailbox(&settings.user)?;
        let to = parse_mailbox(&settings.to)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
            .map_err(|e| PipelineError::config(format!("invalid SMTP host {}: {e}", settings.smtp_host)))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.user.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

impl Notify for SmtpNotifier {
    #[instrument(level = "info", skip_all, fields(subject = %payload.subject, attachments = payload.attachments.len()))]
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), PipelineError> {
        let message = build_message(&self.from, &self.to, payload)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| PipelineError::Delivery(e.to_string()))?;
        info!(to = %self.to, "Email sent successfully");
        Ok(())
    }
}

/// Prints payloads to stdout instead of sending them.
#[derive(Debug, Default)]
pub struct DryRunNotifier;

impl Notify for DryRunNotifier {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), PipelineError> {
        println!("Subject: {}", payload.subject);
        for attachment in &payload.attachments {
            println!(
                "Attachment: {} ({}, {} bytes)",
                attachment.filename,
                attachment.mime_type,
                attachment.bytes.len()
            );
        }
        println!("\n{}\n", payload.body);
        info!(subject = %payload.subject, "Dry run: payload printed instead of sent");
        Ok(())
    }
}

/// The notifier selected at startup.
pub enum Mailer {
    Smtp(SmtpNotifier),
    DryRun(DryRunNotifier),
}

impl Notify for Mailer {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), PipelineError> {
        match self {
            Mailer::Smtp(smtp) => smtp.deliver(payload).await,
            Mailer::DryRun(dry) => dry.deliver(payload).await,
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, PipelineError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| PipelineError::config(format!("invalid email address {address:?}: {e}")))
}

/// Build the MIME message: plain-text body, every attachment base64-encoded.
pub fn build_message(
    from: &Mailbox,
    to: &Mailbox,
    payload: &DeliveryPayload,
) -> Result<Message, PipelineError> {
    let builder = Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(payload.subject.clone());

    let message = if payload.attachments.is_empty() {
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(payload.body.clone())
    } else {
        let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(payload.body.clone()));
        for attachment in &payload.attachments {
            let content_type = ContentType::parse(&attachment.mime_type).map_err(|e| {
                PipelineError::Delivery(format!(
                    "invalid MIME type {:?} for {}: {e}",
                    attachment.mime_type, attachment.filename
                ))
            })?;
            let body = Body::new_with_encoding(attachment.bytes.clone(), ContentTransferEncoding::Base64)
                .map_err(|_| {
                    PipelineError::Delivery(format!("cannot base64-encode {}", attachment.filename))
                })?;
            multipart = multipart
                .singlepart(MailAttachment::new(attachment.filename.clone()).body(body, content_type));
        }
        builder.multipart(multipart)
    };

    message.map_err(|e| PipelineError::Delivery(format!("failed to build message: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attachment;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;

    fn mailbox(s: &str) -> Mailbox {
        s.parse().unwrap()
    }

    #[test]
    fn test_plain_message_headers() {
        let payload = DeliveryPayload::new("Groww Daily Digest", "Groww Daily Digest Analysis");
        let message = build_message(
            &mailbox("sender@example.com"),
            &mailbox("reader@example.com"),
            &payload,
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("From: sender@example.com"));
        assert!(raw.contains("To: reader@example.com"));
        assert!(raw.contains("Subject: Groww Daily Digest"));
        assert!(raw.contains("Groww Daily Digest Analysis"));
    }

    #[test]
    fn test_attachments_are_base64_encoded() {
        let png = vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];
        let payload = DeliveryPayload::new("alice analysis", "Juicy News: Yes").with_attachment(
            Attachment {
                filename: "alice_screenshot.png".to_string(),
                mime_type: "image/png".to_string(),
                bytes: png.clone(),
            },
        );
        let message = build_message(
            &mailbox("sender@example.com"),
            &mailbox("reader@example.com"),
            &payload,
        )
        .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Content-Transfer-Encoding: base64"));
        assert!(raw.contains("alice_screenshot.png"));
        assert!(raw.contains(&BASE64.encode(&png)));
        assert!(raw.contains("Juicy News: Yes"));
    }

    #[test]
    fn test_invalid_mime_is_delivery_error() {
        let payload = DeliveryPayload::new("s", "b").with_attachment(Attachment {
            filename: "x.bin".to_string(),
            mime_type: "not a mime".to_string(),
            bytes: vec![1],
        });
        let err = build_message(
            &mailbox("sender@example.com"),
            &mailbox("reader@example.com"),
            &payload,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Delivery(_)));
    }

    #[test]
    fn test_invalid_address_is_config_error() {
        assert!(matches!(
            parse_mailbox("not an address"),
            Err(PipelineError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_dry_run_always_succeeds() {
        let payload = DeliveryPayload::new("Pulse Zerodha News Summary", "Mixed 📊");
        assert!(DryRunNotifier.deliver(&payload).await.is_ok());
    }
}
