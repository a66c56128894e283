//! Summary email: pure HTML templating plus an SMTP transport behind the
//! `Mailer` trait.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::EmailConfig;
use crate::notify::DeliveryError;

pub struct SummaryContext {
    pub customer: String,
    pub estimate_no: String,
    pub total: Option<f64>,
}

/// Renders the estimate summary as HTML. Pure; transports are elsewhere.
pub fn render_summary(ctx: &SummaryContext) -> String {
    let total_line = match ctx.total {
        Some(total) => format!("<p>Estimated total: <strong>${:.2}</strong></p>", total),
        None => "<p>Estimated total: pending review</p>".to_string(),
    };

    format!(
        "<html><body>\
         <p>Hello {customer},</p>\
         <p>Your estimate <strong>{estimate_no}</strong> is ready. \
         The document is attached.</p>\
         {total_line}\
         <p>Reply to this message with any questions.</p>\
         </body></html>",
        customer = ctx.customer,
        estimate_no = ctx.estimate_no,
        total_line = total_line,
    )
}

pub trait Mailer: Send + Sync {
    fn deliver(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachments: &[&Path],
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, DeliveryError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| DeliveryError::Config("smtp_host is not set".to_string()))?;

        let mut builder = SmtpTransport::starttls_relay(host)
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(30)));

        if let (Some(user), Some(pass)) = (config.smtp_user.as_deref(), config.smtp_pass.as_deref())
        {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|_| DeliveryError::Address(config.from.clone()))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Mailer for SmtpMailer {
    fn deliver(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachments: &[&Path],
    ) -> Result<(), DeliveryError> {
        let to_mailbox = to
            .parse::<Mailbox>()
            .map_err(|_| DeliveryError::Address(to.to_string()))?;

        let mut multipart = MultiPart::mixed().singlepart(SinglePart::html(html.to_string()));

        for path in attachments {
            let bytes = std::fs::read(path).map_err(|e| {
                DeliveryError::Smtp(format!("cannot read attachment {}: {e}", path.display()))
            })?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("attachment.pdf")
                .to_string();
            let content_type = ContentType::parse("application/pdf")
                .map_err(|e| DeliveryError::Smtp(e.to_string()))?;
            multipart = multipart.singlepart(Attachment::new(filename).body(bytes, content_type));
        }

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .multipart(multipart)
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        self.transport
            .send(&message)
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;
        Ok(())
    }
}

/// Recorded outbound mail, for assertions.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<std::path::PathBuf>,
}

#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<SentMail>>,
    fail_next: std::sync::atomic::AtomicBool,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail_next
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().expect("fake mailer lock").clone()
    }
}

impl Mailer for FakeMailer {
    fn deliver(
        &self,
        to: &str,
        subject: &str,
        html: &str,
        attachments: &[&Path],
    ) -> Result<(), DeliveryError> {
        if self
            .fail_next
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(DeliveryError::Smtp("fake mailer armed to fail".to_string()));
        }
        self.sent.lock().expect("fake mailer lock").push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
            attachments: attachments.iter().map(|p| p.to_path_buf()).collect(),
        });
        Ok(())
    }
}
