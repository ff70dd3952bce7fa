use std::fmt::{Debug, Write as _};

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use tracing::info;

use super::domain::ApplicationId;
use crate::config::{MailConfig, MailTransport};

/// A rendered message ready for a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to_name: String,
    pub to_address: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

pub trait Mailer: Debug + Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mail address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("unable to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

pub(crate) fn parse_address(raw: &str) -> Result<Address, MailError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|source| MailError::Address {
            address: raw.to_string(),
            source,
        })
}

/// Acknowledgement sent to the applicant once their row is recorded.
#[derive(Debug, Clone)]
pub struct ConfirmationEmail<'a> {
    pub institution: &'a str,
    pub applicant_name: &'a str,
    pub application_id: &'a ApplicationId,
    pub course: &'a str,
    pub payment_id: Option<&'a str>,
    pub amount: Option<u32>,
}

impl ConfirmationEmail<'_> {
    pub fn subject(&self) -> String {
        format!(
            "Application received: {} ({})",
            self.institution, self.application_id
        )
    }

    pub fn program_label(&self) -> String {
        self.course.trim().to_ascii_uppercase()
    }

    pub fn text_body(&self) -> String {
        let mut body = String::new();
        writeln!(body, "Dear {},", self.applicant_name).expect("write greeting");
        body.push('\n');
        writeln!(
            body,
            "Thank you for applying to {}. We have received your application and documents.",
            self.institution
        )
        .expect("write intro");
        body.push('\n');
        writeln!(body, "Application ID: {}", self.application_id).expect("write id");
        writeln!(body, "Program: {}", self.program_label()).expect("write program");
        if let Some(amount) = self.amount {
            writeln!(body, "Application fee paid: Rs. {amount}").expect("write amount");
        }
        if let Some(payment_id) = self.payment_id {
            writeln!(body, "Payment reference: {payment_id}").expect("write payment");
        }
        body.push('\n');
        writeln!(body, "What happens next:").expect("write next steps");
        for step in NEXT_STEPS {
            writeln!(body, "- {step}").expect("write step");
        }
        body.push('\n');
        writeln!(
            body,
            "Please quote your application ID in any correspondence.\n\nAdmissions Office\n{}",
            self.institution
        )
        .expect("write signature");
        body
    }

    pub fn html_body(&self) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html><html><body style=\"font-family: Arial, sans-serif; color: #1f2933;\">");
        writeln!(
            html,
            "<div style=\"background:#1a4d3e;color:#ffffff;padding:16px;\"><h2>{}</h2></div>",
            escape_html(self.institution)
        )
        .expect("write header");
        writeln!(html, "<p>Dear {},</p>", escape_html(self.applicant_name)).expect("greeting");
        html.push_str(
            "<p>Thank you for applying. We have received your application and documents.</p>",
        );
        html.push_str("<table style=\"border-collapse:collapse;\">");
        table_row(&mut html, "Application ID", self.application_id.as_str());
        table_row(&mut html, "Program", &self.program_label());
        if let Some(amount) = self.amount {
            table_row(&mut html, "Application fee paid", &format!("Rs. {amount}"));
        }
        if let Some(payment_id) = self.payment_id {
            table_row(&mut html, "Payment reference", payment_id);
        }
        html.push_str("</table>");
        html.push_str("<h3>What happens next</h3><ol>");
        for step in NEXT_STEPS {
            writeln!(html, "<li>{}</li>", escape_html(step)).expect("step item");
        }
        html.push_str("</ol>");
        writeln!(
            html,
            "<p>Please quote your application ID in any correspondence.</p><p>Admissions Office<br/>{}</p>",
            escape_html(self.institution)
        )
        .expect("write signature");
        html.push_str("</body></html>");
        html
    }

    pub fn to_mail(&self, to_address: &str) -> OutgoingMail {
        OutgoingMail {
            to_name: self.applicant_name.to_string(),
            to_address: to_address.to_string(),
            subject: self.subject(),
            html_body: self.html_body(),
            text_body: self.text_body(),
        }
    }
}

const NEXT_STEPS: [&str; 3] = [
    "Our admissions team reviews your documents within 24-48 hours.",
    "A counsellor calls you on the registered mobile number to confirm your seat.",
    "Admission letter and fee schedule follow by email once verification completes.",
];

fn table_row(html: &mut String, label: &str, value: &str) {
    writeln!(
        html,
        "<tr><td style=\"padding:4px 12px 4px 0;\"><strong>{}</strong></td><td>{}</td></tr>",
        escape_html(label),
        escape_html(value)
    )
    .expect("table row");
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// SMTP relay delivery with a plain-text alternative.
pub struct SmtpMailer {
    from: Mailbox,
    cc: Option<Mailbox>,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Option<Self>, MailError> {
        let MailTransport::Smtp {
            relay,
            username,
            password,
        } = &config.transport
        else {
            return Ok(None);
        };

        let from = Mailbox::new(
            Some(config.from_name.clone()),
            parse_address(&config.from_address)?,
        );
        let cc = config
            .admissions_cc
            .as_deref()
            .map(parse_address)
            .transpose()?
            .map(|address| Mailbox::new(None, address));

        let mut builder = SmtpTransport::relay(relay)?;
        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Some(Self {
            from,
            cc,
            transport: builder.build(),
        }))
    }

    pub(crate) fn build_message(&self, mail: &OutgoingMail) -> Result<Message, MailError> {
        let to = Mailbox::new(Some(mail.to_name.clone()), parse_address(&mail.to_address)?);
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone());
        if let Some(cc) = &self.cc {
            builder = builder.cc(cc.clone());
        }
        let message = builder.multipart(MultiPart::alternative_plain_html(
            mail.text_body.clone(),
            mail.html_body.clone(),
        ))?;
        Ok(message)
    }
}

impl Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = self.build_message(mail)?;
        self.transport.send(&message)?;
        info!(recipient = %mail.to_address, subject = %mail.subject, "confirmation email sent");
        Ok(())
    }
}

/// Development mailer: records the message in the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        parse_address(&mail.to_address)?;
        info!(
            recipient = %mail.to_address,
            subject = %mail.subject,
            "mail transport disabled; confirmation email logged only"
        );
        tracing::debug!(body = %mail.text_body, "confirmation email body");
        Ok(())
    }
}
