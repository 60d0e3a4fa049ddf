//! Availability emails via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport. Configuration
//! comes from environment variables; unless `SMTP_ENABLED=true` and at
//! least one recipient is listed, [`EmailConfig::from_env`] returns `None`
//! and no mailer should be constructed.

use chargewatch_core::station::TransitionEvent;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// A recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// RFC 5322 "From" address. Falls back to the SMTP user.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    /// Everyone notified about a free station.
    pub recipients: Vec<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable       | Required | Default          |
    /// |----------------|----------|------------------|
    /// | `SMTP_ENABLED` | yes      | `false`          |
    /// | `SMTP_TO`      | yes      | (comma separated)|
    /// | `SMTP_HOST`    | no       | `smtp.gmail.com` |
    /// | `SMTP_PORT`    | no       | `587`            |
    /// | `SMTP_FROM`    | no       | `SMTP_USER`      |
    /// | `SMTP_USER`    | no       |                  |
    /// | `SMTP_PASS`    | no       |                  |
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let enabled = var("SMTP_ENABLED").is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        if !enabled {
            return None;
        }

        let recipients = parse_recipients(&var("SMTP_TO").unwrap_or_default());
        if recipients.is_empty() {
            tracing::warn!("SMTP_ENABLED is set but SMTP_TO lists no recipients");
            return None;
        }

        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        let smtp_user = non_empty("SMTP_USER");
        let smtp_port = match var("SMTP_PORT") {
            None => DEFAULT_SMTP_PORT,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid SMTP_PORT, using default");
                DEFAULT_SMTP_PORT
            }),
        };

        Some(Self {
            smtp_host: non_empty("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_port,
            from_address: non_empty("SMTP_FROM")
                .or_else(|| smtp_user.clone())
                .unwrap_or_default(),
            smtp_user,
            smtp_password: non_empty("SMTP_PASS"),
            recipients,
        })
    }
}

fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Message content
// ---------------------------------------------------------------------------

fn availability_subject(station_name: &str) -> String {
    format!("EV Station Available: {station_name}")
}

fn availability_body(station_name: &str, timestamp: &str) -> String {
    format!(
        r#"<div style="font-family:sans-serif; padding:20px; background:#0f1117; color:#e8eaed;">
    <h2 style="color:#10b981; margin-top:0;">Station Available!</h2>
    <p><strong>{}</strong> is now available for charging.</p>
    <p style="color:#9aa0a6;">Detected at: {}</p>
</div>
"#,
        escape_html(station_name),
        escape_html(timestamp)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends availability emails via SMTP.
pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EmailConfig {
        &self.config
    }

    /// Tell every recipient that the station in `event` became available.
    pub async fn send_availability(&self, event: &TransitionEvent) -> Result<(), EmailError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let mut builder = Message::builder()
            .from(self.config.from_address.parse()?)
            .subject(availability_subject(&event.station_name))
            .header(ContentType::TEXT_HTML);
        for recipient in &self.config.recipients {
            builder = builder.to(recipient.parse()?);
        }
        let email = builder
            .body(availability_body(&event.station_name, &event.timestamp))
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(
            station_id = %event.station_id,
            recipients = self.config.recipients.len(),
            "Availability email sent"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn disabled_without_smtp_enabled() {
        let config = EmailConfig::from_lookup(lookup(&[("SMTP_TO", "a@example.com")]));
        assert!(config.is_none());
    }

    #[test]
    fn disabled_without_recipients() {
        let config = EmailConfig::from_lookup(lookup(&[("SMTP_ENABLED", "true"), ("SMTP_TO", " , ")]));
        assert!(config.is_none());
    }

    #[test]
    fn enabled_config_applies_defaults() {
        let config = EmailConfig::from_lookup(lookup(&[
            ("SMTP_ENABLED", "TRUE"),
            ("SMTP_TO", "a@example.com, b@example.com"),
            ("SMTP_USER", "monitor@example.com"),
            ("SMTP_PORT", "not-a-port"),
        ]))
        .unwrap();

        assert_eq!(config.smtp_host, "smtp.gmail.com");
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.from_address, "monitor@example.com");
        assert_eq!(config.recipients, vec!["a@example.com", "b@example.com"]);
        assert!(config.smtp_password.is_none());
    }

    #[test]
    fn body_names_station_and_time() {
        let body = availability_body("Maagal <60>", "2025-01-01T10:00:00.000000Z");
        assert!(body.contains("<strong>Maagal &lt;60&gt;</strong>"));
        assert!(body.contains("Detected at: 2025-01-01T10:00:00.000000Z"));
        assert_eq!(availability_subject("A"), "EV Station Available: A");
    }

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }

    #[test]
    fn email_error_display_address() {
        let addr_err: Result<lettre::Address, _> = "not-an-email".parse();
        let err = EmailError::Address(addr_err.unwrap_err());
        assert!(err.to_string().contains("Email address parse error"));
    }
}
