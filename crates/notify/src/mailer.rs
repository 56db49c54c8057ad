use async_trait::async_trait;
use hubcap_core::config::EmailConfig;
use hubcap_core::{Envelope, Operation, PropertyMap};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::template;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address `{address}`: {source}")]
    Address { address: String, source: lettre::address::AddressError },
    #[error("could not build SMTP transport: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
}

/// One outgoing outcome mail, already rendered to HTML.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub action_type: String,
    pub body_html: String,
}

impl Notification {
    pub fn operation_success(
        recipient: impl Into<String>,
        operation: Operation,
        object_type: &str,
        object_id: Option<&str>,
        properties: &PropertyMap,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: format!("{}: {object_type}", operation.title()),
            action_type: operation.title().to_string(),
            body_html: template::operation_report(
                operation.title(),
                object_type,
                object_id,
                properties,
            ),
        }
    }

    pub fn operation_failure(
        recipient: impl Into<String>,
        operation_description: &str,
        error_message: &str,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: format!("CRM Operation Failed: {operation_description}"),
            action_type: "Error Alert".to_string(),
            body_html: template::error_report(operation_description, error_message),
        }
    }

    pub fn contact_created(
        recipient: impl Into<String>,
        contact_name: &str,
        contact_email: &str,
        contact_id: &str,
    ) -> Self {
        let body_html = format!(
            "<p>A new contact has been created in the CRM.</p>\
             <p><strong>Contact Details:</strong></p><ul>\
             <li>Name: {}</li><li>Email: {}</li><li>Contact ID: {}</li></ul>",
            template::escape_html(contact_name),
            template::escape_html(contact_email),
            template::escape_html(contact_id),
        );
        Self {
            recipient: recipient.into(),
            subject: format!("New Contact Created: {contact_name}"),
            action_type: "Contact Creation".to_string(),
            body_html,
        }
    }

    pub fn deal_created(
        recipient: impl Into<String>,
        deal_name: &str,
        deal_amount: &str,
        deal_id: &str,
    ) -> Self {
        let body_html = format!(
            "<p>A new deal has been created in the CRM.</p>\
             <p><strong>Deal Details:</strong></p><ul>\
             <li>Deal Name: {}</li><li>Amount: {}</li><li>Deal ID: {}</li></ul>",
            template::escape_html(deal_name),
            template::escape_html(deal_amount),
            template::escape_html(deal_id),
        );
        Self {
            recipient: recipient.into(),
            subject: format!("New Deal Created: {deal_name}"),
            action_type: "Deal Creation".to_string(),
            body_html,
        }
    }
}

/// Notification delivery seam; the SMTP transport implements it for
/// production, tests substitute a recording fake.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Envelope;
}

/// STARTTLS + LOGIN mail submission, one message per call.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpNotifier {
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(
            config.sender_email.clone(),
            config.sender_password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();
        let sender = parse_mailbox(&config.sender_email)?;
        Ok(Self { transport, sender })
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let recipient = parse_mailbox(&notification.recipient)?;
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(&notification.subject)
            .header(ContentType::TEXT_HTML)
            .body(template::wrap_html(&notification.action_type, &notification.body_html))?;
        Ok(message)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: &Notification) -> Envelope {
        let message = match self.build_message(notification) {
            Ok(message) => message,
            Err(error) => {
                warn!(error = %error, "notification message could not be built");
                return Envelope::error(format!("failed to send email: {error}"));
            }
        };

        match self.transport.send(message).await {
            Ok(_) => {
                debug!(recipient = %notification.recipient, "notification mail accepted");
                Envelope::success(format!(
                    "email notification sent to {}",
                    notification.recipient
                ))
                .with_payload(json!({
                    "recipient": notification.recipient,
                    "subject": notification.subject,
                }))
            }
            Err(error) => {
                warn!(error = %error, "notification mail rejected");
                Envelope::error(format!("failed to send email: {error}"))
            }
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse::<Mailbox>().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use hubcap_core::{Operation, PropertyMap};
    use serde_json::Value;

    use super::Notification;

    #[test]
    fn success_notification_subject_names_operation_and_type() {
        let mut properties = PropertyMap::new();
        properties.insert("email".to_string(), Value::String("john@test.com".to_string()));

        let notification = Notification::operation_success(
            "ops@example.com",
            Operation::CreateObject,
            "contacts",
            Some("12345"),
            &properties,
        );

        assert_eq!(notification.subject, "Create Object: contacts");
        assert_eq!(notification.action_type, "Create Object");
        assert!(notification.body_html.contains("12345"));
        assert!(notification.body_html.contains("john@test.com"));
    }

    #[test]
    fn failure_notification_is_an_error_alert() {
        let notification = Notification::operation_failure(
            "ops@example.com",
            "create_object on contacts",
            "Property values were not valid",
        );

        assert_eq!(notification.subject, "CRM Operation Failed: create_object on contacts");
        assert_eq!(notification.action_type, "Error Alert");
        assert!(notification.body_html.contains("Property values were not valid"));
    }

    #[test]
    fn specialized_constructors_carry_record_details() {
        let contact =
            Notification::contact_created("ops@example.com", "John Doe", "john@test.com", "77");
        assert_eq!(contact.subject, "New Contact Created: John Doe");
        assert!(contact.body_html.contains("Contact ID: 77"));

        let deal = Notification::deal_created("ops@example.com", "Big Sale", "$50,000", "500");
        assert_eq!(deal.subject, "New Deal Created: Big Sale");
        assert!(deal.body_html.contains("Amount: $50,000"));
    }
}
