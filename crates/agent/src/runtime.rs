//! The request pipeline: understand the query, execute it against the CRM,
//! send the outcome mail, and render a human-readable summary. Four fixed
//! stages in sequence; a failure in any stage becomes an envelope and the
//! remaining stages still run.

use hubcap_core::{Envelope, Operation, PropertyMap};
use hubcap_crm::client::{CrmApi, DEFAULT_SEARCH_LIMIT};
use hubcap_crm::resolve::{
    self, link_contact_to_company, upsert, upsert_deal, NaturalKey, Resolution, UpsertOptions,
};
use hubcap_notify::{template, Notification, Notifier};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extract;
use crate::intent::{
    self, AutonomousIntent, AutonomousOperation, Intent, AUTONOMOUS_SYSTEM_PROMPT,
    INTENT_SYSTEM_PROMPT,
};
use crate::llm::LlmClient;

/// Unified result of one processed query.
#[derive(Clone, Debug, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub correlation_id: String,
    pub operation: String,
    pub object_type: Option<String>,
    pub properties: PropertyMap,
    pub crm: Envelope,
    pub notification: Envelope,
    pub response: String,
}

pub struct Orchestrator<L, C, N> {
    llm: L,
    crm: C,
    notifier: N,
    recipient: String,
}

impl<L, C, N> Orchestrator<L, C, N>
where
    L: LlmClient,
    C: CrmApi,
    N: Notifier,
{
    pub fn new(llm: L, crm: C, notifier: N, recipient: impl Into<String>) -> Self {
        Self { llm, crm, notifier, recipient: recipient.into() }
    }

    pub fn crm(&self) -> &C {
        &self.crm
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Standard pipeline: the model names the operation, object type, and
    /// (when needed) an explicit object id.
    pub async fn process(&self, query: &str) -> QueryReport {
        let correlation_id = Uuid::new_v4().simple().to_string();
        info!(correlation_id = %correlation_id, "processing query");

        let parsed = self.understand(query, &correlation_id).await;
        let crm = self.execute(&parsed).await;
        info!(
            correlation_id = %correlation_id,
            operation = %parsed.operation,
            status = crm.status.as_str(),
            "crm stage finished"
        );

        let notification = self
            .notify(
                parsed.operation.title(),
                &describe_target(parsed.operation, &parsed.object_type),
                display_object_type(&parsed.object_type),
                &parsed.properties,
                &crm,
            )
            .await;
        let response = render_summary(parsed.operation.as_str(), &crm, &notification);

        QueryReport {
            query: query.to_string(),
            correlation_id,
            operation: parsed.operation.as_str().to_string(),
            object_type: if parsed.object_type.is_empty() {
                None
            } else {
                Some(parsed.object_type.clone())
            },
            properties: parsed.properties,
            crm,
            notification,
            response,
        }
    }

    /// Autonomous pipeline: no object ids; objects are resolved by natural
    /// key and upserted.
    pub async fn process_autonomous(&self, query: &str) -> QueryReport {
        let correlation_id = Uuid::new_v4().simple().to_string();
        info!(correlation_id = %correlation_id, "processing query autonomously");

        let parsed = self.understand_autonomous(query, &correlation_id).await;
        let crm = self.execute_autonomous(&parsed).await;
        info!(
            correlation_id = %correlation_id,
            operation = %parsed.operation,
            status = crm.status.as_str(),
            "crm stage finished"
        );

        let notification = self
            .notify(
                parsed.operation.title(),
                parsed.operation.as_str(),
                parsed.operation.object_type(),
                &parsed.properties,
                &crm,
            )
            .await;
        let response = render_summary(parsed.operation.as_str(), &crm, &notification);

        QueryReport {
            query: query.to_string(),
            correlation_id,
            operation: parsed.operation.as_str().to_string(),
            object_type: Some(parsed.operation.object_type().to_string()),
            properties: parsed.properties,
            crm,
            notification,
            response,
        }
    }

    async fn understand(&self, query: &str, correlation_id: &str) -> Intent {
        match self.llm.complete(INTENT_SYSTEM_PROMPT, query).await {
            Ok(content) => intent::parse_intent(&content),
            Err(error) => {
                warn!(correlation_id = %correlation_id, error = %error, "intent resolution failed");
                Intent::default()
            }
        }
    }

    async fn understand_autonomous(&self, query: &str, correlation_id: &str) -> AutonomousIntent {
        let parsed = match self.llm.complete(AUTONOMOUS_SYSTEM_PROMPT, query).await {
            Ok(content) => intent::parse_autonomous_intent(&content),
            Err(error) => {
                warn!(correlation_id = %correlation_id, error = %error, "intent resolution failed");
                None
            }
        };

        let mut resolved = parsed.unwrap_or_else(|| {
            warn!(correlation_id = %correlation_id, "falling back to regex extraction");
            extract::fallback_intent(query)
        });
        if resolved.identifier.trim().is_empty() {
            if let Some(identifier) = extract::first_identifier(query) {
                resolved.identifier = identifier;
            }
        }
        resolved
    }

    async fn execute(&self, parsed: &Intent) -> Envelope {
        match parsed.operation {
            Operation::CreateObject => {
                self.crm.create(&parsed.object_type, parsed.properties.clone()).await
            }
            Operation::UpdateObject => self.execute_update(parsed).await,
            Operation::SearchObject => {
                self.crm
                    .search(&parsed.object_type, &parsed.filters, None, DEFAULT_SEARCH_LIMIT)
                    .await
            }
            Operation::GetObject => match parsed.object_id.as_deref() {
                Some(object_id) => self.crm.get(&parsed.object_type, object_id, None).await,
                None => Envelope::error("object ID required for get"),
            },
            Operation::DeleteObject => match parsed.object_id.as_deref() {
                Some(object_id) => self.crm.delete(&parsed.object_type, object_id).await,
                None => Envelope::error("object ID required for delete"),
            },
            Operation::CreateAssociation => {
                if parsed.association.is_complete() {
                    self.crm.associate(&parsed.association).await
                } else {
                    Envelope::error("both association endpoints must name a type and an id")
                }
            }
            Operation::GetProperties => self.crm.list_properties(&parsed.object_type).await,
            Operation::BatchCreate => {
                if parsed.inputs.is_empty() {
                    Envelope::error("batch create requires at least one input record")
                } else {
                    self.crm.batch_create(&parsed.object_type, parsed.inputs.clone()).await
                }
            }
            Operation::BatchUpdate => {
                if parsed.updates.is_empty() {
                    Envelope::error("batch update requires at least one input record")
                } else {
                    self.crm.batch_update(&parsed.object_type, parsed.updates.clone()).await
                }
            }
            Operation::Unknown => {
                Envelope::error("unknown operation: the request could not be mapped to a CRM action")
            }
        }
    }

    /// Contacts can be updated without an explicit id when the query carries
    /// an email: resolve the id first, then drop the email from the update
    /// bag so only the remaining fields change.
    async fn execute_update(&self, parsed: &Intent) -> Envelope {
        let mut object_id = parsed.object_id.clone();
        let mut properties = parsed.properties.clone();

        if object_id.is_none() && parsed.object_type == "contacts" {
            let email = properties
                .get("email")
                .and_then(Value::as_str)
                .map(str::to_string);
            if let Some(email) = email {
                if let Resolution::Found { object_id: found, .. } =
                    resolve::resolve(&self.crm, &NaturalKey::ContactEmail(email)).await
                {
                    properties.remove("email");
                    object_id = Some(found);
                }
            }
        }

        match object_id {
            Some(object_id) => self.crm.update(&parsed.object_type, &object_id, properties).await,
            None => Envelope::error("object ID required for update"),
        }
    }

    async fn execute_autonomous(&self, parsed: &AutonomousIntent) -> Envelope {
        let identifier = parsed.identifier.trim();
        match parsed.operation {
            AutonomousOperation::UpsertContact => {
                if identifier.is_empty() {
                    return Envelope::error("a contact email is required");
                }
                upsert(
                    &self.crm,
                    &NaturalKey::ContactEmail(identifier.to_string()),
                    parsed.properties.clone(),
                    UpsertOptions::default(),
                )
                .await
            }
            AutonomousOperation::UpsertDeal => {
                if identifier.is_empty() {
                    return Envelope::error("a deal name is required");
                }
                let contact_email =
                    parsed.link_to.as_deref().filter(|link_to| link_to.contains('@'));
                upsert_deal(
                    &self.crm,
                    identifier,
                    parsed.properties.clone(),
                    contact_email,
                    UpsertOptions::default(),
                )
                .await
            }
            AutonomousOperation::UpsertCompany => {
                if identifier.is_empty() {
                    return Envelope::error("a company domain is required");
                }
                upsert(
                    &self.crm,
                    &NaturalKey::CompanyDomain(identifier.to_string()),
                    parsed.properties.clone(),
                    UpsertOptions::default(),
                )
                .await
            }
            AutonomousOperation::LinkObjects => {
                let link_to = parsed.link_to.as_deref().unwrap_or_default();
                let contact_to_company = identifier.contains('@')
                    && link_to.contains('.')
                    && !link_to.contains('@');
                if contact_to_company {
                    link_contact_to_company(&self.crm, identifier, link_to, true).await
                } else {
                    Envelope::error("could not determine object types for linking")
                }
            }
            AutonomousOperation::Unknown => {
                Envelope::error("unknown operation: the request could not be mapped to a CRM action")
            }
        }
    }

    async fn notify(
        &self,
        operation_title: &str,
        operation_description: &str,
        object_type: &str,
        properties: &PropertyMap,
        crm: &Envelope,
    ) -> Envelope {
        let notification = if crm.is_error() {
            Notification::operation_failure(&self.recipient, operation_description, &crm.message)
        } else {
            Notification {
                recipient: self.recipient.clone(),
                subject: format!("{operation_title}: {object_type}"),
                action_type: operation_title.to_string(),
                body_html: template::operation_report(
                    operation_title,
                    object_type,
                    crm.object_id.as_deref(),
                    properties,
                ),
            }
        };
        self.notifier.send(&notification).await
    }
}

fn display_object_type(object_type: &str) -> &str {
    if object_type.is_empty() {
        "object"
    } else {
        object_type
    }
}

fn describe_target(operation: Operation, object_type: &str) -> String {
    format!("{} on {}", operation.as_str(), display_object_type(object_type))
}

/// Stage four: the terminal summary shown to the user.
fn render_summary(operation: &str, crm: &Envelope, notification: &Envelope) -> String {
    if crm.is_error() {
        return format!("Operation failed: {}", crm.message);
    }

    let mut lines = vec![crm.message.clone()];

    match operation {
        "search_object" => {
            if let Some(count) = crm.payload_field("count").and_then(Value::as_u64) {
                lines.push(format!("Found {count} results."));
            }
            if let Some(first) = crm
                .payload_field("results")
                .and_then(Value::as_array)
                .and_then(|results| results.first())
            {
                lines.push("First result:".to_string());
                if let Some(id) = first.get("id").and_then(Value::as_str) {
                    lines.push(format!("  id: {id}"));
                }
                if let Some(properties) = first.get("properties").and_then(Value::as_object) {
                    for (key, value) in properties.iter().take(5) {
                        lines.push(format!("  {key}: {}", value_text(value)));
                    }
                }
            }
        }
        "get_properties" => {
            if let Some(count) = crm.payload_field("count").and_then(Value::as_u64) {
                lines.push(format!("Found {count} available properties."));
            }
            if let Some(names) = crm.payload_field("all_property_names").and_then(Value::as_array) {
                let sample: Vec<&str> =
                    names.iter().take(10).filter_map(Value::as_str).collect();
                if !sample.is_empty() {
                    lines.push(format!("Some examples: {}", sample.join(", ")));
                }
            }
        }
        _ => {
            if let Some(object_id) = crm.object_id.as_deref() {
                lines.push(format!("Object ID: {object_id}"));
            }
        }
    }

    if notification.is_success() {
        lines.push("Notification email sent.".to_string());
    } else {
        lines.push(format!("Note: email notification failed - {}", notification.message));
    }

    lines.join("\n")
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
