//! Mapping language-model output onto CRM intents.
//!
//! The model is asked for bare JSON but routinely wraps it in Markdown code
//! fences or stray prose; parsing is lenient about both. Anything that still
//! fails to parse becomes the `unknown` operation rather than an error.

use hubcap_core::{AssociationSpec, Operation, PropertyMap, SearchFilter};
use hubcap_crm::BatchUpdateInput;
use serde::Deserialize;

pub const INTENT_SYSTEM_PROMPT: &str = r#"You are an assistant that translates CRM requests into structured operations against HubSpot.

Extract from the user's request:
1. "operation": one of create_object, update_object, search_object, get_object, delete_object, batch_create, batch_update, create_association, get_properties
2. "object_type": the HubSpot object (contacts, deals, companies, tickets, notes, tasks, ...)
3. "properties": an object with every field the user mentions, using HubSpot property names
4. "object_id": when updating, getting, or deleting a specific record
5. "filters": for search operations, a list of {"propertyName", "operator", "value"}
6. for create_association: "from_object_type", "from_object_id", "to_object_type", "to_object_id"
7. for batch_create: "inputs", a list of property objects; for batch_update: "updates", a list of {"id", "properties"}

Return ONLY a valid JSON object. Be flexible with field names and use whatever the user mentions.

Examples:

Query: "Create a contact for John Doe with email john@example.com, phone 555-1234 and job title CEO"
{"operation": "create_object", "object_type": "contacts", "properties": {"email": "john@example.com", "firstname": "John", "lastname": "Doe", "phone": "555-1234", "jobtitle": "CEO"}}

Query: "Update contact 12345 with phone 555-9999 and lead status qualified"
{"operation": "update_object", "object_type": "contacts", "object_id": "12345", "properties": {"phone": "555-9999", "hs_lead_status": "QUALIFIED"}}

Query: "Create a deal called Enterprise Sale for $100000 in qualified stage"
{"operation": "create_object", "object_type": "deals", "properties": {"dealname": "Enterprise Sale", "amount": "100000", "dealstage": "qualifiedtobuy"}}

Query: "Search for contacts with email containing @acme.com"
{"operation": "search_object", "object_type": "contacts", "filters": [{"propertyName": "email", "operator": "CONTAINS_TOKEN", "value": "@acme.com"}]}

Query: "Find deals with amount greater than 50000"
{"operation": "search_object", "object_type": "deals", "filters": [{"propertyName": "amount", "operator": "GTE", "value": "50000"}]}

Query: "Associate deal 123 with contact 456"
{"operation": "create_association", "from_object_type": "deals", "from_object_id": "123", "to_object_type": "contacts", "to_object_id": "456"}

Query: "What properties are available for contacts?"
{"operation": "get_properties", "object_type": "contacts"}

Common contact fields: email, firstname, lastname, phone, jobtitle, company, city, state, country, website, lifecyclestage, hs_lead_status.
Common deal fields: dealname, amount, dealstage, closedate, priority, deal_type, description.
Common company fields: name, domain, industry, city, state, country, phone, website."#;

pub const AUTONOMOUS_SYSTEM_PROMPT: &str = r#"You are an assistant that understands CRM requests WITHOUT requiring object IDs. The system finds objects automatically by their natural key: contacts by email, deals by name, companies by domain.

Return ONLY a JSON object of this shape:
{"operation": "create_or_update_contact | create_or_update_deal | create_or_update_company | link_objects", "identifier": "the natural key", "properties": {"every field mentioned"}, "link_to": "the other object's identifier, when linking or associating"}

Examples:

Query: "Create or update contact john@test.com with name John Doe and phone 555-1234"
{"operation": "create_or_update_contact", "identifier": "john@test.com", "properties": {"email": "john@test.com", "firstname": "John", "lastname": "Doe", "phone": "555-1234"}}

Query: "Update deal Big Sale with amount 75000"
{"operation": "create_or_update_deal", "identifier": "Big Sale", "properties": {"dealname": "Big Sale", "amount": "75000"}}

Query: "Create deal Enterprise Sale for contact john@test.com amount 100000"
{"operation": "create_or_update_deal", "identifier": "Enterprise Sale", "properties": {"dealname": "Enterprise Sale", "amount": "100000"}, "link_to": "john@test.com"}

Query: "Link contact john@test.com to company acme.com"
{"operation": "link_objects", "identifier": "john@test.com", "link_to": "acme.com"}

No IDs are ever needed; the system resolves objects automatically."#;

/// A parsed standard-mode intent, serde-defaulted so partial model output
/// still yields a usable value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Intent {
    pub operation: Operation,
    pub object_type: String,
    pub properties: PropertyMap,
    pub object_id: Option<String>,
    pub filters: Vec<SearchFilter>,
    pub association: AssociationSpec,
    pub inputs: Vec<PropertyMap>,
    pub updates: Vec<BatchUpdateInput>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AutonomousOperation {
    UpsertContact,
    UpsertDeal,
    UpsertCompany,
    LinkObjects,
    #[default]
    Unknown,
}

impl AutonomousOperation {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "create_or_update_contact" | "upsert_contact" => Self::UpsertContact,
            "create_or_update_deal" | "upsert_deal" => Self::UpsertDeal,
            "create_or_update_company" | "upsert_company" => Self::UpsertCompany,
            "link_objects" | "link" => Self::LinkObjects,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpsertContact => "create_or_update_contact",
            Self::UpsertDeal => "create_or_update_deal",
            Self::UpsertCompany => "create_or_update_company",
            Self::LinkObjects => "link_objects",
            Self::Unknown => "unknown",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::UpsertContact => "Create Or Update Contact",
            Self::UpsertDeal => "Create Or Update Deal",
            Self::UpsertCompany => "Create Or Update Company",
            Self::LinkObjects => "Link Objects",
            Self::Unknown => "Unknown Operation",
        }
    }

    pub fn object_type(&self) -> &'static str {
        match self {
            Self::UpsertContact => "contacts",
            Self::UpsertDeal => "deals",
            Self::UpsertCompany => "companies",
            Self::LinkObjects | Self::Unknown => "object",
        }
    }
}

impl std::fmt::Display for AutonomousOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AutonomousIntent {
    pub operation: AutonomousOperation,
    pub identifier: String,
    pub properties: PropertyMap,
    pub link_to: Option<String>,
}

/// Parse standard-mode model output. Malformed JSON maps to the `unknown`
/// operation; it never fails.
pub fn parse_intent(content: &str) -> Intent {
    let Some(raw) = decode_json::<RawIntent>(content) else {
        return Intent::default();
    };

    Intent {
        operation: Operation::parse(&raw.operation),
        object_type: raw.object_type,
        properties: raw.properties,
        object_id: non_empty(raw.object_id),
        filters: raw.filters,
        association: AssociationSpec {
            from_object_type: raw.from_object_type,
            from_object_id: raw.from_object_id,
            to_object_type: raw.to_object_type,
            to_object_id: raw.to_object_id,
            association_type_id: raw.association_type_id,
        },
        inputs: raw.inputs,
        updates: raw.updates,
    }
}

/// Parse autonomous-mode model output. Returns `None` on malformed JSON so
/// the caller can fall back to regex extraction over the original query.
pub fn parse_autonomous_intent(content: &str) -> Option<AutonomousIntent> {
    let raw = decode_json::<RawAutonomousIntent>(content)?;
    Some(AutonomousIntent {
        operation: AutonomousOperation::parse(&raw.operation),
        identifier: raw.identifier,
        properties: raw.properties,
        link_to: non_empty(raw.link_to),
    })
}

/// Strip Markdown code fences (with or without a `json` tag); as a last
/// resort, slice from the first `{` to the last `}`.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(fence_start) = trimmed.find("```") {
        let mut inner = &trimmed[fence_start + 3..];
        if let Some(rest) = inner.strip_prefix("json") {
            inner = rest;
        }
        if let Some(fence_end) = inner.find("```") {
            inner = &inner[..fence_end];
        }
        return inner.trim();
    }
    trimmed
}

fn decode_json<T: serde::de::DeserializeOwned>(content: &str) -> Option<T> {
    let stripped = strip_code_fences(content);
    if let Ok(value) = serde_json::from_str::<T>(stripped) {
        return Some(value);
    }

    let start = stripped.find('{')?;
    let end = stripped.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<T>(&stripped[start..=end]).ok()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawIntent {
    #[serde(default)]
    operation: String,
    #[serde(default)]
    object_type: String,
    #[serde(default)]
    properties: PropertyMap,
    #[serde(default)]
    object_id: String,
    #[serde(default)]
    filters: Vec<SearchFilter>,
    #[serde(default)]
    from_object_type: String,
    #[serde(default)]
    from_object_id: String,
    #[serde(default)]
    to_object_type: String,
    #[serde(default)]
    to_object_id: String,
    #[serde(default)]
    association_type_id: Option<u32>,
    #[serde(default)]
    inputs: Vec<PropertyMap>,
    #[serde(default)]
    updates: Vec<BatchUpdateInput>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAutonomousIntent {
    #[serde(default)]
    operation: String,
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    properties: PropertyMap,
    #[serde(default)]
    link_to: String,
}

#[cfg(test)]
mod tests {
    use hubcap_core::Operation;
    use serde_json::Value;

    use super::{
        parse_autonomous_intent, parse_intent, strip_code_fences, AutonomousOperation,
    };

    #[test]
    fn parses_bare_json_create_intent() {
        let intent = parse_intent(
            r#"{"operation": "create_object", "object_type": "contacts",
                "properties": {"email": "john@test.com", "firstname": "John"}}"#,
        );

        assert_eq!(intent.operation, Operation::CreateObject);
        assert_eq!(intent.object_type, "contacts");
        assert_eq!(
            intent.properties.get("email").and_then(Value::as_str),
            Some("john@test.com")
        );
        assert!(intent.object_id.is_none());
    }

    #[test]
    fn parses_fenced_json_identically() {
        let bare = parse_intent(r#"{"operation": "get_properties", "object_type": "deals"}"#);
        let fenced = parse_intent(
            "```json\n{\"operation\": \"get_properties\", \"object_type\": \"deals\"}\n```",
        );
        let unlabeled =
            parse_intent("```\n{\"operation\": \"get_properties\", \"object_type\": \"deals\"}\n```");

        assert_eq!(bare, fenced);
        assert_eq!(bare, unlabeled);
    }

    #[test]
    fn json_embedded_in_prose_is_recovered() {
        let intent = parse_intent(
            "Here is the extraction you asked for: {\"operation\": \"delete_object\", \
             \"object_type\": \"tickets\", \"object_id\": \"9\"} Let me know if it helps.",
        );
        assert_eq!(intent.operation, Operation::DeleteObject);
        assert_eq!(intent.object_id.as_deref(), Some("9"));
    }

    #[test]
    fn malformed_output_becomes_unknown_operation() {
        let intent = parse_intent("I could not determine the operation, sorry!");
        assert_eq!(intent.operation, Operation::Unknown);
        assert!(intent.properties.is_empty());

        let truncated = parse_intent(r#"{"operation": "create_object", "propert"#);
        assert_eq!(truncated.operation, Operation::Unknown);
    }

    #[test]
    fn association_endpoints_are_collected() {
        let intent = parse_intent(
            r#"{"operation": "create_association", "from_object_type": "deals",
                "from_object_id": "123", "to_object_type": "contacts", "to_object_id": "456"}"#,
        );
        assert_eq!(intent.operation, Operation::CreateAssociation);
        assert!(intent.association.is_complete());
        assert_eq!(intent.association.describe(), "deals:123 with contacts:456");
    }

    #[test]
    fn fence_stripping_handles_tagged_and_untagged_blocks() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn autonomous_intent_accepts_prompt_spellings() {
        let intent = parse_autonomous_intent(
            r#"{"operation": "create_or_update_deal", "identifier": "Big Sale",
                "properties": {"dealname": "Big Sale", "amount": "75000"},
                "link_to": "john@test.com"}"#,
        )
        .expect("intent should parse");

        assert_eq!(intent.operation, AutonomousOperation::UpsertDeal);
        assert_eq!(intent.identifier, "Big Sale");
        assert_eq!(intent.link_to.as_deref(), Some("john@test.com"));
    }

    #[test]
    fn malformed_autonomous_output_yields_none() {
        assert!(parse_autonomous_intent("no json here").is_none());
        assert!(parse_autonomous_intent("{{{").is_none());
    }
}
