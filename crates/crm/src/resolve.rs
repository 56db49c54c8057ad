//! Natural-key resolution and find-or-create upserts.
//!
//! The autonomous pipeline never requires object ids: a contact is addressed
//! by email, a deal by name, a company by domain. Resolution is a limit-1 EQ
//! search, re-issued on every request; the CRM stays the source of truth and
//! duplicates there are not detected here.

use hubcap_core::{AssociationSpec, Envelope, EnvelopeStatus, PropertyMap, SearchFilter};
use serde_json::Value;
use tracing::debug;

use crate::client::CrmApi;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NaturalKey {
    ContactEmail(String),
    DealName(String),
    CompanyDomain(String),
}

impl NaturalKey {
    pub fn object_type(&self) -> &'static str {
        match self {
            Self::ContactEmail(_) => "contacts",
            Self::DealName(_) => "deals",
            Self::CompanyDomain(_) => "companies",
        }
    }

    /// The property the key is matched against.
    pub fn property(&self) -> &'static str {
        match self {
            Self::ContactEmail(_) => "email",
            Self::DealName(_) => "dealname",
            Self::CompanyDomain(_) => "domain",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::ContactEmail(value) | Self::DealName(value) | Self::CompanyDomain(value) => value,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::ContactEmail(email) => format!("contact with email {email}"),
            Self::DealName(name) => format!("deal '{name}'"),
            Self::CompanyDomain(domain) => format!("company with domain {domain}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Found { object_id: String, record: Value },
    NotFound,
    Failed { message: String },
}

#[derive(Clone, Copy, Debug)]
pub struct UpsertOptions {
    pub create_if_missing: bool,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self { create_if_missing: true }
    }
}

/// Map a natural key onto zero-or-one object id.
pub async fn resolve<C>(api: &C, key: &NaturalKey) -> Resolution
where
    C: CrmApi + ?Sized,
{
    let filters = vec![SearchFilter::eq(key.property(), key.value())];
    let envelope = api.search(key.object_type(), &filters, None, 1).await;
    if envelope.is_error() {
        return Resolution::Failed { message: envelope.message };
    }

    let record = envelope
        .payload_field("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .cloned();
    match record {
        Some(record) => match record.get("id").and_then(Value::as_str) {
            Some(object_id) => {
                debug!(object_type = key.object_type(), object_id, "natural key resolved");
                Resolution::Found { object_id: object_id.to_string(), record }
            }
            None => Resolution::NotFound,
        },
        None => Resolution::NotFound,
    }
}

/// Find-or-create: update when the key resolves, create when it does not and
/// creation is permitted, otherwise a not-found error envelope. No create
/// call is ever issued when creation is disabled.
pub async fn upsert<C>(
    api: &C,
    key: &NaturalKey,
    mut properties: PropertyMap,
    options: UpsertOptions,
) -> Envelope
where
    C: CrmApi + ?Sized,
{
    properties
        .entry(key.property().to_string())
        .or_insert_with(|| Value::String(key.value().to_string()));

    match resolve(api, key).await {
        Resolution::Found { object_id, .. } => {
            // The key property already matches the record; keep the update
            // bag to the remaining fields.
            properties.remove(key.property());
            let envelope = api.update(key.object_type(), &object_id, properties).await;
            mark_resolution(envelope, "updated_existing")
        }
        Resolution::NotFound if options.create_if_missing => {
            let envelope = api.create(key.object_type(), properties).await;
            mark_resolution(envelope, "created_new")
        }
        Resolution::NotFound => Envelope::error(format!("{} not found", key.describe()))
            .with_object_type(key.object_type()),
        Resolution::Failed { message } => {
            Envelope::error(format!("failed to resolve {}: {message}", key.describe()))
                .with_object_type(key.object_type())
        }
    }
}

/// Deal upsert with optional auto-association to a contact by email. A failed
/// association downgrades the envelope to a warning; the upsert itself stands.
pub async fn upsert_deal<C>(
    api: &C,
    dealname: &str,
    properties: PropertyMap,
    contact_email: Option<&str>,
    options: UpsertOptions,
) -> Envelope
where
    C: CrmApi + ?Sized,
{
    let key = NaturalKey::DealName(dealname.to_string());
    let mut envelope = upsert(api, &key, properties, options).await;
    if !envelope.is_success() {
        return envelope;
    }

    let Some(email) = contact_email.filter(|email| !email.trim().is_empty()) else {
        return envelope;
    };
    let Some(deal_id) = envelope.object_id.clone() else {
        return envelope;
    };

    match resolve(api, &NaturalKey::ContactEmail(email.to_string())).await {
        Resolution::Found { object_id: contact_id, .. } => {
            let spec = AssociationSpec {
                from_object_type: "deals".to_string(),
                from_object_id: deal_id,
                to_object_type: "contacts".to_string(),
                to_object_id: contact_id,
                association_type_id: None,
            };
            let association = api.associate(&spec).await;
            if association.is_success() {
                envelope = annotate(envelope, "associated_with_contact", Value::String(email.to_string()));
            } else {
                envelope.status = EnvelopeStatus::Warning;
                envelope.message =
                    format!("{} (association failed: {})", envelope.message, association.message);
            }
        }
        Resolution::NotFound => {
            envelope.status = EnvelopeStatus::Warning;
            envelope.message = format!(
                "{} (contact {email} not found, association skipped)",
                envelope.message
            );
        }
        Resolution::Failed { message } => {
            envelope.status = EnvelopeStatus::Warning;
            envelope.message =
                format!("{} (contact lookup failed: {message})", envelope.message);
        }
    }

    envelope
}

/// Link a contact to a company by email and domain, creating either side when
/// it is missing and creation is permitted.
pub async fn link_contact_to_company<C>(
    api: &C,
    contact_email: &str,
    company_domain: &str,
    create_missing: bool,
) -> Envelope
where
    C: CrmApi + ?Sized,
{
    let contact_id = match find_or_create_side(
        api,
        &NaturalKey::ContactEmail(contact_email.to_string()),
        create_missing,
    )
    .await
    {
        Ok(id) => id,
        Err(envelope) => return envelope,
    };

    let company_id = match find_or_create_side(
        api,
        &NaturalKey::CompanyDomain(company_domain.to_string()),
        create_missing,
    )
    .await
    {
        Ok(id) => id,
        Err(envelope) => return envelope,
    };

    let spec = AssociationSpec {
        from_object_type: "contacts".to_string(),
        from_object_id: contact_id,
        to_object_type: "companies".to_string(),
        to_object_id: company_id,
        association_type_id: None,
    };
    api.associate(&spec).await
}

async fn find_or_create_side<C>(
    api: &C,
    key: &NaturalKey,
    create_missing: bool,
) -> Result<String, Envelope>
where
    C: CrmApi + ?Sized,
{
    match resolve(api, key).await {
        Resolution::Found { object_id, .. } => Ok(object_id),
        Resolution::NotFound if create_missing => {
            let mut properties = PropertyMap::new();
            properties
                .insert(key.property().to_string(), Value::String(key.value().to_string()));
            let created = api.create(key.object_type(), properties).await;
            match created.object_id.clone() {
                Some(object_id) if created.is_success() => Ok(object_id),
                _ => Err(Envelope::error(format!(
                    "could not create {}: {}",
                    key.describe(),
                    created.message
                ))),
            }
        }
        Resolution::NotFound => Err(Envelope::error(format!("{} not found", key.describe()))),
        Resolution::Failed { message } => {
            Err(Envelope::error(format!("failed to resolve {}: {message}", key.describe())))
        }
    }
}

fn mark_resolution(envelope: Envelope, resolution: &str) -> Envelope {
    annotate(envelope, "resolution", Value::String(resolution.to_string()))
}

fn annotate(mut envelope: Envelope, key: &str, value: Value) -> Envelope {
    let mut payload = match envelope.payload.take() {
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_string(), other);
            map
        }
        None => serde_json::Map::new(),
    };
    payload.insert(key.to_string(), value);
    envelope.payload = Some(Value::Object(payload));
    envelope
}
