//! Typed wrapper over the HubSpot object API.
//!
//! Every call maps HTTP status and transport failures into the shared result
//! envelope at the call site; callers never see an `Err`. The vendor error
//! body's `message` field is surfaced when present so envelope messages stay
//! human-readable.

use async_trait::async_trait;
use hubcap_core::{AssociationSpec, Envelope, PropertyMap, SearchFilter};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("HubSpot API error ({status}): {message}")]
    Api { status: StatusCode, message: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Input row for a batch update: object id plus the properties to set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchUpdateInput {
    pub id: String,
    pub properties: PropertyMap,
}

/// The CRM operation surface the orchestrator dispatches against. The HTTP
/// client implements it for production; tests substitute in-memory fakes.
#[async_trait]
pub trait CrmApi: Send + Sync {
    async fn create(&self, object_type: &str, properties: PropertyMap) -> Envelope;
    async fn update(&self, object_type: &str, object_id: &str, properties: PropertyMap)
        -> Envelope;
    async fn search(
        &self,
        object_type: &str,
        filters: &[SearchFilter],
        properties: Option<&[String]>,
        limit: u32,
    ) -> Envelope;
    async fn get(
        &self,
        object_type: &str,
        object_id: &str,
        properties: Option<&[String]>,
    ) -> Envelope;
    async fn delete(&self, object_type: &str, object_id: &str) -> Envelope;
    async fn associate(&self, spec: &AssociationSpec) -> Envelope;
    async fn list_properties(&self, object_type: &str) -> Envelope;
    async fn batch_create(&self, object_type: &str, inputs: Vec<PropertyMap>) -> Envelope;
    async fn batch_update(&self, object_type: &str, updates: Vec<BatchUpdateInput>) -> Envelope;
}

pub struct HubSpotClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl HubSpotClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self { client: Client::new(), base_url: base_url.into(), api_key }
    }

    pub fn from_config(config: &hubcap_core::config::HubSpotConfig) -> Self {
        Self::new(config.base_url.clone(), config.api_key.clone())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.api_key.expose_secret())
    }

    /// Issue a request and decode the JSON body of a 2xx response.
    async fn execute(&self, request: RequestBuilder) -> Result<Value, CrmError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrmError::Api { status, message: parse_api_error(&body) });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let body = response.text().await?;
        debug!(response_bytes = body.len(), "hubspot response received");
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }
}

#[async_trait]
impl CrmApi for HubSpotClient {
    async fn create(&self, object_type: &str, properties: PropertyMap) -> Envelope {
        let url = super::endpoints::object_collection(&self.base_url, object_type);
        let body = json!({ "properties": properties });
        match self.execute(self.client.post(&url).json(&body)).await {
            Ok(record) => {
                let mut envelope =
                    Envelope::success(format!("{} created successfully", capitalize(object_type)))
                        .with_object_type(object_type);
                if let Some(id) = record_id(&record) {
                    envelope = envelope.with_object_id(id);
                }
                envelope.with_payload(record)
            }
            Err(error) => Envelope::error(format!("failed to create {object_type}: {error}"))
                .with_object_type(object_type),
        }
    }

    async fn update(
        &self,
        object_type: &str,
        object_id: &str,
        properties: PropertyMap,
    ) -> Envelope {
        let url = super::endpoints::object(&self.base_url, object_type, object_id);
        let body = json!({ "properties": properties });
        match self.execute(self.client.patch(&url).json(&body)).await {
            Ok(record) => {
                Envelope::success(format!("{} updated successfully", capitalize(object_type)))
                    .with_object_type(object_type)
                    .with_object_id(object_id)
                    .with_payload(record)
            }
            Err(error) => Envelope::error(format!("failed to update {object_type}: {error}"))
                .with_object_type(object_type),
        }
    }

    async fn search(
        &self,
        object_type: &str,
        filters: &[SearchFilter],
        properties: Option<&[String]>,
        limit: u32,
    ) -> Envelope {
        let url = super::endpoints::search(&self.base_url, object_type);
        let body = search_request_body(filters, properties, limit);
        match self.execute(self.client.post(&url).json(&body)).await {
            Ok(response) => {
                let results = response
                    .get("results")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let count = results.len();
                Envelope::success(format!("found {count} {object_type}"))
                    .with_object_type(object_type)
                    .with_payload(json!({
                        "found": count > 0,
                        "count": count,
                        "results": results,
                    }))
            }
            Err(error) => Envelope::error(format!("failed to search {object_type}: {error}"))
                .with_object_type(object_type),
        }
    }

    async fn get(
        &self,
        object_type: &str,
        object_id: &str,
        properties: Option<&[String]>,
    ) -> Envelope {
        let url = super::endpoints::object_with_properties(
            &self.base_url,
            object_type,
            object_id,
            properties,
        );
        match self.execute(self.client.get(&url)).await {
            Ok(record) => Envelope::success(format!("{} retrieved", capitalize(object_type)))
                .with_object_type(object_type)
                .with_object_id(object_id)
                .with_payload(record),
            Err(error) => Envelope::error(format!("failed to get {object_type}: {error}"))
                .with_object_type(object_type),
        }
    }

    async fn delete(&self, object_type: &str, object_id: &str) -> Envelope {
        let url = super::endpoints::object(&self.base_url, object_type, object_id);
        match self.execute(self.client.delete(&url)).await {
            Ok(_) => Envelope::success(format!("{} deleted successfully", capitalize(object_type)))
                .with_object_type(object_type)
                .with_object_id(object_id),
            Err(error) => Envelope::error(format!("failed to delete {object_type}: {error}"))
                .with_object_type(object_type),
        }
    }

    async fn associate(&self, spec: &AssociationSpec) -> Envelope {
        let url = match spec.association_type_id {
            Some(type_id) => super::endpoints::association_typed(
                &self.base_url,
                &spec.from_object_type,
                &spec.from_object_id,
                &spec.to_object_type,
                &spec.to_object_id,
                type_id,
            ),
            None => super::endpoints::association_default(
                &self.base_url,
                &spec.from_object_type,
                &spec.from_object_id,
                &spec.to_object_type,
                &spec.to_object_id,
            ),
        };
        match self.execute(self.client.put(&url)).await {
            Ok(_) => Envelope::success(format!("associated {}", spec.describe())),
            Err(error) => Envelope::error(format!("failed to create association: {error}")),
        }
    }

    async fn list_properties(&self, object_type: &str) -> Envelope {
        let url = super::endpoints::properties(&self.base_url, object_type);
        match self.execute(self.client.get(&url)).await {
            Ok(response) => {
                let results = response
                    .get("results")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let payload = property_catalog(&results);
                let count = results.len();
                Envelope::success(format!("found {count} properties for {object_type}"))
                    .with_object_type(object_type)
                    .with_payload(payload)
            }
            Err(error) => Envelope::error(format!("failed to get properties: {error}"))
                .with_object_type(object_type),
        }
    }

    async fn batch_create(&self, object_type: &str, inputs: Vec<PropertyMap>) -> Envelope {
        let url = super::endpoints::batch_create(&self.base_url, object_type);
        let body = json!({
            "inputs": inputs.into_iter().map(|properties| json!({ "properties": properties })).collect::<Vec<_>>(),
        });
        match self.execute(self.client.post(&url).json(&body)).await {
            Ok(response) => {
                let created = response
                    .get("results")
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .unwrap_or_default();
                Envelope::success(format!("created {created} {object_type}"))
                    .with_object_type(object_type)
                    .with_payload(json!({ "created_count": created, "data": response }))
            }
            Err(error) => Envelope::error(format!("failed batch create: {error}"))
                .with_object_type(object_type),
        }
    }

    async fn batch_update(&self, object_type: &str, updates: Vec<BatchUpdateInput>) -> Envelope {
        let url = super::endpoints::batch_update(&self.base_url, object_type);
        let body = json!({ "inputs": updates });
        match self.execute(self.client.post(&url).json(&body)).await {
            Ok(response) => {
                let updated = response
                    .get("results")
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .unwrap_or_default();
                Envelope::success(format!("updated {updated} {object_type}"))
                    .with_object_type(object_type)
                    .with_payload(json!({ "updated_count": updated, "data": response }))
            }
            Err(error) => Envelope::error(format!("failed batch update: {error}"))
                .with_object_type(object_type),
        }
    }
}

/// Build the search POST body in the vendor's filter-group shape.
pub fn search_request_body(
    filters: &[SearchFilter],
    properties: Option<&[String]>,
    limit: u32,
) -> Value {
    let mut body = json!({
        "filterGroups": [{ "filters": filters }],
        "limit": limit,
    });
    if let Some(properties) = properties.filter(|properties| !properties.is_empty()) {
        body["properties"] = json!(properties);
    }
    body
}

/// Condense the raw property listing into a name-keyed catalog.
fn property_catalog(results: &[Value]) -> Value {
    let mut catalog = serde_json::Map::new();
    let mut names = Vec::with_capacity(results.len());
    for property in results {
        let Some(name) = property.get("name").and_then(Value::as_str) else {
            continue;
        };
        names.push(Value::String(name.to_string()));
        catalog.insert(
            name.to_string(),
            json!({
                "label": property.get("label").cloned().unwrap_or(Value::Null),
                "type": property.get("type").cloned().unwrap_or(Value::Null),
                "fieldType": property.get("fieldType").cloned().unwrap_or(Value::Null),
                "description": property.get("description").cloned().unwrap_or(Value::Null),
            }),
        );
    }
    json!({
        "count": names.len(),
        "properties": catalog,
        "all_property_names": names,
    })
}

fn parse_api_error(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "no error detail provided".to_string()
            } else {
                body.trim().to_string()
            }
        })
}

fn record_id(record: &Value) -> Option<String> {
    record.get("id").and_then(Value::as_str).map(str::to_string)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use hubcap_core::SearchFilter;
    use serde_json::json;

    use super::{capitalize, parse_api_error, property_catalog, record_id, search_request_body};

    #[test]
    fn search_body_wraps_filters_in_one_filter_group() {
        let filters = vec![SearchFilter::eq("email", "john@test.com")];
        let body = search_request_body(&filters, None, 1);

        assert_eq!(body["limit"], 1);
        assert_eq!(body["filterGroups"][0]["filters"][0]["propertyName"], "email");
        assert_eq!(body["filterGroups"][0]["filters"][0]["operator"], "EQ");
        assert!(body.get("properties").is_none());
    }

    #[test]
    fn search_body_includes_requested_properties() {
        let filters = vec![SearchFilter::eq("domain", "acme.com")];
        let properties = vec!["name".to_string(), "domain".to_string()];
        let body = search_request_body(&filters, Some(&properties), 10);
        assert_eq!(body["properties"], json!(["name", "domain"]));
    }

    #[test]
    fn api_error_prefers_vendor_message_field() {
        assert_eq!(
            parse_api_error(r#"{"status":"error","message":"Property values were not valid"}"#),
            "Property values were not valid"
        );
        assert_eq!(parse_api_error("plain text failure"), "plain text failure");
        assert_eq!(parse_api_error("  "), "no error detail provided");
    }

    #[test]
    fn property_catalog_is_name_keyed() {
        let results = vec![
            json!({"name": "email", "label": "Email", "type": "string", "fieldType": "text"}),
            json!({"name": "phone", "label": "Phone", "type": "string", "fieldType": "phonenumber"}),
            json!({"label": "missing name is skipped"}),
        ];
        let catalog = property_catalog(&results);

        assert_eq!(catalog["count"], 2);
        assert_eq!(catalog["properties"]["email"]["label"], "Email");
        assert_eq!(catalog["all_property_names"], json!(["email", "phone"]));
    }

    #[test]
    fn record_id_reads_the_vendor_id_field() {
        assert_eq!(record_id(&json!({"id": "12345"})).as_deref(), Some("12345"));
        assert_eq!(record_id(&json!({"no_id": true})), None);
    }

    #[test]
    fn capitalize_matches_message_spelling() {
        assert_eq!(capitalize("contacts"), "Contacts");
        assert_eq!(capitalize(""), "");
    }
}
