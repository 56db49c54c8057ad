use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Dynamically-typed property bag in the vendor's wire shape.
pub type PropertyMap = serde_json::Map<String, Value>;

/// The closed set of CRM operations the assistant can perform. Object types
/// and property names stay vendor-defined strings; only the verb is closed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateObject,
    UpdateObject,
    SearchObject,
    GetObject,
    DeleteObject,
    BatchCreate,
    BatchUpdate,
    CreateAssociation,
    GetProperties,
    #[default]
    Unknown,
}

impl Operation {
    /// Parse the operation name produced by the language model. Anything
    /// unrecognized maps to `Unknown` rather than failing.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "create_object" => Self::CreateObject,
            "update_object" => Self::UpdateObject,
            "search_object" => Self::SearchObject,
            "get_object" => Self::GetObject,
            "delete_object" => Self::DeleteObject,
            "batch_create" => Self::BatchCreate,
            "batch_update" => Self::BatchUpdate,
            "create_association" => Self::CreateAssociation,
            "get_properties" => Self::GetProperties,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateObject => "create_object",
            Self::UpdateObject => "update_object",
            Self::SearchObject => "search_object",
            Self::GetObject => "get_object",
            Self::DeleteObject => "delete_object",
            Self::BatchCreate => "batch_create",
            Self::BatchUpdate => "batch_update",
            Self::CreateAssociation => "create_association",
            Self::GetProperties => "get_properties",
            Self::Unknown => "unknown",
        }
    }

    /// Human spelling used in notification subjects ("Create Object: contacts").
    pub fn title(&self) -> &'static str {
        match self {
            Self::CreateObject => "Create Object",
            Self::UpdateObject => "Update Object",
            Self::SearchObject => "Search Object",
            Self::GetObject => "Get Object",
            Self::DeleteObject => "Delete Object",
            Self::BatchCreate => "Batch Create",
            Self::BatchUpdate => "Batch Update",
            Self::CreateAssociation => "Create Association",
            Self::GetProperties => "Get Properties",
            Self::Unknown => "Unknown Operation",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One condition in a HubSpot search request, serialized in the vendor's
/// camelCase field spelling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(rename = "propertyName")]
    pub property_name: String,
    pub operator: String,
    pub value: Value,
}

impl SearchFilter {
    pub fn eq(property_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            operator: "EQ".to_string(),
            value: Value::String(value.into()),
        }
    }
}

/// Endpoints of an association between two CRM objects. Without a type id the
/// v4 default-association route is used; with one, the typed v3 route.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssociationSpec {
    #[serde(default)]
    pub from_object_type: String,
    #[serde(default)]
    pub from_object_id: String,
    #[serde(default)]
    pub to_object_type: String,
    #[serde(default)]
    pub to_object_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association_type_id: Option<u32>,
}

impl AssociationSpec {
    pub fn is_complete(&self) -> bool {
        !self.from_object_type.trim().is_empty()
            && !self.from_object_id.trim().is_empty()
            && !self.to_object_type.trim().is_empty()
            && !self.to_object_id.trim().is_empty()
    }

    pub fn describe(&self) -> String {
        format!(
            "{}:{} with {}:{}",
            self.from_object_type, self.from_object_id, self.to_object_type, self.to_object_id
        )
    }
}
