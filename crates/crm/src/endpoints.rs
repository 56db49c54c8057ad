//! HubSpot endpoint table. Object CRUD and search live under `/crm/v3`,
//! default associations under `/crm/v4`; all paths are vendor-defined and
//! consumed as-is.

pub fn object_collection(base_url: &str, object_type: &str) -> String {
    format!("{}/crm/v3/objects/{object_type}", trim_base(base_url))
}

pub fn object(base_url: &str, object_type: &str, object_id: &str) -> String {
    format!("{}/crm/v3/objects/{object_type}/{object_id}", trim_base(base_url))
}

/// Read path with an optional `?properties=a,b` projection.
pub fn object_with_properties(
    base_url: &str,
    object_type: &str,
    object_id: &str,
    properties: Option<&[String]>,
) -> String {
    let mut url = object(base_url, object_type, object_id);
    if let Some(properties) = properties.filter(|properties| !properties.is_empty()) {
        url.push_str("?properties=");
        url.push_str(&properties.join(","));
    }
    url
}

pub fn search(base_url: &str, object_type: &str) -> String {
    format!("{}/crm/v3/objects/{object_type}/search", trim_base(base_url))
}

pub fn properties(base_url: &str, object_type: &str) -> String {
    format!("{}/crm/v3/properties/{object_type}", trim_base(base_url))
}

pub fn batch_create(base_url: &str, object_type: &str) -> String {
    format!("{}/crm/v3/objects/{object_type}/batch/create", trim_base(base_url))
}

pub fn batch_update(base_url: &str, object_type: &str) -> String {
    format!("{}/crm/v3/objects/{object_type}/batch/update", trim_base(base_url))
}

/// v4 route; HubSpot infers the association type.
pub fn association_default(
    base_url: &str,
    from_object_type: &str,
    from_object_id: &str,
    to_object_type: &str,
    to_object_id: &str,
) -> String {
    format!(
        "{}/crm/v4/objects/{from_object_type}/{from_object_id}/associations/default/{to_object_type}/{to_object_id}",
        trim_base(base_url)
    )
}

/// v3 route with an explicit numeric association type.
pub fn association_typed(
    base_url: &str,
    from_object_type: &str,
    from_object_id: &str,
    to_object_type: &str,
    to_object_id: &str,
    association_type_id: u32,
) -> String {
    format!(
        "{}/crm/v3/objects/{from_object_type}/{from_object_id}/associations/{to_object_type}/{to_object_id}/{association_type_id}",
        trim_base(base_url)
    )
}

fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://api.hubapi.com";

    #[test]
    fn object_paths_match_vendor_layout() {
        assert_eq!(
            object_collection(BASE, "contacts"),
            "https://api.hubapi.com/crm/v3/objects/contacts"
        );
        assert_eq!(
            object(BASE, "deals", "123"),
            "https://api.hubapi.com/crm/v3/objects/deals/123"
        );
        assert_eq!(
            search(BASE, "companies"),
            "https://api.hubapi.com/crm/v3/objects/companies/search"
        );
        assert_eq!(properties(BASE, "tickets"), "https://api.hubapi.com/crm/v3/properties/tickets");
    }

    #[test]
    fn trailing_slash_on_base_url_is_tolerated() {
        assert_eq!(
            object_collection("https://api.hubapi.com/", "contacts"),
            "https://api.hubapi.com/crm/v3/objects/contacts"
        );
    }

    #[test]
    fn property_projection_is_comma_joined() {
        let props = vec!["email".to_string(), "firstname".to_string()];
        assert_eq!(
            object_with_properties(BASE, "contacts", "42", Some(&props)),
            "https://api.hubapi.com/crm/v3/objects/contacts/42?properties=email,firstname"
        );
        assert_eq!(
            object_with_properties(BASE, "contacts", "42", Some(&[])),
            "https://api.hubapi.com/crm/v3/objects/contacts/42"
        );
        assert_eq!(
            object_with_properties(BASE, "contacts", "42", None),
            "https://api.hubapi.com/crm/v3/objects/contacts/42"
        );
    }

    #[test]
    fn association_routes_split_by_api_version() {
        assert_eq!(
            association_default(BASE, "deals", "123", "contacts", "456"),
            "https://api.hubapi.com/crm/v4/objects/deals/123/associations/default/contacts/456"
        );
        assert_eq!(
            association_typed(BASE, "deals", "123", "contacts", "456", 3),
            "https://api.hubapi.com/crm/v3/objects/deals/123/associations/contacts/456/3"
        );
    }

    #[test]
    fn batch_paths_match_vendor_layout() {
        assert_eq!(
            batch_create(BASE, "contacts"),
            "https://api.hubapi.com/crm/v3/objects/contacts/batch/create"
        );
        assert_eq!(
            batch_update(BASE, "contacts"),
            "https://api.hubapi.com/crm/v3/objects/contacts/batch/update"
        );
    }
}
