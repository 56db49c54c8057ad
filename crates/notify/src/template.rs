//! HTML bodies for outcome mails. Kept to inline styles so the reports render
//! the same in any mail client.

use hubcap_core::PropertyMap;
use serde_json::Value;

/// Shared outer frame: header with the action type, boxed body, footer.
pub fn wrap_html(action_type: &str, body_html: &str) -> String {
    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; padding: 20px;">
    <h2 style="color: #2c3e50;">{action} Notification</h2>
    <div style="background-color: #f8f9fa; padding: 15px; border-radius: 5px; margin: 20px 0;">
      {body}
    </div>
    <hr style="border: 1px solid #ecf0f1; margin: 20px 0;">
    <p style="color: #7f8c8d; font-size: 12px;">
      This is an automated notification from your CRM assistant.
    </p>
  </body>
</html>"#,
        action = escape_html(action_type),
        body = body_html,
    )
}

/// Body of a success report: operation, object type, optional id, and the
/// property bag as a list.
pub fn operation_report(
    operation_title: &str,
    object_type: &str,
    object_id: Option<&str>,
    properties: &PropertyMap,
) -> String {
    let mut body = String::from("<p>Operation completed successfully.</p>");
    body.push_str(&format!(
        "<p><strong>Operation:</strong> {}<br><strong>Object Type:</strong> {}",
        escape_html(operation_title),
        escape_html(object_type),
    ));
    if let Some(object_id) = object_id {
        body.push_str(&format!("<br><strong>Object ID:</strong> {}", escape_html(object_id)));
    }
    body.push_str("</p>");

    if !properties.is_empty() {
        body.push_str("<p><strong>Properties:</strong></p><ul>");
        for (key, value) in properties {
            body.push_str(&format!(
                "<li>{}: {}</li>",
                escape_html(key),
                escape_html(&value_text(value))
            ));
        }
        body.push_str("</ul>");
    }

    body
}

/// Body of a failure report with the error detail in its own box.
pub fn error_report(operation: &str, error_message: &str) -> String {
    format!(
        r#"<p>An error occurred while performing a CRM operation.</p>
<p><strong>Operation:</strong> {operation}</p>
<p><strong>Error Details:</strong></p>
<div style="background-color: #ffe6e6; padding: 10px; border-radius: 3px;">{error}</div>
<p>Please check your configuration and try again.</p>"#,
        operation = escape_html(operation),
        error = escape_html(error_message),
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for character in raw.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use hubcap_core::PropertyMap;
    use serde_json::Value;

    use super::{error_report, escape_html, operation_report, wrap_html};

    fn properties(pairs: &[(&str, &str)]) -> PropertyMap {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), Value::String((*value).to_string())))
            .collect()
    }

    #[test]
    fn wrapper_carries_action_type_and_footer() {
        let html = wrap_html("Create Object", "<p>done</p>");
        assert!(html.contains("Create Object Notification"));
        assert!(html.contains("<p>done</p>"));
        assert!(html.contains("automated notification"));
    }

    #[test]
    fn operation_report_lists_properties_and_id() {
        let body = operation_report(
            "Create Object",
            "contacts",
            Some("12345"),
            &properties(&[("email", "john@test.com"), ("firstname", "John")]),
        );
        assert!(body.contains("<strong>Object ID:</strong> 12345"));
        assert!(body.contains("<li>email: john@test.com</li>"));
        assert!(body.contains("<li>firstname: John</li>"));
    }

    #[test]
    fn operation_report_without_id_or_properties_stays_minimal() {
        let body = operation_report("Search Object", "deals", None, &PropertyMap::new());
        assert!(!body.contains("Object ID"));
        assert!(!body.contains("<ul>"));
    }

    #[test]
    fn interpolated_values_are_escaped() {
        let body = error_report("create_object on <contacts>", "amount < \"expected\" & odd");
        assert!(body.contains("create_object on &lt;contacts&gt;"));
        assert!(body.contains("amount &lt; &quot;expected&quot; &amp; odd"));

        assert_eq!(escape_html("a<b>'c'"), "a&lt;b&gt;&#x27;c&#x27;");
    }
}
