//! Best-effort extraction of natural keys from raw query text.
//!
//! This is the fallback path for when the language model returns something
//! unparseable: keyword routing picks the operation and these regexes pull
//! out whatever identifiers the query carries.

use std::sync::LazyLock;

use hubcap_core::PropertyMap;
use regex::Regex;
use serde_json::Value;

use crate::intent::{AutonomousIntent, AutonomousOperation};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("invalid regex")
});
static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)*\.(?:com|net|org|io|ai|co|dev))\b")
        .expect("invalid regex")
});
static AMOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*([km])?\b").expect("invalid regex")
});
static AMOUNT_KEYWORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bamount\s+(?:of\s+)?\$?\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*([km])?\b")
        .expect("invalid regex")
});
static DEAL_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:deal\s+(?:called\s+|named\s+)?)([A-Z][A-Za-z0-9']*(?:\s+[A-Z][A-Za-z0-9']*)*)")
        .expect("invalid regex")
});
static PERSON_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\bfor|\bcontact|\bnamed?)\s+([A-Z][a-z]+)\s+([A-Z][a-z]+)\b")
        .expect("invalid regex")
});

pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_PATTERN.find(text).map(|found| found.as_str().to_string())
}

/// Bare company domain, ignoring the host part of any email address.
pub fn extract_domain(text: &str) -> Option<String> {
    let without_emails = EMAIL_PATTERN.replace_all(text, " ");
    DOMAIN_PATTERN
        .captures(&without_emails)
        .map(|captures| captures[1].to_ascii_lowercase())
}

/// Money amount normalized to a plain digit string ("$50k" -> "50000"),
/// since HubSpot property values travel as strings.
pub fn extract_amount(text: &str) -> Option<String> {
    let captures =
        AMOUNT_PATTERN.captures(text).or_else(|| AMOUNT_KEYWORD_PATTERN.captures(text))?;
    let digits = captures[1].replace(',', "");
    let multiplier = match captures.get(2).map(|suffix| suffix.as_str().to_ascii_lowercase()) {
        Some(suffix) if suffix == "k" => 1_000.0,
        Some(suffix) if suffix == "m" => 1_000_000.0,
        _ => 1.0,
    };
    let amount = digits.parse::<f64>().ok()? * multiplier;
    if amount.fract() == 0.0 {
        Some(format!("{}", amount as i64))
    } else {
        Some(format!("{amount}"))
    }
}

/// Capitalized run following "deal", e.g. "Update deal Big Sale with ..."
/// yields "Big Sale".
pub fn extract_deal_name(text: &str) -> Option<String> {
    DEAL_NAME_PATTERN.captures(text).map(|captures| captures[1].trim().to_string())
}

pub fn extract_person_name(text: &str) -> Option<(String, String)> {
    PERSON_NAME_PATTERN
        .captures(text)
        .map(|captures| (captures[1].to_string(), captures[2].to_string()))
}

/// The most specific identifier present in the query, used when the model
/// omits one: email, then deal name, then domain.
pub fn first_identifier(text: &str) -> Option<String> {
    extract_email(text)
        .or_else(|| extract_deal_name(text))
        .or_else(|| extract_domain(text))
}

/// Keyword-routed intent for when model output could not be parsed at all.
pub fn fallback_intent(query: &str) -> AutonomousIntent {
    let lowered = query.to_ascii_lowercase();

    if lowered.contains("contact") {
        let email = extract_email(query);
        let mut properties = PropertyMap::new();
        if let Some(email) = &email {
            properties.insert("email".to_string(), Value::String(email.clone()));
        }
        if let Some((firstname, lastname)) = extract_person_name(query) {
            properties.insert("firstname".to_string(), Value::String(firstname));
            properties.insert("lastname".to_string(), Value::String(lastname));
        }
        return AutonomousIntent {
            operation: AutonomousOperation::UpsertContact,
            identifier: email.unwrap_or_default(),
            properties,
            link_to: None,
        };
    }

    if lowered.contains("deal") {
        let dealname = extract_deal_name(query);
        let mut properties = PropertyMap::new();
        if let Some(dealname) = &dealname {
            properties.insert("dealname".to_string(), Value::String(dealname.clone()));
        }
        if let Some(amount) = extract_amount(query) {
            properties.insert("amount".to_string(), Value::String(amount));
        }
        return AutonomousIntent {
            operation: AutonomousOperation::UpsertDeal,
            identifier: dealname.unwrap_or_default(),
            properties,
            link_to: None,
        };
    }

    if lowered.contains("company") {
        let domain = extract_domain(query);
        let mut properties = PropertyMap::new();
        if let Some(domain) = &domain {
            properties.insert("domain".to_string(), Value::String(domain.clone()));
        }
        return AutonomousIntent {
            operation: AutonomousOperation::UpsertCompany,
            identifier: domain.unwrap_or_default(),
            properties,
            link_to: None,
        };
    }

    AutonomousIntent::default()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{
        extract_amount, extract_deal_name, extract_domain, extract_email, extract_person_name,
        fallback_intent, first_identifier,
    };
    use crate::intent::AutonomousOperation;

    #[test]
    fn extracts_emails_domains_and_amounts() {
        struct Case {
            text: &'static str,
            email: Option<&'static str>,
            domain: Option<&'static str>,
            amount: Option<&'static str>,
        }

        let cases = vec![
            Case {
                text: "Create contact john@test.com for Acme",
                email: Some("john@test.com"),
                domain: None,
                amount: None,
            },
            Case {
                text: "Link contact jane.doe+crm@corp.io to company acme.com",
                email: Some("jane.doe+crm@corp.io"),
                domain: Some("acme.com"),
                amount: None,
            },
            Case {
                text: "Create a deal Big Sale for $50k",
                email: None,
                domain: None,
                amount: Some("50000"),
            },
            Case {
                text: "Update deal with amount 75,000",
                email: None,
                domain: None,
                amount: Some("75000"),
            },
            Case {
                text: "budget is $1.5m this year",
                email: None,
                domain: None,
                amount: Some("1500000"),
            },
            Case { text: "no identifiers here", email: None, domain: None, amount: None },
        ];

        for (index, case) in cases.iter().enumerate() {
            assert_eq!(
                extract_email(case.text).as_deref(),
                case.email,
                "case {index} email: {}",
                case.text
            );
            assert_eq!(
                extract_domain(case.text).as_deref(),
                case.domain,
                "case {index} domain: {}",
                case.text
            );
            assert_eq!(
                extract_amount(case.text).as_deref(),
                case.amount,
                "case {index} amount: {}",
                case.text
            );
        }
    }

    #[test]
    fn deal_names_are_capitalized_runs_after_deal() {
        assert_eq!(extract_deal_name("Update deal Big Sale with amount 75000").as_deref(), Some("Big Sale"));
        assert_eq!(
            extract_deal_name("create a deal called Enterprise Sale for contact x").as_deref(),
            Some("Enterprise Sale")
        );
        assert_eq!(extract_deal_name("update the deal with new stage"), None);
    }

    #[test]
    fn person_names_need_two_capitalized_words() {
        assert_eq!(
            extract_person_name("Create a contact for John Doe with email j@d.com"),
            Some(("John".to_string(), "Doe".to_string()))
        );
        assert_eq!(extract_person_name("Create a contact for john doe"), None);
    }

    #[test]
    fn first_identifier_prefers_email() {
        assert_eq!(
            first_identifier("deal Big Sale for john@test.com at acme.com").as_deref(),
            Some("john@test.com")
        );
        assert_eq!(first_identifier("update deal Big Sale").as_deref(), Some("Big Sale"));
        assert_eq!(first_identifier("company acme.com").as_deref(), Some("acme.com"));
        assert_eq!(first_identifier("nothing to see"), None);
    }

    #[test]
    fn fallback_routes_contact_queries() {
        let intent = fallback_intent("Create or update contact john@test.com named John Doe");
        assert_eq!(intent.operation, AutonomousOperation::UpsertContact);
        assert_eq!(intent.identifier, "john@test.com");
        assert_eq!(
            intent.properties.get("firstname").and_then(Value::as_str),
            Some("John")
        );
    }

    #[test]
    fn fallback_routes_deal_and_company_queries() {
        let deal = fallback_intent("update deal Big Sale with amount $75k");
        assert_eq!(deal.operation, AutonomousOperation::UpsertDeal);
        assert_eq!(deal.identifier, "Big Sale");
        assert_eq!(deal.properties.get("amount").and_then(Value::as_str), Some("75000"));

        let company = fallback_intent("create company acme.com in Technology");
        assert_eq!(company.operation, AutonomousOperation::UpsertCompany);
        assert_eq!(company.identifier, "acme.com");
    }

    #[test]
    fn unroutable_queries_stay_unknown() {
        let intent = fallback_intent("what is the meaning of life");
        assert_eq!(intent.operation, AutonomousOperation::Unknown);
        assert!(intent.identifier.is_empty());
    }
}
