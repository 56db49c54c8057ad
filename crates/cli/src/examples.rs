//! The query-idea catalogue printed by the `examples` builtin.

pub const EXAMPLES: &str = r#"EXAMPLE QUERIES

Contacts (with any fields):
  - Create a contact for John with email john@test.com, job title CEO,
    city New York, state NY, and lead status qualified
  - Update contact john@test.com with phone 555-1234 and company Acme
  - Search for contacts with email containing @acme.com

Deals (with any fields):
  - Create a deal Enterprise Sale for $100000 in qualified stage with
    priority high and deal type new business
  - Update deal 123456 with amount 75000 and stage closedwon
  - Find deals with amount greater than 50000

Companies:
  - Create a company Acme Corp with domain acme.com, industry Technology,
    and city San Francisco
  - Update company 789 with phone 555-0000 and number of employees 100

Tickets:
  - Create a ticket with subject Bug Report, priority high,
    and description Website is broken

Associations:
  - Associate deal 123 with contact 456
  - Link company 789 to contact 456

Discovery:
  - What properties are available for contacts?
  - Show me all fields for deals
  - List company properties
"#;
