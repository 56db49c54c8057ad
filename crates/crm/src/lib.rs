pub mod client;
pub mod endpoints;
pub mod resolve;

pub use client::{BatchUpdateInput, CrmApi, CrmError, HubSpotClient, DEFAULT_SEARCH_LIMIT};
pub use resolve::{link_contact_to_company, resolve, upsert, upsert_deal};
pub use resolve::{NaturalKey, Resolution, UpsertOptions};
