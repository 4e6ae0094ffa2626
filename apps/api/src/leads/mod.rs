// Leads: search, mission scoring and the live lead collection.
// All LLM calls go through llm_client; all persistence goes through store.

pub mod analysis;
pub mod collection;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod prompts;
pub mod search;
pub mod store;
#[cfg(test)]
pub mod test_support;
