//! Grounded job search. Results are returned in the order the model listed them.

use tracing::info;

use crate::leads::models::JobPosting;
use crate::leads::prompts::{
    pillar_list, SEARCH_PROMPT_TEMPLATE, SEARCH_RESUME_SECTION, SEARCH_SYSTEM,
};
use crate::llm_client::prompts::with_json_only;
use crate::llm_client::schema::{ResponseSchema, SchemaType};
use crate::llm_client::{LlmClient, LlmError, StructuredQuery};

pub fn search_schema() -> ResponseSchema {
    ResponseSchema::array_of(
        ResponseSchema::object(&[
            ("title", SchemaType::String, "The exact job title."),
            ("company", SchemaType::String, "The name of the hiring company."),
            (
                "summary",
                SchemaType::String,
                "A 1-2 sentence summary of the job and key requirements.",
            ),
            ("url", SchemaType::String, "The direct URL to the job posting."),
        ]),
        "A list of relevant job postings found via web search.",
    )
}

pub fn search_query(query: &str, resume: Option<&str>) -> StructuredQuery {
    let mut user_query = SEARCH_PROMPT_TEMPLATE.replace("{query}", query);
    if let Some(resume) = resume.map(str::trim).filter(|r| !r.is_empty()) {
        user_query.push_str(&SEARCH_RESUME_SECTION.replace("{resume}", resume));
    }

    StructuredQuery {
        system_instruction: with_json_only(&SEARCH_SYSTEM.replace("{pillars}", &pillar_list())),
        user_query,
        schema: search_schema(),
        grounded: true,
    }
}

/// Finds postings for a free-text query. The five-result cap is a prompt
/// instruction only; whatever the model returns is passed through.
pub async fn search_jobs(
    llm: &LlmClient,
    query: &str,
    resume: Option<&str>,
) -> Result<Vec<JobPosting>, LlmError> {
    let jobs: Vec<JobPosting> = llm.execute(&search_query(query, resume)).await?;
    info!("Search '{query}' returned {} postings", jobs.len());
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{envelope, ScriptedTransport};
    use serde_json::json;

    fn five_postings() -> String {
        let jobs: Vec<_> = (1..=5)
            .map(|i| {
                json!({
                    "title": format!("Agronomist {i}"),
                    "company": format!("Farm Co {i}"),
                    "summary": "Regenerative soil work.",
                    "url": format!("https://jobs.example.org/{i}")
                })
            })
            .collect();
        serde_json::to_string(&jobs).unwrap()
    }

    #[test]
    fn test_search_query_is_grounded_array() {
        let query = search_query("latest sustainable agriculture jobs", None);
        assert!(query.grounded);
        assert!(query.user_query.contains("latest sustainable agriculture jobs"));
        assert!(!query.user_query.contains("RESUME"));
        let schema = serde_json::to_value(&query.schema).unwrap();
        assert_eq!(schema["type"], "ARRAY");
        assert_eq!(
            schema["items"]["required"],
            json!(["title", "company", "summary", "url"])
        );
    }

    #[test]
    fn test_search_query_appends_resume() {
        let query = search_query("devops", Some("Configuration Build Engineer, Jenkins"));
        assert!(query.user_query.contains("RESUME"));
        assert!(query.user_query.contains("Jenkins"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_returns_postings_in_array_order() {
        let transport =
            ScriptedTransport::new(vec![ScriptedTransport::ok(&envelope(&five_postings()))]);
        let llm = LlmClient::with_transport(transport);

        let jobs = search_jobs(&llm, "latest sustainable agriculture jobs", None)
            .await
            .unwrap();

        assert_eq!(jobs.len(), 5);
        let titles: Vec<_> = jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Agronomist 1", "Agronomist 2", "Agronomist 3", "Agronomist 4", "Agronomist 5"]
        );
        assert_eq!(jobs[2].url, "https://jobs.example.org/3");
        assert_eq!(jobs[4].company, "Farm Co 5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_rejects_object_reply() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(&envelope(
            r#"{"title":"one","company":"c","summary":"s","url":"u"}"#,
        ))]);
        let llm = LlmClient::with_transport(transport);

        let err = search_jobs(&llm, "q", None).await.unwrap_err();
        assert!(matches!(err, LlmError::MalformedContent(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_does_not_cap_results() {
        let jobs: Vec<_> = (0..7)
            .map(|i| json!({"title": i.to_string(), "company": "c", "summary": "s", "url": "u"}))
            .collect();
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(&envelope(
            &serde_json::to_string(&jobs).unwrap(),
        ))]);
        let llm = LlmClient::with_transport(transport);

        assert_eq!(search_jobs(&llm, "q", None).await.unwrap().len(), 7);
    }
}
