//! Mission-alignment scoring of a single job.

use tracing::{info, warn};

use crate::leads::prompts::{pillar_list, ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_SYSTEM};
use crate::leads::models::LeadAnalysis;
use crate::llm_client::prompts::with_json_only;
use crate::llm_client::schema::{ResponseSchema, SchemaType};
use crate::llm_client::{LlmClient, LlmError, StructuredQuery};

pub fn analysis_schema() -> ResponseSchema {
    ResponseSchema::object(&[
        (
            "pillar",
            SchemaType::String,
            "The specific mission pillar this job aligns with best, or 'Other'.",
        ),
        (
            "relevance_score",
            SchemaType::Integer,
            "A score from 1 (low) to 10 (high) for mission relevance.",
        ),
        (
            "justification",
            SchemaType::String,
            "A 2-sentence rationale for the score.",
        ),
    ])
}

pub fn analysis_query(title: &str, company: &str, description: &str) -> StructuredQuery {
    let user_query = ANALYSIS_PROMPT_TEMPLATE
        .replace("{pillars}", &pillar_list())
        .replace("{title}", title)
        .replace("{company}", company)
        .replace("{description}", description);

    StructuredQuery {
        system_instruction: with_json_only(ANALYSIS_SYSTEM),
        user_query,
        schema: analysis_schema(),
        grounded: false,
    }
}

/// Scores one job against the mission pillars.
pub async fn analyze_job(
    llm: &LlmClient,
    title: &str,
    company: &str,
    description: &str,
) -> Result<LeadAnalysis, LlmError> {
    let analysis: LeadAnalysis = llm
        .execute(&analysis_query(title, company, description))
        .await?;

    if !analysis.score_in_range() {
        warn!(
            "Relevance score {} for '{title}' is outside 1-10; keeping the reported value",
            analysis.relevance_score
        );
    }
    info!(
        "Analyzed '{title}' at {company}: pillar={}, score={}",
        analysis.pillar, analysis.relevance_score
    );

    Ok(analysis)
}
