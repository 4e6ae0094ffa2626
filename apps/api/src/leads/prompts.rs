// Lead prompt templates and the mission pillars they score against.

pub const MISSION_PILLARS: &[&str] = &[
    "Pillar 1: Climate Resilience",
    "Pillar 2: Sustainable Agriculture",
    "Pillar 3: Regenerative Infrastructure",
    "Pillar 4: Systemic Reform (Including Immigrants, Orphans/Ages, Veterans, and Native American support)",
];

pub const ANALYSIS_SYSTEM: &str = "\
You are an expert analyst for an impact foundation. \
Your task is to analyze job descriptions and determine their relevance and alignment \
with the foundation's mission pillars. \
If no pillar fits, use the pillar 'Other'.";

pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the following job and determine its alignment with one of the mission pillars: {pillars}.

JOB TITLE: {title}
COMPANY: {company}
JOB DESCRIPTION:
---
{description}
---

Return a JSON object with:
- "pillar": the single pillar this job aligns with best, or "Other"
- "relevance_score": an integer from 1 (low) to 10 (high) for mission relevance
- "justification": a 2-sentence rationale for the score"#;

pub const SEARCH_SYSTEM: &str = "\
You are a specialized job search analyst for an impact fund. \
Find the five most recent and highly relevant job listings based on the user's query. \
Prioritize roles related to the mission pillars: {pillars}. \
You MUST use the Google Search tool for grounding your answer. \
Your entire response MUST be a JSON array of objects with the keys \
\"title\", \"company\", \"summary\" and \"url\".";

pub const SEARCH_PROMPT_TEMPLATE: &str = "\
Find five highly relevant job listings for the query: '{query}'. \
Focus on recent postings that align with high social or environmental impact goals. \
Provide the title, company, a 1-2 sentence summary of the job and key requirements, \
and the source URL of the posting.";

pub const SEARCH_RESUME_SECTION: &str = "\n\nPrefer roles that are a strong fit for this RESUME:\n---\n{resume}\n---";

pub fn pillar_list() -> String {
    MISSION_PILLARS.join(", ")
}
