//! Prompt text for the four stages.

use crate::state::SearchResult;
use crate::util::truncate_chars;

/// Characters of each search hit shown to the summarizer.
pub const RESULT_CONTENT_CHARS: usize = 500;

/// Characters of the draft shown to the reviewer.
pub const REVIEW_DRAFT_CHARS: usize = 4000;

pub const PLANNER_SYSTEM_PROMPT: &str = r#"You are a research planner. Given a topic, design a focused research plan.

Respond with a single JSON object and nothing else:
{
  "topic_summary": "one or two sentences on what the research should establish",
  "key_aspects": ["aspect", "..."],
  "search_queries": ["query", "..."],
  "expected_sections": ["section title", "..."]
}

Rules:
- Provide between 5 and 7 search queries.
- Queries must be specific enough to return useful web results.
- Mix general and recent-development queries.
- Order sections the way the final report should read."#;

pub const SUMMARIZER_SYSTEM_PROMPT: &str = r#"You condense web search results into research notes.

Write at most 5 bullet points with the key facts relevant to the research topic.
End every bullet with its citation in the form [source: URL].
Do not invent facts that are not in the results."#;

pub const WRITER_SYSTEM_PROMPT: &str = r#"You are a research analyst writing a structured markdown report.

Requirements:
- Start with a level-one heading containing the topic.
- Include an executive summary, body sections following the plan, and a conclusion.
- Cite sources inline with their reference number, e.g. [3].
- Finish with a "References" section listing the numbered sources.
- Only state what the gathered information supports."#;

pub const REVIEWER_SYSTEM_PROMPT: &str = r#"You are a demanding editor reviewing a research report.

Assess accuracy, coverage of the topic, structure, and use of citations.
Give a short overall verdict first, then concrete suggestions.
Say plainly whether the report is excellent or needs improvement."#;

pub fn planner_prompt(topic: &str, language: &str) -> String {
    format!(
        "Research topic: {topic}\n\nWrite the topic summary, aspects, and section titles in {language}. \
         Search queries may mix {language} and English."
    )
}

pub fn summarizer_prompt(topic: &str, query: &str, results: &[SearchResult], language: &str) -> String {
    let mut listing = String::new();
    for (i, result) in results.iter().enumerate() {
        listing.push_str(&format!(
            "[{}] {}\nURL: {}\n{}\n\n",
            i + 1,
            result.title,
            result.url,
            truncate_chars(&result.content, RESULT_CONTENT_CHARS)
        ));
    }
    format!(
        "Research topic: {topic}\nSearch query: {query}\n\nSearch results:\n\n{listing}Write the notes in {language}."
    )
}

pub struct WriterContext<'a> {
    pub topic: &'a str,
    pub plan_summary: Option<&'a str>,
    pub queries: &'a [String],
    pub gathered_info: &'a [String],
    pub sources: &'a str,
    pub revision_feedback: Option<&'a str>,
    pub language: &'a str,
}

pub fn writer_prompt(ctx: &WriterContext<'_>) -> String {
    let mut prompt = format!("Topic: {}\n\n", ctx.topic);
    if let Some(plan) = ctx.plan_summary {
        prompt.push_str(&format!("Research plan:\n{plan}\n\n"));
    }
    if !ctx.queries.is_empty() {
        prompt.push_str(&format!("Queries researched: {}\n\n", ctx.queries.join("; ")));
    }
    prompt.push_str("Gathered information:\n\n");
    prompt.push_str(&ctx.gathered_info.join("\n\n"));
    prompt.push_str("\n\nSources:\n");
    prompt.push_str(ctx.sources);
    if let Some(feedback) = ctx.revision_feedback {
        prompt.push_str(&format!(
            "\n\nA reviewer rejected the previous draft. Address this feedback:\n{feedback}"
        ));
    }
    prompt.push_str(&format!("\n\nWrite the report in {}.", ctx.language));
    prompt
}

pub fn reviewer_prompt(topic: &str, draft: &str) -> String {
    format!(
        "Topic: {topic}\n\nReport:\n\n{}",
        truncate_chars(draft, REVIEW_DRAFT_CHARS)
    )
}
