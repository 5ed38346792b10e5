use serde_json::Value;
use tracing::info;

use crate::config::LlmSettings;
use crate::error::{Result, ScrapeError};

pub const SITE_RESTRICTION: &str = "site:linkedin.com/in/";

const SYSTEM_PROMPT: &str = r#"You generate advanced Google search queries that find LinkedIn profiles. The user describes, in natural language, the people they are looking for; you answer with a single search query that captures every criterion they mention.

Examples of inputs and outputs:

1. Input: "I want to find software developers in the United States who studied at MIT or Stanford."
output: site:linkedin.com/in/ "Software Developer" "United States" ("MIT" OR "Stanford")

2. Input: "I am looking for LinkedIn profiles of people who work in sales and are located in Europe."
output: site:linkedin.com/in/ "sales" ("France" OR "Germany" OR "Spain" OR "Italy" OR "United Kingdom" OR "Netherlands")

3. Input: "Show me product managers with experience in the technology industry in California."
output: site:linkedin.com/in/ "Product Manager" "technology industry" "California"

4. Input: "Find data engineers in Canada with experience in Hadoop and Spark."
output: site:linkedin.com/in/ "Data Engineer" "Canada" ("Hadoop" OR "Spark")

5. Input: "I want profiles of people who worked as data scientists in Europe and studied artificial intelligence."
output: site:linkedin.com/in/ "Data Scientist" ("France" OR "Germany" OR "Spain" OR "Italy" OR "United Kingdom") "Artificial Intelligence"

Always start the query with `site:linkedin.com/in/` to restrict results to LinkedIn profiles, use `OR` to group similar terms, and wrap terms in double quotes for exact matches. Answer with the query only."#;

/// Turns free-text intent into a search-engine query through a chat-completion endpoint.
pub struct QueryGenerator {
    http: reqwest::Client,
    api_key: String,
    settings: LlmSettings,
}

impl QueryGenerator {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| ScrapeError::Config("OPENAI_API_KEY is not set".into()))?;
        let http = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { http, api_key, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn request_body(&self, intent: &str) -> Value {
        serde_json::json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("Generate a LinkedIn search query for: {}", intent)}
            ],
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature
        })
    }

    pub async fn generate(&self, intent: &str) -> Result<String> {
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(ScrapeError::InvalidInput("search request is empty".into()));
        }

        let url = format!("{}/v1/chat/completions", self.settings.base_url.trim_end_matches('/'));
        info!("🧠 Generating search query with {}", self.settings.model);

        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(intent))
            .send()
            .await
            .map_err(|e| ScrapeError::Llm(e.to_string()))?;

        let status = res.status();
        let txt = res.text().await.map_err(|e| ScrapeError::Llm(e.to_string()))?;
        if !status.is_success() {
            return Err(ScrapeError::Llm(format!("HTTP {}: {}", status, txt)));
        }

        let content = parse_completion(&txt)?;
        let query = normalize_query(&content);
        info!("Generated search query: {}", query);
        Ok(query)
    }
}

pub fn parse_completion(body: &str) -> Result<String> {
    let v: Value = serde_json::from_str(body).map_err(|_| ScrapeError::Llm("completion is not valid JSON".into()))?;
    v["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ScrapeError::Llm(format!("completion has no content: {}", body)))
}

/// Reduces a model answer to a single query line carrying the site restriction.
/// Any preamble before the first line mentioning `site:` is dropped.
pub fn normalize_query(raw: &str) -> String {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("```"))
        .collect();
    let start = lines.iter().position(|l| l.contains("site:")).unwrap_or(0);
    let line = lines[start..].join(" ");

    let query = strip_output_label(line.trim().trim_matches('`').trim());
    let query = query.split_whitespace().collect::<Vec<_>>().join(" ");

    if query.contains(SITE_RESTRICTION) {
        query
    } else if query.is_empty() {
        SITE_RESTRICTION.to_string()
    } else {
        format!("{} {}", SITE_RESTRICTION, query)
    }
}

/// Removes a leading `output:` / `output` label, but not a word that merely starts with it.
fn strip_output_label(query: &str) -> &str {
    let Some(head) = query.get(..6) else {
        return query;
    };
    if !head.eq_ignore_ascii_case("output") {
        return query;
    }
    let rest = &query[6..];
    if let Some(after) = rest.strip_prefix(':') {
        after.trim_start()
    } else if rest.starts_with(char::is_whitespace) {
        rest.trim_start()
    } else {
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> QueryGenerator {
        QueryGenerator::new(LlmSettings {
            api_key: Some("sk-test".into()),
            ..LlmSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn requires_api_key() {
        let err = QueryGenerator::new(LlmSettings::default()).err().unwrap();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn request_carries_sampling_and_prompt() {
        let body = generator().request_body("data engineers in Canada");
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][1]["content"],
            "Generate a LinkedIn search query for: data engineers in Canada"
        );
    }

    #[tokio::test]
    async fn empty_intent_rejected_without_network() {
        let err = generator().generate("   ").await.unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidInput(_)));
    }

    #[test]
    fn parses_completion_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  site:linkedin.com/in/ \"Sales\"\n"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "  site:linkedin.com/in/ \"Sales\"\n");

        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
        assert!(parse_completion("<html>").is_err());
    }

    #[test]
    fn normalizes_labels_and_fences() {
        assert_eq!(
            normalize_query("output: site:linkedin.com/in/ \"Product Manager\" \"California\""),
            r#"site:linkedin.com/in/ "Product Manager" "California""#
        );
        assert_eq!(
            normalize_query("```\nsite:linkedin.com/in/ \"Data Engineer\"\n  (\"Hadoop\" OR \"Spark\")\n```"),
            r#"site:linkedin.com/in/ "Data Engineer" ("Hadoop" OR "Spark")"#
        );
        assert_eq!(normalize_query("`site:linkedin.com/in/ \"sales\"`"), r#"site:linkedin.com/in/ "sales""#);
    }

    #[test]
    fn keeps_words_that_start_with_the_label() {
        assert_eq!(
            normalize_query(r#""Outputs Engineer" "Berlin""#),
            r#"site:linkedin.com/in/ "Outputs Engineer" "Berlin""#
        );
        assert_eq!(normalize_query("Output site:linkedin.com/in/ \"nurse\""), r#"site:linkedin.com/in/ "nurse""#);
    }

    #[test]
    fn drops_preamble_before_query_line() {
        assert_eq!(
            normalize_query("Here is the query:\nsite:linkedin.com/in/ \"Recruiter\"\n(\"Madrid\" OR \"Spain\")"),
            r#"site:linkedin.com/in/ "Recruiter" ("Madrid" OR "Spain")"#
        );
    }

    #[test]
    fn adds_missing_site_restriction() {
        assert_eq!(
            normalize_query(r#""Software Developer" "United States""#),
            r#"site:linkedin.com/in/ "Software Developer" "United States""#
        );
    }
}
