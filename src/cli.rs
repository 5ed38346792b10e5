//! Console variant: prompt for a request, run the pipeline, print what was found.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};

use crate::browser::ChromeFetcher;
use crate::config::Settings;
use crate::cookies;
use crate::pipeline::{Pipeline, RunSummary};
use crate::query::QueryGenerator;

pub const EXAMPLE_REQUESTS: &[&str] = &[
    "Find software developers in the United States who studied at MIT or Stanford",
    "Look for sales managers in Europe with technology experience",
    "Show me data scientists in Canada with artificial intelligence experience",
];

pub fn intro() -> String {
    let mut text = String::from(
        "LinkedIn Profile Scraper\n\nDescribe who you are looking for in plain language. \
         It will be turned into an advanced LinkedIn search.\n\nExample requests:\n",
    );
    for example in EXAMPLE_REQUESTS {
        text.push_str(&format!("- '{}'\n", example));
    }
    text
}

fn read_prompt(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<String> {
    write!(output, "\nEnter your search: ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub fn render_summary(summary: &RunSummary) -> String {
    if summary.profiles.is_empty() {
        return "No profiles found.".to_string();
    }
    let mut out = format!("Found {} profiles.\n", summary.profiles.len());
    for profile in &summary.profiles {
        out.push('\n');
        out.push_str(&profile.to_string());
        out.push('\n');
    }
    out
}

fn pipeline_with_required_cookies(settings: &Settings) -> anyhow::Result<Pipeline> {
    let path = settings
        .scrape
        .cookies_file
        .as_deref()
        .context("no cookie file configured (set COOKIES_FILE or pass --cookies)")?;
    if !Path::new(path).exists() {
        bail!(
            "cookie file '{}' does not exist. Export your LinkedIn session cookies to it first.",
            path.display()
        );
    }
    let jar = cookies::load_cookies(path)?;
    let fetcher = ChromeFetcher::with_cookies(settings.scrape.clone(), jar);
    Ok(Pipeline::new(Arc::new(fetcher), settings.scrape.clone()))
}

pub async fn run_search(settings: &Settings, prompt: Option<String>) -> anyhow::Result<()> {
    let prompt = match prompt {
        Some(p) => p.trim().to_string(),
        None => {
            println!("{}", intro());
            read_prompt(&mut io::stdin().lock(), &mut io::stdout())?
        }
    };
    if prompt.is_empty() {
        println!("Please enter a search request.");
        return Ok(());
    }

    let pipeline = pipeline_with_required_cookies(settings)?;
    let generator = QueryGenerator::new(settings.llm.clone())?;

    println!("Generating advanced search query...");
    let query = generator.generate(&prompt).await?;
    println!("Generated search query: {}", query);

    println!("Scraping... this can take a few minutes.");
    let summary = pipeline.run(&query).await;
    println!("{}", render_summary(&summary));
    Ok(())
}

pub async fn run_profile(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let pipeline = pipeline_with_required_cookies(settings)?;
    match pipeline.extract_profile(url).await {
        Ok(profile) => println!("\n{}", profile),
        Err(e) => println!("Could not extract the profile: {}", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;

    #[test]
    fn reads_trimmed_prompt() {
        let mut input = io::Cursor::new("  data engineers in Canada  \n");
        let mut output = Vec::new();
        let prompt = read_prompt(&mut input, &mut output).unwrap();
        assert_eq!(prompt, "data engineers in Canada");
        assert!(String::from_utf8(output).unwrap().contains("Enter your search"));
    }

    #[test]
    fn intro_lists_examples() {
        let text = intro();
        for example in EXAMPLE_REQUESTS {
            assert!(text.contains(example));
        }
    }

    #[test]
    fn summary_rendering() {
        let empty = RunSummary {
            query: "q".into(),
            links_found: 0,
            failed: 0,
            profiles: vec![],
        };
        assert_eq!(render_summary(&empty), "No profiles found.");

        let one = RunSummary {
            profiles: vec![Profile {
                url: "https://www.linkedin.com/in/a".into(),
                name: "A".into(),
                position: "P".into(),
                location: "L".into(),
                experience: vec![],
                education: vec![],
            }],
            ..empty
        };
        let text = render_summary(&one);
        assert!(text.starts_with("Found 1 profiles.\n\nA\nPosition: P"));
        assert!(text.trim_end().ends_with("---"));
    }

    #[test]
    fn missing_cookie_file_refuses_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::from_lookup(|_| None).unwrap();
        settings.scrape.cookies_file = Some(dir.path().join("cookies.json"));
        let err = pipeline_with_required_cookies(&settings).err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }
}
