use std::fmt;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::browser::RenderedPage;
use crate::error::{Result, ScrapeError};

pub const MAX_EXPERIENCE: usize = 3;
pub const MAX_EDUCATION: usize = 2;

/// Structured record extracted from one profile page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub url: String,
    pub name: String,
    pub position: String,
    pub location: String,
    /// Most recent first, at most three entries.
    pub experience: Vec<String>,
    /// At most two entries.
    pub education: Vec<String>,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "Position: {}", self.position)?;
        writeln!(f, "Location: {}", self.location)?;
        writeln!(f, "URL: {}", self.url)?;
        writeln!(f, "Experience:")?;
        for exp in &self.experience {
            writeln!(f, "- {}", exp)?;
        }
        writeln!(f, "Education:")?;
        for edu in &self.education {
            writeln!(f, "- {}", edu)?;
        }
        write!(f, "---")
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css}: {e:?}"))
}

/// Top card selectors, public layout first, then the signed-in layout.
static NAME: Lazy<Vec<Selector>> = Lazy::new(|| vec![selector("h1.top-card-layout__title"), selector("h1")]);
static POSITION: Lazy<Vec<Selector>> =
    Lazy::new(|| vec![selector(".top-card-layout__headline"), selector(".text-body-medium")]);
static LOCATION: Lazy<Vec<Selector>> = Lazy::new(|| {
    vec![
        selector(".top-card-layout__first-subline"),
        selector(".text-body-small.inline.t-black--light.break-words"),
    ]
});

static EXPERIENCE_ITEM: Lazy<Selector> = Lazy::new(|| selector("section#experience-section li"));
static EXPERIENCE_TITLE: Lazy<Selector> = Lazy::new(|| selector(".pv-entity__summary-info h3"));
static EXPERIENCE_COMPANY: Lazy<Selector> = Lazy::new(|| selector(".pv-entity__secondary-title"));

static EDUCATION_ITEM: Lazy<Selector> = Lazy::new(|| selector("section#education-section li"));
static EDUCATION_SCHOOL: Lazy<Selector> = Lazy::new(|| selector(".pv-entity__school-name"));
static EDUCATION_DEGREE: Lazy<Selector> = Lazy::new(|| selector(".pv-entity__degree-name"));

const LOGIN_WALL_MARKERS: &[&str] = &["linkedin.com/login", "linkedin.com/authwall", "/checkpoint/"];

pub fn is_login_wall(url: &str) -> bool {
    LOGIN_WALL_MARKERS.iter().any(|m| url.contains(m))
}

/// Visible text with runs of whitespace collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn first_text(scope: ElementRef<'_>, candidates: &[Selector]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|sel| scope.select(sel).next())
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn pair_text(item: ElementRef<'_>, a: &Selector, b: &Selector) -> Option<(String, String)> {
    let first = item.select(a).next().map(element_text)?;
    let second = item.select(b).next().map(element_text)?;
    Some((first, second))
}

pub fn parse_experience(document: &Html) -> Vec<String> {
    document
        .select(&EXPERIENCE_ITEM)
        .take(MAX_EXPERIENCE)
        .filter_map(|item| pair_text(item, &EXPERIENCE_TITLE, &EXPERIENCE_COMPANY))
        .map(|(title, company)| format!("{} at {}", title, company))
        .collect()
}

pub fn parse_education(document: &Html) -> Vec<String> {
    document
        .select(&EDUCATION_ITEM)
        .take(MAX_EDUCATION)
        .filter_map(|item| pair_text(item, &EDUCATION_SCHOOL, &EDUCATION_DEGREE))
        .map(|(school, degree)| format!("{} from {}", degree, school))
        .collect()
}

pub fn parse_profile(page: &RenderedPage) -> Result<Profile> {
    if is_login_wall(&page.final_url) {
        return Err(ScrapeError::LoginWall {
            url: page.requested_url.clone(),
        });
    }

    let document = Html::parse_document(&page.html);
    let root = document.root_element();

    let name = first_text(root, &NAME);
    let position = first_text(root, &POSITION);
    let location = first_text(root, &LOCATION);

    let (name, position, location) = match (name, position, location) {
        (Some(n), Some(p), Some(l)) => (n, p, l),
        (n, p, l) => {
            let missing = [("name", n.is_none()), ("position", p.is_none()), ("location", l.is_none())]
                .into_iter()
                .filter_map(|(field, absent)| absent.then_some(field))
                .collect();
            return Err(ScrapeError::MissingElements {
                url: page.requested_url.clone(),
                missing,
            });
        }
    };

    Ok(Profile {
        url: page.requested_url.clone(),
        name,
        position,
        location,
        experience: parse_experience(&document),
        education: parse_education(&document),
    })
}
