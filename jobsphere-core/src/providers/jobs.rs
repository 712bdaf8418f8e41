//! Wire formats of the job board providers
//!
//! Each board's listing is mapped onto [`JobItem`] here so that the
//! normalizer and the merger only ever see the canonical shape. Postings
//! without a title or link are dropped; a body without the board's result
//! array is a foreign envelope.

use super::adapter::ProviderKind;
use super::error::{ProviderError, ProviderResult};
use crate::config::SecretString;
use crate::http::ProviderRequest;
use crate::protocol::{DatePosted, JobItem, JobQuery, SortOrder};
use serde::Deserialize;
use serde_json::Value;

/// Country searched on Adzuna when the query gives none
pub const DEFAULT_COUNTRY: &str = "gb";

/// Largest page the boards accept
const MAX_PAGE_SIZE: usize = 50;

const MAX_DESCRIPTION_CHARS: usize = 500;

const UNKNOWN_COMPANY: &str = "Unknown";

const JSEARCH_HOST: &str = "jsearch.p.rapidapi.com";

pub(crate) fn build_request(
    kind: ProviderKind,
    credential: Option<&SecretString>,
    query: &JobQuery,
    base: ProviderRequest,
) -> ProviderResult<ProviderRequest> {
    let page_size = query.limit.clamp(1, MAX_PAGE_SIZE).to_string();

    let request = match kind {
        ProviderKind::Adzuna => {
            let (app_id, app_key) = credential
                .and_then(|secret| secret.expose_secret().split_once(':'))
                .ok_or_else(|| ProviderError::InvalidCredential {
                    provider: base.provider_id.clone(),
                    message: "adzuna credential must be 'app_id:app_key'".to_string(),
                })?;
            let country = query
                .country
                .as_deref()
                .unwrap_or(DEFAULT_COUNTRY)
                .to_lowercase();
            let url = format!("{}/{}/search/1", base.url, country);
            let sort = query.sort_by.unwrap_or(SortOrder::Date);
            let mut request = ProviderRequest { url, ..base }
                .query("app_id", app_id)
                .query("app_key", app_key)
                .query("what", query.query.as_str())
                .query("results_per_page", page_size)
                .query("sort_by", sort.as_str())
                .query("content-type", "application/json");
            if let Some(place) = query.place() {
                request = request.query("where", place);
            }
            if let Some(min) = query.salary_min {
                request = request.query("salary_min", min.to_string());
            }
            if let Some(max) = query.salary_max {
                request = request.query("salary_max", max.to_string());
            }
            if let Some(window) = query.date_posted {
                request = request.query("max_days_old", window.max_days_old().to_string());
            }
            request
        }
        ProviderKind::Remotive => {
            let mut request = base
                .query("search", query.query.as_str())
                .query("limit", page_size);
            if let Some(category) = remotive_category(&query.query) {
                request = request.query("category", category);
            }
            request
        }
        ProviderKind::TheMuse => {
            let mut request = base.query("page", "0").query("descending", "true");
            if !query.query.trim().is_empty() {
                request = request.query("category", query.query.trim());
            }
            if let Some(place) = query.place() {
                request = request.query("location", place);
            } else if query.remote_only || query.location.is_some() {
                request = request.query("location", "Flexible / Remote");
            }
            request
        }
        ProviderKind::JSearch => {
            let key = credential.map(SecretString::expose_secret).unwrap_or_default();
            let search = match &query.location {
                Some(location) => format!("{} in {}", query.query, location),
                None => query.query.clone(),
            };
            let mut request = base
                .header("X-RapidAPI-Key", key)
                .header("X-RapidAPI-Host", JSEARCH_HOST)
                .query("query", search)
                .query("page", "1")
                .query("num_pages", "1")
                .query(
                    "date_posted",
                    query.date_posted.unwrap_or(DatePosted::Month).as_str(),
                );
            if let Some(job_type) = &query.job_type {
                request = request.query("employment_types", job_type.as_str());
            }
            if query.remote_only {
                request = request.query("remote_jobs_only", "true");
            }
            if let Some(min) = query.salary_min {
                request = request.query("salary_min", min.to_string());
            }
            if let Some(max) = query.salary_max {
                request = request.query("salary_max", max.to_string());
            }
            // JSearch has no salary ordering
            if let Some(sort @ (SortOrder::Date | SortOrder::Relevance)) = query.sort_by {
                request = request.query("sort_by", sort.as_str());
            }
            request
        }
        ProviderKind::Arbeitnow => base.query("search", query.query.as_str()).query("page", "1"),
        _ => {
            return Err(ProviderError::InvalidPayload {
                provider: base.provider_id.clone(),
                message: format!("{} is not a job board", kind),
            })
        }
    };
    Ok(request)
}

/// Remotive category slug for a free-text query
fn remotive_category(query: &str) -> Option<&'static str> {
    let query = query.to_lowercase();
    let table: &[(&[&str], &str)] = &[
        (&["data", "analyst", "machine learning"], "data"),
        (&["design", "ux", "ui "], "design"),
        (&["marketing", "seo"], "marketing"),
        (&["support", "customer"], "customer-support"),
        (&["sales", "account executive"], "sales"),
        (
            &["developer", "engineer", "software", "programmer", "backend", "frontend"],
            "software-dev",
        ),
    ];
    table
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| query.contains(keyword)))
        .map(|(_, slug)| *slug)
}

#[derive(Debug, Deserialize)]
struct AdzunaResponse {
    results: Vec<AdzunaJob>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AdzunaJob {
    id: Option<Value>,
    title: Option<String>,
    company: Option<DisplayName>,
    location: Option<DisplayName>,
    redirect_url: Option<String>,
    description: Option<String>,
    created: Option<String>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    contract_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DisplayName {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemotiveResponse {
    jobs: Vec<RemotiveJob>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RemotiveJob {
    id: Option<Value>,
    title: Option<String>,
    company_name: Option<String>,
    url: Option<String>,
    candidate_required_location: Option<String>,
    salary: Option<String>,
    job_type: Option<String>,
    publication_date: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MuseResponse {
    results: Vec<MuseJob>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MuseJob {
    id: Option<Value>,
    name: Option<String>,
    company: Option<MuseName>,
    locations: Vec<MuseName>,
    refs: Option<MuseRefs>,
    publication_date: Option<String>,
    contents: Option<String>,
    levels: Vec<MuseName>,
}

#[derive(Debug, Deserialize)]
struct MuseName {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MuseRefs {
    landing_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JSearchJob {
    job_id: Option<String>,
    job_title: Option<String>,
    employer_name: Option<String>,
    job_city: Option<String>,
    job_country: Option<String>,
    job_apply_link: Option<String>,
    job_employment_type: Option<String>,
    job_description: Option<String>,
    job_posted_at_datetime_utc: Option<String>,
    job_is_remote: Option<bool>,
    job_min_salary: Option<f64>,
    job_max_salary: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArbeitnowJob {
    slug: Option<String>,
    title: Option<String>,
    company_name: Option<String>,
    company: Option<Value>,
    location: Option<String>,
    url: Option<String>,
    description: Option<String>,
    remote: Option<bool>,
    tags: Vec<String>,
    job_types: Vec<String>,
    created_at: Option<Value>,
}

/// Canonical job list of a successful response, as JSON
pub(crate) fn extract(
    kind: ProviderKind,
    query: Option<&JobQuery>,
    body: &str,
) -> ProviderResult<Value> {
    let items: Vec<Option<JobItem>> = match kind {
        ProviderKind::Adzuna => serde_json::from_str::<AdzunaResponse>(body)?
            .results
            .into_iter()
            .map(adzuna_item)
            .collect(),
        ProviderKind::Remotive => serde_json::from_str::<RemotiveResponse>(body)?
            .jobs
            .into_iter()
            .map(remotive_item)
            .collect(),
        ProviderKind::TheMuse => serde_json::from_str::<MuseResponse>(body)?
            .results
            .into_iter()
            .map(muse_item)
            .collect(),
        ProviderKind::JSearch => serde_json::from_str::<DataResponse<JSearchJob>>(body)?
            .data
            .into_iter()
            .map(jsearch_item)
            .collect(),
        ProviderKind::Arbeitnow => serde_json::from_str::<DataResponse<ArbeitnowJob>>(body)?
            .data
            .into_iter()
            .map(arbeitnow_item)
            .collect(),
        _ => return Err(ProviderError::envelope(kind, "not a job board")),
    };

    let mut jobs: Vec<JobItem> = items.into_iter().flatten().collect();
    if let Some(query) = query {
        // Only Arbeitnow ignores location and remote filters server-side
        if kind == ProviderKind::Arbeitnow {
            jobs.retain(|job| matches_filters(job, query));
        }
        jobs.truncate(query.limit);
    }
    Ok(serde_json::to_value(jobs)?)
}

fn matches_filters(job: &JobItem, query: &JobQuery) -> bool {
    let location = job.location.as_deref().unwrap_or_default().to_lowercase();
    if let Some(wanted) = &query.location {
        let wanted = wanted.to_lowercase();
        if wanted != "remote" && !location.contains(&wanted) {
            return false;
        }
    }
    if query.remote_only && job.remote != Some(true) && !location.contains("remote") {
        return false;
    }
    true
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn id_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_empty(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn clip_description(text: Option<String>) -> Option<String> {
    let text = non_empty(text)?;
    Some(match text.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    })
}

fn salary_range(min: Option<f64>, max: Option<f64>) -> Option<String> {
    match (min, max) {
        (Some(min), Some(max)) if (min - max).abs() > f64::EPSILON => {
            Some(format!("{:.0} - {:.0}", min, max))
        }
        (Some(value), _) | (None, Some(value)) => Some(format!("{:.0}", value)),
        (None, None) => None,
    }
}

/// Title and link are mandatory; the company falls back to a placeholder
fn base_item(
    title: Option<String>,
    company: Option<String>,
    url: Option<String>,
) -> Option<JobItem> {
    let company = non_empty(company).unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
    Some(JobItem::new(non_empty(title)?, company, non_empty(url)?))
}

fn adzuna_item(job: AdzunaJob) -> Option<JobItem> {
    let mut item = base_item(
        job.title,
        job.company.and_then(|c| c.display_name),
        job.redirect_url,
    )?;
    item.id = id_string(job.id);
    item.location = non_empty(job.location.and_then(|l| l.display_name));
    item.salary = salary_range(job.salary_min, job.salary_max);
    item.description = clip_description(job.description);
    item.job_type = non_empty(job.contract_time);
    item.posted_date = non_empty(job.created);
    Some(item)
}

fn remotive_item(job: RemotiveJob) -> Option<JobItem> {
    let mut item = base_item(job.title, job.company_name, job.url)?;
    item.id = id_string(job.id);
    item.location = non_empty(job.candidate_required_location);
    item.salary = non_empty(job.salary);
    item.description = clip_description(job.description);
    item.job_type = non_empty(job.job_type);
    item.posted_date = non_empty(job.publication_date);
    item.remote = Some(true);
    item.tags = job.tags;
    Some(item)
}

fn muse_item(job: MuseJob) -> Option<JobItem> {
    let mut item = base_item(
        job.name,
        job.company.and_then(|c| c.name),
        job.refs.and_then(|r| r.landing_page),
    )?;
    let locations: Vec<String> = job
        .locations
        .into_iter()
        .filter_map(|l| non_empty(l.name))
        .collect();
    item.id = id_string(job.id);
    item.remote = Some(locations.iter().any(|l| l.to_lowercase().contains("remote")));
    item.location = (!locations.is_empty()).then(|| locations.join(", "));
    item.description = clip_description(job.contents);
    item.posted_date = non_empty(job.publication_date);
    item.tags = job.levels.into_iter().filter_map(|l| non_empty(l.name)).collect();
    Some(item)
}

fn jsearch_item(job: JSearchJob) -> Option<JobItem> {
    let mut item = base_item(job.job_title, job.employer_name, job.job_apply_link)?;
    item.id = non_empty(job.job_id);
    item.location = non_empty(job.job_city).or_else(|| non_empty(job.job_country));
    item.salary = salary_range(job.job_min_salary, job.job_max_salary);
    item.description = clip_description(job.job_description);
    item.job_type = non_empty(job.job_employment_type);
    item.posted_date = non_empty(job.job_posted_at_datetime_utc);
    item.remote = job.job_is_remote;
    Some(item)
}

fn arbeitnow_item(job: ArbeitnowJob) -> Option<JobItem> {
    let company = job.company_name.or_else(|| match job.company {
        Some(Value::String(name)) => Some(name),
        Some(Value::Object(map)) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    });
    let mut item = base_item(job.title, company, job.url)?;
    item.id = non_empty(job.slug);
    item.location = non_empty(job.location);
    item.description = clip_description(job.description);
    item.job_type = job.job_types.into_iter().next();
    item.posted_date = match job.created_at {
        Some(Value::String(date)) => non_empty(Some(date)),
        Some(Value::Number(ts)) => Some(ts.to_string()),
        _ => None,
    };
    item.remote = job.remote;
    item.tags = job.tags;
    Some(item)
}
