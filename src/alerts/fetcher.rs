//! Turns open problems into alert records

use std::collections::HashMap;

use super::record::{AlertRecord, Category, CPOC_SITE, UNKNOWN, UNKNOWN_HOST};
use crate::config::QueryConfig;
use crate::monitor::{MonitorError, Problem, ProblemQuery, ProblemSource, Tag};

/// Tag name -> value, built in one pass. A repeated tag keeps its last value.
#[derive(Debug, Default)]
pub struct TagMap<'a> {
    tags: HashMap<&'a str, &'a str>,
}

impl<'a> TagMap<'a> {
    pub fn from_tags(tags: &'a [Tag]) -> Self {
        Self {
            tags: tags
                .iter()
                .map(|t| (t.tag.as_str(), t.value.as_str()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.tags.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }
}

/// Why a problem did not become a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Host problem other than the relayed alert name
    NotRelayed,
    /// Host problem without a required tag
    MissingTag(&'static str),
    /// Event id is not an integer
    InvalidEventId(String),
}

/// Query for one category
pub fn category_query(category: Category, config: &QueryConfig) -> ProblemQuery {
    let query = ProblemQuery::new(config.severity);
    match category {
        Category::Host => query,
        Category::Site => query.with_group(config.site_group_id),
        Category::OperationalCenter => query.with_group(config.cpoc_group_id),
    }
}

/// Flatten one problem according to the category's tag policy.
///
/// Host problems are filtered by name and need a `hostname` tag. Site and
/// operational-center problems are never dropped for missing tags, the
/// category's placeholder is substituted instead.
pub fn extract(
    category: Category,
    problem: &Problem,
    config: &QueryConfig,
) -> Result<AlertRecord, Rejection> {
    if category == Category::Host && problem.name != config.host_alert_name {
        return Err(Rejection::NotRelayed);
    }

    let id: i64 = problem
        .eventid
        .trim()
        .parse()
        .map_err(|_| Rejection::InvalidEventId(problem.eventid.clone()))?;

    let tags = TagMap::from_tags(&problem.tags);

    let (site, hostname) = match category {
        Category::Host => {
            let hostname = tags
                .get("hostname")
                .ok_or(Rejection::MissingTag("hostname"))?;
            (None, hostname)
        }
        Category::Site => (
            Some(tags.get_or("site", UNKNOWN).to_string()),
            tags.get_or("visname", UNKNOWN),
        ),
        Category::OperationalCenter => (
            Some(CPOC_SITE.to_string()),
            tags.get_or("visname", UNKNOWN_HOST),
        ),
    };

    Ok(AlertRecord {
        id,
        name: problem.name.clone(),
        clock: problem.clock.clone(),
        category,
        site,
        hostname: hostname.to_string(),
    })
}

/// Fetches and flattens the open alerts of a category
pub struct Fetcher<'a, P: ?Sized> {
    source: &'a P,
    config: &'a QueryConfig,
}

impl<'a, P: ProblemSource + ?Sized> Fetcher<'a, P> {
    pub fn new(source: &'a P, config: &'a QueryConfig) -> Self {
        Self { source, config }
    }

    /// One backend call. Records failing the tag policy are dropped and
    /// logged, they never fail the whole fetch.
    pub async fn fetch(&self, category: Category) -> Result<Vec<AlertRecord>, MonitorError> {
        let query = category_query(category, self.config);
        let problems = self.source.problems(&query).await?;
        let total = problems.len();

        let mut records = Vec::with_capacity(total);
        for problem in &problems {
            match extract(category, problem, self.config) {
                Ok(record) => records.push(record),
                Err(Rejection::NotRelayed) => {}
                Err(Rejection::MissingTag(tag)) => {
                    tracing::warn!(
                        category = %category,
                        alert_id = %problem.eventid,
                        tag,
                        "Dropping alert with missing tag"
                    );
                }
                Err(Rejection::InvalidEventId(raw)) => {
                    tracing::warn!(
                        category = %category,
                        eventid = %raw,
                        "Dropping alert with non-numeric event id"
                    );
                }
            }
        }

        tracing::debug!(
            category = %category,
            fetched = total,
            kept = records.len(),
            "Fetched alerts"
        );

        Ok(records)
    }
}
