//! Wire types for the problem query

use serde::{Deserialize, Serialize};

/// Parameters of a `problem.get` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemQuery {
    pub output: Vec<String>,
    pub severities: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groupids: Option<Vec<u64>>,
    #[serde(rename = "selectTags")]
    pub select_tags: String,
}

impl ProblemQuery {
    /// Open problems at `severity`, with tags expanded
    pub fn new(severity: u8) -> Self {
        Self {
            output: vec!["name".into(), "eventid".into(), "clock".into()],
            severities: severity,
            groupids: None,
            select_tags: "extend".to_string(),
        }
    }

    /// Restrict to a single host group
    pub fn with_group(mut self, group_id: u64) -> Self {
        self.groupids = Some(vec![group_id]);
        self
    }
}

/// One open problem as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// String-encoded integer
    pub eventid: String,
    pub name: String,
    pub clock: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    #[serde(default)]
    pub value: String,
}

impl Tag {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_serialization() {
        let query = ProblemQuery::new(5);
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "output": ["name", "eventid", "clock"],
                "severities": 5,
                "selectTags": "extend"
            })
        );

        let json = serde_json::to_value(query.with_group(557)).unwrap();
        assert_eq!(json["groupids"], serde_json::json!([557]));
    }

    #[test]
    fn test_problem_without_tags() {
        let problem: Problem = serde_json::from_value(serde_json::json!({
            "eventid": "101",
            "name": "Site down",
            "clock": "1700000000"
        }))
        .unwrap();

        assert_eq!(problem.eventid, "101");
        assert!(problem.tags.is_empty());
    }
}
