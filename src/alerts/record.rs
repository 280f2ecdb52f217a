//! Alert categories and the flattened alert record

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for a tag the backend did not send
pub const UNKNOWN: &str = "UNKNOWN";
/// Hostname placeholder for operational-center alerts
pub const UNKNOWN_HOST: &str = "UNKNOWN_HOST";
/// Site value every operational-center alert carries
pub const CPOC_SITE: &str = "CPOC";

/// Alert category. Decides the query, the storage table and the routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Hypervisor hosts
    Host,
    /// Per-site infrastructure
    Site,
    /// Operational center (CPOC)
    OperationalCenter,
}

impl Category {
    /// Processing order of a run
    pub const ALL: [Category; 3] = [Category::Host, Category::Site, Category::OperationalCenter];

    /// Durable snapshot table for this category
    pub fn table(&self) -> &'static str {
        match self {
            Category::Host => "hostalerts",
            Category::Site => "sitealerts",
            Category::OperationalCenter => "cpocalerts",
        }
    }

    /// Whether rows of this category carry a site column
    pub fn has_site(&self) -> bool {
        !matches!(self, Category::Host)
    }

    /// Short name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Host => "host",
            Category::Site => "site",
            Category::OperationalCenter => "cpoc",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One open alert, as fetched and as stored. Fields are fixed at raise time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Event id assigned by the monitoring backend
    pub id: i64,
    /// Problem name
    pub name: String,
    /// Unix seconds as sent by the backend, kept verbatim
    pub clock: String,
    pub category: Category,
    /// `None` for host alerts, which are not tied to a site
    pub site: Option<String>,
    pub hostname: String,
}

impl AlertRecord {
    /// When the backend raised the problem, if the clock is a valid epoch
    pub fn raised_at(&self) -> Option<DateTime<Utc>> {
        let secs: i64 = self.clock.trim().parse().ok()?;
        DateTime::from_timestamp(secs, 0)
    }

    pub fn site_or_unknown(&self) -> &str {
        self.site.as_deref().unwrap_or(UNKNOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(clock: &str) -> AlertRecord {
        AlertRecord {
            id: 7,
            name: "Link down".to_string(),
            clock: clock.to_string(),
            category: Category::Site,
            site: Some("LON".to_string()),
            hostname: "edge-1".to_string(),
        }
    }

    #[test]
    fn test_category_tables() {
        assert_eq!(Category::Host.table(), "hostalerts");
        assert_eq!(Category::Site.table(), "sitealerts");
        assert_eq!(Category::OperationalCenter.table(), "cpocalerts");
        assert!(!Category::Host.has_site());
        assert!(Category::Site.has_site());
        assert!(Category::OperationalCenter.has_site());
    }

    #[test]
    fn test_category_order() {
        assert_eq!(
            Category::ALL,
            [Category::Host, Category::Site, Category::OperationalCenter]
        );
        assert_eq!(Category::OperationalCenter.to_string(), "cpoc");
    }

    #[test]
    fn test_raised_at() {
        let ts = record("1700000000").raised_at().unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert!(record("yesterday").raised_at().is_none());
    }

    #[test]
    fn test_site_or_unknown() {
        let mut r = record("0");
        assert_eq!(r.site_or_unknown(), "LON");
        r.site = None;
        assert_eq!(r.site_or_unknown(), UNKNOWN);
    }
}
