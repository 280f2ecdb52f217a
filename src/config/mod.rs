//! Runtime configuration
//!
//! Everything is read from env-style key/value pairs. The key names are the
//! ones existing deployments already carry in their `.env` files, so they are
//! not prefixed. Tuning knobs added later use the `ALERTRELAY_` prefix.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Site codes with a dedicated room and dashboard when `ALERTRELAY_SITES` is unset
pub const DEFAULT_SITES: &[&str] = &["SJC", "RTP", "LON", "SNG", "SYD", "CPOC"];

pub const DEFAULT_WEBEX_URL: &str = "https://webexapis.com/v1";
pub const DEFAULT_HOST_ALERT_NAME: &str = "VMware: Hypervisor is down";
pub const DEFAULT_SEVERITY: u8 = 5;
pub const DEFAULT_SITE_GROUP_ID: u64 = 557;
pub const DEFAULT_CPOC_GROUP_ID: u64 = 551;

/// Full relay configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub zabbix: ZabbixConfig,
    pub webex: WebexConfig,
    pub database: DatabaseConfig,
    pub routing: RoutingConfig,
    pub query: QueryConfig,
    /// Re-run every interval instead of exiting after one pass
    pub poll_interval: Option<Duration>,
}

/// Monitoring backend connection
#[derive(Clone)]
pub struct ZabbixConfig {
    pub url: String,
    pub token: String,
    pub timeout: Duration,
}

/// Chat backend connection
#[derive(Clone)]
pub struct WebexConfig {
    pub url: String,
    pub token: String,
    pub timeout: Duration,
}

/// Postgres connection parameters
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

/// Destination rooms and dashboard links
#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    /// General room, also the last fallback for every category
    pub general_room: String,
    /// Room for site alerts with incomplete tags
    pub admin_room: Option<String>,
    pub cpoc_room: Option<String>,
    /// Site code -> room id
    pub site_rooms: HashMap<String, String>,
    /// Site code -> dashboard URL
    pub site_dashboards: HashMap<String, String>,
    pub cpoc_dashboard: Option<String>,
    pub admin_dashboard: Option<String>,
}

/// Problem query parameters
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub severity: u8,
    pub site_group_id: u64,
    pub cpoc_group_id: u64,
    /// Only host problems with exactly this name are relayed
    pub host_alert_name: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            severity: DEFAULT_SEVERITY,
            site_group_id: DEFAULT_SITE_GROUP_ID,
            cpoc_group_id: DEFAULT_CPOC_GROUP_ID,
            host_alert_name: DEFAULT_HOST_ALERT_NAME.to_string(),
        }
    }
}

impl Config {
    /// Load from the process environment, after merging a `.env` file if present
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenv::dotenv() {
            if !e.not_found() {
                return Err(ConfigError::DotEnv(e.to_string()));
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let timeout = Duration::from_secs(env.parse_or("ALERTRELAY_HTTP_TIMEOUT_SECS", 30u64)?);

        let zabbix = ZabbixConfig {
            url: env.required("Zabbix_URL")?,
            token: env.required("Zabbix_API_Token")?,
            timeout,
        };

        let webex = WebexConfig {
            url: env
                .optional("Webex_URL")
                .unwrap_or_else(|| DEFAULT_WEBEX_URL.to_string()),
            token: env.required("Webex_Api_Token")?,
            timeout,
        };

        let database = DatabaseConfig {
            host: env.required("Database_Ip")?,
            port: env.parse_or("Database_Port", 5432u16)?,
            name: env.required("Database_Name")?,
            user: env.required("Database_Username")?,
            password: env.optional("Database_Password").unwrap_or_default(),
        };

        let sites: Vec<String> = match env.optional("ALERTRELAY_SITES") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_SITES.iter().map(|s| s.to_string()).collect(),
        };

        let mut site_rooms = HashMap::new();
        let mut site_dashboards = HashMap::new();
        for site in &sites {
            if let Some(room) = env.optional(&format!("{}_Room_Id", site)) {
                site_rooms.insert(site.clone(), room);
            }
            if let Some(url) = env.optional(&format!("ZabbixURL_{}", site)) {
                site_dashboards.insert(site.clone(), url);
            }
        }

        let routing = RoutingConfig {
            general_room: env.required("Webex_Room_Id")?,
            admin_room: env.optional("ADMIN_Room_Id"),
            cpoc_room: env.optional("CPOC_Room_Id"),
            site_rooms,
            site_dashboards,
            cpoc_dashboard: env.optional("ZabbixURL_CPOC"),
            admin_dashboard: env.optional("ZabbixURL_ADMIN"),
        };

        let query = QueryConfig {
            severity: env.parse_or("ALERTRELAY_SEVERITY", DEFAULT_SEVERITY)?,
            site_group_id: env.parse_or("ALERTRELAY_SITE_GROUP_ID", DEFAULT_SITE_GROUP_ID)?,
            cpoc_group_id: env.parse_or("ALERTRELAY_CPOC_GROUP_ID", DEFAULT_CPOC_GROUP_ID)?,
            host_alert_name: env
                .optional("ALERTRELAY_HOST_ALERT_NAME")
                .unwrap_or_else(|| DEFAULT_HOST_ALERT_NAME.to_string()),
        };

        let poll_interval = match env.optional("ALERTRELAY_POLL_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = parse_value("ALERTRELAY_POLL_INTERVAL_SECS", &raw)?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        key: "ALERTRELAY_POLL_INTERVAL_SECS".to_string(),
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            zabbix,
            webex,
            database,
            routing,
            query,
            poll_interval,
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => parse_value(key, &raw),
            None => Ok(default),
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

// Tokens and passwords stay out of logs.
impl fmt::Debug for ZabbixConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZabbixConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Debug for WebexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebexConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Failed to load .env file: {0}")]
    DotEnv(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> HashMap<String, String> {
        [
            ("Zabbix_URL", "https://zabbix.example.com"),
            ("Zabbix_API_Token", "zbx-token"),
            ("Webex_Api_Token", "webex-token"),
            ("Webex_Room_Id", "room-general"),
            ("Database_Name", "alerts"),
            ("Database_Username", "relay"),
            ("Database_Ip", "10.0.0.5"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn load(env: &HashMap<String, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.password, "");
        assert_eq!(config.webex.url, DEFAULT_WEBEX_URL);
        assert_eq!(config.query.severity, 5);
        assert_eq!(config.query.site_group_id, 557);
        assert_eq!(config.query.cpoc_group_id, 551);
        assert_eq!(config.query.host_alert_name, "VMware: Hypervisor is down");
        assert!(config.routing.site_rooms.is_empty());
        assert!(config.routing.admin_room.is_none());
        assert!(config.poll_interval.is_none());
    }

    #[test]
    fn test_missing_required_key() {
        let mut env = base_env();
        env.remove("Webex_Api_Token");

        match load(&env) {
            Err(ConfigError::Missing(key)) => assert_eq!(key, "Webex_Api_Token"),
            other => panic!("expected missing key error, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("Zabbix_API_Token".to_string(), "   ".to_string());

        assert!(matches!(load(&env), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_invalid_port() {
        let mut env = base_env();
        env.insert("Database_Port".to_string(), "postgres".to_string());

        match load(&env) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "Database_Port"),
            other => panic!("expected invalid port, got {:?}", other),
        }
    }

    #[test]
    fn test_site_maps_follow_site_list() {
        let mut env = base_env();
        env.insert("LON_Room_Id".to_string(), "room-lon".to_string());
        env.insert("ZabbixURL_LON".to_string(), "https://dash/lon".to_string());
        env.insert("SYD_Room_Id".to_string(), "room-syd".to_string());
        env.insert("AMS_Room_Id".to_string(), "room-ams".to_string());

        let config = load(&env).unwrap();
        assert_eq!(config.routing.site_rooms.get("LON").map(String::as_str), Some("room-lon"));
        assert_eq!(
            config.routing.site_dashboards.get("LON").map(String::as_str),
            Some("https://dash/lon")
        );
        assert!(config.routing.site_rooms.contains_key("SYD"));
        // AMS is not a known site unless listed
        assert!(!config.routing.site_rooms.contains_key("AMS"));

        env.insert("ALERTRELAY_SITES".to_string(), "ams, lon".to_string());
        let config = load(&env).unwrap();
        assert!(config.routing.site_rooms.contains_key("AMS"));
        assert!(config.routing.site_rooms.contains_key("LON"));
        assert!(!config.routing.site_rooms.contains_key("SYD"));
    }

    #[test]
    fn test_poll_interval() {
        let mut env = base_env();
        env.insert("ALERTRELAY_POLL_INTERVAL_SECS".to_string(), "60".to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.poll_interval, Some(Duration::from_secs(60)));

        env.insert("ALERTRELAY_POLL_INTERVAL_SECS".to_string(), "0".to_string());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut env = base_env();
        env.insert("Database_Password".to_string(), "hunter2".to_string());
        let config = load(&env).unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("zbx-token"));
        assert!(!rendered.contains("webex-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
