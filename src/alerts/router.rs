//! Destination and message text for a raised or cleared alert

use std::collections::HashMap;

use super::record::{AlertRecord, Category, UNKNOWN};
use crate::config::RoutingConfig;
use crate::notify::{ChatMessage, MessageBody};

/// Whether an alert was raised or cleared in this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Raised,
    Cleared,
}

impl Transition {
    /// Lowercase name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Raised => "raised",
            Transition::Cleared => "cleared",
        }
    }
}

/// Static routing table, fixed at startup
#[derive(Debug, Clone)]
pub struct Router {
    general_room: String,
    admin_room: Option<String>,
    cpoc_room: Option<String>,
    site_rooms: HashMap<String, String>,
    site_dashboards: HashMap<String, String>,
    cpoc_dashboard: Option<String>,
    admin_dashboard: Option<String>,
}

impl Router {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            general_room: config.general_room.clone(),
            admin_room: config.admin_room.clone(),
            cpoc_room: config.cpoc_room.clone(),
            site_rooms: config.site_rooms.clone(),
            site_dashboards: config.site_dashboards.clone(),
            cpoc_dashboard: config.cpoc_dashboard.clone(),
            admin_dashboard: config.admin_dashboard.clone(),
        }
    }

    /// Build the message announcing `transition` for `record`
    pub fn notification(&self, record: &AlertRecord, transition: Transition) -> ChatMessage {
        match record.category {
            Category::Host => self.host(record, transition),
            Category::Site => self.site(record, transition),
            Category::OperationalCenter => self.cpoc(record, transition),
        }
    }

    fn host(&self, record: &AlertRecord, transition: Transition) -> ChatMessage {
        let text = match transition {
            Transition::Raised => format!(
                "New triggered alert for host: {} description: {}",
                record.hostname, record.name
            ),
            Transition::Cleared => format!("VMWare host: {} is up **resolved** ", record.hostname),
        };
        ChatMessage::new(self.general_room.clone(), MessageBody::Text(text))
    }

    fn site(&self, record: &AlertRecord, transition: Transition) -> ChatMessage {
        let site = record.site_or_unknown();

        if site == UNKNOWN || record.hostname == UNKNOWN {
            let room = self.admin_room.as_ref().unwrap_or(&self.general_room);
            let text = match transition {
                Transition::Raised => format!(
                    "Site alert with missing info (sent to Admin). Site: {}, Host: {}. Alert: {}",
                    site, record.hostname, record.name
                ),
                Transition::Cleared => format!(
                    "Site alert RESOLVED or Data fixed (check site room) Site: {}, Host: {}, Alert: {}",
                    site, record.hostname, record.name
                ),
            };
            let text = with_dashboard(
                text,
                "Missing info",
                self.admin_dashboard.as_deref(),
                transition,
            );
            return ChatMessage::new(room.clone(), body(text, transition));
        }

        let room = self.site_rooms.get(site).unwrap_or(&self.general_room);
        let text = match transition {
            Transition::Raised => format!(
                "New site alert in {}: {} (Host: {})",
                site, record.name, record.hostname
            ),
            Transition::Cleared => format!(
                "Site alert **resolved** in {}: {} (Host: {})",
                site, record.name, record.hostname
            ),
        };
        let text = with_dashboard(
            text,
            "SITE",
            self.site_dashboards.get(site).map(String::as_str),
            transition,
        );
        ChatMessage::new(room.clone(), body(text, transition))
    }

    fn cpoc(&self, record: &AlertRecord, transition: Transition) -> ChatMessage {
        let site = record.site_or_unknown();
        let room = self.cpoc_room.as_ref().unwrap_or(&self.general_room);
        let text = match transition {
            Transition::Raised => format!(
                "New CPOC alert in {}: {} (Host: {})",
                site, record.name, record.hostname
            ),
            Transition::Cleared => format!(
                "CPOC alert **resolved** in {}: {} (Host: {})",
                site, record.name, record.hostname
            ),
        };
        let text = with_dashboard(text, "CPOC", self.cpoc_dashboard.as_deref(), transition);
        ChatMessage::new(room.clone(), body(text, transition))
    }
}

// Raise messages go out as plain text, resolutions as markdown.
fn body(text: String, transition: Transition) -> MessageBody {
    match transition {
        Transition::Raised => MessageBody::Text(text),
        Transition::Cleared => MessageBody::Markdown(text),
    }
}

fn with_dashboard(
    mut text: String,
    label: &str,
    url: Option<&str>,
    transition: Transition,
) -> String {
    if let Some(url) = url {
        let sep = match transition {
            Transition::Raised => "",
            Transition::Cleared => " ",
        };
        text.push_str(&format!("\n{} Dashboard:{}({})\n\n", label, sep, url));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::record::{CPOC_SITE, UNKNOWN_HOST};

    fn routing() -> RoutingConfig {
        let mut config = RoutingConfig {
            general_room: "room-general".to_string(),
            admin_room: Some("room-admin".to_string()),
            cpoc_room: Some("room-cpoc".to_string()),
            cpoc_dashboard: Some("https://dash/cpoc".to_string()),
            admin_dashboard: Some("https://dash/admin".to_string()),
            ..Default::default()
        };
        config
            .site_rooms
            .insert("LON".to_string(), "room-lon".to_string());
        config
            .site_rooms
            .insert("SYD".to_string(), "room-syd".to_string());
        config
            .site_dashboards
            .insert("LON".to_string(), "https://dash/lon".to_string());
        config
    }

    fn record(category: Category, site: Option<&str>, hostname: &str) -> AlertRecord {
        AlertRecord {
            id: 1,
            name: "Uplink down".to_string(),
            clock: "1700000000".to_string(),
            category,
            site: site.map(String::from),
            hostname: hostname.to_string(),
        }
    }

    #[test]
    fn test_host_messages() {
        let router = Router::new(&routing());
        let mut r = record(Category::Host, None, "esx-01");
        r.name = "VMware: Hypervisor is down".to_string();

        let raised = router.notification(&r, Transition::Raised);
        assert_eq!(raised.room_id, "room-general");
        assert_eq!(
            raised.body,
            MessageBody::Text(
                "New triggered alert for host: esx-01 description: VMware: Hypervisor is down"
                    .to_string()
            )
        );

        let cleared = router.notification(&r, Transition::Cleared);
        assert_eq!(cleared.room_id, "room-general");
        assert_eq!(
            cleared.body,
            MessageBody::Text("VMWare host: esx-01 is up **resolved** ".to_string())
        );
    }

    #[test]
    fn test_known_site_with_dashboard() {
        let router = Router::new(&routing());
        let r = record(Category::Site, Some("LON"), "hostA");

        let raised = router.notification(&r, Transition::Raised);
        assert_eq!(raised.room_id, "room-lon");
        assert_eq!(
            raised.body,
            MessageBody::Text(
                "New site alert in LON: Uplink down (Host: hostA)\nSITE Dashboard:(https://dash/lon)\n\n"
                    .to_string()
            )
        );

        let cleared = router.notification(&r, Transition::Cleared);
        assert_eq!(cleared.room_id, "room-lon");
        assert_eq!(
            cleared.body,
            MessageBody::Markdown(
                "Site alert **resolved** in LON: Uplink down (Host: hostA)\nSITE Dashboard: (https://dash/lon)\n\n"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_known_site_without_dashboard() {
        let router = Router::new(&routing());
        let r = record(Category::Site, Some("SYD"), "hostB");

        let raised = router.notification(&r, Transition::Raised);
        assert_eq!(raised.room_id, "room-syd");
        assert_eq!(raised.body.as_str(), "New site alert in SYD: Uplink down (Host: hostB)");
    }

    #[test]
    fn test_unmapped_site_falls_back_to_general() {
        let router = Router::new(&routing());
        let r = record(Category::Site, Some("AMS"), "hostC");

        let raised = router.notification(&r, Transition::Raised);
        assert_eq!(raised.room_id, "room-general");
        assert_eq!(raised.body.as_str(), "New site alert in AMS: Uplink down (Host: hostC)");
    }

    #[test]
    fn test_missing_site_goes_to_admin() {
        let router = Router::new(&routing());
        let r = record(Category::Site, Some(UNKNOWN), "hostA");

        let raised = router.notification(&r, Transition::Raised);
        assert_eq!(raised.room_id, "room-admin");
        assert_eq!(
            raised.body,
            MessageBody::Text(
                "Site alert with missing info (sent to Admin). Site: UNKNOWN, Host: hostA. Alert: Uplink down\nMissing info Dashboard:(https://dash/admin)\n\n"
                    .to_string()
            )
        );

        let cleared = router.notification(&r, Transition::Cleared);
        assert_eq!(cleared.room_id, "room-admin");
        assert!(matches!(cleared.body, MessageBody::Markdown(_)));
        assert!(cleared
            .body
            .as_str()
            .starts_with("Site alert RESOLVED or Data fixed (check site room) Site: UNKNOWN, Host: hostA, Alert: Uplink down"));
    }

    #[test]
    fn test_missing_hostname_goes_to_admin() {
        let router = Router::new(&routing());
        let r = record(Category::Site, Some("LON"), UNKNOWN);
        assert_eq!(router.notification(&r, Transition::Raised).room_id, "room-admin");
    }

    #[test]
    fn test_missing_info_without_admin_room() {
        let mut config = routing();
        config.admin_room = None;
        config.admin_dashboard = None;
        let router = Router::new(&config);
        let r = record(Category::Site, Some(UNKNOWN), UNKNOWN);

        let raised = router.notification(&r, Transition::Raised);
        assert_eq!(raised.room_id, "room-general");
        assert_eq!(
            raised.body.as_str(),
            "Site alert with missing info (sent to Admin). Site: UNKNOWN, Host: UNKNOWN. Alert: Uplink down"
        );
    }

    #[test]
    fn test_cpoc_messages() {
        let router = Router::new(&routing());
        let r = record(Category::OperationalCenter, Some(CPOC_SITE), UNKNOWN_HOST);

        let raised = router.notification(&r, Transition::Raised);
        assert_eq!(raised.room_id, "room-cpoc");
        assert_eq!(
            raised.body.as_str(),
            "New CPOC alert in CPOC: Uplink down (Host: UNKNOWN_HOST)\nCPOC Dashboard:(https://dash/cpoc)\n\n"
        );

        let cleared = router.notification(&r, Transition::Cleared);
        assert_eq!(cleared.room_id, "room-cpoc");
        assert_eq!(
            cleared.body,
            MessageBody::Markdown(
                "CPOC alert **resolved** in CPOC: Uplink down (Host: UNKNOWN_HOST)\nCPOC Dashboard: (https://dash/cpoc)\n\n"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_cpoc_room_fallback() {
        let mut config = routing();
        config.cpoc_room = None;
        config.cpoc_dashboard = None;
        let router = Router::new(&config);
        let r = record(Category::OperationalCenter, Some(CPOC_SITE), "pdu-1");

        let raised = router.notification(&r, Transition::Raised);
        assert_eq!(raised.room_id, "room-general");
        assert_eq!(raised.body.as_str(), "New CPOC alert in CPOC: Uplink down (Host: pdu-1)");
    }
}
