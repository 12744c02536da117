/// Widget configuration
use crate::error::{ChatError, Result};
use crate::sdk::protocol::InitConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_CHAT_TITLE: &str = "Chat with us!";
const DEFAULT_GREETING: &str = "Welcome to our LiveChat!\nHow may We help you?";
const DEFAULT_NO_AGENTS: &str = "Our agents are not available right now.";

/// Profile pushed to the external client once connected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerData {
    pub name: String,
    pub email: String,
}

impl Default for CustomerData {
    fn default() -> Self {
        Self {
            name: "User".to_string(),
            email: "someone@somewhere.com".to_string(),
        }
    }
}

/// Chat widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Account license the widget connects to
    pub license_id: u32,

    /// OAuth client id used by the external client
    pub client_id: Option<String>,

    /// OAuth redirect uri used by the external client
    pub redirect_uri: Option<String>,

    /// Routing group, `None` lets the backend pick
    pub group_id: Option<u32>,

    pub chat_title: String,

    /// Header prompt while agents are online
    pub greeting: String,

    /// Header prompt while no agent is available
    pub no_agents: String,

    /// Keep the composer enabled while offline and without an active chat
    pub allow_offline_messages: bool,

    pub customer: CustomerData,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            license_id: 0,
            client_id: None,
            redirect_uri: None,
            group_id: Some(0),
            chat_title: DEFAULT_CHAT_TITLE.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            no_agents: DEFAULT_NO_AGENTS.to_string(),
            allow_offline_messages: false,
            customer: CustomerData::default(),
        }
    }
}

fn parse_u32(value: &str, what: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .map_err(|_| ChatError::Config(format!("{} must be a valid number", what)))
}

impl WidgetConfig {
    /// Handshake parameters handed to the client on every initialization
    pub fn init_config(&self) -> InitConfig {
        InitConfig {
            license_id: self.license_id,
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            group_id: self.group_id,
        }
    }

    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = Self::default();
        let mut license: Option<u32> = None;

        let flag_value = |i: usize, flag: &str| -> Result<String> {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| ChatError::Config(format!("{} requires an argument", flag)))
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--client-id" => {
                    config.client_id = Some(flag_value(i, "--client-id")?);
                    i += 2;
                }
                "--redirect-uri" => {
                    config.redirect_uri = Some(flag_value(i, "--redirect-uri")?);
                    i += 2;
                }
                "--group" => {
                    config.group_id = Some(parse_u32(&flag_value(i, "--group")?, "--group")?);
                    i += 2;
                }
                "--no-group" => {
                    config.group_id = None;
                    i += 1;
                }
                "--allow-offline" => {
                    config.allow_offline_messages = true;
                    i += 1;
                }
                "--customer-name" => {
                    config.customer.name = flag_value(i, "--customer-name")?;
                    i += 2;
                }
                "--customer-email" => {
                    config.customer.email = flag_value(i, "--customer-email")?;
                    i += 2;
                }
                other if other.starts_with("--") => {
                    return Err(ChatError::Config(format!("Unknown flag: {}", other)));
                }
                other => {
                    license = Some(parse_u32(other, "License")?);
                    i += 1;
                }
            }
        }

        // Env overrides
        if let Ok(value) = std::env::var("LIVECHAT_LICENSE") {
            license = Some(parse_u32(&value, "LIVECHAT_LICENSE")?);
        }
        if let Ok(value) = std::env::var("LIVECHAT_CLIENT_ID") {
            config.client_id = Some(value);
        }
        if let Ok(value) = std::env::var("LIVECHAT_GROUP") {
            config.group_id = Some(parse_u32(&value, "LIVECHAT_GROUP")?);
        }
        if std::env::var("LIVECHAT_ALLOW_OFFLINE").is_ok() {
            config.allow_offline_messages = true;
        }

        config.license_id = license.ok_or_else(|| {
            ChatError::Config(format!(
                "Usage: {} <license> [--client-id <id>] [--redirect-uri <uri>] [--group <id>] [--allow-offline] [--customer-name <name>] [--customer-email <email>]",
                args.first().map(String::as_str).unwrap_or("livechat-demo")
            ))
        })?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("livechat-demo")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults_match_widget_texts() {
        let config = WidgetConfig::default();
        assert_eq!(config.chat_title, "Chat with us!");
        assert_eq!(config.group_id, Some(0));
        assert!(!config.allow_offline_messages);
        assert_eq!(config.customer.email, "someone@somewhere.com");
    }

    #[test]
    fn test_init_config_carries_connection_fields() {
        let mut config = WidgetConfig::from_args(&args(&[
            "12345",
            "--client-id",
            "abc",
            "--redirect-uri",
            "https://example.com/cb",
            "--group",
            "4",
        ]))
        .unwrap();
        let init = config.init_config();
        assert_eq!(init.license_id, 12345);
        assert_eq!(init.client_id.as_deref(), Some("abc"));
        assert_eq!(init.redirect_uri.as_deref(), Some("https://example.com/cb"));
        assert_eq!(init.group_id, Some(4));

        config.group_id = None;
        assert_eq!(config.init_config().group_id, None);
    }

    #[test]
    fn test_from_args_flags() {
        let config = WidgetConfig::from_args(&args(&[
            "12345",
            "--client-id",
            "abc",
            "--group",
            "7",
            "--allow-offline",
            "--customer-name",
            "Jane",
        ]))
        .unwrap();

        assert_eq!(config.license_id, 12345);
        assert_eq!(config.client_id.as_deref(), Some("abc"));
        assert_eq!(config.group_id, Some(7));
        assert!(config.allow_offline_messages);
        assert_eq!(config.customer.name, "Jane");
    }

    #[test]
    fn test_from_args_rejects_bad_input() {
        assert!(matches!(
            WidgetConfig::from_args(&args(&["not-a-number"])),
            Err(ChatError::Config(_))
        ));
        assert!(matches!(
            WidgetConfig::from_args(&args(&["1", "--group"])),
            Err(ChatError::Config(_))
        ));
        assert!(matches!(
            WidgetConfig::from_args(&args(&["1", "--bogus"])),
            Err(ChatError::Config(_))
        ));
    }
}
