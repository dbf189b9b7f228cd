use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub provider: Provider,
    #[serde(default)]
    pub domain: BTreeMap<String, ProviderOverrides>,
    #[serde(default)]
    pub user: BTreeMap<String, ProviderOverrides>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_short_name: Option<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    pub incoming: MailServer,
    pub outgoing: MailServer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webmail: Option<WebMail>,
}

/// Optional `<webMail>` block advertising the provider's browser login page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebMail {
    pub login_page: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailServer {
    #[serde(rename = "type")]
    pub server_type: String,
    pub hostname: String,
    pub port: u16,
    pub socket_type: SocketType,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_authentication")]
    pub authentication: Vec<String>,
}

fn default_username() -> String {
    "%EMAILADDRESS%".to_string()
}

fn default_authentication() -> Vec<String> {
    vec!["password-cleartext".to_string()]
}

/// Thunderbird socket type vocabulary for `<socketType>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketType {
    #[serde(rename = "plain")]
    Plain,
    #[serde(rename = "STARTTLS")]
    Starttls,
    #[serde(rename = "SSL")]
    Ssl,
}

impl SocketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketType::Plain => "plain",
            SocketType::Starttls => "STARTTLS",
            SocketType::Ssl => "SSL",
        }
    }
}

/// Partial record layered over `[provider]` by `[domain.*]` and `[user.*]`
/// tables. Absent fields keep the base value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_short_name: Option<String>,
    #[serde(default)]
    pub incoming: MailServerOverrides,
    #[serde(default)]
    pub outgoing: MailServerOverrides,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webmail: Option<WebMail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailServerOverrides {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_type: Option<SocketType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            provider: Provider {
                id: "example".to_string(),
                display_name: Some("Example Mail".to_string()),
                display_short_name: Some("Example".to_string()),
                domains: vec!["example.com".to_string(), "example.net".to_string()],
                incoming: MailServer {
                    server_type: "imap".to_string(),
                    hostname: "imap.example.com".to_string(),
                    port: 993,
                    socket_type: SocketType::Ssl,
                    username: default_username(),
                    authentication: default_authentication(),
                },
                outgoing: MailServer {
                    server_type: "smtp".to_string(),
                    hostname: "smtp.example.com".to_string(),
                    port: 587,
                    socket_type: SocketType::Starttls,
                    username: default_username(),
                    authentication: default_authentication(),
                },
                webmail: Some(WebMail {
                    login_page: "https://webmail.example.com/".to_string(),
                }),
            },
            domain: BTreeMap::new(),
            user: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> &'static str {
        "/etc/autoconfd/domains.toml"
    }
}
