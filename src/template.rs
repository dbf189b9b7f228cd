use crate::config::MailServer;
use crate::resolver::{EmailAddress, Resolved};
use minijinja::{context, AutoEscape, Environment};
use serde::Serialize;
use std::sync::OnceLock;

/// The Thunderbird `config-v1.1.xml` document. Fixed at compile time; the
/// per-request values are interpolated by minijinja with XML-safe escaping.
const AUTOCONFIG_TEMPLATE: &str = r#"<?xml version="1.0"?>
<clientConfig version="1.1">
  <emailProvider id="{{ id }}">
{%- for domain in domains %}
    <domain>{{ domain }}</domain>
{%- endfor %}
{%- if display_name %}
    <displayName>{{ display_name }}</displayName>
{%- endif %}
{%- if display_short_name %}
    <displayShortName>{{ display_short_name }}</displayShortName>
{%- endif %}
    <incomingServer type="{{ incoming.type }}">
      <hostname>{{ incoming.hostname }}</hostname>
      <port>{{ incoming.port }}</port>
      <socketType>{{ incoming.socket_type }}</socketType>
      <username>{{ incoming.username }}</username>
{%- for auth in incoming.authentication %}
      <authentication>{{ auth }}</authentication>
{%- endfor %}
    </incomingServer>
    <outgoingServer type="{{ outgoing.type }}">
      <hostname>{{ outgoing.hostname }}</hostname>
      <port>{{ outgoing.port }}</port>
      <socketType>{{ outgoing.socket_type }}</socketType>
      <username>{{ outgoing.username }}</username>
{%- for auth in outgoing.authentication %}
      <authentication>{{ auth }}</authentication>
{%- endfor %}
    </outgoingServer>
  </emailProvider>
{%- if webmail %}
  <webMail>
    <loginPage url="{{ webmail.login_page }}" />
  </webMail>
{%- endif %}
</clientConfig>
"#;

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

fn environment() -> &'static Environment<'static> {
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        // HTML escaping covers the XML special characters
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env
    })
}

#[derive(Debug, Serialize)]
struct ServerContext {
    #[serde(rename = "type")]
    server_type: String,
    hostname: String,
    port: u16,
    socket_type: &'static str,
    username: String,
    authentication: Vec<String>,
}

impl ServerContext {
    fn new(server: &MailServer, address: &EmailAddress) -> Self {
        ServerContext {
            server_type: server.server_type.clone(),
            hostname: substitute(&server.hostname, address),
            port: server.port,
            socket_type: server.socket_type.as_str(),
            username: substitute(&server.username, address),
            authentication: server.authentication.clone(),
        }
    }
}

/// Replace the request-derived placeholder tokens in a config value.
pub fn substitute(value: &str, address: &EmailAddress) -> String {
    value
        .replace("%EMAILADDRESS%", &address.full)
        .replace("%EMAILLOCALPART%", &address.local_part)
        .replace("%EMAILDOMAIN%", &address.domain)
}

/// Render the autoconfig document for a resolved provider record.
pub fn render(resolved: &Resolved, address: &EmailAddress) -> Result<String, minijinja::Error> {
    environment().render_str(
        AUTOCONFIG_TEMPLATE,
        context! {
            id => resolved.id,
            domains => resolved.domains,
            display_name => resolved.display_name,
            display_short_name => resolved.display_short_name,
            incoming => ServerContext::new(&resolved.incoming, address),
            outgoing => ServerContext::new(&resolved.outgoing, address),
            webmail => resolved.webmail,
        },
    )
}
