use crate::config::{Config, MailServer, MailServerOverrides, ProviderOverrides, WebMail};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no configuration for domain {0}")]
    UnknownDomain(String),
}

/// A parsed request address. The domain side is lowercased on parse so all
/// lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub full: String,
    pub local_part: String,
    pub domain: String,
}

impl EmailAddress {
    pub fn parse(address: &str) -> Option<Self> {
        let (local_part, domain) = address.split_once('@')?;
        if local_part.is_empty() || domain.is_empty() || domain.contains('@') {
            return None;
        }
        let domain = domain.to_ascii_lowercase();
        Some(EmailAddress {
            full: format!("{local_part}@{domain}"),
            local_part: local_part.to_string(),
            domain,
        })
    }
}

/// Fully layered provider record for one request.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub id: String,
    pub display_name: Option<String>,
    pub display_short_name: Option<String>,
    pub domains: Vec<String>,
    pub incoming: MailServer,
    pub outgoing: MailServer,
    pub webmail: Option<WebMail>,
}

/// Layer the provider record for an address.
///
/// `user.<address>` takes precedence over `domain.<name>`, which takes
/// precedence over `provider`. An address is servable if its domain appears
/// in `provider.domains`, has a `[domain.*]` entry, or the full address has
/// a `[user.*]` entry.
pub fn resolve(config: &Config, address: &EmailAddress) -> Result<Resolved, ResolveError> {
    let domain_overrides = config
        .domain
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(&address.domain))
        .map(|(_, overrides)| overrides);
    let user_overrides = config
        .user
        .iter()
        .find(|(addr, _)| addr.eq_ignore_ascii_case(&address.full))
        .map(|(_, overrides)| overrides);

    let in_provider_domains = config
        .provider
        .domains
        .iter()
        .any(|d| d.eq_ignore_ascii_case(&address.domain));

    if !in_provider_domains && domain_overrides.is_none() && user_overrides.is_none() {
        return Err(ResolveError::UnknownDomain(address.domain.clone()));
    }

    let provider = &config.provider;
    let mut resolved = Resolved {
        id: provider.id.clone(),
        display_name: provider.display_name.clone(),
        display_short_name: provider.display_short_name.clone(),
        domains: provider.domains.clone(),
        incoming: provider.incoming.clone(),
        outgoing: provider.outgoing.clone(),
        webmail: provider.webmail.clone(),
    };

    // Once an override layer applies, the document advertises only the
    // requested domain instead of the provider's whole list.
    if let Some(overrides) = domain_overrides {
        apply(&mut resolved, overrides);
        resolved.domains = vec![address.domain.clone()];
    }
    if let Some(overrides) = user_overrides {
        apply(&mut resolved, overrides);
        resolved.domains = vec![address.domain.clone()];
    }

    Ok(resolved)
}

/// Every servable domain: `provider.domains` plus `[domain.*]` keys.
pub fn servable_domains(config: &Config) -> Vec<String> {
    let mut domains: Vec<String> = config
        .provider
        .domains
        .iter()
        .map(|d| d.to_ascii_lowercase())
        .collect();
    for name in config.domain.keys() {
        let name = name.to_ascii_lowercase();
        if !domains.contains(&name) {
            domains.push(name);
        }
    }
    domains
}

fn apply(resolved: &mut Resolved, overrides: &ProviderOverrides) {
    if let Some(id) = &overrides.id {
        resolved.id = id.clone();
    }
    if let Some(name) = &overrides.display_name {
        resolved.display_name = Some(name.clone());
    }
    if let Some(name) = &overrides.display_short_name {
        resolved.display_short_name = Some(name.clone());
    }
    apply_server(&mut resolved.incoming, &overrides.incoming);
    apply_server(&mut resolved.outgoing, &overrides.outgoing);
    if let Some(webmail) = &overrides.webmail {
        resolved.webmail = Some(webmail.clone());
    }
}

fn apply_server(server: &mut MailServer, overrides: &MailServerOverrides) {
    if let Some(server_type) = &overrides.server_type {
        server.server_type = server_type.clone();
    }
    if let Some(hostname) = &overrides.hostname {
        server.hostname = hostname.clone();
    }
    if let Some(port) = overrides.port {
        server.port = port;
    }
    if let Some(socket_type) = overrides.socket_type {
        server.socket_type = socket_type;
    }
    if let Some(username) = &overrides.username {
        server.username = username.clone();
    }
    if let Some(authentication) = &overrides.authentication {
        server.authentication = authentication.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SocketType;

    fn sample_config() -> Config {
        toml::from_str(
            r#"
            [provider]
            id = "example"
            display_name = "Example Mail"
            display_short_name = "Example"
            domains = ["example.com", "example.net"]

            [provider.incoming]
            type = "imap"
            hostname = "imap.example.com"
            port = 993
            socket_type = "SSL"

            [provider.outgoing]
            type = "smtp"
            hostname = "smtp.example.com"
            port = 587
            socket_type = "STARTTLS"

            [domain."other.org"]
            id = "other"
            display_name = "Other Org Mail"

            [domain."other.org".incoming]
            hostname = "mail.other.org"
            port = 143
            socket_type = "STARTTLS"

            [user."alice@other.org"]

            [user."alice@other.org".incoming]
            username = "alice-mailbox"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_email_address() {
        let address = EmailAddress::parse("alice@example.com").unwrap();
        assert_eq!(address.local_part, "alice");
        assert_eq!(address.domain, "example.com");
        assert_eq!(address.full, "alice@example.com");

        assert!(EmailAddress::parse("").is_none());
        assert!(EmailAddress::parse("alice").is_none());
        assert!(EmailAddress::parse("@example.com").is_none());
        assert!(EmailAddress::parse("alice@").is_none());
        assert!(EmailAddress::parse("alice@foo@bar").is_none());
    }

    #[test]
    fn test_parse_lowercases_domain_only() {
        let address = EmailAddress::parse("Alice@EXAMPLE.com").unwrap();
        assert_eq!(address.local_part, "Alice");
        assert_eq!(address.domain, "example.com");
        assert_eq!(address.full, "Alice@example.com");
    }

    #[test]
    fn test_resolve_provider_domain() {
        let config = sample_config();
        let address = EmailAddress::parse("bob@example.net").unwrap();

        let resolved = resolve(&config, &address).unwrap();
        assert_eq!(resolved.id, "example");
        assert_eq!(resolved.domains, vec!["example.com", "example.net"]);
        assert_eq!(resolved.incoming.hostname, "imap.example.com");
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let config = sample_config();
        let address = EmailAddress::parse("bob@EXAMPLE.COM").unwrap();
        assert!(resolve(&config, &address).is_ok());

        let address = EmailAddress::parse("bob@OTHER.ORG").unwrap();
        let resolved = resolve(&config, &address).unwrap();
        assert_eq!(resolved.id, "other");
    }

    #[test]
    fn test_resolve_unknown_domain() {
        let config = sample_config();
        let address = EmailAddress::parse("someone@nope.test").unwrap();

        match resolve(&config, &address) {
            Err(ResolveError::UnknownDomain(domain)) => assert_eq!(domain, "nope.test"),
            other => panic!("expected UnknownDomain, got {other:?}"),
        }
    }

    #[test]
    fn test_domain_overrides_layer_over_provider() {
        let config = sample_config();
        let address = EmailAddress::parse("bob@other.org").unwrap();

        let resolved = resolve(&config, &address).unwrap();
        assert_eq!(resolved.id, "other");
        assert_eq!(resolved.display_name.as_deref(), Some("Other Org Mail"));
        // Untouched fields keep the provider values
        assert_eq!(resolved.display_short_name.as_deref(), Some("Example"));
        assert_eq!(resolved.incoming.hostname, "mail.other.org");
        assert_eq!(resolved.incoming.port, 143);
        assert_eq!(resolved.incoming.socket_type, SocketType::Starttls);
        assert_eq!(resolved.outgoing.hostname, "smtp.example.com");
        // The document collapses to the requested domain
        assert_eq!(resolved.domains, vec!["other.org"]);
    }

    #[test]
    fn test_user_overrides_take_precedence() {
        let config = sample_config();
        let address = EmailAddress::parse("alice@other.org").unwrap();

        let resolved = resolve(&config, &address).unwrap();
        // Domain layer still applies underneath
        assert_eq!(resolved.incoming.hostname, "mail.other.org");
        // User layer wins on the field it sets
        assert_eq!(resolved.incoming.username, "alice-mailbox");
    }

    #[test]
    fn test_servable_domains() {
        let config = sample_config();
        let domains = servable_domains(&config);
        assert_eq!(domains, vec!["example.com", "example.net", "other.org"]);
    }
}
