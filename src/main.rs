use autoconfd::config::Config;
use autoconfd::resolver::{self, EmailAddress};
use autoconfd::server::Server;
use autoconfd::template;
use clap::{Arg, Command};
use log::LevelFilter;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("autoconfd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Mozilla autoconfig service for small mail providers")
        .long_about(
            "Serves the Thunderbird config-v1.1.xml autoconfiguration document \
             for the domains of a mail provider, with per-domain and per-user \
             overrides layered over the provider defaults.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(Config::default_path()),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Render every configured domain and report failures")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDR")
                .help("Listen address, overrides the configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Initialize logger based on verbose flag
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    let bind = matches
        .get_one::<String>("bind")
        .cloned()
        .unwrap_or_else(|| config.server.bind.clone());

    log::info!("Starting autoconfd...");

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Error in configuration: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = server.run(&bind).await {
        log::error!("Server error: {e}");
        process::exit(1);
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::load_from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn test_config(config: &Config) {
    println!("🔍 Testing configuration...");
    println!();

    let domains = resolver::servable_domains(config);
    if domains.is_empty() {
        println!("❌ No servable domains configured");
        process::exit(1);
    }

    let mut probes: Vec<String> = domains
        .iter()
        .map(|domain| format!("postmaster@{domain}"))
        .collect();
    probes.extend(config.user.keys().cloned());

    let mut failures = 0;
    for probe in &probes {
        match render_probe(config, probe) {
            Ok(xml) => println!("  ✅ {probe} ({} bytes)", xml.len()),
            Err(e) => {
                println!("  ❌ {probe}: {e}");
                failures += 1;
            }
        }
    }

    println!();
    if failures > 0 {
        println!("❌ Configuration validation failed: {failures} entries did not render");
        process::exit(1);
    }
    println!("All domains rendered successfully.");
}

fn render_probe(config: &Config, probe: &str) -> anyhow::Result<String> {
    let address = EmailAddress::parse(probe)
        .ok_or_else(|| anyhow::anyhow!("not a valid email address"))?;
    let resolved = resolver::resolve(config, &address)?;
    Ok(template::render(&resolved, &address)?)
}
