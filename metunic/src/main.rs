//! Metunic CLI Application
//!
//! A command-line interface to the Metunic domain registrar API.
//! This CLI application provides scripted access to the metunic-lib library:
//! session checks, nameserver management, renewals, transfers, reference
//! lookups and raw API calls.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use metunic_lib::{
    format_phone_e164, load_env_config, parse_key_value, resolve_client_config,
    resolve_credentials, ApiRequest, ClientConfig, ConfigManager, ConfigOverrides, Credentials,
    EnvConfig, FileConfig, HttpMethod, MetunicError, RegistrarClient,
};
use std::path::PathBuf;
use std::process;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for metunic
#[derive(Parser, Debug)]
#[command(name = "metunic")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage domains through the Metunic registrar API")]
#[command(
    long_about = "Manage domains through the Metunic registrar API.\n\nCredentials come from METUNIC_USERNAME / METUNIC_PASSWORD or the [account] section of metunic.toml. Sessions are kept between runs, so repeated commands do not log in again."
)]
#[command(styles = STYLES)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Use a specific config file instead of discovery
    #[arg(long = "config", value_name = "FILE", global = true, help_heading = "Connection")]
    pub config: Option<PathBuf>,

    /// Talk to the sandbox API
    #[arg(long = "test-mode", global = true, help_heading = "Connection")]
    pub test_mode: bool,

    /// Override the API root URL
    #[arg(long = "base-url", value_name = "URL", global = true, help_heading = "Connection")]
    pub base_url: Option<String>,

    /// Request timeout, e.g. 30s or 2m (default: 30s)
    #[arg(long = "timeout", value_name = "DURATION", global = true, help_heading = "Connection")]
    pub timeout: Option<String>,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", global = true, help_heading = "Output Format")]
    pub json: bool,

    /// Show debug logs, including every registrar exchange
    #[arg(short = 'v', long = "verbose", global = true, help_heading = "Output Format")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in if needed and report that the session is usable
    CheckSession,

    /// Discard the stored session so the next command logs in again
    Logout,

    /// Print the registrar service id of a domain
    ServiceId {
        domain: String,
    },

    /// List the nameservers of a domain
    Nameservers {
        domain: String,
    },

    /// Replace the nameservers of a domain (1 to 5 hosts)
    SetNameservers {
        domain: String,
        #[arg(required = true, num_args = 1..=5, value_name = "NS")]
        nameservers: Vec<String>,
    },

    /// Renew a domain
    Renew {
        domain: String,
        /// Renewal period in years
        #[arg(long = "years", default_value = "1")]
        years: u32,
    },

    /// Request an incoming transfer
    Transfer {
        domain: String,
        /// Transfer (EPP) auth code
        #[arg(long = "auth", value_name = "CODE")]
        auth: String,
    },

    /// Enable the registrar transfer lock
    Lock {
        domain: String,
    },

    /// Disable the registrar transfer lock
    Unlock {
        domain: String,
    },

    /// Show expiry date and status of a domain
    Sync {
        domain: String,
    },

    /// Look up the registrar id of a country by ISO code
    Country {
        iso: String,
    },

    /// Look up the registrar id of a city
    City {
        /// Registrar country id (see `metunic country`)
        #[arg(long = "country-id")]
        country_id: u64,
        name: String,
    },

    /// Send a raw API request and print the unwrapped result
    Call {
        /// GET, POST, PUT or DELETE
        method: String,
        /// Endpoint path, e.g. /services/queried-services
        path: String,
        /// Request parameter (repeatable)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Raw request body, sent instead of form-encoded parameters
        #[arg(long = "body", value_name = "JSON")]
        body: Option<String>,
        /// Send without logging in
        #[arg(long = "no-auth")]
        no_auth: bool,
    },

    /// Format a phone number as +<digits> (offline)
    Phone {
        raw: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        ui::print_error(&e);
        process::exit(1);
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "metunic=debug,metunic_lib=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

async fn run(args: Args) -> Result<(), MetunicError> {
    if let Command::Phone { raw } = &args.command {
        ui::print_text(&format_phone_e164(raw), args.json);
        return Ok(());
    }

    let settings = Settings::load(&args)?;
    let client = RegistrarClient::new(settings.client_config.clone())?;
    debug!(base_url = client.base_url(), "registrar client ready");

    match args.command {
        Command::CheckSession => {
            let creds = settings.credentials()?;
            client.ensure_session(&creds).await?;
            ui::print_done(&format!("Session for {} is valid", creds.username()), args.json);
        }
        Command::Logout => {
            let creds = settings.credentials()?;
            client.forget_session(&creds).await;
            ui::print_done(&format!("Session for {} discarded", creds.username()), args.json);
        }
        Command::ServiceId { domain } => {
            let creds = settings.credentials()?;
            let domain = metunic_lib::normalize_domain(&domain)?;
            let id = client.resolve_service_id(&domain, &creds).await?;
            ui::print_id(&domain, Some(id), args.json);
        }
        Command::Nameservers { domain } => {
            let creds = settings.credentials()?;
            let hosts = client.get_nameservers(&domain, &creds).await?;
            ui::print_nameservers(&domain, &hosts, args.json);
        }
        Command::SetNameservers {
            domain,
            nameservers,
        } => {
            let creds = settings.credentials()?;
            client.save_nameservers(&domain, &nameservers, &creds).await?;
            ui::print_done(
                &format!("Nameservers of {} set to {}", domain, nameservers.join(", ")),
                args.json,
            );
        }
        Command::Renew { domain, years } => {
            let creds = settings.credentials()?;
            client.renew_domain(&domain, years, &creds).await?;
            ui::print_done(
                &format!(
                    "{} renewed for {} year{}",
                    domain,
                    years,
                    if years == 1 { "" } else { "s" }
                ),
                args.json,
            );
        }
        Command::Transfer { domain, auth } => {
            let creds = settings.credentials()?;
            client.transfer_domain(&domain, &auth, &creds).await?;
            ui::print_done(&format!("Transfer of {} requested", domain), args.json);
        }
        Command::Lock { domain } => {
            let creds = settings.credentials()?;
            client.set_registrar_lock(&domain, true, &creds).await?;
            ui::print_done(&format!("{} is locked", domain), args.json);
        }
        Command::Unlock { domain } => {
            let creds = settings.credentials()?;
            client.set_registrar_lock(&domain, false, &creds).await?;
            ui::print_done(&format!("{} is unlocked", domain), args.json);
        }
        Command::Sync { domain } => {
            let creds = settings.credentials()?;
            let status = client.sync_domain(&domain, &creds).await?;
            ui::print_sync(&domain, &status, args.json);
        }
        Command::Country { iso } => {
            let creds = settings.credentials()?;
            let id = client.resolve_country_id(&iso, &creds).await?;
            ui::print_id(&iso, id, args.json);
        }
        Command::City { country_id, name } => {
            let creds = settings.credentials()?;
            let id = client.resolve_city_id(country_id, &name, &creds).await?;
            ui::print_id(&name, id, args.json);
        }
        Command::Call {
            method,
            path,
            params,
            body,
            no_auth,
        } => {
            let request = build_raw_request(&method, &path, &params, body)?;
            let creds = if no_auth {
                None
            } else {
                Some(settings.credentials()?)
            };
            let result = client.call(&request, creds.as_ref()).await?;
            ui::print_value(&result, args.json);
        }
        Command::Phone { .. } => {}
    }

    Ok(())
}

/// Resolved configuration for one invocation.
///
/// Precedence: CLI flags > METUNIC_* environment > config files > defaults.
struct Settings {
    client_config: ClientConfig,
    file_config: FileConfig,
    env_config: EnvConfig,
    overrides: ConfigOverrides,
}

impl Settings {
    fn load(args: &Args) -> Result<Self, MetunicError> {
        let config_manager = ConfigManager::new(args.verbose);

        let file_config = match &args.config {
            Some(path) => {
                debug!(path = %path.display(), "using explicit config file");
                config_manager.load_file(path)?
            }
            None => config_manager.discover_and_load().unwrap_or_else(|e| {
                warn!(error = %e, "config discovery failed, using defaults");
                FileConfig::default()
            }),
        };

        let env_config = load_env_config();
        let overrides = ConfigOverrides {
            test_mode: args.test_mode.then_some(true),
            base_url: args.base_url.clone(),
            timeout: args.timeout.clone(),
            ..Default::default()
        };

        let client_config = resolve_client_config(&file_config, &env_config, &overrides)?;
        Ok(Self {
            client_config,
            file_config,
            env_config,
            overrides,
        })
    }

    fn credentials(&self) -> Result<Credentials, MetunicError> {
        resolve_credentials(&self.file_config, &self.env_config, &self.overrides)
    }
}

fn build_raw_request(
    method: &str,
    path: &str,
    params: &[String],
    body: Option<String>,
) -> Result<ApiRequest, MetunicError> {
    let method: HttpMethod = method.parse()?;
    if !path.starts_with('/') {
        return Err(MetunicError::invalid_argument(
            path,
            "endpoint path must start with '/'",
        ));
    }

    let mut request = ApiRequest::new(method, path);
    for pair in params {
        let (key, value) = parse_key_value(pair)?;
        request = request.param(key, value);
    }
    if let Some(body) = body {
        request = request.with_body(body);
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_raw_request() {
        let request = build_raw_request(
            "get",
            "/services/queried-services",
            &["domainName=example.com".to_string()],
            None,
        )
        .unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(
            request.params,
            vec![("domainName".to_string(), "example.com".to_string())]
        );
    }

    #[test]
    fn test_build_raw_request_rejects_bad_input() {
        assert!(build_raw_request("PATCH", "/x", &[], None).is_err());
        assert!(build_raw_request("GET", "x", &[], None).is_err());
        assert!(build_raw_request("GET", "/x", &["novalue".to_string()], None).is_err());
    }

    #[test]
    fn test_args_parse_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "metunic",
            "renew",
            "example.com",
            "--years",
            "2",
            "--test-mode",
            "--json",
        ])
        .unwrap();
        assert!(args.test_mode);
        assert!(args.json);
        match args.command {
            Command::Renew { domain, years } => {
                assert_eq!(domain, "example.com");
                assert_eq!(years, 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_set_nameservers_limits_host_count() {
        let mut argv = vec!["metunic", "set-nameservers", "example.com"];
        let hosts = ["a.ns.net", "b.ns.net", "c.ns.net", "d.ns.net", "e.ns.net", "f.ns.net"];
        argv.extend(hosts);
        assert!(Args::try_parse_from(&argv).is_err());
        assert!(Args::try_parse_from(&argv[..8]).is_ok());
    }
}
