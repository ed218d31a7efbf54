//! Proxy command handlers.
//!
//! The config file is the durable home of the proxy; `play` applies it
//! through the orchestrator on every run.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use chanline_config::{Config, ProxySection};
use chanline_core::{ProxyConfig, ProxyCredentials, ProxyScheme, ResolvedRoute};

use crate::cli::{GlobalOpts, ProxyArgs, ProxyCommand, ProxyEndpointArgs, ProxySchemeArg};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ProxyView {
    enabled: bool,
    scheme: ProxyScheme,
    host: String,
    port: u32,
    username: Option<String>,
    /// Where the secret comes from, never the secret itself.
    password: &'static str,
    check_url: String,
}

impl From<&ProxySection> for ProxyView {
    fn from(p: &ProxySection) -> Self {
        let password = match (&p.username, &p.password_env, &p.password) {
            (None, _, _) => "none",
            (Some(_), Some(_), _) => "env",
            (Some(_), None, Some(_)) => "plaintext",
            (Some(_), None, None) => "keyring",
        };
        Self {
            enabled: p.enabled,
            scheme: p.scheme,
            host: p.host.clone(),
            port: p.port,
            username: p.username.clone(),
            password,
            check_url: p.check_url.clone(),
        }
    }
}

fn detail(v: &ProxyView) -> String {
    if v.host.is_empty() {
        return "No proxy configured. Set one with: chanline proxy set <host>".into();
    }
    [
        format!("Enabled:   {}", if v.enabled { "yes" } else { "no" }),
        format!("Proxy:     {}://{}:{}", v.scheme, v.host, v.port),
        format!("User:      {}", v.username.as_deref().unwrap_or("-")),
        format!("Password:  {}", v.password),
        format!("Check URL: {}", v.check_url),
    ]
    .join("\n")
}

#[derive(Serialize)]
struct RouteView {
    route: &'static str,
    proxy: Option<String>,
}

impl From<&ResolvedRoute> for RouteView {
    fn from(route: &ResolvedRoute) -> Self {
        match route {
            ResolvedRoute::Direct => Self {
                route: "direct",
                proxy: None,
            },
            ResolvedRoute::Proxied(endpoint) => Self {
                route: "proxied",
                proxy: Some(endpoint.redacted_url()),
            },
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn scheme(arg: ProxySchemeArg) -> ProxyScheme {
    match arg {
        ProxySchemeArg::Http => ProxyScheme::Http,
        ProxySchemeArg::Https => ProxyScheme::Https,
        ProxySchemeArg::Socks5 => ProxyScheme::Socks5,
    }
}

/// Build a proxy from flags, reading the secret when a user is given.
fn from_args(
    host: &str,
    endpoint: &ProxyEndpointArgs,
) -> Result<(ProxyConfig, Option<SecretString>), CliError> {
    let secret = match endpoint.username {
        Some(ref username) => Some(util::read_secret(
            username,
            endpoint.password_env.as_deref(),
        )?),
        None => None,
    };
    let credentials = endpoint
        .username
        .clone()
        .zip(secret.clone())
        .map(|(username, password)| ProxyCredentials { username, password });
    let config = ProxyConfig {
        enabled: true,
        scheme: scheme(endpoint.scheme),
        host: host.to_owned(),
        port: endpoint.port,
        credentials,
    };
    Ok((config, secret))
}

async fn probe_route(
    cfg: &Config,
    global: &GlobalOpts,
    proxy: &ProxyConfig,
) -> Result<ResolvedRoute, CliError> {
    // Cached state is irrelevant for a one-off route check.
    let orch = chanline_core::Orchestrator::new(cfg.engine_config()?, cfg.build_services()?);
    let pb = util::spinner(global, &format!("Checking route through {}", proxy.host));
    let result = orch.test_proxy_config(proxy).await;
    pb.finish_and_clear();
    Ok(result?)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ProxyArgs, mut cfg: Config, global: &GlobalOpts) -> Result<(), CliError> {
    let path = util::config_file(global);
    let format = util::output_format(global);

    match args.command {
        ProxyCommand::Show => {
            let view = ProxyView::from(&cfg.proxy);
            let out = output::render_single(format, &view, detail, |v| v.host.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ProxyCommand::Set {
            host,
            endpoint,
            plaintext,
            no_check,
        } => {
            let (proxy, secret) = from_args(&host, &endpoint)?;
            if !no_check {
                let route = probe_route(&cfg, global, &proxy).await?;
                eprintln!("✓ Route verified: {route}");
            }

            let section = &mut cfg.proxy;
            section.enabled = true;
            section.scheme = proxy.scheme;
            section.host = proxy.host.clone();
            section.port = proxy.port;
            section.username = endpoint.username.clone();
            section.password_env = endpoint.password_env.clone();
            section.password = None;

            // An env-sourced secret stays in the environment.
            if let (Some(username), Some(secret), None) =
                (&endpoint.username, &secret, &endpoint.password_env)
            {
                if plaintext {
                    section.password = Some(secret.expose_secret().to_owned());
                } else {
                    chanline_config::store_proxy_password(&host, username, secret)?;
                    eprintln!("✓ Password stored in system keyring");
                }
            }

            chanline_config::save_config_to(&cfg, &path)?;
            eprintln!("✓ Proxy saved to {}", path.display());
            Ok(())
        }

        ProxyCommand::Test { host, endpoint } => {
            let proxy = match host {
                Some(ref host) => from_args(host, &endpoint)?.0,
                None => {
                    let proxy = cfg.proxy_config()?;
                    if proxy.host.is_empty() {
                        return Err(CliError::NotFound {
                            resource_type: "proxy".into(),
                            identifier: "configured".into(),
                            list_command: "proxy show".into(),
                        });
                    }
                    ProxyConfig {
                        enabled: true,
                        ..proxy
                    }
                }
            };

            let route = probe_route(&cfg, global, &proxy).await?;
            let view = RouteView::from(&route);
            let out = output::render_single(
                format,
                &view,
                |v| format!("✓ Route works: {}", v.proxy.as_deref().unwrap_or("direct")),
                |v| v.route.to_owned(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ProxyCommand::Clear => {
            if cfg.proxy.host.is_empty() && !cfg.proxy.enabled {
                eprintln!("No proxy configured");
                return Ok(());
            }
            let message = format!("Disable proxy {} and forget its password?", cfg.proxy.host);
            if !util::confirm(&message, "proxy clear", global.yes)? {
                return Ok(());
            }

            if let Some(ref username) = cfg.proxy.username {
                chanline_config::delete_proxy_password(&cfg.proxy.host, username)?;
            }
            cfg.proxy.enabled = false;
            cfg.proxy.password = None;
            chanline_config::save_config_to(&cfg, &path)?;
            eprintln!("✓ Proxy disabled");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_never_carries_the_secret() {
        let section = ProxySection {
            enabled: true,
            host: "proxy.lan".into(),
            username: Some("viewer".into()),
            password: Some("hunter2".into()),
            ..ProxySection::default()
        };
        let view = ProxyView::from(&section);
        assert_eq!(view.password, "plaintext");
        let json = serde_json::to_string(&view).unwrap_or_default();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn env_password_takes_precedence_in_view() {
        let section = ProxySection {
            host: "proxy.lan".into(),
            username: Some("viewer".into()),
            password_env: Some("PROXY_PW".into()),
            ..ProxySection::default()
        };
        assert_eq!(ProxyView::from(&section).password, "env");
    }

    #[test]
    fn direct_route_view() {
        let view = RouteView::from(&ResolvedRoute::Direct);
        assert_eq!(view.route, "direct");
        assert!(view.proxy.is_none());
    }
}
