//! tootkit - Mastodon credentials and OAuth2 grant from the command line
#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tootkit::auth::CredentialFile;
use tootkit::{AppCredentials, Authenticator, ClientBuilder, Config, UserCredentials};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    match parse_args(std::env::args().skip(1).collect())? {
        Command::Scaffold { instance, out } => scaffold(&instance, out),
        Command::Grant {
            app,
            out,
            no_browser,
        } => grant(app, out, no_browser).await,
        Command::Whoami { user } => whoami(user).await,
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Print `error: <kind>: <message>`, using the library error kind when there is one
fn report(err: &anyhow::Error) {
    match err.chain().find_map(|e| e.downcast_ref::<tootkit::Error>()) {
        Some(source) => eprintln!("error: {}: {:#}", source.kind(), err),
        None => eprintln!("error: usage: {:#}", err),
    }
}

/// CLI commands
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Scaffold {
        instance: String,
        out: Option<PathBuf>,
    },
    Grant {
        app: Option<PathBuf>,
        out: Option<PathBuf>,
        no_browser: bool,
    },
    Whoami {
        user: Option<PathBuf>,
    },
    Help,
    Version,
}

fn parse_args(args: Vec<String>) -> Result<Command> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };

    let flag = |name: &str| -> Result<Option<PathBuf>> {
        match args.iter().position(|a| a == name) {
            Some(i) => args
                .get(i + 1)
                .filter(|v| !v.starts_with("--"))
                .map(|v| Some(PathBuf::from(v)))
                .ok_or_else(|| anyhow::anyhow!("{name} needs a path")),
            None => Ok(None),
        }
    };

    match command.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "scaffold" => {
            let instance = args
                .get(1)
                .filter(|a| !a.starts_with("--"))
                .ok_or_else(|| anyhow::anyhow!("Missing instance URL\nExample: tootkit scaffold mastodon.social"))?
                .clone();
            Ok(Command::Scaffold {
                instance,
                out: flag("--out")?,
            })
        }

        "grant" => Ok(Command::Grant {
            app: flag("--app")?,
            out: flag("--out")?,
            no_browser: args.iter().any(|a| a == "--no-browser"),
        }),

        "whoami" => Ok(Command::Whoami {
            user: flag("--user")?,
        }),

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'tootkit --help' for usage"
        )),
    }
}

fn print_help() {
    let dir = tootkit::paths::tootkit_dir()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"🐘 tootkit - Mastodon credentials from the command line

USAGE:
    tootkit [COMMAND]

COMMANDS:
    scaffold <instance-url> [OPTIONS]  Write an empty application file
      Options:
        --out <path>                   Where to write it (default: app.json)
      Examples:
        tootkit scaffold mastodon.social

    grant [OPTIONS]                    Authorize the application, save a user token
      Options:
        --app <path>                   Application file (default: app.json)
        --out <path>                   User file (default: user.json)
        --no-browser                   Print the URL instead of opening it
      Press Ctrl-C to abort.

    whoami [OPTIONS]                   Show the account a user file belongs to
      Options:
        --user <path>                  User file (default: user.json)

OPTIONS:
    -h, --help                         Show this help message
    -v, --version                      Show version information

FILES:
    {}
"#,
        dir
    );
}

fn print_version() {
    println!("tootkit {}", tootkit::VERSION);
}

fn or_default(path: Option<PathBuf>, default: fn() -> tootkit::Result<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => default().context("Could not determine default file location"),
    }
}

fn scaffold(instance: &str, out: Option<PathBuf>) -> Result<()> {
    let out = or_default(out, tootkit::paths::app_credentials_path)?;
    let app = AppCredentials::scaffold(instance)?;
    app.save(&out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("✓ Wrote {}", out.display());
    println!("\nRegister an application at {}/settings/applications", app.instance_url);
    println!("with redirect URI {} and fill in id and secret.", app.redirect_uri);
    Ok(())
}

async fn grant(app: Option<PathBuf>, out: Option<PathBuf>, no_browser: bool) -> Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default config: {e}");
        Config::default()
    });
    let app_path = or_default(app, tootkit::paths::app_credentials_path)?;
    let out = or_default(out, tootkit::paths::user_credentials_path)?;

    let app = AppCredentials::load(&app_path)
        .with_context(|| format!("Failed to load {}", app_path.display()))?;
    let mut auth = Authenticator::new(app)?.with_scopes(config.scopes.clone());
    if let Some(timeout) = config.grant_timeout() {
        auth = auth.with_timeout(timeout);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let listener = auth.start(config.open_browser && !no_browser).await?;
    println!(
        "🔑 Approve tootkit in your browser:\n\n  {}\n\nWaiting for the redirect (Ctrl-C to abort)...",
        auth.authorization_url()?
    );

    let user = auth.finish(listener, &cancel).await?;
    user.save(&out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("✓ Saved user token to {}", out.display());
    Ok(())
}

async fn whoami(user: Option<PathBuf>) -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let path = or_default(user, tootkit::paths::user_credentials_path)?;
    let user = UserCredentials::load(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let client = ClientBuilder::from_config(&config, user.instance_url.clone())
        .credentials(&user)
        .build()?;
    let me = client.me().await?;

    println!("{} ({})", me.display_name, me.at_username());
    println!("  {}", me.url);
    println!(
        "  {} statuses · {} following · {} followers",
        me.statuses_count, me.following_count, me.followers_count
    );
    client.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_scaffold() {
        assert_eq!(
            parse_args(args(&["scaffold", "mastodon.social", "--out", "a.json"])).unwrap(),
            Command::Scaffold {
                instance: "mastodon.social".to_string(),
                out: Some(PathBuf::from("a.json")),
            }
        );
        assert!(parse_args(args(&["scaffold"])).is_err());
    }

    #[test]
    fn test_parse_grant() {
        assert_eq!(
            parse_args(args(&["grant", "--no-browser", "--app", "app.json"])).unwrap(),
            Command::Grant {
                app: Some(PathBuf::from("app.json")),
                out: None,
                no_browser: true,
            }
        );
        assert!(parse_args(args(&["grant", "--out"])).is_err());
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(parse_args(Vec::new()).unwrap(), Command::Help);
        assert_eq!(parse_args(args(&["version"])).unwrap(), Command::Version);
        assert_eq!(
            parse_args(args(&["whoami"])).unwrap(),
            Command::Whoami { user: None }
        );
        assert!(parse_args(args(&["toot"])).is_err());
    }
}
