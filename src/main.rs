use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info};

use opfw_panel::commands::{classify, RemoteExecutor};
use opfw_panel::panel::{DataFile, OnlineStatus, PanelConfig, ServerActions};
use opfw_panel::transport::{Method, ParamValue, RemoteCommandRequest, RemoteCommandResult};
use opfw_panel::utils;

#[derive(Parser)]
#[command(name = "opfw", version, about = "OP-FW remote execute client")]
struct AppCli {
    /// Config file path (JSON). Environment variables only when omitted
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Server address; defaults to the first configured server
    #[arg(short, long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a raw route
    Execute {
        /// Absolute URL or path relative to the server API
        route: String,
        #[arg(short = 'X', long, default_value = "POST")]
        method: Method,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, ParamValue)>,
        /// Timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Return the body verbatim instead of parsing JSON
        #[arg(long, default_value_t = false)]
        text: bool,
    },
    /// Classify a response body read from a file or stdin
    Classify { file: Option<String> },
    /// Kick a player
    Kick {
        license: String,
        #[arg(long)]
        source: u32,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value = "")]
        staff_license: String,
        #[arg(long, default_value = "a staff member")]
        staff_name: String,
    },
    /// Post a server announcement
    Announce { message: String },
    /// Send a staff chat message
    StaffChat {
        message: String,
        #[arg(long, default_value = "")]
        staff_license: String,
    },
    /// Revive a player
    Revive {
        license: String,
        #[arg(long)]
        source: u32,
        #[arg(long, default_value = "")]
        staff_license: String,
    },
    /// Move a player in the connection queue
    QueuePosition { license: String, position: i64 },
    /// Take a screenshot, or a clip when --duration is given
    Screenshot {
        source: u32,
        #[arg(long, default_value_t = false)]
        no_html: bool,
        #[arg(long, default_value_t = 3600)]
        lifespan: u32,
        /// Clip length in seconds
        #[arg(long)]
        duration: Option<u32>,
    },
    /// Fetch a data file (queue, jobs, vehicles, edm, models, api, crafting)
    Fetch { file: String },
}

fn parse_param(raw: &str) -> Result<(String, ParamValue)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected key=value, got {:?}", raw))?;
    let value = match value {
        "true" => ParamValue::Bool(true),
        "false" => ParamValue::Bool(false),
        v => v
            .parse::<i64>()
            .map(ParamValue::Int)
            .unwrap_or_else(|_| ParamValue::Str(v.to_string())),
    };
    Ok((key.to_string(), value))
}

fn load_config(path: Option<&str>) -> Result<PanelConfig> {
    match path {
        Some(path) => {
            let mut cfg = PanelConfig::from_file(path)?;
            cfg.apply_env();
            Ok(cfg)
        }
        None => Ok(PanelConfig::from_env()),
    }
}

fn resolve_server(arg: Option<&str>, cfg: &PanelConfig) -> Result<String> {
    match arg.or_else(|| cfg.first_server()) {
        Some(server) => Ok(server.to_string()),
        None => bail!("no server given and OP_FW_SERVERS is empty"),
    }
}

fn print_result(result: &RemoteCommandResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    if let RemoteCommandResult::Failure { .. } = result {
        std::process::exit(1);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::logging::init();

    let args = AppCli::parse();
    let cfg = load_config(args.config.as_deref())?;
    debug!(servers = cfg.servers.len(), "configuration loaded");

    let server = || resolve_server(args.server.as_deref(), &cfg);
    let actions = ServerActions::from_config(&cfg);

    let result = match args.command {
        Commands::Execute {
            route,
            method,
            params,
            timeout,
            text,
        } => {
            let base = if route.starts_with("http://") || route.starts_with("https://") {
                String::new()
            } else {
                opfw_panel::panel::server::fix_api_url(&server()?)
            };
            let mut req = RemoteCommandRequest::new(base, route.trim_start_matches('/'))
                .method(method)
                .timeout(timeout.map(Duration::from_secs).unwrap_or(cfg.default_timeout()));
            for (key, value) in params {
                req = req.param(key, value);
            }
            if text {
                req = req.text();
            }
            RemoteExecutor::from_config(&cfg).execute(&req).await
        }
        Commands::Classify { file } => {
            let body = match file {
                Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
                    buf
                }
            };
            classify(&body)
        }
        Commands::Kick {
            license,
            source,
            reason,
            staff_license,
            staff_name,
        } => {
            let status = OnlineStatus::online(server()?, source);
            actions
                .kick_player(&staff_license, &staff_name, &license, &status, &reason)
                .await
        }
        Commands::Announce { message } => actions.server_announcement(&server()?, &message).await,
        Commands::StaffChat { message, staff_license } => {
            actions.staff_chat(&server()?, &staff_license, &message).await
        }
        Commands::Revive {
            license,
            source,
            staff_license,
        } => {
            let status = OnlineStatus::online(server()?, source);
            actions.revive_player(&staff_license, &license, &status).await
        }
        Commands::QueuePosition { license, position } => {
            actions.update_queue_position(&server()?, &license, position).await
        }
        Commands::Screenshot {
            source,
            no_html,
            lifespan,
            duration,
        } => match duration {
            Some(secs) => actions.create_screen_capture(&server()?, source, secs).await,
            None => actions.create_screenshot(&server()?, source, !no_html, lifespan).await,
        },
        Commands::Fetch { file } => {
            let server = server()?;
            if file.trim_end_matches(".txt") == "crafting" {
                match actions.crafting_recipes(&server).await {
                    Some(text) => RemoteCommandResult::success(text, None),
                    None => RemoteCommandResult::failure("Failed to load crafting.txt"),
                }
            } else {
                let data_file: DataFile = file.parse()?;
                match actions.fetch_data(&server, data_file).await {
                    Some(data) => RemoteCommandResult::success(data_file.path(), Some(data)),
                    None => RemoteCommandResult::failure(format!("Failed to load {}", data_file.path())),
                }
            }
        }
    };

    info!(success = result.is_success(), "command finished");
    print_result(&result)
}
