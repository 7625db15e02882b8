//! Flowdeck - API tester console runtime
//!
//! CLI entry point for the endpoint catalog, the auth session and the flow
//! view.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use serde_json::{Value, json};
use tracing::{debug, info};

use flowdeck::cli::{Cli, Command, EndpointsCommand, FlowsCommand, OutputFormat};
use flowdeck::config::Config;
use flowdeck::endpoints::{EndpointDescriptor, SearchField, SearchOptions};
use flowdeck::events::topics;
use flowdeck::flow::Flow;
use flowdeck::http::StaticDirClient;
use flowdeck::logging::{Level, StorageLogger};
use flowdeck::runtime::Runtime;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Level) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = flowdeck::cli::get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => match config_log_level {
            Level::Trace => tracing::Level::TRACE,
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warn => tracing::Level::WARN,
            Level::Error | Level::Fatal | Level::Off => tracing::Level::ERROR,
        },
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.logging.level).context("Failed to setup logging")?;
    config.validate().context("Invalid configuration")?;

    let runtime = build_runtime(config, cli.static_dir.as_deref());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Endpoints { command } => match command {
            EndpointsCommand::List { category, format } => cmd_endpoints_list(&runtime, category.as_deref(), format).await,
            EndpointsCommand::Search {
                query,
                fields,
                exact,
                case_sensitive,
            } => cmd_endpoints_search(&runtime, &query, fields, exact, case_sensitive).await,
            EndpointsCommand::Show { id } => cmd_endpoints_show(&runtime, &id).await,
            EndpointsCommand::Add { json } => cmd_endpoints_add(&runtime, &json),
            EndpointsCommand::Remove { id } => cmd_endpoints_remove(&runtime, &id),
        },
        Command::Login { email, password } => {
            cmd_login(&runtime, json!({"email": email, "password": password}), false).await
        }
        Command::Register { email, password, name } => {
            let mut body = json!({"email": email, "password": password});
            if let Some(name) = name {
                body["name"] = Value::String(name);
            }
            cmd_login(&runtime, body, true).await
        }
        Command::Logout => cmd_logout(&runtime).await,
        Command::Whoami { offline } => cmd_whoami(&runtime, offline).await,
        Command::Logs { limit, clear } => cmd_logs(&runtime, limit, clear),
        Command::Flows { command } => match command {
            FlowsCommand::Show { file, active } => cmd_flows_show(&runtime, &file, active.as_deref()),
        },
    }
}

fn build_runtime(config: Config, static_dir: Option<&Path>) -> Runtime {
    debug!(?static_dir, "build_runtime: called");
    let builder = Runtime::builder(config);
    match static_dir {
        Some(dir) => builder.http(Arc::new(StaticDirClient::new(dir))).build(),
        None => builder.build(),
    }
}

/// Load the catalog, reporting retries on stderr
async fn load_catalog(runtime: &Runtime) -> Result<Arc<flowdeck::EndpointManager>> {
    let manager = runtime.endpoints()?;
    let bus = runtime.event_bus()?;
    let retry = bus.subscribe(topics::ENDPOINTS_RETRY, |payload: &Value| {
        eprintln!(
            "{} {}",
            "…".yellow(),
            payload["message"].as_str().unwrap_or("Retrying endpoint load")
        );
        Ok(())
    });

    let result = manager.load_endpoints().await;
    retry.unsubscribe();
    let source = result.context("Failed to load endpoints")?;
    info!(%source, "load_catalog: endpoints loaded");
    Ok(manager)
}

fn print_endpoint_line(endpoint: &EndpointDescriptor) {
    let method = match endpoint.method.as_str() {
        "GET" => endpoint.method.green(),
        "POST" => endpoint.method.yellow(),
        "DELETE" => endpoint.method.red(),
        _ => endpoint.method.cyan(),
    };
    let custom = if endpoint.is_custom { " (custom)".dimmed().to_string() } else { String::new() };
    println!("  {:<7} {:<40} {}{}", method, endpoint.path, endpoint.name, custom);
}

async fn cmd_endpoints_list(runtime: &Runtime, category: Option<&str>, format: OutputFormat) -> Result<()> {
    debug!(?category, ?format, "cmd_endpoints_list: called");
    let manager = load_catalog(runtime).await?;

    let endpoints = match category {
        Some(category) => manager.endpoints_by_category(category),
        None => manager.endpoints(),
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&endpoints)?);
        return Ok(());
    }

    if endpoints.is_empty() {
        println!("No endpoints found");
        return Ok(());
    }

    let source = manager.source().map(|s| s.to_string()).unwrap_or_default();
    println!("{} endpoints ({})", endpoints.len(), source.dimmed());
    for (name, group) in flowdeck::endpoints::group_by_category(&endpoints) {
        println!("{}", name.cyan().bold());
        for endpoint in &group {
            print_endpoint_line(endpoint);
        }
    }
    Ok(())
}

async fn cmd_endpoints_search(
    runtime: &Runtime,
    query: &str,
    fields: Vec<SearchField>,
    exact: bool,
    case_sensitive: bool,
) -> Result<()> {
    debug!(%query, ?fields, exact, case_sensitive, "cmd_endpoints_search: called");
    let manager = load_catalog(runtime).await?;

    let mut options = SearchOptions {
        exact,
        case_sensitive,
        ..Default::default()
    };
    if !fields.is_empty() {
        options.fields = fields;
    }

    let matches = manager.search_endpoints(query, &options);
    if matches.is_empty() {
        println!("No endpoints match '{}'", query);
        return Ok(());
    }
    for endpoint in &matches {
        print_endpoint_line(endpoint);
    }
    Ok(())
}

async fn cmd_endpoints_show(runtime: &Runtime, id: &str) -> Result<()> {
    debug!(%id, "cmd_endpoints_show: called");
    let manager = load_catalog(runtime).await?;
    let endpoint = manager
        .endpoint_by_id(id)
        .ok_or_else(|| eyre::eyre!("Endpoint not found: {}", id))?;
    println!("{}", serde_json::to_string_pretty(&endpoint)?);
    Ok(())
}

fn cmd_endpoints_add(runtime: &Runtime, raw: &str) -> Result<()> {
    debug!("cmd_endpoints_add: called");
    let value: Value = serde_json::from_str(raw).context("Endpoint must be a JSON object")?;
    let endpoint = runtime.endpoints()?.add_custom_endpoint(value)?;
    println!(
        "{} Added custom endpoint: {} {} ({})",
        "✓".green(),
        endpoint.method,
        endpoint.path,
        endpoint.id.cyan()
    );
    Ok(())
}

fn cmd_endpoints_remove(runtime: &Runtime, id: &str) -> Result<()> {
    debug!(%id, "cmd_endpoints_remove: called");
    let endpoint = runtime.endpoints()?.remove_custom_endpoint(id)?;
    println!("{} Removed custom endpoint: {} {}", "✓".green(), endpoint.method, endpoint.path);
    Ok(())
}

async fn cmd_login(runtime: &Runtime, body: Value, register: bool) -> Result<()> {
    debug!(register, "cmd_login: called");
    let auth = runtime.auth()?;
    auth.init();

    let session = if register {
        auth.register(body).await.context("Registration failed")?
    } else {
        auth.login(body).await.context("Login failed")?
    };

    let who = session
        .user
        .as_ref()
        .and_then(|u| u.get("email").or_else(|| u.get("name")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(session.last_email)
        .unwrap_or_else(|| "unknown user".to_string());
    let verb = if register { "Registered" } else { "Logged in" };
    println!("{} {} as {}", "✓".green(), verb, who.cyan());
    Ok(())
}

async fn cmd_logout(runtime: &Runtime) -> Result<()> {
    debug!("cmd_logout: called");
    let auth = runtime.auth()?;
    auth.init();
    if !auth.is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }
    auth.logout().await;
    println!("{} Logged out", "✓".green());
    Ok(())
}

async fn cmd_whoami(runtime: &Runtime, offline: bool) -> Result<()> {
    debug!(offline, "cmd_whoami: called");
    let auth = runtime.auth()?;
    auth.init();
    if !auth.is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }

    let user = if offline {
        auth.current_user().unwrap_or(Value::Null)
    } else {
        match auth.get_profile().await {
            Ok(user) => user,
            Err(e) if e.is_unauthorized() => {
                println!("{} Session expired, log in again", "✗".red());
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to fetch profile"),
        }
    };
    println!("{}", serde_json::to_string_pretty(&user)?);
    Ok(())
}

fn cmd_logs(runtime: &Runtime, limit: usize, clear: bool) -> Result<()> {
    debug!(limit, clear, "cmd_logs: called");
    let config = runtime.config()?;
    let logs = StorageLogger::new(
        &config.logging.context,
        config.logging.level,
        runtime.storage()?,
        &config.logging.storage_key,
        config.logging.max_log_size,
    );

    if clear {
        logs.clear();
        println!("{} Cleared persisted logs", "✓".green());
        return Ok(());
    }

    let entries = logs.entries();
    if entries.is_empty() {
        println!("No persisted logs");
        return Ok(());
    }
    for entry in entries.iter().take(limit) {
        let level = match entry.level {
            Level::Error | Level::Fatal => entry.level.as_str().red(),
            Level::Warn => entry.level.as_str().yellow(),
            _ => entry.level.as_str().normal(),
        };
        println!(
            "{} {:<5} [{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            level,
            entry.context,
            entry.message
        );
    }
    Ok(())
}

fn cmd_flows_show(runtime: &Runtime, file: &Path, active: Option<&str>) -> Result<()> {
    debug!(?file, ?active, "cmd_flows_show: called");
    let content = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;
    let raw: Value = serde_json::from_str(&content).context("Flow file is not valid JSON")?;
    let raw = match raw {
        Value::Object(mut map) => map.remove("flows").unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    let flows: Vec<Flow> = serde_json::from_value(raw).context("Invalid flow definitions")?;

    let ui = runtime.flow_ui()?;
    let bus = runtime.event_bus()?;
    bus.emit(topics::FLOWS_LOADED, json!({"flows": flows}))?;
    if let Some(id) = active {
        let flow = flows
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| eyre::eyre!("Flow not found: {}", id))?;
        bus.emit(topics::FLOW_ACTIVATED, json!({"flow": flow}))?;
    }

    let config = runtime.config()?;
    for container in [&config.ui.flow_list_container, &config.ui.flow_steps_container] {
        if let Some(text) = ui.render_text(container) {
            if !text.is_empty() {
                println!("{}", text);
            }
        }
    }
    Ok(())
}
