mod cli;

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Commands};
use quay::gateway::{CreateService, Gateway, HttpGateway};
use quay::view::CategoryFilter;
use quay::{Category, Config, Notice, NoticeLevel, TilingProfile, Workspace};
use tokio::sync::broadcast;
use tracing::{info, warn};

const MUTATION_OUTCOME_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load_from(path)?;
            config.validate()?;
            config
        }
        None => Config::load()?,
    };
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    config.verbose = cli.verbose;

    match cli.command {
        Commands::Watch {
            query,
            category,
            maximize,
            width,
        } => {
            watch(&config, query, &category, maximize, width).await?;
        }

        Commands::Status => {
            status(&config).await?;
        }

        Commands::Enable { id } => {
            let workspace = Workspace::connect(&config)?;
            run_mutation(&workspace, &id, workspace.set_enabled(&id, true)).await?;
            workspace.shutdown().await;
        }

        Commands::Disable { id } => {
            let workspace = Workspace::connect(&config)?;
            run_mutation(&workspace, &id, workspace.set_enabled(&id, false)).await?;
            workspace.shutdown().await;
        }

        Commands::Start { id } => {
            let workspace = Workspace::connect(&config)?;
            run_mutation(&workspace, &id, workspace.start_container(&id)).await?;
            workspace.shutdown().await;
        }

        Commands::Stop { id } => {
            let workspace = Workspace::connect(&config)?;
            run_mutation(&workspace, &id, workspace.stop_container(&id)).await?;
            workspace.shutdown().await;
        }

        Commands::Restart { id } => {
            let workspace = Workspace::connect(&config)?;
            run_mutation(&workspace, &id, workspace.restart_container(&id)).await?;
            workspace.shutdown().await;
        }

        Commands::Create {
            name,
            category,
            image,
            tag,
            description,
            icon,
            ports,
            env,
            volumes,
            health_check,
        } => {
            let spec = CreateService {
                name,
                category,
                image,
                tag,
                description,
                icon,
                ports,
                env_vars: parse_env_vars(&env)?,
                volumes,
                health_check,
            };
            let workspace = Workspace::connect(&config)?;
            let mut notices = workspace.notices();
            workspace.create_service(spec).await?;
            await_outcome(&mut notices, None).await?;
            workspace.shutdown().await;
        }

        Commands::SaveLayout {
            name,
            query,
            category,
        } => {
            save_layout(&config, name, query, &category).await?;
        }

        Commands::Logs { id, tail } => {
            let gateway = HttpGateway::new(config.api_url.as_str());
            let logs = gateway
                .container_logs(&id, tail)
                .await
                .with_context(|| format!("Failed to fetch logs for {id}"))?;
            println!("{logs}");
        }

        Commands::Stats { id } => {
            let gateway = HttpGateway::new(config.api_url.as_str());
            let stats = gateway
                .container_stats(&id)
                .await
                .with_context(|| format!("Failed to fetch stats for {id}"))?;
            println!("CPU:    {:.2}%", stats.cpu_percent);
            println!("Memory: {:.2} MB ({:.2}%)", stats.memory_usage_mb, stats.memory_percent);
        }
    }

    Ok(())
}

/// Live mode: render the tiled board on every directory replace and print
/// notices as they arrive, until Ctrl-C.
async fn watch(
    config: &Config,
    query: String,
    category: &str,
    maximize: Option<String>,
    width: u32,
) -> Result<()> {
    let mut workspace = Workspace::connect(config)?;
    workspace.set_profile(TilingProfile::for_width(width));
    workspace.set_query(query);
    workspace.set_category(parse_category_filter(category));
    if let Some(id) = maximize {
        workspace.toggle_maximize(&id);
    }

    let mut directory = workspace.directory_changes();
    let mut notices = workspace.notices();
    info!("Watching workspace at {}", config.api_url);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = directory.changed() => {
                if changed.is_err() {
                    break;
                }
                render_board(&mut workspace);
            }
            notice = notices.recv() => match notice {
                Ok(notice) => print_notice(&notice),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Skipped {skipped} notices");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    info!("Shutting down workspace");
    workspace.shutdown().await;
    Ok(())
}

/// One-shot directory table, no engine.
async fn status(config: &Config) -> Result<()> {
    let gateway = HttpGateway::new(config.api_url.as_str());
    let services = gateway
        .list_services()
        .await
        .context("Failed to fetch services")?;

    if services.is_empty() {
        info!("No services registered");
        return Ok(());
    }

    println!(
        "{:<15} {:<20} {:<14} {:<9} {:<8} {:<15} {}",
        "ID", "NAME", "CATEGORY", "STATUS", "ENABLED", "CONTAINER", "PORTS"
    );
    println!("{}", "─".repeat(100));

    let enabled = services.iter().filter(|s| s.enabled).count();
    for service in &services {
        let container = service
            .container_id
            .as_deref()
            .map(|id| id.chars().take(12).collect::<String>())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<15} {:<20} {:<14} {:<9} {:<8} {:<15} {}",
            service.id,
            service.name,
            service.category,
            service.status,
            if service.enabled { "yes" } else { "no" },
            container,
            service.ports.join(", ")
        );
    }

    println!();
    println!("Active services: {enabled} / {}", services.len());
    Ok(())
}

/// Persist the layout the current filter would produce.
async fn save_layout(
    config: &Config,
    name: Option<String>,
    query: String,
    category: &str,
) -> Result<()> {
    let mut workspace = Workspace::connect(config)?;
    workspace.set_query(query);
    workspace.set_category(parse_category_filter(category));

    // Wait for the startup fetch so the layout reflects the remote state.
    let mut directory = workspace.directory_changes();
    tokio::time::timeout(MUTATION_OUTCOME_TIMEOUT, directory.changed())
        .await
        .context("Timed out waiting for the first directory fetch")?
        .context("Sync engine stopped before the first fetch")?;

    let panels = workspace.layout().len();
    workspace.save_layout(name).await?;
    info!("✅ Layout saved ({panels} panels)");
    workspace.shutdown().await;
    Ok(())
}

/// Issue one mutation and report its optimistic notice sequence.
async fn run_mutation(
    workspace: &Workspace,
    id: &str,
    send: impl Future<Output = quay::Result<()>>,
) -> Result<()> {
    let mut notices = workspace.notices();
    send.await?;
    await_outcome(&mut notices, Some(id)).await
}

/// Print notices until the targeted mutation reports success or failure.
async fn await_outcome(
    notices: &mut broadcast::Receiver<Notice>,
    service: Option<&str>,
) -> Result<()> {
    let outcome = tokio::time::timeout(MUTATION_OUTCOME_TIMEOUT, async {
        loop {
            match notices.recv().await {
                Ok(notice) => {
                    print_notice(&notice);
                    let targeted = service.is_none() || notice.service.as_deref() == service;
                    if targeted {
                        match notice.level {
                            NoticeLevel::Success => return Ok(()),
                            NoticeLevel::Failure => bail!("{}", notice.message),
                            _ => {}
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => bail!("Notice stream closed"),
            }
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_) => bail!("Timed out waiting for mutation outcome"),
    }
}

fn render_board(workspace: &mut Workspace) {
    let snapshot = workspace.snapshot();
    let visible = workspace.visible();
    let layout = workspace.layout();

    println!();
    println!(
        "Active services: {} / {}",
        snapshot.enabled_count(),
        snapshot.len()
    );

    if layout.is_empty() {
        println!("No active services. Enable services or add a new one to get started.");
        return;
    }

    println!(
        "{:<7} {:<7} {:<20} {:<14} {:<9} {}",
        "CELL", "SIZE", "SERVICE", "CATEGORY", "STATUS", "URL"
    );
    println!("{}", "─".repeat(80));

    for entry in &layout {
        let Some(service) = visible.iter().find(|s| s.id == entry.id) else {
            continue;
        };
        println!(
            "{:<7} {:<7} {:<20} {:<14} {:<9} {}",
            format!("{},{}", entry.x, entry.y),
            format!("{}x{}", entry.w, entry.h),
            service.name,
            service.category,
            service.status,
            service.primary_url().unwrap_or_else(|| "-".to_string())
        );
    }
}

fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Info => "ℹ️ ",
        NoticeLevel::Pending => "⏳",
        NoticeLevel::Success => "✅",
        NoticeLevel::Failure => "❌",
    };
    match &notice.service {
        Some(id) => println!("{} {tag} {id}: {}", notice.at.format("%H:%M:%S"), notice.message),
        None => println!("{} {tag} {}", notice.at.format("%H:%M:%S"), notice.message),
    }
}

fn parse_category_filter(raw: &str) -> CategoryFilter {
    if raw.eq_ignore_ascii_case("all") {
        CategoryFilter::All
    } else {
        CategoryFilter::Only(Category::from(raw.to_string()))
    }
}

fn parse_env_vars(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut env_vars = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid environment variable '{pair}' (expected KEY=value)");
        };
        env_vars.insert(key.to_string(), value.to_string());
    }
    Ok(env_vars)
}
