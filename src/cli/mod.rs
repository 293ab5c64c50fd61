use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quay")]
#[command(about = "Live tiling control surface for containerized services")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Orchestration API base URL (overrides config file)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the workspace: live tiled board plus notifications
    Watch {
        /// Free-text filter over name, description, and category
        #[arg(short, long, default_value = "")]
        query: String,

        /// Category filter ("all" shows every category)
        #[arg(long, default_value = "all")]
        category: String,

        /// Start with this service maximized
        #[arg(short, long)]
        maximize: Option<String>,

        /// Viewport width in pixels, selects the tiling breakpoint
        #[arg(long, default_value_t = 1280)]
        width: u32,
    },

    /// One-shot service directory table
    Status,

    /// Enable a service (adds its panel to the tiled workspace)
    Enable {
        /// Service id
        id: String,
    },

    /// Disable a service (keeps it in the directory, hides its panel)
    Disable {
        /// Service id
        id: String,
    },

    /// Start a service's container
    Start {
        /// Service id
        id: String,
    },

    /// Stop a service's container
    Stop {
        /// Service id
        id: String,
    },

    /// Restart a service's container
    Restart {
        /// Service id
        id: String,
    },

    /// Register a new service with the orchestration API
    Create {
        /// Display name
        #[arg(long)]
        name: String,

        /// Category (database, storage, automation, ...)
        #[arg(long)]
        category: String,

        /// Container image
        #[arg(long)]
        image: String,

        /// Image tag
        #[arg(long, default_value = "latest")]
        tag: String,

        /// Short description
        #[arg(long)]
        description: Option<String>,

        /// Symbolic icon name
        #[arg(long, default_value = "Box")]
        icon: String,

        /// Port mappings (host:container)
        #[arg(short, long)]
        ports: Vec<String>,

        /// Environment variables (KEY=value)
        #[arg(short, long)]
        env: Vec<String>,

        /// Volume mounts (name:path)
        #[arg(long)]
        volumes: Vec<String>,

        /// Health check path
        #[arg(long)]
        health_check: Option<String>,
    },

    /// Persist the current tiled layout as a named snapshot
    SaveLayout {
        /// Snapshot name (defaults to a timestamped name)
        #[arg(short, long)]
        name: Option<String>,

        /// Free-text filter applied before computing the layout
        #[arg(short, long, default_value = "")]
        query: String,

        /// Category filter applied before computing the layout
        #[arg(long, default_value = "all")]
        category: String,
    },

    /// Show a container's recent logs
    Logs {
        /// Service id
        id: String,

        /// Number of log lines to fetch
        #[arg(long, default_value_t = 100)]
        tail: u32,
    },

    /// Show a container's live resource usage
    Stats {
        /// Service id
        id: String,
    },
}
