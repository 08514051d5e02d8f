use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output logs as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Provide custom config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set proxy
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set request headers
    #[arg(required = false, long, short = 'H', global = true)]
    pub header: Option<Vec<String>>,

    /// Set user agent
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync repository indexes
    #[clap(name = "sync", visible_alias = "S")]
    Sync {
        /// Repositories to sync, by id, name or address (default: all enabled)
        #[arg(required = false, short, long)]
        repo: Option<Vec<String>>,

        /// Sync even if the sync interval has not elapsed
        #[arg(required = false, short, long)]
        force: bool,

        /// Allow releases newer than the suggested version to be selected
        #[arg(required = false, short, long)]
        unstable: bool,
    },

    /// List repositories
    #[clap(name = "repos", visible_alias = "r")]
    Repos,

    /// List synced products
    #[clap(name = "products", visible_alias = "ls")]
    Products {
        /// Only show products containing this text in their name or package name
        #[arg(required = false)]
        query: Option<String>,

        /// Only show products of this repository
        #[arg(required = false, short, long)]
        repo: Option<String>,

        /// Maximum number of products to show
        #[arg(required = false, short, long)]
        limit: Option<i64>,
    },

    /// Add a repository
    #[command(arg_required_else_help = true)]
    #[clap(name = "add")]
    Add {
        /// Base address of the repository
        address: String,

        /// Expected signing certificate fingerprint (trusted on first sync when omitted)
        #[arg(required = false, short, long)]
        fingerprint: Option<String>,

        /// Username for HTTP basic authentication
        #[arg(required = false, short, long)]
        username: Option<String>,

        /// Password for HTTP basic authentication
        #[arg(required = false, short, long, requires = "username")]
        password: Option<String>,
    },

    /// Edit a repository
    #[command(arg_required_else_help = true)]
    #[clap(name = "edit")]
    Edit {
        /// Repository id, name or address
        repo: String,

        /// New base address
        #[arg(required = false, short, long)]
        address: Option<String>,

        /// New expected fingerprint, empty to trust the next signer
        #[arg(required = false, short, long)]
        fingerprint: Option<String>,

        /// Username for HTTP basic authentication
        #[arg(required = false, short, long)]
        username: Option<String>,

        /// Password for HTTP basic authentication
        #[arg(required = false, short, long, requires = "username")]
        password: Option<String>,
    },

    /// Enable a repository
    #[command(arg_required_else_help = true)]
    #[clap(name = "enable")]
    Enable {
        /// Repository id, name or address
        repo: String,
    },

    /// Disable a repository and drop its catalog
    #[command(arg_required_else_help = true)]
    #[clap(name = "disable")]
    Disable {
        /// Repository id, name or address
        repo: String,
    },

    /// Remove a repository
    #[command(arg_required_else_help = true)]
    #[clap(name = "remove", visible_alias = "rm")]
    Remove {
        /// Repository id, name or address
        repo: String,
    },

    /// Print paths in use
    #[clap(name = "env")]
    Env,

    /// Generate default config
    #[clap(name = "defconfig")]
    DefConfig,
}
