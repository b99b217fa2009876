use clap::{Parser, Subcommand};
use clap_complete::Shell;
use saltkit::{BatchPolicy, MatchType};

#[derive(Parser)]
#[command(name = "saltpipe")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Drive SaltStack deployments through salt-api", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// salt-api base URL
    #[arg(long, env = "SALT_URL", global = true)]
    pub endpoint: Option<String>,

    /// Id of the credentials entry in config.toml
    #[arg(long, env = "SALT_CREDENTIALS", global = true)]
    pub credentials: Option<String>,

    /// How targets are matched against minion ids
    #[arg(long, global = true, default_value = "compound", value_parser = parse_match_type)]
    pub match_type: MatchType,

    /// Rolling batch size: a count ("10") or a percentage ("25%")
    #[arg(long, global = true)]
    pub batch: Option<BatchPolicy>,

    /// Report failed resources and keep going instead of stopping
    #[arg(long, global = true)]
    pub no_fail: bool,

    /// Only show resources that changed something
    #[arg(long, global = true)]
    pub only_changes: bool,

    /// Ask before stopping on a failed resource ("true" to enable)
    #[arg(
        long,
        env = "ASK_ON_ERROR",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = parse_flag
    )]
    pub ask_on_error: Option<bool>,

    /// Seconds to wait for an answer before stopping
    #[arg(long, global = true)]
    pub escalation_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply one or more states (state.sls)
    State {
        /// Target expression
        target: String,

        /// States to apply
        #[arg(required = true)]
        states: Vec<String>,
    },

    /// Apply the highstate
    Highstate {
        /// Target expression
        target: String,

        /// Show per-node results
        #[arg(long)]
        print: bool,
    },

    /// Run a shell command (cmd.run)
    Cmd {
        /// Target expression
        target: String,

        /// Command line
        command: String,

        /// Do not verify that the command completed on every node
        #[arg(long)]
        no_check: bool,
    },

    /// Run any execution module function
    Run {
        /// Target expression
        target: String,

        /// Function name, e.g. service.restart
        function: String,

        /// Positional arguments (JSON values or plain strings)
        args: Vec<String>,

        /// Show per-node results
        #[arg(long)]
        print: bool,
    },

    /// Sync custom modules to minions (saltutil.sync_all)
    Sync {
        /// Target expression
        target: String,

        /// Show per-node results
        #[arg(long)]
        print: bool,
    },

    /// Run an orchestration on the master
    Orchestrate {
        /// Orchestration SLS name
        name: String,
    },

    /// Generate and accept a minion key on the master
    Keygen {
        /// Minion id
        host: String,

        /// Key size in bits
        #[arg(long, default_value_t = 4096)]
        keysize: u32,
    },

    /// Create reclass metadata for a new node
    Metadata {
        /// Minion id of the new node
        host: String,

        /// Class to include (repeatable)
        #[arg(long = "class")]
        classes: Vec<String>,

        /// Parameter as key=value (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,

        /// Target of the salt master holding the reclass model
        #[arg(long, default_value = "I@salt:master")]
        master: String,
    },

    /// List minions answering test.ping
    Minions {
        /// Target expression
        #[arg(default_value = "*")]
        target: String,
    },

    /// Show a pillar value per minion
    Pillar {
        /// Target expression
        target: String,

        /// Pillar key, e.g. _param:cluster_domain
        key: String,
    },

    /// Show a grain per minion
    Grain {
        /// Target expression
        target: String,

        /// Grain name
        key: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_match_type(value: &str) -> Result<MatchType, String> {
    MatchType::from_name(value).ok_or_else(|| format!("unknown match type '{value}'"))
}

/// Boolean-as-string: only "true" (any case) enables.
fn parse_flag(value: &str) -> Result<bool, String> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}
