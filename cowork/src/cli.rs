use clap::{Args, Parser, Subcommand};

/// Cowork - an assistant that works inside your workspace
#[derive(Parser, Debug)]
#[command(name = "cowork")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub options: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for values otherwise read from the environment / `.env`.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Workspace directory (default: COWORK_WORKSPACE or the current directory)
    #[arg(long, short = 'w', global = true, value_name = "DIR")]
    pub workspace: Option<String>,

    /// Model name (default: COWORK_MODEL, inferred from the API base)
    #[arg(long, short = 'm', global = true)]
    pub model: Option<String>,

    /// OpenAI-compatible or Anthropic API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_base: Option<String>,

    /// API key (default: COWORK_API_KEY / OPENAI_API_KEY)
    #[arg(long, global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Never ask the model for a task plan
    #[arg(long, global = true)]
    pub no_plan: bool,

    /// Show tool arguments and full results
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat. `/exit` quits, `/clear` resets, `/name args` invokes a skill
    Chat,

    /// Send a single message and print the reply
    Run {
        /// Message text; `/name args` invokes a skill
        #[arg(value_name = "MESSAGE", required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// List discovered skills
    Skills {
        /// Print the skills section exactly as the model sees it
        #[arg(long)]
        docs: bool,
    },

    /// Print the built-in tool catalogue
    Tools,
}
