use clap::{Parser, Subcommand};

/// drover - run shell commands as minded background jobs
#[derive(Parser, Debug)]
#[command(name = "drover")]
#[command(version)]
#[command(about = "Run and mind background jobs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show all jobs, or one job in detail
    Status {
        /// Job id or name
        alias: Option<String>,

        /// Include the command column and live process details
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,

        /// Emit JSON instead of a table
        #[arg(long = "json")]
        json: bool,
    },

    /// Show one job in detail
    Show {
        /// Job id or name
        alias: String,

        #[arg(short = 'v', long = "verbose")]
        verbose: bool,

        #[arg(long = "json")]
        json: bool,
    },

    /// Launch a command as a new background job
    Run {
        /// Name the job instead of addressing it by id
        #[arg(short = 'n', long = "name")]
        name: Option<String>,

        /// Linger briefly and report if the command dies right away
        #[arg(long = "check")]
        check: bool,

        /// Command line, run under the user's shell
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print or follow a job's captured output
    Logs {
        /// Job id or name
        alias: String,

        /// Read the stderr sink instead of stdout
        #[arg(short = 'e', long = "stderr")]
        stderr: bool,

        /// Keep following the sink as it grows
        #[arg(short = 'f', long = "follow")]
        follow: bool,
    },

    /// Suspend a running job
    Pause {
        /// Job id or name
        alias: String,
    },

    /// Continue a paused job
    Resume {
        /// Job id or name
        alias: String,
    },

    /// Send an arbitrary signal to a job's process
    Signal {
        /// Job id or name
        alias: String,

        /// Signal number, e.g. 15 for SIGTERM
        signum: i32,
    },

    /// Terminate jobs, keeping their records for inspection
    Kill {
        /// Jobs to kill
        #[arg(required_unless_present = "all")]
        aliases: Vec<String>,

        /// Kill every active job
        #[arg(short = 'a', long = "all", conflicts_with = "aliases")]
        all: bool,
    },

    /// Remove finished job records
    Clean {
        /// Remove this one record instead of sweeping
        alias: Option<String>,

        /// Sweep failed jobs too, not just successful ones
        #[arg(long = "failed", conflicts_with = "alias")]
        failed: bool,
    },

    /// Stop a job if needed and run its command again under a fresh id
    Restart {
        /// Job id or name
        alias: String,
    },

    /// Supervise one job record until its process exits
    #[command(hide = true)]
    Shepherd { id: u64 },
}
