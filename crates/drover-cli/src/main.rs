use clap::Parser;
use colored::Colorize;
use drover_core::{Job, LaunchOutcome, Registry, Settings, Supervisor, config};

mod args;
mod render;

use args::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let registry = Registry::open(config::state_dir()).await?;
    tracing::debug!(root = %registry.root().display(), "registry open");
    let sup = Supervisor::new(registry, Settings::from_env());

    // Bare invocation falls through to the full status table.
    let command = cli.command.unwrap_or(Command::Status {
        alias: None,
        verbose: false,
        json: false,
    });

    match command {
        Command::Status {
            alias: None,
            verbose,
            json,
        } => {
            let jobs = sup.registry().list().await?;
            let mut rows = Vec::with_capacity(jobs.len());
            for job in &jobs {
                rows.push(job.snapshot().await?);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                render::print_table(&rows, verbose);
            }
        }

        Command::Status {
            alias: Some(alias),
            verbose,
            json,
        }
        | Command::Show {
            alias,
            verbose,
            json,
        } => {
            show_one(&sup, &alias, verbose, json).await?;
        }

        Command::Run {
            name,
            check,
            command,
        } => {
            let line = command.join(" ");
            match sup.launch(&line, name.as_deref(), check).await? {
                LaunchOutcome::Detached(job) => println!("Started job {}", job.id()),
                LaunchOutcome::FailedFast { job, code, stderr } => {
                    eprint!("{stderr}");
                    eprintln!(
                        "{}",
                        format!("Job {} died immediately with code {code}", job.id()).red()
                    );
                    std::process::exit(1);
                }
            }
        }

        Command::Logs {
            alias,
            stderr,
            follow,
        } => {
            let job = sup.registry().resolve(&alias).await?;
            let path = if stderr {
                job.stderr_path()
            } else {
                job.stdout_path()
            };
            if !path.exists() {
                anyhow::bail!("no output captured for job {} yet", job.id());
            }
            let (pager, pager_args) = if follow {
                ("tail", vec!["-f"])
            } else {
                ("cat", vec![])
            };
            let status = tokio::process::Command::new(pager)
                .args(&pager_args)
                .arg(&path)
                .status()
                .await?;
            if !status.success() {
                std::process::exit(status.code().unwrap_or(1));
            }
        }

        Command::Pause { alias } => {
            let job = sup.registry().resolve(&alias).await?;
            sup.pause(&job).await?;
            println!("Paused job {}", job.id());
        }

        Command::Resume { alias } => {
            let job = sup.registry().resolve(&alias).await?;
            sup.resume(&job).await?;
            println!("Resumed job {}", job.id());
        }

        Command::Signal { alias, signum } => {
            let job = sup.registry().resolve(&alias).await?;
            sup.signal(&job, signum).await?;
            println!("Sent signal {signum} to job {}", job.id());
        }

        Command::Kill { aliases, all } => {
            let jobs = if all {
                sup.registry().list().await?
            } else {
                resolve_many(&sup, &aliases).await?
            };
            let killed = sup.kill(&jobs).await?;
            println!("Killed {killed} job(s)");
        }

        Command::Clean {
            alias: Some(alias), ..
        } => {
            let job = sup.registry().resolve(&alias).await?;
            let id = job.id();
            if sup.clean_one(&job).await? {
                println!("Removed job {id}");
            }
        }

        Command::Clean { alias: None, failed } => {
            let removed = sup.clean_all(failed).await?;
            println!("Cleaned {removed} job record(s)");
        }

        Command::Restart { alias } => {
            let job = sup.registry().resolve(&alias).await?;
            if let LaunchOutcome::Detached(fresh) = sup.restart(job).await? {
                println!("Restarted as job {}", fresh.id());
            }
        }

        Command::Shepherd { id } => {
            sup.supervise(id).await?;
        }
    }

    Ok(())
}

async fn show_one(sup: &Supervisor, alias: &str, verbose: bool, json: bool) -> anyhow::Result<()> {
    let job = sup.registry().resolve(alias).await?;
    let snap = job.snapshot().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
    } else {
        render::print_detail(&job, &snap, verbose);
    }
    Ok(())
}

async fn resolve_many(sup: &Supervisor, aliases: &[String]) -> drover_core::Result<Vec<Job>> {
    let mut jobs = Vec::with_capacity(aliases.len());
    for alias in aliases {
        jobs.push(sup.registry().resolve(alias).await?);
    }
    Ok(jobs)
}
