mod api;
mod flows;
mod models;
mod session;
mod tui;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};

use api::{DEFAULT_BASE_URL, HttpGateway};
use flows::{
    ApplyCard, ApplyState, EMPTY_LISTING_TEXT, ListingFlow, ListingState, LoginFlow, LoginState,
    Nav,
};
use session::{FileSession, MemorySession, SessionIdentity, SessionStore};

#[derive(Parser)]
#[command(name = "applicant")]
#[command(about = "Hiring challenge client - log in, browse open positions, apply with a repo URL")]
struct Cli {
    /// API base URL (falls back to APPLICANT_API_BASE_URL, then the built-in default)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Extra header sent with every request, as NAME:VALUE (repeatable)
    #[arg(long = "header", global = true, value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Keep the session in memory instead of the session file
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up your candidate record by email and start a session
    Login {
        /// Email address the server knows you by
        email: String,
    },

    /// List active job postings
    Jobs,

    /// Apply to a job with a GitHub repository URL
    Apply {
        /// Job ID from the listing
        job_id: i64,

        /// Repository URL (https://github.com/...)
        #[arg(short, long)]
        repo: String,
    },

    /// Show the stored session identity
    Whoami,

    /// Clear the stored session
    Logout,

    /// Browse positions and apply interactively
    Browse,
}

fn resolve_base_url(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var("APPLICANT_API_BASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

fn build_gateway(cli: &Cli) -> Result<HttpGateway> {
    let mut gateway = HttpGateway::new(resolve_base_url(cli.base_url.clone()));
    for raw in &cli.headers {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| anyhow!("Invalid header '{raw}': expected NAME:VALUE"))?;
        gateway = gateway.with_header(name.trim(), value.trim())?;
    }
    Ok(gateway)
}

fn open_store(ephemeral: bool) -> Result<Box<dyn SessionStore>> {
    if ephemeral {
        Ok(Box::new(MemorySession::new()))
    } else {
        Ok(Box::new(FileSession::open()?))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let gateway = build_gateway(&cli)?;
    let mut store = open_store(cli.ephemeral)?;

    match cli.command {
        Commands::Login { email } => {
            let mut flow = LoginFlow::new();
            flow.submit(&gateway, store.as_mut(), &email);
            match flow.state() {
                LoginState::Success(candidate) => {
                    println!(
                        "Logged in as {} {} <{}> (candidate #{})",
                        candidate.first_name,
                        candidate.last_name,
                        candidate.email,
                        candidate.candidate_id
                    );
                }
                LoginState::Failed(message) => bail!("{message}"),
                _ => bail!("Email address is required"),
            }
        }

        Commands::Jobs => {
            let mut flow = ListingFlow::new();
            if flow.mount(store.as_ref()) == Nav::ToLogin {
                bail!("No session found. Run 'applicant login <email>' first.");
            }
            flow.fetch(&gateway);
            match flow.state() {
                ListingState::Loaded(jobs) if jobs.is_empty() => {
                    println!("{EMPTY_LISTING_TEXT}");
                }
                ListingState::Loaded(jobs) => {
                    println!(
                        "{:<6} {:<32} {:<20} {:>6}",
                        "ID", "TITLE", "DEPARTMENT", "REQS"
                    );
                    println!("{}", "-".repeat(68));
                    for job in jobs {
                        println!(
                            "{:<6} {:<32} {:<20} {:>6}",
                            job.id,
                            truncate(&job.title, 30),
                            truncate(&job.department, 18),
                            job.requirements.len()
                        );
                    }
                }
                ListingState::Failed(message) => bail!("{message}"),
                _ => {}
            }
        }

        Commands::Apply { job_id, repo } => {
            let identity = SessionIdentity::load(store.as_ref())
                .ok_or_else(|| anyhow!("No session found. Run 'applicant login <email>' first."))?;

            let mut card = ApplyCard::new(job_id);
            card.set_repo_url(repo);
            card.submit(&gateway, identity.candidate_id);
            match card.state() {
                ApplyState::Success(message) => println!("{message}"),
                ApplyState::Error(message) => bail!("{message}"),
                _ => bail!("Repository URL is required"),
            }
        }

        Commands::Whoami => match SessionIdentity::load(store.as_ref()) {
            Some(identity) => {
                println!("Candidate #{}", identity.candidate_id);
                println!("Email: {}", identity.email);
                println!("Correlation id: {}", identity.uuid);
            }
            None => println!("No session. Run 'applicant login <email>' to start one."),
        },

        Commands::Logout => {
            store.clear();
            println!("Session cleared.");
        }

        Commands::Browse => {
            tui::run(&gateway, store.as_mut())?;
        }
    }

    Ok(())
}

// Counts chars, not bytes; server-provided titles can be multibyte.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
