use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use mindtracking::dashboard::DashboardSnapshot;
use mindtracking::diary::{DiaryFeed, PollEvent, PollPolicy};
use mindtracking::forms::DiaryDraft;
use mindtracking::models::user::user_initials;
use mindtracking::validation::{self, BirthDateRule};
use mindtracking::{ApiClient, Config, FileStore, Session};

#[derive(Parser)]
#[command(name = "mindtracking")]
#[command(about = "MindTracking client: session, diary and dashboard from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        email: String,
        #[arg(long, env = "MT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Clear the stored session
    Logout,
    /// Show the current user
    Whoami,
    /// Diary entries
    Diary {
        #[command(subcommand)]
        command: DiaryCommands,
    },
    /// Print the dashboard cards
    Dashboard,
    /// Run a field validator
    Validate { field: ValidateField, value: String },
}

#[derive(Subcommand)]
enum DiaryCommands {
    /// List entries, newest first
    List,
    /// Write an entry and wait for its analysis
    Write {
        #[arg(long)]
        title: String,
        #[arg(long)]
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ValidateField {
    Email,
    Password,
    Name,
    BirthDate,
    Phone,
    Gender,
    Title,
    Text,
}

async fn open_session(config: &Config) -> anyhow::Result<Session<FileStore>> {
    let store = FileStore::open(&config.storage_dir)
        .with_context(|| format!("opening storage at {}", config.storage_dir.display()))?;
    let api = ApiClient::new(config)?;
    let mut session = Session::new(api, store);
    session.restore().await;
    Ok(session)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_validator(field: ValidateField, value: &str, rule: BirthDateRule) -> String {
    let result = match field {
        ValidateField::Email => validation::validate_email(value),
        ValidateField::Password => validation::validate_password(value),
        ValidateField::Name => validation::validate_name(value),
        ValidateField::BirthDate => {
            validation::validate_birth_date(&validation::digits_only(value), rule)
        }
        ValidateField::Phone => validation::validate_phone(value),
        ValidateField::Gender => validation::validate_gender(value),
        ValidateField::Title => validation::validate_title(value),
        ValidateField::Text => validation::validate_diary_text(value),
    };
    validation::message(result)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindtracking=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Validate { field, value } => {
            let message = run_validator(field, &value, config.birth_date_rule);
            if !message.is_empty() {
                println!("{message}");
                std::process::exit(1);
            }
            println!("ok");
        }
        Commands::Login { email, password } => {
            let mut session = open_session(&config).await?;
            if let Err(e) = session.login(&email, &password).await {
                tracing::error!(error = %e, "Login failed");
                anyhow::bail!(e.user_message());
            }
            let name = session.user().and_then(|u| u.nome.as_deref());
            println!("Logged in as {} ({})", name.unwrap_or(&email), user_initials(name));
        }
        Commands::Logout => {
            let mut session = open_session(&config).await?;
            session.logout();
            println!("Logged out");
        }
        Commands::Whoami => {
            let session = open_session(&config).await?;
            match session.user() {
                Some(user) => print_json(user)?,
                None if session.is_authenticated() => {
                    println!("Session token present, user unavailable")
                }
                None => println!("Not logged in"),
            }
        }
        Commands::Diary { command } => {
            let session = open_session(&config).await?;
            if !session.is_authenticated() {
                anyhow::bail!("Not logged in");
            }
            let mut feed = DiaryFeed::new(session.api().clone(), PollPolicy::from(&config));

            match command {
                DiaryCommands::List => {
                    feed.load().await.map_err(|e| anyhow::anyhow!(e.user_message()))?;
                    print_json(&feed.entries())?;
                }
                DiaryCommands::Write { title, text } => {
                    let id = feed
                        .create(&DiaryDraft::new(title, text))
                        .await
                        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

                    while let Some(event) = feed.next_event().await {
                        if let PollEvent::Exhausted(id) = event {
                            tracing::info!(entry_id = %id, "Entry saved without analysis");
                        }
                    }
                    if let Some(entry) = feed.entry(&id) {
                        print_json(entry)?;
                    }
                }
            }
        }
        Commands::Dashboard => {
            let session = open_session(&config).await?;
            if !session.is_authenticated() {
                anyhow::bail!("Not logged in");
            }
            let now = chrono::Local::now().naive_local();
            let snapshot =
                DashboardSnapshot::load(session.api(), session.user_id().as_ref(), now).await;
            print_json(&snapshot)?;
        }
    }

    Ok(())
}
