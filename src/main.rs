use clap::{Args, Parser, Subcommand};
use solace::register::{self, RegistrationForm};
use solace::{AgentClient, ClientConfig};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

type MainResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "solace", about = "Chat with the support agent from your terminal")]
struct Cli {
    #[arg(long, env = "SOLACE_BACKEND_URL", default_value = "http://127.0.0.1:8000")]
    backend_url: String,
    #[arg(long, env = "SOLACE_API_KEY", hide_env_values = true)]
    api_key: String,
    #[arg(long, env = "SOLACE_USER_ID")]
    user_id: Option<String>,
    /// Write logs here instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat (default).
    Chat,
    /// Register a Telegram user with the backend.
    Register(RegisterArgs),
}

#[derive(Args)]
struct RegisterArgs {
    #[arg(long, env = "SOLACE_CHAT_ID")]
    chat_id: Option<String>,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    age: u32,
    #[arg(long)]
    gender: String,
    #[arg(long)]
    accept_privacy_policy: bool,
    /// Front-end base used to print the confirmation link.
    #[arg(long, default_value = "http://localhost:3000")]
    site_url: String,
}

fn init_logging(log_file: Option<&PathBuf>) -> MainResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> MainResult<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let mut config = ClientConfig::new(cli.backend_url, cli.api_key);
    if let Some(user_id) = cli.user_id {
        config = config.with_user_id(user_id);
    }
    let client = AgentClient::new(config);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => solace::ui::run_tui(client),
        Command::Register(args) => run_register(&client, args).await,
    }
}

async fn run_register(client: &AgentClient, args: RegisterArgs) -> MainResult<()> {
    let form = RegistrationForm {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        age: args.age,
        gender: args.gender,
        privacy_policy: args.accept_privacy_policy,
    };

    let confirmation = match register::submit(client, args.chat_id.as_deref(), form).await {
        Ok(confirmation) => confirmation,
        Err(err) => {
            if let register::RegisterError::Invalid(errors) = &err {
                for error in errors {
                    eprintln!("{}", error);
                }
            }
            match err.confirmation() {
                Some(confirmation) => confirmation,
                None => return Err(err.into()),
            }
        }
    };

    println!("{}", confirmation.message);
    println!("{}", confirmation.redirect_url(&args.site_url)?);
    confirmation.accepted()?;
    Ok(())
}
