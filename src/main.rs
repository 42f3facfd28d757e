#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use dm_store::config::{Command, Config};
use dm_store::storage::message_repo::MessageRepository;
use dm_store::storage::user_repo::UserRepository;
use dm_store::storage::{self, DbPool};
use dm_store::{AppError, MessageDto, MessageParams, MessageStore, PageRequest, telemetry};
use serde::Serialize;
use serde_json::json;
use std::process::ExitCode;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let span = tracing::info_span!("dm_store_command", command = command_name(&config.command));
    let outcome = run(&config).instrument(span).await;

    let code = match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from(e.downcast_ref::<AppError>().map_or(1, AppError::exit_code))
        }
    };

    telemetry_guard.shutdown();
    Ok(code)
}

const fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Migrate => "migrate",
        Command::AddUser { .. } => "add-user",
        Command::Send { .. } => "send",
        Command::Show { .. } => "show",
        Command::List { .. } => "list",
        Command::Thread { .. } => "thread",
        Command::Delete { .. } => "delete",
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let pool = storage::init_pool(&config.database).await?;

    match &config.command {
        Command::Migrate => storage::run_migrations(&pool).await?,
        Command::AddUser { username, photo_url } => add_user(&pool, username, photo_url.as_deref()).await?,
        Command::Send { from, to, content } => {
            let mut store = new_store(pool);
            let message = store.stage_send(from, to, content).await?;
            if !store.save_changes().await? {
                return Err(anyhow::anyhow!("Failed to send message"));
            }
            let sent = store.get_by_id(message.id).await?.ok_or(AppError::NotFound)?;
            print_json(&MessageDto::from(&sent))?;
        }
        Command::Show { id } => {
            let message = new_store(pool).get_by_id(*id).await?.ok_or(AppError::NotFound)?;
            print_json(&MessageDto::from(&message))?;
        }
        Command::List { user, container, page, page_size } => {
            let size = page_size.unwrap_or_else(|| i64::from(config.pagination.default_page_size));
            let page = PageRequest::new(*page, size, config.pagination.max_page_size);
            let params = MessageParams::new(user.clone(), *container, page);
            print_json(&new_store(pool).get_for_user(&params).await?)?;
        }
        Command::Thread { user, other } => {
            print_json(&new_store(pool).get_thread(user, other).await?)?;
        }
        Command::Delete { id, user } => {
            let mut store = new_store(pool);
            let outcome = store.stage_delete_for_user(*id, user).await?;
            if !store.save_changes().await? {
                return Err(AppError::BadRequest("Problem deleting the message".into()).into());
            }
            print_json(&json!({ "id": id, "outcome": outcome }))?;
        }
    }

    Ok(())
}

fn new_store(pool: DbPool) -> MessageStore {
    MessageStore::new(pool, MessageRepository::new(), UserRepository::new())
}

async fn add_user(pool: &DbPool, username: &str, photo_url: Option<&str>) -> anyhow::Result<()> {
    let repo = UserRepository::new();
    let mut tx = pool.begin().await?;

    let mut user = repo.create(&mut tx, username).await?;
    if let Some(url) = photo_url {
        repo.add_photo(&mut tx, user.id, url, true).await?;
        user.photo_url = Some(url.to_string());
    }

    tx.commit().await?;

    tracing::info!(user.id = %user.id, "User registered");
    print_json(&json!({ "id": user.id, "username": user.username, "photoUrl": user.photo_url }))
}

#[allow(clippy::print_stdout)]
fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
