use std::process::ExitCode;

use anyhow::{bail, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use counter_api::{access, catalog, ledger, menu_admin, status, ApiContext, Session};
use serde::Serialize;
use shared::{
    domain::{ItemStatus, MenuField, Money, OrderId, Role},
    error::{ApiError, ErrorCode},
    protocol::NewMenuItem,
};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url, Settings};

#[derive(Parser, Debug)]
#[command(name = "counter", about = "Counter orders, kitchen status and menu upkeep")]
struct Cli {
    /// Overrides `database_url` from counter.toml and the environment.
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true)]
    login: Option<String>,
    #[arg(long, global = true)]
    password: Option<String>,
    /// Print JSON instead of `|`-separated rows.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a customer account.
    Signup {
        #[arg(value_name = "LOGIN")]
        account: String,
        #[arg(value_name = "PASSWORD")]
        secret: String,
        phone: String,
    },
    Health,
    /// Grant the manager role straight in the store. Used once to seed a
    /// fresh database.
    BootstrapManager {
        #[arg(value_name = "LOGIN")]
        account: String,
    },
    #[command(subcommand)]
    Menu(MenuCommand),
    #[command(subcommand)]
    Order(OrderCommand),
    #[command(subcommand)]
    Line(LineCommand),
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Subcommand, Debug)]
enum MenuCommand {
    List,
    ByName {
        name: String,
    },
    ByType {
        item_type: String,
    },
    Add {
        name: String,
        item_type: String,
        price: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        image_url: String,
    },
    Update {
        name: String,
        field: String,
        value: String,
    },
    Delete {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    Place {
        item: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    Add {
        order_id: i64,
        item: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    History {
        #[arg(long)]
        limit: Option<u32>,
    },
    Detail {
        order_id: i64,
    },
    Status {
        order_id: i64,
    },
    Open {
        #[arg(long)]
        hours: Option<i64>,
    },
    Pay {
        order_id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum LineCommand {
    Status {
        order_id: i64,
        item: String,
        status: String,
    },
    Comment {
        order_id: i64,
        item: String,
        comment: String,
    },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Profile,
    Phone {
        phone: String,
    },
    Favorites {
        items: String,
    },
    Password {
        old: String,
        new: String,
    },
    Role {
        target: String,
        role: String,
    },
    List,
    Update {
        target: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        favorites: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = load_settings();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if is_store_failure(&err) {
                error!(error = %format!("{err:#}"), "counter store failed");
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Store failures exit with status 2; rejected requests exit with 1.
fn is_store_failure(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_fatal)
}

fn store_error(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Store, format!("{err:#}"))
}

async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let raw_url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database_url.clone());
    let database_url = prepare_database_url(&raw_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(%database_url, error = %format!("{error:#}"), "failed to open counter database");
        store_error(error)
    })?;
    let ctx = ApiContext::new(storage);
    let out = Output { json: cli.json };

    match cli.command {
        Command::Signup {
            account,
            secret,
            phone,
        } => {
            let profile = access::create_account(&ctx, &account, &secret, &phone).await?;
            out.rows(&[profile], |p| p.fields())?;
        }
        Command::Health => {
            ctx.storage.health_check().await.map_err(store_error)?;
            out.line("ok");
        }
        Command::BootstrapManager { account } => {
            let granted = ctx
                .storage
                .set_role(&account, Role::Manager)
                .await
                .map_err(store_error)?;
            if !granted {
                return Err(ApiError::new(ErrorCode::UnknownUser, account).into());
            }
            info!(login = %account, "bootstrapped manager");
            out.line(&format!("{account} is now Manager"));
        }
        Command::Menu(command) => {
            let session = sign_in(&ctx, &cli.login, &cli.password).await?;
            run_menu(&ctx, &session, &out, command).await?;
        }
        Command::Order(command) => {
            let session = sign_in(&ctx, &cli.login, &cli.password).await?;
            run_order(&ctx, &session, &out, &settings, command).await?;
        }
        Command::Line(command) => {
            let session = sign_in(&ctx, &cli.login, &cli.password).await?;
            run_line(&ctx, &session, command).await?;
            out.line("ok");
        }
        Command::User(command) => {
            let session = sign_in(&ctx, &cli.login, &cli.password).await?;
            run_user(&ctx, &session, &out, command).await?;
        }
    }

    Ok(())
}

async fn sign_in(
    ctx: &ApiContext,
    login: &Option<String>,
    password: &Option<String>,
) -> Result<Session> {
    let (Some(login), Some(password)) = (login, password) else {
        bail!("--login and --password are required for this command");
    };
    Ok(access::authenticate(ctx, login, password).await?)
}

async fn run_menu(
    ctx: &ApiContext,
    session: &Session,
    out: &Output,
    command: MenuCommand,
) -> Result<()> {
    match command {
        MenuCommand::List => {
            let items = catalog::list_menu(ctx, session).await?;
            out.rows(&items, |i| i.fields())?;
        }
        MenuCommand::ByName { name } => {
            let items = catalog::find_by_name(ctx, session, &name).await?;
            out.rows(&items, |i| i.fields())?;
        }
        MenuCommand::ByType { item_type } => {
            let items = catalog::find_by_type(ctx, session, &item_type).await?;
            out.rows(&items, |i| i.fields())?;
        }
        MenuCommand::Add {
            name,
            item_type,
            price,
            description,
            image_url,
        } => {
            let item = NewMenuItem {
                item_name: name,
                item_type,
                price: parse_price(&price)?,
                description,
                image_url,
            };
            menu_admin::add_item(ctx, session, item).await?;
            out.line("ok");
        }
        MenuCommand::Update { name, field, value } => {
            let field = field
                .parse::<MenuField>()
                .map_err(|err| ApiError::new(ErrorCode::Validation, err.to_string()))?;
            menu_admin::update_field(ctx, session, &name, field, &value).await?;
            out.line("ok");
        }
        MenuCommand::Delete { name } => {
            menu_admin::delete_item(ctx, session, &name).await?;
            out.line("ok");
        }
    }
    Ok(())
}

async fn run_order(
    ctx: &ApiContext,
    session: &Session,
    out: &Output,
    settings: &Settings,
    command: OrderCommand,
) -> Result<()> {
    match command {
        OrderCommand::Place { item, comment } => {
            let order_id = ledger::place_order(ctx, session, &item, &comment).await?;
            out.value(&order_id, &format!("order {order_id}"))?;
        }
        OrderCommand::Add {
            order_id,
            item,
            comment,
        } => {
            let total =
                ledger::add_item_to_order(ctx, session, OrderId(order_id), &item, &comment)
                    .await?;
            out.value(&total, &format!("total {total}"))?;
        }
        OrderCommand::History { limit } => {
            let limit = limit.unwrap_or(settings.history_limit);
            let orders = ledger::order_history(ctx, session, limit).await?;
            out.rows(&orders, |o| o.fields())?;
        }
        OrderCommand::Detail { order_id } => {
            let detail = ledger::order_detail(ctx, session, OrderId(order_id)).await?;
            if out.json {
                out.json(&detail)?;
            } else {
                out.rows(&[detail.order], |o| o.fields())?;
                out.rows(&detail.lines, |l| l.fields())?;
            }
        }
        OrderCommand::Status { order_id } => {
            let lines = status::status_of(ctx, session, OrderId(order_id)).await?;
            out.rows(&lines, |l| l.fields())?;
        }
        OrderCommand::Open { hours } => {
            let window = open_window(hours.unwrap_or(settings.open_window_hours))?;
            let orders = ledger::open_orders(ctx, session, window).await?;
            out.rows(&orders, |o| o.fields())?;
        }
        OrderCommand::Pay { order_id } => {
            ledger::mark_paid(ctx, session, OrderId(order_id)).await?;
            out.line("ok");
        }
    }
    Ok(())
}

async fn run_line(ctx: &ApiContext, session: &Session, command: LineCommand) -> Result<()> {
    match command {
        LineCommand::Status {
            order_id,
            item,
            status: new_status,
        } => {
            status::set_status(
                ctx,
                session,
                OrderId(order_id),
                &item,
                ItemStatus::from(new_status.as_str()),
            )
            .await?;
        }
        LineCommand::Comment {
            order_id,
            item,
            comment,
        } => {
            status::set_comment(ctx, session, OrderId(order_id), &item, &comment).await?;
        }
    }
    Ok(())
}

async fn run_user(
    ctx: &ApiContext,
    session: &Session,
    out: &Output,
    command: UserCommand,
) -> Result<()> {
    match command {
        UserCommand::Profile => {
            let profile = access::profile(ctx, session).await?;
            out.rows(&[profile], |p| p.fields())?;
        }
        UserCommand::Phone { phone } => {
            let profile = access::update_phone(ctx, session, &phone).await?;
            out.rows(&[profile], |p| p.fields())?;
        }
        UserCommand::Favorites { items } => {
            let profile = access::add_favorite_items(ctx, session, &items).await?;
            out.rows(&[profile], |p| p.fields())?;
        }
        UserCommand::Password { old, new } => {
            access::change_password(ctx, session, &old, &new).await?;
            out.line("ok");
        }
        UserCommand::Role { target, role } => {
            access::change_role(ctx, session, &target, &role).await?;
            out.line("ok");
        }
        UserCommand::List => {
            let users = access::list_users(ctx, session).await?;
            out.rows(&users, |u| u.fields())?;
        }
        UserCommand::Update {
            target,
            phone,
            favorites,
        } => {
            let profile = access::update_user_info(
                ctx,
                session,
                &target,
                phone.as_deref(),
                favorites.as_deref(),
            )
            .await?;
            out.rows(&[profile], |p| p.fields())?;
        }
    }
    Ok(())
}

fn open_window(hours: i64) -> Result<Duration, ApiError> {
    Duration::try_hours(hours).ok_or_else(|| {
        ApiError::new(
            ErrorCode::Validation,
            format!("{hours} hours is outside the supported window range"),
        )
    })
}

fn parse_price(raw: &str) -> Result<Money, ApiError> {
    raw.parse::<Money>()
        .map_err(|err| ApiError::new(ErrorCode::Validation, err.to_string()))
}

struct Output {
    json: bool,
}

impl Output {
    fn rows<T: Serialize>(&self, items: &[T], fields: impl Fn(&T) -> Vec<String>) -> Result<()> {
        if self.json {
            return self.json(items);
        }
        for item in items {
            println!("{}", fields(item).join(" | "));
        }
        Ok(())
    }

    fn value<T: Serialize + ?Sized>(&self, value: &T, text: &str) -> Result<()> {
        if self.json {
            return self.json(value);
        }
        println!("{text}");
        Ok(())
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn line(&self, text: &str) {
        if self.json {
            println!("{}", serde_json::json!({ "result": text }));
        } else {
            println!("{text}");
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
