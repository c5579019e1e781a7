//! slircd-dispatch - interactive demo of the dispatch core.
//!
//! Reads lines from stdin as if each were a chat message from a single
//! local user, dispatches them, and prints replies to stdout.

use async_trait::async_trait;
use dashmap::DashMap;
use slirc_dispatch::commands::{
    Author, Context, DefaultHooks, Flag, FlagGroup, HandlerResult, Hooks, InvocationEvent, Origin,
    Reply, cause_chain, handler_fn, is_owner,
};
use slirc_dispatch::config::{self, Config};
use slirc_dispatch::directory::{Channel, Member, MemoryDirectory, Role, Snowflake, User};
use slirc_dispatch::limits::{BucketType, Cooldown, MaxConcurrency};
use slirc_dispatch::{
    Command, CommandError, Dispatcher, Module, Parameter, Responder, Shape, TypeKey, Value, metrics,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const LOCAL_USER: Snowflake = 175928847299117063;
const LOCAL_SCOPE: Snowflake = 81384788765712384;
const LOCAL_CHANNEL: Snowflake = 81384788765712385;

/// Replies to the invoker for errors they can fix; logs the rest.
struct ReplyOnError;

#[async_trait]
impl Hooks for ReplyOnError {
    async fn on_command_error(&self, ctx: &Context, error: &CommandError) -> HandlerResult {
        if error.is_user_input() || error.is_check_failure() || error.retry_after().is_some() {
            ctx.reply(format!("error: {}", cause_chain(error))).await?;
            return Ok(());
        }
        DefaultHooks.on_command_error(ctx, error).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    metrics::init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "dispatch.toml".to_string());

    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path).map_err(|e| {
            error!(path = %config_path, error = %e, "Failed to load config");
            e
        })?
    } else {
        info!(path = %config_path, "No config file, using defaults");
        Config::default()
    };

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!("{} configuration error(s)", errors.len()));
    }

    let directory = Arc::new(demo_directory());
    let mut dispatcher = Dispatcher::new(&config, directory);
    dispatcher.set_hooks(ReplyOnError);
    register_commands(&dispatcher)?;

    let dispatcher = Arc::new(dispatcher);
    let maintenance = dispatcher.spawn_maintenance();

    info!(
        prefixes = ?config.dispatch.prefixes,
        commands = dispatcher.registry().walk_commands().len(),
        "Starting slircd-dispatch"
    );

    // Replies are printed by a single task so output lines never interleave
    let (tx, mut rx) = mpsc::channel::<Reply>(64);
    let printer = tokio::spawn(async move {
        while let Some(reply) = rx.recv().await {
            println!("{}", reply.content);
        }
    });

    let author = Author::new(LOCAL_USER, "operator");
    let origin = Origin::scoped(LOCAL_SCOPE, Channel::new(LOCAL_CHANNEL, "console", Some(LOCAL_SCOPE)));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let event = InvocationEvent {
            author: author.clone(),
            origin: origin.clone(),
            content: line,
            responder: Responder::Direct(tx.clone()),
        };
        // Sequential so replies follow their input
        if let Err(e) = dispatcher.spawn(event).await {
            warn!(error = %e, "Dispatch task failed");
        }
    }

    drop(tx);
    maintenance.abort();
    let _ = printer.await;

    for (command, uses) in dispatcher.registry().command_stats() {
        info!(command = %command, uses, "Command usage");
    }
    tracing::debug!(metrics = %metrics::gather_metrics(), "Final metrics");
    Ok(())
}

fn demo_directory() -> MemoryDirectory {
    let directory = MemoryDirectory::new();
    let mut operator = Member::new(User::new(LOCAL_USER, "operator"), LOCAL_SCOPE);
    operator.nick = Some("op".to_string());
    directory.add_member(operator);
    directory.add_member(Member::new(User::new(80351110224678912, "alice"), LOCAL_SCOPE));
    directory.add_member(Member::new(User::new(80088516616269824, "bob"), LOCAL_SCOPE));
    directory.add_channel(Channel::new(LOCAL_CHANNEL, "console", Some(LOCAL_SCOPE)));
    directory.add_role(Role::new(175643578071121920, "Mods", LOCAL_SCOPE));
    directory
}

fn register_commands(dispatcher: &Dispatcher) -> anyhow::Result<()> {
    dispatcher.register(
        Command::builder("ping")
            .describe("Check that the dispatcher is alive")
            .handler(handler_fn(|ctx: Arc<Context>, _| async move {
                ctx.reply("pong").await?;
                Ok(())
            }))
            .build()?,
    )?;

    dispatcher.register(
        Command::builder("echo")
            .alias("say")
            .param(Parameter::new("text", TypeKey::Str).rest())
            .handler(handler_fn(|ctx: Arc<Context>, args| async move {
                ctx.reply(args.str("text").unwrap_or_default()).await?;
                Ok(())
            }))
            .build()?,
    )?;

    dispatcher.register(
        Command::builder("add")
            .describe("Sum some integers")
            .param(Parameter::new("numbers", Shape::greedy(TypeKey::Int.into())))
            .handler(handler_fn(|ctx: Arc<Context>, args| async move {
                let sum: i64 = args
                    .list("numbers")
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_int)
                    .sum();
                ctx.reply(sum.to_string()).await?;
                Ok(())
            }))
            .build()?,
    )?;

    dispatcher.register(
        Command::builder("whois")
            .param(Parameter::new("who", Shape::optional(TypeKey::Member.into())))
            .handler(handler_fn(|ctx: Arc<Context>, args| async move {
                let reply = match args.member("who") {
                    Some(member) => format!("{} ({})", member.display_name(), member.id()),
                    None => format!("{} ({})", ctx.author.name, ctx.author.id),
                };
                ctx.reply(reply).await?;
                Ok(())
            }))
            .build()?,
    )?;

    let dice = FlagGroup::new()
        .flag(Flag::new("sides", TypeKey::Int).default_value(6i64))
        .flag(Flag::new("count", TypeKey::Int).default_value(1i64));
    dispatcher.register(
        Command::builder("roll")
            .param(Parameter::new("dice", Shape::flags(dice)))
            .cooldown(Cooldown::new(3, Duration::from_secs(10), BucketType::User))
            .handler(handler_fn(|ctx: Arc<Context>, args| async move {
                let flags = args.flags("dice").cloned().unwrap_or_default();
                let sides = flags.get("sides").and_then(Value::as_int).unwrap_or(6).max(1);
                let count = flags.get("count").and_then(Value::as_int).unwrap_or(1).clamp(1, 20);
                // Faces come from the invocation id bits
                let rolls: Vec<String> = (0..count)
                    .map(|i| ((ctx.id.as_u128() >> (i * 5)) as i64).rem_euclid(sides) + 1)
                    .map(|r| r.to_string())
                    .collect();
                ctx.reply(rolls.join(" ")).await?;
                Ok(())
            }))
            .build()?,
    )?;

    let tags: Arc<DashMap<String, String>> = Arc::new(DashMap::new());
    let store = Arc::clone(&tags);
    let lookup = Arc::clone(&tags);
    dispatcher.register_group(
        Command::group("tag")
            .describe("Store and recall text snippets")
            .subcommand(
                Command::builder("set")
                    .param(Parameter::new("name", TypeKey::Str))
                    .param(Parameter::new("content", TypeKey::Str).rest())
                    .max_concurrency(MaxConcurrency::new(1, BucketType::Default, true))
                    .handler(handler_fn(move |ctx: Arc<Context>, args| {
                        let store = Arc::clone(&store);
                        async move {
                            let name = args.str("name").unwrap_or_default().to_string();
                            let content = args.str("content").unwrap_or_default().to_string();
                            store.insert(name.clone(), content);
                            ctx.reply(format!("tag {name} saved")).await?;
                            Ok(())
                        }
                    })),
            )
            .subcommand(
                Command::builder("get")
                    .param(Parameter::new("name", TypeKey::Str))
                    .handler(handler_fn(move |ctx: Arc<Context>, args| {
                        let lookup = Arc::clone(&lookup);
                        async move {
                            let name = args.str("name").unwrap_or_default();
                            let reply = lookup
                                .get(name)
                                .map(|t| t.value().clone())
                                .unwrap_or_else(|| format!("no tag named {name}"));
                            ctx.reply(reply).await?;
                            Ok(())
                        }
                    })),
            )
            .build()?,
    )?;

    let admin = Module::new("admin").describe("Owner-only tools").check(is_owner()).command(
        Command::builder("stats")
            .handler(handler_fn(|ctx: Arc<Context>, _| async move {
                let Some(command) = ctx.command.clone() else {
                    return Ok(());
                };
                ctx.reply(format!("{} invoked {} time(s)", command.qualified_name(), command.uses()))
                    .await?;
                Ok(())
            }))
            .build()?,
    );
    dispatcher.add_module(admin)?;
    Ok(())
}
