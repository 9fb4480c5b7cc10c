use ::serenity::all::ClientBuilder;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use encore::config::{Config, ProcessEnv};
use encore::music::{ChannelNotifier, ContinuationEngine, NodePool, SessionRegistry};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;
type CommandResult = Result<(), Error>;

/// Shared state handed to every command and to the playback driver.
pub struct Data {
    pub sessions: Arc<SessionRegistry>,
    pub engine: Arc<ContinuationEngine>,
    pub nodes: Arc<NodePool>,
}

#[poise::command(slash_command, category = "General")]
async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("encore=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    // Configuration problems abort startup before anything connects
    let config = Config::from_env(&ProcessEnv).inspect_err(|e| error!("{}", e))?;

    let token = env::var("DISCORD_TOKEN").map_err(|_| "Missing DISCORD_TOKEN")?;

    let nodes = Arc::new(NodePool::connect(&config.nodes).await);
    info!("{} of {} Lavalink node(s) connected", nodes.len(), config.nodes.len());

    let sessions = Arc::new(SessionRegistry::new());

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let setup_sessions = sessions.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![register(), help()],
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let notifier = Arc::new(ChannelNotifier::new(ctx.http.clone()));
                let engine = Arc::new(ContinuationEngine::new(&config, notifier));

                Ok(Data {
                    sessions: setup_sessions,
                    engine,
                    nodes,
                })
            })
        });

    let mut client = ClientBuilder::new(token, intents)
        .framework(framework.build())
        .await?;

    // Tear every session down before the shards go away
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let closed = sessions.close_all();
            info!("Shutting down, closed {} playback session(s)", closed);
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.map_err(Into::into)
}
