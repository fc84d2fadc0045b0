//! `eleonor-say` reads assistant replies from stdin and speaks them aloud.
//!
//! Each line is spoken with the selected Spanish voice; a new line interrupts
//! the one still playing. Lines starting with `/` control playback.

use eleonor_cli::config;
use eleonor_cli::session::{ConsoleCommand, Flow, Session};
use eleonor_types::ReadinessState;
use eleonor_voice::{EspeakEngine, VoiceOutputService};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const READY_WAIT: Duration = Duration::from_secs(5);

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("ELEONOR_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so stdout only carries command output.
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let service = match EspeakEngine::detect(&config.espeak) {
        Some(engine) => {
            tracing::info!(binary = %engine.binary().display(), "using espeak synthesizer");
            VoiceOutputService::new(engine, &config.voice)
                .expect("invalid voice configuration")
        }
        None => {
            tracing::warn!("no speech synthesizer found, replies will not be spoken");
            VoiceOutputService::disabled()
        }
    };

    match tokio::time::timeout(READY_WAIT, service.wait_until_ready()).await {
        Ok(ReadinessState::Ready) => match service.selected_voice() {
            Some(voice) => tracing::info!(
                voice = %voice.name,
                language = %voice.language_tag,
                "voice output ready"
            ),
            None => tracing::warn!(
                language = %config.voice.language_prefix,
                "voice output ready without a usable voice"
            ),
        },
        Ok(ReadinessState::Uninitialized) | Err(_) => {
            tracing::warn!("voice discovery still pending, replies are dropped until it completes")
        }
    }

    let mut session = Session::new(service);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                session.shutdown().await;
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match session.handle(ConsoleCommand::parse(&line)) {
                    Flow::Continue => {}
                    Flow::Print(output) => println!("{}", output),
                    Flow::Quit => {
                        session.shutdown().await;
                        break;
                    }
                },
                Ok(None) => {
                    // Input closed: let the last reply play out.
                    let interrupted = tokio::select! {
                        () = session.finish() => false,
                        () = &mut shutdown => true,
                    };
                    if interrupted {
                        session.shutdown().await;
                    }
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to read from stdin");
                    session.shutdown().await;
                    break;
                }
            }
        }
    }

    tracing::info!("voice output stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, stopping speech"); }
        () = terminate => { tracing::info!("received SIGTERM, stopping speech"); }
    }
}
