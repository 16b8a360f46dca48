//! livesurface-demo - drive a session against a logging transport
//!
//! Loads `livesurface.toml` (or the path given as the first argument),
//! opens a session, lets the auto-refresh loop and a few simulated clicks
//! race against each other, then waits for the expiry clocks to end it.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use livesurface::component::{Button, ButtonStyle, ContentBlock, FnContent};
use livesurface::render::ErrorBlockHandler;
use livesurface::{
    CancelCause, Interaction, MessageHandle, MessageId, PendingDelta, Responder, Session,
    SessionConfig, SessionOptions, SessionRegistry, UserId, Visibility,
};

/// Prints every delta instead of sending it anywhere
struct LogHandle {
    message: MessageId,
    edits: AtomicUsize,
}

#[async_trait]
impl MessageHandle for LogHandle {
    fn message_id(&self) -> Option<MessageId> {
        Some(self.message)
    }

    async fn apply(&self, delta: &PendingDelta) -> Result<()> {
        let n = self.edits.fetch_add(1, Ordering::SeqCst) + 1;
        info!(message = %self.message, edit = n, delta = %serde_json::to_string(delta)?, "apply");
        Ok(())
    }
}

struct LogResponder {
    handle: Arc<LogHandle>,
}

#[async_trait]
impl Responder for LogResponder {
    async fn respond(&self, visibility: Visibility) -> Result<Arc<dyn MessageHandle>> {
        info!(?visibility, "respond");
        Ok(self.handle.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("livesurface=debug".parse()?)
                .add_directive("livesurface_demo=info".parse()?),
        )
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "livesurface.toml".to_string());
    let mut config = SessionConfig::load(&path).context("failed to load session config")?;
    // Keep the demo short when the file does not say otherwise
    config.auto_update_secs.get_or_insert(1);
    config.max_alive_secs.get_or_insert(20);
    config.max_idle_secs.get_or_insert(5);

    let owner = UserId(1);
    let responder: Arc<dyn Responder> = Arc::new(LogResponder {
        handle: Arc::new(LogHandle {
            message: MessageId(42),
            edits: AtomicUsize::new(0),
        }),
    });

    let options = SessionOptions::new()
        .owner(owner)
        .error_handler(Arc::new(ErrorBlockHandler::default()));
    let session = Session::from_config(&config, options);

    let ticks = Arc::new(AtomicU64::new(0));
    let score = Arc::new(AtomicU64::new(0));

    let t = ticks.clone();
    session.builder().add_content(Arc::new(FnContent::new("clock", move |block: &mut ContentBlock| {
        block.title = Some("Live demo".into());
        block.field("Elapsed", format!("{}s", t.load(Ordering::SeqCst)), true);
        Ok(())
    })));
    let s = score.clone();
    session.builder().add_content(Arc::new(FnContent::new("score", move |block: &mut ContentBlock| {
        block.field("Score", s.load(Ordering::SeqCst).to_string(), true);
        block.footer = Some("press +1 to score".into());
        Ok(())
    })));

    let s = score.clone();
    session.builder().add_control(Arc::new(
        Button::new("plus", "+1")
            .style(ButtonStyle::Success)
            .on_press(move |session, interaction| {
                let s = s.clone();
                async move {
                    s.fetch_add(1, Ordering::SeqCst);
                    session.render_interaction(&interaction).await?;
                    Ok(())
                }
            }),
    ));
    session.builder().add_control(Arc::new(
        Button::new("quit", "Quit")
            .style(ButtonStyle::Danger)
            .on_press(|session, interaction| async move {
                session.acknowledge(&interaction).await?;
                session.cancel(CancelCause::OwnerExit).await;
                Ok(())
            }),
    ));

    // Clock unit: ticks inside the session scope, stops on teardown
    let t = ticks.clone();
    session.spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.tick().await;
        loop {
            interval.tick().await;
            t.fetch_add(1, Ordering::SeqCst);
        }
    });

    session.on_cancel(|cause| async move {
        info!(%cause, "session ended");
        if cause.message_available() {
            info!("a summary screen would be shown now");
        }
        anyhow::Ok(())
    });

    let visibility = if config.ephemeral {
        Visibility::Ephemeral
    } else {
        Visibility::Public
    };
    session
        .render_first(&Interaction::command(owner, responder.clone()), visibility)
        .await?;

    let registry = SessionRegistry::new();
    registry.track_current(&session).await;

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(700)).await;
        let click = Interaction::control(owner, "plus", responder.clone());
        registry.dispatch(MessageId(42), click).await?;
    }

    // An outsider's click is ignored
    let stranger = Interaction::control(UserId(99), "plus", responder.clone());
    let accepted = registry.dispatch(MessageId(42), stranger).await?;
    info!(accepted, "stranger click");

    session.cancelled().await;
    // let the handlers finish logging
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!(tracked = registry.len(), cause = ?session.cancel_cause(), "done");
    Ok(())
}
