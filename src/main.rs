use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;
use futures::channel::mpsc;
use log::info;

use blockhost::{
    AffinityMap, DispatchTarget, EntityId, HostConfig, HostContext, RegionId, Screen, Session,
};

/// Minimal demo screen: a lobby that counts ticks while the session lives.
struct LobbyScreen {
    ctx: Arc<HostContext>,
    player: EntityId,
    ticks_seen: Arc<AtomicU32>,
}

impl Screen for LobbyScreen {
    fn title(&self) -> &str {
        "lobby"
    }

    fn on_create(&mut self) {
        info!("lobby opened");
        let ticks = self.ticks_seen.clone();
        self.ctx
            .scheduler()
            .run_periodic(DispatchTarget::Entity(self.player), 1, 1, move || {
                ticks.fetch_add(1, Ordering::Relaxed);
            });
    }

    fn on_close(&mut self) {
        info!(
            "lobby closed after {} ticks",
            self.ticks_seen.load(Ordering::Relaxed)
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = HostConfig::load().unwrap_or_default();

    // Log to file, truncated on each run
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&config.log_file)?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let affinity = Arc::new(AffinityMap::new());
    let player = EntityId::new();
    affinity.place(player, RegionId(7));

    // The demo process has no region threads of its own.
    let ctx = HostContext::boot(config, affinity.clone(), || false);
    info!("host booted in {:?} mode", ctx.mode());

    let mut session = Session::open(
        ctx.clone(),
        player,
        "demo:lobby",
        Box::new(LobbyScreen {
            ctx: ctx.clone(),
            player,
            ticks_seen: Arc::new(AtomicU32::new(0)),
        }),
    );

    // Feed a few chat-like events through the bridge; each one is
    // re-dispatched onto the context owning the player before running.
    let (tx, rx) = mpsc::unbounded::<String>();
    let subscription = ctx
        .bridge()
        .attach(session.target(), rx, |line| info!("chat: {}", line));
    session.scope_mut().add_default(subscription);
    for n in 1..=3 {
        let _ = tx.unbounded_send(format!("hello {}", n));
    }
    drop(tx);

    let mut interval = tokio::time::interval(ctx.config().tick_duration());
    for _ in 0..40 {
        interval.tick().await;
        ctx.tick();
    }

    session.close(false);
    ctx.shutdown();
    info!("demo finished at tick {}", ctx.scheduler().now());
    Ok(())
}
