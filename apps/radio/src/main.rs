use std::{path::PathBuf, rc::Rc, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use cloud_player::{AuthSession, CookieStore, FileCookieStore, HttpTransport, ReqwestTransport};
use iokit::{
    BroadcastServer, DisplayRenderer, EventBus, Gpio, Potentiometer, Reactor, SimulatedGpio,
};
use shared::event::Action;
use tokio::{net::TcpListener, task::LocalSet};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod console;
mod settings;
mod ws;

use console::{ConsoleDisplay, EncoderDriver};
use settings::{load_settings, Settings};

/// Pause between the two edges of a simulated detent, on top of the debounce.
const EDGE_GAP: Duration = Duration::from_millis(5);

#[derive(Parser, Debug)]
#[command(name = "radio", about = "Front panel controller for the cloud player radio")]
struct Args {
    /// Configuration file (TOML). Defaults to ./radio.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log filter, e.g. `debug` or `iokit=trace`. Falls back to RUST_LOG.
    #[arg(long)]
    log_filter: Option<String>,
    /// Do not read encoder turns from stdin.
    #[arg(long)]
    no_keyboard: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_filter.as_deref());

    let settings = load_settings(args.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    LocalSet::new().block_on(&runtime, run(settings, !args.no_keyboard))
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(settings: Settings, keyboard: bool) -> Result<()> {
    let bus = EventBus::new();
    let mut reactor = Reactor::new(Rc::clone(&bus));
    let handle = reactor.handle();
    let gpio = Arc::new(SimulatedGpio::new());
    let ctx = reactor.context(Arc::clone(&gpio) as Arc<dyn Gpio>, settings.debounce());

    let volume = Potentiometer::open(
        &ctx,
        settings.clk(),
        settings.dt(),
        settings.potentiometer(),
    )
    .context("failed to open volume knob")?;
    let display = DisplayRenderer::new(Rc::clone(&bus), Box::new(ConsoleDisplay));
    display.subscribe(Action::ValueChanged, volume.id());
    let socket = BroadcastServer::new(Rc::clone(&bus));
    socket.subscribe(Action::ValueChanged, volume.id());
    reactor.attach_socket(Rc::clone(&socket));

    let transport = ReqwestTransport::new(settings.transport()?)?;
    let store = FileCookieStore::new(&settings.cookie_path);
    let session = AuthSession::new(
        Rc::clone(&bus),
        Rc::new(transport) as Rc<dyn HttpTransport>,
        Rc::new(store) as Rc<dyn CookieStore>,
        settings.session(),
    );
    display.subscribe(Action::AuthStart, session.id());
    display.subscribe(Action::AuthDone, session.id());

    let addr = settings.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "websocket server listening");
    let app = ws::build_router(handle.clone());
    let server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!(%err, "websocket server failed");
        }
    });

    session.start();

    let keyboard_task = keyboard.then(|| {
        let driver = EncoderDriver::new(
            Arc::clone(&gpio),
            settings.clk(),
            settings.dt(),
            settings.debounce() + EDGE_GAP,
        );
        tokio::task::spawn_local(console::run_keyboard(driver, handle.clone()))
    });
    let interrupt = tokio::task::spawn_local({
        let handle = handle.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received");
                    handle.shutdown();
                }
                Err(err) => error!(%err, "failed to listen for interrupts"),
            }
        }
    });

    reactor.run().await;

    server.abort();
    interrupt.abort();
    if let Some(task) = keyboard_task {
        task.abort();
    }
    session.close();
    volume.close();
    info!("radio stopped");
    Ok(())
}
