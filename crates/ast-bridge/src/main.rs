//! AST bridge entry point.
//!
//! Opens both drivers, locks the keyboard and mouse, starts video capture and
//! runs the capture tick until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                 -- TOML, defaults when missing
//!  └─ InputForwarder::start()       -- keyboard + mouse locks (fatal)
//!  └─ DisplaySession::start()       -- reset + start capture (fatal)
//!  └─ tick loop (every wakeup_ms)
//!       ├─ DisplaySession::tick()   -- publish draw / cursor commands
//!       └─ HeadlessConsumer::drain() -- take + release them
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ast_bridge::application::display_session::{DisplaySession, SessionOptions};
use ast_bridge::application::forward_input::{ForwarderOptions, InputForwarder};
use ast_bridge::application::frame_cache::FrameCache;
use ast_bridge::application::frame_source::FrameSource;
use ast_bridge::infrastructure::capture::open_capture_device;
use ast_bridge::infrastructure::display::headless::HeadlessConsumer;
use ast_bridge::infrastructure::display::LoggingRuntime;
use ast_bridge::infrastructure::hid::open_hid_device;
use ast_bridge::infrastructure::storage::config::{self, BridgeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The config names the default log level, so it is loaded first and any
    // error is reported once logging is up.
    let (config, config_error) = match config::load_config() {
        Ok(cfg) => (cfg, None),
        Err(e) => (BridgeConfig::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();

    if let Some(e) = config_error {
        warn!("failed to load config, using defaults: {e}");
    }
    info!("AST bridge starting");

    // ── Input path ────────────────────────────────────────────────────────────
    let hid = open_hid_device(&config.hid.device_path)
        .with_context(|| format!("opening {}", config.hid.device_path.display()))?;
    let mut forwarder = InputForwarder::start(
        hid,
        ForwarderOptions {
            mouse_mode: config.hid.mouse_mode.into(),
            led_query_blocking: config.hid.led_query_blocking,
        },
    )
    .context("locking keyboard and mouse")?;
    let leds = forwarder.query_leds();
    info!(
        caps = leds.caps_lock,
        num = leds.num_lock,
        scroll = leds.scroll_lock,
        "keyboard LEDs"
    );

    // ── Display path ──────────────────────────────────────────────────────────
    let capture = open_capture_device(&config.capture.device_path, config.capture.mmap_size)
        .with_context(|| format!("opening {}", config.capture.device_path.display()))?;
    let mut session = DisplaySession::new(
        FrameSource::new(capture),
        FrameCache::load(config.capture.frame_dump_path.clone()),
        Arc::new(LoggingRuntime),
        SessionOptions {
            resend_cached_frame: config.capture.resend_cached_frame,
            default_width: config.display.default_width,
            default_height: config.display.default_height,
        },
    );
    if let Err(e) = session.start() {
        forwarder.shutdown();
        return Err(e).context("starting video capture");
    }
    let mut consumer = HeadlessConsumer::attach(session.handle());

    info!(
        wakeup_ms = config.capture.wakeup_ms,
        "AST bridge ready.  Press Ctrl-C to exit."
    );

    // ── Tick loop ─────────────────────────────────────────────────────────────
    let period = Duration::from_millis(config.capture.wakeup_ms.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                session.tick();
                consumer.drain();
            }
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    session.stop();
    let stats = consumer.detach();
    forwarder.shutdown();
    info!(
        frames = stats.frames,
        cached = stats.cached_frames,
        resizes = stats.resizes,
        cursor = stats.cursor_commands,
        "AST bridge stopped"
    );
    Ok(())
}
