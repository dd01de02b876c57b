//! Desktop runner: PN532 on a serial port, cards reported over the host network.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::net::SocketAddr;

use felica_notify::{
    Config, Controller, HostNetwork, Indicator, NotificationConfig, Pn532, SerialTransport, StatusLights,
    SystemClock, DEFAULT_PUSH_TOPIC, DEFAULT_PUSH_URL,
};

#[derive(Parser, Debug)]
#[command(name = "felica-notify", about = "Report FeliCa cards seen by a PN532")]
struct Args {
    /// Serial port of the PN532 HSU link
    #[arg(long)]
    port: String,

    #[arg(long, default_value_t = 115200)]
    baud: u32,

    /// Broadcast address for card reports
    #[arg(long, default_value = "192.168.1.255:5000")]
    broadcast: SocketAddr,

    /// Push cards to this key instead of broadcasting
    #[arg(long)]
    auth_key: Option<String>,

    #[arg(long, default_value = DEFAULT_PUSH_URL)]
    push_url: String,

    #[arg(long, default_value = DEFAULT_PUSH_TOPIC)]
    topic: String,

    /// FeliCa system code to poll for
    #[arg(long, default_value_t = 0xFFFF)]
    system_code: u16,
}

/// Status output that only shows up in the log
struct LogIndicator {
    name: &'static str,
    level: u8,
}

impl LogIndicator {
    fn new(name: &'static str) -> Self {
        Self { name, level: 0 }
    }
}

impl Indicator for LogIndicator {
    type Error = std::convert::Infallible;

    fn set_level(&mut self, level: u8) -> Result<(), Self::Error> {
        if level != self.level {
            log::trace!("[LED] {} {} -> {}", self.name, self.level, level);
            self.level = level;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = Config::default();
    config.reader.system_code = args.system_code;
    config.notification = match args.auth_key {
        Some(auth_key) => NotificationConfig::Push {
            url: args.push_url,
            auth_key,
            topic: args.topic,
        },
        None => NotificationConfig::Broadcast {
            address: args.broadcast,
        },
    };
    match &config.notification {
        NotificationConfig::Push { url, topic, .. } => info!("Pushing cards to {} on {}", topic, url),
        NotificationConfig::Broadcast { address } => info!("Broadcasting cards to {}", address),
    }

    let transport = SerialTransport::new(&args.port, args.baud)
        .with_context(|| format!("failed to open serial port {}", args.port))?;
    let reader = Pn532::new(transport)
        .with_request_code(config.reader.request_code)
        .with_activation_retries(config.reader.activation_retries);
    let notifier = config
        .notification
        .build(config.timing.push_timeout)
        .context("failed to set up notifier")?;
    let lights = StatusLights::new(LogIndicator::new("info"), LogIndicator::new("error"));

    let mut controller = Controller::new(
        reader,
        HostNetwork::new(args.broadcast),
        notifier,
        lights,
        SystemClock::new(),
        config,
    );
    controller.run()
}
