//! relaymesh server binary.
//!
//! Reads a TOML configuration naming this node's SID and its interface
//! rules, binds every interface the rules match, and runs the production
//! event loop until killed.

use std::path::PathBuf;

use clap::Parser;
use relaymesh_core::{
    interface::{Interface, SocketType},
    Context, Environment, TokenBucket,
};
use relaymesh_server::{
    config::ServerConfig,
    discover,
    driver::Driver,
    system_env::SystemEnv,
    transport::{DgramTransport, FileTransport, Transport},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// relaymesh overlay server
#[derive(Parser, Debug)]
#[command(name = "relaymesh-server")]
#[command(about = "Delay-tolerant mesh overlay node")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "relaymesh.toml")]
    config: PathBuf,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let raw = std::fs::read_to_string(&args.config)?;
    let config: ServerConfig = toml::from_str(&raw)?;
    let self_sid = config.parse_self_sid()?;

    tracing::info!(self_sid = %self_sid, config = %args.config.display(), "relaymesh server starting");

    let env = SystemEnv::new();
    let mut context = Context::new(self_sid, env.clone());

    let discovered = discover::discover(&config.interfaces).unwrap_or_default();
    let mut transports = Vec::new();

    for (id, found) in discovered.into_iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let id = id as u8;
        let rule = found.rule.clone();

        let core_iface = Interface::new(
            id,
            found.name.clone(),
            rule.kind,
            rule.socket_type,
            rule.mtu,
            rule.tick_interval(),
            TokenBucket::new(4, rule.packet_interval()),
            rule.broadcast,
        );
        context.register_interface(core_iface);

        let transport = match rule.socket_type {
            SocketType::Dgram => {
                let bind_addr = found.bind_addr(rule.port);
                Transport::Dgram(DgramTransport::bind(id, bind_addr, rule.broadcast).await?)
            },
            SocketType::File => {
                let Some(path) = rule.path.clone() else {
                    tracing::warn!(interface = %found.name, "file interface rule missing `path`, skipping");
                    continue;
                };
                let local = found.bind_addr(rule.port);
                let env_for_roll = env.clone();
                Transport::File(
                    FileTransport::open(
                        id,
                        std::path::Path::new(&path),
                        local,
                        rule.broadcast_drop_rate,
                        rule.drop_unicasts,
                        move || {
                            #[allow(clippy::cast_precision_loss)]
                            let roll = f64::from(env_for_roll.random_u32()) / f64::from(u32::MAX);
                            roll as f32
                        },
                    )
                    .await?,
                )
            },
            SocketType::Stream => {
                tracing::warn!(
                    interface = %found.name,
                    "stream interfaces require an externally established connection; skipping auto-discovery"
                );
                continue;
            },
        };

        transports.push((id, transport));
    }

    let mut driver = Driver::new(context);
    for (id, transport) in transports {
        driver.attach_transport(id, transport);
    }

    driver.run().await?;
    Ok(())
}
