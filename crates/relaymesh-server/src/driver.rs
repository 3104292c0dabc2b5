//! Production event loop (spec §5): a single-threaded cooperative driver
//! that polls every registered transport plus a tick timer, feeding what it
//! reads into [`relaymesh_core::Context`] and executing the actions that
//! come back. No business logic lives here — this module only turns I/O
//! into core calls and core actions back into I/O.

use std::{collections::HashMap, net::SocketAddrV4, time::Duration};

use relaymesh_core::{Context, CoreAction, InterfaceId, Recipient};
use tracing::{debug, info, warn};

use crate::{error::ServerError, system_env::SystemEnv, transport::Transport};

/// How often the driver wakes up to run `Context::tick` and drain the
/// scheduler, independent of any single interface's own tick cadence.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Owns the overlay core and every interface's transport; runs the
/// production event loop.
pub struct Driver {
    context: Context<SystemEnv>,
    transports: HashMap<InterfaceId, Transport>,
}

impl Driver {
    /// Build a driver around an already-constructed core context.
    #[must_use]
    pub fn new(context: Context<SystemEnv>) -> Self {
        Self { context, transports: HashMap::new() }
    }

    /// Register an interface's transport, keyed by the interface id the
    /// core already knows it under (`Context::register_interface` must be
    /// called separately with the matching core-side
    /// [`relaymesh_core::Interface`]).
    pub fn attach_transport(&mut self, interface: InterfaceId, transport: Transport) {
        self.transports.insert(interface, transport);
    }

    /// Run until the process is killed. Per spec §7, decode and transport
    /// errors on a single interface are logged and do not stop the loop.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        info!(interfaces = self.transports.len(), "driver starting");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let actions = self.context.tick();
                    self.execute(actions).await;
                    self.drain_scheduler().await;
                }
                iface = self.poll_once() => {
                    if let Some(iface) = iface {
                        self.drain_scheduler().await;
                        debug!(interface = iface, "processed inbound traffic");
                    }
                }
            }
        }
    }

    /// Poll every attached transport once, handing decoded ensembles to the
    /// core. Returns the last interface that produced traffic, if any.
    async fn poll_once(&mut self) -> Option<InterfaceId> {
        let ids: Vec<InterfaceId> = self.transports.keys().copied().collect();
        let mut last = None;

        for id in ids {
            let Some(transport) = self.transports.get_mut(&id) else { continue };
            let received = match tokio::time::timeout(Duration::from_millis(10), transport.recv()).await {
                Ok(Ok(received)) => received,
                Ok(Err(err)) => {
                    warn!(interface = id, error = %err, "transport read failed");
                    continue;
                },
                Err(_) => continue,
            };

            for datagram in received {
                match self.context.handle_ensemble(id, datagram.from, &datagram.bytes) {
                    Ok(actions) => {
                        self.execute(actions).await;
                        last = Some(id);
                    },
                    Err(err) => {
                        debug!(interface = id, error = %err, "dropped malformed ensemble");
                    },
                }
            }
        }

        last
    }

    /// Drain the scheduler until it has nothing ready to send.
    async fn drain_scheduler(&mut self) {
        while let Some(action) = self.context.drain_one() {
            self.execute(vec![action]).await;
        }
    }

    async fn execute(&mut self, actions: Vec<CoreAction>) {
        for action in actions {
            if let Err(err) = self.execute_one(action).await {
                warn!(error = %err, "action execution failed");
            }
        }
    }

    async fn execute_one(&mut self, action: CoreAction) -> Result<(), ServerError> {
        match action {
            CoreAction::SendPacket { interface, recipient, bytes } => {
                let dest = self.resolve_recipient(recipient);
                if let Some(transport) = self.transports.get_mut(&interface) {
                    transport.send(dest, &bytes).await?;
                } else {
                    warn!(interface, "send requested on unregistered interface");
                }
                Ok(())
            },
            CoreAction::InterfaceTornDown { interface } => {
                info!(interface, "interface torn down");
                self.transports.remove(&interface);
                Ok(())
            },
            CoreAction::RequestPriorityAdvertisement { target } => {
                debug!(target = %target, "target became reachable, priority advertisement requested");
                Ok(())
            },
            CoreAction::ProbeUnicast { target } => {
                debug!(target = %target, "target became unreachable, unicast probe requested");
                Ok(())
            },
            CoreAction::ContentStoreAdvertReceived { from, .. } => {
                debug!(from = %from, "content-store advertisement received (out of core scope)");
                Ok(())
            },
            CoreAction::SendPleaseExplain { to, reason } => {
                self.send_please_explain(to, reason).await
            },
        }
    }

    /// Encode a one-hop PLEASE-EXPLAIN ensemble and send it back to the
    /// peer whose traffic prompted it (spec §7).
    async fn send_please_explain(
        &mut self,
        to: relaymesh_proto::Sid,
        reason: relaymesh_proto::payloads::please_explain::PleaseExplain,
    ) -> Result<(), ServerError> {
        let Some(subscriber) = self.context.subscribers().get(to) else {
            debug!(to = %to, "please-explain target has no known subscriber entry, dropping");
            return Ok(());
        };
        let Some(interface) = subscriber.interface() else {
            debug!(to = %to, "please-explain target has no direct interface, dropping");
            return Ok(());
        };
        let dest_addr = subscriber.last_address();

        let envelope = relaymesh_proto::Envelope {
            encap: relaymesh_proto::Encap::Single,
            sender: self.context.self_sid(),
            unicast: true,
            interface_number: None,
            sequence: None,
        };
        let header = relaymesh_proto::PayloadHeader {
            source: self.context.self_sid(),
            destination: Some(to),
            nexthop: Some(to),
            broadcast_id: None,
            one_hop: true,
            ttl: 1,
            queue: 0,
            frame_type: relaymesh_proto::payloads::TYPE_PLEASEEXPLAIN,
        };
        let bytes = relaymesh_proto::codec::encode(
            &envelope,
            &[(header, relaymesh_proto::DecodedPayload::PleaseExplain(reason))],
        );

        if let Some(transport) = self.transports.get_mut(&interface) {
            transport.send(dest_addr, &bytes).await?;
        } else {
            warn!(interface, "please-explain send requested on unregistered interface");
        }
        Ok(())
    }

    fn resolve_recipient(&self, recipient: Recipient) -> Option<SocketAddrV4> {
        match recipient {
            Recipient::Broadcast => None,
            Recipient::Unicast(sid) => self.context.subscribers().get(sid).and_then(|s| s.last_address()),
        }
    }
}
