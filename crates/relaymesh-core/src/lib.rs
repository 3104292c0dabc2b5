//! Overlay state machine for a delay-tolerant mesh node (spec §3-§4).
//!
//! This crate owns everything stateful about one node's view of the
//! overlay — subscribers, the per-neighbour link table, the multi-hop
//! route table, outbound queues and the packet scheduler — but never
//! touches a socket or a clock directly. Every state transition is an
//! "action pattern" method: it takes `&mut self` plus an event or a time,
//! and returns the [`context::CoreAction`]s the caller (a production
//! driver in `relaymesh-server`, or the simulation harness) must execute.
//! Time and randomness are supplied through the [`env::Environment`]
//! trait so the same logic runs unmodified under a real clock and under a
//! virtual one.

pub mod broadcast_dedup;
pub mod context;
pub mod env;
pub mod error;
pub mod frame;
pub mod interface;
pub mod neighbour;
pub mod node;
pub mod queue;
pub mod route_table;
pub mod scheduler;
pub mod subscriber;
pub mod token_bucket;

pub use broadcast_dedup::BroadcastDedup;
pub use context::{Context, CoreAction};
pub use env::Environment;
pub use error::CoreError;
pub use frame::Frame;
pub use interface::{Interface, InterfaceId, InterfaceKind, InterfaceState, SocketType};
pub use neighbour::NeighbourTable;
pub use node::{BestPath, Node};
pub use queue::{OutboundQueues, QueueClass};
pub use route_table::{RouteTable, RouteTransition};
pub use scheduler::{PacketPlan, Recipient, Scheduler};
pub use subscriber::{Reachability, Subscriber, SubscriberTable};
pub use token_bucket::TokenBucket;
