//! livesurface - keeps an interactive chat message in sync with server state
//!
//! A session owns a set of declared units (content, controls, composites),
//! renders them into a surface, and pushes only what changed to the remote
//! message while clicks, auto-refresh ticks, expiry clocks and external
//! cancellation compete to mutate it.
//!
//! The transport is an adapter behind [`remote::Responder`] and
//! [`remote::MessageHandle`]; the demo binary is in `bin/livesurface-demo.rs`.

pub mod builder;
pub mod component;
pub mod config;
pub mod error;
pub mod remote;
pub mod render;
pub mod session;

mod sync;

pub use builder::Builder;
pub use component::{ComponentId, CompositeUnit, ContentUnit, ControlUnit, Unit};
pub use config::SessionConfig;
pub use error::{Result, SurfaceError};
pub use remote::{Interaction, MessageHandle, MessageId, Responder, UserId, Visibility};
pub use render::{PendingDelta, Snapshot};
pub use session::{CancelCause, Session, SessionOptions, SessionRegistry};
