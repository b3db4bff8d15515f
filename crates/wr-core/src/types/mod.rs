//! Domain types for the watch relay.
//!
//! # Module Organization
//!
//! - [`change`] - Filesystem change events and kinds
//! - [`ids`] - Chat platform identifiers
//! - [`notification`] - Digest fields and pages
//!
//! All public types are re-exported at the crate root:
//!
//! ```
//! use wr_core::{ChangeEvent, ChangeKind, ChannelId, NotificationPage};
//! ```

mod change;
mod ids;
mod notification;

pub use change::{ChangeEvent, ChangeKind};
pub use ids::{ChannelId, UserId};
pub use notification::{NotificationField, NotificationPage};
