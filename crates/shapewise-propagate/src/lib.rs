//! # shapewise-propagate: Configuration propagation
//!
//! After a successful swap the new [`ConfigurationDocument`] is published to
//! every cluster member. Delivery is at-least-once and idempotent: a
//! [`MemberCache`] applies an incoming document only if its version is
//! greater than the cached one, so duplicates and reordering are harmless.
//!
//! ```text
//!   ConfigurationStore ──cas ok──► Propagator ──broadcast──► MemberCache (×N)
//!           ▲                                                   │
//!           └──────────── pull (lagged / stale session) ◄───────┘
//! ```
//!
//! Readers go through a [`ReadSession`], which remembers the highest
//! version it has observed. If the member's cache is behind that version
//! the session pulls from the authoritative [`ConfigurationSource`], so a
//! session never reads a version older than one it already saw.
//!
//! Members here are in-process. A network transport would sit behind the
//! same publish/pull seam.

pub mod member;
pub mod publisher;
pub mod session;
pub mod source;

#[cfg(test)]
mod tests;

pub use member::{Member, MemberCache, MemberId};
pub use publisher::{DEFAULT_CHANNEL_CAPACITY, Propagator, Subscription};
pub use session::ReadSession;
pub use source::ConfigurationSource;

#[doc(no_inline)]
pub use shapewise_types::ConfigurationDocument;
