//! Error handling for Parley
//!
//! Nothing inside the coordination engine is fatal to the process. Errors fall
//! into a few groups, and each group has a fixed handling policy:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Parley Error Taxonomy                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Inbound               │  Outbound            │  Local commands  │
//! │  ┌─────────────────┐   │  ┌────────────────┐  │  ┌────────────┐  │
//! │  │ • Decode        │   │  │ • SendFailure  │  │  │ • NotJoined│  │
//! │  │ • Protocol      │   │  │ • Transport    │  │  │ • Banned   │  │
//! │  │   violation     │   │  │   closed, IO   │  │  │ • Vote ... │  │
//! │  └─────────────────┘   │  └────────────────┘  │  └────────────┘  │
//! │  drop + log, continue  │  log, never retried  │  sync rejection  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Timeouts (election OK-wait, Berkeley collection window, join wait) never
//! surface as errors from the engine; each has a fallback policy in the
//! component that owns it.

pub mod constructors;
pub mod conversions;
pub mod types;

pub use types::{ParleyError, ParleyResult};
