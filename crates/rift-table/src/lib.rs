//! Authority-owned replicated tables.
//!
//! A [`ReplicatedTable`] is the one primitive every domain module is built
//! on: a key/value store that only the authority may write, whose every
//! write is applied locally and turned into a [`Broadcast`](rift_protocol::Broadcast)
//! that replicas apply with [`ReplicatedTable::apply`].
//!
//! ```text
//! authority                                   replica
//! ─────────                                   ───────
//! gate.command(|w| table.set(w, k, v))
//!   ├─ entries[k] = v          (visible now)
//!   └─ outbox ← Broadcast{seq}  ──transport──→ table.apply(&b)
//!                                               └─ seq > seen[k]? set : ignore
//! ```

mod cell;
mod error;
mod ids;
mod table;
mod writer;

pub use cell::ReplicatedCell;
pub use error::TableError;
pub use ids::{IdAllocator, IdSpace};
pub use table::{ApplyOutcome, Replica, ReplicatedTable};
pub use writer::{AuthorityGate, Outbox, Writer};
