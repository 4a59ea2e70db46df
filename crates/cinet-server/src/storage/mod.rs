//! Persistence backends for the ciNet ingestion server.
//!
//! `cinet_core::Persistence` is the trait; this module holds concrete
//! implementations. `MemoryPersistence` is the only one shipped here — a
//! real backend (Postgres, SQLite, whatever `DATABASE_URL` names) is out of
//! scope, the core only depends on the trait.

mod memory;

pub use memory::MemoryPersistence;
