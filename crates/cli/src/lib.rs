//! # slotdb
//!
//! Command-line front end for a single-file, fixed-slot address database.
//!
//! ```text
//! slotdb [--sync] <path> <verb> [params...]
//!
//!   c [--max-data N] [--max-rows N]   create (or truncate) with every slot empty
//!   g <id>                            print one record
//!   s <id> <name> <email>             occupy an empty slot
//!   d <id>                            empty a slot
//!   l [--verbose]                     print every occupied slot
//! ```
//!
//! Every invocation opens the file, runs exactly one operation and, for
//! mutations, rewrites the whole image before closing.

pub mod fatal;
pub mod store;

pub use store::{ErrorKind, Store, StoreError};
