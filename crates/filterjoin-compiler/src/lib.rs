//! Filterjoin compiler: declarative joins → nested filterjoin clauses
//!
//! ## Pipeline
//!
//! ```text
//!  query document
//!        │
//!        ▼
//!  ┌─────────────┐   join_set / join_sequence occurrences (with pointers)
//!  │  document   │──────────────────────────────┐
//!  │  ::locate   │                              │
//!  └─────────────┘                              ▼
//!                                    ┌─────────────────────┐
//!                                    │ filterjoin_dsl      │ parse + verify
//!                                    └─────────────────────┘
//!                                               │
//!                          ┌────────────────────┴────────────────────┐
//!                          ▼                                         ▼
//!                 ┌─────────────────┐                      ┌──────────────────┐
//!                 │ join_set        │  DFS from the focus  │ join_sequence    │ tail outermost
//!                 └─────────────────┘                      └──────────────────┘
//!                          └──────────────┬──────────────────────────┘
//!                                         ▼
//!                                ┌─────────────────┐
//!                                │ node            │ FilterJoinNode tree
//!                                └─────────────────┘
//!                                         │ clause array
//!                                         ▼
//!                                ┌─────────────────┐
//!                                │ document::splice│ written back in place
//!                                └─────────────────┘
//! ```
//!
//! Compilation is pure and synchronous: no I/O, no shared state between
//! calls. Identifier lookups against external stores happen before a
//! document reaches this crate.

pub mod config;
pub mod document;
pub mod error;
pub mod join_sequence;
pub mod join_set;
pub mod msearch;
pub mod node;
pub mod rewrite;

pub use config::{CompilerConfig, ConfigError};
pub use document::{locate, splice, Located};
pub use error::CompileError;
pub use msearch::MsearchRewrite;
pub use node::{AttachmentPoint, FilterJoinNode, RootClauses, TargetQuery, MAX_JOIN_DEPTH};
pub use rewrite::{JoinCompiler, RewriteReport};

pub use filterjoin_dsl as dsl;
