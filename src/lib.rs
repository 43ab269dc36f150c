//! # Lectern
//!
//! A retrieval-augmented assistant for course materials.
//!
//! Lectern ingests plain-text course documents into a chunked, embedded
//! SQLite index and answers questions about them by driving a chat model
//! through a small set of retrieval tools, citing the lessons each answer
//! came from.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Course docs  │──▶│   Pipeline    │──▶│    SQLite      │
//! │ Title/Lesson │   │ Parse+Chunk  │   │ catalog+chunks │
//! └──────────────┘   │   +Embed     │   └───────┬───────┘
//!                    └──────────────┘           │
//!                                        ┌──────┴──────┐
//!                    ┌──────────────┐    ▼             ▼
//!                    │  Chat model  │◀─ tools ──┐ ┌──────────┐
//!                    │ (tool loop)  │── calls ──┘ │ CLI/HTTP  │
//!                    └──────────────┘             └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lectern init                        # create database
//! lectern ingest ./docs               # load a folder of course documents
//! lectern courses                     # list the catalog
//! lectern search "ownership" --course rust
//! lectern ask "What does lesson 2 of the Rust course cover?"
//! lectern serve                       # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`parse`] | Course document parser |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Catalog and content indexes |
//! | [`tools`] | Retrieval tools offered to the model |
//! | [`chat`] | Chat provider abstraction |
//! | [`session`] | Conversation history |
//! | [`orchestrator`] | The answer loop |
//! | [`ingest`] | Document and folder ingestion |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod orchestrator;
pub mod parse;
pub mod server;
pub mod session;
pub mod store;
pub mod tools;
