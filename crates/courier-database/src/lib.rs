//! # courier-database
//!
//! PostgreSQL connection management and the session repository used when
//! `session.backend = "postgres"`.

pub mod connection;
pub mod migration;
pub mod session;

pub use connection::DatabasePool;
pub use migration::run_migrations;
pub use session::PgSessionRepository;
