//! # CLI Module
//!
//! Command-line access to the engine for operators and CI pipelines.
//!
//! ## Commands
//!
//! ### `check`
//!
//! Compile every schema of a route table and report configuration errors:
//!
//! ```bash
//! brrtschema check --routes routes.yaml
//! ```
//!
//! Exit code `0` when the table registers cleanly, `1` otherwise.
//!
//! ### `validate`
//!
//! Run one validator against a JSON value and print the report:
//!
//! ```bash
//! brrtschema validate --routes routes.yaml \
//!     --method GET --path '/users/{id}' \
//!     --surface query --value '{"limit": "10"}'
//! ```
//!
//! Exit code `0` for a valid value, `2` for an invalid one and `1` when the
//! route table or the arguments are unusable.
//!
//! Both commands read engine settings from `--config <yaml>` when given, and
//! from `BRRTS_*` environment variables otherwise.

mod commands;


pub use commands::{run, Cli, Commands, EXIT_CONFIG_ERROR, EXIT_INVALID, EXIT_OK};
