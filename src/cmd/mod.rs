//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `run`    | `Run`            |
//! | `config` | `Config`         |
//! | `graph`  | `Graph`          |

pub mod config;
pub mod graph;
pub mod run;

pub use config::cmd_config;
pub use graph::cmd_graph;
pub use run::{RunArgs, cmd_run};
