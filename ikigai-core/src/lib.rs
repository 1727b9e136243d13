//! Everything behind the REPL binary: `Result`/`Error`, the text/scrollback
//! stack, the input/rendering stack, provider adapters, the async HTTP
//! engine, the agent/REPL state machine, session persistence, the debug-pipe
//! fan-in, and the rotating conversation logger (spec §4).
//!
//! `ikigai-cli` only ever constructs a [`repl::Repl`] and runs it; every
//! other module here is an implementation detail reachable through that one
//! entry point, with the exception of `error::{Error, Category, Result}`
//! which every crate in the workspace converts into.

pub mod agent;
pub mod arrow_burst;
pub mod completion;
pub mod debug_pipe;
pub mod error;
pub mod history;
pub mod http_engine;
pub mod input;
pub mod layer_cake;
pub mod logger;
pub mod provider;
pub mod renderer;
pub mod repl;
pub mod request;
pub mod scrollback;
pub mod session;
pub mod terminal;
pub mod textbuffer;
pub mod width;

pub use error::{Category, Error, Result};
