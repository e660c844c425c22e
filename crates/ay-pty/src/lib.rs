//! ay-pty — PTY Driver, Output Pipeline, Match Engine, and Auto-Responder for
//! a single supervised assistant child process.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use ay_core::AssistantProfile;
//! use ay_pty::driver::PtyDriver;
//! use ay_pty::logs::LogSinks;
//! use ay_pty::pipeline::Pipeline;
//! use std::path::Path;
//! use std::sync::{Arc, Mutex};
//! use std::time::Instant;
//!
//! let cwd = Path::new(".");
//! let profile = AssistantProfile::claude_default();
//! let logs = LogSinks::open(cwd, ay_core::Pid(0)).unwrap();
//! let pipeline = Arc::new(Mutex::new(Pipeline::new(&profile, logs, true).unwrap()));
//! let pipeline_for_data = Arc::clone(&pipeline);
//!
//! let driver = PtyDriver::spawn(
//!     &["claude".to_string()],
//!     cwd,
//!     80,
//!     24,
//!     move |bytes| {
//!         pipeline_for_data.lock().unwrap().on_chunk(bytes, Instant::now());
//!     },
//!     |_exit_code| {},
//! );
//! assert!(driver.is_ok() || driver.is_err());
//! ```

pub mod driver;
pub mod error;
pub mod logs;
pub mod matcher;
pub mod pipeline;
pub mod responder;
pub mod ring;
pub mod truncate;

pub use driver::PtyDriver;
pub use error::{PtyError, Result};
pub use logs::LogSinks;
pub use matcher::MatchEngine;
pub use pipeline::{ChunkOutcome, Pipeline};
pub use responder::AutoResponder;
pub use ring::RingBuffer;
