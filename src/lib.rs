#![warn(clippy::pedantic)]
// Noisy doc/signature lints
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Timestamps, coordinates and byte counts cross integer/float widths on purpose
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
// foo::FooStore naming
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod cli;
pub mod config;
pub mod context;
pub mod deadline;
pub mod delivery;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod idempotency;
pub mod providers;
pub mod replies;
pub mod router;
pub mod store;
pub mod telemetry;
pub(crate) mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
