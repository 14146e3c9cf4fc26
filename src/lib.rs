// #![warn(missing_docs)]

//! Typed request dispatch and argument marshaling for AIDA-PVA channel providers.
//!
//! AIDA-PVA serves SLC control system devices as named channels. A request for a
//! channel arrives as a channel name and a bag of untyped `NAME=VALUE` string
//! arguments, and has to be answered by exactly one typed operation on the
//! provider that hosts the channel. This crate is the layer in between:
//!
//! - The data model moving through a request, in [types], [value], [arguments]
//!   and [table].
//! - A [scanner] turning the argument bag into typed values, described by a list
//!   of [`scanner::FieldSpec`]s rather than a format string.
//! - [`ChannelProvider`], the trait a backend implements, with one method per
//!   shape of result. Example [providers] are included for SLC klystrons,
//!   buffered BPM acquisition and the master oscillator, each generic over the
//!   device library it drives. [`providers::sim`] has in-memory versions of
//!   those libraries.
//! - [`AidaService`], which validates a request against the [channels] file and
//!   routes it to the provider.
//!
//! Every failure is an [`AidaError`] of one of the six exception kinds that
//! AIDA clients understand.
//!
//! ## Example
//!
//! Reading the status of a simulated klystron:
//!
//! ```
//! use aidars::{
//!     Arguments, ServiceBuilder,
//!     channels::ChannelRegistry,
//!     providers::{KlystronProvider, sim::SimulatedKlystrons},
//!     value::{Payload, Scalar},
//! };
//!
//! let registry = ChannelRegistry::from_toml(
//!     r#"
//!     name = "SLC Klystron"
//!
//!     [[channel]]
//!     names = ["KLYS:*:*:TACT"]
//!     getter = { type = "SCALAR", arguments = ["BEAM", "DGRP"] }
//!     "#,
//! )
//! .unwrap();
//! let mut service = ServiceBuilder::new(KlystronProvider::new(SimulatedKlystrons::sector()))
//!     .channels(registry)
//!     .start()
//!     .unwrap();
//!
//! let arguments = Arguments::new().with("TYPE", "STRING").with("BEAM", "1");
//! let status = service.request("KLYS:LI31:31:TACT", &arguments).unwrap();
//! assert_eq!(status, Payload::Scalar(Scalar::String("activated".into())));
//! ```

pub mod arguments;
pub mod channels;
pub mod error;
pub mod providers;
pub mod scanner;
pub mod table;
pub mod types;
pub mod uri;
pub mod value;
pub mod vms;

mod service;
mod utils;

pub use crate::arguments::{Argument, Arguments};
pub use crate::error::{AidaError, ExceptionKind, Fault, NativeStatus};
pub use crate::providers::ChannelProvider;
pub use crate::service::{AidaService, ServiceBuilder, TYPE_ARGUMENT, VALUE_ARGUMENT};
pub use crate::table::{Table, TableBuilder};
pub use crate::types::{AidaType, Config, Layout};
pub use crate::utils::get_default_log_level;
pub use crate::value::{Payload, Value};
