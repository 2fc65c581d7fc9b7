//! Host-layer glue for `evlist`.
//!
//! The core crate consumes ready-made lock and publisher handles; this
//! crate is where they are made and where a host persistence layer plugs
//! in:
//!
//! - [`config`]: TOML + environment configuration.
//! - [`category`]: named categories sharing one lock and one publisher.
//! - [`factory`]: list factories, unshared or per category.
//! - [`collection`]: the collection-type adapter a host calls to
//!   instantiate, wrap and merge lists.

pub mod category;
pub mod collection;
pub mod config;
pub mod error;
pub mod factory;

pub use category::{CategoryRegistry, ListCategory};
pub use collection::CollectionType;
pub use config::{load_config, parse_config, Config, ConfigError};
pub use error::HostError;
pub use factory::{factory_from_config, CategoryListFactory, DefaultListFactory, ListFactory};
