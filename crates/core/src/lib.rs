pub mod config;
pub mod error;
pub mod kind;
pub mod normalize;
pub mod remote;

pub use config::Config;
pub use error::*;
pub use kind::Kind;
pub use normalize::{NameNormalizer, NormalizeOptions, Normalizer, UriNormalizer};
pub use remote::{RemoteObject, RemoteObjectFetcher, RemoteObjectLister};
