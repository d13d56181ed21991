//! Provider registry, adapter trait and the Meta/Exotel WhatsApp adapters.

pub mod errors;
mod http;
mod normalize;
pub mod providers;
pub mod registry;
pub mod traits;
mod wire;

pub use errors::{ErrorKind, ProviderError};
pub use registry::{AdapterFactory, ProviderRegistry, RegistryError};
pub use traits::ProviderAdapter;

#[cfg(feature = "exotel")]
pub use providers::exotel::ExotelAdapter;
#[cfg(feature = "meta")]
pub use providers::meta::MetaAdapter;
