use crate::registry::{ProviderRegistry, RegistryError};

#[cfg(feature = "meta")]
pub mod meta;

#[cfg(feature = "exotel")]
pub mod exotel;

/// Registers every adapter enabled through cargo features.
#[allow(unused_variables)]
pub fn register_all(registry: &mut ProviderRegistry) -> Result<(), RegistryError> {
    #[cfg(feature = "meta")]
    meta::register(registry)?;
    #[cfg(feature = "exotel")]
    exotel::register(registry)?;
    Ok(())
}
