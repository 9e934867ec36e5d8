//! Parallel plugin decoding
//!
//! Decoding is independent per file, so every plugin of a load order is read
//! and decoded on the rayon pool. Results come back in input order.

use crate::formid::PluginName;
use crate::limits::{CancellationToken, DecodeLimits};
use crate::plugin::Plugin;
use crate::source::PluginSource;
use crate::{Error, Result};
use rayon::prelude::*;

/// Read and decode `names` from `source` in parallel
///
/// Each plugin gets its own result; a plugin that fails to read or decode
/// does not stop the others. The token is checked before each plugin, and
/// once it is set the whole call fails with [`Error::Cancelled`].
///
/// # Examples
///
/// ```
/// use tes_plugin::limits::{CancellationToken, DecodeLimits};
/// use tes_plugin::parallel::decode_plugins;
/// use tes_plugin::source::MemorySource;
/// use tes_plugin::{EncodeOptions, Plugin, PluginName};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let master = Plugin::new(PluginName::new("Skyrim.esm")).encode(&EncodeOptions::default())?;
/// let source = MemorySource::new().with("Skyrim.esm", master);
/// let names = vec![PluginName::new("Skyrim.esm"), PluginName::new("Missing.esp")];
///
/// let results = decode_plugins(&names, &source, &DecodeLimits::default(), &CancellationToken::new())?;
/// assert!(results[0].1.is_ok());
/// assert!(results[1].1.is_err());
/// # Ok(())
/// # }
/// ```
pub fn decode_plugins(
    names: &[PluginName],
    source: &dyn PluginSource,
    limits: &DecodeLimits,
    cancellation: &CancellationToken,
) -> Result<Vec<(PluginName, Result<Plugin>)>> {
    let results: Vec<(PluginName, Result<Plugin>)> = names
        .par_iter()
        .map(|name| {
            let result = cancellation.check().and_then(|()| {
                let bytes = source.read_plugin(name)?;
                Plugin::decode(name.clone(), &bytes, limits)
            });
            (name.clone(), result)
        })
        .collect();

    if cancellation.is_cancelled() {
        log::info!("Decoding cancelled");
        return Err(Error::Cancelled);
    }
    for (name, result) in &results {
        if let Err(e) = result {
            log::warn!("Cannot load {name}: {e}");
        }
    }
    Ok(results)
}
