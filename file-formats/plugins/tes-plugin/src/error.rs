//! Error types for the plugin library

use crate::formid::{FormId, GlobalFormId, PluginName};
use crate::records::FieldGroup;
use crate::signature::Signature;
use std::io;
use thiserror::Error;

/// Result type alias for plugin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for plugin operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Group or record length fields disagree with the byte stream
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// A compressed record payload could not be inflated
    #[error("Unsupported compression in {signature} record {form_id}: {reason}")]
    UnsupportedCompression {
        /// Record signature
        signature: Signature,
        /// Raw form id of the record
        form_id: FormId,
        /// Underlying inflate failure
        reason: String,
    },

    /// Inflated payload length differs from the declared prefix
    #[error("Size mismatch in {signature} record {form_id}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Record signature
        signature: Signature,
        /// Raw form id of the record
        form_id: FormId,
        /// Declared decompressed size
        expected: u64,
        /// Actual decompressed size
        actual: u64,
    },

    /// A sub-record payload has the wrong width for its field layout
    #[error("Field size mismatch in {record}.{field}: expected {expected} bytes, got {actual}")]
    FieldSizeMismatch {
        /// Record signature
        record: Signature,
        /// Sub-record signature
        field: Signature,
        /// Width required by the layout
        expected: usize,
        /// Width found in the file
        actual: usize,
    },

    /// A field name is not part of the category's layout
    #[error("{record} has no field named {field:?}")]
    UnknownField {
        /// Record signature
        record: Signature,
        /// Requested field name
        field: String,
    },

    /// A field value has the wrong kind for its layout slot
    #[error("Field {record}.{field} expects {expected}")]
    FieldType {
        /// Record signature
        record: Signature,
        /// Field name
        field: String,
        /// Expected value kind
        expected: &'static str,
    },

    /// Field access on a record the model keeps as raw sub-records
    #[error("{0} record has no typed fields")]
    OpaqueRecord(Signature),

    /// Decoding would exceed a configured resource limit
    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    /// A form id points past the end of its plugin's master list
    #[error("Master index {index:#04x} out of range in {plugin} ({masters} masters)")]
    MasterIndexOutOfRange {
        /// Plugin the id was read from
        plugin: PluginName,
        /// High byte of the form id
        index: u8,
        /// Number of masters the plugin declares
        masters: usize,
    },

    /// A declared master is absent from the load order or was itself rejected
    #[error("{plugin} requires master {master}, which is not active or could not be resolved")]
    MissingMaster {
        /// Plugin being resolved
        plugin: PluginName,
        /// Master it needs
        master: PluginName,
    },

    /// A declared master loads at or after its dependent
    #[error("{plugin} requires master {master}, which is not loaded before it")]
    MasterOrderViolation {
        /// Plugin being resolved
        plugin: PluginName,
        /// Master that is out of order
        master: PluginName,
    },

    /// The same plugin name appears more than once in a load order
    #[error("Plugin {0} appears more than once in the load order")]
    DuplicatePlugin(PluginName),

    /// A global id cannot be expressed in the target plugin's master list
    #[error("{id} cannot be referenced from {plugin}: {master} is not one of its masters")]
    UnknownMaster {
        /// Plugin whose context was used
        plugin: PluginName,
        /// Plugin that owns the id
        master: PluginName,
        /// Id being localized
        id: GlobalFormId,
    },

    /// A plugin was excluded from the run because its masters did not resolve
    #[error("Records of {plugin} skipped: {cause}")]
    UnresolvedMaster {
        /// Plugin whose records were skipped
        plugin: PluginName,
        /// Why the plugin could not be resolved
        cause: Box<Error>,
    },

    /// Two contributors asked for opposite strategies on the same field group
    #[error("Incompatible merge policy for {group:?} on {id}: {merge} asks to merge, {replace} asks to override")]
    IncompatibleMergePolicy {
        /// Record affected
        id: GlobalFormId,
        /// Field group in dispute
        group: FieldGroup,
        /// A plugin requesting a field merge
        merge: PluginName,
        /// A plugin requesting a plain override
        replace: PluginName,
    },

    /// The patch would reference more masters than the format allows
    #[error("Patch needs {count} masters, but the limit is {limit}")]
    TooManyMasters {
        /// Number of masters required
        count: usize,
        /// Maximum allowed for the container kind
        limit: usize,
    },

    /// Error raised while processing a specific plugin
    #[error("{plugin}: {source}")]
    Plugin {
        /// Plugin that failed
        plugin: PluginName,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// A plugin source has no file for the requested name
    #[error("Plugin not found: {0}")]
    PluginNotFound(PluginName),

    /// Configuration value is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The operation was cancelled before it completed
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a new MalformedContainer error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedContainer(msg.into())
    }

    /// Create a new ResourceLimit error
    pub fn resource_limit<S: Into<String>>(msg: S) -> Self {
        Error::ResourceLimit(msg.into())
    }

    /// Attach the name of the plugin being processed
    pub fn in_plugin(self, plugin: &PluginName) -> Self {
        match self {
            // Already tagged, keep the innermost name
            Error::Plugin { .. } => self,
            other => Error::Plugin {
                plugin: plugin.clone(),
                source: Box::new(other),
            },
        }
    }

    /// Check if this error indicates a corrupted byte stream
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::Plugin { source, .. } => source.is_corruption(),
            _ => matches!(
                self,
                Error::MalformedContainer(_)
                    | Error::UnsupportedCompression { .. }
                    | Error::SizeMismatch { .. }
                    | Error::FieldSizeMismatch { .. }
            ),
        }
    }

    /// Check if the run can continue by excluding the affected plugin or record
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Plugin { source, .. } => source.is_recoverable(),
            _ => matches!(
                self,
                Error::MasterIndexOutOfRange { .. }
                    | Error::MissingMaster { .. }
                    | Error::MasterOrderViolation { .. }
                    | Error::UnresolvedMaster { .. }
                    | Error::IncompatibleMergePolicy { .. }
            ),
        }
    }
}
