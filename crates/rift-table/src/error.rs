//! Error types for the replicated table layer.

use rift_protocol::ModuleId;

/// Errors raised while writing, applying, or restoring table state.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// A key or record couldn't be turned into its wire form.
    #[error("encode failed for {module:?}: {source}")]
    Encode {
        module: ModuleId,
        #[source]
        source: serde_json::Error,
    },

    /// An incoming key or record didn't match the table's types.
    #[error("decode failed for {module:?}: {source}")]
    Decode {
        module: ModuleId,
        #[source]
        source: serde_json::Error,
    },

    /// A broadcast or snapshot was routed to the wrong table.
    #[error("broadcast for {got:?} applied to table {expected:?}")]
    WrongModule { expected: ModuleId, got: ModuleId },
}
