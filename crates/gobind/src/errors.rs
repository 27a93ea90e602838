use std::ffi::NulError;

use thiserror::Error;

/// Recoverable failures crossing the native boundary.
///
/// Conditions that indicate a broken program (tag mismatch on typed
/// extraction, handler arity mismatch, a dispatch for an unregistered
/// closure) are panics instead.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A native call returned NULL where a value was expected
    #[error("unexpected nil pointer")]
    NullPointer,

    /// No conversion exists between the native and managed representations
    #[error("conversion not implemented for {0}")]
    ConversionNotImplemented(String),

    #[error("invalid type: {actual} is not a(n) {expected}")]
    InvalidType { expected: String, actual: String },

    #[error("unrecognized class name '{0}'")]
    UnknownClass(String),

    #[error("unknown type name '{0}'")]
    UnknownType(String),

    #[error("signal '{signal}' is not defined for type {type_name}")]
    UnknownSignal { signal: String, type_name: String },

    #[error("property '{property}' is not defined for type {type_name}")]
    UnknownProperty { property: String, type_name: String },

    #[error("property '{property}' of {type_name} is not {access}")]
    PropertyAccess {
        property: String,
        type_name: String,
        access: &'static str,
    },

    #[error("invalid property name '{0}'")]
    InvalidPropertyName(String),

    /// Properties can only be installed on classes whose storage the binding owns
    #[error("class {0} was not registered through the binding")]
    ForeignClass(String),

    #[error("signal '{signal}' takes {expected} arguments, {given} given")]
    ArgumentCount {
        signal: String,
        expected: usize,
        given: usize,
    },

    /// Argument conversion failed at a position
    #[error("argument {index}: {source}")]
    Argument {
        index: usize,
        #[source]
        source: Box<BridgeError>,
    },

    #[error("string contains an interior nul byte")]
    InteriorNul(#[from] NulError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
