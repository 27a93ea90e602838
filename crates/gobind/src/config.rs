//! Process-wide binding configuration.

use std::env;

use lazy_static::lazy_static;
use parking_lot::RwLock;

/// What a wrapper accessor does when its object fails the type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypecheckPolicy {
    /// Log the mismatch and let the native call go ahead
    #[default]
    Warn,
    /// Panic on the mismatch
    Strict,
}

impl TypecheckPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Some(TypecheckPolicy::Warn),
            "strict" => Some(TypecheckPolicy::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    pub typecheck: TypecheckPolicy,
    /// Log every trampoline dispatch at `trace`
    pub trace_dispatch: bool,
}

impl BridgeConfig {
    /// Reads `GOBIND_TYPECHECK` and `GOBIND_TRACE_DISPATCH`; unset or
    /// unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = BridgeConfig::default();
        if let Ok(policy) = env::var("GOBIND_TYPECHECK") {
            match TypecheckPolicy::parse(&policy) {
                Some(policy) => config.typecheck = policy,
                None => log::warn!("ignoring GOBIND_TYPECHECK={:?}, expected 'warn' or 'strict'", policy),
            }
        }
        if let Ok(trace) = env::var("GOBIND_TRACE_DISPATCH") {
            config.trace_dispatch = matches!(trace.trim(), "1" | "true" | "yes");
        }
        config
    }
}

lazy_static! {
    static ref CONFIG: RwLock<BridgeConfig> = RwLock::new(BridgeConfig::default());
}

/// Install the configuration for the whole process.
pub fn init(config: BridgeConfig) {
    log::debug!("bridge config: {:?}", config);
    *CONFIG.write() = config;
}

pub fn current() -> BridgeConfig {
    CONFIG.read().clone()
}

pub(crate) fn typecheck_policy() -> TypecheckPolicy {
    CONFIG.read().typecheck
}

pub(crate) fn trace_dispatch() -> bool {
    CONFIG.read().trace_dispatch
}
