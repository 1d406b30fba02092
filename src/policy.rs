//! Wrapper naming and wrapper source configuration.
//!
//! The two realised passes run the same rewrite; they only differ in which
//! wrapper function each target export is handed to and where that function
//! is imported from.

use serde::{Deserialize, Serialize};

use crate::target::{Surface, TargetName};

pub const SERVER_WRAPPER_SOURCE: &str = "react-router-devtools/server";
pub const CLIENT_WRAPPER_SOURCE: &str = "react-router-devtools/client";
pub const CONTEXT_WRAPPER_SOURCE: &str = "react-router-devtools/context";

/// Maps each target export to a wrapper symbol and the module exporting it.
///
/// Wrapper names are `with<Target><infix>Wrapper`, e.g. `withLoaderWrapper`
/// for an empty infix or `withLoaderContextWrapper` for `Context`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapperPolicy {
    #[serde(default)]
    pub infix: String,
    pub server_source: String,
    pub client_source: String,
}

impl WrapperPolicy {
    /// Server/client instrumentation wrappers.
    pub fn instrumentation() -> Self {
        Self {
            infix: String::new(),
            server_source: SERVER_WRAPPER_SOURCE.to_string(),
            client_source: CLIENT_WRAPPER_SOURCE.to_string(),
        }
    }

    /// Context-injection wrappers, all served from one module.
    pub fn context() -> Self {
        Self {
            infix: "Context".to_string(),
            server_source: CONTEXT_WRAPPER_SOURCE.to_string(),
            client_source: CONTEXT_WRAPPER_SOURCE.to_string(),
        }
    }

    pub fn wrapper_name(&self, target: TargetName) -> String {
        format!("with{}{}Wrapper", target.pascal_case(), self.infix)
    }

    pub fn wrapper_source(&self, target: TargetName) -> &str {
        match target.surface() {
            Surface::Server => &self.server_source,
            Surface::Client => &self.client_source,
        }
    }
}

/// The two wrapper passes shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PassKind {
    #[default]
    Instrumentation,
    Context,
}

impl PassKind {
    pub fn policy(self) -> WrapperPolicy {
        match self {
            PassKind::Instrumentation => WrapperPolicy::instrumentation(),
            PassKind::Context => WrapperPolicy::context(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrumentation_routes_surfaces_to_separate_modules() {
        let policy = WrapperPolicy::instrumentation();
        assert_eq!(policy.wrapper_name(TargetName::Loader), "withLoaderWrapper");
        assert_eq!(policy.wrapper_name(TargetName::ClientAction), "withClientActionWrapper");
        assert_eq!(policy.wrapper_source(TargetName::Action), SERVER_WRAPPER_SOURCE);
        assert_eq!(policy.wrapper_source(TargetName::ClientLoader), CLIENT_WRAPPER_SOURCE);
    }

    #[test]
    fn context_uses_one_module() {
        let policy = WrapperPolicy::context();
        assert_eq!(policy.wrapper_name(TargetName::Loader), "withLoaderContextWrapper");
        for target in TargetName::ALL {
            assert_eq!(policy.wrapper_source(target), CONTEXT_WRAPPER_SOURCE);
        }
    }

    #[test]
    fn policy_deserializes_from_camel_case_json() {
        let policy: WrapperPolicy = serde_json::from_str(
            r#"{ "infix": "Trace", "serverSource": "trace/server", "clientSource": "trace/client" }"#,
        )
        .unwrap();
        assert_eq!(policy.wrapper_name(TargetName::Action), "withActionTraceWrapper");
        assert_eq!(policy.wrapper_source(TargetName::ClientAction), "trace/client");

        let kind: PassKind = serde_json::from_str(r#""context""#).unwrap();
        assert_eq!(kind.policy(), WrapperPolicy::context());
    }
}
