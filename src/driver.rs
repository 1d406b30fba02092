//! Pass drivers: parse, inject wrappers, print.
//!
//! Drivers never fail. Whatever goes wrong inside a pass, the caller gets the
//! source text it passed in.

use std::panic::{catch_unwind, AssertUnwindSafe};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::{Result, TransformError},
    inject::WrapperInjector,
    policy::{PassKind, WrapperPolicy},
    syntax::{parse, print, with_globals},
};

/// Transformed code plus an optional source map (v3 JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformOutput {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
}

impl TransformOutput {
    pub fn unchanged(source: &str) -> Self {
        Self {
            code: source.to_string(),
            map: None,
        }
    }

    /// The code with the map appended as a `data:` URL comment.
    pub fn code_with_inline_map(&self) -> String {
        match &self.map {
            Some(map) => format!(
                "{}\n//# sourceMappingURL=data:application/json;base64,{}\n",
                self.code.trim_end(),
                STANDARD.encode(map)
            ),
            None => self.code.clone(),
        }
    }
}

/// One configured wrapper pass.
#[derive(Debug, Clone)]
pub struct RoutePass {
    pub policy: WrapperPolicy,
    pub source_maps: bool,
}

impl RoutePass {
    pub fn new(policy: WrapperPolicy) -> Self {
        Self {
            policy,
            source_maps: true,
        }
    }

    pub fn instrumentation() -> Self {
        Self::new(WrapperPolicy::instrumentation())
    }

    pub fn context() -> Self {
        Self::new(WrapperPolicy::context())
    }

    pub fn from_kind(kind: PassKind) -> Self {
        Self::new(kind.policy())
    }

    pub fn with_source_maps(mut self, source_maps: bool) -> Self {
        self.source_maps = source_maps;
        self
    }

    /// Runs the pass; falls back to `source` on any failure.
    pub fn transform(&self, source: &str, route_id: &str, file_id: &str) -> TransformOutput {
        match self.try_transform(source, route_id, file_id) {
            Ok(Some(output)) => output,
            Ok(None) => {
                debug!(file = file_id, "no target exports wrapped, returning source unchanged");
                TransformOutput::unchanged(source)
            }
            Err(err) => {
                debug!(file = file_id, error = %err, "transform failed, returning source unchanged");
                TransformOutput::unchanged(source)
            }
        }
    }

    /// Runs the pass and reports why it did nothing.
    ///
    /// `Ok(None)` means the module has nothing to wrap.
    pub fn try_transform(
        &self,
        source: &str,
        route_id: &str,
        file_id: &str,
    ) -> Result<Option<TransformOutput>> {
        let run = || {
            with_globals(|| -> Result<Option<TransformOutput>> {
                let mut parsed = parse(source, file_id)?;
                let report = WrapperInjector::new(&self.policy, route_id).run(&mut parsed.module)?;
                if report.is_noop() {
                    return Ok(None);
                }
                let printed = print(&parsed, self.source_maps)?;
                Ok(Some(TransformOutput {
                    code: printed.code,
                    map: printed.map,
                }))
            })
        };
        catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(file = file_id, %message, "transform panicked");
            Err(TransformError::Panicked(message))
        })
    }
}

/// Wraps route data functions with the devtools instrumentation wrappers.
pub fn augment_data_fetching_functions(source: &str, route_id: &str, file_id: &str) -> TransformOutput {
    RoutePass::instrumentation().transform(source, route_id, file_id)
}

/// Wraps route data functions with the devtools context wrappers.
pub fn inject_context(source: &str, route_id: &str, file_id: &str) -> TransformOutput {
    RoutePass::context().transform(source, route_id, file_id)
}
