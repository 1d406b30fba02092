//! SWC plugin entry point.
//!
//! Config (all keys optional):
//!
//! ```json
//! { "routeId": "routes/home", "pass": "context", "policy": { "infix": "", "serverSource": "...", "clientSource": "..." } }
//! ```
//!
//! `policy` wins over `pass`; the route id defaults to the file name given by
//! the host.

use serde::Deserialize;
use swc_core::{
    ecma::ast::Program,
    plugin::{
        metadata::TransformPluginMetadataContextKind,
        plugin_transform,
        proxies::TransformPluginProgramMetadata,
    },
};
use tracing::debug;

use crate::{
    inject::WrapperInjector,
    policy::{PassKind, WrapperPolicy},
    syntax::strip_query,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    pub route_id: Option<String>,
    #[serde(default)]
    pub pass: PassKind,
    pub policy: Option<WrapperPolicy>,
}

impl PluginConfig {
    pub fn policy(&self) -> WrapperPolicy {
        self.policy.clone().unwrap_or_else(|| self.pass.policy())
    }
}

#[plugin_transform]
pub fn process_transform(program: Program, metadata: TransformPluginProgramMetadata) -> Program {
    let config: PluginConfig = metadata
        .get_transform_plugin_config()
        .map(|s| serde_json::from_str(&s).unwrap_or_default())
        .unwrap_or_default();

    let module = match program {
        Program::Module(module) => module,
        script => return script,
    };

    let file_name = metadata.get_context(&TransformPluginMetadataContextKind::Filename);
    let Some(route_id) = config
        .route_id
        .clone()
        .or_else(|| file_name.as_deref().map(|f| strip_query(f).to_string()))
    else {
        debug!("no route id configured and no file name available, skipping");
        return Program::Module(module);
    };

    let policy = config.policy();
    let mut transformed = module.clone();
    match WrapperInjector::new(&policy, &route_id).run(&mut transformed) {
        Ok(report) if !report.is_noop() => Program::Module(transformed),
        Ok(_) => Program::Module(module),
        Err(err) => {
            debug!(error = %err, "rolling back to the untouched module");
            Program::Module(module)
        }
    }
}
