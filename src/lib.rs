//! Wraps route data functions (`loader`, `action`, `clientLoader`,
//! `clientAction`) in wrapper calls at their definition site.
//!
//! ```text
//! export function loader() {}
//! ```
//!
//! becomes
//!
//! ```text
//! import { withLoaderWrapper as _withLoaderWrapper } from "react-router-devtools/server";
//! export const loader = _withLoaderWrapper(function loader() {}, "routes/home");
//! ```
//!
//! Two passes ship with the crate: [`augment_data_fetching_functions`]
//! (instrumentation wrappers) and [`inject_context`] (context wrappers). Both
//! are pure text-to-text functions that hand back the input whenever they
//! cannot transform it.

pub mod classify;
pub mod driver;
pub mod edit;
pub mod error;
pub mod inject;
#[cfg(feature = "plugin")]
pub mod plugin;
pub mod policy;
pub mod scope;
pub mod syntax;
pub mod target;

pub use driver::{augment_data_fetching_functions, inject_context, RoutePass, TransformOutput};
pub use error::{Result, TransformError, UnsupportedShape};
pub use inject::{InjectionReport, WrapperInjector};
pub use policy::{PassKind, WrapperPolicy};
pub use target::{Surface, TargetName};
