//! Template rendering for operator-managed config and script files
//!
//! Templates live in a directory tree rooted at an explicitly configured base path:
//!
//! ```text
//! <base>/<kind>/<type>/[<version>/]<file>
//! ```
//!
//! where `kind` is the lowercase custom resource kind and `type` is one of the
//! [`TemplateType`] directory names. Every regular file in that directory is
//! rendered with a typed parameter map and returned keyed by file name, ready to
//! be stored in a ConfigMap or Secret.
//!
//! # Example
//!
//! ```no_run
//! use template_util::{ParamValue, Template, TemplateRenderer, TemplateType};
//!
//! # fn example() -> Result<(), template_util::TemplateError> {
//! let renderer = TemplateRenderer::new("/templates");
//! let mut template = Template::new("keystone-config-data", "openstack", TemplateType::Config, "KeystoneAPI");
//! template.options.insert("admin_port".to_string(), ParamValue::from(35357));
//!
//! let data = renderer.render(&template)?;
//! for (file, content) in &data {
//!     println!("{}: {} bytes", file, content.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod renderer;
pub mod template;

pub use error::TemplateError;
pub use renderer::TemplateRenderer;
pub use template::{ParamValue, Template, TemplateParams, TemplateType};
