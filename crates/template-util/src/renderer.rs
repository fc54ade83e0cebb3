//! Template discovery and rendering
//!
//! Uses minijinja with strict undefined handling: a template referencing a
//! parameter that was not supplied fails instead of rendering an empty string.

use crate::error::TemplateError;
use crate::template::{Template, TemplateParams, TemplateType};
use minijinja::{Environment, UndefinedBehavior};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Template function `add(x, y)`, e.g. for one-based loop counters
fn add(x: i64, y: i64) -> Result<i64, minijinja::Error> {
    x.checked_add(y).ok_or_else(|| {
        minijinja::Error::new(
            minijinja::ErrorKind::InvalidOperation,
            format!("add({}, {}) overflows", x, y),
        )
    })
}

/// Check that a path taken from a resource stays below the base directory.
///
/// Only plain file or directory names (and `.`) are allowed; absolute paths,
/// drive prefixes and `..` are rejected. With `single` the path must be exactly
/// one name.
fn contained_path(value: &str, single: bool) -> Result<&Path, TemplateError> {
    let path = Path::new(value);
    let mut names = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => names += 1,
            Component::CurDir if !single => {}
            _ => {
                warn!("Rejecting template path {:?} outside the template directory", value);
                return Err(TemplateError::PathOutsideBase(value.to_string()));
            }
        }
    }
    if names == 0 || (single && names != 1) {
        return Err(TemplateError::PathOutsideBase(value.to_string()));
    }
    Ok(path)
}

/// Renders templates found below a base directory.
#[derive(Debug)]
pub struct TemplateRenderer {
    base_path: PathBuf,
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Create a renderer for templates below `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_function("add", add);

        Self {
            base_path: base_path.into(),
            env,
        }
    }

    /// Base directory templates are resolved against
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding the templates of one kind and type.
    ///
    /// `kind` and `version` must each be a single directory name.
    pub fn template_dir(
        &self,
        kind: &str,
        template_type: TemplateType,
        version: Option<&str>,
    ) -> Result<PathBuf, TemplateError> {
        let kind = kind.to_lowercase();
        let mut dir = self
            .base_path
            .join(contained_path(&kind, true)?)
            .join(template_type.as_str());
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            dir.push(contained_path(version, true)?);
        }
        Ok(dir)
    }

    /// Regular files directly inside the template directory, sorted by name.
    ///
    /// Subdirectories are ignored and a missing directory yields no templates.
    pub fn template_files(
        &self,
        kind: &str,
        template_type: TemplateType,
        version: Option<&str>,
    ) -> Result<Vec<PathBuf>, TemplateError> {
        let dir = self.template_dir(kind, template_type, version)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Template directory {} does not exist", dir.display());
                return Ok(Vec::new());
            }
            Err(source) => return Err(TemplateError::Io { path: dir, source }),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| TemplateError::Io {
                path: dir.clone(),
                source,
            })?;
            // Follows symlinks, as mounted ConfigMaps are symlinked
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Render template source with the given parameters
    pub fn render_str(&self, name: &str, source: &str, params: &TemplateParams) -> Result<String, TemplateError> {
        self.env
            .render_named_str(name, source, params)
            .map_err(|source| TemplateError::Render {
                name: name.to_string(),
                source,
            })
    }

    /// Read and render a template file
    pub fn render_file(&self, path: &Path, params: &TemplateParams) -> Result<String, TemplateError> {
        let source = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Rendering template {}", path.display());
        self.render_str(&name, &source, params)
    }

    /// Render a template given relative to the base path. The path may not leave the base path.
    pub fn render_additional(&self, relative: &str, params: &TemplateParams) -> Result<String, TemplateError> {
        let relative = contained_path(relative, false)?;
        self.render_file(&self.base_path.join(relative), params)
    }

    /// Render everything a [`Template`] describes.
    ///
    /// Returns output file name to content: the files of the template directory
    /// (unless the type is [`TemplateType::None`]), then the additional templates,
    /// then the custom data as-is. Later entries replace earlier ones with the same name.
    pub fn render(&self, template: &Template) -> Result<BTreeMap<String, String>, TemplateError> {
        let mut data = BTreeMap::new();

        if template.template_type != TemplateType::None {
            let files = self.template_files(
                &template.instance_type,
                template.template_type,
                template.version.as_deref(),
            )?;
            for file in files {
                let rendered = self.render_file(&file, &template.options)?;
                if let Some(name) = file.file_name() {
                    data.insert(name.to_string_lossy().into_owned(), rendered);
                }
            }
        }

        for (name, relative) in &template.additional_templates {
            data.insert(name.clone(), self.render_additional(relative, &template.options)?);
        }

        for (name, content) in &template.custom_data {
            data.insert(name.clone(), content.clone());
        }

        debug!("Rendered {} files for {}/{}", data.len(), template.namespace, template.name);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ParamValue;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn params() -> TemplateParams {
        TemplateParams::from([
            ("service_name".to_string(), ParamValue::from("Keystone")),
            ("workers".to_string(), ParamValue::from(4)),
        ])
    }

    #[test]
    fn test_render_str_with_add_and_lower() {
        let renderer = TemplateRenderer::new("/nonexistent");
        let out = renderer
            .render_str("inline", "{{ service_name | lower }}:{{ add(workers, 1) }}", &params())
            .unwrap();
        assert_eq!(out, "keystone:5");
    }

    #[test]
    fn test_undefined_parameter_fails() {
        let renderer = TemplateRenderer::new("/nonexistent");
        let result = renderer.render_str("inline", "{{ missing }}", &params());
        assert!(matches!(result, Err(TemplateError::Render { name, .. }) if name == "inline"));
    }

    #[test]
    fn test_trailing_newline_kept() {
        let renderer = TemplateRenderer::new("/nonexistent");
        let out = renderer.render_str("inline", "workers={{ workers }}\n", &params()).unwrap();
        assert_eq!(out, "workers=4\n");
    }

    #[test]
    fn test_template_files_skips_directories() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "keystoneapi/config/b.conf", "b");
        write(tmp.path(), "keystoneapi/config/a.conf", "a");
        write(tmp.path(), "keystoneapi/config/nested/c.conf", "c");

        let renderer = TemplateRenderer::new(tmp.path());
        let files = renderer.template_files("KeystoneAPI", TemplateType::Config, None).unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.conf", "b.conf"]);
    }

    #[test]
    fn test_template_files_versioned() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "placementapi/config/18.0/placement.conf", "v18");
        write(tmp.path(), "placementapi/config/placement.conf", "unversioned");

        let renderer = TemplateRenderer::new(tmp.path());
        let files = renderer
            .template_files("PlacementAPI", TemplateType::Config, Some("18.0"))
            .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("18.0/placement.conf"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let renderer = TemplateRenderer::new(tmp.path());
        let files = renderer.template_files("Glance", TemplateType::Scripts, None).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_render_template_set() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "keystoneapi/bin/init.sh", "#!/bin/bash\necho {{ service_name }}\n");
        write(tmp.path(), "common/common.sh", "workers={{ workers }}\n");

        let mut template = Template::new("keystone-scripts", "openstack", TemplateType::Scripts, "KeystoneAPI");
        template.options = params();
        template
            .additional_templates
            .insert("common.sh".to_string(), "common/common.sh".to_string());
        template
            .custom_data
            .insert("custom.conf".to_string(), "{{ not rendered }}".to_string());

        let data = TemplateRenderer::new(tmp.path()).render(&template).unwrap();

        assert_eq!(data.len(), 3);
        assert_eq!(data["init.sh"], "#!/bin/bash\necho Keystone\n");
        assert_eq!(data["common.sh"], "workers=4\n");
        assert_eq!(data["custom.conf"], "{{ not rendered }}");
    }

    #[test]
    fn test_render_type_none_only_additional() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "keystoneapi/none/ignored.conf", "ignored");
        write(tmp.path(), "common/extra.conf", "{{ workers }}");

        let mut template = Template::new("keystone-extra", "openstack", TemplateType::None, "KeystoneAPI");
        template.options = params();
        template
            .additional_templates
            .insert("extra.conf".to_string(), "common/extra.conf".to_string());

        let data = TemplateRenderer::new(tmp.path()).render(&template).unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["extra.conf"]);
        assert_eq!(data["extra.conf"], "4");
    }

    #[test]
    fn test_missing_additional_template_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let mut template = Template::new("x", "openstack", TemplateType::None, "KeystoneAPI");
        template
            .additional_templates
            .insert("gone.conf".to_string(), "common/gone.conf".to_string());

        let result = TemplateRenderer::new(tmp.path()).render(&template);
        assert!(matches!(result, Err(TemplateError::Io { .. })));
    }

    #[test]
    fn test_add_overflow_is_render_error() {
        let renderer = TemplateRenderer::new("/nonexistent");
        let mut params = params();
        params.insert("largest".to_string(), ParamValue::Int(i64::MAX));

        let result = renderer.render_str("inline", "{{ add(largest, 1) }}", &params);
        assert!(matches!(result, Err(TemplateError::Render { .. })));
        assert_eq!(
            renderer.render_str("inline", "{{ add(largest, -1) }}", &params).unwrap(),
            (i64::MAX - 1).to_string()
        );
    }

    #[test]
    fn test_additional_template_absolute_path_rejected() {
        let base = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "token", "service-account-token");
        let absolute = outside.path().join("token").display().to_string();

        let mut template = Template::new("x", "openstack", TemplateType::None, "KeystoneAPI");
        template.additional_templates.insert("leak".to_string(), absolute.clone());

        let result = TemplateRenderer::new(base.path()).render(&template);
        assert!(matches!(result, Err(TemplateError::PathOutsideBase(path)) if path == absolute));
    }

    #[test]
    fn test_additional_template_parent_dir_rejected() {
        let root = TempDir::new().unwrap();
        write(root.path(), "templates/common/ok.conf", "ok");
        write(root.path(), "secrets/token", "service-account-token");

        let renderer = TemplateRenderer::new(root.path().join("templates"));
        let mut template = Template::new("x", "openstack", TemplateType::None, "KeystoneAPI");
        template
            .additional_templates
            .insert("leak".to_string(), "../secrets/token".to_string());
        assert!(matches!(
            renderer.render(&template),
            Err(TemplateError::PathOutsideBase(_))
        ));

        template.additional_templates.clear();
        template
            .additional_templates
            .insert("ok.conf".to_string(), "./common/ok.conf".to_string());
        assert_eq!(renderer.render(&template).unwrap()["ok.conf"], "ok");
    }

    #[test]
    fn test_kind_and_version_must_be_single_names() {
        let renderer = TemplateRenderer::new("/templates");
        for (kind, version) in [
            ("../etc", None),
            ("/etc", None),
            ("keystoneapi/../..", None),
            ("KeystoneAPI", Some("../../etc")),
            ("KeystoneAPI", Some("/etc")),
            ("KeystoneAPI", Some("18.0/..")),
        ] {
            assert!(
                matches!(
                    renderer.template_dir(kind, TemplateType::Config, version),
                    Err(TemplateError::PathOutsideBase(_))
                ),
                "{kind} {version:?} should be rejected"
            );
        }

        let dir = renderer
            .template_dir("KeystoneAPI", TemplateType::Config, Some("18.0"))
            .unwrap();
        assert_eq!(dir, PathBuf::from("/templates/keystoneapi/config/18.0"));
    }

    #[test]
    fn test_nested_params() {
        let renderer = TemplateRenderer::new("/nonexistent");
        let endpoints = BTreeMap::from([
            ("admin".to_string(), "http://admin.example.com".to_string()),
            ("public".to_string(), "http://public.example.com/v3".to_string()),
        ]);
        let params = TemplateParams::from([("endpoints".to_string(), ParamValue::from(endpoints))]);

        let out = renderer
            .render_str(
                "inline",
                "{% for name, url in endpoints|items %}{{ name }}={{ url }};{% endfor %}",
                &params,
            )
            .unwrap();
        assert_eq!(out, "admin=http://admin.example.com;public=http://public.example.com/v3;");
    }
}
