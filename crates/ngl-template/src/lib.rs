//! Manifest templates rendered with minijinja.
//!
//! Templates live in one directory as `<name>.j2`; includes and inheritance resolve against the same directory.
use std::path::Path;

use minijinja::{Environment, ErrorKind, path_loader};
use ngl_core::{CollabError, TemplateParams, TemplateRenderer};
use tracing::trace;

mod error;
pub use error::TemplateError;

/// File suffix of every template.
pub const TEMPLATE_SUFFIX: &str = ".j2";

pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(TemplateError::MissingDir(dir.display().to_string()));
        }
        let mut env = Environment::new();
        env.set_loader(path_loader(dir));
        Ok(Self { env })
    }
}

impl TemplateRenderer for JinjaRenderer {
    fn render(&self, name: &str, params: &TemplateParams) -> Result<String, CollabError> {
        let file = format!("{name}{TEMPLATE_SUFFIX}");
        trace!(target: "ngl.template", template = %file, "render");
        let tmpl = self.env.get_template(&file).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => CollabError::TemplateNotFound(file.clone()),
            _ => CollabError::Template(format!("{file}: {e}")),
        })?;
        tmpl.render(params)
            .map_err(|e| CollabError::Template(format!("{file}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> TemplateParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_manifest_with_parameters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("node.j2"),
            "FROM node:20\nCOPY {{ appdir }} /srv/{{ appname }}\n{% if mode == \"nightly\" %}ENV DEBUG=1\n{% endif %}",
        )
        .unwrap();
        let r = JinjaRenderer::from_dir(dir.path()).unwrap();

        let out = r
            .render(
                "node",
                &params(&[("appdir", "web-r1/web"), ("appname", "web"), ("mode", "nightly")]),
            )
            .unwrap();
        assert_eq!(out, "FROM node:20\nCOPY web-r1/web /srv/web\nENV DEBUG=1\n");

        let again = r
            .render(
                "node",
                &params(&[("appdir", "web-r1/web"), ("appname", "web"), ("mode", "nightly")]),
            )
            .unwrap();
        assert_eq!(out, again);
    }

    #[test]
    fn includes_resolve_in_the_same_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.j2"), "LABEL app={{ appname }}").unwrap();
        std::fs::write(
            dir.path().join("postbuild.j2"),
            "FROM {{ imagename }}\n{% include \"base.j2\" %}",
        )
        .unwrap();
        let r = JinjaRenderer::from_dir(dir.path()).unwrap();
        let out = r
            .render(
                "postbuild",
                &params(&[("imagename", "web:tmp"), ("appname", "web")]),
            )
            .unwrap();
        assert_eq!(out, "FROM web:tmp\nLABEL app=web");
    }

    #[test]
    fn missing_template_and_syntax_errors_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.j2"), "FROM {{ appdir ").unwrap();
        let r = JinjaRenderer::from_dir(dir.path()).unwrap();

        assert!(matches!(
            r.render("absent", &TemplateParams::new()),
            Err(CollabError::TemplateNotFound(f)) if f == "absent.j2"
        ));
        assert!(matches!(
            r.render("broken", &TemplateParams::new()),
            Err(CollabError::Template(_))
        ));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JinjaRenderer::from_dir(dir.path().join("nope")).is_err());
    }
}
