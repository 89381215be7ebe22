//! Email template rendering backed by `minijinja`.
//!
//! Each [`TemplateName`] is a `<name>_subject.j2` / `<name>_body.j2` pair.
//! Files in the configured directory override the built-in defaults.
//! Rendering is strict: a variable the context lacks is an error, not an
//! empty string.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use minijinja::{Environment, UndefinedBehavior, Value};
use tracing::debug;

use crate::gateway::{RenderedEmail, TemplateName, TemplateRenderer};
use crate::{AppError, Result};

const ALL_TEMPLATES: [TemplateName; 3] = [
    TemplateName::NewTicket,
    TemplateName::AgentReply,
    TemplateName::TicketClosed,
];

fn builtin(name: TemplateName, part: Part) -> &'static str {
    match (name, part) {
        (TemplateName::NewTicket, Part::Subject) => {
            include_str!("../templates/new_ticket_subject.j2")
        }
        (TemplateName::NewTicket, Part::Body) => include_str!("../templates/new_ticket_body.j2"),
        (TemplateName::AgentReply, Part::Subject) => {
            include_str!("../templates/agent_reply_subject.j2")
        }
        (TemplateName::AgentReply, Part::Body) => include_str!("../templates/agent_reply_body.j2"),
        (TemplateName::TicketClosed, Part::Subject) => {
            include_str!("../templates/ticket_closed_subject.j2")
        }
        (TemplateName::TicketClosed, Part::Body) => {
            include_str!("../templates/ticket_closed_body.j2")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Part {
    Subject,
    Body,
}

impl Part {
    fn suffix(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Body => "body",
        }
    }
}

fn file_name(name: TemplateName, part: Part) -> String {
    format!("{}_{}.j2", name.as_str(), part.suffix())
}

/// Template renderer over a set of template sources.
pub struct MiniJinjaRenderer {
    env: Environment<'static>,
    sources: HashMap<(TemplateName, Part), String>,
}

impl MiniJinjaRenderer {
    /// Renderer using only the built-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        let sources = ALL_TEMPLATES
            .into_iter()
            .flat_map(|name| [(name, Part::Subject), (name, Part::Body)])
            .map(|key| (key, builtin(key.0, key.1).to_owned()))
            .collect();
        Self::with_sources(sources)
    }

    /// Renderer reading overrides from `dir`, falling back to built-ins for
    /// files that are absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `dir` is not a directory or a present
    /// file cannot be read.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(AppError::Config(format!(
                "templates_dir {} is not a directory",
                dir.display()
            )));
        }
        let mut renderer = Self::builtin();
        for name in ALL_TEMPLATES {
            for part in [Part::Subject, Part::Body] {
                let path = dir.join(file_name(name, part));
                if !path.is_file() {
                    continue;
                }
                let source = fs::read_to_string(&path).map_err(|err| {
                    AppError::Config(format!("cannot read template {}: {err}", path.display()))
                })?;
                debug!(path = %path.display(), "template override loaded");
                renderer.sources.insert((name, part), source);
            }
        }
        Ok(renderer)
    }

    /// Renderer over explicit `(name, subject, body)` sources. Templates not
    /// listed fail to render.
    #[must_use]
    pub fn from_sources<'a>(
        templates: impl IntoIterator<Item = (TemplateName, &'a str, &'a str)>,
    ) -> Self {
        let mut sources = HashMap::new();
        for (name, subject, body) in templates {
            sources.insert((name, Part::Subject), subject.to_owned());
            sources.insert((name, Part::Body), body.to_owned());
        }
        Self::with_sources(sources)
    }

    fn with_sources(sources: HashMap<(TemplateName, Part), String>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        Self { env, sources }
    }

    fn render_part(&self, name: TemplateName, part: Part, ctx: &Value) -> Result<String> {
        let source = self.sources.get(&(name, part)).ok_or_else(|| {
            AppError::Render(format!("template {} not found", file_name(name, part)))
        })?;
        self.env
            .render_str(source, ctx)
            .map_err(|err| AppError::Render(format!("{}: {err}", file_name(name, part))))
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    fn render(&self, name: TemplateName, vars: &serde_json::Value) -> Result<RenderedEmail> {
        let ctx = Value::from_serialize(vars);
        let subject = self.render_part(name, Part::Subject, &ctx)?;
        let body = self.render_part(name, Part::Body, &ctx)?;
        let subject = subject
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_owned();
        Ok(RenderedEmail { subject, body })
    }
}
