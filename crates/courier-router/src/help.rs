//! The `/help` handler.

use crate::catalog::Catalog;
use async_trait::async_trait;
use courier_core::{Command, DispatchContext, Handler, HandlerResult, HandlerView, Response};

/// Lists every registered handler, itself included.
///
/// Built from the router builder's [`Catalog`], so it never holds the
/// router.
#[derive(Debug, Clone)]
pub struct HelpHandler {
    catalog: Catalog,
    title: String,
}

impl HelpHandler {
    /// Creates a help handler reading from `catalog`.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            title: "Available commands".to_string(),
        }
    }

    /// Sets the heading line.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Renders the catalog as a Markdown list.
    pub fn render(&self) -> String {
        let mut text = format!("*{}*\n", self.title);
        for view in self.catalog.handlers() {
            text.push('\n');
            text.push_str(&render_line(view));
        }
        text
    }
}

fn render_line(view: &HandlerView) -> String {
    let usage = if view.usage.is_empty() {
        view.prefixes.first().map_or("", String::as_str)
    } else {
        view.usage.as_str()
    };

    let mut line = format!("• `{usage}`");
    if !view.description.is_empty() {
        line.push_str(" - ");
        line.push_str(&view.description);
    }
    if let Some(aliases) = view.prefixes.get(1..).filter(|aliases| !aliases.is_empty()) {
        line.push_str(" (also ");
        line.push_str(&aliases.join(", "));
        line.push(')');
    }
    line
}

#[async_trait]
impl Handler for HelpHandler {
    fn prefixes(&self) -> &[&str] {
        &["/help"]
    }

    fn description(&self) -> &str {
        "Show this list of commands"
    }

    fn usage(&self) -> &str {
        "/help"
    }

    async fn invoke(&self, _ctx: &DispatchContext, _cmd: &Command) -> HandlerResult {
        Ok(Response::markdown(self.render()))
    }
}
