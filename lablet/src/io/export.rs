//! Markdown export of the learner's answers.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::info;

use crate::core::component::{ComponentKind, ComponentNode};
use crate::script::Script;

const ANSWERS_TEMPLATE: &str = include_str!("templates/answers.md");

#[derive(Debug, Clone, Serialize)]
struct SheetContext {
    name: String,
    items: Vec<ItemContext>,
}

#[derive(Debug, Clone, Serialize)]
struct ItemContext {
    kind: &'static str,
    text: String,
    number: Option<u32>,
    answer: Option<String>,
    done: bool,
}

impl ItemContext {
    fn from_component(component: &ComponentNode) -> Option<Self> {
        let (text, number, answer) = match component.kind() {
            ComponentKind::Question(question) => (question.text.clone(), question.number(), None),
            ComponentKind::TextQuestion(question) => (
                question.text.clone(),
                question.number(),
                Some(question.answer().to_string()).filter(|answer| !answer.is_empty()),
            ),
            ComponentKind::CheckboxQuestion(question) => (question.text.clone(), None, None),
            _ => return None,
        };
        Some(Self {
            kind: component.kind().label(),
            text,
            number,
            answer,
            done: component.state().is_done(),
        })
    }
}

/// Renders answer reports with minijinja.
pub struct AnswerExporter {
    env: Environment<'static>,
}

impl AnswerExporter {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("answers", ANSWERS_TEMPLATE)
            .context("load answers template")?;
        Ok(Self { env })
    }

    /// Every sheet of `script` in pre-order with its questions and answers.
    pub fn render(&self, script: &Script) -> Result<String> {
        let tree = script.tree();
        let mut sheets = Vec::new();
        for id in tree.preorder() {
            if let Some(component) = tree.component(id) {
                collect_sheets(component, &mut sheets);
            }
        }
        let template = self.env.get_template("answers")?;
        let rendered = template.render(context! {
            title => script.title(),
            sheets => sheets,
        })?;
        Ok(rendered)
    }

    /// Render and atomically write the report to `path`.
    pub fn export(&self, script: &Script, path: &Path) -> Result<()> {
        let rendered = self.render(script)?;
        super::write_atomic(path, &rendered)
            .with_context(|| format!("export answers to {}", path.display()))?;
        info!(path = %path.display(), "exported answers");
        Ok(())
    }
}

fn collect_sheets(component: &ComponentNode, sheets: &mut Vec<SheetContext>) {
    let ComponentKind::Sheet(sheet) = component.kind() else {
        return;
    };
    sheets.push(SheetContext {
        name: component.name().to_string(),
        items: sheet
            .items()
            .iter()
            .filter_map(ItemContext::from_component)
            .collect(),
    });
    for item in sheet.items().iter() {
        collect_sheets(item, sheets);
    }
}
