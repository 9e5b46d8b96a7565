//! Script sources: turning a declarative JSON script into a [`Script`].

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::{Validator, validator_for};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::component::{
    ComponentKind, ComponentNode, GraphAxis, GraphView, Orientation, Sensor, Sheet,
};
use crate::script::Script;
use crate::tree::{NodeId, ScriptTree};

const SCRIPT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/script/v1.schema.json"
));

/// Produces a loaded script from a source artifact.
pub trait ScriptLoader {
    fn load(&self, path: &Path) -> Result<Script>;
}

/// Loader for JSON scripts following `schemas/script/v1.schema.json`.
pub struct JsonScriptLoader {
    validator: Validator,
}

impl JsonScriptLoader {
    pub fn new() -> Result<Self> {
        let schema: Value = serde_json::from_str(SCRIPT_SCHEMA).context("parse script schema")?;
        let validator =
            validator_for(&schema).map_err(|err| anyhow!("invalid script schema: {}", err))?;
        Ok(Self { validator })
    }

    /// Parse, validate and build a script from JSON text.
    pub fn parse(&self, contents: &str) -> Result<Script> {
        let value: Value = serde_json::from_str(contents).context("parse script json")?;
        if !self.validator.is_valid(&value) {
            let messages = self
                .validator
                .iter_errors(&value)
                .map(|err| err.to_string())
                .collect::<Vec<_>>();
            bail!("script schema validation failed: {}", messages.join("; "));
        }
        let def: ScriptDef = serde_json::from_value(value).context("deserialize script")?;
        build_script(def)
    }
}

impl ScriptLoader for JsonScriptLoader {
    fn load(&self, path: &Path) -> Result<Script> {
        debug!(path = %path.display(), "loading script");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read script {}", path.display()))?;
        let script = self
            .parse(&contents)
            .with_context(|| format!("load script {}", path.display()))?;
        info!(title = %script.title(), nodes = script.tree().len(), "script loaded");
        Ok(script)
    }
}

/// A script is a sequence of pages; each page continues with the next one in
/// its list. Branches start their own page sequence, so the nesting depth of
/// a source only grows with its branching, not with its length.
#[derive(Debug, Deserialize)]
struct ScriptDef {
    title: String,
    pages: Vec<PageDef>,
}

#[derive(Debug, Deserialize)]
struct PageDef {
    component: ComponentDef,
    #[serde(default)]
    branches: Vec<BranchDef>,
}

#[derive(Debug, Deserialize)]
struct BranchDef {
    outcome: u32,
    pages: Vec<PageDef>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ComponentDef {
    Text {
        name: String,
        text: String,
    },
    Header {
        name: String,
        text: String,
    },
    Question {
        name: String,
        text: String,
    },
    CheckboxQuestion {
        name: String,
        text: String,
    },
    TextQuestion {
        name: String,
        text: String,
        #[serde(default)]
        optional: bool,
    },
    Experiment {
        name: String,
        sensor: Sensor,
        #[serde(default)]
        description: String,
    },
    Graph {
        name: String,
        #[serde(default)]
        title: Option<String>,
        x_axis: String,
        y_axis: String,
        #[serde(default)]
        experiment: Option<String>,
    },
    Export {
        name: String,
    },
    Sheet {
        name: String,
        #[serde(default)]
        orientation: Orientation,
        items: Vec<ComponentDef>,
    },
}

impl ComponentDef {
    fn name(&self) -> &str {
        match self {
            Self::Text { name, .. }
            | Self::Header { name, .. }
            | Self::Question { name, .. }
            | Self::CheckboxQuestion { name, .. }
            | Self::TextQuestion { name, .. }
            | Self::Experiment { name, .. }
            | Self::Graph { name, .. }
            | Self::Export { name }
            | Self::Sheet { name, .. } => name,
        }
    }
}

fn build_script(def: ScriptDef) -> Result<Script> {
    let mut experiments = BTreeSet::new();
    collect_experiments(&def.pages, &mut experiments);

    let mut pages = def.pages.into_iter();
    let first = pages.next().context("script has no pages")?;
    let mut tree = ScriptTree::new(build_component(first.component, &experiments)?);
    let root = tree.root().context("script tree has no root")?;
    attach_branches(&mut tree, root, first.branches, &experiments)?;
    attach_sequence(&mut tree, root, 0, pages, &experiments)?;
    ensure_unique_node_names(&tree)?;
    Ok(Script::new(def.title, tree))
}

/// Chain `pages` after `from`: the first one on branch `outcome`, every
/// following one as the ordinary next step of its predecessor.
fn attach_sequence(
    tree: &mut ScriptTree,
    from: NodeId,
    outcome: u32,
    pages: impl IntoIterator<Item = PageDef>,
    experiments: &BTreeSet<String>,
) -> Result<()> {
    let (mut from, mut outcome) = (from, outcome);
    for page in pages {
        let component = build_component(page.component, experiments)?;
        let id = tree.add_branch(from, outcome, component)?;
        attach_branches(tree, id, page.branches, experiments)?;
        from = id;
        outcome = 0;
    }
    Ok(())
}

fn attach_branches(
    tree: &mut ScriptTree,
    from: NodeId,
    branches: Vec<BranchDef>,
    experiments: &BTreeSet<String>,
) -> Result<()> {
    for branch in branches {
        attach_sequence(tree, from, branch.outcome, branch.pages, experiments)?;
    }
    Ok(())
}

fn collect_experiments(pages: &[PageDef], names: &mut BTreeSet<String>) {
    for page in pages {
        collect_component_experiments(&page.component, names);
        for branch in &page.branches {
            collect_experiments(&branch.pages, names);
        }
    }
}

fn collect_component_experiments(component: &ComponentDef, names: &mut BTreeSet<String>) {
    match component {
        ComponentDef::Experiment { name, .. } => {
            names.insert(name.clone());
        }
        ComponentDef::Sheet { items, .. } => {
            for item in items {
                collect_component_experiments(item, names);
            }
        }
        _ => {}
    }
}

fn build_component(def: ComponentDef, experiments: &BTreeSet<String>) -> Result<ComponentNode> {
    let component = match def {
        ComponentDef::Text { name, text } => ComponentNode::text(name, text),
        ComponentDef::Header { name, text } => ComponentNode::header(name, text),
        ComponentDef::Question { name, text } => ComponentNode::question(name, text),
        ComponentDef::CheckboxQuestion { name, text } => ComponentNode::checkbox(name, text),
        ComponentDef::TextQuestion {
            name,
            text,
            optional,
        } => ComponentNode::text_question(name, text, optional),
        ComponentDef::Experiment {
            name,
            sensor,
            description,
        } => ComponentNode::experiment(name, sensor, description),
        ComponentDef::Graph {
            name,
            title,
            x_axis,
            y_axis,
            experiment,
        } => {
            let x_axis = parse_axis(&name, &x_axis)?;
            let y_axis = parse_axis(&name, &y_axis)?;
            if let Some(reference) = &experiment {
                if !experiments.contains(reference) {
                    bail!("graph \"{name}\" references unknown experiment \"{reference}\"");
                }
            }
            let title = title.unwrap_or_else(|| format!("{y_axis} vs. {x_axis}"));
            ComponentNode::graph(
                name,
                GraphView {
                    title,
                    x_axis,
                    y_axis,
                    experiment,
                },
            )
        }
        ComponentDef::Export { name } => ComponentNode::export(name),
        ComponentDef::Sheet {
            name,
            orientation,
            items,
        } => {
            let mut seen = BTreeSet::new();
            let duplicate = items
                .iter()
                .map(ComponentDef::name)
                .find(|item| !seen.insert(*item));
            if let Some(duplicate) = duplicate {
                bail!("sheet \"{name}\" has more than one item named \"{duplicate}\"");
            }
            let items = items
                .into_iter()
                .map(|item| build_component(item, experiments))
                .collect::<Result<Vec<_>>>()?;
            ComponentNode::new(name, ComponentKind::Sheet(Sheet::new(orientation, items)))
        }
    };
    Ok(component)
}

fn parse_axis(graph: &str, value: &str) -> Result<GraphAxis> {
    value
        .parse::<GraphAxis>()
        .map_err(|err: String| anyhow!("graph \"{graph}\": {err}"))
}

fn ensure_unique_node_names(tree: &ScriptTree) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in tree.preorder() {
        let Some(component) = tree.component(id) else {
            continue;
        };
        if !seen.insert(component.name()) {
            bail!("more than one component named \"{}\"", component.name());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::ComponentState;
    use crate::test_support::{PENDULUM_SCRIPT, pendulum_fixture};

    fn loader() -> JsonScriptLoader {
        JsonScriptLoader::new().expect("schema compiles")
    }

    #[test]
    fn loads_fixture_script() {
        let (_temp, path) = pendulum_fixture();
        let mut script = loader().load(&path).expect("load");

        assert_eq!(script.title(), "Pendulum");
        let names: Vec<&str> = script
            .tree()
            .preorder()
            .into_iter()
            .map(|id| script.tree().component(id).expect("node").name())
            .collect();
        assert_eq!(names, vec!["Intro", "swing", "Analysis", "export"]);
        script.init_check().expect("fixture is valid");
        assert_eq!(script.active_chain().len(), 1);
    }

    #[test]
    fn branches_attach_by_outcome() {
        let script = loader()
            .parse(
                r#"{
                  "title": "Choice",
                  "pages": [
                    {
                      "component": {"type": "checkbox_question", "name": "pick", "text": "Pick"},
                      "branches": [
                        {"outcome": 2, "pages": [
                          {"component": {"type": "text", "name": "other", "text": "Other"}},
                          {"component": {"type": "text", "name": "other_end", "text": "Bye"}}
                        ]}
                      ]
                    },
                    {"component": {"type": "text", "name": "usual", "text": "Usual"}}
                  ]
                }"#,
            )
            .expect("parse");
        let tree = script.tree();
        let root = tree.node(tree.root().expect("root")).expect("root node");
        let name_of = |id| tree.component(id).expect("node").name();

        assert_eq!(name_of(root.successor(0).expect("next")), "usual");
        let other = root.successor(2).expect("branch 2");
        assert_eq!(name_of(other), "other");
        assert_eq!(
            tree.component(other).expect("other").state(),
            ComponentState::Done
        );
        let other_end = tree.node(other).expect("other").successor(0).expect("next");
        assert_eq!(name_of(other_end), "other_end");
    }

    #[test]
    fn long_linear_scripts_load() {
        let pages: Vec<Value> = (0..500)
            .map(|index| {
                serde_json::json!({
                    "component": {"type": "text", "name": format!("page-{index}"), "text": "Read me"}
                })
            })
            .collect();
        let source = serde_json::json!({"title": "Long", "pages": pages}).to_string();

        let mut script = loader().parse(&source).expect("parse");
        assert_eq!(script.tree().len(), 500);
        script.init_check().expect("valid");
        assert_eq!(script.active_chain().len(), 500);
        assert!(script.is_complete());

        let mut bundle = crate::core::bundle::Bundle::new();
        script.save_state(&mut bundle).expect("save");
        let mut restored = loader().parse(&source).expect("parse again");
        restored.load_state(&bundle).expect("restore");
    }

    #[test]
    fn empty_page_list_is_rejected() {
        let err = loader()
            .parse(r#"{"title": "Empty", "pages": []}"#)
            .err()
            .expect("no pages");
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn schema_violations_are_reported() {
        let err = loader()
            .parse(r#"{"title": "Broken", "pages": [{"component": {"type": "video", "name": "v"}}]}"#)
            .err()
            .expect("invalid type");
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn unknown_experiment_reference_fails() {
        let source = PENDULUM_SCRIPT.replace("\"experiment\": \"swing\"", "\"experiment\": \"drop\"");
        let err = loader().parse(&source).err().expect("unknown experiment");
        assert!(err.to_string().contains("unknown experiment \"drop\""));
    }

    #[test]
    fn axes_are_case_insensitive_and_validated() {
        let upper = PENDULUM_SCRIPT.replace("\"x-position\"", "\"X-Position\"");
        assert!(loader().parse(&upper).is_ok());

        let unknown = PENDULUM_SCRIPT.replace("\"x-position\"", "\"z-position\"");
        let err = loader().parse(&unknown).err().expect("bad axis");
        assert!(err.to_string().contains("unknown graph axis 'z-position'"));
    }

    #[test]
    fn duplicate_node_names_fail() {
        let source = PENDULUM_SCRIPT.replace("\"name\": \"export\"", "\"name\": \"swing\"");
        let err = loader().parse(&source).err().expect("duplicate");
        assert!(err.to_string().contains("more than one component named \"swing\""));
    }

    /// A graph without an experiment loads but fails the pre-flight check.
    #[test]
    fn graph_without_experiment_fails_init_check() {
        let source = PENDULUM_SCRIPT.replace(",\n            \"experiment\": \"swing\"", "");
        let mut script = loader().parse(&source).expect("parse");
        let err = script.init_check().expect_err("no experiment data");
        assert_eq!(err.to_string(), "In Component \"position\": no experiment data");
    }

    #[test]
    fn missing_file_names_path() {
        let err = loader()
            .load(Path::new("does/not/exist.json"))
            .err()
            .expect("missing");
        assert!(format!("{err:#}").contains("does/not/exist.json"));
    }
}
