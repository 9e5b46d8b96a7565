//! Script components: the closed set of page elements a script is built from.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::core::bundle::Bundle;
use crate::core::container::ComponentContainer;
use crate::core::error::ScriptError;
use crate::core::state::ComponentState;
use crate::core::types::{Interaction, ItemChange};

const STATE_KEY: &str = "state";
const ANSWER_KEY: &str = "answer";
const QUESTION_KEY: &str = "question";
const NUMBER_KEY: &str = "number";
const EXPERIMENT_PATH_KEY: &str = "experiment_path";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextStyle {
    #[default]
    Normal,
    Header,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    Camera,
    Accelerometer,
    Microphone,
}

impl Sensor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Accelerometer => "accelerometer",
            Self::Microphone => "microphone",
        }
    }
}

/// Data series plotted on a graph axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphAxis {
    XPosition,
    YPosition,
    XVelocity,
    YVelocity,
    Time,
    /// Time axis aligned with velocity samples.
    TimeVelocity,
}

impl GraphAxis {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::XPosition => "x-position",
            Self::YPosition => "y-position",
            Self::XVelocity => "x-velocity",
            Self::YVelocity => "y-velocity",
            Self::Time => "time",
            Self::TimeVelocity => "time_v",
        }
    }
}

impl FromStr for GraphAxis {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [
            Self::XPosition,
            Self::YPosition,
            Self::XVelocity,
            Self::YVelocity,
            Self::Time,
            Self::TimeVelocity,
        ]
        .into_iter()
        .find(|axis| axis.as_str().eq_ignore_ascii_case(value))
        .ok_or_else(|| format!("unknown graph axis '{value}'"))
    }
}

impl fmt::Display for GraphAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub text: String,
    pub style: TextStyle,
}

/// A numbered prompt without an input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    number: Option<u32>,
}

impl Question {
    pub fn number(&self) -> Option<u32> {
        self.number
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckboxQuestion {
    pub text: String,
}

/// Free-text question. Counts as answered as soon as the answer is non-empty;
/// correctness is not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuestion {
    pub text: String,
    answer: String,
    optional: bool,
    number: Option<u32>,
}

impl TextQuestion {
    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn number(&self) -> Option<u32> {
        self.number
    }

    fn completion_state(&self) -> ComponentState {
        if self.optional || !self.answer.is_empty() {
            ComponentState::Done
        } else {
            ComponentState::Ongoing
        }
    }
}

/// Prompt to record an experiment with one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentRef {
    pub sensor: Sensor,
    pub description: String,
    path: Option<PathBuf>,
}

impl ExperimentRef {
    /// Recorded experiment, relative to the run directory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// True if `path` is non-empty and made of plain names only, so joining it to
/// a directory cannot leave that directory.
pub fn is_contained_path(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some()
        && components.all(|component| matches!(component, Component::Normal(_)))
}

/// Motion-analysis graph bound to an experiment by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphView {
    pub title: String,
    pub x_axis: GraphAxis,
    pub y_axis: GraphAxis,
    pub experiment: Option<String>,
}

impl GraphView {
    pub fn x_vs_y_position(experiment: Option<String>) -> Self {
        Self {
            title: "Position Data".to_string(),
            x_axis: GraphAxis::XPosition,
            y_axis: GraphAxis::YPosition,
            experiment,
        }
    }

    pub fn time_vs_x_velocity(experiment: Option<String>) -> Self {
        Self {
            title: "X-Velocity vs. Time".to_string(),
            x_axis: GraphAxis::TimeVelocity,
            y_axis: GraphAxis::XVelocity,
            experiment,
        }
    }

    pub fn time_vs_y_velocity(experiment: Option<String>) -> Self {
        Self {
            title: "Y-Velocity vs. Time".to_string(),
            x_axis: GraphAxis::TimeVelocity,
            y_axis: GraphAxis::YVelocity,
            experiment,
        }
    }
}

/// A page of components. Its state follows the container reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub orientation: Orientation,
    items: ComponentContainer,
}

impl Sheet {
    pub fn new(orientation: Orientation, items: Vec<ComponentNode>) -> Self {
        let mut container = ComponentContainer::new();
        for item in items {
            container.push(item);
        }
        let mut sheet = Self {
            orientation,
            items: container,
        };
        sheet.number_questions();
        sheet
    }

    pub fn items(&self) -> &ComponentContainer {
        &self.items
    }

    /// Number plain and text questions `1..n` in item order.
    fn number_questions(&mut self) {
        let mut counter = 0;
        for item in self.items.iter_mut() {
            match &mut item.kind {
                ComponentKind::Question(question) => {
                    counter += 1;
                    question.number = Some(counter);
                }
                ComponentKind::TextQuestion(question) => {
                    counter += 1;
                    question.number = Some(counter);
                }
                _ => {}
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    Text(TextBlock),
    Question(Question),
    CheckboxQuestion(CheckboxQuestion),
    TextQuestion(TextQuestion),
    Experiment(ExperimentRef),
    Graph(GraphView),
    Export,
    Sheet(Sheet),
}

impl ComponentKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text(TextBlock {
                style: TextStyle::Header,
                ..
            }) => "header",
            Self::Text(_) => "text",
            Self::Question(_) => "question",
            Self::CheckboxQuestion(_) => "checkbox_question",
            Self::TextQuestion(_) => "text_question",
            Self::Experiment(_) => "experiment",
            Self::Graph(_) => "graph",
            Self::Export => "export",
            Self::Sheet(_) => "sheet",
        }
    }

    fn initial_state(&self) -> ComponentState {
        match self {
            Self::Text(_) | Self::Question(_) | Self::Graph(_) | Self::Export => {
                ComponentState::Done
            }
            Self::CheckboxQuestion(_) | Self::Experiment(_) => ComponentState::Ongoing,
            Self::TextQuestion(question) => question.completion_state(),
            Self::Sheet(sheet) if sheet.items.all_done() => ComponentState::Done,
            Self::Sheet(_) => ComponentState::Ongoing,
        }
    }
}

/// One element of a script with its completion state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentNode {
    name: String,
    state: ComponentState,
    kind: ComponentKind,
}

impl ComponentNode {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        let state = kind.initial_state();
        Self {
            name: name.into(),
            state,
            kind,
        }
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            name,
            ComponentKind::Text(TextBlock {
                text: text.into(),
                style: TextStyle::Normal,
            }),
        )
    }

    pub fn header(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            name,
            ComponentKind::Text(TextBlock {
                text: text.into(),
                style: TextStyle::Header,
            }),
        )
    }

    pub fn question(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            name,
            ComponentKind::Question(Question {
                text: text.into(),
                number: None,
            }),
        )
    }

    pub fn checkbox(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            name,
            ComponentKind::CheckboxQuestion(CheckboxQuestion { text: text.into() }),
        )
    }

    pub fn text_question(name: impl Into<String>, text: impl Into<String>, optional: bool) -> Self {
        Self::new(
            name,
            ComponentKind::TextQuestion(TextQuestion {
                text: text.into(),
                answer: String::new(),
                optional,
                number: None,
            }),
        )
    }

    pub fn experiment(
        name: impl Into<String>,
        sensor: Sensor,
        description: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ComponentKind::Experiment(ExperimentRef {
                sensor,
                description: description.into(),
                path: None,
            }),
        )
    }

    pub fn graph(name: impl Into<String>, view: GraphView) -> Self {
        Self::new(name, ComponentKind::Graph(view))
    }

    pub fn export(name: impl Into<String>) -> Self {
        Self::new(name, ComponentKind::Export)
    }

    pub fn sheet(name: impl Into<String>, items: Vec<ComponentNode>) -> Self {
        Self::new(
            name,
            ComponentKind::Sheet(Sheet::new(Orientation::Vertical, items)),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ComponentState {
        self.state
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Set the state; returns whether it changed.
    pub fn set_state(&mut self, state: ComponentState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        true
    }

    /// Nested item at `path` (empty path is `self`).
    pub fn item(&self, path: &[usize]) -> Option<&ComponentNode> {
        let Some((&index, rest)) = path.split_first() else {
            return Some(self);
        };
        match &self.kind {
            ComponentKind::Sheet(sheet) => sheet.items.get(index)?.item(rest),
            _ => None,
        }
    }

    /// Check this component and, for sheets, every nested item.
    ///
    /// Failures name the component that is actually misconfigured.
    pub fn init_check(&self) -> Result<(), ScriptError> {
        match &self.kind {
            ComponentKind::Graph(graph) if graph.experiment.is_none() => {
                Err(self.check_failure("no experiment data"))
            }
            ComponentKind::Sheet(sheet) => sheet.items.init_check(),
            _ => Ok(()),
        }
    }

    fn check_failure(&self, message: &str) -> ScriptError {
        ScriptError::Validation {
            component: self.name.clone(),
            message: message.to_string(),
        }
    }

    pub fn to_bundle(&self, bundle: &mut Bundle) {
        bundle.put_int(STATE_KEY, self.state.code());
        match &self.kind {
            ComponentKind::TextQuestion(question) => {
                if !question.answer.is_empty() {
                    bundle.put_string(QUESTION_KEY, question.text.as_str());
                    if let Some(number) = question.number {
                        bundle.put_int(NUMBER_KEY, i64::from(number));
                    }
                }
                bundle.put_string(ANSWER_KEY, question.answer.as_str());
            }
            ComponentKind::Experiment(experiment) => {
                if let Some(path) = &experiment.path {
                    bundle.put_string(EXPERIMENT_PATH_KEY, path.to_string_lossy());
                }
            }
            ComponentKind::Sheet(sheet) => sheet.items.to_bundle(bundle),
            _ => {}
        }
    }

    /// Restore from `bundle`. `state` is required; other keys default.
    pub fn from_bundle(&mut self, bundle: &Bundle) -> Result<(), ScriptError> {
        let code = bundle
            .get_int(STATE_KEY)
            .ok_or_else(|| ScriptError::MissingKey {
                component: self.name.clone(),
                key: STATE_KEY,
            })?;
        let state = ComponentState::from_code(code).ok_or_else(|| ScriptError::InvalidValue {
            component: self.name.clone(),
            key: STATE_KEY,
        })?;

        match &mut self.kind {
            ComponentKind::TextQuestion(question) => {
                question.answer = bundle.get_string(ANSWER_KEY).unwrap_or_default().to_string();
            }
            ComponentKind::Experiment(experiment) => {
                let path = bundle
                    .get_string(EXPERIMENT_PATH_KEY)
                    .filter(|path| !path.is_empty())
                    .map(PathBuf::from);
                if path.as_deref().is_some_and(|path| !is_contained_path(path)) {
                    return Err(ScriptError::InvalidValue {
                        component: self.name.clone(),
                        key: EXPERIMENT_PATH_KEY,
                    });
                }
                experiment.path = path;
            }
            ComponentKind::Sheet(sheet) => sheet.items.from_bundle(bundle)?,
            _ => {}
        }

        self.state = state;
        Ok(())
    }

    /// Apply `interaction` to the item at `path`, propagating completion
    /// up through enclosing sheets. Every actual change is appended to
    /// `changes`, innermost first.
    pub(crate) fn apply(
        &mut self,
        path: &[usize],
        interaction: &Interaction,
        changes: &mut Vec<ItemChange>,
    ) -> Result<(), ScriptError> {
        let Some((&index, rest)) = path.split_first() else {
            let state = self.interaction_state(interaction)?;
            if self.set_state(state) {
                changes.push(ItemChange {
                    items: Vec::new(),
                    state,
                });
            }
            return Ok(());
        };

        let ComponentKind::Sheet(sheet) = &mut self.kind else {
            return Err(ScriptError::UnknownComponent(format!(
                "item {index} of \"{}\"",
                self.name
            )));
        };

        let mut nested = Vec::new();
        let reduced = sheet
            .items
            .update(index, |item| item.apply(rest, interaction, &mut nested))?;
        for mut change in nested {
            change.items.insert(0, index);
            changes.push(change);
        }

        if let Some(all_done) = reduced {
            let state = if all_done {
                ComponentState::Done
            } else {
                ComponentState::Ongoing
            };
            if self.set_state(state) {
                changes.push(ItemChange {
                    items: Vec::new(),
                    state,
                });
            }
        }
        Ok(())
    }

    /// Update kind-specific data and return the resulting state.
    fn interaction_state(&mut self, interaction: &Interaction) -> Result<ComponentState, ScriptError> {
        let state = match (interaction, &mut self.kind) {
            (Interaction::SetState(state), _) => *state,
            (Interaction::SetChecked(true), ComponentKind::CheckboxQuestion(_)) => {
                ComponentState::Done
            }
            (Interaction::SetChecked(false), ComponentKind::CheckboxQuestion(_)) => {
                ComponentState::Ongoing
            }
            (Interaction::SetAnswer(answer), ComponentKind::TextQuestion(question)) => {
                question.answer.clone_from(answer);
                question.completion_state()
            }
            (Interaction::SetOptional(optional), ComponentKind::TextQuestion(question)) => {
                question.optional = *optional;
                question.completion_state()
            }
            (Interaction::RecordExperiment(path), ComponentKind::Experiment(experiment)) => {
                if !is_contained_path(path) {
                    return Err(ScriptError::InvalidValue {
                        component: self.name.clone(),
                        key: EXPERIMENT_PATH_KEY,
                    });
                }
                experiment.path = Some(path.clone());
                ComponentState::Done
            }
            (interaction, _) => {
                return Err(ScriptError::UnsupportedInteraction {
                    component: self.name.clone(),
                    interaction: interaction.label(),
                });
            }
        };
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement_sheet() -> ComponentNode {
        ComponentNode::sheet(
            "Measure",
            vec![
                ComponentNode::header("title", "Measure the period"),
                ComponentNode::text_question("period", "What is the period?", false),
                ComponentNode::checkbox("safety", "I secured the pendulum"),
            ],
        )
    }

    #[test]
    fn initial_states_follow_component_kind() {
        assert_eq!(ComponentNode::text("t", "hi").state(), ComponentState::Done);
        assert_eq!(
            ComponentNode::checkbox("c", "ok?").state(),
            ComponentState::Ongoing
        );
        assert_eq!(
            ComponentNode::text_question("q", "why?", true).state(),
            ComponentState::Done
        );
        assert_eq!(measurement_sheet().state(), ComponentState::Ongoing);
        assert_eq!(
            ComponentNode::sheet("intro", vec![ComponentNode::text("t", "hi")]).state(),
            ComponentState::Done
        );
        assert_eq!(
            ComponentNode::sheet("empty", Vec::new()).state(),
            ComponentState::Ongoing
        );
    }

    #[test]
    fn set_state_reports_change_once() {
        let mut node = ComponentNode::checkbox("c", "ok?");
        assert!(node.set_state(ComponentState::Done));
        assert!(!node.set_state(ComponentState::Done));
    }

    #[test]
    fn sheet_numbers_questions_in_order() {
        let sheet = ComponentNode::sheet(
            "s",
            vec![
                ComponentNode::question("a", "Look at the ball."),
                ComponentNode::text("t", "Some text"),
                ComponentNode::text_question("b", "How fast?", false),
            ],
        );
        let ComponentKind::Question(first) = sheet.item(&[0]).expect("item").kind() else {
            panic!("expected question");
        };
        let ComponentKind::TextQuestion(second) = sheet.item(&[2]).expect("item").kind() else {
            panic!("expected text question");
        };
        assert_eq!(first.number(), Some(1));
        assert_eq!(second.number(), Some(2));
    }

    /// Answering every open item completes the sheet; changes arrive leaf first.
    #[test]
    fn apply_propagates_completion_to_sheet() {
        let mut sheet = measurement_sheet();
        let mut changes = Vec::new();

        sheet
            .apply(&[1], &Interaction::SetAnswer("2.1 s".to_string()), &mut changes)
            .expect("answer");
        assert_eq!(
            changes,
            vec![ItemChange {
                items: vec![1],
                state: ComponentState::Done
            }]
        );
        assert_eq!(sheet.state(), ComponentState::Ongoing);

        changes.clear();
        sheet
            .apply(&[2], &Interaction::SetChecked(true), &mut changes)
            .expect("check");
        assert_eq!(
            changes,
            vec![
                ItemChange {
                    items: vec![2],
                    state: ComponentState::Done
                },
                ItemChange {
                    items: Vec::new(),
                    state: ComponentState::Done
                },
            ]
        );
        assert_eq!(sheet.state(), ComponentState::Done);
    }

    #[test]
    fn clearing_an_answer_reopens_the_sheet() {
        let mut sheet = measurement_sheet();
        let mut changes = Vec::new();
        sheet
            .apply(&[1], &Interaction::SetAnswer("2.1 s".to_string()), &mut changes)
            .expect("answer");
        sheet
            .apply(&[2], &Interaction::SetChecked(true), &mut changes)
            .expect("check");
        sheet
            .apply(&[1], &Interaction::SetAnswer(String::new()), &mut changes)
            .expect("clear");
        assert_eq!(sheet.state(), ComponentState::Ongoing);
    }

    #[test]
    fn apply_rejects_mismatched_interaction() {
        let mut sheet = measurement_sheet();
        let err = sheet
            .apply(&[0], &Interaction::SetChecked(true), &mut Vec::new())
            .expect_err("header cannot be checked");
        assert_eq!(
            err,
            ScriptError::UnsupportedInteraction {
                component: "title".to_string(),
                interaction: "set-checked",
            }
        );
    }

    #[test]
    fn init_check_names_failing_descendant() {
        let sheet = ComponentNode::sheet(
            "Analysis",
            vec![
                ComponentNode::text("intro", "Look at the graph"),
                ComponentNode::graph("speed", GraphView::time_vs_x_velocity(None)),
            ],
        );
        let err = sheet.init_check().expect_err("graph without experiment");
        assert_eq!(err.to_string(), "In Component \"speed\": no experiment data");
    }

    #[test]
    fn text_question_bundle_keeps_answer_and_number() {
        let mut sheet = measurement_sheet();
        sheet
            .apply(&[1], &Interaction::SetAnswer("2.1 s".to_string()), &mut Vec::new())
            .expect("answer");

        let mut bundle = Bundle::new();
        sheet.to_bundle(&mut bundle);
        let item = bundle.get_bundle("1").expect("item bundle");
        assert_eq!(item.get_string("answer"), Some("2.1 s"));
        assert_eq!(item.get_string("question"), Some("What is the period?"));
        assert_eq!(item.get_int("number"), Some(1));

        let mut restored = measurement_sheet();
        restored.from_bundle(&bundle).expect("restore");
        assert_eq!(restored, sheet);
    }

    #[test]
    fn from_bundle_defaults_optional_keys() {
        let mut bundle = Bundle::new();
        bundle.put_int("state", ComponentState::Ongoing.code());

        let mut question = ComponentNode::text_question("q", "Why?", false);
        question.from_bundle(&bundle).expect("restore");
        let ComponentKind::TextQuestion(text_question) = question.kind() else {
            panic!("expected text question");
        };
        assert_eq!(text_question.answer(), "");
    }

    #[test]
    fn from_bundle_requires_state() {
        let mut node = ComponentNode::checkbox("c", "ok?");
        let err = node.from_bundle(&Bundle::new()).expect_err("missing state");
        assert_eq!(
            err,
            ScriptError::MissingKey {
                component: "c".to_string(),
                key: "state",
            }
        );
    }

    #[test]
    fn experiment_paths_must_stay_in_run_dir() {
        assert!(is_contained_path(Path::new("experiments/swing-1")));
        assert!(!is_contained_path(Path::new("")));
        assert!(!is_contained_path(Path::new("../precious")));
        assert!(!is_contained_path(Path::new("experiments/../../precious")));
        assert!(!is_contained_path(Path::new("/home/learner")));
        assert!(!is_contained_path(Path::new("./experiments")));
    }

    #[test]
    fn record_rejects_escaping_path() {
        let mut experiment = ComponentNode::experiment("swing", Sensor::Camera, "Film it");
        let err = experiment
            .apply(
                &[],
                &Interaction::RecordExperiment(PathBuf::from("../precious")),
                &mut Vec::new(),
            )
            .expect_err("outside the run");
        assert_eq!(
            err,
            ScriptError::InvalidValue {
                component: "swing".to_string(),
                key: "experiment_path",
            }
        );
        assert_eq!(experiment.state(), ComponentState::Ongoing);
        let ComponentKind::Experiment(recorded) = experiment.kind() else {
            panic!("expected experiment");
        };
        assert_eq!(recorded.path(), None);
    }

    #[test]
    fn from_bundle_rejects_escaping_experiment_path() {
        let mut bundle = Bundle::new();
        bundle.put_int("state", ComponentState::Done.code());
        bundle.put_string("experiment_path", "/home/learner");

        let mut experiment = ComponentNode::experiment("swing", Sensor::Camera, "Film it");
        let err = experiment.from_bundle(&bundle).expect_err("absolute path");
        assert_eq!(
            err,
            ScriptError::InvalidValue {
                component: "swing".to_string(),
                key: "experiment_path",
            }
        );
        assert_eq!(experiment.state(), ComponentState::Ongoing);
    }

    #[test]
    fn graph_axes_parse_case_insensitively() {
        assert_eq!("X-Position".parse::<GraphAxis>(), Ok(GraphAxis::XPosition));
        assert_eq!("TIME_V".parse::<GraphAxis>(), Ok(GraphAxis::TimeVelocity));
        assert!("z-position".parse::<GraphAxis>().is_err());
    }
}
