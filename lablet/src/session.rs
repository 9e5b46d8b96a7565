//! A learner's session with one script run.
//!
//! A session ties a [`Script`] to its run directory: it starts new runs,
//! resumes saved ones, keeps track of the page the learner is looking at and
//! writes everything back on [`ScriptSession::save`].

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, warn};

use crate::core::active_chain::active_chain;
use crate::core::bundle::Bundle;
use crate::core::component::ComponentKind;
use crate::core::persistence::{CURRENT_FRAGMENT_KEY, SCRIPT_NAME_KEY};
use crate::core::types::{ComponentPath, Interaction, StateChange};
use crate::io::config::LabletConfig;
use crate::io::export::AnswerExporter;
use crate::io::paths::RunPaths;
use crate::io::source::ScriptLoader;
use crate::io::state_store::{load_state_file, write_state_file};
use crate::script::{Script, Subscription, generate_script_uid};
use crate::tree::{NodeId, ScriptTree};

/// Active chain plus the selected page, refreshed on every state change.
#[derive(Debug, Default)]
struct PageTracker {
    chain: Vec<NodeId>,
    current: usize,
}

impl PageTracker {
    /// Keep the selected component if it is still visible, otherwise select
    /// the last page.
    fn refresh(&mut self, tree: &ScriptTree) {
        let selected = self.chain.get(self.current).copied();
        self.chain = active_chain(tree);
        self.current = selected
            .and_then(|id| self.chain.iter().position(|candidate| *candidate == id))
            .unwrap_or_else(|| self.chain.len().saturating_sub(1));
    }

    fn select(&mut self, index: usize) {
        self.current = index.min(self.chain.len().saturating_sub(1));
    }
}

/// A running script bound to its run directory.
pub struct ScriptSession {
    script: Script,
    paths: RunPaths,
    script_source: PathBuf,
    script_name: String,
    pages: Rc<RefCell<PageTracker>>,
    _subscription: Subscription,
}

impl ScriptSession {
    /// Start a fresh run of `script_path` in `run_dir`.
    ///
    /// If the run directory had to be created and the script cannot be
    /// started, the directory is removed again.
    pub fn start_new(
        loader: &dyn ScriptLoader,
        cfg: &LabletConfig,
        script_path: &Path,
        run_dir: &Path,
    ) -> Result<Self> {
        let created = !run_dir.exists();
        fs::create_dir_all(run_dir)
            .with_context(|| format!("create run directory {}", run_dir.display()))?;
        match Self::open_new(loader, cfg, script_path, run_dir) {
            Ok(session) => Ok(session),
            Err(err) => {
                if created {
                    if let Err(cleanup) = fs::remove_dir_all(run_dir) {
                        warn!(run = %run_dir.display(), error = %cleanup, "failed to remove run directory");
                    }
                }
                Err(err)
            }
        }
    }

    fn open_new(
        loader: &dyn ScriptLoader,
        cfg: &LabletConfig,
        script_path: &Path,
        run_dir: &Path,
    ) -> Result<Self> {
        let script_name = script_file_name(script_path)?;
        let mut script = loader.load(script_path)?;
        script
            .init_check()
            .map_err(anyhow::Error::from)
            .with_context(|| format!("check script {}", script_path.display()))?;
        let mut session = Self::attach(script, cfg, run_dir, script_path, script_name);
        session.script.start();
        session.refresh_pages();
        session.pages.borrow_mut().select(0);
        info!(run = %run_dir.display(), title = %session.script.title(), "started new run");
        Ok(session)
    }

    /// Resume the run saved in `run_dir` from its private script copy.
    pub fn resume(loader: &dyn ScriptLoader, cfg: &LabletConfig, run_dir: &Path) -> Result<Self> {
        let paths = RunPaths::new(run_dir, cfg);
        let bundle = load_state_file(&paths.state_path)?;
        let script_name = bundle
            .get_string(SCRIPT_NAME_KEY)
            .filter(|name| !name.is_empty())
            .with_context(|| format!("{} contains no {SCRIPT_NAME_KEY}", paths.state_path.display()))?
            .to_string();
        let script_path = paths.script_copy(&script_name);
        let mut script = loader.load(&script_path)?;
        script
            .load_state(&bundle)
            .map_err(anyhow::Error::from)
            .with_context(|| format!("restore state from {}", paths.state_path.display()))?;

        let fragment = bundle.get_int(CURRENT_FRAGMENT_KEY).unwrap_or(0);
        let session = Self::attach(script, cfg, run_dir, &script_path, script_name);
        session.refresh_pages();
        session
            .pages
            .borrow_mut()
            .select(usize::try_from(fragment).unwrap_or(0));
        info!(run = %run_dir.display(), page = session.current_page(), "resumed run");
        Ok(session)
    }

    fn attach(
        mut script: Script,
        cfg: &LabletConfig,
        run_dir: &Path,
        script_source: &Path,
        script_name: String,
    ) -> Self {
        script.set_user_data_dir(run_dir);
        let pages = Rc::new(RefCell::new(PageTracker::default()));
        let listener_pages = Rc::clone(&pages);
        let subscription = script.subscribe(move |tree: &ScriptTree, _change: &StateChange| {
            listener_pages.borrow_mut().refresh(tree);
        });
        Self {
            script,
            paths: RunPaths::new(run_dir, cfg),
            script_source: script_source.to_path_buf(),
            script_name,
            pages,
            _subscription: subscription,
        }
    }

    fn refresh_pages(&self) {
        self.pages.borrow_mut().refresh(self.script.tree());
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// File name of the script source inside the run directory.
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// Components currently visible, one page each.
    pub fn chain(&self) -> Vec<NodeId> {
        self.pages.borrow().chain.clone()
    }

    pub fn current_page(&self) -> usize {
        self.pages.borrow().current
    }

    pub fn current_component(&self) -> Option<NodeId> {
        let pages = self.pages.borrow();
        pages.chain.get(pages.current).copied()
    }

    /// Select page `index` of the active chain.
    pub fn go_to_page(&mut self, index: usize) -> Result<()> {
        let mut pages = self.pages.borrow_mut();
        if index >= pages.chain.len() {
            bail!(
                "page {index} is not available (only {} page(s) unlocked)",
                pages.chain.len()
            );
        }
        pages.current = index;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.script.is_complete()
    }

    /// Apply `interaction` and report the resulting state changes.
    ///
    /// Replacing a recorded experiment deletes the previous recording.
    pub fn interact(
        &mut self,
        path: &ComponentPath,
        interaction: Interaction,
    ) -> Result<Vec<StateChange>> {
        let previous = self.recorded_experiment(path);
        let replaces_experiment = matches!(interaction, Interaction::RecordExperiment(_));
        let changes = self
            .script
            .interact(path, interaction)
            .map_err(anyhow::Error::from)?;
        if replaces_experiment {
            if let Some(previous) = previous {
                if self.recorded_experiment(path).as_deref() != Some(previous.as_path()) {
                    self.remove_recording(&previous);
                }
            }
        }
        Ok(changes)
    }

    /// Copy `source` into the run's experiment directory and attach it to
    /// the experiment component at `path`.
    pub fn record_experiment(
        &mut self,
        path: &ComponentPath,
        source: &Path,
    ) -> Result<Vec<StateChange>> {
        let component = self
            .script
            .tree()
            .component(path.node)
            .and_then(|node| node.item(&path.items))
            .ok_or_else(|| anyhow!("unknown component {path}"))?;
        if !matches!(component.kind(), ComponentKind::Experiment(_)) {
            bail!("component \"{}\" is not an experiment", component.name());
        }
        let file_name = source
            .file_name()
            .with_context(|| format!("experiment source {} has no file name", source.display()))?;
        let target_dir = self
            .paths
            .experiments_dir
            .join(generate_script_uid(component.name()));
        if target_dir.exists() {
            fs::remove_dir_all(&target_dir)
                .with_context(|| format!("clear directory {}", target_dir.display()))?;
        }
        fs::create_dir_all(&target_dir)
            .with_context(|| format!("create directory {}", target_dir.display()))?;
        let target = target_dir.join(file_name);
        fs::copy(source, &target).with_context(|| {
            format!("copy experiment {} to {}", source.display(), target.display())
        })?;
        let relative = self
            .paths
            .relative(&target_dir)
            .map(Path::to_path_buf)
            .with_context(|| format!("{} is outside the run directory", target_dir.display()))?;
        debug!(experiment = %relative.display(), "recorded experiment");
        self.interact(path, Interaction::RecordExperiment(relative))
    }

    fn recorded_experiment(&self, path: &ComponentPath) -> Option<PathBuf> {
        let component = self
            .script
            .tree()
            .component(path.node)?
            .item(&path.items)?;
        match component.kind() {
            ComponentKind::Experiment(experiment) => experiment.path().map(Path::to_path_buf),
            _ => None,
        }
    }

    /// Delete a replaced recording. Only paths that resolve to something
    /// strictly inside the run directory are touched.
    fn remove_recording(&self, relative: &Path) {
        let joined = self.paths.run_dir.join(relative);
        let target = match (joined.canonicalize(), self.paths.run_dir.canonicalize()) {
            (Ok(target), Ok(run_dir)) if target.starts_with(&run_dir) && target != run_dir => {
                target
            }
            _ => {
                warn!(experiment = %joined.display(), "not removing recording outside the run directory");
                return;
            }
        };
        let result = if target.is_dir() {
            fs::remove_dir_all(&target)
        } else {
            fs::remove_file(&target)
        };
        match result {
            Ok(()) => debug!(experiment = %target.display(), "removed replaced experiment"),
            Err(err) => warn!(experiment = %target.display(), error = %err, "failed to remove replaced experiment"),
        }
    }

    /// Write the state file, copying the script source into the run first
    /// if it is not there yet.
    pub fn save(&mut self) -> Result<()> {
        let mut bundle = Bundle::new();
        bundle.put_string(SCRIPT_NAME_KEY, self.script_name.as_str());
        bundle.put_int(
            CURRENT_FRAGMENT_KEY,
            i64::try_from(self.current_page()).unwrap_or(0),
        );
        self.script
            .save_state(&mut bundle)
            .map_err(anyhow::Error::from)
            .context("save script state")?;

        let script_copy = self.paths.script_copy(&self.script_name);
        if !script_copy.exists() {
            fs::copy(&self.script_source, &script_copy).with_context(|| {
                format!(
                    "copy script {} to {}",
                    self.script_source.display(),
                    script_copy.display()
                )
            })?;
        }
        write_state_file(&self.paths.state_path, &bundle)?;
        info!(run = %self.paths.run_dir.display(), page = self.current_page(), "saved run");
        Ok(())
    }

    /// Render the answer report into the run's export file.
    pub fn export_answers(&self, exporter: &AnswerExporter) -> Result<PathBuf> {
        exporter.export(&self.script, &self.paths.export_path)?;
        Ok(self.paths.export_path.clone())
    }
}

fn script_file_name(script_path: &Path) -> Result<String> {
    script_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("script path {} has no file name", script_path.display()))
}
