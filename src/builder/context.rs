//! Build context - paths, profile, toolchain and shared build state.
//!
//! One context exists per invocation and is passed by reference to every
//! build node. Apart from the component registry and the tool cells in the
//! bootstrap, everything it holds is immutable.

use std::fmt;
use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::Arc;

use crate::builder::bootstrap::{ToolBootstrap, ToolHandle};
use crate::builder::events::{BuildEvent, EventSink, MessageFormat};
use crate::builder::registry::ComponentRegistry;
use crate::builder::toolchain::Toolchain;
use crate::core::component::{Component, Verdict, COMPONENT_EXTENSION};
use crate::core::error::BuildError;
use crate::core::profile::ComponentProfile;
use crate::core::registry::{TargetRegistry, ToolDep};

/// Build context shared by all nodes of one build.
pub struct BuildContext {
    /// Canonical project root
    root: PathBuf,

    /// Output directory
    out_dir: PathBuf,

    /// Selected component profile
    profile: Arc<ComponentProfile>,

    /// Toolchain for component builds, bound from the profile
    toolchain: Arc<dyn Toolchain>,

    /// Declared targets
    targets: Arc<TargetRegistry>,

    bootstrap: ToolBootstrap,
    registry: ComponentRegistry,
    events: EventSink,

    /// Pass `-v` to generators
    verbose_generator: bool,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("root", &self.root)
            .field("out_dir", &self.out_dir)
            .field("profile", &self.profile.name)
            .field("toolchain", &self.toolchain)
            .field("verbose_generator", &self.verbose_generator)
            .finish()
    }
}

impl BuildContext {
    /// Create a context. The host toolchain is only needed when a tool is
    /// built from source.
    pub fn new(
        root: PathBuf,
        out_dir: PathBuf,
        profile: Arc<ComponentProfile>,
        toolchain: Arc<dyn Toolchain>,
        targets: Arc<TargetRegistry>,
        host_toolchain: Option<Arc<dyn Toolchain>>,
    ) -> Self {
        let bootstrap = ToolBootstrap::new(targets.tools().count(), host_toolchain);
        BuildContext {
            root,
            out_dir,
            profile,
            toolchain,
            targets,
            bootstrap,
            registry: ComponentRegistry::new(),
            events: EventSink::new(MessageFormat::Human),
            verbose_generator: false,
        }
    }

    pub fn with_message_format(mut self, format: MessageFormat) -> Self {
        self.events = EventSink::new(format);
        self
    }

    pub fn with_verbose_generator(mut self, verbose: bool) -> Self {
        self.verbose_generator = verbose;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn profile(&self) -> &ComponentProfile {
        &self.profile
    }

    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    pub fn verbose_generator(&self) -> bool {
        self.verbose_generator
    }

    pub fn message_format(&self) -> MessageFormat {
        self.events.format()
    }

    /// Resolve a tool, building it on first use.
    pub fn resolve_tool(&self, dep: ToolDep) -> Result<ToolHandle, BuildError> {
        self.bootstrap.resolve(self, dep)
    }

    /// Number of tool sub-builds that actually ran.
    pub fn tool_builds(&self) -> usize {
        self.bootstrap.builds()
    }

    pub fn register_component(&self, component: Component) {
        self.registry.register(component);
    }

    pub fn record_verdict(&self, name: &str, verdict: Verdict) {
        if !self.registry.record_verdict(name, verdict) {
            tracing::warn!("verdict for unregistered component `{}`", name);
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn emit(&self, event: BuildEvent) {
        self.events.emit(event);
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.events()
    }

    /// The output directory mirroring `dir`.
    ///
    /// Directories outside the project root are mirrored under
    /// `<out>/external`.
    pub fn mirror_dir(&self, dir: &Path) -> PathBuf {
        match dir.strip_prefix(&self.root) {
            Ok(rel) => self.out_dir.join(rel),
            Err(_) => {
                let rel: PathBuf = dir
                    .components()
                    .filter(|c| matches!(c, PathComponent::Normal(_)))
                    .collect();
                self.out_dir.join("external").join(rel)
            }
        }
    }

    /// `<out>/<name>.comp`
    pub fn component_output(&self, name: &str) -> PathBuf {
        self.out_dir
            .join(format!("{}.{}", name, COMPONENT_EXTENSION))
    }

    /// `<out>/<name>.map`
    pub fn map_output(&self, name: &str) -> PathBuf {
        self.out_dir.join(format!("{}.map", name))
    }

    /// `<out>/<name>/obj`
    pub fn object_dir(&self, name: &str) -> PathBuf {
        self.out_dir.join(name).join("obj")
    }

    /// `<out>/tools/<name>`
    pub fn tool_dir(&self, name: &str) -> PathBuf {
        self.out_dir.join("tools").join(name)
    }
}
