//! Build plan generation.
//!
//! The plan is a dependency graph with four node kinds:
//!
//! - `ToolReady`  a generator tool is built or located
//! - `Generate`   one interface definition is run through its generator
//! - `Assemble`   a component is compiled and linked
//! - `Verify`     a linked component is checked for undefined symbols
//!
//! Edges: `ToolReady -> Generate`, every `Generate` of a unit -> that unit's
//! `Assemble`, `Assemble -> Verify`, and every `Generate` of a used
//! component -> the user's `Assemble` so its generated headers exist.
//!
//! Everything that can be checked without running a tool is checked while
//! the plan is built, so configuration errors surface before any node runs.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{EdgeRef, Topo};
use petgraph::Direction;
use serde::Serialize;

use crate::builder::bootstrap::locate_program;
use crate::builder::context::BuildContext;
use crate::builder::generate::{generator_includes, ArtifactGenerationTask};
use crate::builder::include::{root_prefix, IncludeSetResolver};
use crate::core::error::BuildError;
use crate::core::interface::InterfaceDefinition;
use crate::core::registry::{ComponentDep, ComponentTarget, TargetId, ToolDep, ToolSource};
use crate::core::unit::CompilationUnit;
use crate::util::fs::{glob_files, normalize_lexically, relative_path};

/// A node of the build graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildNode {
    ToolReady { tool: ToolDep },
    Generate { component: ComponentDep, task: usize },
    Assemble { component: ComponentDep },
    Verify { component: ComponentDep },
}

impl BuildNode {
    pub fn kind(&self) -> &'static str {
        match self {
            BuildNode::ToolReady { .. } => "tool-ready",
            BuildNode::Generate { .. } => "generate",
            BuildNode::Assemble { .. } => "assemble",
            BuildNode::Verify { .. } => "verify",
        }
    }

    /// The target this node builds.
    pub fn target(&self) -> TargetId {
        match *self {
            BuildNode::ToolReady { tool } => TargetId::Tool(tool),
            BuildNode::Generate { component, .. }
            | BuildNode::Assemble { component }
            | BuildNode::Verify { component } => TargetId::Component(component),
        }
    }
}

/// Nodes declared for one component.
#[derive(Debug, Clone, Default)]
struct ComponentNodes {
    generate: Vec<NodeIndex>,
    assemble: Option<NodeIndex>,
    verify: Option<NodeIndex>,
}

/// The build graph plus everything its nodes need at execution time.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    graph: DiGraph<BuildNode, ()>,
    units: BTreeMap<ComponentDep, CompilationUnit>,
    tasks: Vec<ArtifactGenerationTask>,
    tool_nodes: HashMap<ToolDep, NodeIndex>,
    component_nodes: HashMap<ComponentDep, ComponentNodes>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan `roots` and every component they transitively use.
    pub fn for_components(ctx: &BuildContext, roots: &[ComponentDep]) -> Result<Self> {
        let closure = ctx.targets().uses_closure(roots)?;

        let mut plan = BuildPlan::new();
        for &dep in &closure {
            plan.declare_component(ctx, dep)?;
        }
        for &dep in &closure {
            plan.link_uses(ctx, dep)?;
        }

        Ok(plan)
    }

    /// Plan every declared component.
    pub fn for_all(ctx: &BuildContext) -> Result<Self> {
        let roots: Vec<ComponentDep> = ctx.targets().components().map(|(dep, _)| dep).collect();
        Self::for_components(ctx, &roots)
    }

    pub fn graph(&self) -> &DiGraph<BuildNode, ()> {
        &self.graph
    }

    pub fn node(&self, index: NodeIndex) -> BuildNode {
        self.graph[index]
    }

    pub fn unit(&self, dep: ComponentDep) -> Option<&CompilationUnit> {
        self.units.get(&dep)
    }

    pub fn units(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.values()
    }

    pub fn task(&self, index: usize) -> Option<&ArtifactGenerationTask> {
        self.tasks.get(index)
    }

    pub fn tasks(&self) -> &[ArtifactGenerationTask] {
        &self.tasks
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Direct dependencies of `index`.
    pub fn dependencies(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(index, Direction::Incoming)
    }

    /// Direct dependents of `index`.
    pub fn dependents(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(index, Direction::Outgoing)
    }

    /// All nodes in dependency order.
    pub fn topological_order(&self) -> Vec<NodeIndex> {
        let mut topo = Topo::new(&self.graph);
        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(node) = topo.next(&self.graph) {
            order.push(node);
        }
        order
    }

    /// Name of the target a node belongs to.
    pub fn target_name<'a>(&self, ctx: &'a BuildContext, index: NodeIndex) -> &'a str {
        ctx.targets().descriptor(self.graph[index].target()).name()
    }

    /// Human label for a node, e.g. `generate net (net_v1.if)`.
    pub fn describe(&self, ctx: &BuildContext, index: NodeIndex) -> String {
        let node = self.graph[index];
        let target = self.target_name(ctx, index);
        match node {
            BuildNode::Generate { task, .. } => match self.tasks.get(task) {
                Some(task) => format!(
                    "generate {} ({})",
                    target,
                    task.interface()
                        .path()
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ),
                None => format!("generate {}", target),
            },
            _ => format!("{} {}", node.kind(), target),
        }
    }

    fn tool_node(&mut self, ctx: &BuildContext, tool: ToolDep, requested_by: &str) -> Result<NodeIndex> {
        if let Some(&index) = self.tool_nodes.get(&tool) {
            return Ok(index);
        }

        let target = ctx.targets().tool(tool);
        match &target.source {
            ToolSource::Program(program) => {
                if locate_program(ctx.root(), program).is_none() {
                    return Err(BuildError::ToolNotFound {
                        tool: target.name.clone(),
                        requested_by: requested_by.to_string(),
                    }
                    .into());
                }
            }
            ToolSource::Build { dir, .. } => {
                let dir = ctx.root().join(dir);
                if !dir.is_dir() {
                    bail!(
                        "source directory {} of tool `{}` does not exist",
                        dir.display(),
                        target.name
                    );
                }
            }
        }

        let index = self.graph.add_node(BuildNode::ToolReady { tool });
        self.tool_nodes.insert(tool, index);
        Ok(index)
    }

    /// Directories holding the interface definitions of `target`.
    fn interface_dirs(ctx: &BuildContext, target: &ComponentTarget) -> Vec<PathBuf> {
        let resolver = IncludeSetResolver::new(ctx.root(), ctx.profile());
        let dir = ctx.root().join(&target.dir);
        target
            .interfaces
            .iter()
            .filter_map(|entry| {
                resolver
                    .resolve_entry(&dir, &entry.path)
                    .parent()
                    .map(Path::to_path_buf)
            })
            .collect()
    }

    /// Declare the nodes of one component and return its `Assemble` node.
    ///
    /// Declaring a component again returns the existing node and changes
    /// nothing.
    pub fn declare_component(&mut self, ctx: &BuildContext, dep: ComponentDep) -> Result<NodeIndex> {
        if let Some(index) = self.component_nodes.get(&dep).and_then(|n| n.assemble) {
            return Ok(index);
        }

        let targets = ctx.targets();
        let target = targets.component(dep);
        let name = target.name.as_str();
        let profile = ctx.profile();
        let resolver = IncludeSetResolver::new(ctx.root(), profile);

        let dir = normalize_lexically(&ctx.root().join(&target.dir));
        if !dir.starts_with(ctx.root()) {
            bail!(
                "directory {} of component `{}` is outside the project root",
                dir.display(),
                name
            );
        }
        if !dir.is_dir() {
            bail!(
                "directory {} of component `{}` does not exist",
                dir.display(),
                name
            );
        }
        let prefix = root_prefix(&relative_path(ctx.root(), &dir));

        let mut unit = CompilationUnit::new(name, &dir).with_flags(
            target.defines.clone(),
            target.cflags.clone(),
            target.cxxflags.clone(),
        );

        for used in &target.uses {
            targets.component_dep(used, name)?;
            unit.add_use(used.clone());
        }

        let sources = glob_files(&dir, &target.sources)
            .with_context(|| format!("failed to collect sources of component `{}`", name))?;
        for source in sources {
            unit.add_source(source);
        }

        let with_defaults = target.include_defaults.unwrap_or(profile.include_defaults);
        let unit_includes = resolver.resolve(name, &dir, &target.includes, &prefix, with_defaults)?;
        for include in &unit_includes {
            unit.add_include_dir(include.clone());
        }

        let mut nodes = ComponentNodes::default();

        if !target.interfaces.is_empty() {
            let tool_name = target.generator.as_deref().unwrap_or("(none)");
            let tool = targets.tool_dep(tool_name, name)?;
            let tool_index = self.tool_node(ctx, tool, name)?;

            let mut dependency_dirs = Self::interface_dirs(ctx, target);
            for used in &target.uses {
                let used = targets.component(targets.component_dep(used, name)?);
                dependency_dirs.extend(Self::interface_dirs(ctx, used));
            }

            for entry in &target.interfaces {
                let path = resolver.resolve_entry(&dir, &entry.path);
                if !path.is_file() {
                    bail!(
                        "interface definition {} of component `{}` does not exist",
                        path.display(),
                        name
                    );
                }
                let def = InterfaceDefinition::new(path)?.with_includes(entry.includes.clone());

                let own_includes = resolver.resolve(name, &dir, def.includes(), &prefix, false)?;
                let mut includes = own_includes;
                includes.extend(unit_includes.iter().cloned());
                let includes = generator_includes(&def, &includes, &dependency_dirs);

                let output_dir = ctx.mirror_dir(def.dir());
                unit.add_interface(def.clone());
                let task = ArtifactGenerationTask::declare(&mut unit, def, tool, &output_dir, includes);

                let task_index = self.tasks.len();
                self.tasks.push(task);
                let index = self.graph.add_node(BuildNode::Generate {
                    component: dep,
                    task: task_index,
                });
                self.graph.add_edge(tool_index, index, ());
                nodes.generate.push(index);
            }
        }

        if unit.sources().is_empty() {
            bail!("component `{}` has no sources to compile", name);
        }

        let assemble = self.graph.add_node(BuildNode::Assemble { component: dep });
        for &generate in &nodes.generate {
            self.graph.add_edge(generate, assemble, ());
        }
        let verify = self.graph.add_node(BuildNode::Verify { component: dep });
        self.graph.add_edge(assemble, verify, ());

        nodes.assemble = Some(assemble);
        nodes.verify = Some(verify);
        self.component_nodes.insert(dep, nodes);
        self.units.insert(dep, unit);

        Ok(assemble)
    }

    /// Make the generated headers of used components visible to `dep` and
    /// order their generation before its assembly.
    fn link_uses(&mut self, ctx: &BuildContext, dep: ComponentDep) -> Result<()> {
        let targets = ctx.targets();
        let target = targets.component(dep);

        let Some(assemble) = self.component_nodes.get(&dep).and_then(|n| n.assemble) else {
            return Ok(());
        };

        for used in &target.uses {
            let used = targets.component_dep(used, &target.name)?;
            if used == dep {
                continue;
            }
            let generate = self
                .component_nodes
                .get(&used)
                .map(|n| n.generate.clone())
                .unwrap_or_default();

            let mut output_dirs = Vec::new();
            for &index in &generate {
                if let BuildNode::Generate { task, .. } = self.graph[index] {
                    if let Some(task) = self.tasks.get(task) {
                        output_dirs.push(task.artifacts().output_dir().to_path_buf());
                    }
                }
                if self.graph.find_edge(index, assemble).is_none() {
                    self.graph.add_edge(index, assemble, ());
                }
            }

            if let Some(unit) = self.units.get_mut(&dep) {
                for dir in output_dirs {
                    unit.add_include_dir(dir);
                }
            }
        }

        Ok(())
    }

    /// Serializable view for `keel plan`.
    pub fn summary(&self, ctx: &BuildContext) -> PlanSummary {
        let nodes = self
            .graph
            .node_indices()
            .map(|index| NodeSummary {
                id: index.index(),
                kind: self.graph[index].kind(),
                target: self.target_name(ctx, index).to_string(),
                label: self.describe(ctx, index),
            })
            .collect();

        let edges = self
            .graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index()))
            .collect();

        let units = self.units.values().cloned().collect();

        PlanSummary {
            profile: ctx.profile().name.clone(),
            nodes,
            edges,
            units,
        }
    }
}

/// JSON form of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub profile: String,
    pub nodes: Vec<NodeSummary>,
    pub edges: Vec<(usize, usize)>,
    pub units: Vec<CompilationUnit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: usize,
    pub kind: &'static str,
    pub target: String,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixtures::ProjectFixture;

    fn two_component_fixture() -> ProjectFixture {
        ProjectFixture::new()
            .component(
                "hal",
                r#"dir = "modules/hal"
sources = ["*.cpp"]
interfaces = ["hal_v1.if"]"#,
            )
            .component(
                "net",
                r#"dir = "modules/net"
sources = ["*.cpp"]
interfaces = ["net_v1.if"]
uses = ["hal"]"#,
            )
            .file("modules/hal/hal.cpp", "int hal_init() { return 0; }\n")
            .file("modules/hal/hal_v1.if", "interface hal_v1;\n")
            .file("modules/net/net.cpp", "int net() { return 0; }\n")
            .file("modules/net/net_v1.if", "interface net_v1;\n")
    }

    fn count(plan: &BuildPlan, kind: &str) -> usize {
        plan.graph()
            .node_indices()
            .filter(|&i| plan.node(i).kind() == kind)
            .count()
    }

    #[test]
    fn test_node_shape() {
        let fixture = two_component_fixture();
        let ctx = fixture.context();
        let plan = BuildPlan::for_all(&ctx).unwrap();

        assert_eq!(count(&plan, "tool-ready"), 1);
        assert_eq!(count(&plan, "generate"), 2);
        assert_eq!(count(&plan, "assemble"), 2);
        assert_eq!(count(&plan, "verify"), 2);
    }

    #[test]
    fn test_ordering_edges() {
        let fixture = two_component_fixture();
        let ctx = fixture.context();
        let plan = BuildPlan::for_all(&ctx).unwrap();
        let order = plan.topological_order();
        let position = |pred: &dyn Fn(&BuildPlan, NodeIndex) -> bool| {
            order.iter().position(|&i| pred(&plan, i)).unwrap()
        };

        let hal = ctx.targets().component_dep("hal", "test").unwrap();
        let net = ctx.targets().component_dep("net", "test").unwrap();

        let tool = position(&|p, i| matches!(p.node(i), BuildNode::ToolReady { .. }));
        let hal_generate = position(&|p, i| matches!(p.node(i), BuildNode::Generate { component, .. } if component == hal));
        let net_assemble = position(&|p, i| p.node(i) == BuildNode::Assemble { component: net });
        let net_verify = position(&|p, i| p.node(i) == BuildNode::Verify { component: net });

        assert!(tool < hal_generate);
        assert!(hal_generate < net_assemble);
        assert!(net_assemble < net_verify);
    }

    #[test]
    fn test_used_headers_visible() {
        let fixture = two_component_fixture();
        let ctx = fixture.context();
        let plan = BuildPlan::for_all(&ctx).unwrap();

        let net = ctx.targets().component_dep("net", "test").unwrap();
        let unit = plan.unit(net).unwrap();
        let hal_out = ctx.mirror_dir(&fixture.root().join("modules/hal"));
        assert!(unit.include_dirs().contains(&hal_out));

        let net_task = plan
            .tasks()
            .iter()
            .find(|t| t.unit() == "net")
            .unwrap();
        assert_eq!(net_task.includes()[0], fixture.root().join("modules/net"));
        assert!(net_task.includes().contains(&fixture.root().join("modules/hal")));
    }

    #[test]
    fn test_repeated_declaration_is_idempotent() {
        let fixture = two_component_fixture();
        let ctx = fixture.context();
        let mut plan = BuildPlan::for_all(&ctx).unwrap();
        let nodes = plan.node_count();
        let net = ctx.targets().component_dep("net", "test").unwrap();
        let sources = plan.unit(net).unwrap().sources().to_vec();

        for _ in 0..3 {
            plan.declare_component(&ctx, net).unwrap();
        }

        assert_eq!(plan.node_count(), nodes);
        assert_eq!(plan.unit(net).unwrap().sources(), sources);
        assert_eq!(sources.iter().filter(|s| s.ends_with("net_v1_interface.cpp")).count(), 1);
    }

    #[test]
    fn test_unknown_generator_is_configuration_error() {
        let fixture = ProjectFixture::new()
            .component(
                "net",
                r#"dir = "modules/net"
sources = ["*.cpp"]
interfaces = ["net_v1.if"]
generator = "idlc""#,
            )
            .file("modules/net/net.cpp", "int net();\n")
            .file("modules/net/net_v1.if", "interface net_v1;\n");
        let ctx = fixture.context();

        let err = BuildPlan::for_all(&ctx).unwrap_err();
        let err = err.downcast_ref::<BuildError>().unwrap();
        assert!(err.is_configuration());
        assert!(matches!(err, BuildError::ToolNotFound { tool, requested_by } if tool == "idlc" && requested_by == "net"));
    }

    #[test]
    fn test_missing_include_is_configuration_error() {
        let fixture = ProjectFixture::new()
            .component(
                "disk",
                r#"dir = "modules/disk"
sources = ["*.cpp"]
includes = ["include"]"#,
            )
            .file("modules/disk/disk.cpp", "int disk();\n");
        let ctx = fixture.context();

        let err = BuildPlan::for_all(&ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::UnresolvedIncludeDir { unit, .. }) if unit == "disk"
        ));
    }

    #[test]
    fn test_defaults_follow_normalized_dir() {
        let fixture = ProjectFixture::new()
            .component(
                "net",
                r#"dir = "modules/../net"
sources = ["*.cpp"]"#,
            )
            .file("net/net.cpp", "int net();\n")
            .file("arch/shared/types.h", "")
            .file("arch/x86/shared/cpu.h", "");
        let ctx = fixture.context();
        let plan = BuildPlan::for_all(&ctx).unwrap();

        let net = ctx.targets().component_dep("net", "test").unwrap();
        let unit = plan.unit(net).unwrap();
        assert_eq!(unit.dir(), fixture.root().join("net"));
        assert_eq!(
            unit.include_dirs(),
            [
                fixture.root().join("arch/x86/shared"),
                fixture.root().join("arch/x86"),
                fixture.root().join("arch/shared"),
            ]
        );
    }

    #[test]
    fn test_component_dir_outside_root_rejected() {
        let fixture = ProjectFixture::new()
            .component(
                "net",
                r#"dir = "../elsewhere"
sources = ["*.cpp"]"#,
            );
        let ctx = fixture.context();

        let err = BuildPlan::for_all(&ctx).unwrap_err();
        assert!(err.to_string().contains("outside the project root"), "{err:#}");
    }

    #[test]
    fn test_summary_lists_spliced_sources() {
        let fixture = two_component_fixture();
        let ctx = fixture.context();
        let plan = BuildPlan::for_all(&ctx).unwrap();

        let json = serde_json::to_value(plan.summary(&ctx)).unwrap();
        let units = json["units"].as_array().unwrap();
        let net = units.iter().find(|u| u["name"] == "net").unwrap();
        let sources: Vec<&str> = net["sources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_str().unwrap())
            .collect();
        assert!(sources.iter().any(|s| s.ends_with("net_v1_typedefs.cpp")));
        assert_eq!(json["edges"].as_array().unwrap().len(), plan.graph().edge_count());
    }
}
