//! Build executor with progress reporting.
//!
//! Every `ToolReady` node runs first. If a tool cannot be built, nothing
//! else runs. The rest of the plan then runs in waves: every pending node
//! whose dependencies all succeeded runs in parallel on the rayon pool,
//! then the next wave is computed. A failed node marks its transitive
//! dependents as skipped; independent nodes keep running.

use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use petgraph::graph::NodeIndex;
use rayon::prelude::*;

use crate::builder::assemble::ComponentAssembler;
use crate::builder::context::BuildContext;
use crate::builder::events::{BuildEvent, MessageFormat};
use crate::builder::plan::{BuildNode, BuildPlan};
use crate::builder::verify::UndefinedSymbolVerifier;
use crate::core::component::Component;
use crate::core::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    Done,
    Failed,
    Skipped,
}

/// A node that failed.
#[derive(Debug, Clone)]
pub struct NodeFailure {
    /// Human label, e.g. `assemble net`
    pub node: String,
    pub target: String,
    pub error: BuildError,
}

/// Outcome of executing a plan.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub failures: Vec<NodeFailure>,
    /// Labels of nodes that never ran
    pub skipped: Vec<String>,
    /// Components that passed verification
    pub components: Vec<Component>,
    pub duration_ms: u64,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Build executor with progress tracking.
pub struct BuildExecutor<'a> {
    ctx: &'a BuildContext,
    jobs: Option<usize>,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        BuildExecutor { ctx, jobs: None }
    }

    /// Limit the number of nodes running at once.
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Execute every node of `plan`.
    pub fn execute(&self, plan: &BuildPlan) -> Result<BuildReport> {
        let start = Instant::now();

        let mut pool = rayon::ThreadPoolBuilder::new();
        if let Some(jobs) = self.jobs {
            pool = pool.num_threads(jobs.max(1));
        }
        let pool = pool.build().context("failed to start build thread pool")?;

        let total = plan.node_count();
        let pb = self.progress_bar(total);

        let mut states = vec![NodeState::Pending; total];
        let mut report = BuildReport::default();

        let tools: Vec<NodeIndex> = plan
            .topological_order()
            .into_iter()
            .filter(|&n| matches!(plan.node(n), BuildNode::ToolReady { .. }))
            .collect();
        if !tools.is_empty() {
            self.run_wave(&pool, plan, &tools, &mut states, &mut report, pb.as_ref());
            tracing::debug!("{} tool sub-build(s) ran", self.ctx.tool_builds());
            if !report.is_success() {
                tracing::warn!("a required tool could not be built, nothing else will run");
                self.skip_pending(plan, &mut states, &mut report, pb.as_ref());
            }
        }

        loop {
            let ready: Vec<NodeIndex> = plan
                .topological_order()
                .into_iter()
                .filter(|&n| states[n.index()] == NodeState::Pending)
                .filter(|&n| {
                    plan.dependencies(n)
                        .all(|d| states[d.index()] == NodeState::Done)
                })
                .collect();

            if ready.is_empty() {
                break;
            }

            self.run_wave(&pool, plan, &ready, &mut states, &mut report, pb.as_ref());
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        report.components = self.ctx.registry().verified();
        report.duration_ms = start.elapsed().as_millis() as u64;

        self.ctx.emit(BuildEvent::BuildFinished {
            success: report.is_success(),
            duration_ms: report.duration_ms,
            components_verified: report.components.len(),
        });

        Ok(report)
    }

    fn run_wave(
        &self,
        pool: &rayon::ThreadPool,
        plan: &BuildPlan,
        ready: &[NodeIndex],
        states: &mut [NodeState],
        report: &mut BuildReport,
        pb: Option<&ProgressBar>,
    ) {
        tracing::debug!("running {} node(s)", ready.len());

        let results: Vec<(NodeIndex, Result<(), BuildError>)> = pool.install(|| {
            ready
                .par_iter()
                .map(|&node| {
                    let result = self.run_node(plan, node);
                    if let Some(pb) = pb {
                        pb.set_message(plan.describe(self.ctx, node));
                        pb.inc(1);
                    }
                    (node, result)
                })
                .collect()
        });

        for (node, result) in results {
            match result {
                Ok(()) => states[node.index()] = NodeState::Done,
                Err(error) => {
                    states[node.index()] = NodeState::Failed;
                    let failure = NodeFailure {
                        node: plan.describe(self.ctx, node),
                        target: plan.target_name(self.ctx, node).to_string(),
                        error,
                    };
                    self.ctx.emit(BuildEvent::NodeFailed {
                        node: failure.node.clone(),
                        target: failure.target.clone(),
                        message: failure.error.to_string(),
                    });
                    report.failures.push(failure);

                    self.skip_dependents(plan, node, states, report, pb);
                }
            }
        }
    }

    fn run_node(&self, plan: &BuildPlan, node: NodeIndex) -> Result<(), BuildError> {
        match plan.node(node) {
            BuildNode::ToolReady { tool } => self.ctx.resolve_tool(tool).map(|_| ()),
            BuildNode::Generate { task, .. } => match plan.task(task) {
                Some(task) => task.run(self.ctx).map(|_| ()),
                None => Ok(()),
            },
            BuildNode::Assemble { component } => {
                let name = &self.ctx.targets().component(component).name;
                let Some(unit) = plan.unit(component) else {
                    return Ok(());
                };
                ComponentAssembler::new(self.ctx)
                    .assemble(name, unit)
                    .map(|_| ())
            }
            BuildNode::Verify { component } => {
                let name = &self.ctx.targets().component(component).name;
                let entry = self.ctx.registry().get(name).ok_or_else(|| {
                    BuildError::UnverifiedComponent {
                        component: name.clone(),
                        reason: "component was never assembled".to_string(),
                    }
                })?;
                UndefinedSymbolVerifier::new(self.ctx)
                    .check(&entry.component)
                    .map(|_| ())
            }
        }
    }

    fn skip_dependents(
        &self,
        plan: &BuildPlan,
        failed: NodeIndex,
        states: &mut [NodeState],
        report: &mut BuildReport,
        pb: Option<&ProgressBar>,
    ) {
        let mut stack: Vec<NodeIndex> = plan.dependents(failed).collect();
        while let Some(node) = stack.pop() {
            if states[node.index()] != NodeState::Pending {
                continue;
            }
            self.mark_skipped(plan, node, states, report, pb);
            stack.extend(plan.dependents(node));
        }
    }

    fn mark_skipped(
        &self,
        plan: &BuildPlan,
        node: NodeIndex,
        states: &mut [NodeState],
        report: &mut BuildReport,
        pb: Option<&ProgressBar>,
    ) {
        states[node.index()] = NodeState::Skipped;

        let label = plan.describe(self.ctx, node);
        self.ctx.emit(BuildEvent::NodeSkipped {
            node: label.clone(),
            target: plan.target_name(self.ctx, node).to_string(),
        });
        report.skipped.push(label);
        if let Some(pb) = pb {
            pb.inc(1);
        }
    }

    /// Skip every node that has not run yet.
    fn skip_pending(
        &self,
        plan: &BuildPlan,
        states: &mut [NodeState],
        report: &mut BuildReport,
        pb: Option<&ProgressBar>,
    ) {
        for node in plan.topological_order() {
            if states[node.index()] == NodeState::Pending {
                self.mark_skipped(plan, node, states, report, pb);
            }
        }
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if self.ctx.message_format() != MessageFormat::Human || total <= 1 {
            return None;
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::Verdict;
    use crate::test_support::fixtures::ProjectFixture;

    fn scenario() -> ProjectFixture {
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
            .component(
                "disk",
                r#"dir = "modules/disk"
sources = ["*.cpp"]"#,
            )
            .file("modules/hal/hal.cpp", "int hal_init() { return 0; }\n")
            .file("modules/hal/hal_v1.if", "interface hal_v1;\n")
            .file("modules/net/net.cpp", "int net() { return 0; }\n")
            .file("modules/net/net_v1.if", "interface net_v1;\n")
            .file("modules/disk/disk.cpp", "int disk() { return 0; }\n")
    }

    fn run(ctx: &BuildContext, jobs: Option<usize>) -> BuildReport {
        let plan = BuildPlan::for_all(ctx).unwrap();
        BuildExecutor::new(ctx).jobs(jobs).execute(&plan).unwrap()
    }

    fn names(report: &BuildReport) -> Vec<String> {
        let mut names: Vec<String> = report.components.iter().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_full_build_verifies_everything() {
        let fixture = scenario();
        let ctx = fixture.context();
        let report = run(&ctx, None);

        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(names(&report), ["disk", "hal", "net"]);
        assert!(ctx.out_dir().join("modules/net/net_v1_interface.h").is_file());
        assert!(ctx.component_output("net").is_file());
        assert!(matches!(
            ctx.events().last(),
            Some(BuildEvent::BuildFinished { success: true, components_verified: 3, .. })
        ));
    }

    #[test]
    fn test_failure_is_isolated() {
        let fixture = scenario()
            .file("modules/net/net_v1.if", "//SYNTAX net_v1.if:1: unexpected token\n");
        let ctx = fixture.context();
        let report = run(&ctx, None);

        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.target, "net");
        assert!(matches!(failure.error, BuildError::GenerationFailure { .. }));
        assert_eq!(report.skipped, ["assemble net", "verify net"]);
        assert_eq!(names(&report), ["disk", "hal"]);
        assert!(ctx.registry().get("net").is_none());
    }

    #[test]
    fn test_undefined_symbol_fails_only_that_component() {
        let fixture = scenario()
            .file("modules/net/net.cpp", "//UNDEF hal_init\nint net() { return hal_init(); }\n");
        let ctx = fixture.context();
        let report = run(&ctx, None);

        assert_eq!(report.failures.len(), 1);
        match &report.failures[0].error {
            BuildError::UndefinedSymbolError { component, symbols } => {
                assert_eq!(component, "net");
                assert_eq!(symbols, &["hal_init".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(names(&report), ["disk", "hal"]);
        assert!(matches!(
            ctx.registry().get("net").unwrap().verdict,
            Some(Verdict::Fail { .. })
        ));
    }

    #[test]
    fn test_tool_build_failure_aborts_build() {
        let fixture = scenario()
            .with_buildable_generator()
            .file("tools/meddler/broken.cpp", "//FAIL internal compiler error\n");
        let ctx = fixture.context();
        let report = run(&ctx, None);

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, BuildError::ToolBuildFailed { .. }));
        assert_eq!(ctx.tool_builds(), 1);
        assert!(names(&report).is_empty());
        assert!(ctx.registry().get("disk").is_none());
        assert!(!ctx.component_output("disk").exists());
        assert_eq!(report.skipped.len(), 8);
        assert!(report.skipped.contains(&"assemble disk".to_string()));
    }

    #[test]
    fn test_schedule_independence() {
        let serial_fixture = scenario();
        let serial_ctx = serial_fixture.context();
        let serial = run(&serial_ctx, Some(1));

        let parallel_fixture = scenario();
        let parallel_ctx = parallel_fixture.context();
        let parallel = run(&parallel_ctx, Some(8));

        assert_eq!(names(&serial), names(&parallel));
        for name in ["hal", "net", "disk"] {
            let a = std::fs::read(serial_ctx.component_output(name)).unwrap();
            let b = std::fs::read(parallel_ctx.component_output(name)).unwrap();
            assert_eq!(a, b);
        }
    }
}
