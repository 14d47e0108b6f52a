//! Implementation of `keel build` and `keel plan`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::builder::events::MessageFormat;
use crate::builder::executor::{BuildExecutor, BuildReport};
use crate::builder::plan::{BuildPlan, PlanSummary};
use crate::builder::toolchain::{detect_host_toolchain, GccToolchain, Toolchain};
use crate::builder::BuildContext;
use crate::core::registry::{ComponentDep, ToolSource};
use crate::core::Workspace;
use crate::ops::image::{write_image_manifest, ImageManifest};
use crate::util::Config;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Profile name (falls back to config, then the manifest default)
    pub profile: Option<String>,

    /// Architecture override
    pub arch: Option<String>,

    /// Platform override
    pub platform: Option<String>,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Components to build, plus everything they use (empty = all)
    pub components: Vec<String>,

    pub message_format: Option<MessageFormat>,

    /// Pass `-v` to generators
    pub verbose_generator: bool,

    /// Write an image manifest here after a successful build
    pub image: Option<PathBuf>,
}

/// Result of `keel build`.
#[derive(Debug)]
pub struct BuildResult {
    pub report: BuildReport,
    pub image: Option<ImageManifest>,
}

/// Bind the profile and toolchains and create the build context.
pub fn build_context(ws: &Workspace, config: &Config, opts: &BuildOptions) -> Result<BuildContext> {
    let manifest = ws.manifest();

    let profile_name = opts.profile.as_deref().or(config.build.profile.as_deref());
    let profile = manifest
        .profile(profile_name)?
        .with_overrides(opts.arch.as_deref(), opts.platform.as_deref());

    tracing::debug!(
        "profile `{}` ({} / {})",
        profile.name,
        profile.arch,
        profile.platform
    );

    let targets = manifest.target_registry();

    let needs_host = targets
        .tools()
        .any(|(_, tool)| matches!(tool.source, ToolSource::Build { .. }));
    let host_toolchain: Option<Arc<dyn Toolchain>> = if needs_host {
        match detect_host_toolchain(&config.toolchain) {
            Ok(toolchain) => Some(Arc::new(toolchain)),
            Err(e) => {
                tracing::warn!("no host toolchain for building tools: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let toolchain = Arc::new(GccToolchain::from_profile(&profile));
    let format = opts
        .message_format
        .or_else(|| config.message_format())
        .unwrap_or_default();

    Ok(BuildContext::new(
        ws.root().to_path_buf(),
        ws.out_dir().to_path_buf(),
        Arc::new(profile),
        toolchain,
        Arc::new(targets),
        host_toolchain,
    )
    .with_message_format(format)
    .with_verbose_generator(opts.verbose_generator || config.build.verbose_generator))
}

/// Declare the build graph for the selected components.
pub fn build_plan(ctx: &BuildContext, components: &[String]) -> Result<BuildPlan> {
    if components.is_empty() {
        return BuildPlan::for_all(ctx);
    }

    let roots = components
        .iter()
        .map(|name| ctx.targets().component_dep(name, "command line"))
        .collect::<Result<Vec<ComponentDep>, _>>()?;
    BuildPlan::for_components(ctx, &roots)
}

/// Build the workspace.
///
/// Configuration errors are returned as `Err`. Node failures are collected
/// in the report.
pub fn build(ws: &Workspace, config: &Config, opts: &BuildOptions) -> Result<BuildResult> {
    let ctx = build_context(ws, config, opts)?;
    let plan = build_plan(&ctx, &opts.components)?;

    tracing::info!(
        "building {} component(s) of `{}` with profile `{}`",
        plan.units().count(),
        ws.name(),
        ctx.profile().name
    );

    let report = BuildExecutor::new(&ctx)
        .jobs(opts.jobs.or(config.build.jobs))
        .execute(&plan)?;

    let image = match &opts.image {
        Some(path) if report.is_success() => Some(
            write_image_manifest(ctx.registry(), &ctx.profile().name, path)
                .with_context(|| format!("failed to assemble image manifest {}", path.display()))?,
        ),
        Some(path) => {
            let unverified: Vec<String> = ctx
                .registry()
                .unverified()
                .into_iter()
                .map(|e| e.component.name)
                .collect();
            tracing::warn!(
                "build failed, not writing {} (unverified: {})",
                path.display(),
                unverified.join(", ")
            );
            None
        }
        None => None,
    };

    Ok(BuildResult { report, image })
}

/// Declare the build graph without running it.
pub fn plan(ws: &Workspace, config: &Config, opts: &BuildOptions) -> Result<PlanSummary> {
    let ctx = build_context(ws, config, opts)?;
    let plan = build_plan(&ctx, &opts.components)?;
    Ok(plan.summary(&ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::BuildError;
    use crate::test_support::fixtures::ProjectFixture;

    fn fixture() -> ProjectFixture {
        ProjectFixture::new()
            .component(
                "net",
                r#"dir = "modules/net"
sources = ["*.cpp"]
interfaces = ["net_v1.if"]"#,
            )
            .component(
                "disk",
                r#"dir = "modules/disk"
sources = ["*.cpp"]"#,
            )
            .file("modules/net/net.cpp", "int net() { return 0; }\n")
            .file("modules/net/net_v1.if", "interface net_v1;\n")
            .file("modules/disk/disk.cpp", "int disk() { return 0; }\n")
    }

    #[test]
    fn test_build_with_image() {
        let fixture = fixture();
        let ws = fixture.workspace();
        let image = fixture.root().join("components.json");
        let opts = BuildOptions {
            image: Some(image.clone()),
            ..Default::default()
        };

        let result = build(&ws, &fixture.config(), &opts).unwrap();
        assert!(result.report.is_success());
        assert_eq!(result.image.unwrap().components.len(), 2);
        assert!(image.is_file());
    }

    #[test]
    fn test_component_filter() {
        let fixture = fixture();
        let ws = fixture.workspace();
        let opts = BuildOptions {
            components: vec!["disk".to_string()],
            ..Default::default()
        };

        let result = build(&ws, &fixture.config(), &opts).unwrap();
        let names: Vec<_> = result.report.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["disk"]);
        assert!(!ws.out_dir().join("modules/net").exists());
    }

    #[test]
    fn test_unknown_component_filter() {
        let fixture = fixture();
        let ws = fixture.workspace();
        let opts = BuildOptions {
            components: vec!["gpu".to_string()],
            ..Default::default()
        };

        let err = build(&ws, &fixture.config(), &opts).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::UnknownComponent { component, .. }) if component == "gpu"
        ));
    }

    #[test]
    fn test_failed_build_skips_image() {
        let fixture = fixture().file("modules/disk/disk.cpp", "//UNDEF malloc\n");
        let ws = fixture.workspace();
        let image = fixture.root().join("components.json");
        let opts = BuildOptions {
            image: Some(image.clone()),
            ..Default::default()
        };

        let result = build(&ws, &fixture.config(), &opts).unwrap();
        assert!(!result.report.is_success());
        assert!(result.image.is_none());
        assert!(!image.exists());
    }

    #[test]
    fn test_platform_override() {
        let fixture = fixture().file("component.lds", "SECTIONS {}\n");
        let ws = fixture.workspace();
        let opts = BuildOptions {
            platform: Some("embedded-target".to_string()),
            ..Default::default()
        };

        let result = build(&ws, &fixture.config(), &opts).unwrap();
        assert!(result.report.is_success(), "{:?}", result.report.failures);
        assert!(ws.out_dir().join("net.map").is_file());
    }

    #[test]
    fn test_plan_does_not_run_anything() {
        let fixture = fixture();
        let ws = fixture.workspace();

        let summary = plan(&ws, &fixture.config(), &BuildOptions::default()).unwrap();
        assert_eq!(summary.units.len(), 2);
        assert!(!ws.out_dir().exists());
    }
}
