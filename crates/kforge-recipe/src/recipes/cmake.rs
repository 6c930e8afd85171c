//! CMake configure/build/install invocations shared by CMake recipes.

use std::path::Path;

use kforge_common::error::Result;

use super::{path_arg, source_steps};
use crate::manifest::DependencyManifests;
use crate::plan::{BuildLayout, BuildPlan, ToolInvocation};
use crate::resolver::ResolvedConfig;

/// `cmake -S <src> -B <build> [-G <gen>] -DCMAKE_TOOLCHAIN_FILE=... -DCMAKE_INSTALL_PREFIX=...`
#[must_use]
pub fn configure(
    config: &ResolvedConfig,
    layout: &BuildLayout,
    deps: &DependencyManifests,
    source_subdir: Option<&str>,
) -> ToolInvocation {
    let source = source_subdir.map_or_else(|| layout.source_dir.clone(), |sub| layout.source_dir.join(sub));
    let mut inv = ToolInvocation::new("cmake")
        .arg("-S")
        .arg(path_arg(&source))
        .arg("-B")
        .arg(path_arg(&layout.build_dir));
    if let Some(generator) = config.generator {
        inv = inv.arg("-G").arg(generator.cmake_name());
    }
    inv = inv
        .arg(format!("-DCMAKE_TOOLCHAIN_FILE={}", path_arg(&layout.toolchain_file())))
        .arg(format!("-DCMAKE_INSTALL_PREFIX={}", path_arg(&layout.package_dir)));
    if !deps.is_empty() {
        let prefixes = deps
            .values()
            .map(|m| path_arg(&m.package_folder))
            .collect::<Vec<_>>()
            .join(";");
        inv = inv.arg(format!("-DCMAKE_PREFIX_PATH={prefixes}"));
    }
    inv
}

/// `cmake --build <build> --config <build_type> --parallel`
#[must_use]
pub fn build(config: &ResolvedConfig, build_dir: &Path) -> ToolInvocation {
    ToolInvocation::new("cmake")
        .arg("--build")
        .arg(path_arg(build_dir))
        .args(["--config", config.settings.build_type.as_str(), "--parallel"])
}

/// `cmake --install <build> --config <build_type>`
#[must_use]
pub fn install(config: &ResolvedConfig, build_dir: &Path) -> ToolInvocation {
    ToolInvocation::new("cmake")
        .arg("--install")
        .arg(path_arg(build_dir))
        .args(["--config", config.settings.build_type.as_str()])
}

/// Sources, configure, build and install.
///
/// # Errors
///
/// Returns an error if the package has no recorded sources.
pub fn standard_plan(
    config: &ResolvedConfig,
    layout: &BuildLayout,
    deps: &DependencyManifests,
    source_subdir: Option<&str>,
) -> Result<BuildPlan> {
    let mut plan = BuildPlan::default();
    for step in source_steps(&config.package, &config.version.to_string(), &layout.source_dir)? {
        plan.push(step);
    }
    plan.run(configure(config, layout, deps, source_subdir));
    plan.run(build(config, &layout.build_dir));
    plan.run(install(config, &layout.build_dir));
    Ok(plan)
}
