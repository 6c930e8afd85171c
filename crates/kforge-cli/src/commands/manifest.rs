//! `kforge manifest`: Show the consumption manifest of a built package.

use std::path::PathBuf;

use clap::Args;
use kforge_common::config::KforgeConfig;
use kforge_common::constants::MANIFEST_FILE_NAME;
use kforge_recipe::host::HostContext;
use kforge_recipe::index::RecipeIndex;
use kforge_recipe::manifest::ConsumptionManifest;
use kforge_recipe::plan::BuildLayout;

use super::{ProfileArgs, expand_graph, package_name};
use crate::output::{format_list, format_section};

/// Arguments for the `manifest` command.
#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Package whose manifest to show, `name` or `name/version`.
    pub package: Option<String>,

    /// Settings and option overrides used to locate the package folder.
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Read this manifest file (or package folder) instead.
    #[arg(long, conflicts_with = "package")]
    pub path: Option<PathBuf>,

    /// Show the manifest the recipe would produce, without a build.
    #[arg(long, conflicts_with = "path")]
    pub expected: bool,

    /// Restrict the output to these components and what they require.
    #[arg(long, value_delimiter = ',')]
    pub components: Vec<String>,

    /// Print the manifest as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `manifest` command.
///
/// # Errors
///
/// Returns an error if the package is not built, the manifest cannot be
/// read, or a requested component does not exist.
pub fn execute(args: &ManifestArgs, config: &KforgeConfig) -> anyhow::Result<()> {
    let manifest = load(args, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }
    println!("{}", describe(&manifest, &args.components)?);
    Ok(())
}

fn load(args: &ManifestArgs, config: &KforgeConfig) -> anyhow::Result<ConsumptionManifest> {
    if let Some(path) = &args.path {
        let file = if path.is_dir() { path.join(MANIFEST_FILE_NAME) } else { path.clone() };
        return Ok(ConsumptionManifest::read(&file)?);
    }
    let Some(reference) = args.package.as_deref() else {
        anyhow::bail!("either a package or --path is required");
    };

    let index = RecipeIndex::builtin()?;
    let host = HostContext::capture(config.interactive);
    let graph = expand_graph(&index, reference, &args.profile, &host)?;
    let name = package_name(reference);
    let node = graph
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("{name} is missing from the resolved graph"))?;
    let layout = BuildLayout::under(
        &config.workspace_root,
        name,
        &node.config.version.to_string(),
        &node.config.package_id(),
    );
    if args.expected {
        return Ok(node.recipe.package_info(&node.config, &layout.package_dir));
    }

    let file = layout.package_dir.join(MANIFEST_FILE_NAME);
    if !file.is_file() {
        anyhow::bail!(
            "{} is not built for this profile (no {}); run `kforge build` first",
            node.config.reference(),
            file.display()
        );
    }
    Ok(ConsumptionManifest::read(&file)?)
}

/// Human-readable summary of `manifest`, optionally limited to the
/// closure of `components`.
fn describe(manifest: &ConsumptionManifest, components: &[String]) -> anyhow::Result<String> {
    let mut out = format!(
        "{}/{} ({})",
        manifest.package,
        manifest.version,
        manifest.package_folder.display()
    );
    out.push_str(&format!("\n  architectures: {}", format_list(&manifest.architectures)));
    out.push_str(&format!("\n  link order: {}", format_list(manifest.link_order()?)));

    if components.is_empty() {
        out.push_str(&format!("\n  defines: {}", format_list(manifest.all_defines())));
        out.push_str(&format!("\n  system libs: {}", format_list(manifest.all_system_libs())));
    } else {
        let names: Vec<&str> = components.iter().map(String::as_str).collect();
        let closure = manifest.closure(&names)?;
        out.push_str(&format!("\n  components: {}", format_list(&closure)));
        for name in &closure {
            let Some(component) = manifest.components.get(name) else { continue };
            out.push_str(&format!(
                "\n  {name}: libs {}; defines {}; system libs {}; requires {}",
                format_list(&component.libs),
                format_list(&component.defines),
                format_list(&component.system_libs),
                format_list(&component.requires),
            ));
        }
    }

    for section in [
        format_section("env", &manifest.env),
        format_section("properties", &manifest.properties),
    ] {
        for line in section.lines() {
            out.push_str(&format!("\n  {line}"));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use kforge_recipe::manifest::Component;

    use super::*;

    fn sample() -> ConsumptionManifest {
        let mut m = ConsumptionManifest::new("openssl", "3.2.4", "/pkg", vec!["x86_64".into()]);
        let mut crypto = Component::with_libs(["crypto"]);
        crypto.system_libs.push("pthread".into());
        m.add_component("crypto", crypto);
        m.add_component("ssl", Component::with_libs(["ssl"]).requires("crypto"));
        m.set_property("cmake_file_name", "OpenSSL");
        m
    }

    #[test]
    fn summary_lists_link_order_and_libs() {
        let text = describe(&sample(), &[]).expect("describe");
        assert!(text.starts_with("openssl/3.2.4 (/pkg)"));
        assert!(text.contains("link order: ssl, crypto"), "got: {text}");
        assert!(text.contains("system libs: pthread"));
        assert!(text.contains("env: (none)"));
        assert!(text.contains("cmake_file_name: OpenSSL"));
    }

    #[test]
    fn component_filter_follows_requirements() {
        let text = describe(&sample(), &["ssl".to_string()]).expect("describe");
        assert!(text.contains("components: crypto, ssl"), "got: {text}");
        assert!(describe(&sample(), &["nope".to_string()]).is_err());
    }
}
