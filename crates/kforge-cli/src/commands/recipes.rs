//! `kforge recipes`: List the built-in recipes.

use clap::Args;
use kforge_recipe::index::RecipeIndex;

use crate::output::{format_list, format_table};

/// Arguments for the `recipes` command.
#[derive(Args, Debug)]
pub struct RecipesArgs {
    /// Also list every declared option with its default.
    #[arg(short, long)]
    pub options: bool,
}

/// Executes the `recipes` command.
///
/// # Errors
///
/// Returns an error if the built-in catalog is invalid.
pub fn execute(args: &RecipesArgs) -> anyhow::Result<()> {
    let index = RecipeIndex::builtin()?;
    let rows: Vec<Vec<String>> = index
        .iter()
        .map(|recipe| {
            let desc = recipe.descriptor();
            vec![
                desc.name.clone(),
                desc.version.to_string(),
                format!("{:?}", desc.build_system),
                format_list(desc.supported_os.iter().map(ToString::to_string)),
                desc.description.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        format_table(&["PACKAGE", "VERSION", "BUILD", "SYSTEMS", "DESCRIPTION"], &rows)
    );

    if args.options {
        for recipe in index.iter() {
            let desc = recipe.descriptor();
            println!();
            println!("{}:", desc.reference());
            for spec in desc.options.iter() {
                println!(
                    "  {} = {} [{}]",
                    spec.name,
                    spec.default,
                    format_list(spec.allowed.iter().map(ToString::to_string))
                );
            }
        }
    }
    Ok(())
}
