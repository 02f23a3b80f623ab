//! `generate` subcommand: shell completions and man pages.
use anyhow::{Context, Result};
use clap::Command;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write shell completions for `cmd` to `writer`.
pub fn generate_completions<W: Write>(
    shell: clap_complete::Shell,
    cmd: &mut Command,
    writer: &mut W,
) {
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, cmd, name, writer);
}

/// Generate the man page of `cmd` and one page per (nested) subcommand into
/// `output_dir`, or the current directory. Returns the written paths.
///
/// # Errors
///
/// Returns an error if the output directory or a page cannot be written.
pub fn generate_man_pages(
    cmd: &Command,
    output_dir: Option<PathBuf>,
) -> Result<Vec<PathBuf>> {
    let output_dir = match output_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Opening current directory")?,
    };
    std::fs::create_dir_all(&output_dir)
        .context("create output Man directories")?;

    let mut written = vec![render_page(cmd.clone(), &output_dir)?];
    collect_subcommand_pages(cmd, &output_dir, cmd.get_name(), &mut written)?;
    Ok(written)
}

/// Render `cmd` to `<output_dir>/<name>.1`.
fn render_page(cmd: Command, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}.1", cmd.get_name()));
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    clap_mangen::Man::new(cmd)
        .render(&mut file)
        .with_context(|| format!("failed to render {}", path.display()))?;
    log::info!("generated {}", path.display());
    Ok(path)
}

fn collect_subcommand_pages(
    cmd: &Command,
    output_dir: &Path,
    prefix: &str,
    written: &mut Vec<PathBuf>,
) -> Result<()> {
    for subcmd in cmd.get_subcommands() {
        let name = format!("{prefix}-{}", subcmd.get_name());
        // clap_mangen takes the page name from the command itself
        let renamed = subcmd
            .clone()
            .name(name.clone())
            .disable_help_subcommand(true);
        written.push(render_page(renamed, output_dir)?);
        if subcmd.has_subcommands() {
            collect_subcommand_pages(subcmd, output_dir, &name, written)?;
        }
    }
    Ok(())
}
