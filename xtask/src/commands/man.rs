use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory (default: dist/share/man/man1)
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let cmd = tagbump::command();
    write_page(&out_dir, "tagbump.1", cmd.clone())?;

    // run, plan and doctor each get their own page
    for subcommand in cmd.get_subcommands() {
        let name = subcommand.get_name();
        write_page(&out_dir, &format!("tagbump-{name}.1"), subcommand.clone())?;
    }

    Ok(())
}

fn write_page(out_dir: &Path, file_name: &str, cmd: clap::Command) -> Result<(), String> {
    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render {file_name}: {e}"))?;

    let man_path = out_dir.join(file_name);
    fs::write(&man_path, buffer).map_err(|e| format!("{}: {e}", man_path.display()))?;
    println!("wrote {}", man_path.display());
    Ok(())
}
