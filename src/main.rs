use std::io::Write;

use anyhow::Context;
use blockfs::cli_interface::{
    commands::{self, Credentials},
    BlockFsCli,
};
use blockfs::user::ROOT_NAME;
use clap::Parser;

/// ask for the password of `user`, if one was named
fn credentials(user: Option<String>) -> anyhow::Result<Option<Credentials>> {
    user.map(|username| -> anyhow::Result<Credentials> {
        let password = rpassword::prompt_password(format!("Password for {username}: "))?;
        Ok(Credentials { username, password })
    })
    .transpose()
}

/// a CLI interface to create a volume and poke at its contents
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = BlockFsCli::parse();
    match args {
        BlockFsCli::Mkfs(args) => {
            let root_password =
                rpassword::prompt_password("Please input a password for the root user: ")?;
            let superblock = blockfs::mkfs::mkfs(
                &args.image_file_path,
                args.size,
                args.inode_count,
                &root_password,
            )?;
            println!(
                "{}: {} blocks, {} inodes, {} blocks free",
                args.image_file_path,
                superblock.total_blocks,
                superblock.total_inodes,
                superblock.free_blocks
            );
        }
        BlockFsCli::Status(args) => println!("{}", commands::status(&args.image_file_path)?),
        BlockFsCli::Ls(args) => {
            for line in commands::ls(&args.image_file_path)? {
                println!("{line}");
            }
        }
        BlockFsCli::Put(args) => {
            let data = std::fs::read(&args.host_file)
                .with_context(|| format!("failed to read {}", args.host_file))?;
            let credentials = credentials(args.user)?;
            let written = commands::put(
                &args.image_file_path,
                &args.name,
                &data,
                credentials.as_ref(),
            )?;
            if written < data.len() {
                eprintln!(
                    "volume full: stored {written} of {} bytes as {}",
                    data.len(),
                    args.name
                );
            }
        }
        BlockFsCli::Cat(args) => {
            let credentials = credentials(args.user)?;
            let data = commands::cat(&args.image_file_path, &args.name, credentials.as_ref())?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
        BlockFsCli::Passwd(args) => {
            let credentials = credentials(args.user)?;
            // root resets passwords without the old one
            let old_password = match &credentials {
                Some(Credentials { username, .. }) if username != ROOT_NAME => {
                    rpassword::prompt_password("Please input the old password for the user: ")?
                }
                _ => String::new(),
            };
            let new_password =
                rpassword::prompt_password("Please input the new password for the user: ")?;
            commands::passwd(
                &args.image_file_path,
                &args.name,
                &old_password,
                &new_password,
                credentials.as_ref(),
            )?;
            println!("password of {} updated", args.name);
        }
    }
    Ok(())
}
