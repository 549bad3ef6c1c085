use clap::Parser;

use crate::fs::DEFAULT_INODE_COUNT;

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum BlockFsCli {
    /// create a new volume and format it
    Mkfs(MkfsArgs),
    /// print the status dump of a volume
    Status(ImageArgs),
    /// list the directory of a volume
    Ls(ImageArgs),
    /// copy a host file into a volume
    Put(PutArgs),
    /// print a file stored in a volume
    Cat(CatArgs),
    /// change the password of a volume user
    Passwd(PasswdArgs),
}

///make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct MkfsArgs {
    /// the path of the volume image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// bytes of blocks in the volume
    #[clap(short, long)]
    pub size: u64,
    /// the inode count of the file system
    #[clap(short, long, default_value_t = DEFAULT_INODE_COUNT)]
    pub inode_count: u32,
}

#[derive(clap::Args, Debug, PartialEq)]
pub struct ImageArgs {
    /// the path of the volume image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(about = "copy a host file into the volume")]
pub struct PutArgs {
    /// the path of the volume image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// name of the file inside the volume
    #[clap(short, long)]
    pub name: String,
    /// host file to copy
    #[clap(short = 'f', long)]
    pub host_file: String,
    /// act as this user instead of root, the password is prompted for
    #[clap(short, long)]
    pub user: Option<String>,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(about = "print a file of the volume")]
pub struct CatArgs {
    /// the path of the volume image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// name of the file inside the volume
    #[clap(short, long)]
    pub name: String,
    /// act as this user instead of root, the password is prompted for
    #[clap(short, long)]
    pub user: Option<String>,
}

#[derive(clap::Args, Debug, PartialEq)]
#[command(about = "change the password of a volume user")]
pub struct PasswdArgs {
    /// the path of the volume image file
    #[clap(short = 'p', long)]
    pub image_file_path: String,
    /// the user whose password changes
    #[clap(short, long)]
    pub name: String,
    /// act as this user instead of root, the password is prompted for
    #[clap(short, long)]
    pub user: Option<String>,
}

/// test `mkfs` subcommand
#[cfg(test)]
mod mkfs_parse_args_tests {
    use super::*;
    /// test short parameter form
    #[test]
    fn test_short_parameter_form() {
        let args = BlockFsCli::parse_from(["blockfs", "mkfs", "-p", "test", "-s", "30", "-i", "64"]);
        assert_eq!(
            args,
            BlockFsCli::Mkfs(MkfsArgs {
                image_file_path: "test".to_string(),
                size: 30,
                inode_count: 64,
            })
        );
    }
    /// test long parameter form
    #[test]
    fn test_long_parameter_form() {
        let image_file_path_name = concat!("--", "image-file-path");
        let args = BlockFsCli::parse_from([
            "blockfs",
            "mkfs",
            image_file_path_name,
            "test",
            "--size",
            "30",
        ]);
        assert_eq!(
            args,
            BlockFsCli::Mkfs(MkfsArgs {
                image_file_path: "test".to_string(),
                size: 30,
                inode_count: DEFAULT_INODE_COUNT,
            })
        );
    }
}
