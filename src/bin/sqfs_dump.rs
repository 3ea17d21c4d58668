use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqfs_core::device::MemDevice;
use sqfs_core::Squashfs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// squashfs image file
    input: PathBuf,

    /// byte offset of the partition within `input`
    #[arg(short, long, default_value_t = 0)]
    offset: u64,

    /// logical block size of the underlying device
    #[arg(short, long, default_value_t = 512)]
    block_size: u32,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory's entries
    Ls { path: String },
    /// Print a file's contents to stdout
    Cat { path: String },
    /// Print a file's size
    Stat { path: String },
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let file = File::open(&args.input).expect("failed to open input image");
    let device = MemDevice::from_reader(file, args.block_size).expect("failed to read input image");

    let mut sqfs = Squashfs::probe(device, args.offset / args.block_size as u64).expect("probe failed");

    match args.cmd {
        Command::Ls { path } => ls(&mut sqfs, &path),
        Command::Cat { path } => cat(&mut sqfs, &path),
        Command::Stat { path } => stat(&mut sqfs, &path),
    }
}

fn ls(sqfs: &mut Squashfs<MemDevice>, path: &str) {
    let mut dir = sqfs.opendir(path).expect("opendir failed");
    while let Some(entry) = sqfs.readdir(&mut dir).expect("readdir failed") {
        match entry.size {
            Some(size) => println!("{:<10} {} ({size} bytes)", format!("{:?}", entry.kind), entry.name),
            None => println!("{:<10} {}", format!("{:?}", entry.kind), entry.name),
        }
    }
    sqfs.closedir(dir);
}

fn cat(sqfs: &mut Squashfs<MemDevice>, path: &str) {
    let bytes = sqfs.read(path, 0, 0).expect("read failed");
    std::io::Write::write_all(&mut std::io::stdout(), &bytes).expect("write to stdout failed");
}

fn stat(sqfs: &mut Squashfs<MemDevice>, path: &str) {
    let size = sqfs.size(path).expect("size failed");
    println!("{path}: {size} bytes");
}
