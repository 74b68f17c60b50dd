use colored::*;
use flatfs::fs::config::MAX_FILE_SIZE;
use flatfs::{FileSystem, OpenFlags};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;

#[derive(Debug)]
pub enum Command {
    Help,
    Ls,
    Open(String, OpenFlags),
    Close(usize),
    Read(usize, usize),
    Write(usize, String),
    Lookup(String),
    Stat(String),
    Cat(String),
    Export(String, String),
    Df,
    Exit,
}

pub fn execute_command(cmd: &Command, fs: &FileSystem) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Ls => {
            let files = fs.list()?;
            if files.is_empty() {
                println!("{}", "(empty)".bright_black());
            }
            for file in files {
                println!(
                    "📄  {:<40} {:>8} bytes  {}",
                    file.name.green(),
                    file.size,
                    format!("inode {}", file.inumber).bright_black()
                );
            }
        }
        Command::Open(path, flags) => {
            let fd = fs.open(path, *flags)?;
            println!("📂 Opened {} as fd {}", path.cyan(), fd.to_string().bold());
        }
        Command::Close(fd) => {
            fs.close(*fd)?;
            println!("✅ Closed fd {}", fd);
        }
        Command::Read(fd, len) => {
            let data = fs.read(*fd, *len)?;
            println!("{}", String::from_utf8_lossy(&data));
            println!("{}", format!("({} bytes)", data.len()).bright_black());
        }
        Command::Write(fd, text) => {
            let written = fs.write(*fd, text.as_bytes())?;
            println!("✏️  Wrote {} bytes to fd {}", written, fd);
        }
        Command::Lookup(path) => {
            let inumber = fs.lookup(path)?;
            println!("🔎 {} -> inode {}", path.cyan(), inumber);
        }
        Command::Stat(path) => {
            let stat = fs.stat(path)?;
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {:?}\n{}: {} bytes\n",
                "📊 File Info".bright_yellow().bold(),
                "Name".blue(),
                stat.name,
                "Inode".blue(),
                stat.inumber,
                "Type".blue(),
                stat.kind,
                "Size".blue(),
                stat.size
            );
        }
        Command::Cat(path) => {
            let fd = fs.open(path, OpenFlags::empty())?;
            let data = fs.read(fd, MAX_FILE_SIZE);
            fs.close(fd)?;
            println!("{}", String::from_utf8_lossy(&data?));
        }
        Command::Export(path, host_path) => {
            let copied = fs.copy_to_external(path, host_path)?;
            println!(
                "💾 Copied {} bytes from {} to {}",
                copied,
                path.cyan(),
                host_path.green()
            );
        }
        Command::Df => {
            let usage = fs.usage();
            usage_bar(
                "blocks",
                usage.total_blocks - usage.free_blocks,
                usage.total_blocks,
            )?;
            usage_bar(
                "inodes",
                usage.total_inodes - usage.free_inodes,
                usage.total_inodes,
            )?;
            usage_bar("open files", usage.open_files, usage.max_open_files)?;
        }
        Command::Exit => println!("{}", "👋 Exiting flatfs shell...".yellow().bold()),
    }

    Ok(())
}

fn usage_bar(label: &str, used: usize, total: usize) -> Result<(), Box<dyn Error>> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template("{prefix:>10} [{bar:40.green/black}] {pos:>5}/{len:5}")?
            .progress_chars("#>-"),
    );
    pb.set_prefix(label.to_string());
    pb.set_position(used as u64);
    pb.abandon();
    Ok(())
}

fn print_help() {
    println!("{}", "📘 flatfs Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls                       List files
  open <path> [cta]        Open a file (c: create, t: truncate, a: append)
  close <fd>               Close an open file
  read <fd> <n>            Read up to n bytes at the cursor
  write <fd> <text>        Write text at the cursor
  lookup <path>            Show the inode number behind a path
  stat <path>              Show file info
  cat <path>               Print a whole file
  export <path> <host>     Copy a file out to the host file system
  df                       Show free blocks, inodes and open files
  help                     Show this help message
  exit                     Quit the shell
"
        .bright_black()
    );
}
