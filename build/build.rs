use std::{
    env,
    fmt::Write as _,
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write as _},
    path::PathBuf,
    process::Command,
};

fn open(s: &str) -> io::Result<BufWriter<File>> {
    let mut path = PathBuf::from(env::var("OUT_DIR").unwrap());
    path.push(s);
    Ok(BufWriter::new(
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?,
    ))
}

fn create_version() -> anyhow::Result<()> {
    let mut version_string = env!("CARGO_PKG_VERSION").to_string();
    if let Ok(output) = Command::new("git").arg("rev-parse").arg("HEAD").output() {
        if output.status.success() {
            if let Ok(commit) = std::str::from_utf8(&output.stdout) {
                write!(version_string, " ({})", commit.trim())?;
            }
        }
    }
    let mut f = open("version.rs")?;
    writeln!(f, "pub const VERSION: &str = \"{}\";", version_string)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    create_version()?;
    println!("cargo:rerun-if-changed=build/build.rs");
    Ok(())
}
