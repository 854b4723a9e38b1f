use std::env;
use std::io::{Result, Write, Error, ErrorKind};
use std::fs::OpenOptions;
use std::path::PathBuf;
use chrono::{DateTime, Utc};
use csv::Reader;

fn out_file(name: &str) -> Result<std::fs::File> {
    let dir = env::var("OUT_DIR").map_err(|e| Error::new(ErrorKind::Other, e))?;
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(PathBuf::from(dir).join(name))
}

fn update_version_number() -> Result<()> {
    let now: DateTime<Utc> = Utc::now();
    let mut fo = out_file("version.rs")?;
    writeln!(fo, "/// Build stamp, regenerated by build.rs.")?;
    writeln!(fo, r#"pub const VERSION : &str = "{}";"#, now.to_rfc2822())?;
    Ok(())
}

fn update_syscall_number() -> Result<()> {
    let fi = OpenOptions::new()
        .read(true)
        .open("syscall_num.csv")?;
    let mut fo = out_file("syscall_num.rs")?;
    let mut rdr = Reader::from_reader(fi);
    for result in rdr.records() {
        let record = result?;
        let (name, number) = match (record.get(0), record.get(1)) {
            (Some(name), Some(number)) => (name.trim(), number.trim()),
            _ => return Err(Error::new(ErrorKind::InvalidData, "malformed syscall_num.csv row")),
        };
        writeln!(fo, "pub const SYSCALL_{:<12}: usize = {:>3};", name.to_ascii_uppercase(), number)?;
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=syscall_num.csv");
    println!("cargo:rerun-if-changed=build.rs");
    update_version_number().unwrap();
    update_syscall_number().unwrap();
}
