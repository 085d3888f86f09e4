use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Emits one `test!` per source file. Each subdirectory becomes a module of the same name,
/// which is also how a test knows whether its program is expected to compile.
fn add_tests_from_dir(dir: &Path, depth: usize, testfile: &mut impl Write) -> std::io::Result<()> {
    let indent = "    ".repeat(depth);

    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<PathBuf>>>()?;
    entries.sort();

    for path in entries {
        let name = match path.file_stem().and_then(|stem| stem.to_str()) {
            Some(name) => name.replace('-', "_"),
            None => continue,
        };

        if path.is_dir() {
            writeln!(testfile, "{}mod {} {{", indent, name)?;
            writeln!(testfile, "{}    use super::*;\n", indent)?;
            add_tests_from_dir(&path, depth + 1, testfile)?;
            writeln!(testfile, "{}}}\n", indent)?;
        } else if path.extension().map_or(false, |ext| ext == "cmm") {
            writeln!(
                testfile,
                r###"{}test!(r#{} {{ run_test_from_file(r"{}"); }});"###,
                indent,
                name,
                path.display()
            )?;
        }
    }

    Ok(())
}

fn main() -> std::io::Result<()> {
    let testfiles_root = Path::new("testfiles");
    println!("cargo:rerun-if-changed={}", testfiles_root.display());

    let out_dir = std::env::var("OUT_DIR")
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::NotFound, err))?;
    let mut testfile = std::fs::File::create(Path::new(&out_dir).join("test.rs"))?;

    if testfiles_root.is_dir() {
        add_tests_from_dir(testfiles_root, 0, &mut testfile)?;
    }

    Ok(())
}
