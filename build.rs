use std::io::Write;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // For each hid.bin file in our tests/data directory, create one test function
    // that decodes that report descriptor and builds its report layout
    let datadir: PathBuf = [concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data")]
        .iter()
        .collect();
    let out_dir = std::env::var_os("OUT_DIR").ok_or("OUT_DIR is not set")?;
    let dest_path = PathBuf::from(&out_dir).join("test-report-descriptors.rs");
    let mut file = std::fs::File::create(dest_path)?;

    println!("cargo:rerun-if-changed=tests/data");

    writeln!(file, "use hidrdesc::*;")?;
    writeln!(file)?;

    // Fixtures are excluded from the published package
    if !datadir.is_dir() {
        return Ok(());
    }

    let mut entries = std::fs::read_dir(&datadir)?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".hid.bin"))
        .collect::<Vec<_>>();
    entries.sort_by_key(|e| e.file_name());

    for rdesc in entries {
        let filename = rdesc.file_name().to_string_lossy().into_owned();
        let funcname = filename.replace([':', '.', '-'], "_");
        let path = rdesc.path();
        writeln!(
            file,
            "
#[test]
#[allow(non_snake_case)]
fn test_{funcname}() {{
    let bytes: Vec<u8> = std::fs::read({path:?}).unwrap();
    let decoded = decode(&bytes);
    assert_eq!(decoded.error, None, \"Failed to decode {filename}\");
    assert_eq!(decoded, decode(&bytes));

    let opened = decoded.records.iter().filter(|r| matches!(r, Record::Collection(_))).count();
    let closed = decoded.records.iter().filter(|r| matches!(r, Record::EndCollection)).count();
    assert_eq!(opened, closed, \"Unbalanced collections in {filename}\");

    assert!(top_level_usage(&bytes).is_some(), \"No top-level usage in {filename}\");
    ReportDescriptor::try_from(&bytes).expect(&format!(\"Failed to build layout for {filename}\"));
}}
"
        )?;
    }

    Ok(())
}
