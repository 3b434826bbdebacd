use std::env;
use std::path::PathBuf;

const FIXTURE_SOURCE: &str = "tests/fixture/scanner.c";

fn main() {
    // Rebuild if the build script itself changes
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed={}", FIXTURE_SOURCE);

    // The binding tests load a small C scanner library through
    // FPSCANNER_LIBRARY. Only unix targets build it.
    if env::var("CARGO_CFG_TARGET_FAMILY").as_deref() != Ok("unix") {
        return;
    }

    let out_dir = match env::var_os("OUT_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => return,
    };
    let extension = match env::var("CARGO_CFG_TARGET_OS").as_deref() {
        Ok("macos") | Ok("ios") => "dylib",
        _ => "so",
    };
    let library = out_dir.join(format!("libscanner_fixture.{}", extension));

    let compiler = cc::Build::new().warnings(false).get_compiler();
    let status = compiler
        .to_command()
        .args(["-shared", "-fPIC", "-o"])
        .arg(&library)
        .arg(FIXTURE_SOURCE)
        .status();

    match status {
        Ok(status) if status.success() => {
            println!("cargo:rustc-env=FPSCANNER_FIXTURE={}", library.display());
        }
        Ok(status) => {
            println!("cargo:warning=scanner test fixture failed to build ({})", status);
        }
        Err(e) => {
            println!("cargo:warning=could not run C compiler for test fixture: {}", e);
        }
    }
}
