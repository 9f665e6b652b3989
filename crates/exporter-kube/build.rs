use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    // The server half backs the fake kubelet in tests
    let config = tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir(&out_dir);

    config.compile_protos(&["proto/podresources.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/podresources.proto");

    Ok(())
}
