//! Build script for recap-proto
//!
//! Generates gRPC/protobuf bindings during `cargo build`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Fall back to the vendored protoc when none is configured on the host.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    println!("cargo:rerun-if-changed=proto/recap.proto");

    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .type_attribute(".", "#[allow(missing_docs)]")
        .compile(&["proto/recap.proto"], &["proto"])?;

    Ok(())
}
