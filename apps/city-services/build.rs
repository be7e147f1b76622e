//! Build Script for City Services
//!
//! Generates Rust protobuf stubs from workspace proto definitions.
//!
//! # Panics Policy
//!
//! Build scripts halt the build on missing prerequisites, so `.expect()`
//! is used for every step below.
#![allow(clippy::expect_used)]

use prost::Message;
use std::{env, fs, path::PathBuf, process::Command};

fn main() {
    // Rerun build script if it changes
    println!("cargo:rerun-if-changed=build.rs");

    // Rerun if proto files change
    println!("cargo:rerun-if-changed=../../packages/proto/smartcity/");

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let proto_root = manifest_dir.join("../../packages/proto");
    let proto_files = [
        proto_root.join("smartcity/v1/traffic_light.proto"),
        proto_root.join("smartcity/v1/parking.proto"),
        proto_root.join("smartcity/v1/transport.proto"),
    ];

    for proto in &proto_files {
        println!("cargo:rerun-if-changed={}", proto.display());
    }

    // Vendored protoc produces the descriptor set, so nothing has to be
    // installed on the build host.
    let protoc = protoc_bin_vendored::protoc_bin_path().expect("vendored protoc is unavailable");
    let well_known = protoc_bin_vendored::include_path().expect("vendored protoc includes missing");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let descriptor_path = out_dir.join("smartcity_descriptor.pb");
    let status = Command::new(protoc)
        .arg("--include_imports")
        .arg(format!("--descriptor_set_out={}", descriptor_path.display()))
        .arg(format!("--proto_path={}", proto_root.display()))
        .arg(format!("--proto_path={}", well_known.display()))
        .args(&proto_files)
        .status()
        .expect("Failed to run protoc");

    assert!(status.success(), "protoc failed to build the descriptor set");

    let descriptor_bytes =
        fs::read(&descriptor_path).expect("Failed to read protoc descriptor set output");
    let fds = prost_types::FileDescriptorSet::decode(&*descriptor_bytes)
        .expect("Failed to decode descriptor set");

    tonic_prost_build::configure()
        .build_client(true) // Gateway and integration tests use the clients
        .build_server(true)
        .compile_fds(fds)
        .expect("Failed to compile protobuf definitions");
}
