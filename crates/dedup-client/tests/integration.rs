//! End-to-end round trips: a real `dedup-node` subprocess per storage node,
//! driven by the `dedup-client` binary.
//!
//! `dedup-node` is a workspace sibling, not a dependency of this crate, so
//! `Command::cargo_bin` finds it via its fallback lookup in the shared
//! `target/` directory. Run with `cargo test --workspace` (or build the
//! workspace first) so that binary exists before these tests execute.

use std::io::Write;
use std::net::TcpListener as StdTcpListener;
use std::process::Child;
use std::time::Duration;

use assert_cmd::Command;
use predicates::str::contains;

struct NodeProcess(Child);

impl Drop for NodeProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn spawn_node(port: u16, storage_dir: &std::path::Path, node_id: u32) -> NodeProcess {
    let child = Command::cargo_bin("dedup-node")
        .unwrap()
        .arg("--port")
        .arg(port.to_string())
        .arg("--storage-dir")
        .arg(storage_dir)
        .arg("--node-id")
        .arg(node_id.to_string())
        .spawn()
        .expect("failed to start dedup-node");
    NodeProcess(child)
}

fn write_config(path: &std::path::Path, ports: &[u16]) {
    let mut f = std::fs::File::create(path).unwrap();
    for (i, port) in ports.iter().enumerate() {
        writeln!(f, "server{}_ip=127.0.0.1", i + 1).unwrap();
        writeln!(f, "server{}_port={}", i + 1, port).unwrap();
    }
}

/// A single small file uploads once cold, then reports full redundancy on
/// a second invocation against the same fleet.
#[test]
fn small_file_is_fully_redundant_on_second_invocation() {
    let storage_dirs: Vec<_> = (0..2).map(|_| tempfile::tempdir().unwrap()).collect();
    let ports: Vec<u16> = (0..2).map(|_| free_port()).collect();
    let _nodes: Vec<_> = storage_dirs
        .iter()
        .zip(&ports)
        .enumerate()
        .map(|(i, (dir, port))| spawn_node(*port, dir.path(), (i + 1) as u32))
        .collect();
    std::thread::sleep(Duration::from_millis(300));

    let workdir = tempfile::tempdir().unwrap();
    let config_path = workdir.path().join("dedup.conf");
    write_config(&config_path, &ports);

    let file_path = workdir.path().join("payload.bin");
    std::fs::write(&file_path, vec![0x41u8; 4096]).unwrap();

    Command::cargo_bin("dedup-client")
        .unwrap()
        .arg(&file_path)
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(contains("chunks:           1"));

    Command::cargo_bin("dedup-client")
        .unwrap()
        .arg(&file_path)
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(contains("100.00% redundancy"));
}

/// An empty file round-trips with zero redundancy and no uploads.
#[test]
fn empty_file_reports_zero_chunks_and_zero_redundancy() {
    let storage_dirs: Vec<_> = (0..2).map(|_| tempfile::tempdir().unwrap()).collect();
    let ports: Vec<u16> = (0..2).map(|_| free_port()).collect();
    let _nodes: Vec<_> = storage_dirs
        .iter()
        .zip(&ports)
        .enumerate()
        .map(|(i, (dir, port))| spawn_node(*port, dir.path(), (i + 1) as u32))
        .collect();
    std::thread::sleep(Duration::from_millis(300));

    let workdir = tempfile::tempdir().unwrap();
    let config_path = workdir.path().join("dedup.conf");
    write_config(&config_path, &ports);

    let file_path = workdir.path().join("empty.bin");
    std::fs::write(&file_path, []).unwrap();

    Command::cargo_bin("dedup-client")
        .unwrap()
        .arg(&file_path)
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(contains("chunks:           0"))
        .stdout(contains("0.00% redundancy"));
}

/// Missing configuration is a fatal, non-zero-exit error.
#[test]
fn missing_config_file_is_a_fatal_error() {
    let workdir = tempfile::tempdir().unwrap();
    let file_path = workdir.path().join("payload.bin");
    std::fs::write(&file_path, vec![1u8; 10]).unwrap();

    Command::cargo_bin("dedup-client")
        .unwrap()
        .arg(&file_path)
        .arg("--config")
        .arg(workdir.path().join("does-not-exist.conf"))
        .assert()
        .failure();
}
