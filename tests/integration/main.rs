//! Integration tests for Quill
//!
//! These tests drive the whole pipeline through the build driver: loader
//! resolution, generator execution, cache commits and hashing together.

use std::fs;
use std::time::Duration;

use tempfile::TempDir;

use quill_build::BuildCacheDriver;
use quill_hash::hash_bytes;
use quill_loader::LoadOptions;

#[tokio::test]
async fn test_generator_end_to_end() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("gen")).unwrap();
    fs::write(dir.path().join("gen/hello.txt.sh"), "echo hello").unwrap();

    let driver = BuildCacheDriver::new(dir.path()).unwrap();

    // First fetch runs the generator and commits its stdout
    let path = driver
        .resolve_artifact_path("gen/hello.txt", LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(path, ".quill/cache/gen/hello.txt");
    assert_eq!(fs::read_to_string(dir.path().join(&path)).unwrap(), "hello\n");

    // The artifact hash can now be computed
    assert_eq!(driver.output_hash("gen/hello.txt").unwrap(), hash_bytes(b"hello\n"));

    // Editing the generator makes the entry stale; a build-mode fetch
    // serves the old bytes, a preview-mode fetch re-executes
    std::thread::sleep(Duration::from_millis(20));
    fs::write(dir.path().join("gen/hello.txt.sh"), "echo goodbye").unwrap();

    let stale = driver
        .resolve_artifact_path("gen/hello.txt", LoadOptions { use_stale: true })
        .await
        .unwrap();
    assert_eq!(fs::read_to_string(dir.path().join(&stale)).unwrap(), "hello\n");

    let fresh = driver
        .resolve_artifact_path("gen/hello.txt", LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(fs::read_to_string(dir.path().join(&fresh)).unwrap(), "goodbye\n");
}

#[tokio::test]
async fn test_parameterized_generator_end_to_end() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("data/[id].txt.sh"), "echo \"item $1\"").unwrap();

    let driver = BuildCacheDriver::new(dir.path()).unwrap();
    let path = driver
        .resolve_artifact_path("data/7.txt", LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(path, ".quill/cache/data/7.txt");
    // The route capture arrives as "--id=7" after the script path
    assert_eq!(fs::read_to_string(dir.path().join(&path)).unwrap(), "item --id=7\n");
}

#[tokio::test]
async fn test_module_hash_tracks_generated_attachment() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("chart.js"),
        "import {rollup} from \"./util.js\";\nconst data = FileAttachment(\"./data.csv\");\n",
    )
    .unwrap();
    fs::write(dir.path().join("util.js"), "export const rollup = 1;\n").unwrap();
    fs::write(dir.path().join("data.csv.sh"), "echo a,b").unwrap();

    let driver = BuildCacheDriver::new(dir.path()).unwrap();
    let before = driver.module_hash("chart.js");

    // Touching the attachment's generator changes the module digest even
    // though no module source changed
    std::thread::sleep(Duration::from_millis(20));
    fs::write(dir.path().join("data.csv.sh"), "echo a,b").unwrap();
    let after = BuildCacheDriver::new(dir.path()).unwrap().module_hash("chart.js");
    assert_ne!(before, after);

    // And editing a transitive import changes it too
    fs::write(dir.path().join("util.js"), "export const rollup = 2;\n").unwrap();
    let edited = BuildCacheDriver::new(dir.path()).unwrap().module_hash("chart.js");
    assert_ne!(after, edited);
}
