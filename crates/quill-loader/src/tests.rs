//! Unit tests for quill-loader

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

use quill_core::config::InterpreterTable;
use quill_core::error::LoadError;

use crate::archive::{ArchiveFormat, extract_member};
use crate::catalog::LoaderCatalog;
use crate::executor::{LoadOptions, LoaderExecutor};
use crate::loader::Strategy;

fn catalog(root: &Path) -> LoaderCatalog {
    LoaderCatalog::new(root, InterpreterTable::default())
}

fn write_zip(path: &Path, members: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in members {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

fn write_tar(path: &Path, members: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(file);
    for (name, bytes) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, *name, *bytes).unwrap();
    }
    builder.finish().unwrap();
}

mod catalog_tests {
    use super::*;

    #[test]
    fn test_resolve_literal_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), "a,b").unwrap();

        let loader = catalog(dir.path()).resolve("data.csv").unwrap();
        assert!(loader.is_static());
        assert_eq!(loader.source_path, "data.csv");
    }

    #[test]
    fn test_resolve_command_loader() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv.sh"), "echo a,b").unwrap();

        let loader = catalog(dir.path()).resolve("data.csv").unwrap();
        assert_eq!(loader.source_path, "data.csv.sh");
        assert_eq!(loader.target_path, "data.csv");
        let Strategy::Command { program, args } = &loader.strategy else {
            panic!("expected command strategy");
        };
        assert_eq!(program, "sh");
        assert!(args.last().unwrap().ends_with("data.csv.sh"));
    }

    #[test]
    fn test_literal_wins_over_generator() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.csv"), "a,b").unwrap();
        fs::write(dir.path().join("data.csv.sh"), "echo a,b").unwrap();

        let loader = catalog(dir.path()).resolve("data.csv").unwrap();
        assert!(loader.is_static());
    }

    #[test]
    fn test_resolve_parameterized_route() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/[id].csv.sh"), "echo row").unwrap();

        let loader = catalog(dir.path()).resolve("data/42.csv").unwrap();
        assert_eq!(loader.source_path, "data/[id].csv.sh");
        assert_eq!(loader.params.get("id").map(String::as_str), Some("42"));
        let Strategy::Command { args, .. } = &loader.strategy else {
            panic!("expected command strategy");
        };
        assert!(args.contains(&"--id=42".to_string()));
    }

    #[test]
    fn test_resolve_missing() {
        let dir = TempDir::new().unwrap();
        assert!(catalog(dir.path()).resolve("data.csv").is_none());
    }

    #[test]
    fn test_extensionless_generator_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tool.exe"), "").unwrap();

        // "tool" could only come from an interpreter-suffixed name, which
        // is ambiguous for extension-less targets
        assert!(catalog(dir.path()).resolve("tool").is_none());
    }

    #[test]
    fn test_resolve_archive_member() {
        let dir = TempDir::new().unwrap();
        write_zip(dir.path().join("data.zip").as_path(), &[("table.csv", b"a,b")]);

        let loader = catalog(dir.path()).resolve("data/table.csv").unwrap();
        let Strategy::Extract { archive, format, member } = &loader.strategy else {
            panic!("expected extract strategy");
        };
        assert_eq!(*format, ArchiveFormat::Zip);
        assert_eq!(member, "table.csv");
        assert!(archive.is_static());
        assert_eq!(archive.source_path, "data.zip");
    }

    #[test]
    fn test_archive_ascends_to_nearest_ancestor() {
        let dir = TempDir::new().unwrap();
        write_zip(dir.path().join("data.zip").as_path(), &[("report/table.csv", b"a,b")]);

        let loader = catalog(dir.path()).resolve("data/report/table.csv").unwrap();
        let Strategy::Extract { member, .. } = &loader.strategy else {
            panic!("expected extract strategy");
        };
        assert_eq!(member, "report/table.csv");
    }

    #[test]
    fn test_existing_directory_beats_archive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        write_zip(dir.path().join("data.zip").as_path(), &[("table.csv", b"a,b")]);

        assert!(catalog(dir.path()).resolve("data/table.csv").is_none());
    }

    #[test]
    fn test_generated_archive_chains() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("data.zip.sh"), "cat inner.zip").unwrap();

        let loader = catalog(dir.path()).resolve("data/table.csv").unwrap();
        let Strategy::Extract { archive, format, member } = &loader.strategy else {
            panic!("expected extract strategy");
        };
        assert_eq!(*format, ArchiveFormat::Zip);
        assert_eq!(member, "table.csv");
        assert_eq!(archive.target_path, "data.zip");
        assert!(matches!(archive.strategy, Strategy::Command { .. }));
    }
}

mod archive_tests {
    use super::*;

    #[test]
    fn test_extract_zip_member() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("data.zip");
        write_zip(&archive, &[("a.txt", b"alpha"), ("b.txt", b"beta")]);

        let out_path = dir.path().join("out");
        let mut out = fs::File::create(&out_path).unwrap();
        extract_member(&archive, ArchiveFormat::Zip, "b.txt", &mut out).unwrap();
        drop(out);
        assert_eq!(fs::read(&out_path).unwrap(), b"beta");
    }

    #[test]
    fn test_extract_zip_missing_member() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("data.zip");
        write_zip(&archive, &[("a.txt", b"alpha")]);

        let mut out = fs::File::create(dir.path().join("out")).unwrap();
        let error = extract_member(&archive, ArchiveFormat::Zip, "nope.txt", &mut out).unwrap_err();
        assert!(matches!(error, crate::archive::ExtractError::MemberMissing(_)));
    }

    #[test]
    fn test_extract_tar_member() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("data.tar");
        write_tar(&archive, &[("nested/a.txt", b"alpha")]);

        let out_path = dir.path().join("out");
        let mut out = fs::File::create(&out_path).unwrap();
        extract_member(&archive, ArchiveFormat::Tar, "nested/a.txt", &mut out).unwrap();
        drop(out);
        assert_eq!(fs::read(&out_path).unwrap(), b"alpha");
    }

    #[test]
    fn test_extract_tgz_member() {
        let dir = TempDir::new().unwrap();
        let tar_path = dir.path().join("data.tar");
        write_tar(&tar_path, &[("a.txt", b"alpha")]);
        let tgz_path = dir.path().join("data.tgz");
        let mut encoder = flate2::write::GzEncoder::new(
            fs::File::create(&tgz_path).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(&fs::read(&tar_path).unwrap()).unwrap();
        encoder.finish().unwrap();

        let out_path = dir.path().join("out");
        let mut out = fs::File::create(&out_path).unwrap();
        extract_member(&tgz_path, ArchiveFormat::TarGz, "a.txt", &mut out).unwrap();
        drop(out);
        assert_eq!(fs::read(&out_path).unwrap(), b"alpha");
    }
}

mod executor_tests {
    use super::*;

    fn run_count(root: &Path) -> usize {
        fs::read_to_string(root.join("runs.log"))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    /// A generator that appends to runs.log so tests can count invocations.
    fn write_counting_generator(root: &Path, name: &str, body: &str) {
        let script = format!("echo run >> \"$(dirname \"$0\")/runs.log\"\n{body}\n");
        fs::write(root.join(name), script).unwrap();
    }

    #[tokio::test]
    async fn test_load_generates_and_commits() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("gen")).unwrap();
        fs::write(dir.path().join("gen/hello.txt.sh"), "echo hello").unwrap();

        let loader = catalog(dir.path()).resolve("gen/hello.txt").unwrap();
        let executor = LoaderExecutor::new(dir.path());
        let path = executor.load(loader, LoadOptions::default()).await.unwrap();

        assert_eq!(path, ".quill/cache/gen/hello.txt");
        assert_eq!(fs::read_to_string(dir.path().join(&path)).unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_fresh_load_skips_generator() {
        let dir = TempDir::new().unwrap();
        write_counting_generator(dir.path(), "out.txt.sh", "echo out");

        let executor = LoaderExecutor::new(dir.path());
        let loader = catalog(dir.path()).resolve("out.txt").unwrap();
        executor.load(loader.clone(), LoadOptions::default()).await.unwrap();
        executor.load(loader, LoadOptions::default()).await.unwrap();

        assert_eq!(run_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_stale_load_reexecutes() {
        let dir = TempDir::new().unwrap();
        write_counting_generator(dir.path(), "out.txt.sh", "echo v1");

        let executor = LoaderExecutor::new(dir.path());
        let loader = catalog(dir.path()).resolve("out.txt").unwrap();
        let path = executor.load(loader, LoadOptions::default()).await.unwrap();
        assert_eq!(fs::read_to_string(dir.path().join(&path)).unwrap(), "v1\n");

        std::thread::sleep(Duration::from_millis(20));
        write_counting_generator(dir.path(), "out.txt.sh", "echo v2");

        // Build mode keeps serving the stale artifact
        let loader = catalog(dir.path()).resolve("out.txt").unwrap();
        let path = executor
            .load(loader.clone(), LoadOptions { use_stale: true })
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join(&path)).unwrap(), "v1\n");
        assert_eq!(run_count(dir.path()), 1);

        // Preview mode re-executes
        let path = executor.load(loader, LoadOptions::default()).await.unwrap();
        assert_eq!(fs::read_to_string(dir.path().join(&path)).unwrap(), "v2\n");
        assert_eq!(run_count(dir.path()), 2);
    }

    #[tokio::test]
    async fn test_failure_leaves_no_cache_entry() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.txt.sh"), "echo partial\nexit 3").unwrap();

        let executor = LoaderExecutor::new(dir.path());
        let loader = catalog(dir.path()).resolve("bad.txt").unwrap();
        let error = executor.load(loader, LoadOptions::default()).await.unwrap_err();

        assert!(matches!(error, LoadError::GeneratorExit { code: 3, .. }));
        assert!(!dir.path().join(".quill/cache/bad.txt").exists());

        // The partial output survives as the failure marker
        let marker = quill_core::cache::failure_marker_path(dir.path(), "bad.txt");
        assert_eq!(fs::read_to_string(marker).unwrap(), "partial\n");
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_retry() {
        let dir = TempDir::new().unwrap();
        write_counting_generator(dir.path(), "bad.txt.sh", "exit 1");

        let executor = LoaderExecutor::new(dir.path()).with_cooldown(Duration::from_millis(200));
        let loader = catalog(dir.path()).resolve("bad.txt").unwrap();

        let first = executor.load(loader.clone(), LoadOptions::default()).await.unwrap_err();
        assert!(matches!(first, LoadError::GeneratorExit { .. }));

        let second = executor.load(loader.clone(), LoadOptions::default()).await.unwrap_err();
        assert!(matches!(second, LoadError::SuppressedRetry { .. }));
        assert_eq!(run_count(dir.path()), 1);

        // After the cooldown the generator is invoked again
        tokio::time::sleep(Duration::from_millis(250)).await;
        let third = executor.load(loader, LoadOptions::default()).await.unwrap_err();
        assert!(matches!(third, LoadError::GeneratorExit { .. }));
        assert_eq!(run_count(dir.path()), 2);
    }

    #[tokio::test]
    async fn test_generator_edit_bypasses_cooldown() {
        let dir = TempDir::new().unwrap();
        write_counting_generator(dir.path(), "fix.txt.sh", "exit 1");

        let executor = LoaderExecutor::new(dir.path());
        let loader = catalog(dir.path()).resolve("fix.txt").unwrap();
        let error = executor.load(loader.clone(), LoadOptions::default()).await.unwrap_err();
        assert!(matches!(error, LoadError::GeneratorExit { .. }));

        let marker = quill_core::cache::failure_marker_path(dir.path(), "fix.txt");
        assert!(marker.exists());

        // Editing the generator makes its mtime newer than the marker, so
        // the cooldown no longer applies even though it has not expired
        std::thread::sleep(Duration::from_millis(20));
        write_counting_generator(dir.path(), "fix.txt.sh", "echo fixed");

        let path = executor.load(loader, LoadOptions::default()).await.unwrap();
        assert_eq!(fs::read_to_string(dir.path().join(&path)).unwrap(), "fixed\n");
        assert_eq!(run_count(dir.path()), 2);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_concurrent_loads_deduplicate() {
        let dir = TempDir::new().unwrap();
        write_counting_generator(dir.path(), "slow.txt.sh", "sleep 0.2\necho done");

        let executor = LoaderExecutor::new(dir.path());
        let loader = catalog(dir.path()).resolve("slow.txt").unwrap();

        let loads = (0..8).map(|_| executor.load(loader.clone(), LoadOptions::default()));
        let results = futures_util::future::join_all(loads).await;

        let paths: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert!(paths.iter().all(|p| p == &paths[0]));
        assert_eq!(run_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_archive_member_load() {
        let dir = TempDir::new().unwrap();
        write_zip(dir.path().join("data.zip").as_path(), &[("table.csv", b"a,b\n1,2\n")]);

        let executor = LoaderExecutor::new(dir.path());
        let loader = catalog(dir.path()).resolve("data/table.csv").unwrap();
        let path = executor.load(loader, LoadOptions::default()).await.unwrap();

        assert_eq!(fs::read(dir.path().join(&path)).unwrap(), b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_archive_member_missing() {
        let dir = TempDir::new().unwrap();
        write_zip(dir.path().join("data.zip").as_path(), &[("table.csv", b"a,b")]);

        let executor = LoaderExecutor::new(dir.path());
        let loader = catalog(dir.path()).resolve("data/missing.csv").unwrap();
        let error = executor.load(loader, LoadOptions::default()).await.unwrap_err();

        assert!(matches!(error, LoadError::ArchiveMemberMissing { .. }));
    }

    #[tokio::test]
    async fn test_generated_archive_chain() {
        let dir = TempDir::new().unwrap();
        write_zip(dir.path().join("inner.zip").as_path(), &[("table.csv", b"x,y\n")]);
        fs::write(
            dir.path().join("data.zip.sh"),
            "cat \"$(dirname \"$0\")/inner.zip\"",
        )
        .unwrap();

        let executor = LoaderExecutor::new(dir.path());
        let loader = catalog(dir.path()).resolve("data/table.csv").unwrap();
        let path = executor.load(loader, LoadOptions::default()).await.unwrap();

        assert_eq!(path, ".quill/cache/data/table.csv");
        assert_eq!(fs::read(dir.path().join(&path)).unwrap(), b"x,y\n");
        // The intermediate archive is cached too
        assert!(dir.path().join(".quill/cache/data.zip").exists());
    }

    #[tokio::test]
    async fn test_static_loader_returns_source() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("plain.csv"), "a,b").unwrap();

        let executor = LoaderExecutor::new(dir.path());
        let loader = catalog(dir.path()).resolve("plain.csv").unwrap();
        let path = executor.load(loader, LoadOptions::default()).await.unwrap();
        assert_eq!(path, "plain.csv");
    }
}
