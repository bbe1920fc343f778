// tests/integration_test.rs

//! Integration tests for rpm-divert
//!
//! These tests run whole commands against a database and real files in a
//! temporary directory, one `run` per simulated invocation.

use rpm_divert::{
    Command, Config, Database, DiversionAction, Error, LockMode, PackageRecord, run,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

struct Fixture {
    dir: TempDir,
    config: Config,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().join("var/lib/rpm-divert/diversions"), "debug");
        Self { dir, config }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn run(&self, command: Command) -> rpm_divert::Result<String> {
        let mut out = Vec::new();
        run(&self.config, &command, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn records(&self) -> Vec<PackageRecord> {
        let mut db = Database::new(&self.config.database_path);
        db.load().unwrap();
        db.dump()
    }
}

fn add(package: &str, source: &Path, diversion: &Path) -> Command {
    Command::Add {
        package: package.to_string(),
        source: source.to_path_buf(),
        diversion: diversion.to_path_buf(),
        action: DiversionAction::Nothing,
        replacement: None,
    }
}

fn apply(package: &str, source: &Path) -> Command {
    Command::Apply {
        package: package.to_string(),
        source: Some(source.to_path_buf()),
        create_directory: false,
    }
}

fn unapply(package: &str, source: &Path) -> Command {
    Command::Unapply {
        package: package.to_string(),
        source: Some(source.to_path_buf()),
    }
}

#[test]
fn test_symlink_diversion_lifecycle() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.path("usr/bin")).unwrap();
    fs::create_dir_all(fx.path("usr/lib/hello-custom")).unwrap();

    let source = fx.path("usr/bin/hello");
    let diverted = fx.path("usr/bin/hello-diverted");
    let replacement = fx.path("usr/lib/hello-custom/hello");
    fs::write(&source, b"#!/bin/sh\necho hello\n").unwrap();
    fs::set_permissions(&source, fs::Permissions::from_mode(0o755)).unwrap();
    fs::write(&replacement, b"#!/bin/sh\necho custom\n").unwrap();
    fs::set_permissions(&replacement, fs::Permissions::from_mode(0o644)).unwrap();

    fx.run(Command::Add {
        package: "hello-custom".to_string(),
        source: source.clone(),
        diversion: diverted.clone(),
        action: DiversionAction::Symlink,
        replacement: Some(replacement.clone()),
    })
    .unwrap();
    fx.run(apply("hello-custom", &source)).unwrap();

    assert_eq!(fs::read(&diverted).unwrap(), b"#!/bin/sh\necho hello\n");
    assert_eq!(fs::read_link(&source).unwrap(), replacement);
    assert_eq!(
        fs::metadata(&replacement).unwrap().permissions().mode() & 0o777,
        0o755
    );

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].diversions[0].applied);
    assert_eq!(records[0].diversions[0].action, DiversionAction::Symlink);

    // A later invocation restores the original from the persisted state
    fx.run(unapply("hello-custom", &source)).unwrap();
    assert_eq!(fs::read(&source).unwrap(), b"#!/bin/sh\necho hello\n");
    assert!(!fs::symlink_metadata(&source).unwrap().file_type().is_symlink());
    assert!(!diverted.exists());
    assert!(!fx.records()[0].diversions[0].applied);
}

#[test]
fn test_unapply_after_package_reinstall() {
    let fx = Fixture::new();
    let source = fx.path("hello.conf");
    let diverted = fx.path("hello.conf.diverted");
    fs::write(&source, b"v1").unwrap();

    fx.run(add("hello-custom", &source, &diverted)).unwrap();
    fx.run(apply("hello-custom", &source)).unwrap();
    assert!(!source.exists());

    // rpm installs the new version before the unapply trigger runs
    fs::write(&source, b"v2").unwrap();

    fx.run(unapply("hello-custom", &source)).unwrap();
    assert_eq!(fs::read(&source).unwrap(), b"v2");
    assert!(!diverted.exists());
    assert!(!fx.records()[0].diversions[0].applied);
}

#[test]
fn test_remove_while_applied() {
    let fx = Fixture::new();
    let source = fx.path("hello");
    let diverted = fx.path("hello-diverted");
    fs::write(&source, b"original").unwrap();

    fx.run(add("hello-custom", &source, &diverted)).unwrap();
    fx.run(apply("hello-custom", &source)).unwrap();

    let result = fx.run(Command::Remove {
        package: "hello-custom".to_string(),
        source: source.clone(),
    });
    assert!(matches!(result, Err(Error::StillApplied { .. })));
    assert_eq!(fx.records()[0].diversions.len(), 1);

    fx.run(unapply("hello-custom", &source)).unwrap();
    fx.run(Command::Remove {
        package: "hello-custom".to_string(),
        source: source.clone(),
    })
    .unwrap();

    // The package went away with its last diversion
    assert!(fx.records().is_empty());
}

#[test]
fn test_failed_apply_still_saves() {
    let fx = Fixture::new();
    let source = fx.path("missing");
    let diverted = fx.path("missing-diverted");

    fx.run(add("hello-custom", &source, &diverted)).unwrap();
    let result = fx.run(apply("hello-custom", &source));

    assert!(matches!(result, Err(Error::Apply { .. })));
    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].diversions[0].applied);
}

#[test]
fn test_unknown_package_is_not_persisted() {
    let fx = Fixture::new();
    let source = fx.path("hello");

    let result = fx.run(apply("nobody", &source));
    assert!(matches!(result, Err(Error::DiversionNotFound { .. })));
    assert!(fx.records().is_empty());
}

#[test]
fn test_list_does_not_write_database() {
    let fx = Fixture::new();

    let output = fx.run(Command::List { package: None }).unwrap();
    assert_eq!(output, "No diversions found.\n");
    assert!(!fx.config.database_path.exists());
    assert!(!fx.config.database_path.parent().unwrap().exists());
}

#[test]
fn test_list_shows_packages() {
    let fx = Fixture::new();
    let a = fx.path("a");
    let b = fx.path("b");
    fs::write(&a, b"a").unwrap();

    fx.run(add("pkg-a", &a, &fx.path("a.diverted"))).unwrap();
    fx.run(add("pkg-b", &b, &fx.path("b.diverted"))).unwrap();
    fx.run(apply("pkg-a", &a)).unwrap();

    let before = fs::read(&fx.config.database_path).unwrap();
    let output = fx.run(Command::List { package: None }).unwrap();

    assert_eq!(
        output,
        format!(
            "pkg-a:\n    {} -> {} (applied)\npkg-b:\n    {} -> {} (not applied)\n",
            a.display(),
            fx.path("a.diverted").display(),
            b.display(),
            fx.path("b.diverted").display()
        )
    );
    assert_eq!(fs::read(&fx.config.database_path).unwrap(), before);

    let only_b = fx
        .run(Command::List {
            package: Some("pkg-b".to_string()),
        })
        .unwrap();
    assert!(only_b.starts_with("pkg-b:\n"));
    assert!(!only_b.contains("pkg-a"));
}

#[test]
fn test_database_round_trip() {
    let fx = Fixture::new();

    let mut db = Database::new(&fx.config.database_path);
    db.lookup_or_create("hello-custom")
        .insert(rpm_divert::Diversion::new(
            PathBuf::from("/usr/bin/hello"),
            PathBuf::from("/usr/bin/hello-diverted"),
            DiversionAction::Symlink,
            Some(PathBuf::from("/usr/lib/hello-custom/hello")),
        ));
    db.lookup_or_create("motd-custom")
        .insert(rpm_divert::Diversion::new(
            PathBuf::from("/etc/motd"),
            PathBuf::from("/etc/motd.orig"),
            DiversionAction::Copy,
            Some(PathBuf::from("/usr/share/motd-custom/motd")),
        ));
    db.save().unwrap();

    let reloaded = Database::open(&fx.config.database_path, LockMode::Shared).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.dump(), db.dump());
}

#[test]
fn test_load_legacy_database() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.config.database_path.parent().unwrap()).unwrap();
    fs::write(
        &fx.config.database_path,
        r#"[
	{
		"package" : "custom-hello",
		"diversions" : [
			{
				"source" : "/usr/bin/hello",
				"diversion" : "/usr/bin/hello-diverted",
				"applied" : true
			}
		]
	}
]"#,
    )
    .unwrap();

    let db = Database::open(&fx.config.database_path, LockMode::Shared).unwrap();
    let diversions = db.query_diversions(Some("custom-hello"));
    let diversion = diversions["custom-hello"][0];

    assert!(diversion.is_applied());
    assert_eq!(diversion.action, DiversionAction::Nothing);
    assert_eq!(diversion.replacement, None);
}

#[test]
fn test_concurrent_writer_is_refused() {
    let fx = Fixture::new();
    let source = fx.path("hello");
    fs::write(&source, b"original").unwrap();

    let _held = Database::open(&fx.config.database_path, LockMode::Exclusive).unwrap();

    let result = fx.run(add("hello-custom", &source, &fx.path("hello-diverted")));
    assert!(matches!(result, Err(Error::DatabaseLocked(_))));
}
