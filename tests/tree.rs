// tests/tree.rs

use std::sync::Arc;
use std::time::SystemTime;

use staleset::fs::{FileSystem, RealFileSystem};
use staleset::trigger::{DependencyMap, DestinationSpec, Targets};
use staleset::types::RelPath;
use staleset::DependencyTreeBuilder;
use staleset_test_utils::builders::ContentTree;
use staleset_test_utils::{at, init_tracing, with_timeout};

// 2023-01-01, 2023-02-01, 2023-03-01
fn old() -> SystemTime {
    at(1_672_531_200)
}
fn last_run() -> SystemTime {
    at(1_675_209_600)
}
fn new() -> SystemTime {
    at(1_677_628_800)
}

fn input() -> ContentTree {
    ContentTree::new()
        .file("file1.txt", old())
        .file("file2.txt", old())
        .file("skip.txt", new())
        .file("folder/file3.txt", new())
}

fn builder(tree: &ContentTree) -> DependencyTreeBuilder {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    DependencyTreeBuilder::new(fs, tree.root())
}

async fn sorted(b: DependencyTreeBuilder, dir: &str) -> Vec<String> {
    let mut out: Vec<String> = with_timeout(b.tree(dir))
        .await
        .expect("tree listing")
        .into_iter()
        .map(|p| p.to_string())
        .collect();
    out.sort();
    out
}

#[tokio::test]
async fn lists_every_file_without_since() {
    init_tracing();
    let tree = input();

    assert_eq!(
        sorted(builder(&tree), ".").await,
        vec!["file1.txt", "file2.txt", "folder/file3.txt", "skip.txt"]
    );
}

#[tokio::test]
async fn subdirectory_paths_are_relative_to_it() {
    let tree = input();

    assert_eq!(sorted(builder(&tree), "folder").await, vec!["file3.txt"]);
}

#[tokio::test]
async fn since_keeps_only_newer_files() {
    let tree = input();

    assert_eq!(
        sorted(builder(&tree).since(Some(last_run())), ".").await,
        vec!["folder/file3.txt", "skip.txt"]
    );
}

#[tokio::test]
async fn single_pattern_dependency_pulls_in_target() {
    let tree = input();
    let deps = DependencyMap::new().with("folder/*", "file2.*");

    assert_eq!(
        sorted(
            builder(&tree).since(Some(last_run())).dependencies(deps),
            "."
        )
        .await,
        vec!["file2.txt", "folder/file3.txt", "skip.txt"]
    );
}

#[tokio::test]
async fn list_dependency_pulls_in_every_target() {
    let tree = input();
    let deps = DependencyMap::new().with("folder/*", vec!["file2.*", "file1.*"]);

    assert_eq!(
        sorted(
            builder(&tree).since(Some(last_run())).dependencies(deps),
            "."
        )
        .await,
        vec!["file1.txt", "file2.txt", "folder/file3.txt", "skip.txt"]
    );
}

#[tokio::test]
async fn callback_sees_only_changed_matches() {
    let tree = input();
    let deps = DependencyMap::new().with(
        "folder/*",
        DestinationSpec::callback(|changed: &[RelPath]| {
            anyhow::ensure!(
                changed == [RelPath::new("folder/file3.txt")],
                "unexpected matches: {changed:?}"
            );
            Ok("file2.*")
        }),
    );

    assert_eq!(
        sorted(
            builder(&tree).since(Some(last_run())).dependencies(deps),
            "."
        )
        .await,
        vec!["file2.txt", "folder/file3.txt", "skip.txt"]
    );
}

#[tokio::test]
async fn callback_returning_list() {
    let tree = input();
    let deps = DependencyMap::new().with(
        "folder/*",
        DestinationSpec::callback(|_: &[RelPath]| Ok(Targets::from(vec!["file2.*", "file1.*"]))),
    );

    assert_eq!(
        sorted(
            builder(&tree).since(Some(last_run())).dependencies(deps),
            "."
        )
        .await,
        vec!["file1.txt", "file2.txt", "folder/file3.txt", "skip.txt"]
    );
}

#[tokio::test]
async fn old_dependency_does_not_fire() {
    let tree = input();
    let deps = DependencyMap::new().with("file1.txt", "file2.txt");

    assert_eq!(
        sorted(
            builder(&tree).since(Some(last_run())).dependencies(deps),
            "."
        )
        .await,
        vec!["folder/file3.txt", "skip.txt"]
    );
}

#[tokio::test]
async fn dependency_outside_subdirectory_still_fires() {
    let tree = ContentTree::new()
        .file("layout.html", new())
        .file("pages/a.md", old())
        .file("pages/b.md", old())
        .file("other/c.md", old());
    let deps = DependencyMap::new().with("layout.html", "pages/*.md");

    assert_eq!(
        sorted(
            builder(&tree).since(Some(last_run())).dependencies(deps),
            "pages"
        )
        .await,
        vec!["a.md", "b.md"]
    );
}

#[tokio::test]
async fn missing_base_dir_is_an_error() {
    let tree = input();

    let result = builder(&tree).tree("no-such-dir").await;
    assert!(result.is_err(), "expected error, got {result:?}");
}

#[tokio::test]
async fn failing_callback_aborts_the_listing() {
    let tree = input();
    let deps = DependencyMap::new().with(
        "folder/*",
        DestinationSpec::callback(|_: &[RelPath]| -> anyhow::Result<Targets> {
            anyhow::bail!("callback exploded")
        }),
    );

    let err = builder(&tree)
        .since(Some(last_run()))
        .dependencies(deps)
        .tree(".")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("folder/*"), "got: {err}");
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directories_are_not_descended() {
    let tree = ContentTree::new().file("a/file.txt", old());
    std::os::unix::fs::symlink("..", tree.path("a/loop")).unwrap();

    let out = sorted(builder(&tree), ".").await;

    assert_eq!(out, vec!["a/file.txt", "a/loop"]);
}
