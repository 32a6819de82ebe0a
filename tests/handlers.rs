//! Integration tests for individual task handlers
//!
//! Handlers are called directly against a jailed context.

mod common;

use common::{context, read, zip_bytes};
use recipe_provision::helpers::{content, database, filesystem, vars};
use recipe_provision::recipe::{PathList, ReplaceMode, WriteMode};
use recipe_provision::{ErrorKind, TaskError};
use std::fs;
use tempfile::TempDir;

fn kind<T>(result: Result<T, TaskError>) -> ErrorKind {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e.kind(),
    }
}

// =============================================================================
// copy
// =============================================================================

#[tokio::test]
async fn test_copy_file_and_tree() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("defaults/maps")).unwrap();
    fs::write(dir.path().join("defaults/server.cfg"), "cfg").unwrap();
    fs::write(dir.path().join("defaults/maps/a.txt"), "a").unwrap();
    let ctx = context(dir.path());

    filesystem::copy_path(&ctx, "defaults/server.cfg", "cfg/server.cfg", true, true)
        .await
        .unwrap();
    filesystem::copy_path(&ctx, "defaults", "live", true, true)
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "cfg/server.cfg"), "cfg");
    assert_eq!(read(dir.path(), "live/maps/a.txt"), "a");
    assert!(dir.path().join("defaults/server.cfg").exists());
}

#[tokio::test]
async fn test_copy_overwrites_by_default() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("new.cfg"), "new").unwrap();
    fs::write(dir.path().join("live.cfg"), "old").unwrap();
    let ctx = context(dir.path());

    filesystem::copy_path(&ctx, "new.cfg", "live.cfg", true, true)
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "live.cfg"), "new");
}

#[tokio::test]
async fn test_copy_without_overwrite_fails_or_skips() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("new.cfg"), "new").unwrap();
    fs::write(dir.path().join("live.cfg"), "old").unwrap();
    let ctx = context(dir.path());

    let err = filesystem::copy_path(&ctx, "new.cfg", "live.cfg", false, true).await;
    assert_eq!(kind(err), ErrorKind::Validation);
    assert_eq!(read(dir.path(), "live.cfg"), "old");

    filesystem::copy_path(&ctx, "new.cfg", "live.cfg", false, false)
        .await
        .unwrap();
    assert_eq!(read(dir.path(), "live.cfg"), "old");
}

#[tokio::test]
async fn test_copy_overwrite_replaces_directory() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("new")).unwrap();
    fs::write(dir.path().join("new/server.cfg"), "new").unwrap();
    fs::create_dir_all(dir.path().join("live")).unwrap();
    fs::write(dir.path().join("live/server.cfg"), "old").unwrap();
    fs::write(dir.path().join("live/stale.txt"), "stale").unwrap();
    let ctx = context(dir.path());

    filesystem::copy_path(&ctx, "new", "live", true, true)
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "live/server.cfg"), "new");
    assert!(!dir.path().join("live/stale.txt").exists());
}

#[tokio::test]
async fn test_copy_overwrite_replaces_directory_with_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("file.txt"), "file").unwrap();
    fs::create_dir_all(dir.path().join("live")).unwrap();
    fs::write(dir.path().join("live/inner.txt"), "x").unwrap();
    let ctx = context(dir.path());

    filesystem::copy_path(&ctx, "file.txt", "live", true, true)
        .await
        .unwrap();

    assert!(dir.path().join("live").is_file());
    assert_eq!(read(dir.path(), "live"), "file");
}

#[tokio::test]
async fn test_copy_into_own_subtree_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::write(dir.path().join("a/x.txt"), "x").unwrap();
    let ctx = context(dir.path());

    let err = filesystem::copy_path(&ctx, "a", "a/b", true, true).await;

    assert_eq!(kind(err), ErrorKind::Validation);
    assert!(!dir.path().join("a/b").exists());
    assert_eq!(read(dir.path(), "a/x.txt"), "x");
}

#[tokio::test]
async fn test_copy_onto_own_ancestor_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("cfg")).unwrap();
    fs::write(dir.path().join("cfg/server.cfg"), "keep").unwrap();
    let ctx = context(dir.path());

    let err = filesystem::copy_path(&ctx, "cfg/server.cfg", "cfg", true, true).await;
    assert_eq!(kind(err), ErrorKind::Validation);
    let err = filesystem::copy_path(&ctx, "cfg/server.cfg", ".", true, true).await;
    assert_eq!(kind(err), ErrorKind::Validation);

    assert_eq!(read(dir.path(), "cfg/server.cfg"), "keep");
}

#[cfg(unix)]
#[tokio::test]
async fn test_copy_tree_skips_symlinks() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("secret"), "s").unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/real.txt"), "r").unwrap();
    std::os::unix::fs::symlink(outside.path().join("secret"), dir.path().join("src/link")).unwrap();
    let ctx = context(dir.path());

    filesystem::copy_path(&ctx, "src", "dst", true, true)
        .await
        .unwrap();

    assert!(dir.path().join("dst/real.txt").exists());
    assert!(fs::symlink_metadata(dir.path().join("dst/link")).is_err());
}

// =============================================================================
// move / remove / ensure_directory
// =============================================================================

#[tokio::test]
async fn test_move_refuses_existing_destination() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::write(dir.path().join("b.txt"), "b").unwrap();
    let ctx = context(dir.path());

    let err = filesystem::move_path(&ctx, "a.txt", "b.txt", false).await;
    assert_eq!(kind(err), ErrorKind::Validation);
    assert!(dir.path().join("a.txt").exists());

    filesystem::move_path(&ctx, "a.txt", "b.txt", true)
        .await
        .unwrap();
    assert!(!dir.path().join("a.txt").exists());
    assert_eq!(read(dir.path(), "b.txt"), "a");
}

#[tokio::test]
async fn test_move_onto_own_parent_keeps_source() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("cfg")).unwrap();
    fs::write(dir.path().join("cfg/server.cfg"), "precious").unwrap();
    let ctx = context(dir.path());

    let err = filesystem::move_path(&ctx, "cfg/server.cfg", "cfg", true).await;

    assert_eq!(kind(err), ErrorKind::Validation);
    assert_eq!(read(dir.path(), "cfg/server.cfg"), "precious");
}

#[tokio::test]
async fn test_move_into_own_subtree_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("addons")).unwrap();
    fs::write(dir.path().join("addons/x.smx"), "x").unwrap();
    let ctx = context(dir.path());

    let err = filesystem::move_path(&ctx, "addons", "addons/nested", true).await;

    assert_eq!(kind(err), ErrorKind::Validation);
    assert_eq!(read(dir.path(), "addons/x.smx"), "x");
    assert!(!dir.path().join("addons/nested").exists());
}

#[tokio::test]
async fn test_move_directory_into_new_parent() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("extracted/addons")).unwrap();
    fs::write(dir.path().join("extracted/addons/x.smx"), "x").unwrap();
    let ctx = context(dir.path());

    filesystem::move_path(&ctx, "extracted/addons", "game/addons", false)
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "game/addons/x.smx"), "x");
    assert!(!dir.path().join("extracted/addons").exists());
}

#[tokio::test]
async fn test_remove_list_ignores_missing() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("cache/deep")).unwrap();
    fs::write(dir.path().join("old.log"), "x").unwrap();
    let ctx = context(dir.path());

    let paths = PathList::Many(vec![
        "cache".to_string(),
        "old.log".to_string(),
        "never-existed".to_string(),
    ]);
    filesystem::remove(&ctx, &paths).await.unwrap();

    assert!(!dir.path().join("cache").exists());
    assert!(!dir.path().join("old.log").exists());
}

#[tokio::test]
async fn test_remove_rejects_escape_before_removing_anything() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("keep.txt"), "x").unwrap();
    let ctx = context(dir.path());

    let paths = PathList::Many(vec!["keep.txt".to_string(), "../..".to_string()]);
    let err = filesystem::remove(&ctx, &paths).await;

    assert_eq!(kind(err), ErrorKind::PathEscape);
    assert!(dir.path().join("keep.txt").exists());
}

#[tokio::test]
async fn test_remove_refuses_target_root() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());

    let err = filesystem::remove(&ctx, &PathList::One(".".to_string())).await;

    assert_eq!(kind(err), ErrorKind::Validation);
    assert!(dir.path().exists());
}

#[tokio::test]
async fn test_ensure_directory_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());

    filesystem::ensure_directory(&ctx, "a/b/c").await.unwrap();
    filesystem::ensure_directory(&ctx, "a/b/c").await.unwrap();

    assert!(dir.path().join("a/b/c").is_dir());
}

// =============================================================================
// unzip
// =============================================================================

#[tokio::test]
async fn test_unzip_extracts_into_destination() {
    let dir = TempDir::new().unwrap();
    let bytes = zip_bytes(&[("plugin/", ""), ("plugin/a.cfg", "a"), ("readme.txt", "r")]);
    fs::write(dir.path().join("plugin.zip"), bytes).unwrap();
    let ctx = context(dir.path());

    filesystem::unzip(&ctx, "plugin.zip", "addons").await.unwrap();

    assert_eq!(read(dir.path(), "addons/plugin/a.cfg"), "a");
    assert_eq!(read(dir.path(), "addons/readme.txt"), "r");
}

#[tokio::test]
async fn test_unzip_rejects_traversal_entries() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("server");
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("bad.zip"), zip_bytes(&[("../../evil.txt", "x")])).unwrap();
    let ctx = context(&target);

    let result = filesystem::unzip(&ctx, "bad.zip", "out").await;

    assert!(result.is_err());
    assert!(!dir.path().join("evil.txt").exists());
}

#[tokio::test]
async fn test_unzip_unknown_format() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("data.bin"), "x").unwrap();
    let ctx = context(dir.path());

    let err = filesystem::unzip(&ctx, "data.bin", "out").await;
    assert_eq!(kind(err), ErrorKind::Validation);
}

// =============================================================================
// write_file / replace_string
// =============================================================================

#[tokio::test]
async fn test_write_file_modes() {
    let dir = TempDir::new().unwrap();
    let mut ctx = context(dir.path());
    ctx.vars_mut().set_public("port", "27015");

    content::write_file(&ctx, "cfg/a.cfg", "port {{port}}\n", WriteMode::Truncate, true)
        .await
        .unwrap();
    content::write_file(&ctx, "cfg/a.cfg", "raw {{port}}\n", WriteMode::Append, false)
        .await
        .unwrap();
    assert_eq!(read(dir.path(), "cfg/a.cfg"), "port 27015\nraw {{port}}\n");

    content::write_file(&ctx, "cfg/a.cfg", "fresh", WriteMode::Truncate, true)
        .await
        .unwrap();
    assert_eq!(read(dir.path(), "cfg/a.cfg"), "fresh");
}

#[tokio::test]
async fn test_replace_string_all_vars() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.cfg"), "{{host}}:{{port}} {{missing}}").unwrap();
    fs::write(dir.path().join("b.cfg"), "port={{port}}").unwrap();
    let mut ctx = context(dir.path());
    ctx.vars_mut().set_public("host", "0.0.0.0");
    ctx.vars_mut().set_public("port", "25565");

    let files = PathList::Many(vec!["a.cfg".to_string(), "b.cfg".to_string()]);
    content::replace_string(&ctx, &files, ReplaceMode::AllVars, None, None)
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "a.cfg"), "0.0.0.0:25565 {{missing}}");
    assert_eq!(read(dir.path(), "b.cfg"), "port=25565");
}

#[tokio::test]
async fn test_replace_string_template_and_literal() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.cfg"), "motd=PLACEHOLDER").unwrap();
    let mut ctx = context(dir.path());
    ctx.vars_mut().set_public("name", "Arena");
    let file = PathList::One("a.cfg".to_string());

    content::replace_string(
        &ctx,
        &file,
        ReplaceMode::Template,
        Some("PLACEHOLDER"),
        Some("Welcome to {{name}}"),
    )
    .await
    .unwrap();
    assert_eq!(read(dir.path(), "a.cfg"), "motd=Welcome to Arena");

    content::replace_string(
        &ctx,
        &file,
        ReplaceMode::Literal,
        Some("Arena"),
        Some("{{name}}"),
    )
    .await
    .unwrap();
    assert_eq!(read(dir.path(), "a.cfg"), "motd=Welcome to {{name}}");
}

#[tokio::test]
async fn test_replace_string_missing_file() {
    let dir = TempDir::new().unwrap();
    let ctx = context(dir.path());

    let err = content::replace_string(
        &ctx,
        &PathList::One("absent.cfg".to_string()),
        ReplaceMode::AllVars,
        None,
        None,
    )
    .await;
    assert_eq!(kind(err), ErrorKind::Filesystem);
}

// =============================================================================
// load_vars / database
// =============================================================================

#[tokio::test]
async fn test_load_vars_rejects_nested_values() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("v.json"), r#"{"a": {"b": 1}}"#).unwrap();
    let mut ctx = context(dir.path());

    let err = vars::load_vars(&mut ctx, "v.json").await;
    assert_eq!(kind(err), ErrorKind::Validation);
    assert!(ctx.vars().public().is_empty());
}

#[tokio::test]
async fn test_load_vars_overrides_existing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("v.json"), r#"{"port": 27016, "lan": true}"#).unwrap();
    let mut ctx = context(dir.path());
    ctx.vars_mut().set_public("port", "27015");

    vars::load_vars(&mut ctx, "v.json").await.unwrap();

    assert_eq!(ctx.vars().get("port"), Some("27016"));
    assert_eq!(ctx.vars().get("lan"), Some("true"));
}

#[tokio::test]
async fn test_connect_rejects_bad_name_after_templating() {
    let dir = TempDir::new().unwrap();
    let mut ctx = context(dir.path());
    ctx.vars_mut().set_public("db", "x; DROP TABLE y");

    let err = database::connect_database(&mut ctx, "{{db}}", None).await;

    assert_eq!(kind(err), ErrorKind::Validation);
    assert!(!ctx.has_database());
}

#[tokio::test]
async fn test_close_database_releases_handle() {
    let dir = TempDir::new().unwrap();
    let mut ctx = context(dir.path());

    database::connect_database(&mut ctx, "game", None).await.unwrap();
    assert!(ctx.has_database());
    ctx.close_database();
    assert!(!ctx.has_database());

    let err = database::query_database(&mut ctx, None, Some("SELECT 1;")).await;
    assert_eq!(kind(err), ErrorKind::Validation);
}
