mod common;

use std::path::Path;
use std::process::Output;

use harmonia::store::TagStore;
use tokio::process::Command;

fn write_config(dir: &Path, base: &str, token: &str) -> std::path::PathBuf {
    let config = dir.join("config.toml");
    let contents = format!(
        r#"database = "{}"
api_base = "{base}"
dropbox_api = "{base}"
access_token = "{token}"
shared_link = "{}"
log_level = "off"
"#,
        dir.join("tags.db").display(),
        common::ROOT_LINK,
    );
    std::fs::write(&config, contents).expect("write config");
    config
}

async fn harmonia(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_harmonia"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("HARMONIA_ACCESS_TOKEN")
        .env_remove("HARMONIA_SHARED_LINK")
        .env_remove("RUST_LOG")
        .output()
        .await
        .expect("run harmonia")
}

#[actix_web::test]
async fn folders_lists_filtered_library() {
    let store = TagStore::in_memory().await.expect("store");
    store
        .set_tags("id:jazz", common::tags(&["jazz"]))
        .await
        .expect("seed");
    let base = common::start_server(store).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), &base, common::TOKEN);

    let output = harmonia(&config, &["folders", "--toggle", "jazz"]).await;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Blue Note"));
    assert!(!stdout.contains("Grunge"));
    assert!(stdout.contains("/?tags=jazz"));
}

#[actix_web::test]
async fn failed_listing_exits_with_error() {
    let store = TagStore::in_memory().await.expect("store");
    let base = common::start_server(store).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_config(dir.path(), &base, "wrong");

    let output = harmonia(&config, &["folders"]).await;
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Dropbox API error: Unauthorized"));
}
