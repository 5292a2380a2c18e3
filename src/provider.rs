use isahc::http::header::{AUTHORIZATION, CONTENT_TYPE};
use isahc::http::StatusCode;
use isahc::{AsyncReadResponseExt, HttpClient, Request};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UpstreamError {
    #[error("This folder contains restricted content.")]
    RestrictedContent,

    #[error("Dropbox API error: {0}")]
    Api(String),

    #[error("Could not reach Dropbox.")]
    Http(#[from] isahc::Error),

    #[error("Could not build Dropbox request.")]
    Request(#[from] isahc::http::Error),

    #[error("Could not read Dropbox response.")]
    Body(#[from] std::io::Error),

    #[error("Dropbox returned an unexpected listing.")]
    Decode(#[from] serde_json::Error),

    #[error("No Dropbox {0} configured.")]
    NotConfigured(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

/// One entry of a shared folder listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub name: String,
    /// Lower-cased path inside the shared link, when the provider tells it.
    pub path_hint: Option<String>,
    pub kind: EntryKind,
}

/// Folder exposed through the shared link, with a link to browse it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub path_hint: Option<String>,
    pub link: String,
}

#[derive(Deserialize)]
struct ListFolder {
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = ".tag")]
    tag: String,
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    path_lower: Option<String>,
}

/// Lists folders and files behind a Dropbox shared link.
#[derive(Debug, Clone)]
pub struct FolderProvider {
    http_client: HttpClient,
    api_base: String,
    access_token: Option<String>,
    shared_link: Option<String>,
}

impl FolderProvider {
    pub fn new(
        http_client: HttpClient,
        api_base: impl Into<String>,
        access_token: Option<String>,
        shared_link: Option<String>,
    ) -> FolderProvider {
        FolderProvider {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token,
            shared_link,
        }
    }

    /// All folders directly under the configured shared link.
    pub async fn list_folders(&self) -> Result<Vec<Folder>, UpstreamError> {
        let shared_link = self
            .shared_link
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("shared link"))?;
        let base = shared_base(shared_link);

        let folders = self
            .list_entries(shared_link, "")
            .await?
            .into_iter()
            .filter(|e| e.kind == EntryKind::Folder)
            .map(|e| Folder {
                link: folder_link(base, &e.name),
                id: e.id,
                name: e.name,
                path_hint: e.path_hint,
            })
            .collect();

        Ok(folders)
    }

    /// Files (and subfolders) inside `folder`.
    pub async fn list_files(&self, folder: &Folder) -> Result<Vec<Entry>, UpstreamError> {
        self.list_entries(&folder.link, "").await
    }

    /// Entries at `path` under the shared link `link`.
    pub async fn list_entries(&self, link: &str, path: &str) -> Result<Vec<Entry>, UpstreamError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("access token"))?;

        let body = json!({
            "path": path,
            "shared_link": { "url": link },
        });

        let request = Request::post(format!("{}/2/files/list_folder", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
            .body(serde_json::to_vec(&body)?)?;

        let mut response = self.http_client.send_async(request).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let error = upstream_error(status, &text);
            log::warn!("Listing of {link} failed: {error}");
            return Err(error);
        }

        parse_entries(&text)
    }
}

/// Turn a successful `list_folder` body into entries. Entries of unknown
/// kind (such as deleted ones) are skipped.
fn parse_entries(body: &str) -> Result<Vec<Entry>, UpstreamError> {
    let listing: ListFolder = serde_json::from_str(body)?;

    Ok(listing
        .entries
        .into_iter()
        .filter_map(|raw| {
            let kind = match raw.tag.as_str() {
                "folder" => EntryKind::Folder,
                "file" => EntryKind::File,
                _ => return None,
            };
            Some(Entry {
                id: raw.id.unwrap_or_else(|| raw.name.clone()),
                name: raw.name,
                path_hint: raw.path_lower,
                kind,
            })
        })
        .collect())
}

/// Classify a failed `list_folder` call.
fn upstream_error(status: StatusCode, body: &str) -> UpstreamError {
    let restricted = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/path/.tag")
                .and_then(Value::as_str)
                .map(|t| t == "restricted_content")
        })
        .unwrap_or(false);

    if restricted {
        UpstreamError::RestrictedContent
    } else {
        UpstreamError::Api(
            status
                .canonical_reason()
                .unwrap_or_else(|| status.as_str())
                .to_string(),
        )
    }
}

/// Shared link without its query string.
pub fn shared_base(shared_link: &str) -> &str {
    shared_link.split('?').next().unwrap_or(shared_link)
}

/// Browsable link of a folder named `name` directly under `base`.
pub fn folder_link(base: &str, name: &str) -> String {
    format!("{base}/{}?e=1&dl=0", urlencoding::encode(name))
}

#[cfg(test)]
mod test {
    use isahc::http::StatusCode;

    use super::*;

    #[test]
    fn entries_are_classified() {
        let body = r#"{
            "entries": [
                {".tag": "folder", "id": "id:a", "name": "Live Sets", "path_lower": "/live sets"},
                {".tag": "file", "id": "id:b", "name": "cover.jpg"},
                {".tag": "deleted", "name": "gone"}
            ],
            "cursor": "x",
            "has_more": false
        }"#;

        let entries = parse_entries(body).unwrap();

        assert_eq!(
            entries,
            vec![
                Entry {
                    id: "id:a".to_string(),
                    name: "Live Sets".to_string(),
                    path_hint: Some("/live sets".to_string()),
                    kind: EntryKind::Folder,
                },
                Entry {
                    id: "id:b".to_string(),
                    name: "cover.jpg".to_string(),
                    path_hint: None,
                    kind: EntryKind::File,
                },
            ]
        );
    }

    #[test]
    fn restricted_content_is_told_apart() {
        let body = r#"{"error_summary": "path/restricted_content/",
                       "error": {".tag": "path", "path": {".tag": "restricted_content"}}}"#;
        assert!(matches!(
            upstream_error(StatusCode::CONFLICT, body),
            UpstreamError::RestrictedContent
        ));

        let other = r#"{"error": {".tag": "path", "path": {".tag": "not_found"}}}"#;
        match upstream_error(StatusCode::CONFLICT, other) {
            UpstreamError::Api(reason) => assert_eq!(reason, "Conflict"),
            e => panic!("unexpected {e:?}"),
        }

        assert!(matches!(
            upstream_error(StatusCode::BAD_GATEWAY, "<html>"),
            UpstreamError::Api(_)
        ));
    }

    #[test]
    fn folder_links_drop_query_and_encode_name() {
        let link = "https://www.dropbox.com/scl/fo/abc/xyz?rlkey=k&dl=0";
        let base = shared_base(link);
        assert_eq!(base, "https://www.dropbox.com/scl/fo/abc/xyz");
        assert_eq!(
            folder_link(base, "Live Sets & B-sides"),
            "https://www.dropbox.com/scl/fo/abc/xyz/Live%20Sets%20%26%20B-sides?e=1&dl=0"
        );
    }
}
