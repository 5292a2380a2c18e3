#![allow(dead_code)]

use std::net::TcpListener;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use harmonia::server;
use harmonia::store::TagStore;
use serde::Deserialize;
use serde_json::json;

pub const TOKEN: &str = "secret-token";
pub const ROOT_LINK: &str = "https://www.dropbox.com/scl/fo/library?rlkey=k&dl=0";

pub fn tags(t: &[&str]) -> Option<Vec<String>> {
    Some(t.iter().map(|s| s.to_string()).collect())
}

/// Tag service application over `store`.
pub fn tag_app(
    store: &TagStore,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(web::Data::new(store.clone()))
        .configure(server::configure)
}

#[derive(Deserialize)]
struct ListFolderRequest {
    shared_link: SharedLink,
}

#[derive(Deserialize)]
struct SharedLink {
    url: String,
}

/// Stand-in for Dropbox `files/list_folder`. The shared library holds three
/// folders and a file; "Restricted Set" cannot be listed.
async fn list_folder(req: HttpRequest, body: web::Json<ListFolderRequest>) -> HttpResponse {
    let authorized = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {TOKEN}"))
        .unwrap_or(false);

    if !authorized {
        return HttpResponse::Unauthorized()
            .json(json!({"error_summary": "invalid_access_token/", "error": {".tag": "invalid_access_token"}}));
    }

    let url = body.shared_link.url.as_str();

    if url == ROOT_LINK {
        HttpResponse::Ok().json(json!({
            "entries": [
                {".tag": "folder", "id": "id:jazz", "name": "Blue Note", "path_lower": "/blue note"},
                {".tag": "folder", "id": "id:rock", "name": "Grunge", "path_lower": "/grunge"},
                {".tag": "folder", "id": "id:secret", "name": "Restricted Set", "path_lower": "/restricted set"},
                {".tag": "file", "id": "id:readme", "name": "readme.txt", "path_lower": "/readme.txt"}
            ],
            "cursor": "c1",
            "has_more": false
        }))
    } else if url.contains("Restricted%20Set") {
        HttpResponse::Conflict().json(json!({
            "error_summary": "path/restricted_content/",
            "error": {".tag": "path", "path": {".tag": "restricted_content"}}
        }))
    } else {
        HttpResponse::Ok().json(json!({
            "entries": [
                {".tag": "file", "id": "id:t1", "name": "track01.flac"},
                {".tag": "file", "id": "id:t2", "name": "track02.flac"}
            ],
            "cursor": "c2",
            "has_more": false
        }))
    }
}

/// Bind a real server with the tag service and a fake Dropbox API,
/// returning its base URL.
pub async fn start_server(store: TagStore) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");

    actix_web::rt::spawn(async move {
        let _ = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(store.clone()))
                .configure(server::configure)
                .route("/2/files/list_folder", web::post().to(list_folder))
        })
        .workers(1)
        .listen(listener)
        .expect("listen")
        .run()
        .await;
    });

    format!("http://{addr}")
}
