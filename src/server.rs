use std::net::ToSocketAddrs;

use actix_web::http::StatusCode;
use actix_web::middleware::Logger;
use actix_web::web::{self, Bytes};
use actix_web::{App, HttpResponse, HttpServer, ResponseError};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{StoreError, TagStore};
use crate::tagset::TagSet;

/// Errors answered to HTTP clients. Messages are generic,
/// the underlying cause only goes to the log.
#[derive(Debug, Error, Diagnostic)]
pub enum ServerError {
    #[error("Missing folderId")]
    MissingFolderId,

    #[error("Invalid tags payload")]
    InvalidPayload,

    #[error("Failed to fetch tags")]
    Fetch,

    #[error("Failed to save tags")]
    Save,

    #[error("Method not allowed")]
    MethodNotAllowed,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::MissingFolderId | ServerError::InvalidPayload => StatusCode::BAD_REQUEST,
            ServerError::Fetch | ServerError::Save => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

impl ServerError {
    fn from_store(error: StoreError, otherwise: ServerError) -> ServerError {
        if error.is_validation() {
            ServerError::MissingFolderId
        } else {
            log::error!("{otherwise}: {error:?}");
            otherwise
        }
    }
}

/// Body of `POST /tags/{folderId}`. Missing or `null` tags mean no tags.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsBody {
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Answer of `GET /tags/{folderId}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TagsResponse {
    pub tags: TagSet,
}

/// Answer of `POST /tags/{folderId}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedResponse {
    pub success: bool,
    pub tags: TagSet,
}

/// Folder named in the query string, as in `/tags?folderId=...`.
#[derive(Debug, Deserialize)]
struct FolderQuery {
    #[serde(rename = "folderId")]
    folder_id: Option<String>,
}

impl FolderQuery {
    fn folder_id(&self) -> Result<&str, ServerError> {
        match self.folder_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(ServerError::MissingFolderId),
        }
    }
}

async fn fetch(store: &TagStore, folder_id: &str) -> Result<HttpResponse, ServerError> {
    let tags = store
        .get_tags(folder_id)
        .await
        .map_err(|e| ServerError::from_store(e, ServerError::Fetch))?;

    Ok(HttpResponse::Ok().json(TagsResponse { tags }))
}

async fn save(store: &TagStore, folder_id: &str, body: &[u8]) -> Result<HttpResponse, ServerError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        TagsBody::default()
    } else {
        serde_json::from_slice::<TagsBody>(body).map_err(|e| {
            log::debug!("Rejected tags payload for {folder_id}: {e}");
            ServerError::InvalidPayload
        })?
    };

    let tags = store
        .set_tags(folder_id, body.tags)
        .await
        .map_err(|e| ServerError::from_store(e, ServerError::Save))?;

    Ok(HttpResponse::Ok().json(SavedResponse {
        success: true,
        tags,
    }))
}

async fn get_tags(
    store: web::Data<TagStore>,
    folder_id: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    fetch(&store, &folder_id).await
}

async fn set_tags(
    store: web::Data<TagStore>,
    folder_id: web::Path<String>,
    body: Bytes,
) -> Result<HttpResponse, ServerError> {
    save(&store, &folder_id, &body).await
}

async fn get_tags_by_query(
    store: web::Data<TagStore>,
    query: web::Query<FolderQuery>,
) -> Result<HttpResponse, ServerError> {
    fetch(&store, query.folder_id()?).await
}

async fn set_tags_by_query(
    store: web::Data<TagStore>,
    query: web::Query<FolderQuery>,
    body: Bytes,
) -> Result<HttpResponse, ServerError> {
    save(&store, query.folder_id()?, &body).await
}

async fn method_not_allowed() -> Result<HttpResponse, ServerError> {
    Err(ServerError::MethodNotAllowed)
}

async fn all_tags(store: web::Data<TagStore>) -> Result<HttpResponse, ServerError> {
    let tags = store
        .all_tags()
        .await
        .map_err(|e| ServerError::from_store(e, ServerError::Fetch))?;

    Ok(HttpResponse::Ok().json(tags))
}

/// Register tag routes. Folders are addressed by path or by the `folderId`
/// query parameter. The store has to be available as `web::Data<TagStore>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/tags/{folder_id}")
            .route(web::get().to(get_tags))
            .route(web::post().to(set_tags))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource(["/tags", "/tags/"])
            .route(web::get().to(get_tags_by_query))
            .route(web::post().to(set_tags_by_query))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/all-tags")
            .route(web::get().to(all_tags))
            .default_service(web::to(method_not_allowed)),
    );
}

/// Run the tag service on `listen` until the process is stopped.
pub async fn serve<A: ToSocketAddrs>(store: TagStore, listen: A) -> std::io::Result<()> {
    let data = web::Data::new(store);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(data.clone())
            .configure(configure)
    })
    .bind(listen)?;

    for addr in server.addrs() {
        log::info!("Tag service listening on http://{addr}");
    }

    server.run().await
}
