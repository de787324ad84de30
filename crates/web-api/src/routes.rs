use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartError, rejection::BytesRejection, ws::WebSocketUpgrade,
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use application::{
    conversations_dto, ConversationsDto, CreateListingRequest, ListingDto, ListingPage,
    ListingPageDto, ListingQuery, MediaUpload, MessageDto, PresenceDto, RatingDto,
    SendMessageRequest,
};
use domain::{DomainError, MediaRef};

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

/// 表单字段的余量，文件本身仍受媒体大小上限约束
const MULTIPART_FIELD_ALLOWANCE: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct CreateListingPayload {
    /// 缺失时按空串处理，交给领域校验给出具体错误
    #[serde(default)]
    owner: String,
    #[serde(default)]
    title: String,
    description: Option<String>,
    price: Option<String>,
    media_ref: Option<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct RemoveListingPayload {
    #[serde(default)]
    requester: String,
}

#[derive(Debug, Deserialize)]
struct RatePayload {
    rating: i64,
}

#[derive(Debug, Deserialize)]
struct RateByIdPayload {
    id: Uuid,
    rating: i64,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ListingsQuery {
    offset: Option<usize>,
    after: Option<Uuid>,
    limit: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    let media_limit = state.media_max_bytes;
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes(media_limit))
        .with_state(state)
}

fn api_routes(media_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/listings", get(list_listings).post(create_listing))
        .route("/listings/{id}", get(get_listing).delete(remove_listing))
        .route("/listings/{id}/ratings", post(rate_listing))
        .route("/ratings", post(rate_by_id))
        .route(
            "/media",
            post(upload_media).layer(DefaultBodyLimit::max(media_limit)),
        )
        .route(
            "/upload",
            post(upload_listing).layer(DefaultBodyLimit::max(
                media_limit.saturating_add(MULTIPART_FIELD_ALLOWANCE),
            )),
        )
        .route("/messages", post(send_message))
        .route("/conversations/{identity}", get(get_conversations))
        .route("/presence/{identity}", get(get_presence))
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<ListingPageDto>, ApiError> {
    let page = state
        .listing_service
        .browse(ListingQuery {
            offset: query.offset,
            after: query.after,
            limit: query.limit,
        })
        .await?;

    let dto = match &page {
        ListingPage::Offset(page) => ListingPageDto::from(page),
        ListingPage::Cursor(page) => ListingPageDto::from(page),
    };
    Ok(Json(dto))
}

async fn create_listing(
    State(state): State<AppState>,
    Json(payload): Json<CreateListingPayload>,
) -> Result<(StatusCode, Json<ListingDto>), ApiError> {
    let listing = state
        .listing_service
        .create_listing(CreateListingRequest {
            owner: payload.owner,
            title: payload.title,
            description: payload.description,
            price: payload.price,
            media: payload.media_ref,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ListingDto::from(&listing))))
}

async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingDto>, ApiError> {
    let listing = state.listing_service.get_listing(id).await?;
    Ok(Json(ListingDto::from(&listing)))
}

async fn remove_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemoveListingPayload>,
) -> Result<StatusCode, ApiError> {
    state
        .listing_service
        .remove(id, &payload.requester)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn rate_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatePayload>,
) -> Result<Json<RatingDto>, ApiError> {
    let rating = state.listing_service.rate(id, payload.rating).await?;
    Ok(Json(RatingDto::from(rating)))
}

async fn rate_by_id(
    State(state): State<AppState>,
    Json(payload): Json<RateByIdPayload>,
) -> Result<Json<RatingDto>, ApiError> {
    let rating = state
        .listing_service
        .rate(payload.id, payload.rating)
        .await?;
    Ok(Json(RatingDto::from(rating)))
}

async fn upload_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<MediaRef>), ApiError> {
    let body = body.map_err(|rejection| {
        let status = rejection.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "MEDIA_TOO_LARGE"
        } else {
            "INVALID_BODY"
        };
        ApiError::new(status, code, rejection.body_text())
    })?;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let media = state
        .listing_service
        .upload_media(MediaUpload {
            bytes: body.to_vec(),
            content_type,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(media)))
}

/// 一次请求完成校验、媒体写入和商品创建
async fn upload_listing(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ListingDto>), ApiError> {
    let mut request = CreateListingRequest::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some(MediaUpload {
                    bytes: bytes.to_vec(),
                    content_type,
                });
            }
            "owner" => request.owner = field.text().await.map_err(multipart_error)?,
            "title" => request.title = field.text().await.map_err(multipart_error)?,
            "description" => {
                request.description = Some(field.text().await.map_err(multipart_error)?)
            }
            "price" => request.price = Some(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!(field = other, "忽略未知表单字段"),
        }
    }

    let upload = upload.ok_or_else(|| ApiError::from(DomainError::missing_field("file")))?;
    let listing = state
        .listing_service
        .create_listing_with_upload(request, upload)
        .await?;

    Ok((StatusCode::CREATED, Json(ListingDto::from(&listing))))
}

fn multipart_error(rejection: MultipartError) -> ApiError {
    let status = rejection.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "MEDIA_TOO_LARGE"
    } else {
        "INVALID_BODY"
    };
    ApiError::new(status, code, rejection.body_text())
}

async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let message = state
        .conversation_service
        .send_message(SendMessageRequest {
            from: payload.from,
            to: payload.to,
            content: payload.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(MessageDto::from(&message))))
}

async fn get_conversations(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<ConversationsDto>, ApiError> {
    let history = state.conversation_service.history(&identity).await?;
    Ok(Json(conversations_dto(&history)))
}

async fn get_presence(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<PresenceDto>, ApiError> {
    let presence = state.conversation_service.presence(&identity).await?;
    Ok(Json(PresenceDto { identity, state: presence }))
}

async fn websocket_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        WebSocketConnection::open(socket, state).await.run().await;
    })
}
