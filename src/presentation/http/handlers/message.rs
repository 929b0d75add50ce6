//! Message Handlers

use axum::{
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::application::dto::{HistoryQuery, HistoryResponse, MessageResponse, SendMessageRequest};
use crate::application::services::CreateMessageDto;
use crate::presentation::http::extractors::{parse_id, AuthUser};
use crate::shared::error::AppError;
use crate::shared::validation::validate_request;
use crate::startup::AppState;

/// Response header naming the history tier that answered
pub const HISTORY_SOURCE_HEADER: &str = "x-history-source";

/// Get one page of a chat's history
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, AppError> {
    let chat_id = parse_id(&chat_id, "chat")?;
    let params = query.into_params(state.settings.history.default_page_limit)?;

    let page = state
        .messages
        .list_history(auth.user_id, chat_id, params)
        .await?;

    let source = HeaderValue::from_static(page.source.as_str());
    Ok((
        [(HeaderName::from_static(HISTORY_SOURCE_HEADER), source)],
        Json(HistoryResponse::from(page)),
    )
        .into_response())
}

/// Send message to chat
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let chat_id = parse_id(&chat_id, "chat")?;
    validate_request(&body)?;

    let message = state
        .messages
        .create(
            auth.user_id,
            CreateMessageDto {
                chat_id,
                text: body.text,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}
