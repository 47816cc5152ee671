//! Public and private chat endpoints.
//!
//! GET returns session history; POST appends the caller's turn, runs
//! an orchestrated generation, and answers either as a framed event
//! stream or as a single JSON object. The assistant turn is persisted
//! by the stream's finalize callback, which fires on generation
//! completion regardless of whether the caller is still connected.

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use futures::StreamExt;
use jal_mittar_conversation::{
    flatten_parts, LanguagePreference, MessagePart, MessageRole, Session, SessionKind, ToolSet,
};
use jal_mittar_core::SessionId;
use jal_mittar_stream::{relay, FinishCallback, StreamMode};
use jal_mittar_ai::Turn;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

const PUBLIC_SESSION_COOKIE: &str = "public-chat-session-id";
const PRIVATE_SESSION_COOKIE: &str = "private-chat-session-id";

#[derive(Debug, Deserialize)]
pub struct PrivateQuery {
    pub user_id: String,
    pub lang: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// `stream=0` or `stream=false` selects the JSON response form.
    pub stream: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub messages: Vec<IncomingMessage>,
}

fn parse_role(role: &str) -> Option<MessageRole> {
    match role {
        "user" => Some(MessageRole::User),
        "assistant" => Some(MessageRole::Assistant),
        "system" => Some(MessageRole::System),
        _ => None,
    }
}

fn parse_language(lang: &str) -> Result<LanguagePreference, ApiError> {
    match lang {
        "en" => Ok(LanguagePreference::English),
        "hi" => Ok(LanguagePreference::Hindi),
        _ => Err(ApiError::bad_request("Invalid query")),
    }
}

/// Flattened text of one incoming message.
fn message_text(message: &IncomingMessage) -> String {
    match (&message.content, &message.parts) {
        (Some(content), _) if !content.is_empty() => content.clone(),
        (_, Some(parts)) => flatten_parts(parts),
        _ => String::new(),
    }
}

fn history_json(messages: &[jal_mittar_conversation::Message]) -> JsonValue {
    let messages: Vec<JsonValue> = messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": m.role,
                "parts": m.parts,
            })
        })
        .collect();
    serde_json::json!({ "messages": messages })
}

/// Resolves the caller's session, creating one (and its cookie) on
/// first contact. The private flow falls back to owner lookup before
/// creating, so a lost cookie does not orphan the history.
async fn resolve_session(
    state: &AppState,
    jar: CookieJar,
    kind: SessionKind,
    language: Option<LanguagePreference>,
    owner_id: Option<String>,
) -> Result<(Session, CookieJar), ApiError> {
    let cookie_name = match kind {
        SessionKind::Public => PUBLIC_SESSION_COOKIE,
        SessionKind::Private => PRIVATE_SESSION_COOKIE,
    };

    if let Some(cookie) = jar.get(cookie_name) {
        if let Ok(id) = cookie.value().parse::<SessionId>() {
            if let Some(session) = state.sessions.get(id).await? {
                return Ok((session, jar));
            }
        }
    }

    if let Some(owner) = owner_id.as_deref() {
        if let Some(session) = state.sessions.find_by_owner(kind, owner).await? {
            let jar = set_session_cookie(state, jar, cookie_name, session.id);
            return Ok((session, jar));
        }
    }

    let session = state
        .sessions
        .create(kind, language, owner_id, None)
        .await?;
    let jar = set_session_cookie(state, jar, cookie_name, session.id);
    Ok((session, jar))
}

fn set_session_cookie(
    state: &AppState,
    jar: CookieJar,
    name: &'static str,
    id: SessionId,
) -> CookieJar {
    let cookie = Cookie::build((name, id.to_string()))
        .path("/")
        .secure(state.secure_cookies)
        .build();
    jar.add(cookie)
}

pub async fn get_public_chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let (session, jar) =
        resolve_session(&state, jar, SessionKind::Public, None, None).await?;
    let messages = state.messages.list(session.id).await?;
    Ok((jar, Json(history_json(&messages))))
}

pub async fn get_private_chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<PrivateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("Invalid query"));
    }
    let language = parse_language(&query.lang)?;
    let (session, jar) = resolve_session(
        &state,
        jar,
        SessionKind::Private,
        Some(language),
        Some(query.user_id),
    )
    .await?;
    let messages = state.messages.list(session.id).await?;
    Ok((jar, Json(history_json(&messages))))
}

pub async fn post_public_chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(stream_query): Query<StreamQuery>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Result<Response, ApiError> {
    let turns = validate_body(&body)?;
    let (session, jar) =
        resolve_session(&state, jar, SessionKind::Public, None, None).await?;
    let tools = state.public_tools(session.language_preference);
    respond(state, jar, session, body, turns, tools, &stream_query, &headers, None).await
}

pub async fn post_private_chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<PrivateQuery>,
    Query(stream_query): Query<StreamQuery>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Result<Response, ApiError> {
    if query.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("Invalid query"));
    }
    let language = parse_language(&query.lang)?;
    let turns = validate_body(&body)?;
    let (session, jar) = resolve_session(
        &state,
        jar,
        SessionKind::Private,
        Some(language),
        Some(query.user_id.clone()),
    )
    .await?;
    let tools = state.private_tools(&query.user_id, session.language_preference.or(Some(language)));
    respond(
        state,
        jar,
        session,
        body,
        turns,
        tools,
        &stream_query,
        &headers,
        Some(query.user_id),
    )
    .await
}

/// Validates the POST body and converts it into generator turns.
fn validate_body(body: &ChatBody) -> Result<Vec<Turn>, ApiError> {
    let mut turns = Vec::with_capacity(body.messages.len());
    for message in &body.messages {
        let Some(role) = parse_role(&message.role) else {
            return Err(ApiError::bad_request("Invalid body"));
        };
        turns.push(Turn {
            role,
            content: message_text(message),
        });
    }
    match body.messages.last() {
        Some(last) if last.role == "user" => Ok(turns),
        _ => Err(ApiError::bad_request("Last message must be from user")),
    }
}

fn wants_json(stream_query: &StreamQuery, headers: &HeaderMap) -> bool {
    if matches!(stream_query.stream.as_deref(), Some("0") | Some("false")) {
        return true;
    }
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

/// Builds the finalize callback that persists the assistant turn.
///
/// Persistence failures are logged and swallowed: they must never
/// abort delivery of a response already produced.
fn persist_assistant_turn(
    state: &Arc<AppState>,
    session_id: SessionId,
    author_id: Option<String>,
) -> FinishCallback {
    let messages = Arc::clone(&state.messages);
    Box::new(move |text: String| {
        Box::pin(async move {
            let parts = vec![MessagePart::text(text.clone())];
            if let Err(err) = messages
                .append(session_id, MessageRole::Assistant, parts, text, author_id)
                .await
            {
                tracing::warn!(error = %err, %session_id, "failed to persist assistant turn");
            }
        })
    })
}

#[allow(clippy::too_many_arguments)]
async fn respond(
    state: Arc<AppState>,
    jar: CookieJar,
    session: Session,
    body: ChatBody,
    turns: Vec<Turn>,
    tools: ToolSet,
    stream_query: &StreamQuery,
    headers: &HeaderMap,
    author_id: Option<String>,
) -> Result<Response, ApiError> {
    // The caller's turn is durable before generation begins; failures
    // are logged and swallowed rather than aborting the response.
    let last = body.messages.last().ok_or_else(|| ApiError::bad_request("Invalid body"))?;
    let text = message_text(last);
    // `text` is the flattened cache of the stored parts; when `content`
    // takes precedence over differing `parts`, re-derive the parts so
    // the two stay in agreement.
    let parts = match &last.parts {
        Some(parts) if flatten_parts(parts) == text => parts.clone(),
        _ => vec![MessagePart::text(text.clone())],
    };
    if let Err(err) = state
        .messages
        .append(
            session.id,
            MessageRole::User,
            parts,
            text,
            author_id.clone(),
        )
        .await
    {
        tracing::warn!(error = %err, session_id = %session.id, "failed to persist user turn");
    }

    let events = state.orchestrator.run(turns, tools).await;
    let on_finish = persist_assistant_turn(&state, session.id, author_id);

    if wants_json(stream_query, headers) {
        let (tx, rx) = tokio::sync::oneshot::channel::<String>();
        let persist = on_finish;
        let callback: FinishCallback = Box::new(move |text: String| {
            Box::pin(async move {
                persist(text.clone()).await;
                let _ = tx.send(text);
            })
        });
        let mut frames = std::pin::pin!(relay(events, StreamMode::Plain, callback));
        while frames.next().await.is_some() {}
        let text = rx.await.unwrap_or_default();
        return Ok((jar, Json(serde_json::json!({ "text": text }))).into_response());
    }

    // The generation task is detached from the transport: persistence
    // happens even if the receiver side goes away mid-stream.
    let cancel_on_disconnect = state.cancel_on_disconnect;
    let (tx, rx) = tokio::sync::mpsc::channel::<String>(32);
    tokio::spawn(async move {
        let mut frames = std::pin::pin!(relay(events, StreamMode::Framed, on_finish));
        let mut forwarding = true;
        while let Some(frame) = frames.next().await {
            if forwarding && tx.send(frame).await.is_err() {
                if cancel_on_disconnect {
                    tracing::debug!("client disconnected, aborting generation");
                    return;
                }
                forwarding = false;
            }
        }
    });

    let response_body =
        Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, std::convert::Infallible>));
    let response = (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        response_body,
    )
        .into_response();
    Ok((jar, response).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use async_trait::async_trait;
    use jal_mittar_ai::{
        GenerateRequest, GenerationEvent, GenerationStream, GeneratorError, TextGenerator,
    };
    use jal_mittar_conversation::{
        MemoryMessageLog, MemorySessionStore, Message, MessageLog, StoreError,
    };
    use std::time::Duration;
    use jal_mittar_tools::{
        BillingSigner, CertificateClient, Embedder, RetrievalError, RetrievedChunk,
        SimilaritySearch,
    };

    struct ScriptedGenerator;

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _: GenerateRequest) -> Result<String, GeneratorError> {
            Ok(r#"{"isRelevant": true}"#.to_string())
        }

        async fn stream(&self, _: GenerateRequest) -> Result<GenerationStream, GeneratorError> {
            Ok(Box::pin(futures::stream::iter(vec![
                Ok(GenerationEvent::TextDelta("Namaste, ".to_string())),
                Ok(GenerationEvent::TextDelta("how can I help?".to_string())),
                Ok(GenerationEvent::Completed {
                    text: "Namaste, how can I help?".to_string(),
                }),
            ])))
        }
    }

    struct NoEmbedder;

    #[async_trait]
    impl Embedder for NoEmbedder {
        async fn embed(&self, _: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(vec![0.0])
        }
    }

    struct NoSearch;

    #[async_trait]
    impl SimilaritySearch for NoSearch {
        async fn search(&self, _: &[f32]) -> Result<Vec<RetrievedChunk>, RetrievalError> {
            Ok(Vec::new())
        }
    }

    /// Generator double that pauses mid-stream until released.
    struct GatedGenerator {
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl TextGenerator for GatedGenerator {
        async fn generate(&self, _: GenerateRequest) -> Result<String, GeneratorError> {
            Ok(r#"{"isRelevant": true}"#.to_string())
        }

        async fn stream(&self, _: GenerateRequest) -> Result<GenerationStream, GeneratorError> {
            let release = Arc::clone(&self.release);
            let (tx, rx) = tokio::sync::mpsc::channel(4);
            tokio::spawn(async move {
                let _ = tx
                    .send(Ok(GenerationEvent::TextDelta("Checking ".to_string())))
                    .await;
                release.notified().await;
                let _ = tx
                    .send(Ok(GenerationEvent::TextDelta("records.".to_string())))
                    .await;
                let _ = tx
                    .send(Ok(GenerationEvent::Completed {
                        text: "Checking records.".to_string(),
                    }))
                    .await;
            });
            Ok(Box::pin(ReceiverStream::new(rx)))
        }
    }

    /// Message log double whose appends always fail.
    struct RefusingLog;

    #[async_trait]
    impl MessageLog for RefusingLog {
        async fn append(
            &self,
            _session_id: SessionId,
            _role: MessageRole,
            _parts: Vec<MessagePart>,
            _text: String,
            _author_id: Option<String>,
        ) -> Result<Message, StoreError> {
            Err(StoreError::QueryFailed {
                reason: "connection reset".to_string(),
            })
        }

        async fn list(&self, _session_id: SessionId) -> Result<Vec<Message>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn test_state_with(
        generator: Arc<dyn TextGenerator>,
        messages: Arc<dyn MessageLog>,
        chat: ChatConfig,
    ) -> Arc<AppState> {
        let http = reqwest::Client::new();
        Arc::new(AppState::from_parts(
            Arc::new(MemorySessionStore::new()),
            messages,
            generator,
            Arc::new(NoEmbedder),
            Arc::new(NoSearch),
            CertificateClient::new(http.clone(), "http://edistrict.invalid"),
            BillingSigner::new("client-1", None),
            http,
            "http://api.invalid",
            "http://portal.invalid",
            chat,
        ))
    }

    fn test_state() -> Arc<AppState> {
        test_state_with(
            Arc::new(ScriptedGenerator),
            Arc::new(MemoryMessageLog::new()),
            ChatConfig {
                cancel_on_disconnect: false,
                secure_cookies: false,
            },
        )
    }

    async fn wait_for_rows(state: &AppState, session_id: SessionId, want: usize) -> Vec<Message> {
        for _ in 0..200 {
            let rows = state.messages.list(session_id).await.expect("list");
            if rows.len() >= want {
                return rows;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {want} rows");
    }

    fn user_body(text: &str) -> Json<ChatBody> {
        Json(ChatBody {
            messages: vec![IncomingMessage {
                role: "user".to_string(),
                content: Some(text.to_string()),
                parts: None,
            }],
        })
    }

    fn session_id_from_cookie(response: &Response) -> SessionId {
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("cookie set");
        let value = set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.split('=').nth(1))
            .expect("cookie value");
        value.parse().expect("session id")
    }

    fn json_accept() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "application/json".parse().expect("header"));
        headers
    }

    #[tokio::test]
    async fn post_appends_user_then_assistant_rows_in_order() {
        let state = test_state();
        let response = post_public_chat(
            State(Arc::clone(&state)),
            CookieJar::new(),
            Query(StreamQuery::default()),
            json_accept(),
            user_body("How do I apply for a water connection?"),
        )
        .await
        .expect("handler succeeds")
        .into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let session_id = session_id_from_cookie(&response);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json: JsonValue = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(json["text"], "Namaste, how can I help?");

        let rows = state.messages.list(session_id).await.expect("list");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, MessageRole::User);
        assert_eq!(rows[0].text, "How do I apply for a water connection?");
        assert_eq!(rows[1].role, MessageRole::Assistant);
        assert_eq!(rows[1].text, "Namaste, how can I help?");
    }

    #[tokio::test]
    async fn streamed_post_frames_deltas_and_done() {
        let state = test_state();
        let response = post_public_chat(
            State(Arc::clone(&state)),
            CookieJar::new(),
            Query(StreamQuery::default()),
            HeaderMap::new(),
            user_body("hello"),
        )
        .await
        .expect("handler succeeds")
        .into_response();

        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("text/event-stream")
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(text.contains("data: {\"textDelta\":\"Namaste, \"}\n\n"));
        assert!(text.ends_with("data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn last_message_must_be_from_user() {
        let body = ChatBody {
            messages: vec![IncomingMessage {
                role: "assistant".to_string(),
                content: Some("hi".to_string()),
                parts: None,
            }],
        };
        let err = validate_body(&body).expect_err("assistant-last rejected");
        assert!(matches!(err, ApiError::BadRequest { .. }));

        let empty = ChatBody { messages: vec![] };
        assert!(validate_body(&empty).is_err());
    }

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        let body = ChatBody {
            messages: vec![IncomingMessage {
                role: "robot".to_string(),
                content: Some("hi".to_string()),
                parts: None,
            }],
        };
        assert!(validate_body(&body).is_err());
    }

    #[tokio::test]
    async fn private_post_requires_valid_language() {
        let state = test_state();
        let result = post_private_chat(
            State(state),
            CookieJar::new(),
            Query(PrivateQuery {
                user_id: "user-9".to_string(),
                lang: "fr".to_string(),
            }),
            Query(StreamQuery::default()),
            json_accept(),
            user_body("bonjour"),
        )
        .await;
        assert!(matches!(result, Err(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn get_sets_a_session_cookie_on_first_contact() {
        let state = test_state();
        let response = get_public_chat(State(state), CookieJar::new())
            .await
            .expect("handler succeeds")
            .into_response();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("cookie set");
        assert!(set_cookie.starts_with("public-chat-session-id=sess_"));
    }

    #[tokio::test]
    async fn disconnected_client_still_gets_assistant_turn_persisted() {
        let release = Arc::new(tokio::sync::Notify::new());
        let state = test_state_with(
            Arc::new(GatedGenerator {
                release: Arc::clone(&release),
            }),
            Arc::new(MemoryMessageLog::new()),
            ChatConfig {
                cancel_on_disconnect: false,
                secure_cookies: false,
            },
        );

        let response = post_public_chat(
            State(Arc::clone(&state)),
            CookieJar::new(),
            Query(StreamQuery::default()),
            HeaderMap::new(),
            user_body("where is my application?"),
        )
        .await
        .expect("handler succeeds")
        .into_response();
        let session_id = session_id_from_cookie(&response);

        // The client goes away while generation is paused mid-stream.
        drop(response);
        release.notify_one();

        let rows = wait_for_rows(&state, session_id, 2).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].role, MessageRole::Assistant);
        assert_eq!(rows[1].text, "Checking records.");
    }

    #[tokio::test]
    async fn cancel_on_disconnect_abandons_the_in_flight_turn() {
        let release = Arc::new(tokio::sync::Notify::new());
        let state = test_state_with(
            Arc::new(GatedGenerator {
                release: Arc::clone(&release),
            }),
            Arc::new(MemoryMessageLog::new()),
            ChatConfig {
                cancel_on_disconnect: true,
                secure_cookies: false,
            },
        );

        let response = post_public_chat(
            State(Arc::clone(&state)),
            CookieJar::new(),
            Query(StreamQuery::default()),
            HeaderMap::new(),
            user_body("where is my application?"),
        )
        .await
        .expect("handler succeeds")
        .into_response();
        let session_id = session_id_from_cookie(&response);

        drop(response);
        release.notify_one();

        // Generation is aborted on the first undeliverable frame, so
        // only the caller's turn ever reaches the log.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let rows = state.messages.list(session_id).await.expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn append_failures_never_abort_delivery() {
        let state = test_state_with(
            Arc::new(ScriptedGenerator),
            Arc::new(RefusingLog),
            ChatConfig {
                cancel_on_disconnect: false,
                secure_cookies: false,
            },
        );

        let response = post_public_chat(
            State(state),
            CookieJar::new(),
            Query(StreamQuery::default()),
            json_accept(),
            user_body("hello"),
        )
        .await
        .expect("handler succeeds")
        .into_response();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json: JsonValue = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(json["text"], "Namaste, how can I help?");
    }

    #[tokio::test]
    async fn content_precedence_rederives_the_stored_parts() {
        let state = test_state();
        let body = Json(ChatBody {
            messages: vec![IncomingMessage {
                role: "user".to_string(),
                content: Some("typed text".to_string()),
                parts: Some(vec![MessagePart::text("stale draft")]),
            }],
        });

        let response = post_public_chat(
            State(Arc::clone(&state)),
            CookieJar::new(),
            Query(StreamQuery::default()),
            json_accept(),
            body,
        )
        .await
        .expect("handler succeeds")
        .into_response();

        let session_id = session_id_from_cookie(&response);
        let rows = state.messages.list(session_id).await.expect("list");
        assert_eq!(rows[0].text, "typed text");
        assert_eq!(flatten_parts(&rows[0].parts), rows[0].text);
    }
}
