//! Route handlers. Each one is a thin call into `TesterService`.

use crate::api::*;
use crate::error::ApiError;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use fireglobe_core::relay::AnalysisRequest;
use fireglobe_core::{Error, EvaluationResult, HealthReport, Persona, TransportMode};

type Payload<T> = Result<Json<T>, JsonRejection>;
type ApiResult<T> = Result<Json<T>, ApiError>;

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn body<T>(state: &AppState, payload: Payload<T>) -> Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::from_rejection(state.mode, rejection))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.service.health())
}

pub async fn generate_personalities(
    State(state): State<AppState>,
    payload: Payload<GeneratePersonalitiesRequest>,
) -> ApiResult<GeneratePersonalitiesResponse> {
    let request = body(&state, payload)?;

    let max = state.service.max_personalities();
    let count = match (request.num_personalities, state.mode) {
        (0, TransportMode::PlainHttp) => {
            return Err(ApiError::from_core(
                state.mode,
                Error::invalid_argument("num_personalities must be at least 1")
                    .with_operation("generate_personalities"),
            ))
        }
        (n, TransportMode::PlainHttp) if n > max => {
            return Err(ApiError::from_core(
                state.mode,
                Error::invalid_argument(format!("num_personalities must be at most {}", max))
                    .with_operation("generate_personalities"),
            ))
        }
        (n, TransportMode::MessageProtocol) => n.clamp(1, max),
        (n, TransportMode::PlainHttp) => n,
    };

    let set = state
        .service
        .generate_personalities(&request.agent_description, &request.agent_capabilities, count)
        .await;

    Ok(Json(GeneratePersonalitiesResponse {
        success: true,
        personalities: set.personalities,
        used_fallback: set.used_fallback,
        timestamp: now(),
    }))
}

pub async fn generate_personality_message(
    State(state): State<AppState>,
    payload: Payload<GenerateMessageRequest>,
) -> ApiResult<GenerateMessageResponse> {
    let request = body(&state, payload)?;

    let turn = state
        .service
        .generate_turn(
            &request.personality,
            &request.previous_messages,
            request.is_initial,
            &request.agent_description,
            request.conversation_id.as_deref(),
        )
        .await;

    Ok(Json(GenerateMessageResponse {
        message: turn.message,
        detected_transaction: turn.detected_transaction,
        used_fallback: turn.used_fallback,
    }))
}

pub async fn evaluate_conversation(
    State(state): State<AppState>,
    payload: Payload<EvaluateRequest>,
) -> ApiResult<EvaluationResult> {
    let request = body(&state, payload)?;
    let persona = Persona {
        name: request.personality_name,
        personality: request.personality,
        description: request.description,
    };

    Ok(Json(state.service.evaluate(&persona, &request.messages).await))
}

pub async fn store_conversation(
    State(state): State<AppState>,
    payload: Payload<StoreRequest>,
) -> ApiResult<StoreResponse> {
    let request = body(&state, payload)?;

    let service = state.service.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        service.store_conversation(&request.conversation_id, &request.personality_name, &request.messages)
    })
    .await
    .map_err(|e| ApiError::from_core(state.mode, Error::unexpected(format!("store task failed: {}", e))))?;

    Ok(Json(StoreResponse {
        success: outcome.success,
        filepath: outcome.filepath,
        timestamp: now(),
    }))
}

pub async fn analyze_agent_transaction(
    State(state): State<AppState>,
    payload: Payload<AnalyzeTransactionRequest>,
) -> ApiResult<Ack> {
    let request = body(&state, payload)?;
    let analysis = AnalysisRequest {
        conversation_id: request.conversation_id,
        personality_name: request.personality_name,
        conversation_messages: request.conversation_messages,
        transaction_hash: request.transaction_hash,
        chain_id: request.chain_id,
    };
    let tx_hash = analysis.transaction_hash.clone();

    let ack = match state.service.relay_transaction(analysis) {
        Ok(_handle) => Ack {
            success: true,
            message: format!("Analysis request for {} queued", tx_hash),
            timestamp: now(),
        },
        Err(e) => Ack {
            success: false,
            message: e.message().to_string(),
            timestamp: now(),
        },
    };
    Ok(Json(ack))
}

pub async fn get_transaction_analysis(
    State(state): State<AppState>,
    payload: Payload<GetAnalysisRequest>,
) -> ApiResult<GetAnalysisResponse> {
    let request = body(&state, payload)?;

    let response = match state.service.transaction_analysis(&request.transaction_hash).await {
        Some(found) => GetAnalysisResponse {
            success: true,
            analysis: Some(found.analysis),
            timestamp: Some(found.timestamp),
            message: "Analysis found".to_string(),
        },
        None => GetAnalysisResponse {
            success: false,
            analysis: None,
            timestamp: None,
            message: format!("No analysis available for {}", request.transaction_hash),
        },
    };
    Ok(Json(response))
}

pub async fn transaction_analysis_result(
    State(state): State<AppState>,
    payload: Payload<AnalysisResultRequest>,
) -> ApiResult<Ack> {
    let request = body(&state, payload)?;
    state
        .service
        .record_analysis(&request.transaction_hash, request.analysis, request.timestamp);

    Ok(Json(Ack {
        success: true,
        message: format!("Analysis for {} recorded", request.transaction_hash),
        timestamp: now(),
    }))
}
