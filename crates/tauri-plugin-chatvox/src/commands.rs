use chatvox_core::{CallError, MethodCall, Reply};
use serde_json::Value;
use std::path::PathBuf;
use tauri::State;

use crate::Chatvox;

/// Single channel entry point: `method` plus its JSON arguments.
#[tauri::command]
pub(crate) async fn invoke(
    state: State<'_, Chatvox>,
    method: String,
    arguments: Option<Value>,
) -> Result<Reply, CallError> {
    let call = MethodCall::new(method, arguments.unwrap_or(Value::Null));
    state.bridge().invoke(call).await
}

#[tauri::command]
pub(crate) async fn start_capture(state: State<'_, Chatvox>) -> Result<Reply, CallError> {
    state.bridge().start_capture().await
}

#[tauri::command]
pub(crate) async fn stop_capture(state: State<'_, Chatvox>) -> Result<Reply, CallError> {
    state.bridge().stop_capture().await
}

#[tauri::command]
pub(crate) async fn list_recordings(state: State<'_, Chatvox>) -> Result<Reply, CallError> {
    state.bridge().list_recordings().await
}

#[tauri::command]
pub(crate) async fn play_audio(
    state: State<'_, Chatvox>,
    path: Option<PathBuf>,
) -> Result<Reply, CallError> {
    state.bridge().play_audio(path).await
}

#[tauri::command]
pub(crate) async fn stop_audio(state: State<'_, Chatvox>) -> Result<Reply, CallError> {
    state.bridge().stop_audio().await
}

/// The host's answer to a `permission-request` event.
#[tauri::command]
pub(crate) fn permission_result(state: State<'_, Chatvox>, request_code: i32, granted: bool) {
    state.permission_result(request_code, granted);
}
