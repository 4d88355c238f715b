//! Messages sent from the server to the client.

use crate::common::Content;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A server frame. The server may populate more than one field in a single
/// frame, so this is a struct of options rather than a tagged enum.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<SetupComplete>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_cancellation: Option<ToolCallCancellation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SetupComplete {}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_complete: Option<bool>,
    /// Set when the server detected new user activity and dropped the rest
    /// of the turn it was generating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_transcription: Option<Transcription>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_transcription: Option<Transcription>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ToolCallCancellation {
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_turn_and_ignores_unknown_fields() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": { "parts": [
                    { "text": "hi" },
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAA=" } }
                ]},
                "turnComplete": true,
                "someFutureFlag": 3
            },
            "usageMetadata": { "totalTokenCount": 12 }
        }"#;

        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let content = msg.server_content.unwrap();
        let parts = content.model_turn.unwrap().parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].text.as_deref(), Some("hi"));
        assert_eq!(
            parts[1].inline_data.as_ref().unwrap().mime_type,
            "audio/pcm;rate=24000"
        );
        assert_eq!(content.turn_complete, Some(true));
    }

    #[test]
    fn parses_setup_complete_and_tool_call() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete":{}}"#).unwrap();
        assert!(msg.setup_complete.is_some());

        let msg: ServerMessage = serde_json::from_str(
            r#"{"toolCall":{"functionCalls":[{"id":"c1","name":"lookup","args":{"q":1}}]}}"#,
        )
        .unwrap();
        let call = &msg.tool_call.unwrap().function_calls[0];
        assert_eq!(call.id, "c1");
        assert_eq!(call.name, "lookup");
    }
}
