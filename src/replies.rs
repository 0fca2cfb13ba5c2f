//! User-facing reply texts
//!
//! Every string a chat user can see is defined here. Backends and the
//! orchestrator format them; nothing else invents user-visible wording.

/// Prefix placed before every successful backend answer
pub const ANSWER_HEADER: &str = "**Fabric 數據代理程式回應：**\n\n";

pub const EMPTY_QUESTION: &str = "請提供您的問題內容";
pub const NETWORK_FAILURE: &str = "網路連接錯誤，請檢查您的網路連接";
pub const GENERIC_FAILURE: &str = "查詢過程中發生錯誤，請稍後再試";

// Project agent backend
pub const PROJECT_RUN_TIMEOUT: &str = "Agent 運行超時，請稍後再試";
pub const PROJECT_NO_ASSISTANT: &str = "未找到助手回應";
pub const PROJECT_EMPTY_TEXT: &str = "無法提取回應文字，請稍後再試";
pub const UNKNOWN_ERROR: &str = "未知錯誤";

// REST agent backend
pub const REST_NO_CONTENT: &str = "執行完成但無法取得回應內容";
pub const REST_RUN_TIMEOUT: &str = "執行超時，請稍後再試";

// Chat completion backend
pub const COMPLETION_EMPTY: &str = "無法獲取有效的回應內容";

/// Reply for errors that escape an action handler
pub const ACTION_FAILURE: &str = "The agent encountered an error or bug.";

/// Prefix an answer with [`ANSWER_HEADER`]
pub fn with_header(text: &str) -> String {
    format!("{}{}", ANSWER_HEADER, text)
}

pub fn project_run_failed(message: Option<&str>) -> String {
    let detail = message.filter(|m| !m.is_empty()).unwrap_or(UNKNOWN_ERROR);
    format!("Agent 運行失敗: {}", detail)
}

pub fn rest_message_failed(status: u16) -> String {
    format!("訊息發送失敗，錯誤代碼: {}", status)
}

pub fn rest_run_create_failed(status: u16) -> String {
    format!("Agent 執行失敗，錯誤代碼: {}", status)
}

pub fn rest_status_check_failed(status: u16) -> String {
    format!("檢查執行狀態失敗，錯誤代碼: {}", status)
}

pub fn rest_run_ended(status: &str) -> String {
    format!("Agent 執行失敗，狀態: {}", status)
}

pub fn rest_wait_failed(error: &dyn std::fmt::Display) -> String {
    format!("等待執行完成失敗: {}", error)
}

pub fn completion_unavailable(status: u16) -> String {
    format!("服務暫時無法使用，請稍後再試。錯誤代碼: {}", status)
}

pub fn completion_call_failed(error: &dyn std::fmt::Display) -> String {
    format!("Model API 呼叫失敗: {}", error)
}
