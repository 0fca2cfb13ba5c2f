//! Action surface as the chat adapter sees it

use fabric_relay::actions::create_default_actions;
use fabric_relay::config::RelayConfig;
use fabric_relay::orchestrator::FallbackPolicy;
use fabric_relay::FallbackOrchestrator;
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

fn offline_orchestrator() -> Arc<FallbackOrchestrator> {
    Arc::new(FallbackOrchestrator::new(false, false, FallbackPolicy::default()))
}

#[tokio::test]
async fn test_weather_for_unknown_city() {
    let actions = create_default_actions(offline_orchestrator()).await.unwrap();
    let reply = actions
        .dispatch("getCurrentWeather", &json!({"location": "Tokyo"}))
        .await;
    assert_eq!(reply, "No weather data for $Tokyo found");
}

#[tokio::test]
async fn test_weather_units() {
    let actions = create_default_actions(offline_orchestrator()).await.unwrap();
    assert_eq!(
        actions
            .dispatch("getCurrentWeather", &json!({"location": "San Francisco, CA", "unit": "c"}))
            .await,
        "22C"
    );
    assert_eq!(
        actions
            .dispatch("getCurrentWeather", &json!({"location": "Los Angeles", "unit": ""}))
            .await,
        "75.2F"
    );
    assert_eq!(
        actions
            .dispatch("getCurrentWeather", &json!({"location": "Los Angeles", "unit": "kelvin"}))
            .await,
        "The agent encountered an error or bug."
    );
}

#[tokio::test]
async fn test_nicknames() {
    let actions = create_default_actions(offline_orchestrator()).await.unwrap();
    assert_eq!(
        actions
            .dispatch("getNickname", &json!({"location": "San Francisco, CA"}))
            .await,
        "The Golden City"
    );
    assert_eq!(
        actions.dispatch("getNickname", &json!({"location": "Oslo"})).await,
        "No nickname for $Oslo found"
    );
}

#[tokio::test]
async fn test_query_action_without_question_prompts() {
    let actions = create_default_actions(offline_orchestrator()).await.unwrap();
    assert_eq!(
        actions.dispatch("queryFabricDataAgent", &json!({})).await,
        "請提供您的問題內容"
    );
    assert_eq!(
        actions
            .dispatch("queryFabricDataAgent", &json!({"question": ""}))
            .await,
        "請提供您的問題內容"
    );
}

#[tokio::test]
async fn test_query_action_reaches_backend() {
    let mut server = Server::new_async().await;
    let completion = server
        .mock(
            "POST",
            Matcher::Regex(r"^/openai/deployments/gpt-4o/chat/completions(\?.*)?$".to_string()),
        )
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"42 orders"}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let mut config = RelayConfig::default();
    config.foundry.endpoint = server.url();
    config.foundry.api_key = "foundry-key".to_string();
    config.foundry.model_name = "gpt-4o".to_string();

    let orchestrator = Arc::new(FallbackOrchestrator::from_config(&config));
    let actions = create_default_actions(orchestrator).await.unwrap();
    let reply = actions
        .dispatch("queryFabricDataAgent", &json!({"question": "How many orders?"}))
        .await;

    assert_eq!(reply, "**Fabric 數據代理程式回應：**\n\n42 orders");
    completion.assert_async().await;
}

#[tokio::test]
async fn test_unknown_action_gets_last_resort_reply() {
    let actions = create_default_actions(offline_orchestrator()).await.unwrap();
    assert!(!actions.has_action("bookFlight").await);
    assert_eq!(
        actions.dispatch("bookFlight", &json!({})).await,
        "The agent encountered an error or bug."
    );
}
