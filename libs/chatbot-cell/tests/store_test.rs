use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatbot_cell::models::{ChatRole, ConversationState, SessionData};
use chatbot_cell::services::{ConversationStore, DatabaseConversationStore};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const PATIENT_NUMBER: &str = "5511999998888";

struct Fixture {
    server: MockServer,
    patient_id: Uuid,
    conversation_id: Uuid,
}

impl Fixture {
    async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            patient_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
        }
    }

    fn store(&self) -> DatabaseConversationStore {
        let config = TestConfig::with_mock_server(&self.server.uri()).to_app_config();
        DatabaseConversationStore::new(&config)
    }

    async fn mount_patient(&self) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .and(query_param("whatsapp_number", format!("eq.{}", PATIENT_NUMBER)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::patient_response(&self.patient_id.to_string(), PATIENT_NUMBER)
            ])))
            .mount(&self.server)
            .await;
    }

    async fn mount_active_conversation(&self, summary: Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/conversations"))
            .and(query_param("status", "eq.active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([self.conversation("active", summary)])))
            .mount(&self.server)
            .await;
    }

    fn conversation(&self, status: &str, summary: Value) -> Value {
        json!({
            "id": self.conversation_id,
            "patient_id": self.patient_id,
            "started_at": Utc::now(),
            "finished_at": null,
            "status": status,
            "summary": summary
        })
    }

    fn message(&self, role: &str, body: &str, minutes_ago: i64) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "conversation_id": self.conversation_id,
            "role": role,
            "body": body,
            "message_type": "text",
            "created_at": Utc::now() - Duration::minutes(minutes_ago)
        })
    }
}

#[tokio::test]
async fn load_rebuilds_history_state_and_context() {
    let fixture = Fixture::start().await;
    fixture.mount_patient().await;
    fixture
        .mount_active_conversation(json!(
            r#"{"state":"AWAITING_TIME_CHOICE","context":{"doctor_name":"Dra. Helena Prado","slots":["08:00","08:30"]}}"#
        ))
        .await;

    // Newest first, as PostgREST returns them for `order=created_at.desc`.
    Mock::given(method("GET"))
        .and(path("/rest/v1/conversation_messages"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fixture.message("model", "Horários disponíveis com Dra. Helena Prado", 1),
            fixture.message("user", "Quero marcar com a Dra. Helena", 2)
        ])))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let session = fixture.store().load(PATIENT_NUMBER).await.unwrap();

    assert_eq!(session.state, ConversationState::AwaitingTimeChoice);
    assert_eq!(session.context["doctor_name"], "Dra. Helena Prado");
    assert_eq!(session.context["slots"], json!(["08:00", "08:30"]));
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.history[0].role, ChatRole::User);
    assert_eq!(session.history[0].text(), "Quero marcar com a Dra. Helena");
    assert_eq!(session.history[1].role, ChatRole::Model);
}

#[tokio::test]
async fn load_accepts_a_bare_state_summary() {
    let fixture = Fixture::start().await;
    fixture.mount_patient().await;
    fixture.mount_active_conversation(json!("AWAITING_TIME_CHOICE")).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/conversation_messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fixture.server)
        .await;

    let session = fixture.store().load(PATIENT_NUMBER).await.unwrap();

    assert_eq!(session.state, ConversationState::AwaitingTimeChoice);
    assert!(session.context.is_empty());
    assert!(session.history.is_empty());
}

#[tokio::test]
async fn unknown_number_loads_a_fresh_session() {
    let fixture = Fixture::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fixture.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fixture.server)
        .await;

    let session = fixture.store().load(PATIENT_NUMBER).await.unwrap();
    assert_eq!(session, SessionData::default());
}

#[tokio::test]
async fn save_writes_state_and_context_to_the_summary() {
    let fixture = Fixture::start().await;
    fixture.mount_patient().await;
    fixture.mount_active_conversation(Value::Null).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/conversations"))
        .and(query_param("id", format!("eq.{}", fixture.conversation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fixture.conversation("active", Value::Null)
        ])))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let mut session = SessionData::default();
    session.push(ChatRole::User, "Oi");
    session.state = ConversationState::AwaitingTimeChoice;
    session.context.insert("doctor_name".into(), json!("Dra. Helena Prado"));
    session.context.insert("date".into(), json!("2024-06-10"));

    fixture.store().save(PATIENT_NUMBER, &session).await.unwrap();

    let requests = fixture.server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .unwrap();
    let body: Value = serde_json::from_slice(&patch.body).unwrap();
    let stored: Value = serde_json::from_str(body["summary"].as_str().unwrap()).unwrap();
    assert_eq!(
        stored,
        json!({
            "state": "AWAITING_TIME_CHOICE",
            "context": { "doctor_name": "Dra. Helena Prado", "date": "2024-06-10" }
        })
    );
}

#[tokio::test]
async fn save_without_an_active_conversation_writes_nothing() {
    let fixture = Fixture::start().await;
    fixture.mount_patient().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&fixture.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&fixture.server)
        .await;

    fixture
        .store()
        .save(PATIENT_NUMBER, &SessionData::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn reset_finishes_the_active_conversation() {
    let fixture = Fixture::start().await;
    fixture.mount_patient().await;
    fixture.mount_active_conversation(Value::Null).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/conversations"))
        .and(body_partial_json(json!({ "status": "finished" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            fixture.conversation("finished", Value::Null)
        ])))
        .expect(1)
        .mount(&fixture.server)
        .await;

    fixture.store().reset(PATIENT_NUMBER).await.unwrap();
}

#[tokio::test]
async fn list_numbers_returns_patients_with_active_conversations() {
    let fixture = Fixture::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .and(query_param("status", "eq.active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "patient": { "whatsapp_number": "5511988887777" } },
            { "patient": { "whatsapp_number": PATIENT_NUMBER } },
            { "patient": { "whatsapp_number": PATIENT_NUMBER } },
            { "patient": null }
        ])))
        .expect(1)
        .mount(&fixture.server)
        .await;

    let numbers = fixture.store().list_numbers().await.unwrap();
    assert_eq!(numbers, vec!["5511988887777".to_string(), PATIENT_NUMBER.to_string()]);
}
