use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatbot_cell::models::{ChatRole, ConversationState, SessionData};
use chatbot_cell::router::chatbot_routes;
use chatbot_cell::services::{ConversationStore, InMemoryConversationStore};
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

const PATIENT_NUMBER: &str = "5511999998888";
const MESSAGES_PATH: &str = "/1234567890/messages";

struct Harness {
    server: MockServer,
    config: TestConfig,
    store: Arc<InMemoryConversationStore>,
    patient_id: Uuid,
    conversation_id: Uuid,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::with_mock_server(&server.uri());
        Self {
            server,
            config,
            store: Arc::new(InMemoryConversationStore::new(120)),
            patient_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
        }
    }

    fn app(&self) -> Router {
        self.app_with(self.config.to_app_config())
    }

    fn app_with(&self, config: AppConfig) -> Router {
        chatbot_routes(Arc::new(config), self.store.clone())
    }

    /// Patient, active conversation, transcript writes and prompt data.
    async fn mount_pipeline(&self) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::patient_response(&self.patient_id.to_string(), PATIENT_NUMBER)
            ])))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([self.conversation("active")])))
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/conversation_messages"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": Uuid::new_v4(),
                "conversation_id": self.conversation_id,
                "role": "user",
                "body": "Oi",
                "message_type": "text",
                "created_at": Utc::now()
            }])))
            .mount(&self.server)
            .await;

        for table in ["/rest/v1/clinic_info", "/rest/v1/exams"] {
            Mock::given(method("GET"))
                .and(path(table))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
                .mount(&self.server)
                .await;
        }
    }

    async fn mount_completion(&self, text: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": text } }]
            })))
            .mount(&self.server)
            .await;
    }

    fn conversation(&self, status: &str) -> Value {
        json!({
            "id": self.conversation_id,
            "patient_id": self.patient_id,
            "started_at": Utc::now(),
            "finished_at": null,
            "status": status,
            "summary": null
        })
    }
}

fn inbound(text: &str) -> String {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "102290129340398",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "contacts": [{ "wa_id": PATIENT_NUMBER, "profile": { "name": "Maria Souza" } }],
                    "messages": [{
                        "from": PATIENT_NUMBER,
                        "id": "wamid.HBgLNTUxMTk5OTk5ODg4OBUCABIYFDNB",
                        "timestamp": "1717430400",
                        "type": "text",
                        "text": { "body": text }
                    }]
                }
            }]
        }]
    })
    .to_string()
}

fn post_webhook(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn webhook_verification_echoes_the_challenge() {
    let harness = Harness::start().await;

    let response = harness
        .app()
        .oneshot(
            Request::builder()
                .uri("/webhook?hub.mode=subscribe&hub.verify_token=test-verify-token&hub.challenge=1158201444")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"1158201444");

    let rejected = harness
        .app()
        .oneshot(
            Request::builder()
                .uri("/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let harness = Harness::start().await;
    let mut config = harness.config.to_app_config();
    config.whatsapp_app_secret = Some("app-secret".to_string());

    let mut request = post_webhook(inbound("Oi"));
    request
        .headers_mut()
        .insert("X-Hub-Signature-256", "sha256=deadbeef".parse().unwrap());

    let response = harness.app_with(config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_and_status_deliveries_are_acknowledged() {
    let harness = Harness::start().await;

    let response = harness
        .app()
        .oneshot(post_webhook("not json".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ignored");

    let statuses = json!({
        "object": "whatsapp_business_account",
        "entry": [{ "id": "1", "changes": [{ "field": "messages", "value": {
            "messaging_product": "whatsapp",
            "statuses": [{ "id": "wamid.X", "status": "delivered" }]
        }}]}]
    });
    let response = harness
        .app()
        .oneshot(post_webhook(statuses.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["processed"], 0);
}

#[tokio::test]
async fn text_message_gets_an_ai_reply() {
    let harness = Harness::start().await;
    harness.mount_pipeline().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&harness.server)
        .await;
    harness.mount_completion("Olá, Maria! Como posso ajudar? 😊").await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({
            "to": PATIENT_NUMBER,
            "type": "text",
            "text": { "body": "Olá, Maria! Como posso ajudar? 😊" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.OUT" }] })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let response = harness.app().oneshot(post_webhook(inbound("Oi"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["processed"], 1);

    let session = harness.store.load(PATIENT_NUMBER).await.unwrap();
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.state, ConversationState::Start);
}

#[tokio::test]
async fn schedule_command_offers_free_times() {
    let harness = Harness::start().await;
    harness.mount_pipeline().await;
    let doctor_id = Uuid::new_v4().to_string();
    let date: NaiveDate = (Utc::now() + Duration::days(7)).date_naive();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, "Dra. Helena Prado")
        ])))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/working_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::working_hours_response(&doctor_id, 1, "08:00:00", "10:00:00")
        ])))
        .mount(&harness.server)
        .await;
    for table in ["/rest/v1/doctor_unavailability", "/rest/v1/schedule_blocks", "/rest/v1/appointments"] {
        Mock::given(method("GET"))
            .and(path(table))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&harness.server)
            .await;
    }

    harness
        .mount_completion(&format!(
            "Vou verificar a agenda 🗓️ [CONSULTAR_AGENDA: Dra. Helena, {}]",
            date.format("%Y-%m-%d")
        ))
        .await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_string_contains("Horários disponíveis com Dra. Helena Prado"))
        .and(body_string_contains("08:00"))
        .and(body_string_contains("09:30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.OUT" }] })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let response = harness
        .app()
        .oneshot(post_webhook(inbound("Quero marcar com a Dra. Helena semana que vem")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["processed"], 1);

    let session = harness.store.load(PATIENT_NUMBER).await.unwrap();
    assert_eq!(session.state, ConversationState::AwaitingTimeChoice);
    assert_eq!(session.context["doctor_id"], json!(doctor_id));
    assert_eq!(session.context["slots"], json!(["08:00", "08:30", "09:00", "09:30"]));
}

#[tokio::test]
async fn redirect_command_creates_a_routing() {
    let harness = Harness::start().await;
    harness.mount_pipeline().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&harness.server)
        .await;
    harness
        .mount_completion("Claro! Vou chamar alguém da equipe. [DIRECIONAR: human_request]")
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/routings"))
        .and(body_partial_json(json!({
            "patient_id": harness.patient_id,
            "conversation_id": harness.conversation_id,
            "request_type": "human_request",
            "status": "pending"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": harness.patient_id,
            "conversation_id": harness.conversation_id,
            "request_type": "human_request",
            "doctor_of_interest_id": null,
            "conversation_summary": "Quero falar com uma pessoa",
            "created_at": Utc::now(),
            "status": "pending",
            "handled_at": null,
            "notes": null
        }])))
        .expect(1)
        .mount(&harness.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/admin_notifications"))
        .and(body_partial_json(json!({ "priority": "high" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "title": "Novo encaminhamento: Pediu atendimento humano",
            "message": "Quero falar com uma pessoa",
            "kind": "info",
            "priority": "high",
            "recipients": [],
            "read": false,
            "active": true,
            "action_url": null,
            "created_by": null,
            "created_at": Utc::now()
        }])))
        .expect(1)
        .mount(&harness.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/conversations"))
        .and(body_partial_json(json!({ "status": "redirected" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([harness.conversation("redirected")])))
        .expect(1)
        .mount(&harness.server)
        .await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_string_contains("Vou transferir você para nossa equipe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.OUT" }] })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let response = harness
        .app()
        .oneshot(post_webhook(inbound("Quero falar com uma pessoa")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["processed"], 1);

    let session = harness.store.load(PATIENT_NUMBER).await.unwrap();
    assert_eq!(session.state, ConversationState::Start);
}

#[tokio::test]
async fn appointment_command_hands_the_request_to_staff() {
    let harness = Harness::start().await;
    harness.mount_pipeline().await;
    let doctor_id = Uuid::new_v4();
    let details = "Maria Souza, Dra. Helena Prado, 2024-06-10, 09:00";

    let mut session = SessionData::default();
    session.push(ChatRole::Model, "Horários disponíveis com Dra. Helena Prado em 10/06/2024");
    session.state = ConversationState::AwaitingTimeChoice;
    session.context.insert("doctor_id".into(), json!(doctor_id));
    session.context.insert("slots".into(), json!(["09:00", "09:30"]));
    harness.store.save(PATIENT_NUMBER, &session).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&harness.server)
        .await;
    harness
        .mount_completion(&format!("Perfeito, Maria! [CRIAR_AGENDAMENTO: {}]", details))
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/routings"))
        .and(body_partial_json(json!({
            "patient_id": harness.patient_id,
            "conversation_id": harness.conversation_id,
            "request_type": "appointment_request",
            "doctor_of_interest_id": doctor_id,
            "conversation_summary": details,
            "status": "pending"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": harness.patient_id,
            "conversation_id": harness.conversation_id,
            "request_type": "appointment_request",
            "doctor_of_interest_id": doctor_id,
            "conversation_summary": details,
            "created_at": Utc::now(),
            "status": "pending",
            "handled_at": null,
            "notes": null
        }])))
        .expect(1)
        .mount(&harness.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/admin_notifications"))
        .and(body_partial_json(json!({ "priority": "medium" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "title": "Novo encaminhamento: Solicitação de agendamento",
            "message": details,
            "kind": "info",
            "priority": "medium",
            "recipients": [],
            "read": false,
            "active": true,
            "action_url": null,
            "created_by": null,
            "created_at": Utc::now()
        }])))
        .expect(1)
        .mount(&harness.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/conversations"))
        .and(body_partial_json(json!({ "status": "redirected" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([harness.conversation("redirected")])))
        .expect(1)
        .mount(&harness.server)
        .await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_string_contains("Perfeito, Maria!"))
        .and(body_string_contains("Recebi seu pedido de agendamento"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.OUT" }] })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let response = harness
        .app()
        .oneshot(post_webhook(inbound("Pode ser às 9h")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["processed"], 1);

    let session = harness.store.load(PATIENT_NUMBER).await.unwrap();
    assert_eq!(session.state, ConversationState::Start);
    assert!(session.context.is_empty());
}

#[tokio::test]
async fn unknown_doctor_gets_no_slots_and_keeps_the_state() {
    let harness = Harness::start().await;
    harness.mount_pipeline().await;

    let mut session = SessionData::default();
    session.state = ConversationState::AwaitingTimeChoice;
    session.context.insert("slots".into(), json!(["08:00"]));
    harness.store.save(PATIENT_NUMBER, &session).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&harness.server)
        .await;
    harness
        .mount_completion("Um momento! [CONSULTAR_AGENDA: Dr. Desconhecido, 2024-06-10]")
        .await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_string_contains("Não encontrei horários livres"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.OUT" }] })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let response = harness
        .app()
        .oneshot(post_webhook(inbound("Tem horário com o Dr. Desconhecido?")))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["processed"], 1);

    let session = harness.store.load(PATIENT_NUMBER).await.unwrap();
    assert_eq!(session.state, ConversationState::AwaitingTimeChoice);
    assert_eq!(session.context["slots"], json!(["08:00"]));
    assert!(!session.context.contains_key("doctor_id"));
}

#[tokio::test]
async fn ai_outage_sends_an_apology() {
    let harness = Harness::start().await;
    harness.mount_pipeline().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.server)
        .await;

    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_string_contains("Desculpe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.OUT" }] })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let response = harness.app().oneshot(post_webhook(inbound("Oi"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ==============================================================================
// BACK-OFFICE ROUTES
// ==============================================================================

#[tokio::test]
async fn conversation_routes_require_staff() {
    let harness = Harness::start().await;

    let anonymous = harness
        .app()
        .oneshot(Request::builder().uri("/conversations").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let doctor = TestUser::doctor("helena@clinica.com");
    let token = JwtTestUtils::create_test_token(&doctor, &harness.config.jwt_secret, None);
    let response = harness
        .app()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/conversations/{}", PATIENT_NUMBER))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn secretary_can_inspect_and_reset_sessions() {
    let harness = Harness::start().await;
    let mut session = SessionData::default();
    session.push(ChatRole::User, "Oi");
    session.state = ConversationState::AwaitingTimeChoice;
    harness.store.save(PATIENT_NUMBER, &session).await.unwrap();

    let secretary = TestUser::secretary("gabi@clinica.com");
    let token = JwtTestUtils::create_test_token(&secretary, &harness.config.jwt_secret, None);
    let authorized = |method: &str, uri: String| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    };

    let listed = harness
        .app()
        .oneshot(authorized("GET", "/conversations".to_string()))
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let body = body_json(listed).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["conversations"][0]["user_number"], PATIENT_NUMBER);
    assert_eq!(body["conversations"][0]["display_number"], "(11) 99999-8888");
    assert_eq!(body["conversations"][0]["state"], "AWAITING_TIME_CHOICE");
    assert_eq!(body["conversations"][0]["message_count"], 1);

    let reset = harness
        .app()
        .oneshot(authorized("DELETE", format!("/conversations/{}", PATIENT_NUMBER)))
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::OK);

    let summary = harness
        .app()
        .oneshot(authorized("GET", format!("/conversations/{}", PATIENT_NUMBER)))
        .await
        .unwrap();
    let body = body_json(summary).await;
    assert_eq!(body["summary"]["state"], "START");
    assert_eq!(body["summary"]["message_count"], 0);
}

#[tokio::test]
async fn resolving_an_unknown_routing_is_not_found() {
    let harness = Harness::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/routings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&harness.server)
        .await;

    let secretary = TestUser::secretary("gabi@clinica.com");
    let token = JwtTestUtils::create_test_token(&secretary, &harness.config.jwt_secret, None);
    let response = harness
        .app()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/routings/{}", Uuid::new_v4()))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "status": "resolved", "notes": "Paciente atendido" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reminders_are_sent_and_recorded() {
    let harness = Harness::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let start = Utc::now() + Duration::hours(20);
    let appointment = MockSupabaseResponses::appointment_response(
        &doctor_id,
        &start.to_rfc3339(),
        &(start + Duration::minutes(30)).to_rfc3339(),
        "confirmed",
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment.clone()])))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .and(body_partial_json(json!({
            "to": PATIENT_NUMBER,
            "type": "template",
            "template": { "name": "appointment_reminder", "language": { "code": "pt_BR" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.OUT" }] })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let mut reminded = appointment;
    reminded["reminder_sent"] = json!(true);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "reminder_sent": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([reminded])))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_history"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "appointment_id": Uuid::new_v4(),
            "action": "reminder_sent",
            "description": "WhatsApp reminder sent",
            "user_id": null,
            "created_at": Utc::now(),
            "previous_start_time": null,
            "previous_doctor_id": null
        }])))
        .mount(&harness.server)
        .await;

    let admin = TestUser::admin("admin@clinica.com");
    let token = JwtTestUtils::create_test_token(&admin, &harness.config.jwt_secret, None);
    let response = harness
        .app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reminders/dispatch")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["checked"], 1);
    assert_eq!(report["sent"], 1);
    assert_eq!(report["failed"], 0);
}

#[tokio::test]
async fn reminders_for_invalid_numbers_are_counted_as_failed() {
    let harness = Harness::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let start = Utc::now() + Duration::hours(5);
    let mut appointment = MockSupabaseResponses::appointment_response(
        &doctor_id,
        &start.to_rfc3339(),
        &(start + Duration::minutes(30)).to_rfc3339(),
        "pending",
    );
    appointment["patient_phone"] = json!("11999998888");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path(MESSAGES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.OUT" }] })))
        .expect(0)
        .mount(&harness.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&harness.server)
        .await;

    let admin = TestUser::admin("admin@clinica.com");
    let token = JwtTestUtils::create_test_token(&admin, &harness.config.jwt_secret, None);
    let response = harness
        .app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reminders/dispatch")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let report = body_json(response).await;
    assert_eq!(report["checked"], 1);
    assert_eq!(report["sent"], 0);
    assert_eq!(report["failed"], 1);
}
