// libs/chatbot-cell/src/services/conversation.rs
use std::sync::Arc;

use anyhow::Result;
use chrono::{FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use appointment_cell::services::SchedulingService;
use clinic_cell::services::{ClinicService, ExamService};
use doctor_cell::services::{DoctorService, WorkingHoursService};
use patient_cell::services::PatientService;
use shared_config::AppConfig;

use crate::error::ChatbotError;
use crate::models::{
    ChatRole, ConversationState, ConversationStatus, ConversationSummary, NewRouting, RoutingRequestType,
    SessionData, TurnContext,
};
use crate::services::ai::AiService;
use crate::services::commands::{parse_command, strip_commands, BotCommand};
use crate::services::prompt::build_system_prompt;
use crate::services::records::ConversationRecordService;
use crate::services::routing::RoutingService;
use crate::services::store::{ends_with_user_message, ConversationStore};
use crate::utils::formatters::{format_date, format_phone_number, truncate_text};

const MAX_SLOTS_OFFERED: usize = 5;
const SUMMARY_MAX_LENGTH: usize = 500;

pub const APOLOGY_REPLY: &str =
    "Desculpe, tive um problema para responder agora 😔 Pode tentar novamente em instantes?";
pub const NO_SLOTS_REPLY: &str =
    "Não encontrei horários livres para essa data 😕 Gostaria de tentar outro dia ou outro médico?";
pub const APPOINTMENT_REQUESTED_REPLY: &str =
    "Recebi seu pedido de agendamento ✅ Nossa equipe vai confirmar o horário com você em breve por aqui.";
pub const HANDOFF_REPLY: &str =
    "Vou transferir você para nossa equipe 👩‍💼 Em instantes alguém continua o atendimento por aqui.";

#[derive(Debug, Clone, Serialize)]
pub struct ConversationOverview {
    pub user_number: String,
    pub display_number: String,
    #[serde(flatten)]
    pub summary: ConversationSummary,
}

/// Runs one chatbot turn per inbound message: LLM call, command handling and
/// session bookkeeping.
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    ai: AiService,
    clinic: ClinicService,
    exams: ExamService,
    doctors: DoctorService,
    working_hours: WorkingHoursService,
    patients: PatientService,
    scheduling: SchedulingService,
    routings: RoutingService,
    records: ConversationRecordService,
    service_token: String,
    history_limit: usize,
    clinic_offset: FixedOffset,
}

impl ConversationService {
    pub fn new(config: &AppConfig, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            ai: AiService::new(config),
            clinic: ClinicService::new(config),
            exams: ExamService::new(config),
            doctors: DoctorService::new(config),
            working_hours: WorkingHoursService::new(config),
            patients: PatientService::new(config),
            scheduling: SchedulingService::new(config),
            routings: RoutingService::new(config),
            records: ConversationRecordService::new(config),
            service_token: config.service_token().to_string(),
            history_limit: config.conversation_history_limit.max(1),
            clinic_offset: config.clinic_offset(),
        }
    }

    /// Processes a patient message and returns the text to send back.
    ///
    /// `turn` identifies the stored patient and conversation when the caller
    /// already resolved them; otherwise they are looked up on demand when a
    /// hand-off needs them.
    pub async fn process_user_message(
        &self,
        user_number: &str,
        text: &str,
        turn: Option<TurnContext>,
    ) -> Result<String> {
        let mut session = self.store.load(user_number).await?;
        if !ends_with_user_message(&session, text) {
            session.push(ChatRole::User, text);
        }
        session.cap_history(self.history_limit);

        let prompt = self.system_prompt().await;
        let reply = match self.ai.generate_response(&prompt, &session.history).await {
            Ok(reply) => reply,
            Err(err) => {
                error!("AI reply failed for {}: {}", user_number, err);
                self.store.save(user_number, &session).await?;
                return Ok(APOLOGY_REPLY.to_string());
            }
        };

        let outgoing = match parse_command(&reply) {
            Some(command) => {
                debug!("Assistant issued {:?} for {}", command, user_number);
                self.handle_command(command, &reply, &mut session, user_number, turn)
                    .await
            }
            None => reply,
        };

        session.push(ChatRole::Model, outgoing.clone());
        session.cap_history(self.history_limit);
        self.store.save(user_number, &session).await?;

        Ok(outgoing)
    }

    pub async fn reset_conversation(&self, user_number: &str) -> Result<(), ChatbotError> {
        info!("Resetting conversation for {}", user_number);
        self.store.reset(user_number).await
    }

    pub async fn get_conversation_summary(&self, user_number: &str) -> Result<ConversationSummary, ChatbotError> {
        Ok(self.store.load(user_number).await?.summary())
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationOverview>, ChatbotError> {
        let numbers = self.store.list_numbers().await?;
        let mut overviews = Vec::with_capacity(numbers.len());
        for user_number in numbers {
            let summary = self.get_conversation_summary(&user_number).await?;
            overviews.push(ConversationOverview {
                display_number: display_number(&user_number),
                user_number,
                summary,
            });
        }
        Ok(overviews)
    }

    async fn system_prompt(&self) -> String {
        let token = self.service_token.as_str();

        let clinic = self.clinic.get_clinic_info(token).await.unwrap_or_else(|e| {
            warn!("Clinic profile unavailable for prompt: {}", e);
            None
        });
        let doctors = self.doctors.list_doctors(true, None, token).await.unwrap_or_else(|e| {
            warn!("Doctor list unavailable for prompt: {}", e);
            Vec::new()
        });
        let working_hours = self
            .working_hours
            .list_active_working_hours(token)
            .await
            .unwrap_or_else(|e| {
                warn!("Working hours unavailable for prompt: {}", e);
                Vec::new()
            });
        let exams = self.exams.list_exams(token).await.unwrap_or_else(|e| {
            warn!("Exam list unavailable for prompt: {}", e);
            Vec::new()
        });

        let now = Utc::now().with_timezone(&self.clinic_offset);
        build_system_prompt(clinic.as_ref(), &doctors, &working_hours, &exams, now)
    }

    async fn handle_command(
        &self,
        command: BotCommand,
        reply: &str,
        session: &mut SessionData,
        user_number: &str,
        turn: Option<TurnContext>,
    ) -> String {
        let lead = strip_commands(reply);

        match command {
            BotCommand::CheckSchedule { doctor, date, raw } => {
                match self.lookup_schedule(doctor.as_deref(), date, session).await {
                    Some(options) => join_reply(&lead, &options),
                    None => {
                        info!("No free slots found for '{}'", raw);
                        join_reply(&lead, NO_SLOTS_REPLY)
                    }
                }
            }
            BotCommand::CreateAppointment { details } => {
                let summary = if details.is_empty() {
                    conversation_excerpt(session)
                } else {
                    details
                };
                match self
                    .hand_off(RoutingRequestType::AppointmentRequest, summary, session, user_number, turn)
                    .await
                {
                    Ok(()) => join_reply(&lead, APPOINTMENT_REQUESTED_REPLY),
                    Err(err) => {
                        error!("Failed to route appointment request for {}: {}", user_number, err);
                        APOLOGY_REPLY.to_string()
                    }
                }
            }
            BotCommand::Redirect { request_type } => {
                let summary = conversation_excerpt(session);
                match self.hand_off(request_type, summary, session, user_number, turn).await {
                    Ok(()) => join_reply(&lead, HANDOFF_REPLY),
                    Err(err) => {
                        error!("Failed to route conversation for {}: {}", user_number, err);
                        APOLOGY_REPLY.to_string()
                    }
                }
            }
        }
    }

    /// Offers up to five free times and moves the session to
    /// `AWAITING_TIME_CHOICE`. `None` when nothing can be offered.
    async fn lookup_schedule(
        &self,
        doctor_name: Option<&str>,
        date: Option<NaiveDate>,
        session: &mut SessionData,
    ) -> Option<String> {
        let (doctor_name, date) = (doctor_name?, date?);
        let token = self.service_token.as_str();

        let doctor = match self.doctors.find_doctor_by_name(doctor_name, token).await {
            Ok(Some(doctor)) => doctor,
            Ok(None) => return None,
            Err(err) => {
                warn!("Doctor lookup for '{}' failed: {}", doctor_name, err);
                return None;
            }
        };

        let slots = match self.scheduling.get_available_slots(doctor.id, date, token).await {
            Ok(slots) => slots,
            Err(err) => {
                warn!("Slot lookup for doctor {} failed: {}", doctor.id, err);
                return None;
            }
        };

        let times: Vec<String> = slots
            .into_iter()
            .filter(|slot| slot.available)
            .take(MAX_SLOTS_OFFERED)
            .map(|slot| slot.time)
            .collect();
        if times.is_empty() {
            return None;
        }

        session.context.insert("doctor_id".into(), json!(doctor.id));
        session.context.insert("doctor_name".into(), json!(doctor.name));
        session.context.insert("date".into(), json!(date));
        session.context.insert("slots".into(), json!(times));
        session.state = ConversationState::AwaitingTimeChoice;

        let mut options = format!(
            "Horários disponíveis com {} em {}:\n",
            doctor.name,
            format_date(Some(date))
        );
        for time in &times {
            options.push_str(&format!("🕐 {}\n", time));
        }
        options.push_str("Qual horário fica melhor para você?");
        Some(options)
    }

    /// Creates the routing, marks the conversation redirected and returns the
    /// session to `START`.
    async fn hand_off(
        &self,
        request_type: RoutingRequestType,
        summary: String,
        session: &mut SessionData,
        user_number: &str,
        turn: Option<TurnContext>,
    ) -> Result<()> {
        let token = self.service_token.as_str();
        let turn = match turn {
            Some(turn) => turn,
            None => self.resolve_turn(user_number).await?,
        };

        let doctor_of_interest_id = session
            .context
            .get("doctor_id")
            .and_then(|v| v.as_str())
            .and_then(|raw| Uuid::parse_str(raw).ok());

        self.routings
            .create_routing(
                NewRouting {
                    patient_id: turn.patient_id,
                    conversation_id: turn.conversation_id,
                    request_type,
                    doctor_of_interest_id,
                    conversation_summary: truncate_text(&summary, SUMMARY_MAX_LENGTH, "..."),
                },
                token,
            )
            .await?;

        if let Err(err) = self
            .records
            .set_status(turn.conversation_id, ConversationStatus::Redirected, token)
            .await
        {
            warn!("Could not mark conversation {} redirected: {}", turn.conversation_id, err);
        }

        session.state = ConversationState::Start;
        session.context.clear();
        Ok(())
    }

    async fn resolve_turn(&self, user_number: &str) -> Result<TurnContext> {
        let token = self.service_token.as_str();
        let patient = self.patients.get_or_create_by_whatsapp(user_number, None, token).await?;
        let conversation = self.records.get_or_create_active(patient.id, token).await?;
        Ok(TurnContext {
            patient_id: patient.id,
            conversation_id: conversation.id,
        })
    }
}

/// Staff-facing form of a WhatsApp number; the Brazilian country code is dropped.
fn display_number(user_number: &str) -> String {
    let digits: String = user_number.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix("55") {
        Some(local) if (10..=11).contains(&local.len()) => format_phone_number(local),
        _ => user_number.to_string(),
    }
}

fn join_reply(lead: &str, tail: &str) -> String {
    if lead.is_empty() {
        tail.to_string()
    } else {
        format!("{}\n\n{}", lead, tail)
    }
}

/// Recent patient messages, oldest first, for staff hand-off.
fn conversation_excerpt(session: &SessionData) -> String {
    let mut recent: Vec<String> = session
        .history
        .iter()
        .rev()
        .filter(|entry| entry.role == ChatRole::User)
        .take(5)
        .map(|entry| entry.text())
        .collect();
    recent.reverse();

    if recent.is_empty() {
        "Paciente pediu atendimento pelo WhatsApp".to_string()
    } else {
        recent.join(" | ")
    }
}
