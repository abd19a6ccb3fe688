use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::{weekday_number, Doctor, DoctorError};
use doctor_cell::services::{DoctorService, WorkingHoursService};
use patient_cell::models::normalize_phone;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilters, AppointmentHistory, AppointmentStatus,
    AppointmentType, AvailableSlot, BusyPeriod, CreateAppointmentRequest, HistoryAction,
    NewHistoryEntry, RescheduleAppointmentRequest,
};
use crate::services::blocks::ScheduleBlockService;
use crate::services::history::AppointmentHistoryService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::slots::{compute_slots, local_day_bounds};

fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct SchedulingService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    working_hours: WorkingHoursService,
    patients: PatientService,
    blocks: ScheduleBlockService,
    history: AppointmentHistoryService,
    lifecycle: AppointmentLifecycleService,
    slot_minutes: i64,
    offset: FixedOffset,
}

impl SchedulingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            working_hours: WorkingHoursService::new(config),
            patients: PatientService::new(config),
            blocks: ScheduleBlockService::new(config),
            history: AppointmentHistoryService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            slot_minutes: config.slot_duration_minutes,
            offset: config.clinic_offset(),
        }
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(self.slot_minutes)
    }

    // ==========================================================================
    // AVAILABILITY
    // ==========================================================================

    /// Free slots for a doctor on a clinic-local date, ordered by start.
    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<AvailableSlot>> {
        self.slots_for_day(doctor_id, date, None, auth_token).await
    }

    pub async fn is_slot_available(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<bool> {
        self.slot_is_free(doctor_id, start, None, auth_token).await
    }

    async fn slot_is_free(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        ignore_appointment: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool> {
        let date = start.with_timezone(&self.offset).date_naive();
        let slots = self
            .slots_for_day(doctor_id, date, ignore_appointment, auth_token)
            .await?;
        Ok(slots.iter().any(|slot| slot.start.with_timezone(&Utc) == start))
    }

    async fn slots_for_day(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        ignore_appointment: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<AvailableSlot>> {
        if self.working_hours.is_unavailable_on(doctor_id, date, auth_token).await? {
            debug!("Doctor {} is unavailable on {}", doctor_id, date);
            return Ok(Vec::new());
        }

        let hours = self
            .working_hours
            .get_working_hours_for_weekday(doctor_id, weekday_number(date), auth_token)
            .await?;
        if hours.is_empty() {
            return Ok(Vec::new());
        }

        let (day_start, day_end) = local_day_bounds(date, self.offset)
            .ok_or_else(|| AppointmentError::InvalidTime(format!("Invalid date {}", date)))?;

        let mut busy: Vec<BusyPeriod> = self
            .active_appointments_between(doctor_id, day_start, day_end, auth_token)
            .await?
            .into_iter()
            .filter(|a| Some(a.id) != ignore_appointment)
            .map(|a| BusyPeriod { start: a.start_time, end: a.end_time })
            .collect();

        busy.extend(
            self.blocks
                .blocks_between(doctor_id, day_start, day_end, auth_token)
                .await?
                .into_iter()
                .map(|b| BusyPeriod { start: b.start_time, end: b.end_time }),
        );

        let slots = compute_slots(date, &hours, &busy, self.slot_minutes, self.offset, Some(Utc::now()));
        debug!("{} free slots for doctor {} on {}", slots.len(), doctor_id, date);
        Ok(slots)
    }

    async fn active_appointments_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=in.(pending,confirmed)&start_time=lt.{}&end_time=gt.{}",
            doctor_id,
            ts(to),
            ts(from)
        );
        let appointments: Vec<Appointment> = self.supabase.select(&path, auth_token).await?;
        Ok(appointments
            .into_iter()
            .filter(|a| a.status.blocks_slot() && a.overlaps(from, to))
            .collect())
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    async fn load_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor> {
        self.doctors
            .get_doctor(doctor_id, auth_token)
            .await
            .map_err(|err| match err.downcast_ref::<DoctorError>() {
                Some(DoctorError::NotFound) => AppointmentError::DoctorNotFound.into(),
                _ => err,
            })
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        booked_by: Option<&str>,
        auth_token: &str,
    ) -> Result<Appointment> {
        debug!("Booking appointment with doctor {} at {}", request.doctor_id, request.start_time);

        if self.slot_minutes <= 0 {
            return Err(AppointmentError::InvalidTime("Slot duration must be positive".to_string()).into());
        }

        let doctor = self.load_doctor(request.doctor_id, auth_token).await?;
        if !doctor.active {
            return Err(AppointmentError::ValidationError(format!(
                "{} is not accepting appointments",
                doctor.name
            ))
            .into());
        }

        let start_time = request.start_time;
        let end_time = start_time + self.slot_duration();

        if !self.is_slot_available(doctor.id, start_time, auth_token).await? {
            return Err(AppointmentError::SlotUnavailable.into());
        }

        let mut patient_name = request.patient_name.filter(|n| !n.trim().is_empty());
        let mut patient_phone = request.patient_phone.map(|p| normalize_phone(&p)).filter(|p| !p.is_empty());
        let mut patient_email = request.patient_email;
        let mut patient_cpf = request.patient_cpf;

        if let Some(patient_id) = request.patient_id {
            let patient = self.patients.get_patient(patient_id, auth_token).await?;
            patient_name.get_or_insert(patient.full_name);
            patient_phone.get_or_insert(patient.whatsapp_number);
            if patient_email.is_none() {
                patient_email = patient.email;
            }
            if patient_cpf.is_none() {
                patient_cpf = patient.cpf;
            }
        }

        let (Some(patient_name), Some(patient_phone)) = (patient_name, patient_phone) else {
            return Err(AppointmentError::ValidationError(
                "Patient name and phone are required".to_string(),
            )
            .into());
        };

        let price = request.price.unwrap_or(match request.appointment_type {
            AppointmentType::Return => doctor.price_for_return(),
            AppointmentType::Consultation | AppointmentType::Exam => doctor.consultation_price,
        });

        let appointment: Appointment = self
            .supabase
            .insert(
                "appointments",
                auth_token,
                json!({
                    "patient_id": request.patient_id,
                    "patient_name": patient_name,
                    "patient_phone": patient_phone,
                    "patient_email": patient_email,
                    "patient_cpf": patient_cpf,
                    "doctor_id": doctor.id,
                    "specialty_id": request.specialty_id,
                    "appointment_type": request.appointment_type,
                    "start_time": start_time,
                    "end_time": end_time,
                    "status": AppointmentStatus::Pending,
                    "reason": request.reason,
                    "notes": request.notes,
                    "insurance_used": request.insurance_used,
                    "price": price,
                    "confirmed_by_patient": false,
                    "reminder_sent": false,
                    "booked_via": request.booked_via,
                    "booked_by": booked_by,
                    "created_at": Utc::now(),
                    "updated_at": Utc::now()
                }),
            )
            .await?;

        info!("Appointment {} booked with {}", appointment.id, doctor.name);

        self.write_history(
            appointment.id,
            HistoryAction::Created,
            NewHistoryEntry {
                description: Some(format!("Booked via {}", request.booked_via.as_str())),
                user_id: booked_by.map(str::to_string),
                ..Default::default()
            },
            auth_token,
        )
        .await;

        Ok(appointment)
    }

    /// Returns `false` when the appointment does not exist.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
        user_id: Option<&str>,
        auth_token: &str,
    ) -> Result<bool> {
        let Some(appointment) = self.find_appointment(appointment_id, auth_token).await? else {
            return Ok(false);
        };

        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        self.patch_appointment(
            appointment_id,
            json!({
                "status": AppointmentStatus::Cancelled,
                "updated_at": Utc::now()
            }),
            auth_token,
        )
        .await?;

        info!("Appointment {} cancelled", appointment_id);

        self.write_history(
            appointment_id,
            HistoryAction::Cancelled,
            NewHistoryEntry {
                description: reason,
                user_id: user_id.map(str::to_string),
                ..Default::default()
            },
            auth_token,
        )
        .await;

        Ok(true)
    }

    /// Confirms a pending appointment. Anything else is left untouched and
    /// reported as `false`.
    pub async fn confirm_appointment(
        &self,
        appointment_id: Uuid,
        user_id: Option<&str>,
        auth_token: &str,
    ) -> Result<bool> {
        let Some(appointment) = self.find_appointment(appointment_id, auth_token).await? else {
            return Ok(false);
        };
        if appointment.status != AppointmentStatus::Pending {
            debug!(
                "Appointment {} is {}, not confirming",
                appointment_id, appointment.status
            );
            return Ok(false);
        }

        self.patch_appointment(
            appointment_id,
            json!({
                "status": AppointmentStatus::Confirmed,
                "confirmed_at": Utc::now(),
                "updated_at": Utc::now()
            }),
            auth_token,
        )
        .await?;

        self.write_history(
            appointment_id,
            HistoryAction::Confirmed,
            NewHistoryEntry {
                user_id: user_id.map(str::to_string),
                ..Default::default()
            },
            auth_token,
        )
        .await;

        Ok(true)
    }

    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        user_id: Option<&str>,
        auth_token: &str,
    ) -> Result<Appointment> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if !self.lifecycle.can_reschedule(appointment.status) {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status,
                to: AppointmentStatus::Rescheduled,
            }
            .into());
        }

        let doctor_id = request.new_doctor_id.unwrap_or(appointment.doctor_id);
        if doctor_id != appointment.doctor_id {
            self.load_doctor(doctor_id, auth_token).await?;
        }

        let new_start = request.new_start_time;
        if !self
            .slot_is_free(doctor_id, new_start, Some(appointment_id), auth_token)
            .await?
        {
            return Err(AppointmentError::SlotUnavailable.into());
        }

        let updated = self
            .patch_appointment(
                appointment_id,
                json!({
                    "doctor_id": doctor_id,
                    "start_time": new_start,
                    "end_time": new_start + self.slot_duration(),
                    "status": AppointmentStatus::Pending,
                    "confirmed_at": Value::Null,
                    "reminder_sent": false,
                    "reminder_sent_at": Value::Null,
                    "updated_at": Utc::now()
                }),
                auth_token,
            )
            .await?;

        info!(
            "Appointment {} moved from {} to {}",
            appointment_id, appointment.start_time, new_start
        );

        self.write_history(
            appointment_id,
            HistoryAction::Rescheduled,
            NewHistoryEntry {
                description: None,
                user_id: user_id.map(str::to_string),
                previous_start_time: Some(appointment.start_time),
                previous_doctor_id: Some(appointment.doctor_id),
            },
            auth_token,
        )
        .await;

        Ok(updated)
    }

    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        user_id: Option<&str>,
        auth_token: &str,
    ) -> Result<Appointment> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(appointment.status, status)?;

        let mut body = json!({
            "status": status,
            "updated_at": Utc::now()
        });
        if status == AppointmentStatus::Confirmed {
            body["confirmed_at"] = json!(Utc::now());
        }

        let updated = self.patch_appointment(appointment_id, body, auth_token).await?;

        self.write_history(
            appointment_id,
            HistoryAction::for_status(status),
            NewHistoryEntry {
                description: Some(format!("Status changed from {} to {}", appointment.status, status)),
                user_id: user_id.map(str::to_string),
                ..Default::default()
            },
            auth_token,
        )
        .await;

        Ok(updated)
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn find_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        self.supabase.select_one(&path, auth_token).await
    }

    pub async fn get_appointment(&self, appointment_id: Uuid, auth_token: &str) -> Result<Appointment> {
        self.find_appointment(appointment_id, auth_token)
            .await?
            .ok_or_else(|| AppointmentError::NotFound.into())
    }

    pub async fn get_doctor_appointments(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=start_time.asc",
            doctor_id
        );
        if let Some(date) = date {
            let (from, to) = local_day_bounds(date, self.offset)
                .ok_or_else(|| AppointmentError::InvalidTime(format!("Invalid date {}", date)))?;
            path.push_str(&format!("&start_time=gte.{}&start_time=lt.{}", ts(from), ts(to)));
        }
        self.supabase.select(&path, auth_token).await
    }

    /// Most recent first.
    pub async fn get_patient_appointments(&self, phone: &str, auth_token: &str) -> Result<Vec<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?patient_phone=eq.{}&order=start_time.desc",
            normalize_phone(phone)
        );
        self.supabase.select(&path, auth_token).await
    }

    pub async fn list_appointments(
        &self,
        filters: AppointmentFilters,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let mut query_parts = vec!["order=start_time.asc".to_string()];

        if let Some(doctor_id) = filters.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(phone) = filters.patient_phone {
            query_parts.push(format!("patient_phone=eq.{}", normalize_phone(&phone)));
        }
        if let Some(status) = filters.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some((from, _)) = filters.date_from.and_then(|d| local_day_bounds(d, self.offset)) {
            query_parts.push(format!("start_time=gte.{}", ts(from)));
        }
        if let Some((_, to)) = filters.date_to.and_then(|d| local_day_bounds(d, self.offset)) {
            query_parts.push(format!("start_time=lt.{}", ts(to)));
        }
        query_parts.push(format!("limit={}", filters.limit.unwrap_or(100).clamp(1, 500)));

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        self.supabase.select(&path, auth_token).await
    }

    pub async fn get_history(&self, appointment_id: Uuid, auth_token: &str) -> Result<Vec<AppointmentHistory>> {
        self.get_appointment(appointment_id, auth_token).await?;
        self.history.list(appointment_id, auth_token).await
    }

    // ==========================================================================
    // REMINDERS
    // ==========================================================================

    /// Pending or confirmed appointments starting within `window` that have not
    /// been reminded yet.
    pub async fn appointments_due_for_reminder(
        &self,
        window: Duration,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        let now = Utc::now();
        let path = format!(
            "/rest/v1/appointments?status=in.(pending,confirmed)&reminder_sent=eq.false&start_time=gte.{}&start_time=lte.{}&order=start_time.asc",
            ts(now),
            ts(now + window)
        );
        let appointments: Vec<Appointment> = self.supabase.select(&path, auth_token).await?;
        Ok(appointments
            .into_iter()
            .filter(|a| a.status.blocks_slot() && !a.reminder_sent)
            .collect())
    }

    pub async fn mark_reminder_sent(&self, appointment_id: Uuid, auth_token: &str) -> Result<Appointment> {
        let updated = self
            .patch_appointment(
                appointment_id,
                json!({
                    "reminder_sent": true,
                    "reminder_sent_at": Utc::now(),
                    "updated_at": Utc::now()
                }),
                auth_token,
            )
            .await?;

        self.write_history(
            appointment_id,
            HistoryAction::ReminderSent,
            NewHistoryEntry {
                description: Some("WhatsApp reminder sent".to_string()),
                ..Default::default()
            },
            auth_token,
        )
        .await;

        Ok(updated)
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn patch_appointment(&self, appointment_id: Uuid, body: Value, auth_token: &str) -> Result<Appointment> {
        let filter = format!("id=eq.{}", appointment_id);
        let mut rows: Vec<Appointment> = self
            .supabase
            .update("appointments", &filter, auth_token, body)
            .await?;
        if rows.is_empty() {
            return Err(AppointmentError::NotFound.into());
        }
        Ok(rows.remove(0))
    }

    // History is an audit trail; a failed write must not undo the booking change.
    async fn write_history(
        &self,
        appointment_id: Uuid,
        action: HistoryAction,
        entry: NewHistoryEntry,
        auth_token: &str,
    ) {
        if let Err(e) = self.history.record(appointment_id, action, entry, auth_token).await {
            warn!("Failed to record {:?} history for {}: {}", action, appointment_id, e);
        }
    }
}
