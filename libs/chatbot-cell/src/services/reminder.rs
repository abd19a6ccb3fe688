use anyhow::Result;
use chrono::Duration;
use tracing::{error, info};

use appointment_cell::services::SchedulingService;
use shared_config::AppConfig;

use crate::models::ReminderReport;
use crate::services::whatsapp::WhatsAppService;

pub const REMINDER_TEMPLATE: &str = "appointment_reminder";
const REMINDER_WINDOW_HOURS: i64 = 24;

pub struct ReminderService {
    scheduling: SchedulingService,
    whatsapp: WhatsAppService,
}

impl ReminderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            scheduling: SchedulingService::new(config),
            whatsapp: WhatsAppService::new(config),
        }
    }

    /// Sends the reminder template for appointments in the next 24 hours. An
    /// appointment is only marked once its message was accepted.
    pub async fn send_due_reminders(&self, auth_token: &str) -> Result<ReminderReport> {
        let due = self
            .scheduling
            .appointments_due_for_reminder(Duration::hours(REMINDER_WINDOW_HOURS), auth_token)
            .await?;

        let mut report = ReminderReport {
            checked: due.len(),
            ..Default::default()
        };

        for appointment in due {
            if let Err(err) = self
                .whatsapp
                .send_template_message(&appointment.patient_phone, REMINDER_TEMPLATE, None)
                .await
            {
                error!("Reminder for appointment {} not sent: {}", appointment.id, err);
                report.failed += 1;
                continue;
            }

            match self.scheduling.mark_reminder_sent(appointment.id, auth_token).await {
                Ok(_) => report.sent += 1,
                Err(err) => {
                    error!("Reminder for appointment {} sent but not recorded: {}", appointment.id, err);
                    report.failed += 1;
                }
            }
        }

        info!(
            checked = report.checked,
            sent = report.sent,
            failed = report.failed,
            "Reminder dispatch finished"
        );
        Ok(report)
    }
}
