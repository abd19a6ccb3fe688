use std::fmt::Write;

use chrono::{DateTime, Datelike, FixedOffset};
use clinic_cell::models::{ClinicInfo, Exam};
use doctor_cell::models::{Doctor, WorkingHours};

use crate::utils::formatters::{format_currency, format_datetime, format_list, format_medical_specialty};

/// ISO weekday (1 = Monday) in Portuguese.
fn weekday_name(weekday: i32) -> Option<&'static str> {
    match weekday {
        1 => Some("segunda-feira"),
        2 => Some("terça-feira"),
        3 => Some("quarta-feira"),
        4 => Some("quinta-feira"),
        5 => Some("sexta-feira"),
        6 => Some("sábado"),
        7 => Some("domingo"),
        _ => None,
    }
}

fn working_days(doctor: &Doctor, working_hours: &[WorkingHours]) -> Vec<&'static str> {
    let mut weekdays: Vec<i32> = working_hours
        .iter()
        .filter(|h| h.active && h.doctor_id == doctor.id)
        .map(|h| h.weekday)
        .collect();
    weekdays.sort_unstable();
    weekdays.dedup();
    weekdays.into_iter().filter_map(weekday_name).collect()
}

/// System prompt for the WhatsApp assistant, built from the clinic's current
/// data. `now` is the clinic's local time and anchors relative dates.
pub fn build_system_prompt(
    clinic: Option<&ClinicInfo>,
    doctors: &[Doctor],
    working_hours: &[WorkingHours],
    exams: &[Exam],
    now: DateTime<FixedOffset>,
) -> String {
    let mut prompt = String::new();

    match clinic {
        Some(info) => {
            let secretary = if info.secretary_name.trim().is_empty() {
                "a secretária virtual"
            } else {
                info.secretary_name.as_str()
            };
            let _ = writeln!(
                prompt,
                "Você é {}, secretária da clínica {}. Atenda os pacientes pelo WhatsApp de forma cordial e objetiva.",
                secretary, info.name
            );
            if !info.general_goal.trim().is_empty() {
                let _ = writeln!(prompt, "Objetivo da clínica: {}", info.general_goal);
            }
            if !info.address.trim().is_empty() {
                let _ = write!(prompt, "Endereço: {}", info.address);
                if let Some(reference) = info.location_reference.as_deref().filter(|r| !r.is_empty()) {
                    let _ = write!(prompt, " ({})", reference);
                }
                prompt.push('\n');
            }
            if !info.contact_phone.trim().is_empty() {
                let _ = writeln!(prompt, "Telefone: {}", info.contact_phone);
            }
            if let Some(hours) = info.opening_hours.as_deref().filter(|h| !h.is_empty()) {
                let _ = writeln!(prompt, "Horário de funcionamento: {}", hours);
            }
            if let Some(policy) = info.scheduling_policy.as_deref().filter(|p| !p.is_empty()) {
                let _ = writeln!(prompt, "Política de agendamento: {}", policy);
            }
            if info.accepted_insurances.is_empty() {
                prompt.push_str("Não atendemos por planos de saúde.\n");
            } else {
                let _ = writeln!(
                    prompt,
                    "Planos de saúde aceitos (exclusivamente): {}. Se o paciente perguntar por outro plano, informe que não o aceitamos.",
                    info.accepted_insurances.join(", ")
                );
            }
            if let Some(price) = info.private_consultation_price {
                let _ = writeln!(prompt, "Consulta particular: {}", format_currency(price));
            }
        }
        None => {
            prompt.push_str(
                "Você é a secretária virtual de uma clínica médica. Atenda os pacientes pelo WhatsApp de forma cordial e objetiva.\n",
            );
        }
    }

    let today = weekday_name(now.weekday().number_from_monday() as i32).unwrap_or_default();
    let _ = writeln!(
        prompt,
        "Hoje é {}, {} (horário da clínica). Use esta data para interpretar \"hoje\", \"amanhã\" e dias da semana.",
        today,
        format_datetime(Some(now))
    );

    let active: Vec<&Doctor> = doctors.iter().filter(|d| d.active).collect();
    if !active.is_empty() {
        prompt.push_str("\nMédicos:\n");
        for doctor in active {
            let _ = write!(prompt, "- {}", doctor.name);
            if !doctor.specialties.is_empty() {
                let specialties: Vec<String> =
                    doctor.specialties.iter().map(|s| format_medical_specialty(s)).collect();
                let _ = write!(prompt, " ({})", specialties.join(", "));
            }
            let _ = write!(prompt, ": consulta {}", format_currency(doctor.consultation_price));
            if let Some(return_price) = doctor.return_price {
                let _ = write!(prompt, ", retorno {}", format_currency(return_price));
            }
            if !doctor.insurances.is_empty() {
                let _ = write!(prompt, "; convênios: {}", doctor.insurances.join(", "));
            }
            if !doctor.accepts_private {
                prompt.push_str("; não atende particular");
            }
            let days = working_days(doctor, working_hours);
            if !days.is_empty() {
                let _ = write!(prompt, "; atende {}", format_list(&days, ", ", days.len()));
            }
            prompt.push('\n');
        }
    }

    if !exams.is_empty() {
        prompt.push_str("\nExames:\n");
        for exam in exams {
            let _ = write!(prompt, "- {}: {}", exam.name, format_currency(exam.price));
            if let Some(preparation) = exam.preparation.as_deref().filter(|p| !p.is_empty()) {
                let _ = write!(prompt, ". Preparo: {}", preparation);
            }
            prompt.push('\n');
        }
    }

    prompt.push_str(
        "\nRegras:\n\
         1. Faça sempre uma pergunta por vez ao paciente.\n\
         2. Use emojis e símbolos para facilitar a leitura.\n\
         3. Nunca invente informações, preços, médicos ou horários que não estejam listados aqui.\n\
         4. Não dê diagnósticos nem orientações médicas.\n\
         \nComandos (escreva exatamente neste formato quando necessário):\n\
         - Para consultar horários livres: [CONSULTAR_AGENDA: <nome do médico>, <data AAAA-MM-DD>]\n\
         - Quando o paciente confirmar médico, data e horário: [CRIAR_AGENDAMENTO: <nome do paciente>, <médico>, <data>, <horário>]\n\
         - Para transferir a conversa para a equipe: [DIRECIONAR: <tipo>] onde tipo é appointment_request, complex_question, human_request ou specific_information\n",
    );

    prompt
}
