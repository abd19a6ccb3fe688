use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ClinicError, CreateExamRequest, Exam, UpdateExamRequest};

pub struct ExamService {
    supabase: SupabaseClient,
}

impl ExamService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_exams(&self, auth_token: &str) -> Result<Vec<Exam>> {
        self.supabase
            .select("/rest/v1/exams?order=name.asc", auth_token)
            .await
    }

    pub async fn get_exam(&self, exam_id: Uuid, auth_token: &str) -> Result<Exam> {
        let path = format!("/rest/v1/exams?id=eq.{}", exam_id);
        self.supabase
            .select_one(&path, auth_token)
            .await?
            .ok_or_else(|| ClinicError::ExamNotFound.into())
    }

    pub async fn create_exam(&self, request: CreateExamRequest, auth_token: &str) -> Result<Exam> {
        validate_exam(&request.name, request.price)?;

        let exam: Exam = self
            .supabase
            .insert(
                "exams",
                auth_token,
                json!({
                    "name": request.name.trim(),
                    "what_it_is": request.what_it_is,
                    "how_it_works": request.how_it_works,
                    "preparation": request.preparation,
                    "advantage": request.advantage,
                    "price": request.price,
                }),
            )
            .await?;

        info!("Exam created: {} ({})", exam.name, exam.id);
        Ok(exam)
    }

    pub async fn update_exam(
        &self,
        exam_id: Uuid,
        request: UpdateExamRequest,
        auth_token: &str,
    ) -> Result<Exam> {
        debug!("Updating exam {}", exam_id);

        let mut data = serde_json::Map::new();
        if let Some(name) = request.name {
            validate_exam(&name, request.price.unwrap_or(0.0))?;
            data.insert("name".to_string(), json!(name.trim()));
        }
        if let Some(price) = request.price {
            if price < 0.0 {
                return Err(ClinicError::ValidationError("Exam price cannot be negative".to_string()).into());
            }
            data.insert("price".to_string(), json!(price));
        }
        if let Some(what_it_is) = request.what_it_is {
            data.insert("what_it_is".to_string(), json!(what_it_is));
        }
        if let Some(how_it_works) = request.how_it_works {
            data.insert("how_it_works".to_string(), json!(how_it_works));
        }
        if let Some(preparation) = request.preparation {
            data.insert("preparation".to_string(), json!(preparation));
        }
        if let Some(advantage) = request.advantage {
            data.insert("advantage".to_string(), json!(advantage));
        }

        let filter = format!("id=eq.{}", exam_id);
        let mut rows: Vec<Exam> = self
            .supabase
            .update("exams", &filter, auth_token, Value::Object(data))
            .await?;

        if rows.is_empty() {
            return Err(ClinicError::ExamNotFound.into());
        }
        Ok(rows.remove(0))
    }
}

fn validate_exam(name: &str, price: f64) -> Result<(), ClinicError> {
    if name.trim().is_empty() {
        return Err(ClinicError::ValidationError("Exam name is required".to_string()));
    }
    if price < 0.0 {
        return Err(ClinicError::ValidationError("Exam price cannot be negative".to_string()));
    }
    Ok(())
}
