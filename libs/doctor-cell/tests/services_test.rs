use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::{CreateDoctorRequest, CreateWorkingHoursRequest, DoctorError};
use doctor_cell::services::{DoctorService, WorkingHoursService};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "test-token";

fn create_request(crm: &str) -> CreateDoctorRequest {
    CreateDoctorRequest {
        name: "Dra. Helena Prado".to_string(),
        crm: crm.to_string(),
        bio: None,
        education: None,
        insurances: Some(vec!["Unimed".to_string()]),
        accepts_private: None,
        consultation_price: 500.0,
        return_price: Some(250.0),
        payment_methods: None,
        return_info: None,
        consultation_minutes: None,
        professional_email: None,
        professional_phone: None,
        specialty_ids: vec![],
    }
}

#[tokio::test]
async fn find_doctor_by_name_uses_partial_case_insensitive_match() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("name", "ilike.*Helena*"))
        .and(query_param("active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id, "Dra. Helena Prado")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = DoctorService::new(&config);

    let doctor = service
        .find_doctor_by_name("Dra. Helena", TOKEN)
        .await
        .unwrap()
        .expect("doctor should resolve");

    assert_eq!(doctor.id.to_string(), doctor_id);
    assert_eq!(doctor.specialties_display(), "Pneumologia, Medicina do Sono");
}

#[tokio::test]
async fn blank_name_does_not_query() {
    let config = TestConfig::default().to_app_config();
    let service = DoctorService::new(&config);

    assert!(service.find_doctor_by_name("Dr. ", TOKEN).await.unwrap().is_none());
}

#[tokio::test]
async fn create_doctor_rejects_duplicate_crm() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": Uuid::new_v4()}])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = DoctorService::new(&config);

    let err = service
        .create_doctor(create_request("CRM-SP 123456"), TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err.downcast_ref::<DoctorError>(), Some(DoctorError::DuplicateCrm(_)));
}

#[tokio::test]
async fn list_doctors_filters_by_specialty_name() {
    let mock_server = MockServer::start().await;
    let mut other = MockSupabaseResponses::doctor_response(&Uuid::new_v4().to_string(), "Dr. Paulo Lima");
    other["specialties"] = json!([{"specialties": {"name": "Cardiologia"}}]);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&Uuid::new_v4().to_string(), "Dra. Helena Prado"),
            other
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = DoctorService::new(&config);

    let doctors = service.list_doctors(true, Some("cardiologia"), TOKEN).await.unwrap();
    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].name, "Dr. Paulo Lima");

    let all = service.list_doctors(true, None, TOKEN).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn duplicate_working_hours_start_is_conflict() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/working_hours"))
        .and(query_param("start_time", "eq.08:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::working_hours_response(&doctor_id.to_string(), 1, "08:00:00", "12:00:00")
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = WorkingHoursService::new(&config);

    let request = CreateWorkingHoursRequest {
        weekday: 1,
        start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
    };
    let err = service.create_working_hours(doctor_id, request, TOKEN).await.unwrap_err();

    assert_matches!(
        err.downcast_ref::<DoctorError>(),
        Some(DoctorError::DuplicateWorkingHours(_))
    );
}

#[tokio::test]
async fn weekday_hours_come_back_ordered_by_start() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let id = doctor_id.to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/working_hours"))
        .and(query_param("weekday", "eq.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::working_hours_response(&id, 3, "14:00:00", "18:00:00"),
            MockSupabaseResponses::working_hours_response(&id, 3, "08:00:00", "12:00:00")
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = WorkingHoursService::new(&config);

    let hours = service.get_working_hours_for_weekday(doctor_id, 3, TOKEN).await.unwrap();
    assert_eq!(hours.len(), 2);
    assert_eq!(hours[0].start_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
}

#[tokio::test]
async fn active_hours_are_listed_for_every_doctor() {
    let mock_server = MockServer::start().await;
    let first = Uuid::new_v4().to_string();
    let second = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/working_hours"))
        .and(query_param("active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::working_hours_response(&first, 1, "08:00:00", "12:00:00"),
            MockSupabaseResponses::working_hours_response(&second, 4, "13:00:00", "17:00:00")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = WorkingHoursService::new(&config);

    let hours = service.list_active_working_hours(TOKEN).await.unwrap();
    assert_eq!(hours.len(), 2);
    assert_eq!(hours[1].weekday, 4);
}

#[tokio::test]
async fn unavailability_covers_inclusive_range() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_unavailability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "kind": "vacation",
            "start_date": "2024-07-01",
            "end_date": "2024-07-15",
            "reason": "Férias"
        }])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let service = WorkingHoursService::new(&config);

    let last_day = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
    assert!(service.is_unavailable_on(doctor_id, last_day, TOKEN).await.unwrap());
}
