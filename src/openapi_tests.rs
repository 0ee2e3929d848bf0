#[cfg(test)]
mod tests {
    use crate::schemas::ApiDoc;
    use utoipa::openapi::{PathItemType, RefOr, schema::Schema};
    use utoipa::OpenApi;

    fn object_properties(name: &str) -> Vec<String> {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.expect("components");
        match components.schemas.get(name) {
            Some(RefOr::T(Schema::Object(obj))) => obj.properties.keys().cloned().collect(),
            _ => panic!("{} should be an object schema", name),
        }
    }

    #[test]
    fn test_openapi_schema_generation() {
        let openapi = ApiDoc::openapi();

        let components = openapi.components.as_ref().expect("components");
        for schema in [
            "ErrorResponse",
            "HealthResponse",
            "UserResponse",
            "PenaltyResponse",
            "ContributionResponse",
            "PaymentResponse",
            "MeetingResponse",
            "AttendanceResponse",
            "ProjectResponse",
            "AnnouncementResponse",
            "OfficerResponse",
            "SettingsResponse",
            "DashboardSummary",
        ] {
            assert!(components.schemas.contains_key(schema), "missing schema {}", schema);
        }

        assert!(serde_json::to_string(&openapi).is_ok());
    }

    #[test]
    fn test_error_response_schema_structure() {
        let properties = object_properties("ErrorResponse");
        for field in ["error", "code", "success"] {
            assert!(properties.iter().any(|p| p == field), "missing {}", field);
        }
    }

    #[test]
    fn test_health_response_schema_structure() {
        let properties = object_properties("HealthResponse");
        for field in ["status", "version", "database"] {
            assert!(properties.iter().any(|p| p == field), "missing {}", field);
        }
    }

    #[test]
    fn test_openapi_paths_contain_health_endpoint() {
        let openapi = ApiDoc::openapi();

        let health_path = openapi.paths.paths.get("/health").expect("/health documented");
        let health_get = health_path
            .operations
            .get(&PathItemType::Get)
            .expect("GET /health documented");

        assert!(health_get.responses.responses.contains_key("200"));
        assert!(health_get.responses.responses.contains_key("500"));
        assert!(health_get.security.is_none());

        // An unhealthy service still answers with the health payload
        let json = serde_json::to_value(&openapi).unwrap();
        let unhealthy = &json["paths"]["/health"]["get"]["responses"]["500"];
        assert_eq!(
            unhealthy["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/HealthResponse"
        );
    }

    #[test]
    fn test_money_and_attendance_operations_are_documented() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        let expected = [
            ("/api/v1/auth/login", PathItemType::Post, "POST"),
            ("/api/v1/penalties/{penalty_id}/payments", PathItemType::Post, "POST"),
            ("/api/v1/penalties/{penalty_id}/payments", PathItemType::Get, "GET"),
            ("/api/v1/penalties/{penalty_id}/waive", PathItemType::Post, "POST"),
            ("/api/v1/contributions/{contribution_id}/payments", PathItemType::Post, "POST"),
            ("/api/v1/contribution-batches", PathItemType::Post, "POST"),
            ("/api/v1/meetings/{meeting_id}/qr", PathItemType::Post, "POST"),
            ("/api/v1/meetings/{meeting_id}/finalize", PathItemType::Post, "POST"),
            ("/api/v1/attendance/scan", PathItemType::Post, "POST"),
            (
                "/api/v1/projects/{project_id}/expenses/{expense_id}",
                PathItemType::Delete,
                "DELETE",
            ),
            ("/api/v1/announcements/{announcement_id}/publish", PathItemType::Post, "POST"),
            ("/api/v1/overdue/scan", PathItemType::Post, "POST"),
        ];
        for (path, method, label) in expected {
            let item = paths
                .get(path)
                .unwrap_or_else(|| panic!("{} is not documented", path));
            assert!(
                item.operations.contains_key(&method),
                "{} {} is not documented",
                label,
                path
            );
        }
    }

    #[test]
    fn test_bearer_security_scheme_is_registered() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));

        let json = serde_json::to_value(&openapi).unwrap();
        let scheme = &json["components"]["securitySchemes"]["bearer_auth"];
        assert_eq!(scheme["type"], "http");
        assert_eq!(scheme["scheme"], "bearer");

        // Protected operations reference the scheme
        let penalties = &json["paths"]["/api/v1/penalties"]["get"]["security"];
        assert!(penalties.to_string().contains("bearer_auth"));
    }

    #[test]
    fn test_all_error_responses_reference_correct_schema() {
        let openapi = ApiDoc::openapi();
        let openapi_json = serde_json::to_string(&openapi).unwrap();

        assert!(!openapi_json.contains("crate.schemas.ErrorResponse"));
        assert!(!openapi_json.contains("crate::schemas::ErrorResponse"));
        assert!(openapi_json.contains("#/components/schemas/ErrorResponse"));
    }
}
