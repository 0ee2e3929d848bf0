#[cfg(test)]
mod integration_tests {
    use crate::schemas::ApiResponse;
    use crate::test_utils::{setup_test_app, TestApp, TEST_PASSWORD};
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::str::FromStr;

    fn decimal(value: &Value) -> Decimal {
        match value {
            Value::String(s) => Decimal::from_str(s).expect("decimal string"),
            other => Decimal::from_str(&other.to_string()).expect("decimal number"),
        }
    }

    async fn create_penalty(app: &TestApp, admin: &str, parent_id: i32, amount: &str) -> Value {
        let response = app
            .post_as("/api/v1/penalties", admin)
            .json(&json!({
                "parent_id": parent_id,
                "reason": "Missed general assembly",
                "amount": amount,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        body.data
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_test_app().await;

        let response = app.server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_register_verify_and_login() {
        let app = setup_test_app().await;

        let response = app
            .server
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": "Maria.Santos@Example.com",
                "password": TEST_PASSWORD,
                "first_name": "Maria",
                "last_name": "Santos",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert!(body.success);
        assert_eq!(body.data["email"], "maria.santos@example.com");
        assert_eq!(body.data["role"], "PARENT");
        assert_eq!(body.data["is_verified"], false);

        // Unverified accounts cannot log in yet
        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "maria.santos@example.com", "password": TEST_PASSWORD }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = app
            .server
            .post("/api/v1/auth/verify-email")
            .json(&json!({ "email": "maria.santos@example.com", "code": "000000" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let code = app
            .mailer
            .last_code_for("maria.santos@example.com")
            .expect("verification code was mailed");
        let response = app
            .server
            .post("/api/v1/auth/verify-email")
            .json(&json!({ "email": "maria.santos@example.com", "code": code }))
            .await;
        response.assert_status_ok();

        // Verifying twice is rejected
        let response = app
            .server
            .post("/api/v1/auth/verify-email")
            .json(&json!({ "email": "maria.santos@example.com", "code": code }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "MARIA.SANTOS@example.com", "password": TEST_PASSWORD }))
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.message, "Login successful");
        assert_eq!(body.data["token_type"], "Bearer");
        let token = body.data["token"].as_str().unwrap().to_string();

        let response = app.get_as("/api/v1/auth/me", &token).await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["first_name"], "Maria");
        assert_eq!(body.data["is_verified"], true);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let app = setup_test_app().await;
        app.insert_user("taken@example.com", model::entities::user::UserRole::Parent)
            .await;

        let response = app
            .server
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": "Taken@example.com",
                "password": TEST_PASSWORD,
                "first_name": "Other",
                "last_name": "Person",
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let app = setup_test_app().await;
        app.insert_user("parent@example.com", model::entities::user::UserRole::Parent)
            .await;

        let response = app
            .server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "parent@example.com", "password": "not-the-password" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["error"], "Invalid email or password");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_forgot_password_does_not_reveal_unknown_accounts() {
        let app = setup_test_app().await;

        let response = app
            .server
            .post("/api/v1/auth/forgot-password")
            .json(&json!({ "email": "nobody@example.com" }))
            .await;

        response.assert_status_ok();
        assert!(app.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let app = setup_test_app().await;
        app.insert_user("parent@example.com", model::entities::user::UserRole::Parent)
            .await;

        app.server
            .post("/api/v1/auth/forgot-password")
            .json(&json!({ "email": "parent@example.com" }))
            .await
            .assert_status_ok();
        let code = app
            .mailer
            .last_code_for("parent@example.com")
            .expect("reset code was mailed");

        app.server
            .post("/api/v1/auth/reset-password")
            .json(&json!({
                "email": "parent@example.com",
                "code": code,
                "new_password": "a-brand-new-secret",
            }))
            .await
            .assert_status_ok();

        app.server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "parent@example.com", "password": TEST_PASSWORD }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": "parent@example.com", "password": "a-brand-new-secret" }))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_protected_routes_require_token_and_role() {
        let app = setup_test_app().await;
        let (_, parent_token) = app.parent("parent@example.com").await;

        app.server
            .get("/api/v1/penalties")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.get_as("/api/v1/penalties", "garbage-token")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        app.get_as("/api/v1/users", &parent_token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.get_as("/api/v1/dashboard", &parent_token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.post_as("/api/v1/meetings", &parent_token)
            .json(&json!({
                "title": "Parents' night",
                "meeting_date": "2030-01-10T18:00:00",
            }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_cannot_deactivate_self() {
        let app = setup_test_app().await;
        let (admin, admin_token) = app.admin().await;
        let (parent, parent_token) = app.parent("parent@example.com").await;

        let response = app
            .put_as(&format!("/api/v1/users/{}", admin.id), &admin_token)
            .json(&json!({ "is_active": false }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        app.delete_as(&format!("/api/v1/users/{}", parent.id), &admin_token)
            .await
            .assert_status_ok();

        // Deactivated accounts lose access immediately
        app.get_as("/api/v1/auth/me", &parent_token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_penalty_payment_lifecycle() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (parent, parent_token) = app.parent("parent@example.com").await;

        let penalty = create_penalty(&app, &admin_token, parent.id, "500").await;
        let penalty_id = penalty["id"].as_i64().unwrap();
        assert_eq!(penalty["payment_status"], "UNPAID");
        assert_eq!(decimal(&penalty["balance"]), Decimal::new(500, 0));

        let payments_path = format!("/api/v1/penalties/{}/payments", penalty_id);
        let response = app
            .post_as(&payments_path, &admin_token)
            .json(&json!({ "amount": "200", "method": "CASH" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["penalty"]["payment_status"], "PARTIAL");
        assert_eq!(decimal(&body.data["penalty"]["balance"]), Decimal::new(300, 0));
        assert_eq!(decimal(&body.data["payment"]["amount"]), Decimal::new(200, 0));

        // More than the remaining balance is refused
        app.post_as(&payments_path, &admin_token)
            .json(&json!({ "amount": "301", "method": "CASH" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .post_as(&payments_path, &admin_token)
            .json(&json!({ "amount": "300", "method": "GCASH", "reference": "GC-1029" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["penalty"]["payment_status"], "PAID");
        assert_eq!(body.data["penalty"]["is_paid"], true);
        assert!(decimal(&body.data["penalty"]["balance"]).is_zero());

        let response = app
            .post_as(&payments_path, &admin_token)
            .json(&json!({ "amount": "1", "method": "CASH" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "Record is already fully paid");

        // The parent sees the history, but cannot record payments
        let response = app.get_as(&payments_path, &parent_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data.len(), 2);

        app.post_as(&payments_path, &parent_token)
            .json(&json!({ "amount": "1", "method": "CASH" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_waived_penalty_keeps_paid_part() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (parent, _) = app.parent("parent@example.com").await;

        let penalty = create_penalty(&app, &admin_token, parent.id, "100").await;
        let penalty_id = penalty["id"].as_i64().unwrap();
        app.post_as(&format!("/api/v1/penalties/{}/payments", penalty_id), &admin_token)
            .json(&json!({ "amount": "40", "method": "CASH" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = app
            .post_as(&format!("/api/v1/penalties/{}/waive", penalty_id), &admin_token)
            .json(&json!({ "reason": "Medical emergency" }))
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["payment_status"], "WAIVED");
        assert_eq!(decimal(&body.data["amount_paid"]), Decimal::new(40, 0));
        assert_eq!(decimal(&body.data["waived_amount"]), Decimal::new(60, 0));
        assert!(decimal(&body.data["balance"]).is_zero());
    }

    #[tokio::test]
    async fn test_parents_only_see_their_own_penalties() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (alice, alice_token) = app.parent("alice@example.com").await;
        let (bob, _) = app.parent("bob@example.com").await;

        create_penalty(&app, &admin_token, alice.id, "50").await;
        let bobs = create_penalty(&app, &admin_token, bob.id, "50").await;

        let response = app.get_as("/api/v1/penalties", &alice_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0]["parent_id"], alice.id);

        app.get_as(&format!("/api/v1/penalties/{}", bobs["id"]), &alice_token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.get_as(&format!("/api/v1/penalties?parent_id={}", bob.id), &alice_token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_qr_check_in_and_finalize_meeting() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (_, alice_token) = app.parent("alice@example.com").await;
        let (bob, bob_token) = app.parent("bob@example.com").await;

        let started = (Utc::now().naive_utc() - Duration::minutes(5))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        let response = app
            .post_as("/api/v1/meetings", &admin_token)
            .json(&json!({
                "title": "First quarter assembly",
                "meeting_date": started,
                "location": "Gymnasium",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        let meeting_id = body.data["id"].as_i64().unwrap();
        assert_eq!(body.data["status"], "SCHEDULED");

        let response = app
            .post_as(&format!("/api/v1/meetings/{}/qr", meeting_id), &admin_token)
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        let qr_code = body.data["qr_code"].as_str().unwrap().to_string();

        // Parents never see the token through the meeting endpoints
        let response = app
            .get_as(&format!("/api/v1/meetings/{}", meeting_id), &alice_token)
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert!(body.data["qr_code"].is_null());

        app.post_as("/api/v1/attendance/scan", &alice_token)
            .json(&json!({ "meeting_id": meeting_id, "qr_code": "not-the-token" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .post_as("/api/v1/attendance/scan", &alice_token)
            .json(&json!({ "meeting_id": meeting_id, "qr_code": qr_code }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.message, "Checked in successfully");
        assert_eq!(body.data["status"], "PRESENT");
        assert_eq!(body.data["scanned_via_qr"], true);

        let response = app
            .post_as("/api/v1/attendance/scan", &alice_token)
            .json(&json!({ "meeting_id": meeting_id, "qr_code": qr_code }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "Attendance already recorded for this meeting");

        app.post_as("/api/v1/attendance/scan", &admin_token)
            .json(&json!({ "meeting_id": meeting_id, "qr_code": qr_code }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = app
            .post_as(&format!("/api/v1/meetings/{}/finalize", meeting_id), &admin_token)
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["absent_marked"], 1);
        assert_eq!(body.data["penalties_created"], 1);
        assert_eq!(decimal(&body.data["total_penalty_amount"]), Decimal::new(50, 0));

        // Bob missed the meeting and owes the configured absence fine
        let response = app.get_as("/api/v1/penalties", &bob_token).await;
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0]["parent_id"], bob.id);
        assert_eq!(body.data[0]["meeting_id"], meeting_id);
        assert_eq!(decimal(&body.data[0]["amount"]), Decimal::new(50, 0));

        let response = app.get_as("/api/v1/penalties", &alice_token).await;
        let body: ApiResponse<Vec<Value>> = response.json();
        assert!(body.data.is_empty());

        let response = app
            .get_as(
                &format!("/api/v1/meetings/{}/attendance-summary", meeting_id),
                &admin_token,
            )
            .await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["present"], 1);
        assert_eq!(body.data["absent"], 1);
        assert_eq!(body.data["via_qr"], 1);

        let response = app
            .get_as(&format!("/api/v1/meetings/{}", meeting_id), &admin_token)
            .await;
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["status"], "COMPLETED");
        assert!(body.data["qr_code"].is_null());

        // The old token stops working once the meeting is closed
        let (_, carol_token) = app.parent("carol@example.com").await;
        let response = app
            .post_as("/api/v1/attendance/scan", &carol_token)
            .json(&json!({ "meeting_id": meeting_id, "qr_code": qr_code }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(
            body["error"],
            "Attendance for this meeting has already been finalized"
        );
    }

    #[tokio::test]
    async fn test_project_expenses_cannot_exceed_budget() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;

        let response = app
            .post_as("/api/v1/projects", &admin_token)
            .json(&json!({ "name": "Library repainting", "budget": "1000" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        let project_id = body.data["id"].as_i64().unwrap();

        let expenses_path = format!("/api/v1/projects/{}/expenses", project_id);
        let response = app
            .post_as(&expenses_path, &admin_token)
            .json(&json!({
                "description": "Paint, 12 gallons",
                "category": "Materials",
                "amount": "700",
                "expense_date": "2026-06-01",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(decimal(&body.data["project"]["total_expenses"]), Decimal::new(700, 0));
        assert_eq!(decimal(&body.data["project"]["balance"]), Decimal::new(300, 0));

        let response = app
            .post_as(&expenses_path, &admin_token)
            .json(&json!({
                "description": "Scaffolding rental",
                "amount": "301",
                "expense_date": "2026-06-02",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .get_as(&format!("/api/v1/projects/{}", project_id), &admin_token)
            .await;
        let body: ApiResponse<Value> = response.json();
        assert_eq!(decimal(&body.data["balance"]), Decimal::new(300, 0));

        let response = app.get_as(&expenses_path, &admin_token).await;
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data.len(), 1);
    }

    #[tokio::test]
    async fn test_settings_update_is_visible_immediately() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (_, parent_token) = app.parent("parent@example.com").await;

        let response = app.get_as("/api/v1/settings", &parent_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(decimal(&body.data["absent_penalty_amount"]), Decimal::new(50, 0));

        app.put_as("/api/v1/settings", &parent_token)
            .json(&json!({ "absent_penalty_amount": "75" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        app.put_as("/api/v1/settings", &admin_token)
            .json(&json!({ "absent_penalty_amount": "-1" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.put_as("/api/v1/settings", &admin_token)
            .json(&json!({ "absent_penalty_amount": "75", "qr_expiry_minutes": 30 }))
            .await
            .assert_status_ok();

        let response = app.get_as("/api/v1/settings", &parent_token).await;
        let body: ApiResponse<Value> = response.json();
        assert_eq!(decimal(&body.data["absent_penalty_amount"]), Decimal::new(75, 0));
        assert_eq!(body.data["qr_expiry_minutes"], 30);
    }

    #[tokio::test]
    async fn test_student_link_approval() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (parent, parent_token) = app.parent("parent@example.com").await;

        app.post_as("/api/v1/students", &admin_token)
            .json(&json!({
                "student_number": "2026-0001",
                "first_name": "Jun",
                "last_name": "Reyes",
                "grade_level": "Grade 4",
            }))
            .await
            .assert_status(StatusCode::CREATED);
        app.post_as("/api/v1/students", &admin_token)
            .json(&json!({
                "student_number": "2026-0001",
                "first_name": "Duplicate",
                "last_name": "Number",
                "grade_level": "Grade 4",
            }))
            .await
            .assert_status(StatusCode::CONFLICT);

        app.post_as("/api/v1/student-links", &parent_token)
            .json(&json!({ "student_number": "9999-9999", "relationship": "mother" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let response = app
            .post_as("/api/v1/student-links", &parent_token)
            .json(&json!({ "student_number": "2026-0001", "relationship": "mother" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        let link_id = body.data["id"].as_i64().unwrap();
        assert_eq!(body.data["status"], "PENDING");

        app.post_as("/api/v1/student-links", &parent_token)
            .json(&json!({ "student_number": "2026-0001", "relationship": "mother" }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let students_path = format!("/api/v1/parents/{}/students", parent.id);
        let response = app.get_as(&students_path, &parent_token).await;
        let body: ApiResponse<Vec<Value>> = response.json();
        assert!(body.data.is_empty());

        app.put_as(&format!("/api/v1/student-links/{}/approve", link_id), &parent_token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.put_as(&format!("/api/v1/student-links/{}/approve", link_id), &admin_token)
            .await
            .assert_status_ok();
        app.put_as(&format!("/api/v1/student-links/{}/approve", link_id), &admin_token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app.get_as(&students_path, &parent_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0]["student"]["student_number"], "2026-0001");
    }

    #[tokio::test]
    async fn test_contribution_batch_uses_default_amount() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (_, alice_token) = app.parent("alice@example.com").await;
        app.parent("bob@example.com").await;

        let response = app
            .post_as("/api/v1/contribution-batches", &admin_token)
            .json(&json!({ "title": "Annual PTA fee", "due_date": "2030-03-31" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["created"], 2);

        let response = app.get_as("/api/v1/contributions", &alice_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(decimal(&body.data[0]["amount"]), Decimal::new(100, 0));
        assert_eq!(body.data[0]["payment_status"], "UNPAID");
    }

    #[tokio::test]
    async fn test_publishing_announcement_notifies_parents() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (_, parent_token) = app.parent("parent@example.com").await;

        let response = app
            .post_as("/api/v1/announcements", &admin_token)
            .json(&json!({
                "title": "Family day",
                "content": "Family day moves to the covered court.",
                "priority": "HIGH",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        let announcement_id = body.data["id"].as_i64().unwrap();
        let path = format!("/api/v1/announcements/{}", announcement_id);

        // Drafts are hidden from parents
        app.get_as(&path, &parent_token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let response = app.get_as("/api/v1/announcements", &parent_token).await;
        let body: ApiResponse<Vec<Value>> = response.json();
        assert!(body.data.is_empty());

        app.post_as(&format!("{}/publish", path), &admin_token)
            .await
            .assert_status_ok();
        app.post_as(&format!("{}/publish", path), &admin_token)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app.get_as(&path, &parent_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["is_published"], true);

        // Delivery runs in the background
        let mut delivered = false;
        for _ in 0..50 {
            if app
                .mailer
                .sent()
                .iter()
                .any(|email| email.to == "parent@example.com" && email.subject.contains("Family day"))
            {
                delivered = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(delivered, "parent was not notified");
    }

    #[tokio::test]
    async fn test_officers_are_public_to_members() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (_, parent_token) = app.parent("parent@example.com").await;

        app.post_as("/api/v1/officers", &admin_token)
            .json(&json!({
                "name": "Ana Cruz",
                "position": "Treasurer",
                "term_start": "2026-06-01",
                "term_end": "2025-06-01",
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post_as("/api/v1/officers", &admin_token)
            .json(&json!({
                "name": "Ana Cruz",
                "position": "Treasurer",
                "term_start": "2026-06-01",
                "term_end": "2027-05-31",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        app.post_as("/api/v1/officers", &parent_token)
            .json(&json!({ "name": "Self Appointed", "position": "President" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = app.get_as("/api/v1/officers", &parent_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0]["position"], "Treasurer");
    }

    #[tokio::test]
    async fn test_dashboard_and_parent_summary() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (alice, alice_token) = app.parent("alice@example.com").await;
        let (bob, _) = app.parent("bob@example.com").await;

        create_penalty(&app, &admin_token, alice.id, "120").await;

        let response = app.get_as("/api/v1/dashboard/me", &alice_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["parent_id"], alice.id);
        assert_eq!(decimal(&body.data["total_outstanding"]), Decimal::new(120, 0));

        app.get_as(&format!("/api/v1/parents/{}/summary", bob.id), &alice_token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
        app.get_as("/api/v1/parents/9999/summary", &admin_token)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let response = app.get_as("/api/v1/dashboard", &admin_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["total_parents"], 2);
        assert_eq!(body.data["penalties"]["record_count"], 1);
        assert_eq!(decimal(&body.data["penalties"]["outstanding"]), Decimal::new(120, 0));
    }

    #[tokio::test]
    async fn test_overdue_scan_flags_past_due_penalties() {
        let app = setup_test_app().await;
        let (_, admin_token) = app.admin().await;
        let (parent, parent_token) = app.parent("parent@example.com").await;

        app.post_as("/api/v1/penalties", &admin_token)
            .json(&json!({
                "parent_id": parent.id,
                "reason": "Late for clean-up drive",
                "amount": "20",
                "due_date": "2020-01-31",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        app.post_as("/api/v1/overdue/scan", &parent_token)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = app.post_as("/api/v1/overdue/scan", &admin_token).await;
        response.assert_status_ok();
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["penalties_marked"], 1);

        // A second scan changes nothing
        let response = app.post_as("/api/v1/overdue/scan", &admin_token).await;
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["penalties_marked"], 0);

        let response = app.get_as("/api/v1/penalties", &parent_token).await;
        let body: ApiResponse<Vec<Value>> = response.json();
        assert_eq!(body.data[0]["payment_status"], "OVERDUE");
        assert_eq!(body.data[0]["is_overdue"], true);
    }
}
