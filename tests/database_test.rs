//! Flows against a real Postgres. Set `TEST_DATABASE_URL` to run them;
//! without it every test returns early.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use serial_test::serial;

use common::{json_request, send, unique_email, TestDatabase, TEST_PASSWORD};
use finova_fitness::auth::UserRole;
use finova_fitness::models::{CreateMemberRequest, MemberSummary, MembershipStatus};
use finova_fitness::services::MemberService;

macro_rules! test_db {
    () => {
        match TestDatabase::connect().await {
            Some(db) => db,
            None => return,
        }
    };
}

/// Enrol an active member and mint a token for them
async fn active_member(db: &TestDatabase) -> (MemberSummary, String) {
    let plan = db.membership_plan().await;
    let member = MemberService::new(db.pool.clone())
        .create_member(CreateMemberRequest {
            email: unique_email("member"),
            password: TEST_PASSWORD.to_string(),
            full_name: common::fake_name(),
            phone: None,
            membership_plan_id: plan.id,
        })
        .await
        .unwrap();

    let token = db
        .state
        .auth
        .jwt()
        .create_access_token(member.user_id, &member.email, UserRole::Member)
        .unwrap();
    (member, token)
}

#[tokio::test]
async fn test_register_login_and_logout() {
    let db = test_db!();
    let email = unique_email("signup");
    let registration = json!({
        "email": email,
        "password": TEST_PASSWORD,
        "full_name": "Riley Newcomer"
    });

    let (status, body) = send(
        &db.app,
        json_request(Method::POST, "/api/auth/register", None, Some(registration.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "member");
    assert!(body["user"]["password_hash"].is_null());

    let (status, _) = send(
        &db.app,
        json_request(Method::POST, "/api/auth/register", None, Some(registration)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": "Wr0ng!password" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": email.to_uppercase(), "password": TEST_PASSWORD })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(&db.app, json_request(Method::GET, "/api/auth/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], email);

    let (status, _) = send(&db.app, json_request(Method::POST, "/api/auth/logout", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&db.app, json_request(Method::GET, "/api/auth/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_checks() {
    let db = test_db!();
    let (_, member_token) = active_member(&db).await;
    let (_, admin_token) = db.user_with_role(UserRole::Admin).await;
    let (_, trainer_token) = db.user_with_role(UserRole::Trainer).await;

    let (status, body) = send(
        &db.app,
        json_request(Method::GET, "/api/admin/stats", Some(&member_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "AuthorizationError");

    let (status, body) = send(
        &db.app,
        json_request(Method::GET, "/api/admin/stats", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["members"]["total"].as_i64().unwrap() >= 1);

    let (status, _) = send(
        &db.app,
        json_request(Method::GET, "/api/check-ins/active", Some(&trainer_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin passes every role check
    let (status, _) = send(
        &db.app,
        json_request(Method::GET, "/api/check-ins/active", Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &db.app,
        json_request(Method::GET, "/api/store/cart", Some(&trainer_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_check_in_awards_consistency_once_per_week() {
    let db = test_db!();
    let (member, member_token) = active_member(&db).await;
    let (_, desk_token) = db.user_with_role(UserRole::FrontDesk).await;
    let check_in = || {
        json_request(
            Method::POST,
            "/api/check-ins",
            Some(&desk_token),
            Some(json!({ "member_id": member.user_id })),
        )
    };

    let (status, body) = send(&db.app, check_in()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["consistency"]["points_awarded"], 50);
    let first_id = body["check_in"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(&db.app, check_in()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let checkout_uri = format!("/api/check-ins/{first_id}/checkout");
    let (status, body) = send(&db.app, json_request(Method::POST, &checkout_uri, Some(&desk_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["checked_out_at"].is_string());

    let (status, _) = send(&db.app, json_request(Method::POST, &checkout_uri, Some(&desk_token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&db.app, check_in()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["consistency"]["points_awarded"], 0);

    let (status, body) = send(&db.app, json_request(Method::GET, "/api/loyalty/me", Some(&member_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 50);

    let (status, body) = send(
        &db.app,
        json_request(Method::GET, "/api/check-ins/me/consistency?weeks=2", Some(&member_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let weeks = body["weeks"].as_array().unwrap();
    assert_eq!(weeks.len(), 2);
    assert_eq!(weeks[1]["days_checked_in"], 1);
    assert_eq!(weeks[1]["qualified"], true);
}

#[tokio::test]
async fn test_check_in_rejects_non_members() {
    let db = test_db!();
    let (_, desk_token) = db.user_with_role(UserRole::FrontDesk).await;
    let (trainer_id, _) = db.user_with_role(UserRole::Trainer).await;

    let (status, _) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/check-ins",
            Some(&desk_token),
            Some(json!({ "member_id": trainer_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_moves_stock_and_points() {
    let db = test_db!();
    let (_, admin_token) = db.user_with_role(UserRole::Admin).await;
    let (_, member_token) = active_member(&db).await;

    let (status, item) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/store/items",
            Some(&admin_token),
            Some(json!({
                "name": format!("Kettlebell {}", uuid::Uuid::new_v4().simple()),
                "category": "equipment",
                "price_cents": 1999,
                "stock_quantity": 5
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let item_id = item["id"].as_str().unwrap().to_string();
    let add = |quantity: i32| {
        json_request(
            Method::POST,
            "/api/store/cart",
            Some(&member_token),
            Some(json!({ "item_id": item_id, "quantity": quantity })),
        )
    };

    let (status, _) = send(&db.app, add(9)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, cart) = send(&db.app, add(2)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["subtotal_cents"], 3998);

    let (status, order) = send(&db.app, json_request(Method::POST, "/api/store/checkout", Some(&member_token), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["order"]["total_cents"], 3998);
    assert_eq!(order["order"]["points_earned"], 39);
    assert_eq!(order["items"].as_array().unwrap().len(), 1);

    let (_, stored) = send(
        &db.app,
        json_request(Method::GET, &format!("/api/store/items/{item_id}"), None, None),
    )
    .await;
    assert_eq!(stored["stock_quantity"], 3);

    let (status, _) = send(&db.app, json_request(Method::POST, "/api/store/checkout", Some(&member_token), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Redeem everything earned on a second order
    send(&db.app, add(1)).await;
    let (status, order) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/store/checkout",
            Some(&member_token),
            Some(json!({ "points_to_redeem": 39 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["order"]["discount_cents"], 39);
    assert_eq!(order["order"]["total_cents"], 1960);
    assert_eq!(order["order"]["points_earned"], 19);

    let (_, points) = send(&db.app, json_request(Method::GET, "/api/loyalty/me", Some(&member_token), None)).await;
    assert_eq!(points["balance"], 19);

    let order_id = order["order"]["id"].as_str().unwrap();
    let (status, cancelled) = send(
        &db.app,
        json_request(
            Method::PUT,
            &format!("/api/store/orders/{order_id}/status"),
            Some(&admin_token),
            Some(json!({ "status": "cancelled" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, points) = send(&db.app, json_request(Method::GET, "/api/loyalty/me", Some(&member_token), None)).await;
    assert_eq!(points["balance"], 39);

    let (_, stored) = send(
        &db.app,
        json_request(Method::GET, &format!("/api/store/items/{item_id}"), None, None),
    )
    .await;
    assert_eq!(stored["stock_quantity"], 3);
}

#[tokio::test]
async fn test_diet_request_workflow() {
    let db = test_db!();
    let (_, member_token) = active_member(&db).await;
    let (_, nutritionist_token) = db.user_with_role(UserRole::Nutritionist).await;
    let (_, other_nutritionist) = db.user_with_role(UserRole::Nutritionist).await;
    let request = json!({
        "goal": "Lose 5kg before summer",
        "current_weight_kg": 82.5,
        "target_weight_kg": 77.5,
        "activity_level": "moderate"
    });

    let (status, created) = send(
        &db.app,
        json_request(Method::POST, "/api/diet-plans/requests", Some(&member_token), Some(request.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &db.app,
        json_request(Method::POST, "/api/diet-plans/requests", Some(&member_token), Some(request)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let claim_uri = format!("/api/diet-plans/requests/{id}/claim");
    let (status, claimed) = send(&db.app, json_request(Method::POST, &claim_uri, Some(&nutritionist_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claimed["status"], "in_progress");

    let (status, _) = send(&db.app, json_request(Method::POST, &claim_uri, Some(&other_nutritionist), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let response = json!({ "plan_details": "High protein, 4 meals a day", "daily_calories": 2100 });
    let respond_uri = format!("/api/diet-plans/requests/{id}/respond");
    let (status, _) = send(
        &db.app,
        json_request(Method::POST, &respond_uri, Some(&other_nutritionist), Some(response.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, done) = send(
        &db.app,
        json_request(Method::POST, &respond_uri, Some(&nutritionist_token), Some(response)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "completed");
    assert_eq!(done["daily_calories"], 2100);
}

#[tokio::test]
#[serial]
async fn test_maintenance_expires_lapsed_memberships() {
    let db = test_db!();
    let (member, _) = active_member(&db).await;

    sqlx::query("UPDATE member_profiles SET membership_end = $2 WHERE user_id = $1")
        .bind(member.user_id)
        .bind((Utc::now() - Duration::days(2)).date_naive())
        .execute(&db.pool)
        .await
        .unwrap();

    let report = db.state.maintenance_tasks().run().await.unwrap();
    assert!(report.memberships_expired >= 1);

    let refreshed = MemberService::new(db.pool.clone())
        .get_member(member.user_id)
        .await
        .unwrap();
    assert_eq!(refreshed.membership_status, MembershipStatus::Expired);
}

fn days_from_today(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days)).to_string()
}

/// Open a trainer's calendar every day of the week between the given hours
async fn trainer_with_hours(db: &TestDatabase, open: &str, close: &str) -> (uuid::Uuid, String) {
    let (trainer_id, token) = db.user_with_role(UserRole::Trainer).await;
    let windows: Vec<_> = (0..7)
        .map(|day| json!({ "day_of_week": day, "start_time": open, "end_time": close }))
        .collect();

    let (status, _) = send(
        &db.app,
        json_request(
            Method::PUT,
            "/api/trainers/me/schedule",
            Some(&token),
            Some(json!({ "windows": windows })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (trainer_id, token)
}

#[tokio::test]
async fn test_deactivated_user_loses_access_immediately() {
    let db = test_db!();
    let (_, admin_token) = db.user_with_role(UserRole::Admin).await;
    let (member, member_token) = active_member(&db).await;

    let (status, _) = send(&db.app, json_request(Method::GET, "/api/auth/me", Some(&member_token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &db.app,
        json_request(
            Method::PUT,
            &format!("/api/users/{}", member.user_id),
            Some(&admin_token),
            Some(json!({ "is_active": false })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = send(&db.app, json_request(Method::GET, "/api/auth/me", Some(&member_token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&db.app, json_request(Method::GET, "/api/loyalty/me", Some(&member_token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A deactivated admin is locked out of the layered admin routes too
    let (other_admin, other_admin_token) = db.user_with_role(UserRole::Admin).await;
    send(
        &db.app,
        json_request(
            Method::PUT,
            &format!("/api/users/{other_admin}"),
            Some(&admin_token),
            Some(json!({ "is_active": false })),
        ),
    )
    .await;
    let (status, _) = send(
        &db.app,
        json_request(Method::GET, "/api/admin/stats", Some(&other_admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_role_change_applies_to_live_tokens() {
    let db = test_db!();
    let (_, admin_token) = db.user_with_role(UserRole::Admin).await;
    let (trainer_id, trainer_token) = db.user_with_role(UserRole::Trainer).await;

    let (status, _) = send(
        &db.app,
        json_request(
            Method::PUT,
            &format!("/api/users/{trainer_id}"),
            Some(&admin_token),
            Some(json!({ "role": "member" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The token still claims trainer, the account no longer is one
    let (status, _) = send(
        &db.app,
        json_request(
            Method::PUT,
            "/api/trainers/me/schedule",
            Some(&trainer_token),
            Some(json!({ "windows": [] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_desk_enrolment_rejects_unknown_plan() {
    let db = test_db!();
    let (_, desk_token) = db.user_with_role(UserRole::FrontDesk).await;

    let (status, body) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/members",
            Some(&desk_token),
            Some(json!({
                "email": unique_email("walkin"),
                "password": TEST_PASSWORD,
                "full_name": common::fake_name(),
                "membership_plan_id": uuid::Uuid::new_v4()
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "ValidationError");
}

#[tokio::test]
async fn test_membership_approve_renew_and_cancel() {
    let db = test_db!();
    let (_, desk_token) = db.user_with_role(UserRole::FrontDesk).await;
    let plan = db.membership_plan().await;

    let (status, body) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": unique_email("applicant"),
                "password": TEST_PASSWORD,
                "full_name": common::fake_name(),
                "membership_plan_id": plan.id
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let member_id = body["user"]["id"].as_str().unwrap().to_string();

    let is_pending = |list: &serde_json::Value| {
        list.as_array()
            .unwrap()
            .iter()
            .any(|member| member["user_id"] == member_id.as_str())
    };

    let (status, pending) = send(&db.app, json_request(Method::GET, "/api/members/pending", Some(&desk_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(is_pending(&pending));

    let action_uri = format!("/api/members/{member_id}/membership");
    let action = |name: &str| {
        json_request(
            Method::POST,
            &action_uri,
            Some(&desk_token),
            Some(json!({ "action": name })),
        )
    };

    let (status, approved) = send(&db.app, action("approve")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["membership_status"], "active");
    assert_eq!(approved["membership_start"], days_from_today(0));

    let (_, pending) = send(&db.app, json_request(Method::GET, "/api/members/pending", Some(&desk_token), None)).await;
    assert!(!is_pending(&pending));

    let (status, _) = send(&db.app, action("approve")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Renewing an unexpired term extends it from the current end date
    let (status, renewed) = send(&db.app, action("renew")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renewed["membership_status"], "active");
    assert_eq!(renewed["membership_start"], approved["membership_end"]);

    let (status, cancelled) = send(&db.app, action("cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["membership_status"], "cancelled");

    let (status, _) = send(&db.app, action("cancel")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_monthly_plan_subscription_lifecycle() {
    let db = test_db!();
    let (_, trainer_token) = db.user_with_role(UserRole::Trainer).await;
    let (_, first_token) = active_member(&db).await;
    let (_, second_token) = active_member(&db).await;

    let schedule: Vec<_> = (0..7)
        .map(|day| json!({ "day_of_week": day, "start_time": "07:00:00" }))
        .collect();
    let (status, plan) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/monthly-plans",
            Some(&trainer_token),
            Some(json!({
                "name": "Early Bird Strength",
                "sessions_per_month": 4,
                "session_duration_minutes": 60,
                "price_cents": 12_000,
                "max_subscribers": 1,
                "schedule": schedule
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let subscribe_uri = format!("/api/monthly-plans/{}/subscribe", plan["id"].as_str().unwrap());

    let (status, subscription) = send(&db.app, json_request(Method::POST, &subscribe_uri, Some(&first_token), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(subscription["status"], "pending");
    let subscription_id = subscription["id"].as_str().unwrap().to_string();

    let (status, _) = send(&db.app, json_request(Method::POST, &subscribe_uri, Some(&first_token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let pending_ids = |list: serde_json::Value| -> Vec<String> {
        list.as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["id"].as_str().unwrap().to_string())
            .collect()
    };
    let pending_uri = "/api/monthly-plans/subscriptions/pending";
    let (_, pending) = send(&db.app, json_request(Method::GET, pending_uri, Some(&trainer_token), None)).await;
    assert!(pending_ids(pending).contains(&subscription_id));

    let approve_uri = format!("/api/monthly-plans/subscriptions/{subscription_id}/approve");
    let (status, approval) = send(&db.app, json_request(Method::POST, &approve_uri, Some(&trainer_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approval["subscription"]["status"], "active");
    assert_eq!(approval["slots"].as_array().unwrap().len(), 4);

    let (_, pending) = send(&db.app, json_request(Method::GET, pending_uri, Some(&trainer_token), None)).await;
    assert!(!pending_ids(pending).contains(&subscription_id));

    let (status, _) = send(&db.app, json_request(Method::POST, &approve_uri, Some(&trainer_token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The single seat is taken
    let (status, waiting) = send(&db.app, json_request(Method::POST, &subscribe_uri, Some(&second_token), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(
        &db.app,
        json_request(
            Method::POST,
            &format!("/api/monthly-plans/subscriptions/{}/approve", waiting["id"].as_str().unwrap()),
            Some(&trainer_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "ConflictError");

    let cancel_uri = format!("/api/monthly-plans/subscriptions/{subscription_id}/cancel");
    let (status, cancelled) = send(&db.app, json_request(Method::POST, &cancel_uri, Some(&first_token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, _) = send(&db.app, json_request(Method::POST, &cancel_uri, Some(&first_token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_facility_slots_and_bookings() {
    let db = test_db!();
    let (_, admin_token) = db.user_with_role(UserRole::Admin).await;
    let (_, first_token) = active_member(&db).await;
    let (_, second_token) = active_member(&db).await;

    let (status, facility) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/facilities",
            Some(&admin_token),
            Some(json!({ "name": format!("Squash Court {}", uuid::Uuid::new_v4().simple()), "capacity": 1 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let facility_id = facility["id"].as_str().unwrap().to_string();

    let windows: Vec<_> = (0..7)
        .map(|day| {
            json!({
                "day_of_week": day,
                "open_time": "08:00:00",
                "close_time": "10:00:00",
                "slot_duration_minutes": 60
            })
        })
        .collect();
    let (status, _) = send(
        &db.app,
        json_request(
            Method::PUT,
            &format!("/api/facilities/{facility_id}/availability"),
            Some(&admin_token),
            Some(json!({ "windows": windows })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let tomorrow = days_from_today(1);
    let generate = || {
        json_request(
            Method::POST,
            &format!("/api/facilities/{facility_id}/slots/generate"),
            Some(&admin_token),
            Some(json!({ "from": tomorrow, "to": tomorrow })),
        )
    };
    let (status, first_run) = send(&db.app, generate()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first_run, json!({ "generated": 2, "skipped_existing": 0 }));

    let (_, second_run) = send(&db.app, generate()).await;
    assert_eq!(second_run, json!({ "generated": 0, "skipped_existing": 2 }));

    let (status, slots) = send(
        &db.app,
        json_request(
            Method::GET,
            &format!("/api/facilities/{facility_id}/slots?date={tomorrow}"),
            Some(&first_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let slots = slots.as_array().unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0]["start_time"], "08:00:00");
    assert_eq!(slots[0]["remaining"], 1);

    let book_uri = format!("/api/facilities/slots/{}/book", slots[0]["id"].as_str().unwrap());
    let (status, booking) = send(&db.app, json_request(Method::POST, &book_uri, Some(&first_token), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "confirmed");

    let (status, body) = send(&db.app, json_request(Method::POST, &book_uri, Some(&first_token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["type"], "ConflictError");

    let (status, _) = send(&db.app, json_request(Method::POST, &book_uri, Some(&second_token), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Cancelling frees the seat for someone else
    let cancel_uri = format!("/api/facilities/bookings/{}/cancel", booking["id"].as_str().unwrap());
    let (status, _) = send(&db.app, json_request(Method::POST, &cancel_uri, Some(&first_token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&db.app, json_request(Method::POST, &book_uri, Some(&second_token), None)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_session_booking_respects_trainer_calendar() {
    let db = test_db!();
    let (trainer_id, _) = trainer_with_hours(&db, "09:00:00", "12:00:00").await;
    let (_, first_token) = active_member(&db).await;
    let (_, second_token) = active_member(&db).await;
    let tomorrow = days_from_today(1);

    let book = |token: &str, start: &str, end: &str| {
        json_request(
            Method::POST,
            "/api/sessions",
            Some(token),
            Some(json!({
                "trainer_id": trainer_id,
                "session_date": tomorrow,
                "start_time": start,
                "end_time": end
            })),
        )
    };

    let (status, session) = send(&db.app, book(first_token.as_str(), "09:00:00", "10:00:00")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["status"], "scheduled");

    let (status, _) = send(&db.app, book(second_token.as_str(), "09:30:00", "10:30:00")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&db.app, book(second_token.as_str(), "13:00:00", "14:00:00")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Back-to-back is not an overlap
    let (status, _) = send(&db.app, book(second_token.as_str(), "10:00:00", "11:00:00")).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_removing_trainer_cancels_bookings_and_demotes() {
    let db = test_db!();
    let (_, admin_token) = db.user_with_role(UserRole::Admin).await;
    let (trainer_id, trainer_token) = trainer_with_hours(&db, "06:00:00", "09:00:00").await;
    let (_, member_token) = active_member(&db).await;

    let (status, _) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/sessions",
            Some(&member_token),
            Some(json!({
                "trainer_id": trainer_id,
                "session_date": days_from_today(2),
                "start_time": "06:00:00",
                "end_time": "07:00:00"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, plan) = send(
        &db.app,
        json_request(
            Method::POST,
            "/api/monthly-plans",
            Some(&trainer_token),
            Some(json!({
                "name": "Mobility Basics",
                "sessions_per_month": 2,
                "session_duration_minutes": 45,
                "price_cents": 6_000,
                "max_subscribers": 5,
                "schedule": [{ "day_of_week": 2, "start_time": "08:00:00" }]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(
        &db.app,
        json_request(
            Method::POST,
            &format!("/api/monthly-plans/{}/subscribe", plan["id"].as_str().unwrap()),
            Some(&member_token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, removal) = send(
        &db.app,
        json_request(Method::DELETE, &format!("/api/trainers/{trainer_id}"), Some(&admin_token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removal["sessions_cancelled"], 1);
    assert_eq!(removal["subscriptions_cancelled"], 1);

    let (_, sessions) = send(&db.app, json_request(Method::GET, "/api/sessions/me", Some(&member_token), None)).await;
    assert_eq!(sessions[0]["status"], "cancelled");

    let (status, _) = send(
        &db.app,
        json_request(Method::GET, &format!("/api/trainers/{trainer_id}"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &db.app,
        json_request(
            Method::PUT,
            "/api/trainers/me/schedule",
            Some(&trainer_token),
            Some(json!({ "windows": [] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let user = finova_fitness::services::UserService::new(db.pool.clone())
        .get_user(trainer_id)
        .await
        .unwrap();
    assert_eq!(user.role, UserRole::Member);
}
