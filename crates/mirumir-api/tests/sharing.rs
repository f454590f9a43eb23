mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn share_by_login_and_list() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    let bob = app.user("bob").await;
    let board_id = app.board(&ada, "Roadmap").await;

    let (status, grant) = app
        .post(
            &format!("/api/v1/boards/{board_id}/share"),
            &ada.token,
            json!({ "userLogin": "bob", "permission": "edit" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grant["userId"], bob.id);
    assert_eq!(grant["permission"], "edit");
    assert_eq!(grant["grantedBy"], ada.id);

    let (status, list) = app.get(&format!("/api/v1/boards/{board_id}/share"), &ada.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["boardId"], board_id);
    let shares = list["shares"].as_array().unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0]["userLogin"], "bob");
    assert_eq!(shares[0]["permission"], "edit");
}

#[tokio::test]
async fn sharing_again_replaces_the_grant() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    let bob = app.user("bob").await;
    let board_id = app.board(&ada, "Roadmap").await;

    app.share(&ada, board_id, &bob, "edit").await;
    app.share(&ada, board_id, &bob, "view").await;

    let (_, list) = app.get(&format!("/api/v1/boards/{board_id}/share"), &ada.token).await;
    let shares = list["shares"].as_array().unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0]["permission"], "view");
}

#[tokio::test]
async fn owner_cannot_target_themselves() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    let board_id = app.board(&ada, "Mine").await;

    let (status, body) = app
        .post(
            &format!("/api/v1/boards/{board_id}/share"),
            &ada.token,
            json!({ "userId": ada.id, "permission": "view" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_REQUEST");

    let (status, _) = app
        .put(
            &format!("/api/v1/boards/{board_id}/share/{}", ada.id),
            &ada.token,
            json!({ "permission": "edit" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .delete(&format!("/api/v1/boards/{board_id}/share/{}", ada.id), &ada.token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn owner_level_and_unknown_levels_are_rejected() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    app.user("bob").await;
    let board_id = app.board(&ada, "Mine").await;

    for permission in ["owner", "admin"] {
        let (status, body) = app
            .post(
                &format!("/api/v1/boards/{board_id}/share"),
                &ada.token,
                json!({ "userLogin": "bob", "permission": permission }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_PERMISSION");
    }
}

#[tokio::test]
async fn unknown_target_is_not_found() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    let board_id = app.board(&ada, "Mine").await;

    let (status, body) = app
        .post(
            &format!("/api/v1/boards/{board_id}/share"),
            &ada.token,
            json!({ "userLogin": "ghost", "permission": "view" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "USER_NOT_FOUND");

    let (status, _) = app
        .post(
            &format!("/api/v1/boards/{board_id}/share"),
            &ada.token,
            json!({ "permission": "view" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn editors_cannot_manage_sharing() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    let bob = app.user("bob").await;
    let carol = app.user("carol").await;
    let board_id = app.board(&ada, "Team").await;
    app.share(&ada, board_id, &bob, "edit").await;

    let (status, _) = app
        .post(
            &format!("/api/v1/boards/{board_id}/share"),
            &bob.token,
            json!({ "userId": carol.id, "permission": "view" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get(&format!("/api/v1/boards/{board_id}/share"), &bob.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn revoke_removes_access() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    let bob = app.user("bob").await;
    let board_id = app.board(&ada, "Team").await;
    app.share(&ada, board_id, &bob, "view").await;

    let share_uri = format!("/api/v1/boards/{board_id}/share/{}", bob.id);
    let (status, _) = app.delete(&share_uri, &ada.token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/api/v1/boards/{board_id}"), &bob.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.delete(&share_uri, &ada.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "ACCESS_NOT_FOUND");
}

#[tokio::test]
async fn updating_a_missing_grant_is_not_found() {
    let app = TestApp::new();
    let ada = app.user("ada").await;
    let bob = app.user("bob").await;
    let board_id = app.board(&ada, "Team").await;

    let (status, _) = app
        .put(
            &format!("/api/v1/boards/{board_id}/share/{}", bob.id),
            &ada.token,
            json!({ "permission": "view" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
