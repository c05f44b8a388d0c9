use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::common::{TestApp, routes};
use dossier_server::entity::file_record;

/// Exactly one head per chain and gap-free numbering from 1.
async fn assert_chain_consistent(app: &TestApp, root_id: uuid::Uuid) {
    let mut records = file_record::Entity::find()
        .filter(file_record::Column::RootId.eq(root_id))
        .all(&app.db)
        .await
        .expect("DB query failed");
    records.sort_by_key(|r| r.version_number);

    let numbers: Vec<i32> = records.iter().map(|r| r.version_number).collect();
    let expected: Vec<i32> = (1..=records.len() as i32).collect();
    assert_eq!(numbers, expected);

    let heads: Vec<_> = records.iter().filter(|r| r.is_latest).collect();
    assert_eq!(heads.len(), 1);
    assert_eq!(heads[0].version_number, records.len() as i32);
}

mod upload_version {
    use super::*;

    #[tokio::test]
    async fn new_version_becomes_the_head() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);
        let v1 = app.create_file(5, "spec.pdf", b"draft", &token).await;

        let res = app
            .upload_with_token(
                &routes::versions(v1),
                "spec-final.pdf",
                b"final".to_vec(),
                None,
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["version_number"], 2);
        assert_eq!(res.body["is_latest"], true);
        assert_eq!(res.body["root_id"], v1.to_string());
        assert_eq!(res.body["project_id"], 5);
        assert_eq!(res.body["original_name"], "spec-final.pdf");
        assert_eq!(res.body["version_note"], "Version 2");

        let old = app.get_with_token(&routes::file(v1), &token).await;
        assert_eq!(old.body["is_latest"], false);
        assert_chain_consistent(&app, v1).await;
    }

    #[tokio::test]
    async fn note_is_stored_trimmed() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);
        let v1 = app.create_file(1, "a.txt", b"1", &token).await;

        let res = app
            .upload_with_token(
                &routes::versions(v1),
                "a.txt",
                b"2".to_vec(),
                Some("  fixed typo in section 3 "),
                &token,
            )
            .await;

        assert_eq!(res.status, 201);
        assert_eq!(res.body["version_note"], "fixed typo in section 3");
    }

    #[tokio::test]
    async fn blank_note_gets_the_default() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);
        let v1 = app.create_file(1, "a.txt", b"1", &token).await;

        let res = app
            .upload_with_token(&routes::versions(v1), "a.txt", b"2".to_vec(), Some("   "), &token)
            .await;

        assert_eq!(res.status, 201);
        assert_eq!(res.body["version_note"], "Version 2");
    }

    #[tokio::test]
    async fn old_parent_appends_to_the_end_of_the_chain() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);
        let v1 = app.create_file(1, "a.txt", b"1", &token).await;
        let v2 = app.create_version(v1, "a.txt", b"2", None, &token).await;
        let _v3 = app.create_version(v2, "a.txt", b"3", None, &token).await;

        let res = app
            .upload_with_token(&routes::versions(v1), "a.txt", b"4".to_vec(), None, &token)
            .await;

        assert_eq!(res.status, 201);
        assert_eq!(res.body["version_number"], 4);
        assert_eq!(res.body["root_id"], v1.to_string());
        assert_chain_consistent(&app, v1).await;
    }

    #[tokio::test]
    async fn unknown_parent_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);

        let res = app
            .upload_with_token(
                &routes::versions(uuid::Uuid::now_v7()),
                "a.txt",
                b"x".to_vec(),
                None,
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn concurrent_uploads_keep_the_chain_consistent() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);
        let v1 = app.create_file(1, "a.txt", b"base", &token).await;

        let path = routes::versions(v1);
        let (r1, r2, r3, r4) = tokio::join!(
            app.upload_with_token(&path, "a.txt", b"w1".to_vec(), None, &token),
            app.upload_with_token(&path, "a.txt", b"w2".to_vec(), None, &token),
            app.upload_with_token(&path, "a.txt", b"w3".to_vec(), None, &token),
            app.upload_with_token(&path, "a.txt", b"w4".to_vec(), None, &token),
        );

        let mut numbers = Vec::new();
        for res in [r1, r2, r3, r4] {
            assert!(
                res.status == 201 || res.status == 409,
                "unexpected status {}: {}",
                res.status,
                res.text
            );
            if res.status == 201 {
                numbers.push(res.body["version_number"].as_i64().unwrap());
            } else {
                assert_eq!(res.body["code"], "CONFLICT");
            }
        }
        numbers.sort_unstable();
        assert!(!numbers.is_empty());
        assert!(
            numbers.windows(2).all(|w| w[0] < w[1]),
            "duplicate version numbers handed out: {numbers:?}"
        );

        assert_chain_consistent(&app, v1).await;
    }
}

mod list_versions {
    use super::*;

    #[tokio::test]
    async fn lists_history_newest_first_from_any_member() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);
        let v1 = app.create_file(1, "a.txt", b"1", &token).await;
        let v2 = app.create_version(v1, "a.txt", b"2", None, &token).await;
        let v3 = app
            .create_version(v2, "a.txt", b"3", Some("third"), &token)
            .await;

        for member in [v1, v2, v3] {
            let res = app.get_with_token(&routes::versions(member), &token).await;

            assert_eq!(res.status, 200);
            assert_eq!(res.body["total"], 3);
            let versions = res.body["versions"].as_array().unwrap();
            let numbers: Vec<i64> = versions
                .iter()
                .map(|v| v["version_number"].as_i64().unwrap())
                .collect();
            assert_eq!(numbers, vec![3, 2, 1]);
            assert_eq!(versions[0]["id"], v3.to_string());
            assert_eq!(versions[0]["version_note"], "third");
            assert_eq!(versions[0]["is_latest"], true);
            assert_eq!(versions[1]["is_latest"], false);
            assert_eq!(versions[2]["is_latest"], false);
        }
    }

    #[tokio::test]
    async fn single_version_document() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);
        let v1 = app.create_file(1, "a.txt", b"1", &token).await;

        let res = app.get_with_token(&routes::versions(v1), &token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total"], 1);
        assert_eq!(res.body["versions"][0]["id"], v1.to_string());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);

        let res = app
            .get_with_token(&routes::versions(uuid::Uuid::now_v7()), &token)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod latest {
    use super::*;

    #[tokio::test]
    async fn resolves_the_head_from_any_member() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);
        let v1 = app.create_file(1, "a.txt", b"1", &token).await;
        let v2 = app.create_version(v1, "a.txt", b"2", None, &token).await;

        for member in [v1, v2] {
            let res = app.get_with_token(&routes::latest(member), &token).await;
            assert_eq!(res.status, 200);
            assert_eq!(res.id(), v2);
            assert_eq!(res.body["version_number"], 2);
        }
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.member_token(1);

        let res = app
            .get_with_token(&routes::latest(uuid::Uuid::now_v7()), &token)
            .await;

        assert_eq!(res.status, 404);
    }
}
