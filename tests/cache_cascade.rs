mod common;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use common::{TestApp, cache_status, json_body, settings};

fn titles(collection: &Value) -> Vec<String> {
    collection["posts"]
        .as_array()
        .expect("posts array")
        .iter()
        .filter_map(|post| post["title"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn editing_a_post_refreshes_the_post_and_the_collection() {
    let app = TestApp::new();
    let token = app.register("alice").await;
    let href = app.create_post(&token, "First draft").await;

    let first = app.send(Method::GET, &href, None, None).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cache_status(&first).as_deref(), Some("miss"));
    let first = json_body(first).await;
    assert_eq!(first["title"], "First draft");

    let second = app.send(Method::GET, &href, None, None).await;
    assert_eq!(cache_status(&second).as_deref(), Some("hit"));
    assert_eq!(json_body(second).await, first);

    let listing = app.send(Method::GET, "/v1/posts/", None, None).await;
    assert_eq!(cache_status(&listing).as_deref(), Some("miss"));
    let listing = app.send(Method::GET, "/v1/posts/", None, None).await;
    assert_eq!(cache_status(&listing).as_deref(), Some("hit"));
    assert_eq!(titles(&json_body(listing).await), vec!["First draft"]);

    let edit = app
        .send(
            Method::PUT,
            &href,
            Some(&token),
            Some(json!({ "title": "Second draft", "content": "rewritten" })),
        )
        .await;
    assert_eq!(edit.status(), StatusCode::NO_CONTENT);

    let refreshed = app.send(Method::GET, &href, None, None).await;
    assert_eq!(cache_status(&refreshed).as_deref(), Some("miss"));
    let refreshed = json_body(refreshed).await;
    assert_eq!(refreshed["title"], "Second draft");
    assert!(refreshed.get("edited").is_some());

    let listing = app.send(Method::GET, "/v1/posts/", None, None).await;
    assert_eq!(cache_status(&listing).as_deref(), Some("miss"));
    assert_eq!(titles(&json_body(listing).await), vec!["Second draft"]);
}

#[tokio::test]
async fn trailing_slash_variants_share_one_entry() {
    let app = TestApp::new();
    let token = app.register("alice").await;
    let href = app.create_post(&token, "Slashes").await;
    let bare = href.trim_end_matches('/').to_string();

    let with_slash = app.send(Method::GET, &href, None, None).await;
    assert_eq!(cache_status(&with_slash).as_deref(), Some("miss"));

    let without = app.send(Method::GET, &bare, None, None).await;
    assert_eq!(without.status(), StatusCode::OK);
    assert_eq!(cache_status(&without).as_deref(), Some("hit"));

    let listing = app.send(Method::GET, "/v1/posts", None, None).await;
    assert_eq!(cache_status(&listing).as_deref(), Some("miss"));
    let listing = app.send(Method::GET, "/v1/posts/", None, None).await;
    assert_eq!(cache_status(&listing).as_deref(), Some("hit"));
}

#[tokio::test]
async fn liking_a_post_purges_the_post_and_every_profile() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bobby").await;
    let href = app.create_post(&alice, "Likeable").await;

    for token in [&alice, &bob] {
        let profile = app.send(Method::GET, "/v1/user/", Some(token), None).await;
        assert_eq!(cache_status(&profile).as_deref(), Some("miss"));
        let profile = app.send(Method::GET, "/v1/user/", Some(token), None).await;
        assert_eq!(cache_status(&profile).as_deref(), Some("hit"));
    }
    let post = app.send(Method::GET, &href, None, None).await;
    assert_eq!(json_body(post).await["likes"], 0);

    let like = app
        .send(Method::PUT, &format!("{href}like"), Some(&bob), None)
        .await;
    assert_eq!(like.status(), StatusCode::NO_CONTENT);

    let post = app.send(Method::GET, &href, None, None).await;
    assert_eq!(cache_status(&post).as_deref(), Some("miss"));
    assert_eq!(json_body(post).await["likes"], 1);

    for token in [&alice, &bob] {
        let profile = app.send(Method::GET, "/v1/user/", Some(token), None).await;
        assert_eq!(cache_status(&profile).as_deref(), Some("miss"));
    }
}

#[tokio::test]
async fn per_identity_entries_are_not_shared() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bobby").await;

    let own = app.send(Method::GET, "/v1/user/", Some(&alice), None).await;
    assert_eq!(cache_status(&own).as_deref(), Some("miss"));
    assert_eq!(json_body(own).await["user"]["username"], "alice");

    let other = app.send(Method::GET, "/v1/user/", Some(&bob), None).await;
    assert_eq!(cache_status(&other).as_deref(), Some("miss"));
    assert_eq!(json_body(other).await["user"]["username"], "bobby");

    let search = app
        .send(Method::GET, "/v1/posts/search?q=rust", Some(&alice), None)
        .await;
    assert_eq!(cache_status(&search).as_deref(), Some("miss"));
    let search = app
        .send(Method::GET, "/v1/posts/search?q=rust", Some(&bob), None)
        .await;
    assert_eq!(cache_status(&search).as_deref(), Some("miss"));
    let search = app
        .send(Method::GET, "/v1/posts/search?q=rust", Some(&bob), None)
        .await;
    assert_eq!(cache_status(&search).as_deref(), Some("hit"));
}

#[tokio::test]
async fn private_posts_stay_out_of_shared_listings() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bobby").await;

    let created = app
        .send(
            Method::POST,
            "/v1/posts/",
            Some(&alice),
            Some(json!({
                "title": "Diary",
                "content": "secret thoughts",
                "tags": ["notes"],
                "private": true,
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    app.create_post(&alice, "Public rust notes").await;

    let listing = app.send(Method::GET, "/v1/posts/", None, None).await;
    assert_eq!(titles(&json_body(listing).await), vec!["Public rust notes"]);

    let own = app
        .send(Method::GET, "/v1/posts/search?q=notes", Some(&alice), None)
        .await;
    let mut own = titles(&json_body(own).await);
    own.sort();
    assert_eq!(own, vec!["Diary", "Public rust notes"]);

    let other = app
        .send(Method::GET, "/v1/posts/search?q=notes", Some(&bob), None)
        .await;
    assert_eq!(titles(&json_body(other).await), vec!["Public rust notes"]);
}

#[tokio::test]
async fn rejected_mutations_leave_entries_in_place() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bobby").await;
    let href = app.create_post(&alice, "Owned").await;

    let warm = app.send(Method::GET, &href, None, None).await;
    assert_eq!(cache_status(&warm).as_deref(), Some("miss"));

    let hijack = app
        .send(
            Method::PUT,
            &href,
            Some(&bob),
            Some(json!({ "title": "Stolen", "content": "mine now" })),
        )
        .await;
    assert_eq!(hijack.status(), StatusCode::FORBIDDEN);

    let still = app.send(Method::GET, &href, None, None).await;
    assert_eq!(cache_status(&still).as_deref(), Some("hit"));
    assert_eq!(json_body(still).await["title"], "Owned");
}

#[tokio::test]
async fn uncached_resources_and_disabled_cache_pass_through() {
    let app = TestApp::new();
    let root = app.send(Method::GET, "/", None, None).await;
    assert_eq!(root.status(), StatusCode::OK);
    assert_eq!(cache_status(&root), None);

    let mut disabled = settings();
    disabled.cache.enabled = false;
    let app = TestApp::with_settings(disabled);
    let token = app.register("alice").await;
    let href = app.create_post(&token, "Uncached").await;

    for _ in 0..2 {
        let response = app.send(Method::GET, &href, None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_status(&response), None);
    }
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn viewing_a_post_refreshes_the_authors_profile() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let href = app.create_post(&alice, "Seen").await;

    let profile = app.send(Method::GET, "/v1/user/", Some(&alice), None).await;
    assert_eq!(cache_status(&profile).as_deref(), Some("miss"));
    assert_eq!(json_body(profile).await["posts"][0]["views"], 0);
    let profile = app.send(Method::GET, "/v1/user/", Some(&alice), None).await;
    assert_eq!(cache_status(&profile).as_deref(), Some("hit"));

    let view = app
        .send(Method::PUT, &format!("{href}view"), Some(&alice), None)
        .await;
    assert_eq!(view.status(), StatusCode::NO_CONTENT);

    let profile = app.send(Method::GET, "/v1/user/", Some(&alice), None).await;
    assert_eq!(cache_status(&profile).as_deref(), Some("miss"));
    assert_eq!(json_body(profile).await["posts"][0]["views"], 1);
}

#[tokio::test]
async fn profile_lists_comments_and_likes_and_stays_fresh() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    let bob = app.register("bobby").await;
    let href = app.create_post(&alice, "Discussed").await;

    let empty = app.send(Method::GET, "/v1/user/", Some(&bob), None).await;
    let empty = json_body(empty).await;
    assert_eq!(empty["comments"], json!([]));
    assert_eq!(empty["liked_posts"], json!([]));

    let comment = app
        .send(
            Method::POST,
            &format!("{href}comment"),
            Some(&bob),
            Some(json!({ "content": "Nice read" })),
        )
        .await;
    assert_eq!(comment.status(), StatusCode::CREATED);
    let like = app
        .send(Method::PUT, &format!("{href}like"), Some(&bob), None)
        .await;
    assert_eq!(like.status(), StatusCode::NO_CONTENT);

    let profile = app.send(Method::GET, "/v1/user/", Some(&bob), None).await;
    assert_eq!(cache_status(&profile).as_deref(), Some("miss"));
    let profile = json_body(profile).await;
    assert_eq!(profile["posts"], json!([]));
    assert_eq!(profile["comments"][0]["post"], href.as_str());
    assert_eq!(profile["comments"][0]["content"], "Nice read");
    assert_eq!(profile["liked_posts"][0]["title"], "Discussed");

    // The author renames the post; the liker's profile embeds it.
    let warm = app.send(Method::GET, "/v1/user/", Some(&bob), None).await;
    assert_eq!(cache_status(&warm).as_deref(), Some("hit"));
    let edit = app
        .send(
            Method::PUT,
            &href,
            Some(&alice),
            Some(json!({ "title": "Discussed at length", "content": "more" })),
        )
        .await;
    assert_eq!(edit.status(), StatusCode::NO_CONTENT);

    let profile = app.send(Method::GET, "/v1/user/", Some(&bob), None).await;
    assert_eq!(cache_status(&profile).as_deref(), Some("miss"));
    assert_eq!(
        json_body(profile).await["liked_posts"][0]["title"],
        "Discussed at length"
    );
}

#[tokio::test]
async fn private_posts_do_not_shorten_collection_pages() {
    let app = TestApp::new();
    let alice = app.register("alice").await;
    app.create_post(&alice, "Older public").await;
    let private = app
        .send(
            Method::POST,
            "/v1/posts/",
            Some(&alice),
            Some(json!({ "title": "Newest diary", "content": "hidden", "private": true })),
        )
        .await;
    assert_eq!(private.status(), StatusCode::CREATED);

    let page = app.send(Method::GET, "/v1/posts/?count=1", None, None).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert_eq!(titles(&json_body(page).await), vec!["Older public"]);
}
